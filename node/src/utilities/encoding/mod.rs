use serde::Serialize;

//JSON keeps stored blocks readable with the rocksdb tooling
pub fn encode<M: Serialize>(message: M) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(&message).map_err(|e| anyhow::anyhow!(e))
}

pub fn decode<M: for<'de> serde::Deserialize<'de>>(bytes: &[u8]) -> anyhow::Result<M> {
    serde_json::from_slice(bytes).map_err(|e| anyhow::anyhow!(e))
}

pub fn to_hex<T: AsRef<[u8]>>(data: T) -> String {
    array_bytes::bytes2hex("0x", data.as_ref())
}

pub fn from_hex<T: AsRef<str>>(data: T) -> anyhow::Result<Vec<u8>> {
    let data = data.as_ref();
    let data = data.strip_prefix("0x").unwrap_or(data);
    array_bytes::hex2bytes(data).map_err(|_| anyhow::anyhow!("Invalid hex string"))
}

/// Serde helper for byte payloads carried as hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_hex(s).map_err(serde::de::Error::custom)
    }
}
