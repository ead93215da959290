use clap::Parser;

use crate::config::{
    BlockConfiguration, CacheConfiguration, Configuration, DatabaseConfiguration,
    MainChainConfiguration, NodeConfiguration, SequenceConfiguration, DEFAULT_BLOCK_INTERVAL_SEC,
    DEFAULT_CACHE_CAPACITY, DEFAULT_EMPTY_BLOCK_INTERVAL_SEC, DEFAULT_EXECUTOR_FILTER,
    DEFAULT_MAIN_CHAIN_URL,
};

#[derive(Debug, Clone, Parser)]
pub struct InitCmd {
    #[arg(long, default_value = "default")]
    pub node_name: String,
    #[clap(long, default_value = DEFAULT_MAIN_CHAIN_URL)]
    pub main_chain_url: String,
    #[clap(long, default_value = DEFAULT_EXECUTOR_FILTER)]
    pub executor_filter: String,
    #[clap(long, default_value_t = true)]
    pub mine: bool,
    #[clap(long, default_value_t = DEFAULT_BLOCK_INTERVAL_SEC)]
    pub block_interval_sec: u64,
    #[clap(long, default_value_t = DEFAULT_EMPTY_BLOCK_INTERVAL_SEC)]
    pub empty_block_interval_sec: u64,
    #[clap(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,
}

impl InitCmd {
    pub fn execute(self) -> anyhow::Result<()> {
        if Configuration::try_load_from_home_dir(&self.node_name).is_ok() {
            anyhow::bail!("Configuration file already exists: {}", self.node_name);
        }

        let path = Configuration::parachain_node_dir(&self.node_name)?;
        let rocksdb_path = path.join("db").join("rocksdb");
        let configuration = self.configuration(rocksdb_path.to_string_lossy().into_owned());
        configuration.validate()?;

        println!("Creating parachain node configuration in: {path:?}",);
        println!("Configuration: {self:?}",);

        std::fs::create_dir_all(&rocksdb_path)?;
        configuration.try_write(Configuration::parachain_config_file(&self.node_name)?)?;
        Ok(())
    }

    fn configuration(&self, rocksdb_path: String) -> Configuration {
        Configuration {
            node: NodeConfiguration {
                executor_filter: self.executor_filter.clone(),
                mine: self.mine,
            },
            main_chain: MainChainConfiguration {
                url: self.main_chain_url.clone(),
                ..MainChainConfiguration::default()
            },
            sequence: SequenceConfiguration::default(),
            cache: CacheConfiguration {
                capacity: self.cache_capacity,
                ..CacheConfiguration::default()
            },
            block: BlockConfiguration {
                interval_sec: self.block_interval_sec,
                empty_block_interval_sec: self.empty_block_interval_sec,
                ..BlockConfiguration::default()
            },
            database: DatabaseConfiguration {
                rocksdb_path,
                create_if_not_exists: true,
            },
        }
    }
}
