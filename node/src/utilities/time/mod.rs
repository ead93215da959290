use chrono::Utc;

pub struct BlockTime;

impl BlockTime {
    /// Unix time in seconds.
    pub fn now() -> i64 {
        Utc::now().timestamp()
    }

    /// Block time for a child of a block created at `parent_time`.
    /// It's always strictly greater than the parent time, even if the clock hasn't moved.
    pub fn next_after(parent_time: i64) -> i64 {
        let now = Self::now();
        if now > parent_time {
            now
        } else {
            parent_time + 1
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_next_after_future_parent() {
        let parent = BlockTime::now() + 1000;
        assert_eq!(BlockTime::next_after(parent), parent + 1);
    }

    #[test]
    fn test_next_after_past_parent() {
        let parent = BlockTime::now() - 1000;
        assert!(BlockTime::next_after(parent) > parent + 1);
    }
}
