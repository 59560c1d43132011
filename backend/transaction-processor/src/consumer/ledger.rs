//! Per-partition record of withheld offsets
//!
//! A Kafka commit is a cursor: committing offset N marks everything below N as
//! consumed. Once a record has been withheld, committing any later record of
//! the same partition would skip it, so those commits are deferred until the
//! withheld record itself succeeds or the consumer restarts.
use std::collections::{BTreeSet, HashMap};

use super::source::RecordPosition;

#[derive(Debug, Default)]
pub struct OffsetLedger {
    withheld: HashMap<(String, i32), BTreeSet<i64>>,
}

impl OffsetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `position` was not committed.
    ///
    /// Returns how many offsets the partition now has withheld.
    pub fn withhold(&mut self, position: &RecordPosition) -> usize {
        let offsets = self
            .withheld
            .entry((position.topic.clone(), position.partition))
            .or_default();
        offsets.insert(position.offset);
        offsets.len()
    }

    /// Record a success at `position` and report whether committing it is safe
    pub fn clear_to_commit(&mut self, position: &RecordPosition) -> bool {
        let key = (position.topic.clone(), position.partition);
        let Some(offsets) = self.withheld.get_mut(&key) else {
            return true;
        };

        offsets.remove(&position.offset);
        let safe = match offsets.first() {
            Some(&lowest) => position.offset < lowest,
            None => true,
        };
        if offsets.is_empty() {
            self.withheld.remove(&key);
        }
        safe
    }

    /// Lowest withheld offset of a partition
    pub fn lowest_withheld(&self, topic: &str, partition: i32) -> Option<i64> {
        self.withheld
            .get(&(topic.to_string(), partition))
            .and_then(|offsets| offsets.first().copied())
    }
}
