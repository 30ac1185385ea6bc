use crate::backend::reservation_station::RS;
use crate::instructions::instructions::{Tag, WordType};

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) struct CDBBroadcast {
    pub(crate) tag: Tag,
    pub(crate) value: WordType,
}

/// The common data bus. It holds the tag -> value pairs published during the
/// current write-result phase and is cleared before the next one.
pub(crate) struct CDB {
    broadcasts: Vec<CDBBroadcast>,
}

impl CDB {
    pub(crate) fn new() -> Self {
        Self { broadcasts: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.broadcasts.clear();
    }

    pub(crate) fn contains(&self, tag: Tag) -> bool {
        self.broadcasts.iter().any(|b| b.tag == tag)
    }

    /// Publishes the value of a tag. A tag is published at most once per cycle;
    /// returns false if it already was.
    pub(crate) fn publish(&mut self, tag: Tag, value: WordType) -> bool {
        if self.contains(tag) {
            return false;
        }
        self.broadcasts.push(CDBBroadcast { tag, value });
        true
    }

    /// Replaces every pending source of the station that matches a published tag.
    /// Returns the number of sources that were resolved.
    pub(crate) fn forward(&self, rs: &mut RS) -> usize {
        let mut resolved = 0;
        for broadcast in &self.broadcasts {
            for source in rs.source.iter_mut() {
                if source.resolve(broadcast.tag, broadcast.value) {
                    resolved += 1;
                }
            }
        }
        resolved
    }

    // in publication order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &CDBBroadcast> {
        self.broadcasts.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.broadcasts.is_empty()
    }
}
