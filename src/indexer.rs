use crate::col::{map_new, HashMap};

/// Assigns dense indices `0..len` to sparse ids in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Indexer {
    index_by_id: HashMap<i64, usize>,
    ids: Vec<i64>,
}

impl Indexer {
    pub fn new() -> Self {
        Self {
            index_by_id: map_new(),
            ids: Vec::new(),
        }
    }

    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut indexer = Self::new();
        for id in ids {
            indexer.index(id);
        }
        indexer
    }

    /// Returns the index of `id`, assigning the next free one if it is new.
    pub fn index(&mut self, id: i64) -> usize {
        *self.index_by_id.entry(id).or_insert_with(|| {
            self.ids.push(id);
            self.ids.len() - 1
        })
    }

    pub fn get(&self, id: i64) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    pub fn id(&self, index: usize) -> i64 {
        self.ids[index]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
