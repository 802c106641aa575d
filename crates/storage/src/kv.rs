use std::{collections::BTreeMap, fmt::Debug, sync::RwLock};

use crate::errors::StoreError;

/// A write is a key paired with its new value, or `None` for a deletion.
pub type WriteBatch = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// Minimal contract the state schema needs from a key-value backend. Reads
/// are point lookups; writes are only ever applied as one atomic batch, so a
/// reader never observes a half-applied overlay commit.
pub trait KvBackend: Debug + Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// In-memory backend used by tests and by proposal-time scratch states.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .map
            .read()
            .expect("memory kv lock poisoned")
            .get(key)
            .cloned())
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut map = self.map.write().expect("memory kv lock poisoned");
        for (key, value) in batch {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_application_is_last_write_wins() {
        let kv = MemoryKv::new();
        kv.apply_batch(vec![
            (vec![1], Some(vec![10])),
            (vec![2], Some(vec![20])),
            (vec![1], Some(vec![11])),
        ])
        .unwrap();

        assert_eq!(kv.get(&[1]).unwrap(), Some(vec![11]));
        assert_eq!(kv.get(&[2]).unwrap(), Some(vec![20]));

        kv.apply_batch(vec![(vec![2], None)]).unwrap();
        assert_eq!(kv.get(&[2]).unwrap(), None);
    }
}
