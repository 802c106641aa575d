use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{
    errors::StoreError,
    kv::{KvBackend, WriteBatch},
};

/// A write-buffering view over a parent backend. Reads fall through to the
/// parent until the key is shadowed; writes only touch the buffer until
/// [`Overlay::commit`] applies them to the parent as one batch. Dropping the
/// overlay without committing discards every buffered write.
#[derive(Debug)]
pub struct Overlay {
    parent: Arc<dyn KvBackend>,
    buffer: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl Overlay {
    pub fn new(parent: Arc<dyn KvBackend>) -> Self {
        Self {
            parent,
            buffer: RwLock::new(BTreeMap::new()),
        }
    }

    /// Apply all buffered writes to the parent atomically.
    pub fn commit(&self) -> Result<(), StoreError> {
        let batch: WriteBatch = {
            let mut buffer = self.buffer.write().expect("overlay lock poisoned");
            std::mem::take(&mut *buffer).into_iter().collect()
        };
        self.parent.apply_batch(batch)
    }

    pub fn pending_writes(&self) -> usize {
        self.buffer.read().expect("overlay lock poisoned").len()
    }
}

impl KvBackend for Overlay {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(shadowed) = self
            .buffer
            .read()
            .expect("overlay lock poisoned")
            .get(key)
        {
            return Ok(shadowed.clone());
        }
        self.parent.get(key)
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut buffer = self.buffer.write().expect("overlay lock poisoned");
        for (key, value) in batch {
            buffer.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[test]
    fn writes_stay_buffered_until_commit() {
        let parent: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
        parent
            .apply_batch(vec![(vec![1], Some(vec![1]))])
            .unwrap();

        let overlay = Overlay::new(parent.clone());
        overlay
            .apply_batch(vec![(vec![1], Some(vec![2])), (vec![2], Some(vec![9]))])
            .unwrap();

        // Overlay sees its own writes, the parent does not.
        assert_eq!(overlay.get(&[1]).unwrap(), Some(vec![2]));
        assert_eq!(parent.get(&[1]).unwrap(), Some(vec![1]));
        assert_eq!(parent.get(&[2]).unwrap(), None);

        overlay.commit().unwrap();
        assert_eq!(parent.get(&[1]).unwrap(), Some(vec![2]));
        assert_eq!(parent.get(&[2]).unwrap(), Some(vec![9]));
    }

    #[test]
    fn dropped_overlay_leaves_parent_untouched() {
        let parent: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
        {
            let overlay = Overlay::new(parent.clone());
            overlay
                .apply_batch(vec![(vec![7], Some(vec![7]))])
                .unwrap();
            assert_eq!(overlay.pending_writes(), 1);
        }
        assert_eq!(parent.get(&[7]).unwrap(), None);
    }

    #[test]
    fn buffered_delete_shadows_parent_value() {
        let parent: Arc<dyn KvBackend> = Arc::new(MemoryKv::new());
        parent
            .apply_batch(vec![(vec![3], Some(vec![3]))])
            .unwrap();

        let overlay = Overlay::new(parent.clone());
        overlay.apply_batch(vec![(vec![3], None)]).unwrap();
        assert_eq!(overlay.get(&[3]).unwrap(), None);
        assert_eq!(parent.get(&[3]).unwrap(), Some(vec![3]));
    }
}
