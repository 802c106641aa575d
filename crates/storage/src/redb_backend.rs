use std::path::Path;

use redb::{Builder, Database, Durability, TableDefinition};

use crate::{
    errors::StoreError,
    kv::{KvBackend, WriteBatch},
};

const STATE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("beacon_state");

/// 1 GiB
const REDB_CACHE_SIZE: usize = 1_024 * 1_024 * 1_024;

/// Durable backend over a single redb table. One committed version of the
/// state lives here; branches buffer on top of it and land through
/// [`KvBackend::apply_batch`] in a single write transaction.
#[derive(Debug)]
pub struct RedbKv {
    db: Database,
}

impl RedbKv {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let db = Builder::new()
            .set_cache_size(REDB_CACHE_SIZE)
            .create(path)?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(STATE_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KvBackend for RedbKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_txn = self.db.begin_write()?;
        write_txn.set_durability(Durability::Immediate);
        {
            let mut table = write_txn.open_table(STATE_TABLE)?;
            for (key, value) in batch {
                match value {
                    Some(value) => {
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    None => {
                        table.remove(key.as_slice())?;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let kv = RedbKv::new(&dir.path().join("state.redb")).unwrap();

        kv.apply_batch(vec![
            (vec![0x02], Some(42u64.to_le_bytes().to_vec())),
            (vec![0x05, 0, 0, 0, 0, 0, 0, 0, 1], Some(vec![0xAA; 32])),
        ])
        .unwrap();

        assert_eq!(
            kv.get(&[0x02]).unwrap(),
            Some(42u64.to_le_bytes().to_vec())
        );
        assert_eq!(
            kv.get(&[0x05, 0, 0, 0, 0, 0, 0, 0, 1]).unwrap(),
            Some(vec![0xAA; 32])
        );
        assert_eq!(kv.get(&[0x03]).unwrap(), None);
    }
}
