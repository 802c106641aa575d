pub mod errors;
pub mod keys;
pub mod kv;
pub mod overlay;
pub mod redb_backend;
pub mod state_db;
pub mod store;

pub use errors::StoreError;
pub use kv::{KvBackend, MemoryKv};
pub use overlay::Overlay;
pub use redb_backend::RedbKv;
pub use state_db::StateDb;
pub use store::{StateBranch, StateStore, StateView};
