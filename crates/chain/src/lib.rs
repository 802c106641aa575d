pub mod errors;
pub mod host;
pub mod payload_builder;
pub mod service;

pub use errors::{ChainError, is_fatal};
pub use payload_builder::{BuildRequest, PayloadBuilder, PayloadBuilderConfig};
pub use service::{ChainService, ChainServiceBuilder};
