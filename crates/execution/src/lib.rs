pub mod block_hash;
pub mod client;
pub mod engine;
pub mod error;
pub mod mock;
pub mod requests;
pub mod rpc;
pub mod rpc_types;

pub use client::{EngineApiClient, EngineRpc};
pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use requests::{ForkchoiceResult, ForkchoiceUpdateRequest, NewPayloadRequest, PayloadEnvelope};
