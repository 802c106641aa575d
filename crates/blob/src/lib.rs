pub mod error;
pub mod processor;

pub use error::BlobVerificationError;
pub use processor::BlobProcessor;
