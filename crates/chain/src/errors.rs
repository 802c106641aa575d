use moraine_execution::EngineError;
use moraine_storage::StoreError;
use thiserror::Error;

/// Service-level failures of the proposal pipeline. All variants are
/// non-fatal: the proposal is rejected and the node keeps running.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("no beacon block found in proposal")]
    NilBlock,

    #[error("undecodable {what}: {reason}")]
    Undecodable { what: &'static str, reason: String },

    #[error("proposer index {0} is not in the registry")]
    UnknownProposer(u64),
}

/// The fatal/non-fatal funnel of the host callbacks. Store corruption and
/// engine transport failures abort the host; everything else maps to a
/// rejection.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    if let Some(engine_error) = err.downcast_ref::<EngineError>() {
        return engine_error.is_fatal();
    }
    err.downcast_ref::<StoreError>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_transients_are_not_fatal() {
        assert!(!is_fatal(&anyhow::Error::new(
            EngineError::AcceptedPayloadStatus
        )));
        assert!(!is_fatal(&anyhow::Error::new(EngineError::BadBlockProduced)));
        assert!(is_fatal(&anyhow::Error::new(EngineError::Transport(
            "connection refused".to_string()
        ))));
    }

    #[test]
    fn store_errors_are_fatal() {
        assert!(is_fatal(&anyhow::Error::new(StoreError::MissingField(
            "slot"
        ))));
        assert!(!is_fatal(&anyhow::Error::new(ChainError::NilBlock)));
    }
}
