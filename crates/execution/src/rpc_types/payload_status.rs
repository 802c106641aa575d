use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The five statuses the engine API can attach to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatus {
    Valid,
    Invalid,
    Syncing,
    Accepted,
    InvalidBlockHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatusV1 {
    pub status: PayloadStatus,
    pub latest_valid_hash: Option<B256>,
    pub validation_error: Option<String>,
}

impl PayloadStatusV1 {
    pub fn valid() -> Self {
        Self {
            status: PayloadStatus::Valid,
            latest_valid_hash: None,
            validation_error: None,
        }
    }

    pub fn from_status(status: PayloadStatus) -> Self {
        Self {
            status,
            latest_valid_hash: None,
            validation_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_engine_api_spelling() {
        let parsed: PayloadStatusV1 = serde_json::from_str(
            r#"{"status":"INVALID_BLOCK_HASH","latestValidHash":null,"validationError":null}"#,
        )
        .unwrap();
        assert_eq!(parsed.status, PayloadStatus::InvalidBlockHash);

        let encoded = serde_json::to_string(&PayloadStatusV1::from_status(
            PayloadStatus::Syncing,
        ))
        .unwrap();
        assert!(encoded.contains("\"SYNCING\""));
    }
}
