pub mod attestation_data;
pub mod attester_slashing;
pub mod beacon_block;
pub mod beacon_block_body;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod blob_sidecar;
pub mod checkpoint;
pub mod constants;
pub mod deposit;
pub mod deposit_data;
pub mod deposit_message;
pub mod eth1_data;
pub mod execution_payload;
pub mod execution_payload_header;
pub mod fork;
pub mod fork_data;
pub mod genesis;
pub mod historical_summary;
pub mod indexed_attestation;
pub mod misc;
pub mod polynomial_commitments;
pub mod proposer_slashing;
pub mod signing_data;
pub mod validator;
pub mod validator_update;
pub mod voluntary_exit;
pub mod withdrawal;
