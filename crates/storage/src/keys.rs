//! Key schema of the state backend. Every semantic field of the beacon
//! state lives under one stable prefix byte; collection entries append a
//! big-endian `u64` or a fixed-size digest to the prefix.

pub const GENESIS_VALIDATORS_ROOT: u8 = 0x01;
pub const SLOT: u8 = 0x02;
pub const FORK: u8 = 0x03;
pub const LATEST_BLOCK_HEADER: u8 = 0x04;
pub const BLOCK_ROOTS: u8 = 0x05;
pub const STATE_ROOTS: u8 = 0x06;
pub const ETH1_DATA: u8 = 0x07;
pub const ETH1_DATA_VOTES: u8 = 0x08;
pub const ETH1_DEPOSIT_INDEX: u8 = 0x09;
pub const LATEST_EXECUTION_PAYLOAD_HEADER: u8 = 0x0A;
pub const VALIDATOR_COUNT: u8 = 0x0B;
pub const VALIDATOR_BY_INDEX: u8 = 0x0C;
pub const VALIDATOR_INDEX_BY_PUBKEY: u8 = 0x0D;
pub const VALIDATOR_INDEX_BY_CONSENSUS_ADDRESS: u8 = 0x0E;
pub const BALANCES: u8 = 0x0F;
pub const RANDAO_MIXES: u8 = 0x10;
pub const NEXT_WITHDRAWAL_INDEX: u8 = 0x11;
pub const NEXT_WITHDRAWAL_VALIDATOR_INDEX: u8 = 0x12;
pub const SLASHINGS: u8 = 0x13;
pub const TOTAL_SLASHING: u8 = 0x14;
pub const HISTORICAL_SUMMARIES: u8 = 0x15;

pub fn item(prefix: u8) -> Vec<u8> {
    vec![prefix]
}

pub fn indexed(prefix: u8, index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

pub fn digest(prefix: u8, bytes: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + bytes.len());
    key.push(prefix);
    key.extend_from_slice(bytes);
    key
}
