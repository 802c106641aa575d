/// Domain separation tag of the proof-of-possession ciphersuite used for all
/// protocol signatures.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub const BYTES_PER_PUBKEY: usize = 48;
pub const BYTES_PER_SIGNATURE: usize = 96;
