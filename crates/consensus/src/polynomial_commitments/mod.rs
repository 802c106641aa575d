pub mod kzg_commitment;
pub mod kzg_proof;
