use crate::{pubkey::PubKey, signature::BLSSignature};

pub trait Verifiable {
    type Error;

    /// Verify the signature against a public key and message.
    fn verify(&self, pubkey: &PubKey, message: &[u8]) -> Result<bool, Self::Error>;

    /// Verify the signature against a message under the aggregate of
    /// `pubkeys`.
    fn fast_aggregate_verify<'a, P>(&self, pubkeys: P, message: &[u8]) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PubKey]>;
}

pub trait Signable {
    type Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}
