use alloy_primitives::hex;
use blst::{
    BLST_ERROR,
    min_pk::{AggregatePublicKey as BlstAggregatePublicKey, Signature as BlstSignature},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::Encode;
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U96};
use tree_hash_derive::TreeHash;

use crate::{constants::DST, errors::BLSError, pubkey::PubKey, traits::Verifiable};

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct BLSSignature {
    pub inner: FixedVector<u8, U96>,
}

impl Serialize for BLSSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let val = format!("0x{}", hex::encode(self.inner.as_ssz_bytes()));
        serializer.serialize_str(&val)
    }
}

impl<'de> Deserialize<'de> for BLSSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let result: String = Deserialize::deserialize(deserializer)?;
        let result = hex::decode(&result).map_err(serde::de::Error::custom)?;
        Ok(Self {
            inner: FixedVector::from(result),
        })
    }
}

impl BLSSignature {
    pub fn to_bytes(&self) -> &[u8] {
        self.inner.iter().as_slice()
    }

    pub fn to_blst_signature(&self) -> Result<BlstSignature, BLSError> {
        BlstSignature::from_bytes(&self.inner).map_err(BLSError::from)
    }
}

impl TryFrom<BlstSignature> for BLSSignature {
    type Error = BLSError;

    fn try_from(value: BlstSignature) -> Result<Self, Self::Error> {
        Ok(BLSSignature {
            inner: FixedVector::new(value.to_bytes().to_vec())
                .map_err(|_| BLSError::InvalidSignature)?,
        })
    }
}

impl Verifiable for BLSSignature {
    type Error = BLSError;

    fn verify(&self, pubkey: &PubKey, message: &[u8]) -> Result<bool, BLSError> {
        let signature = self.to_blst_signature()?;
        let public_key = pubkey.to_blst_pubkey()?;

        Ok(
            signature.verify(true, message, DST, &[], &public_key, false)
                == BLST_ERROR::BLST_SUCCESS,
        )
    }

    fn fast_aggregate_verify<'a, P>(&self, pubkeys: P, message: &[u8]) -> Result<bool, BLSError>
    where
        P: AsRef<[&'a PubKey]>,
    {
        let signature = self.to_blst_signature()?;
        let public_keys = pubkeys
            .as_ref()
            .iter()
            .map(|key| key.to_blst_pubkey())
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate =
            BlstAggregatePublicKey::aggregate(&public_keys.iter().collect::<Vec<_>>(), true)
                .map_err(BLSError::from)?;

        Ok(signature.verify(
            true,
            message,
            DST,
            &[],
            &aggregate.to_public_key(),
            false,
        ) == BLST_ERROR::BLST_SUCCESS)
    }
}

/// Aggregate a non-empty set of signatures over the same message.
pub fn aggregate(signatures: &[&BLSSignature]) -> Result<BLSSignature, BLSError> {
    let signatures = signatures
        .iter()
        .map(|signature| signature.to_blst_signature())
        .collect::<Result<Vec<_>, _>>()?;
    let aggregate = blst::min_pk::AggregateSignature::aggregate(
        &signatures.iter().collect::<Vec<_>>(),
        true,
    )
    .map_err(BLSError::from)?;
    BLSSignature::try_from(aggregate.to_signature())
}

#[cfg(test)]
mod tests {
    use crate::{PrivateKey, traits::Signable, traits::Verifiable};

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = PrivateKey::from_seed(&[1u8; 32]).unwrap();
        let pubkey = key.public_key().unwrap();
        let message = b"hello beacon";

        let signature = key.sign(message).unwrap();
        assert!(signature.verify(&pubkey, message).unwrap());
        assert!(!signature.verify(&pubkey, b"other message").unwrap());
    }

    #[test]
    fn fast_aggregate_verify_requires_all_signers() {
        let key_1 = PrivateKey::from_seed(&[2u8; 32]).unwrap();
        let key_2 = PrivateKey::from_seed(&[3u8; 32]).unwrap();
        let pubkey_1 = key_1.public_key().unwrap();
        let pubkey_2 = key_2.public_key().unwrap();
        let message = b"aggregate me";

        let aggregate = crate::signature::aggregate(&[
            &key_1.sign(message).unwrap(),
            &key_2.sign(message).unwrap(),
        ])
        .unwrap();

        assert!(
            aggregate
                .fast_aggregate_verify([&pubkey_1, &pubkey_2], message)
                .unwrap()
        );
        assert!(
            !aggregate
                .fast_aggregate_verify([&pubkey_1], message)
                .unwrap()
        );
    }
}
