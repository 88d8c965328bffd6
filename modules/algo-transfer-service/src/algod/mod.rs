//! Chain client abstraction
//!
//! Everything the lifecycle core needs from the network goes through the
//! [`ChainClient`] trait, so the submission and reconciliation paths can run
//! against a real algod node ([`AlgodClient`]) or a scripted fake in tests.

mod client;
pub mod codec;
pub mod mnemonic;
pub mod transaction;

pub use client::AlgodClient;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};

use crate::error::ChainError;

/// Signing account recovered from a mnemonic.
#[derive(Clone)]
pub struct Account {
    signing_key: SigningKey,
    address: String,
}

impl Account {
    pub fn from_seed(seed: [u8; mnemonic::SEED_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let address = codec::encode_address(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn from_mnemonic(phrase: &str) -> Result<Self, ChainError> {
        Ok(Self::from_seed(mnemonic::to_seed(phrase)?))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; codec::PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    #[cfg(test)]
    pub fn mnemonic(&self) -> String {
        mnemonic::from_seed(&self.signing_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Confirmation observed while waiting on a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub confirmed_round: u64,
}

/// Payment fields reported by the node for a known transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDetail {
    pub sender: String,
    pub receiver: String,
    /// Amount in microAlgos.
    pub amount: u64,
    pub note: Option<String>,
}

/// What the node currently knows about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTxStatus {
    /// Set once the transaction is included in a round.
    pub confirmed_round: Option<u64>,
    pub pool_error: Option<String>,
    pub transfer: Option<TransferDetail>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Check the address format and checksum.
    fn validate_address(&self, address: &str) -> bool {
        codec::is_valid_address(address)
    }

    /// Check that `tx_id` is a well-formed transaction id.
    fn validate_tx_id(&self, tx_id: &str) -> bool {
        codec::is_valid_transaction_id(tx_id)
    }

    /// Recover the signing account from a 25-word mnemonic.
    fn recover_signer(&self, secret: &str) -> Result<Account, ChainError> {
        Account::from_mnemonic(secret)
    }

    /// Build, sign and submit a payment. Returns the transaction id.
    async fn build_and_broadcast(
        &self,
        signer: &Account,
        recipient: &str,
        amount: u64,
        note: Option<&str>,
    ) -> Result<String, ChainError>;

    /// Wait up to `max_rounds` rounds for the transaction to be included.
    ///
    /// Fails with [`ChainError::Timeout`] when the bound is reached.
    async fn await_confirmation(
        &self,
        tx_id: &str,
        max_rounds: u64,
    ) -> Result<Confirmation, ChainError>;

    /// Look the transaction up. Unknown ids fail with [`ChainError::NotFound`].
    async fn query_status(&self, tx_id: &str) -> Result<ChainTxStatus, ChainError>;

    /// Human-readable endpoint, for status reporting.
    fn endpoint(&self) -> String;
}
