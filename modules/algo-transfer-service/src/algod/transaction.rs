//! Payment transaction construction and canonical msgpack encoding.

use rmp::encode::{self, ValueWriteError};

use super::Account;
use super::codec::{self, PUBLIC_KEY_LENGTH};
use crate::error::ChainError;

/// Rounds a transaction stays valid for, counted from the first valid round.
pub const VALIDITY_WINDOW: u64 = 1000;

pub const MAX_NOTE_BYTES: usize = 1024;

/// Bytes a signature adds around the transaction body:
/// map header, "sig" key, bin8 header plus 64 bytes, "txn" key.
const SIGNATURE_OVERHEAD: u64 = 75;

/// Network parameters needed to build a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedParams {
    pub fee_per_byte: u64,
    pub min_fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTxn {
    pub sender: [u8; PUBLIC_KEY_LENGTH],
    pub receiver: [u8; PUBLIC_KEY_LENGTH],
    /// Amount in microAlgos.
    pub amount: u64,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    pub note: Vec<u8>,
}

/// A signed transaction ready for `POST /v2/transactions`.
#[derive(Debug, Clone)]
pub struct SignedTxn {
    pub tx_id: String,
    pub bytes: Vec<u8>,
}

enum Field<'a> {
    Uint(u64),
    Str(&'a str),
    /// Variable-length bytes, empty only when there are none.
    Bin(&'a [u8]),
    /// Fixed-size key or hash, empty when all zero.
    Key(&'a [u8]),
}

impl Field<'_> {
    fn is_empty(&self) -> bool {
        match self {
            Field::Uint(v) => *v == 0,
            Field::Str(s) => s.is_empty(),
            Field::Bin(b) => b.is_empty(),
            Field::Key(b) => b.iter().all(|&x| x == 0),
        }
    }
}

fn encode_err(e: ValueWriteError<std::io::Error>) -> ChainError {
    ChainError::Encode(e.to_string())
}

impl PaymentTxn {
    /// Build a payment with the fee derived from `params`.
    pub fn new(
        sender: [u8; PUBLIC_KEY_LENGTH],
        receiver: [u8; PUBLIC_KEY_LENGTH],
        amount: u64,
        note: Option<&str>,
        params: &SuggestedParams,
    ) -> Result<Self, ChainError> {
        let note = note.map(|n| n.as_bytes().to_vec()).unwrap_or_default();
        if note.len() > MAX_NOTE_BYTES {
            return Err(ChainError::Encode(format!(
                "note is {} bytes, limit is {}",
                note.len(),
                MAX_NOTE_BYTES
            )));
        }

        let mut txn = Self {
            sender,
            receiver,
            amount,
            fee: params.fee_per_byte,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            genesis_id: params.genesis_id.clone(),
            genesis_hash: params.genesis_hash,
            note,
        };

        let estimated_size = txn.encode()?.len() as u64 + SIGNATURE_OVERHEAD;
        txn.fee = params
            .fee_per_byte
            .saturating_mul(estimated_size)
            .max(params.min_fee);
        Ok(txn)
    }

    /// Canonical encoding: keys sorted, zero values omitted, byte fields as `bin`.
    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        let fields = [
            ("amt", Field::Uint(self.amount)),
            ("fee", Field::Uint(self.fee)),
            ("fv", Field::Uint(self.first_valid)),
            ("gen", Field::Str(&self.genesis_id)),
            ("gh", Field::Key(&self.genesis_hash)),
            ("lv", Field::Uint(self.last_valid)),
            ("note", Field::Bin(&self.note)),
            ("rcv", Field::Key(&self.receiver)),
            ("snd", Field::Key(&self.sender)),
            ("type", Field::Str("pay")),
        ];
        let present: Vec<_> = fields.iter().filter(|(_, f)| !f.is_empty()).collect();

        let mut buf = Vec::with_capacity(256);
        encode::write_map_len(&mut buf, present.len() as u32).map_err(encode_err)?;
        for (key, field) in present {
            encode::write_str(&mut buf, key).map_err(encode_err)?;
            match field {
                Field::Uint(v) => {
                    encode::write_uint(&mut buf, *v).map_err(encode_err)?;
                }
                Field::Str(s) => encode::write_str(&mut buf, s).map_err(encode_err)?,
                Field::Bin(b) | Field::Key(b) => {
                    encode::write_bin(&mut buf, b).map_err(encode_err)?
                }
            }
        }
        Ok(buf)
    }

    pub fn sign(&self, account: &Account) -> Result<SignedTxn, ChainError> {
        let body = self.encode()?;
        let mut message = Vec::with_capacity(body.len() + 2);
        message.extend_from_slice(b"TX");
        message.extend_from_slice(&body);
        let signature = account.sign(&message);

        let mut bytes = Vec::with_capacity(body.len() + SIGNATURE_OVERHEAD as usize);
        encode::write_map_len(&mut bytes, 2).map_err(encode_err)?;
        encode::write_str(&mut bytes, "sig").map_err(encode_err)?;
        encode::write_bin(&mut bytes, &signature).map_err(encode_err)?;
        encode::write_str(&mut bytes, "txn").map_err(encode_err)?;
        bytes.extend_from_slice(&body);

        Ok(SignedTxn {
            tx_id: codec::transaction_id(&body),
            bytes,
        })
    }
}
