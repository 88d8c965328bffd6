//! Algorand address and transaction id encodings.

use algo_transfer_types::TX_ID_LENGTH;
use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const ADDRESS_LENGTH: usize = 58;
const CHECKSUM_LENGTH: usize = 4;

pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    Sha512_256::digest(data).into()
}

/// RFC 4648 base32 without padding.
pub fn base32_encode(data: &[u8]) -> String {
    BASE32_NOPAD.encode(data)
}

/// Inverse of [`base32_encode`]. Rejects padding, lowercase and non-zero trailing bits.
pub fn base32_decode(text: &str) -> Option<Vec<u8>> {
    BASE32_NOPAD.decode(text.as_bytes()).ok()
}

/// Encode a public key as a checksummed Algorand address.
pub fn encode_address(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    let digest = sha512_256(public_key);
    let mut bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
    bytes.extend_from_slice(public_key);
    bytes.extend_from_slice(&digest[digest.len() - CHECKSUM_LENGTH..]);
    base32_encode(&bytes)
}

/// Decode an address back to its public key, verifying the checksum.
pub fn decode_address(address: &str) -> Option<[u8; PUBLIC_KEY_LENGTH]> {
    if address.len() != ADDRESS_LENGTH {
        return None;
    }
    let bytes = base32_decode(address)?;
    if bytes.len() != PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH {
        return None;
    }
    let (key, checksum) = bytes.split_at(PUBLIC_KEY_LENGTH);
    let digest = sha512_256(key);
    if &digest[digest.len() - CHECKSUM_LENGTH..] != checksum {
        return None;
    }
    key.try_into().ok()
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_some()
}

/// A transaction id is the base32 form of a 32-byte digest.
pub fn is_valid_transaction_id(tx_id: &str) -> bool {
    tx_id.len() == TX_ID_LENGTH
        && base32_decode(tx_id).is_some_and(|digest| digest.len() == 32)
}

/// Transaction id for an encoded transaction body.
pub fn transaction_id(encoded_txn: &[u8]) -> String {
    let mut tagged = Vec::with_capacity(encoded_txn.len() + 2);
    tagged.extend_from_slice(b"TX");
    tagged.extend_from_slice(encoded_txn);
    base32_encode(&sha512_256(&tagged))
}
