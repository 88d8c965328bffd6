//! 25-word Algorand mnemonics.
//!
//! The first 24 words carry the 32-byte Ed25519 seed as little-endian 11-bit
//! groups over the BIP-39 English word list; the 25th word is a checksum taken
//! from the first two bytes of SHA-512/256(seed).

use bip39::Language;

use super::codec::sha512_256;
use crate::error::ChainError;

pub const MNEMONIC_WORDS: usize = 25;
pub const SEED_LENGTH: usize = 32;

fn to_u11(bytes: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(bytes.len() * 8 / 11 + 1);
    let mut acc: u32 = 0;
    let mut acc_bits = 0u32;
    for &byte in bytes {
        acc |= (byte as u32) << acc_bits;
        acc_bits += 8;
        if acc_bits >= 11 {
            out.push((acc & 0x7ff) as u16);
            acc >>= 11;
            acc_bits -= 11;
        }
    }
    if acc_bits > 0 {
        out.push(acc as u16);
    }
    out
}

fn from_u11(groups: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(groups.len() * 11 / 8 + 1);
    let mut acc: u32 = 0;
    let mut acc_bits = 0u32;
    for &group in groups {
        acc |= (group as u32) << acc_bits;
        acc_bits += 11;
        while acc_bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        out.push(acc as u8);
    }
    out
}

fn checksum_index(seed: &[u8]) -> u16 {
    let digest = sha512_256(seed);
    to_u11(&digest[..2])[0]
}

#[cfg(test)]
pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> String {
    let words = Language::English.word_list();
    let mut groups = to_u11(seed);
    groups.push(checksum_index(seed));
    groups
        .iter()
        .map(|&g| words[g as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn to_seed(mnemonic: &str) -> Result<[u8; SEED_LENGTH], ChainError> {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if words.len() != MNEMONIC_WORDS {
        return Err(ChainError::InvalidSecret(format!(
            "expected {} words, got {}",
            MNEMONIC_WORDS,
            words.len()
        )));
    }

    let mut groups = Vec::with_capacity(MNEMONIC_WORDS);
    for word in &words {
        let index = Language::English
            .find_word(&word.to_lowercase())
            .ok_or_else(|| ChainError::InvalidSecret(format!("unknown word '{}'", word)))?;
        groups.push(index);
    }

    let checksum = groups.pop().unwrap_or_default();
    let mut bytes = from_u11(&groups);
    // 24 groups pack into 33 bytes; the last one only holds padding
    if bytes.len() != SEED_LENGTH + 1 || bytes[SEED_LENGTH] != 0 {
        return Err(ChainError::InvalidSecret("failed to decode mnemonic".to_string()));
    }
    bytes.truncate(SEED_LENGTH);

    if checksum_index(&bytes) != checksum {
        return Err(ChainError::InvalidSecret("checksum mismatch".to_string()));
    }

    bytes
        .try_into()
        .map_err(|_| ChainError::InvalidSecret("failed to decode mnemonic".to_string()))
}
