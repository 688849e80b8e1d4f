//! Minimal Solidity ABI encoding for the handful of calls a smart account makes.

use sha3::{Digest, Keccak256};

use crate::shared::Address;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A single ABI argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    Word([u8; 32]),
    Bytes(Vec<u8>),
}

pub fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.as_bytes());
    word
}

pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// `abi.encode(tokens...)`: static heads, then dynamic tails.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(a) => head.extend_from_slice(&address_word(a)),
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Word(w) => head.extend_from_slice(w),
            Token::Bytes(bytes) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(bytes.len() as u128));
                tail.extend_from_slice(bytes);
                let pad = (32 - bytes.len() % 32) % 32;
                tail.resize(tail.len() + pad, 0);
            }
        }
    }
    head.extend(tail);
    head
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(tokens));
    out
}

/// Read an address out of a single returned word.
pub fn decode_address(data: &[u8]) -> Option<Address> {
    if data.len() < 32 {
        return None;
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&data[12..32]);
    Some(Address::from_bytes(bytes))
}

/// Read a uint out of a single returned word. `None` if it exceeds `u128`.
pub fn decode_uint(data: &[u8]) -> Option<u128> {
    if data.len() < 32 || data[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&data[16..32]);
    Some(u128::from_be_bytes(bytes))
}

// ─── Account calls ───────────────────────────────────────────────────────────

/// `factory.getAddress(admin, data)`
pub fn get_address_call(admin: &Address, data: &[u8]) -> Vec<u8> {
    encode_call(
        "getAddress(address,bytes)",
        &[Token::Address(admin.clone()), Token::Bytes(data.to_vec())],
    )
}

/// `factory.createAccount(admin, data)`
pub fn create_account_call(admin: &Address, data: &[u8]) -> Vec<u8> {
    encode_call(
        "createAccount(address,bytes)",
        &[Token::Address(admin.clone()), Token::Bytes(data.to_vec())],
    )
}

/// `account.execute(to, value, data)`
pub fn execute_call(to: &Address, value: u128, data: &[u8]) -> Vec<u8> {
    encode_call(
        "execute(address,uint256,bytes)",
        &[
            Token::Address(to.clone()),
            Token::Uint(value),
            Token::Bytes(data.to_vec()),
        ],
    )
}

/// `entryPoint.getNonce(sender, key)`
pub fn get_nonce_call(sender: &Address, key: u128) -> Vec<u8> {
    encode_call(
        "getNonce(address,uint192)",
        &[Token::Address(sender.clone()), Token::Uint(key)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("execute(address,uint256,bytes)"), [0xb6, 0x1d, 0x27, 0xf6]);
        assert_eq!(selector("getNonce(address,uint192)"), [0x35, 0x56, 0x7e, 0x1a]);
        assert_eq!(selector("getAddress(address,bytes)"), [0x88, 0x78, 0xed, 0x33]);
        assert_eq!(selector("createAccount(address,bytes)"), [0xd8, 0xfd, 0x8f, 0x44]);
    }

    #[test]
    fn test_get_address_with_empty_data() {
        let call = get_address_call(&addr("0x3333333333333333333333333333333333333333"), &[]);
        assert_eq!(
            hex::encode(call),
            concat!(
                "8878ed33",
                "0000000000000000000000003333333333333333333333333333333333333333",
                "0000000000000000000000000000000000000000000000000000000000000040",
                "0000000000000000000000000000000000000000000000000000000000000000",
            )
        );
    }

    #[test]
    fn test_execute_pads_dynamic_bytes() {
        let call = execute_call(
            &addr("0x2222222222222222222222222222222222222222"),
            0,
            &[0xde, 0xad, 0xbe, 0xef],
        );
        assert_eq!(
            hex::encode(call),
            concat!(
                "b61d27f6",
                "0000000000000000000000002222222222222222222222222222222222222222",
                "0000000000000000000000000000000000000000000000000000000000000000",
                "0000000000000000000000000000000000000000000000000000000000000060",
                "0000000000000000000000000000000000000000000000000000000000000004",
                "deadbeef00000000000000000000000000000000000000000000000000000000",
            )
        );
    }

    #[test]
    fn test_decode_words() {
        let word = address_word(&addr("0x2222222222222222222222222222222222222222"));
        assert_eq!(
            decode_address(&word),
            Some(addr("0x2222222222222222222222222222222222222222"))
        );
        assert_eq!(decode_uint(&uint_word(42)), Some(42));
        assert_eq!(decode_uint(&[0xff; 32]), None);
        assert_eq!(decode_address(&[0u8; 8]), None);
    }
}
