//! `0x`-prefixed hex helpers for JSON-RPC quantities and data.

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", ::hex::encode(bytes))
}

/// Encode an integer as a JSON-RPC quantity (`0x0`, `0x1a`, no leading zeros).
pub fn quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Decode `0x`-prefixed hex data. `"0x"` decodes to an empty vec.
pub fn decode(s: &str) -> Result<Vec<u8>, String> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    if body.len() % 2 == 1 {
        return ::hex::decode(format!("0{}", body)).map_err(|e| e.to_string());
    }
    ::hex::decode(body).map_err(|e| e.to_string())
}

pub fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16).map_err(|e| format!("{}: {}", s, e))
}

pub fn parse_hex_u128(s: &str) -> Result<u128, String> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    let trimmed = body.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(trimmed, 16).map_err(|e| format!("{}: {}", s, e))
}
