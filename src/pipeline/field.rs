//! Aleo field literal encoding.
//!
//! Market ids live on-chain as field elements. Human-readable titles are
//! packed into a field by taking the first 31 bytes of UTF-8 (a field holds
//! just under 32 bytes) and reading them as a big-endian integer.

use num_bigint::BigUint;

const MAX_FIELD_BYTES: usize = 31;

/// Encode a string as a field literal, e.g. `"hi"` -> `"26729field"`.
/// Input longer than 31 bytes is truncated, matching the on-chain derivation.
pub fn string_to_field(s: &str) -> String {
    let bytes = s.as_bytes();
    let bytes = &bytes[..bytes.len().min(MAX_FIELD_BYTES)];
    let n = BigUint::from_bytes_be(bytes);
    format!("{n}field")
}

/// Decode a field literal back to the string it packs, when it is valid
/// UTF-8. Returns `None` for malformed literals or non-text fields.
pub fn field_to_string(field: &str) -> Option<String> {
    let digits = field.strip_suffix("field")?;
    let n = BigUint::parse_bytes(digits.as_bytes(), 10)?;
    String::from_utf8(n.to_bytes_be()).ok()
}

/// A field literal is one or more decimal digits followed by `field`.
pub fn is_field_literal(s: &str) -> bool {
    match s.strip_suffix("field") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
