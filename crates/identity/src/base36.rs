//! Base-36 codec (`0-9` then `A-Z`).
//!
//! Encoding always produces upper-case digits. Decoding accepts either case, so
//! hand-typed sequences like `00a` resolve to the same value as `00A`.

use crate::error::{AllocationError, AllocationResult};

pub const RADIX: u32 = 36;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode a non-negative integer. `encode(0)` is `"0"`.
pub fn encode(n: i64) -> AllocationResult<String> {
    if n < 0 {
        return Err(AllocationError::invalid_argument(format!(
            "cannot base-36 encode negative value {n}"
        )));
    }

    if n == 0 {
        return Ok("0".to_string());
    }

    // i64::MAX needs 13 base-36 digits.
    let mut buf = [0u8; 13];
    let mut pos = buf.len();
    let mut rest = n as u64;
    while rest != 0 {
        pos -= 1;
        buf[pos] = ALPHABET[(rest % RADIX as u64) as usize];
        rest /= RADIX as u64;
    }

    Ok(buf[pos..].iter().map(|&b| b as char).collect())
}

/// Decode a base-36 string (case-insensitive).
pub fn decode(s: &str) -> AllocationResult<i64> {
    if s.is_empty() {
        return Err(AllocationError::invalid_argument("cannot base-36 decode empty string"));
    }

    s.chars().try_fold(0i64, |acc, c| {
        let digit = c.to_digit(RADIX).ok_or_else(|| {
            AllocationError::invalid_argument(format!("'{c}' is not a base-36 digit in '{s}'"))
        })?;
        acc.checked_mul(RADIX as i64)
            .and_then(|v| v.checked_add(digit as i64))
            .ok_or_else(|| AllocationError::invalid_argument(format!("'{s}' overflows i64")))
    })
}
