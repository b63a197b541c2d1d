//! Conversion between human-readable decimal amounts and integer
//! smallest-unit amounts. All on-chain arithmetic happens in smallest
//! units; these helpers exist only at the input and reporting
//! boundaries.

use num_bigint::BigUint;

use crate::error::Error;

/// Parse a decimal string like `"10"` or `"0.5"` into smallest units.
///
/// Exact: no floating point is involved, so `"0.1"` with 18 decimals is
/// precisely `100000000000000000`. Fails if the fractional part has more
/// digits than the token carries.
pub fn parse_units(text: &str, decimals: u8) -> Result<BigUint, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidAmount("empty amount".to_string()));
    }

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::InvalidAmount(format!("not a number: {text}")));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(Error::InvalidAmount(format!("not a number: {text}")));
    }
    if frac_part.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "{text} has more than {decimals} decimal places"
        )));
    }

    // Scale to smallest units: integer digits followed by the fractional
    // digits padded out to `decimals`.
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(if int_part.is_empty() { "0" } else { int_part });
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }

    digits
        .parse::<BigUint>()
        .map_err(|e| Error::InvalidAmount(format!("{text}: {e}")))
}

/// Format a smallest-unit amount with decimal places, trimming trailing
/// zeros after the point.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    if s.len() <= decimals {
        let zeros = decimals - s.len();
        let mut result = String::from("0.");
        result.extend(std::iter::repeat_n('0', zeros));
        result.push_str(&s);
        let trimmed = result.trim_end_matches('0');
        if trimmed.ends_with('.') {
            return format!("{trimmed}0");
        }
        return trimmed.to_string();
    }

    let (integer_part, decimal_part) = s.split_at(s.len() - decimals);
    let trimmed = decimal_part.trim_end_matches('0');
    if trimmed.is_empty() {
        integer_part.to_string()
    } else {
        format!("{integer_part}.{trimmed}")
    }
}
