//! Amount formatting
//!
//! Totals are kept in nanotons and rendered in TON with two decimals,
//! rounding half to even, integer digits grouped by thousands. Jetton
//! amounts follow the same rules at the jetton's own decimals.

use rust_decimal::{Decimal, RoundingStrategy};

/// Render nanotons as `1,234.57`
pub fn format_ton(nanotons: u128) -> String {
    format_units(nanotons, 9)
}

/// Render an integer amount with `decimals` implied fraction digits
pub fn format_units(amount: u128, decimals: u32) -> String {
    let whole = || {
        let divisor = 10u128.checked_pow(decimals).unwrap_or(u128::MAX);
        format!("{}.00", group_digits(&(amount / divisor).to_string()))
    };
    let Ok(units) = i128::try_from(amount) else {
        return whole();
    };
    match Decimal::try_from_i128_with_scale(units, decimals) {
        Ok(value) => group_thousands(
            value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
        ),
        // Beyond Decimal's 96-bit mantissa or 28-digit scale
        Err(_) => whole(),
    }
}

fn group_thousands(value: Decimal) -> String {
    let text = format!("{:.2}", value);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{}.{}", group_digits(int_part), frac_part)
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
