use rust_decimal::Decimal;

/// Amount rounded to cents with thousands separators, e.g. `-1234.5` → `"-1,234.50"`.
pub(crate) fn format_amount(val: Decimal) -> String {
    let cents = format!("{:.2}", val.abs().round_dp(2));
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + 4);
    if val.is_sign_negative() && !val.is_zero() {
        grouped.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped.push('.');
    grouped.push_str(frac);
    grouped
}

/// At most `max` characters, ending in "…" when cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    match max {
        0 => String::new(),
        _ => s.chars().take(max - 1).chain(std::iter::once('…')).collect(),
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
