/// Convert an integer amount in base units (e.g. wei) to display units.
pub fn balance_amount(raw: &str, decimals: u32) -> Option<f64> {
    let value = raw.trim().parse::<u128>().ok()?;
    Some(value as f64 / 10f64.powi(decimals as i32))
}

/// Exact decimal rendering of a base-unit amount, trailing zeros removed.
pub fn full_display_balance(raw: &str, decimals: u32) -> Option<String> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    let decimals = decimals as usize;
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        Some(whole.to_string())
    } else {
        Some(format!("{}.{}", whole, fraction))
    }
}
