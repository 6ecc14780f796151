//! Key normalization for identity fields.
//!
//! Each source formats phones, cards and names its own way. These functions
//! reduce a raw field to the string that is compared for exact equality, or
//! `None` when the field carries nothing usable.

/// Values sources use to mean "no data".
const PLACEHOLDERS: &[&str] = &["", "\\n", "nan", "none", "null", "-", "--", "未知"];

fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

/// Trimmed, non-placeholder form of a raw field.
pub fn clean(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    if is_placeholder(value) {
        None
    } else {
        Some(value)
    }
}

/// Digits only, with country prefix and landline area code removed.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let value = clean(raw)?;
    let mut digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("0086") {
        digits.drain(..4);
    } else if digits.len() == 13 && digits.starts_with("86") {
        digits.drain(..2);
    }

    // Landline with area code: 010/02x are three digits, the rest four.
    if digits.starts_with('0') && digits.len() >= 10 {
        let area = if digits.starts_with("01") || digits.starts_with("02") { 3 } else { 4 };
        digits.drain(..area);
    }

    if digits.len() < 5 {
        None
    } else {
        Some(digits)
    }
}

/// Account or card number without separators, upper-cased.
pub fn normalize_account(raw: Option<&str>) -> Option<String> {
    let value = clean(raw)?;
    let account: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect();
    if account.chars().count() < 4 {
        None
    } else {
        Some(account)
    }
}

/// Name key: internal whitespace collapsed, ASCII lower-cased.
pub fn normalize_name(raw: Option<&str>) -> Option<String> {
    let value = clean(raw)?;
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed.to_ascii_lowercase())
}

/// Display form of a name: trimmed, internal whitespace collapsed, case kept.
pub fn display_name(raw: Option<&str>) -> Option<String> {
    let value = clean(raw)?;
    Some(value.split_whitespace().collect::<Vec<_>>().join(" "))
}
