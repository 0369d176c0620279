//! Common validation rules for Thai customer data and credentials.

use validator::ValidationError;

fn digits_only(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

/// Validates a 13-digit Thai national ID including its check digit.
///
/// Dashes and spaces are ignored, so `1-1017-00230-70-8` is accepted.
pub fn validate_thai_national_id(value: &str) -> Result<(), ValidationError> {
    let digits = digits_only(value).ok_or_else(|| ValidationError::new("national_id_format"))?;
    if digits.len() != 13 {
        return Err(ValidationError::new("national_id_length"));
    }
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = values[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (13 - i as u32))
        .sum();
    let check = (11 - sum % 11) % 10;
    if check != values[12] {
        return Err(ValidationError::new("national_id_checksum"));
    }
    Ok(())
}

/// Validates a Thai mobile (`06`, `08`, `09` + 8 digits) or landline
/// (`02`-`07` + 7 digits) number. `+66`/`66` may replace the leading zero.
pub fn validate_thai_phone(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let local = if let Some(rest) = trimmed.strip_prefix("+66") {
        format!("0{}", rest)
    } else {
        trimmed.to_string()
    };
    let mut digits = digits_only(&local).ok_or_else(|| ValidationError::new("phone_format"))?;
    if matches!(digits.len(), 10 | 11) && digits.starts_with("66") {
        digits = format!("0{}", &digits[2..]);
    }
    let bytes = digits.as_bytes();
    let valid = match (bytes.len(), bytes.first(), bytes.get(1)) {
        (10, Some(b'0'), Some(b'6' | b'8' | b'9')) => true,
        (9, Some(b'0'), Some(b'2'..=b'7')) => true,
        _ => false,
    };
    if !valid {
        return Err(ValidationError::new("phone_format"));
    }
    Ok(())
}

/// Validates a five-digit Thai postal code with a province prefix of 10-96.
pub fn validate_thai_postal_code(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.len() != 5 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("postal_code_format"));
    }
    let province: u32 = trimmed[..2]
        .parse()
        .map_err(|_| ValidationError::new("postal_code_format"))?;
    if !(10..=96).contains(&province) {
        return Err(ValidationError::new("postal_code_province"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

/// Scores a password from 0 to 5: one point each for length >= 8,
/// length >= 12, mixed case, a digit and a symbol.
pub fn password_score(password: &str) -> u8 {
    let length = password.chars().count();
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    [
        length >= 8,
        length >= 12,
        has_lower && has_upper,
        has_digit,
        has_symbol,
    ]
    .into_iter()
    .filter(|passed| *passed)
    .count() as u8
}

pub fn password_strength(password: &str) -> PasswordStrength {
    match password_score(password) {
        0..=2 => PasswordStrength::Weak,
        3 => PasswordStrength::Fair,
        4 => PasswordStrength::Good,
        _ => PasswordStrength::Strong,
    }
}

/// Requires at least eight characters and a `Fair` score.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(ValidationError::new("password_too_short"));
    }
    if password_strength(password) < PasswordStrength::Fair {
        return Err(ValidationError::new("password_too_weak"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_id_accepts_valid_checksum() {
        assert!(validate_thai_national_id("1101700230708").is_ok());
        assert!(validate_thai_national_id("1-1017-00230-70-8").is_ok());
    }

    #[test]
    fn national_id_rejects_bad_checksum_and_length() {
        let err = validate_thai_national_id("1101700230705").unwrap_err();
        assert_eq!(err.code, "national_id_checksum");
        let err = validate_thai_national_id("110170023070").unwrap_err();
        assert_eq!(err.code, "national_id_length");
        let err = validate_thai_national_id("11017002307A8").unwrap_err();
        assert_eq!(err.code, "national_id_format");
    }

    #[test]
    fn phone_accepts_mobile_landline_and_country_code() {
        assert!(validate_thai_phone("0812345678").is_ok());
        assert!(validate_thai_phone("081-234-5678").is_ok());
        assert!(validate_thai_phone("+66812345678").is_ok());
        assert!(validate_thai_phone("66912345678").is_ok());
        assert!(validate_thai_phone("021234567").is_ok());
        assert!(validate_thai_phone("6621234567").is_ok());
        assert!(validate_thai_phone("+6621234567").is_ok());
    }

    #[test]
    fn phone_rejects_wrong_prefix_or_length() {
        assert!(validate_thai_phone("0112345678").is_err());
        assert!(validate_thai_phone("081234567").is_err());
        assert!(validate_thai_phone("081234567890").is_err());
        assert!(validate_thai_phone("").is_err());
        assert!(validate_thai_phone("08x2345678").is_err());
    }

    #[test]
    fn postal_code_checks_province_prefix() {
        assert!(validate_thai_postal_code("10110").is_ok());
        assert!(validate_thai_postal_code("96000").is_ok());
        assert_eq!(
            validate_thai_postal_code("09999").unwrap_err().code,
            "postal_code_province"
        );
        assert_eq!(
            validate_thai_postal_code("1011").unwrap_err().code,
            "postal_code_format"
        );
    }

    #[test]
    fn password_scoring_counts_each_rule() {
        assert_eq!(password_score(""), 0);
        assert_eq!(password_score("password"), 1);
        assert_eq!(password_score("Password1"), 3);
        assert_eq!(password_score("Password1!"), 4);
        assert_eq!(password_score("LongerPassword1!"), 5);
        assert_eq!(password_strength("password"), PasswordStrength::Weak);
        assert_eq!(password_strength("LongerPassword1!"), PasswordStrength::Strong);
    }

    #[test]
    fn password_validation_requires_length_and_fair_score() {
        assert_eq!(
            validate_password_strength("Ab1!").unwrap_err().code,
            "password_too_short"
        );
        assert_eq!(
            validate_password_strength("password").unwrap_err().code,
            "password_too_weak"
        );
        assert!(validate_password_strength("Password1").is_ok());
    }
}
