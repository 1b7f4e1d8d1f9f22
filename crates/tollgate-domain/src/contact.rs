//! Phone and email normalization, matching helpers and log masking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fewest digits (after the `+`) accepted in a phone number.
pub const MIN_PHONE_DIGITS: usize = 9;
/// E.164 upper bound.
pub const MAX_PHONE_DIGITS: usize = 15;
/// Digits compared when matching phones that differ only in country-code formatting.
pub const PHONE_SUFFIX_DIGITS: usize = 10;

/// Prefix of synthetic phones given to email-only users. Never a valid E.164 number.
pub const PLACEHOLDER_PHONE_PREFIX: &str = "+0000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("phone or email is required")]
    Missing,
    #[error("phone number must be in E.164 format with country code (e.g. +919876543210)")]
    InvalidPhone,
    #[error("invalid email address")]
    InvalidEmail,
}

/// Which kind of identifier a caller is presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContactKind {
    Phone,
    Email,
}

/// A normalized phone or email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Contact {
    Phone(String),
    Email(String),
}

impl Contact {
    /// Normalize `raw` according to `kind`.
    pub fn parse(kind: ContactKind, raw: &str) -> Result<Self, ContactError> {
        match kind {
            ContactKind::Phone => normalize_phone(raw).map(Self::Phone),
            ContactKind::Email => normalize_email(raw).map(Self::Email),
        }
    }

    /// Pick the phone when present, else the email. Blank values count as absent.
    pub fn from_parts(phone: Option<&str>, email: Option<&str>) -> Result<Self, ContactError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.trim().is_empty())
        }
        match (present(phone), present(email)) {
            (Some(phone), _) => normalize_phone(phone).map(Self::Phone),
            (None, Some(email)) => normalize_email(email).map(Self::Email),
            (None, None) => Err(ContactError::Missing),
        }
    }

    pub fn kind(&self) -> ContactKind {
        match self {
            Self::Phone(_) => ContactKind::Phone,
            Self::Email(_) => ContactKind::Email,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(v) | Self::Email(v) => v,
        }
    }

    pub fn masked(&self) -> String {
        match self {
            Self::Phone(v) => mask_phone(v),
            Self::Email(v) => mask_email(v),
        }
    }
}

/// Strip everything except digits and `+`, then require `+` followed by 9..=15 digits
/// with a non-zero first digit.
pub fn normalize_phone(raw: &str) -> Result<String, ContactError> {
    if raw.trim().is_empty() {
        return Err(ContactError::Missing);
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let Some(digits) = cleaned.strip_prefix('+') else {
        return Err(ContactError::InvalidPhone);
    };
    if digits.contains('+')
        || !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
        || digits.starts_with('0')
    {
        return Err(ContactError::InvalidPhone);
    }
    Ok(cleaned)
}

/// Trim and lowercase, then apply a structural `local@domain.tld` check.
pub fn normalize_email(raw: &str) -> Result<String, ContactError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ContactError::Missing);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ContactError::InvalidEmail);
    };
    let valid = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && !email.chars().any(char::is_whitespace);
    if !valid {
        return Err(ContactError::InvalidEmail);
    }
    Ok(email)
}

/// Last ten digits of a normalized phone, if it has that many.
pub fn phone_suffix(phone: &str) -> Option<&str> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (digits.len() >= PHONE_SUFFIX_DIGITS).then(|| &digits[digits.len() - PHONE_SUFFIX_DIGITS..])
}

/// Synthetic, unique phone for a user that signed up by email only.
pub fn placeholder_phone(id: Uuid) -> String {
    format!("{PLACEHOLDER_PHONE_PREFIX}{}", id.simple())
}

pub fn is_placeholder_phone(phone: &str) -> bool {
    phone.starts_with(PLACEHOLDER_PHONE_PREFIX)
}

/// `+919876543210` -> `+91****3210`.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 8 {
        return "****".to_owned();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

/// `alice@example.com` -> `ali***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(3).collect();
            format!("{visible}***@{domain}")
        }
        None => "***".to_owned(),
    }
}
