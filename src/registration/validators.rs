use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use time::{Date, Month};

lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"^\s*([0-9]{1,2})\s*\.\s*([0-9]{1,2})\s*\.\s*([0-9]{4})\s*$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{3,15}$").unwrap();
    static ref DOCUMENT_DIGITS_RE: Regex = Regex::new(r"^[0-9]{9}$").unwrap();
}

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// How strictly phone numbers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhonePolicy {
    /// Optional leading `+` followed by 3-15 digits, whitespace ignored.
    #[default]
    Digits,
    NonEmpty,
}

impl FromStr for PhonePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digits" => Ok(Self::Digits),
            "non-empty" | "nonempty" => Ok(Self::NonEmpty),
            other => anyhow::bail!("unknown phone policy '{other}' (expected digits|non-empty)"),
        }
    }
}

/// How strictly identity document numbers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentPolicy {
    #[default]
    FreeText,
    NineDigits,
}

impl FromStr for DocumentPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free-text" | "freetext" => Ok(Self::FreeText),
            "nine-digits" | "9-digits" => Ok(Self::NineDigits),
            other => {
                anyhow::bail!("unknown document policy '{other}' (expected free-text|nine-digits)")
            }
        }
    }
}

/// Field policies that differ between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldRules {
    pub phone: PhonePolicy,
    pub document: DocumentPolicy,
}

/// Parses `D. M. YYYY` (whitespace around the dots optional) into a calendar date.
pub fn parse_date(text: &str) -> Option<Date> {
    let caps = DATE_RE.captures(text)?;
    let day: u8 = caps[1].parse().ok()?;
    let month: u8 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

pub fn validate_date(text: &str) -> bool {
    parse_date(text).is_some()
}

pub fn validate_email(text: &str) -> bool {
    EMAIL_RE.is_match(text.trim())
}

pub fn validate_phone(text: &str, policy: PhonePolicy) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match policy {
        PhonePolicy::NonEmpty => !compact.is_empty(),
        PhonePolicy::Digits => PHONE_RE.is_match(&compact),
    }
}

pub fn validate_document(text: &str, policy: DocumentPolicy) -> bool {
    let text = text.trim();
    match policy {
        DocumentPolicy::FreeText => !text.is_empty(),
        DocumentPolicy::NineDigits => DOCUMENT_DIGITS_RE.is_match(text),
    }
}

/// Formats a date in the canonical `D. M. YYYY` form.
pub fn format_date(date: Date) -> String {
    format!("{}. {}. {}", date.day(), u8::from(date.month()), date.year())
}

/// Best-effort rewrite of date text into `D. M. YYYY`.
///
/// Works on text that is not a valid date too, so error messages can echo
/// the normalised form. Text that does not split into three dot-separated
/// tokens is returned trimmed but otherwise untouched.
pub fn canonical_date(text: &str) -> String {
    let trimmed = text.trim();
    let parts: Vec<&str> = trimmed.split('.').map(str::trim).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return trimmed.to_string();
    }
    format!(
        "{}. {}. {}",
        strip_leading_zeros(parts[0]),
        strip_leading_zeros(parts[1]),
        parts[2]
    )
}

fn strip_leading_zeros(token: &str) -> &str {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return token;
    }
    match token.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    }
}
