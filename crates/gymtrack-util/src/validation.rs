//! Account form validation: email, phone numbers, password strength

use regex::Regex;
use std::sync::LazyLock;

use crate::{GymError, Result};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid email regex"));
static UPPER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static SPECIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':"\\|,.<>/?]"#).expect("valid special regex")
});

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Dialing prefix plus the national number length it expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryCode {
    pub code: &'static str,
    pub name: &'static str,
    pub max_length: usize,
}

/// Supported dialing prefixes; the first one is the default
pub const COUNTRY_CODES: [CountryCode; 4] = [
    CountryCode { code: "+977", name: "Nepal", max_length: 10 },
    CountryCode { code: "+91", name: "India", max_length: 10 },
    CountryCode { code: "+1", name: "USA", max_length: 10 },
    CountryCode { code: "+44", name: "UK", max_length: 10 },
];

impl CountryCode {
    /// Look up a prefix such as `"+91"`
    pub fn find(code: &str) -> Option<CountryCode> {
        COUNTRY_CODES.iter().copied().find(|c| c.code == code)
    }

    /// Full international number for a locally formatted phone string
    pub fn full_number(&self, phone: &str) -> String {
        format!("{}{}", self.code, digits_only(phone))
    }
}

impl Default for CountryCode {
    fn default() -> Self {
        COUNTRY_CODES[0]
    }
}

pub fn is_email_valid(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A phone number is valid when it has exactly the country's digit count
pub fn is_valid_phone(phone: &str, max_length: usize) -> bool {
    digits_only(phone).len() == max_length
}

/// Format as `XXX-XXX-XXXX`, dropping non-digits and anything past ten digits
pub fn format_phone(value: &str) -> String {
    let digits: String = digits_only(value).chars().take(10).collect();

    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("{}-{}", &digits[..3], &digits[3..]),
        _ => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Individual password requirements, in the order they are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    Length,
    Uppercase,
    Lowercase,
    Number,
    Special,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::Length,
        PasswordRule::Uppercase,
        PasswordRule::Lowercase,
        PasswordRule::Number,
        PasswordRule::Special,
    ];

    pub fn is_met(&self, password: &str) -> bool {
        match self {
            PasswordRule::Length => password.chars().count() >= MIN_PASSWORD_LEN,
            PasswordRule::Uppercase => UPPER_RE.is_match(password),
            PasswordRule::Lowercase => LOWER_RE.is_match(password),
            PasswordRule::Number => DIGIT_RE.is_match(password),
            PasswordRule::Special => SPECIAL_RE.is_match(password),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::Length => "Password must be at least 8 characters long.",
            PasswordRule::Uppercase => "Password must contain at least one uppercase letter.",
            PasswordRule::Lowercase => "Password must contain at least one lowercase letter.",
            PasswordRule::Number => "Password must contain at least one number.",
            PasswordRule::Special => {
                "Password must contain at least one special character (!@#$%^&* etc.)."
            }
        }
    }
}

/// Strength label derived from how many rules a password meets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    VeryWeak,
    Weak,
    Good,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    pub fn from_score(score: usize) -> Self {
        match score {
            5.. => PasswordStrength::VeryStrong,
            4 => PasswordStrength::Strong,
            3 => PasswordStrength::Good,
            2 => PasswordStrength::Weak,
            _ => PasswordStrength::VeryWeak,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PasswordStrength::VeryWeak => "Very Weak",
            PasswordStrength::Weak => "Weak",
            PasswordStrength::Good => "Good",
            PasswordStrength::Strong => "Strong",
            PasswordStrength::VeryStrong => "Very Strong",
        }
    }
}

/// Rule-by-rule report for a candidate password
#[derive(Debug, Clone)]
pub struct PasswordReport {
    pub unmet: Vec<PasswordRule>,
    pub score: usize,
    pub strength: PasswordStrength,
}

pub fn check_password_strength(password: &str) -> PasswordReport {
    let unmet: Vec<PasswordRule> = PasswordRule::ALL
        .iter()
        .copied()
        .filter(|rule| !rule.is_met(password))
        .collect();
    let score = PasswordRule::ALL.len() - unmet.len();

    PasswordReport {
        unmet,
        score,
        strength: PasswordStrength::from_score(score),
    }
}

/// Fails with the message of the first unmet rule
pub fn validate_password(password: &str) -> Result<()> {
    match check_password_strength(password).unmet.first() {
        Some(rule) => Err(GymError::validation(rule.message())),
        None => Ok(()),
    }
}
