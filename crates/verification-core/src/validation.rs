//! Sign-up form validators.
//!
//! All checks are pure: malformed input yields `false`, never an error.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Domestic mobile number: `01x`, optional dash, 3-4 digits, optional dash, 4 digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^01[016789]-?\d{3,4}-?\d{4}$").expect("valid phone pattern"));

/// Symbols accepted by the password symbol rule.
const PASSWORD_SYMBOLS: &str = "-+_!@#$%^&*.,? ";

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 20;

/// Outcome of the four password rules, in display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PasswordRules {
    /// 8 to 20 characters
    pub length: bool,
    /// Both an uppercase and a lowercase Latin letter
    pub mixed_case: bool,
    /// At least one digit
    pub digit: bool,
    /// At least one allowed symbol
    pub symbol: bool,
}

impl PasswordRules {
    /// Rule results as an ordered array.
    pub fn as_array(&self) -> [bool; 4] {
        [self.length, self.mixed_case, self.digit, self.symbol]
    }

    /// True when every rule holds.
    pub fn all_satisfied(&self) -> bool {
        self.as_array().iter().all(|ok| *ok)
    }
}

/// Name must contain something other than whitespace.
pub fn validate_name(name: &str) -> bool {
    !name.trim().is_empty()
}

/// Check a domestic mobile number such as `010-1234-5678` or `01012345678`.
pub fn validate_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}

/// Evaluate each password rule independently.
pub fn validate_password_rules(password: &str) -> PasswordRules {
    let len = password.chars().count();

    PasswordRules {
        length: (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len),
        mixed_case: password.chars().any(|c| c.is_ascii_uppercase())
            && password.chars().any(|c| c.is_ascii_lowercase()),
        digit: password.chars().any(|c| c.is_ascii_digit()),
        symbol: password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)),
    }
}

/// Exact, case-sensitive comparison.
pub fn validate_confirm_password(original: &str, confirm: &str) -> bool {
    original == confirm
}
