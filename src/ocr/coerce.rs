//! Turns raw OCR text into typed statistic values.
//!
//! Every function here is total: garbage in gives `Unparsable` out, never a
//! panic or an error. Fallible steps are `Option`-returning attempts tried in
//! a fixed order, first success wins.

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use crate::stats::snapshot::TypedStatValue;

/// Stored for digits-only fields whose OCR text has no digits at all.
///
/// Non-zero so downstream ratios never divide by zero.
pub const DIGITS_FALLBACK: i64 = 1;

/// Expected shape of a field's text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionKind {
    /// Every non-digit is stripped; no digits at all gives [`DIGITS_FALLBACK`]
    DigitsOnly,
    /// Every non-digit is stripped; no digits at all is `Unparsable`
    Digits,
    /// Whole text (thousands separators allowed) must be an integer
    Integer,
    /// `H:M:S`
    Duration,
    /// Number with an optional trailing unit letter (`K`, `M`, `%`, ...)
    Suffixed,
    /// `Attacks reset in 1d 5h 3m` style countdowns
    Countdown,
    /// `Lv. 25` style skill levels
    SkillLevel,
    /// Kept verbatim, trimmed
    FreeText,
}

impl fmt::Display for CoercionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoercionKind::DigitsOnly => "digits-only",
            CoercionKind::Digits => "digits",
            CoercionKind::Integer => "integer",
            CoercionKind::Duration => "duration",
            CoercionKind::Suffixed => "suffixed number",
            CoercionKind::Countdown => "countdown",
            CoercionKind::SkillLevel => "skill level",
            CoercionKind::FreeText => "free text",
        };
        write!(f, "{}", name)
    }
}

/// A single parse strategy over a value token.
type Attempt = fn(&str) -> Option<TypedStatValue>;

/// Strategies for suffixed numbers, in priority order.
const SUFFIXED_ATTEMPTS: [(&str, Attempt); 3] = [
    ("integer", parse_integer_token),
    ("float", parse_float_token),
    ("unit suffix", parse_unit_suffixed),
];

/// Coerces `raw` as `kind`, logging the outcome against `field`.
pub fn coerce_field(field: &str, kind: CoercionKind, raw: &str) -> TypedStatValue {
    let value = coerce(kind, raw);

    if value.is_unparsable() {
        warn!(
            "{}: could not parse OCR text {:?} as {}",
            field,
            raw.trim(),
            kind
        );
    } else if kind == CoercionKind::DigitsOnly && digits_of(raw).is_empty() {
        warn!(
            "{}: no digits in OCR text {:?}, using fallback {}",
            field,
            raw.trim(),
            DIGITS_FALLBACK
        );
    } else {
        info!("{}: parsed {:?} -> {}", field, raw.trim(), value);
    }

    value
}

/// Coerces `raw` as `kind`.
pub fn coerce(kind: CoercionKind, raw: &str) -> TypedStatValue {
    match kind {
        CoercionKind::DigitsOnly => coerce_digits(raw),
        CoercionKind::Digits => coerce_strict_digits(raw),
        CoercionKind::Integer => coerce_integer(raw),
        CoercionKind::Duration => coerce_duration(raw),
        CoercionKind::Suffixed => coerce_suffixed(raw),
        CoercionKind::Countdown => coerce_countdown(raw),
        CoercionKind::SkillLevel => coerce_skill_level(raw),
        CoercionKind::FreeText => coerce_text(raw),
    }
}

fn digits_of(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn coerce_digits(raw: &str) -> TypedStatValue {
    if digits_of(raw).is_empty() {
        return TypedStatValue::Integer(DIGITS_FALLBACK);
    }
    coerce_strict_digits(raw)
}

/// Like [`coerce_digits`] without the fallback.
pub fn coerce_strict_digits(raw: &str) -> TypedStatValue {
    let digits = digits_of(raw);
    if digits.is_empty() {
        return TypedStatValue::Unparsable;
    }
    // Only overflow can fail here
    digits
        .parse()
        .map(TypedStatValue::Integer)
        .unwrap_or(TypedStatValue::Unparsable)
}

pub fn coerce_integer(raw: &str) -> TypedStatValue {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    parse_integer_token(&cleaned).unwrap_or(TypedStatValue::Unparsable)
}

pub fn coerce_duration(raw: &str) -> TypedStatValue {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() != 3 {
        return TypedStatValue::Unparsable;
    }

    let numbers: Option<Vec<u64>> = parts.iter().map(|p| p.trim().parse().ok()).collect();
    let total = match numbers.as_deref() {
        Some([hours, minutes, seconds]) => hours
            .checked_mul(3600)
            .zip(minutes.checked_mul(60))
            .and_then(|(h, m)| h.checked_add(m))
            .and_then(|hm| hm.checked_add(*seconds)),
        _ => None,
    };
    total
        .map(|secs| TypedStatValue::Duration(Duration::from_secs(secs)))
        .unwrap_or(TypedStatValue::Unparsable)
}

pub fn coerce_suffixed(raw: &str) -> TypedStatValue {
    let Some(token) = value_token(raw) else {
        return TypedStatValue::Unparsable;
    };

    SUFFIXED_ATTEMPTS
        .iter()
        .find_map(|(label, attempt)| {
            let value = attempt(&token)?;
            debug!("{:?} read as {}", token, label);
            Some(value)
        })
        .unwrap_or(TypedStatValue::Unparsable)
}

/// Picks the value part of a `Label: value` line.
///
/// With a colon, everything after the last colon (spaces removed); otherwise
/// the last whitespace-delimited token.
fn value_token(raw: &str) -> Option<String> {
    let text = raw.trim();
    let token: String = match text.rsplit_once(':') {
        Some((_, after)) => after.chars().filter(|c| !c.is_whitespace()).collect(),
        None => text.split_whitespace().last()?.to_string(),
    };
    (!token.is_empty()).then_some(token)
}

fn parse_integer_token(token: &str) -> Option<TypedStatValue> {
    token.parse::<i64>().ok().map(TypedStatValue::Integer)
}

fn parse_float_token(token: &str) -> Option<TypedStatValue> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(TypedStatValue::Number)
}

/// Retries the integer and float parses with the last character taken off
/// as a unit suffix.
fn parse_unit_suffixed(token: &str) -> Option<TypedStatValue> {
    let unit = token.chars().last()?;
    if unit.is_ascii_digit() {
        return None;
    }

    let number = &token[..token.len() - unit.len_utf8()];
    let value = number
        .parse::<i64>()
        .map(|v| v as f64)
        .ok()
        .or_else(|| number.parse::<f64>().ok().filter(|v| v.is_finite()))?;

    Some(TypedStatValue::Quantity {
        value,
        unit,
        text: token.to_string(),
    })
}

fn countdown_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+)([dhms])$").ok())
        .as_ref()
}

/// Sums every `<n><unit>` token (units d, h, m, s) in the text.
pub fn coerce_countdown(raw: &str) -> TypedStatValue {
    let Some(pattern) = countdown_regex() else {
        return TypedStatValue::Unparsable;
    };
    let mut total: Option<u64> = None;

    for token in raw.split_whitespace() {
        let token = token
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase();
        let Some(caps) = pattern.captures(&token) else {
            continue;
        };
        let Ok(amount) = caps[1].parse::<u64>() else {
            continue;
        };
        let unit_secs = match &caps[2] {
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        let Some(secs) = amount
            .checked_mul(unit_secs)
            .and_then(|s| s.checked_add(total.unwrap_or(0)))
        else {
            return TypedStatValue::Unparsable;
        };
        total = Some(secs);
    }

    total
        .map(|secs| TypedStatValue::Duration(Duration::from_secs(secs)))
        .unwrap_or(TypedStatValue::Unparsable)
}

/// `Lv. 25` / `Lv, 25` -> 25.
pub fn coerce_skill_level(raw: &str) -> TypedStatValue {
    let text = raw.trim();
    let level = if let Some((_, after)) = text.split_once(',') {
        after
    } else if let Some((_, after)) = text.split_once('.') {
        after
    } else {
        text
    };

    level
        .trim()
        .parse::<i64>()
        .map(TypedStatValue::Integer)
        .unwrap_or(TypedStatValue::Unparsable)
}

/// Empty text is a recognition failure, not an empty value.
pub fn coerce_text(raw: &str) -> TypedStatValue {
    let text = raw.trim();
    if text.is_empty() {
        TypedStatValue::Unparsable
    } else {
        TypedStatValue::Text(text.to_string())
    }
}
