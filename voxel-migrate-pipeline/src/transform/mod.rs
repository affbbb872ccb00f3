//! Row-level transformation helpers.
//!
//! A transformer turns one legacy row into a `RowOutcome`. Skips and
//! failures are values, not errors, so the row loop never needs a catch-all.
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Result of transforming one legacy row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome<T> {
    Migrate(T),
    Skip(SkipReason),
    Fail(String),
}

/// Why a row was deliberately not migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingRequiredField(&'static str),
    UnresolvedMapping(&'static str),
    InvalidValue(&'static str),
    NoOwnerAvailable,
    AlreadyMigrated,
    DeletedAtSource,
    ForeignKeyMissing(&'static str),
}

impl SkipReason {
    /// Stable counter key, e.g. `missing_required_field:email`.
    pub fn key(&self) -> String {
        match self {
            SkipReason::MissingRequiredField(field) => format!("missing_required_field:{field}"),
            SkipReason::UnresolvedMapping(mapping) => format!("unresolved_mapping:{mapping}"),
            SkipReason::InvalidValue(field) => format!("invalid_value:{field}"),
            SkipReason::NoOwnerAvailable => "no_owner_available".to_string(),
            SkipReason::AlreadyMigrated => "already_migrated".to_string(),
            SkipReason::DeletedAtSource => "deleted_at_source".to_string(),
            SkipReason::ForeignKeyMissing(parent) => format!("foreign_key_missing:{parent}"),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Largest magnitude a `NUMERIC(10, 2)` column holds.
pub fn amount_limit() -> BigDecimal {
    BigDecimal::new(9_999_999_999i64.into(), 2)
}

/// Outcome of bounding an amount to the destination column range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clamp {
    Unchanged(BigDecimal),
    /// In range, but carried more than two decimals.
    Rounded(BigDecimal),
    Clamped(BigDecimal),
}

impl Clamp {
    pub fn value(&self) -> &BigDecimal {
        match self {
            Clamp::Unchanged(value) | Clamp::Rounded(value) | Clamp::Clamped(value) => value,
        }
    }

    pub fn into_value(self) -> BigDecimal {
        match self {
            Clamp::Unchanged(value) | Clamp::Rounded(value) | Clamp::Clamped(value) => value,
        }
    }

    pub fn was_clamped(&self) -> bool {
        matches!(self, Clamp::Clamped(_))
    }

    pub fn was_rounded(&self) -> bool {
        matches!(self, Clamp::Rounded(_))
    }
}

/// Rounds to two decimals and bounds to ±99 999 999.99.
///
/// Idempotent: clamping a clamped value returns it unchanged.
pub fn clamp_amount(value: &BigDecimal) -> Clamp {
    let limit = amount_limit();
    let floor = -limit.clone();
    if *value > limit {
        Clamp::Clamped(limit)
    } else if *value < floor {
        Clamp::Clamped(floor)
    } else {
        let rounded = value.round(2);
        if rounded == *value {
            Clamp::Unchanged(value.clone())
        } else {
            Clamp::Rounded(rounded)
        }
    }
}

/// Result of reading a legacy money column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAmount {
    Absent,
    Invalid,
    Value(BigDecimal),
}

impl ParsedAmount {
    /// The parsed value, or `default` when absent or invalid.
    pub fn or(self, default: BigDecimal) -> BigDecimal {
        match self {
            ParsedAmount::Value(value) => value,
            ParsedAmount::Absent | ParsedAmount::Invalid => default,
        }
    }
}

/// Parses a legacy amount. Blank text is absent; `NaN`, infinities and
/// anything non-numeric are invalid.
pub fn parse_amount(raw: Option<&str>) -> ParsedAmount {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return ParsedAmount::Absent;
    };
    let lower = text.to_lowercase();
    if lower.contains("nan") || lower.contains("inf") {
        return ParsedAmount::Invalid;
    }
    match BigDecimal::from_str(text) {
        Ok(value) => ParsedAmount::Value(value),
        Err(_) => ParsedAmount::Invalid,
    }
}

/// Parses an integer column read as text. Blank or malformed text is `None`.
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .and_then(|text| text.parse::<i64>().ok())
}

/// Joins the non-blank trimmed parts with `", "`. All blank gives `None`.
pub fn join_address<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let parts: Vec<&str> = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Parses a legacy `%Y-%m-%d %H:%M:%S` timestamp. Zero dates and
/// malformed text give `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let text = raw?.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok())
}

/// Parses the date part of a legacy date or timestamp column.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let text = raw?.trim();
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Parses a legacy date and places it at midnight.
pub fn parse_date_midnight(raw: Option<&str>) -> Option<NaiveDateTime> {
    parse_date(raw).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Migration-time timestamp used for non-nullable columns without a source value.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Decodes a legacy text blob, replacing invalid UTF-8.
pub fn decode_blob(raw: Option<&[u8]>) -> Option<String> {
    raw.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
