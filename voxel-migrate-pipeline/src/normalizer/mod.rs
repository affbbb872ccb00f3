//! Status and enum normalization.
//!
//! Every normalizer has the same shape: normalize the raw input, look it up
//! in a fixed table, and fall back to one designated default. An unrecognized
//! value never rejects a row; the result says whether the default was used so
//! the caller can log and count it.
use voxel_migrate_shared::types::{CaseStatus, ClinicStatus, Gender, InvoiceType, ReviewStatus};

/// Labels assumed for `enum_Invoices_invoiceType` when the destination
/// enum cannot be read.
pub const FALLBACK_INVOICE_TYPES: &[&str] =
    &["ADHOC", "MONTHLY", "YEARLY", "QUARTERLY", "WEEKLY", "CUSTOM"];

/// A normalized value and whether the designated default was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized<T> {
    pub value: T,
    pub fell_back: bool,
}

impl<T> Normalized<T> {
    fn matched(value: T) -> Self {
        Self {
            value,
            fell_back: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            fell_back: true,
        }
    }
}

/// The four lifecycle flags of a legacy case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    pub draft: Option<i64>,
    pub submitted: Option<i64>,
    pub completed: Option<i64>,
    pub archived: Option<i64>,
}

fn is_set(flag: Option<i64>) -> bool {
    flag == Some(1)
}

/// Collapses the lifecycle flags into one case status.
///
/// Only the value 1 counts as set. The highest set stage wins in the order
/// archived, completed, submitted. A draft flag alone maps to `CREATED`;
/// no flag at all falls back to `DRAFT`.
pub fn case_status(flags: LifecycleFlags) -> Normalized<CaseStatus> {
    if is_set(flags.archived) {
        Normalized::matched(CaseStatus::Archived)
    } else if is_set(flags.completed) {
        Normalized::matched(CaseStatus::Completed)
    } else if is_set(flags.submitted) {
        Normalized::matched(CaseStatus::Submitted)
    } else if is_set(flags.draft) {
        Normalized::matched(CaseStatus::Created)
    } else {
        Normalized::fallback(CaseStatus::Draft)
    }
}

/// Maps the legacy free-text review status. Absent input stays absent.
pub fn review_status(raw: Option<&str>) -> Option<Normalized<ReviewStatus>> {
    let raw = raw?;
    let status = match raw.trim().to_lowercase().as_str() {
        "submitted" => ReviewStatus::Submitted,
        "assigned" => ReviewStatus::Assigned,
        "reviewed" => ReviewStatus::Resolved,
        "accepted" => ReviewStatus::Accepted,
        "rejected" => ReviewStatus::Rejected,
        _ => return Some(Normalized::fallback(ReviewStatus::Submitted)),
    };
    Some(Normalized::matched(status))
}

/// Maps a practice status code. Anything but `1` or `0` leaves the column
/// to its default.
pub fn clinic_status(raw: Option<&str>) -> Option<ClinicStatus> {
    match raw.map(str::trim) {
        Some("1") => Some(ClinicStatus::Approved),
        Some("0") => Some(ClinicStatus::Disable),
        _ => None,
    }
}

pub fn gender(raw: Option<&str>) -> Normalized<Gender> {
    let normalized = raw.map(|value| value.trim().to_lowercase());
    match normalized.as_deref() {
        Some("male" | "m") => Normalized::matched(Gender::Male),
        Some("female" | "f") => Normalized::matched(Gender::Female),
        Some("other" | "o") => Normalized::matched(Gender::Other),
        _ => Normalized::fallback(Gender::Other),
    }
}

/// Maps a legacy invoice type onto the labels the destination enum allows.
///
/// `allowed` must not be empty; its first label is the designated default.
pub fn invoice_type(raw: &str, allowed: &[String]) -> Normalized<InvoiceType> {
    let upper = raw.trim().to_uppercase();
    if allowed.iter().any(|label| *label == upper) {
        return Normalized::matched(InvoiceType(upper));
    }

    let first = InvoiceType(allowed.first().cloned().unwrap_or_else(|| upper.clone()));
    match upper.as_str() {
        "REGULAR" | "STANDARD" => Normalized::matched(first),
        _ => Normalized::fallback(first),
    }
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parses a month given as a number (`1`-`12`), a full English name or a
/// three-letter abbreviation (`sept` is accepted too).
pub fn month_number(raw: &str) -> Option<i32> {
    let value = raw.trim().to_lowercase();
    if let Ok(number) = value.parse::<i32>() {
        return (1..=12).contains(&number).then_some(number);
    }
    if value == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|month| *month == value || (value.len() == 3 && month.starts_with(&value)))
        .map(|index| index as i32 + 1)
}

/// Maps the legacy case `status` column: `1` is live, `2` is deleted.
pub fn is_deleted_from_status(code: Option<i64>) -> Normalized<bool> {
    match code {
        Some(1) => Normalized::matched(false),
        Some(2) => Normalized::matched(true),
        _ => Normalized::fallback(false),
    }
}

/// A legacy tinyint flag. Absent is false, any nonzero value is true.
pub fn flag(raw: Option<i64>) -> bool {
    raw.is_some_and(|value| value != 0)
}
