//! Enumerated labels of the destination schema.
//!
//! Each `as_str` returns the exact label stored in the corresponding
//! PostgreSQL enum type, including the destination's own spellings.
use serde::{Deserialize, Serialize};
use std::fmt;

/// `enum_Cases_status`, ordered by lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaseStatus {
    Draft,
    Created,
    Submitted,
    Completed,
    Archived,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Draft => "DRAFT",
            CaseStatus::Created => "CREATED",
            CaseStatus::Submitted => "SUBMITED",
            CaseStatus::Completed => "COMPLETED",
            CaseStatus::Archived => "ARCHIVED",
        }
    }
}

/// `enum_Cases_reviewStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    Submitted,
    Assigned,
    Resolved,
    Accepted,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Submitted => "SUBMITED",
            ReviewStatus::Assigned => "ASSIGNED",
            ReviewStatus::Resolved => "RESOLVED",
            ReviewStatus::Accepted => "ACCEPTED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

/// `enum_Clinics_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClinicStatus {
    Approved,
    Disable,
}

impl ClinicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicStatus::Approved => "APPROVED",
            ClinicStatus::Disable => "DISABLE",
        }
    }
}

/// Shared by `enum_ClinicPatients_gender` and `enum_CasePatients_gender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }
}

/// Billing mode of a clinic (`enum_Clinics_invoiceType`) and of its
/// locations (`enum_ClinicLocations_paymentMethod`). Migrated clinics are
/// always pay-as-you-go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    PayAsYouGo,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::PayAsYouGo => "PAY_AS_YOU_GO",
        }
    }
}

/// A label of `enum_Invoices_invoiceType`.
///
/// The label set is read from the destination at run time, so this is an
/// open string rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceType(pub String);

impl InvoiceType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! display_as_str {
    ($($name:ty),*) => {
        $(impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(CaseStatus, ReviewStatus, ClinicStatus, Gender, PaymentMethod, InvoiceType);
