//! Rows read from and written to the destination PostgreSQL schema.
use crate::types::{
    CaseId, CaseStatus, ClinicId, ClinicLocationId, ClinicStatus, Gender, InvoiceId, InvoiceType,
    LegacyUserId, PaymentMethod, RadiologistInvoiceId, ReviewStatus, ServiceId, UserId,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Snapshots
// ============================================================================

/// A destination user as seen by the identifier mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser {
    pub id: UserId,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name_title: Option<String>,
    pub user_type: Option<String>,
    pub legacy_id: Option<LegacyUserId>,
}

impl TargetUser {
    pub fn is_radiologist(&self) -> bool {
        self.user_type.as_deref() == Some("RADIOLOGIST")
    }
}

/// A clinic and its owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicOwner {
    pub clinic_id: ClinicId,
    pub owner_user_id: Option<UserId>,
    pub is_deleted: bool,
}

/// A clinic location and the clinic it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicLocationRef {
    pub location_id: ClinicLocationId,
    pub clinic_id: ClinicId,
}

/// One row of `Users ⋈ Clinics ⋈ ClinicLocations`: the location of a clinic
/// owned by a migrated legacy user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerLocationLink {
    pub legacy_user_id: LegacyUserId,
    pub location_id: ClinicLocationId,
}

/// An entry of the `MasterServices` catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterService {
    pub id: ServiceId,
    pub title: String,
}

/// A migrated case and its public case number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseKey {
    pub id: CaseId,
    pub voxel_case_id: Option<String>,
}

// ============================================================================
// Writes
// ============================================================================

/// Stamps a legacy id onto every destination user matched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLegacyLink {
    pub user_ids: Vec<UserId>,
    pub legacy_id: LegacyUserId,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClinic {
    pub owner_user_id: UserId,
    pub title: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    /// `None` leaves the column to its default.
    pub status: Option<ClinicStatus>,
    pub invoice_type: PaymentMethod,
}

/// The single location created alongside a migrated clinic. Its `clinicId`
/// is the key returned by the clinic insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClinicLocation {
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub zipcode: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRadiologistInvoice {
    pub id: RadiologistInvoiceId,
    pub radiologist_user_id: Option<UserId>,
    pub month_number: i32,
    pub year_number: i32,
    pub invoice_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRadiologistInvoiceCaseService {
    pub id: i32,
    pub invoice_id: RadiologistInvoiceId,
    pub case_id: CaseId,
    pub amount: BigDecimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub id: InvoiceId,
    pub invoice_type: InvoiceType,
    pub clinic_location_id: Option<ClinicLocationId>,
    pub month_number: i32,
    pub year_number: i32,
    pub emailed_status: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub invoice_no: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceCaseService {
    pub invoice_id: InvoiceId,
    pub case_id: CaseId,
    pub amount: BigDecimal,
    pub rush_fee: BigDecimal,
    pub created_at: NaiveDateTime,
}

/// A row of `ClinicLocationServiceCharges`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServiceCharge {
    pub id: i32,
    pub clinic_location_id: ClinicLocationId,
    pub service_id: ServiceId,
    pub amount: BigDecimal,
    pub rush_fee: BigDecimal,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
    pub id: CaseId,
    pub voxel_case_id: Option<String>,
    pub doctor_user_id: UserId,
    pub radiologist_user_id: Option<UserId>,
    pub clinic_location_id: Option<ClinicLocationId>,
    pub scanned_at: Option<NaiveDateTime>,
    pub status: CaseStatus,
    pub review_status: Option<ReviewStatus>,
    pub total_service_cost: BigDecimal,
    pub created_by_user_id: UserId,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub next_appointment_at: Option<NaiveDateTime>,
    pub revenue_amount: Option<BigDecimal>,
    pub internal_comments: Option<String>,
    pub case_result_summary: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub invoice_id: Option<InvoiceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCaseFile {
    pub id: i32,
    pub case_id: CaseId,
    pub file_name: Option<String>,
    pub file_size: i32,
    pub object_key: String,
    pub upload_by_user_id: UserId,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCaseStudyPurpose {
    pub id: i32,
    pub case_id: CaseId,
    pub airway: bool,
    pub general: bool,
    pub impaction: bool,
    pub implant: bool,
    pub orthodontic: bool,
    pub pathology: bool,
    pub sinus: bool,
    pub pain: bool,
    pub doctors_notes: Option<String>,
    pub case_comments: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClinicPatient {
    pub clinic_id: ClinicId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub dob: NaiveDate,
    pub platform_id: Uuid,
    pub created_at: NaiveDateTime,
}

/// Links a case to the clinic patient created with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCasePatient {
    pub case_id: CaseId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub dob: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCaseService {
    pub id: i32,
    pub case_id: CaseId,
    pub service_id: ServiceId,
    pub has_rush: bool,
    pub amount: BigDecimal,
    pub rush_fee: BigDecimal,
    pub created_at: NaiveDateTime,
}

/// One unit of work for the batch writer.
///
/// A variant carrying two records is written atomically: either both rows
/// land or neither does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRow {
    UserLegacyLink(UserLegacyLink),
    ClinicWithLocation(NewClinic, NewClinicLocation),
    RadiologistInvoice(NewRadiologistInvoice),
    RadiologistInvoiceCaseService(NewRadiologistInvoiceCaseService),
    Invoice(NewInvoice),
    InvoiceCaseService(NewInvoiceCaseService),
    ServiceCharge(NewServiceCharge),
    Case(Box<NewCase>),
    CaseFile(NewCaseFile),
    CaseStudyPurpose(NewCaseStudyPurpose),
    Patient(NewClinicPatient, NewCasePatient),
    CaseService(NewCaseService),
}

impl TargetRow {
    /// Destination table the row lands in first.
    pub fn table(&self) -> &'static str {
        match self {
            TargetRow::UserLegacyLink(_) => "Users",
            TargetRow::ClinicWithLocation(..) => "Clinics",
            TargetRow::RadiologistInvoice(_) => "RadiologistInvoices",
            TargetRow::RadiologistInvoiceCaseService(_) => "RadiologistInvoiceCaseServices",
            TargetRow::Invoice(_) => "Invoices",
            TargetRow::InvoiceCaseService(_) => "InvoiceCaseServices",
            TargetRow::ServiceCharge(_) => "ClinicLocationServiceCharges",
            TargetRow::Case(_) => "Cases",
            TargetRow::CaseFile(_) => "CaseFiles",
            TargetRow::CaseStudyPurpose(_) => "CaseStudyPurposes",
            TargetRow::Patient(..) => "ClinicPatients",
            TargetRow::CaseService(_) => "CaseServices",
        }
    }

    /// Short human-readable key used in dry-run and failure logs.
    pub fn describe(&self) -> String {
        match self {
            TargetRow::UserLegacyLink(link) => {
                format!("olduserid={} -> {} user(s)", link.legacy_id, link.user_ids.len())
            }
            TargetRow::ClinicWithLocation(clinic, location) => format!(
                "clinic '{}' owner={} zipcode={}",
                clinic.title, clinic.owner_user_id, location.zipcode
            ),
            TargetRow::RadiologistInvoice(row) => {
                format!("riId={} {}/{}", row.id, row.month_number, row.year_number)
            }
            TargetRow::RadiologistInvoiceCaseService(row) => {
                format!("ricsId={} invoice={} case={}", row.id, row.invoice_id, row.case_id)
            }
            TargetRow::Invoice(row) => format!("iId={} invoiceNo={}", row.id, row.invoice_no),
            TargetRow::InvoiceCaseService(row) => {
                format!("invoice={} case={} amount={}", row.invoice_id, row.case_id, row.amount)
            }
            TargetRow::ServiceCharge(row) => format!(
                "clscId={} location={} service={}",
                row.id, row.clinic_location_id, row.service_id
            ),
            TargetRow::Case(row) => format!("cId={} status={}", row.id, row.status),
            TargetRow::CaseFile(row) => format!("cfId={} case={}", row.id, row.case_id),
            TargetRow::CaseStudyPurpose(row) => format!("cspId={} case={}", row.id, row.case_id),
            TargetRow::Patient(patient, link) => format!(
                "patient '{} {}' clinic={} case={}",
                patient.first_name, patient.last_name, patient.clinic_id, link.case_id
            ),
            TargetRow::CaseService(row) => {
                format!("csId={} case={} service={}", row.id, row.case_id, row.service_id)
            }
        }
    }
}
