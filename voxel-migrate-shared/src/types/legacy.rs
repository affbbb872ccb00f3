//! Rows read from the legacy MySQL schema.
//!
//! Timestamps and money columns are carried as the text the legacy store
//! returns. Zero dates (`0000-00-00`) and malformed numbers are common in the
//! legacy data, so parsing is left to the row transformer where a bad value
//! becomes a counted outcome rather than a decode failure.
use crate::types::{LegacyCaseId, LegacyInvoiceId, LegacyServiceId, LegacyUserId};
use serde::{Deserialize, Serialize};

/// A clinic user from `tbl_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyUser {
    pub user_id: LegacyUserId,
    pub title: Option<String>,
    pub fname: Option<String>,
    pub lname: Option<String>,
    pub email: Option<String>,
}

/// A radiologist from `tbl_radiologist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRadiologist {
    pub radiologist_id: LegacyUserId,
    pub email: Option<String>,
    pub fname: Option<String>,
    pub lname: Option<String>,
}

/// A practice from `tbl_practice`. Only practices with a non-empty name are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPractice {
    pub practice_id: i64,
    pub practice_name: String,
    pub street_line_one: Option<String>,
    pub street_line_two: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
    pub phonenumber: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<LegacyUserId>,
}

/// A radiologist payout invoice from `tbl_radiologist_invoices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRadiologistInvoice {
    pub id: i64,
    pub invoice_no: Option<String>,
    pub radiologist_id: Option<LegacyUserId>,
    pub month: Option<String>,
    pub year: Option<String>,
}

/// One line of `tbl_radiologist_invoices` joined with `tbl_radiologist_invoice_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRadiologistInvoiceLine {
    pub invoice_id: Option<i64>,
    pub detail_id: Option<i64>,
    /// The legacy case number (`tbl_cases.voxel_cases_id`), stored as text.
    pub case_id: Option<String>,
    pub detail_revenue_amount: Option<String>,
    pub services_name: Option<String>,
    pub created_at: Option<String>,
}

/// A clinic invoice from `tbl_client_invoices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyClientInvoice {
    pub id: LegacyInvoiceId,
    pub invoice_no: Option<String>,
    pub invoice_type: Option<String>,
    pub user_id: Option<LegacyUserId>,
    pub send_status: Option<i64>,
    pub created_at: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
}

/// `tbl_client_invoice_details` joined with `tbl_client_invoice_reports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyClientInvoiceLine {
    pub client_invoice_id: Option<LegacyInvoiceId>,
    pub case_id: Option<LegacyCaseId>,
    pub total_amount: Option<String>,
    pub case_date: Option<String>,
    pub rush_fee: Option<String>,
}

/// A per-user service price from `tbl_user_service_charge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyServiceCharge {
    pub usc_id: i64,
    pub services_id: Option<LegacyServiceId>,
    pub user_id: Option<LegacyUserId>,
    pub price: Option<String>,
    pub rush_fee: Option<String>,
    pub add_time: Option<String>,
    pub update_time: Option<String>,
}

/// A case from `tbl_cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCase {
    pub cases_id: LegacyCaseId,
    pub voxel_cases_id: Option<String>,
    pub doctor_id: Option<LegacyUserId>,
    pub next_appointment_date: Option<String>,
    pub scan_date: Option<String>,
    pub services_total_cost: Option<String>,
    pub status: Option<i64>,
    pub draft_status: Option<i64>,
    pub submitted_status: Option<i64>,
    pub completed_status: Option<i64>,
    pub archived_status: Option<i64>,
    pub assigned_radiologist_id: Option<LegacyUserId>,
    pub revenue_amount: Option<String>,
    pub review_status: Option<String>,
    pub case_result_summary: Option<String>,
    pub internal_comments: Option<String>,
    pub add_time: Option<String>,
    pub update_time: Option<String>,
    pub submitted_date: Option<String>,
    pub completed_date: Option<String>,
    pub reffering_doctor: Option<String>,
}

/// An uploaded file from `tbl_cases_files_new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCaseFile {
    pub cases_file_id: i64,
    pub cases_id: Option<LegacyCaseId>,
    pub filetitle: Option<String>,
    pub filesize: Option<String>,
    pub bucket_url: Option<String>,
    pub uploaded_by: Option<LegacyUserId>,
    pub usertype: Option<String>,
}

/// The eight tinyint purpose flags of `tbl_study_purposes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPurposeFlags {
    pub airway: Option<i64>,
    pub general: Option<i64>,
    pub impaction: Option<i64>,
    pub implant: Option<i64>,
    pub orthodontic: Option<i64>,
    pub pathology: Option<i64>,
    pub sinus: Option<i64>,
    pub pain: Option<i64>,
}

/// A study purpose from `tbl_study_purposes`. Notes are stored as blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStudyPurpose {
    pub study_purposes_id: i64,
    pub cases_id: Option<LegacyCaseId>,
    pub doctor_id: Option<LegacyUserId>,
    pub flags: StudyPurposeFlags,
    pub doctors_notes: Option<Vec<u8>>,
    pub cases_comments: Option<Vec<u8>>,
    pub update_time: Option<String>,
}

/// Patient fields of a `tbl_cases` row. Only rows with both names are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCasePatient {
    pub cases_id: LegacyCaseId,
    pub patient_firstname: String,
    pub patient_lastname: String,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub doctor_id: Option<LegacyUserId>,
}

/// A billed service line from `tbl_cases_report`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCaseReport {
    pub cases_report_id: i64,
    pub cases_id: Option<LegacyCaseId>,
    pub doctors_id: Option<LegacyUserId>,
    pub add_services_id: Option<LegacyServiceId>,
    pub services_name: Option<String>,
    pub price: Option<String>,
    pub rush_fee: Option<String>,
    pub status: Option<String>,
    pub add_time: Option<String>,
}

/// The legacy service catalogue, `tbl_add_services`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyService {
    pub services_id: LegacyServiceId,
    pub services_name: Option<String>,
}

/// `tbl_cases.cases_id` paired with its public case number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCaseKey {
    pub cases_id: LegacyCaseId,
    pub voxel_cases_id: Option<String>,
}

/// A case billed on a clinic invoice, from `tbl_client_invoice_details`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCaseInvoiceLink {
    pub case_id: LegacyCaseId,
    pub client_invoice_id: LegacyInvoiceId,
}
