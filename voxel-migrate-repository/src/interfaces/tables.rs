//! Closed catalogues of the tables and checks the repositories operate on.
//!
//! Table names are interpolated into SQL, so they only ever come from these
//! enums and never from input.

/// Tables of the legacy schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyTable {
    Users,
    Radiologists,
    Practices,
    RadiologistInvoices,
    RadiologistInvoiceDetails,
    ClientInvoices,
    ClientInvoiceDetails,
    UserServiceCharges,
    Cases,
    CaseFiles,
    StudyPurposes,
    CaseReports,
    AddServices,
}

impl LegacyTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyTable::Users => "tbl_users",
            LegacyTable::Radiologists => "tbl_radiologist",
            LegacyTable::Practices => "tbl_practice",
            LegacyTable::RadiologistInvoices => "tbl_radiologist_invoices",
            LegacyTable::RadiologistInvoiceDetails => "tbl_radiologist_invoice_details",
            LegacyTable::ClientInvoices => "tbl_client_invoices",
            LegacyTable::ClientInvoiceDetails => "tbl_client_invoice_details",
            LegacyTable::UserServiceCharges => "tbl_user_service_charge",
            LegacyTable::Cases => "tbl_cases",
            LegacyTable::CaseFiles => "tbl_cases_files_new",
            LegacyTable::StudyPurposes => "tbl_study_purposes",
            LegacyTable::CaseReports => "tbl_cases_report",
            LegacyTable::AddServices => "tbl_add_services",
        }
    }
}

/// Tables of the destination schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetTable {
    Users,
    Clinics,
    ClinicLocations,
    RadiologistInvoices,
    RadiologistInvoiceCaseServices,
    Invoices,
    InvoiceCaseServices,
    ClinicLocationServiceCharges,
    MasterServices,
    Cases,
    CaseFiles,
    CaseStudyPurposes,
    ClinicPatients,
    CasePatients,
    CaseServices,
    PaymentPlatformAccessTokens,
    PaymentTransactions,
}

impl TargetTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetTable::Users => "Users",
            TargetTable::Clinics => "Clinics",
            TargetTable::ClinicLocations => "ClinicLocations",
            TargetTable::RadiologistInvoices => "RadiologistInvoices",
            TargetTable::RadiologistInvoiceCaseServices => "RadiologistInvoiceCaseServices",
            TargetTable::Invoices => "Invoices",
            TargetTable::InvoiceCaseServices => "InvoiceCaseServices",
            TargetTable::ClinicLocationServiceCharges => "ClinicLocationServiceCharges",
            TargetTable::MasterServices => "MasterServices",
            TargetTable::Cases => "Cases",
            TargetTable::CaseFiles => "CaseFiles",
            TargetTable::CaseStudyPurposes => "CaseStudyPurposes",
            TargetTable::ClinicPatients => "ClinicPatients",
            TargetTable::CasePatients => "CasePatients",
            TargetTable::CaseServices => "CaseServices",
            TargetTable::PaymentPlatformAccessTokens => "PaymentPlatformAccessTokens",
            TargetTable::PaymentTransactions => "PaymentTransactions",
        }
    }

    /// The serial surrogate key column, for tables the migration addresses by key.
    pub fn primary_key(&self) -> Option<&'static str> {
        match self {
            TargetTable::Users => Some("uId"),
            TargetTable::Clinics => Some("cId"),
            TargetTable::ClinicLocations => Some("clId"),
            TargetTable::RadiologistInvoices => Some("riId"),
            TargetTable::RadiologistInvoiceCaseServices => Some("ricsId"),
            TargetTable::Invoices => Some("iId"),
            TargetTable::InvoiceCaseServices => Some("icsId"),
            TargetTable::ClinicLocationServiceCharges => Some("clscId"),
            TargetTable::MasterServices => Some("sId"),
            TargetTable::Cases => Some("cId"),
            TargetTable::CaseFiles => Some("cfId"),
            TargetTable::CaseStudyPurposes => Some("cspId"),
            TargetTable::ClinicPatients => Some("cpId"),
            TargetTable::CasePatients => Some("cpId"),
            TargetTable::CaseServices => Some("csId"),
            TargetTable::PaymentPlatformAccessTokens | TargetTable::PaymentTransactions => None,
        }
    }
}

/// Post-load referential checks. Each counts child rows whose parent is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrphanCheck {
    ClinicLocationWithoutClinic,
    RadiologistInvoiceLineWithoutCase,
    InvoiceLineWithoutInvoice,
    InvoiceLineWithoutCase,
    CasePatientWithoutCase,
    CasePatientWithoutClinicPatient,
    ClinicPatientWithoutClinic,
    CaseServiceWithoutCase,
}

impl OrphanCheck {
    pub fn label(&self) -> &'static str {
        match self {
            OrphanCheck::ClinicLocationWithoutClinic => "ClinicLocations without Clinic",
            OrphanCheck::RadiologistInvoiceLineWithoutCase => {
                "RadiologistInvoiceCaseServices without Case"
            }
            OrphanCheck::InvoiceLineWithoutInvoice => "InvoiceCaseServices without Invoice",
            OrphanCheck::InvoiceLineWithoutCase => "InvoiceCaseServices without Case",
            OrphanCheck::CasePatientWithoutCase => "CasePatients without Case",
            OrphanCheck::CasePatientWithoutClinicPatient => "CasePatients without ClinicPatient",
            OrphanCheck::ClinicPatientWithoutClinic => "ClinicPatients without Clinic",
            OrphanCheck::CaseServiceWithoutCase => "CaseServices without Case",
        }
    }

    /// `(child table, child column, parent table, parent key)`
    pub(crate) fn relation(&self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            OrphanCheck::ClinicLocationWithoutClinic => {
                ("ClinicLocations", "clinicId", "Clinics", "cId")
            }
            OrphanCheck::RadiologistInvoiceLineWithoutCase => {
                ("RadiologistInvoiceCaseServices", "caseId", "Cases", "cId")
            }
            OrphanCheck::InvoiceLineWithoutInvoice => {
                ("InvoiceCaseServices", "invoiceId", "Invoices", "iId")
            }
            OrphanCheck::InvoiceLineWithoutCase => ("InvoiceCaseServices", "caseId", "Cases", "cId"),
            OrphanCheck::CasePatientWithoutCase => ("CasePatients", "caseId", "Cases", "cId"),
            OrphanCheck::CasePatientWithoutClinicPatient => {
                ("CasePatients", "clinicPatientId", "ClinicPatients", "cpId")
            }
            OrphanCheck::ClinicPatientWithoutClinic => {
                ("ClinicPatients", "clinicId", "Clinics", "cId")
            }
            OrphanCheck::CaseServiceWithoutCase => ("CaseServices", "caseId", "Cases", "cId"),
        }
    }
}

/// Sampled joins printed by a verification pass for visual inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleQuery {
    ClinicsWithLocations,
    CasePatients,
    CaseServices,
}
