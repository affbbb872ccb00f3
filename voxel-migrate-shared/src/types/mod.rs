mod ids;
mod legacy;
mod status;
mod target;

pub use ids::{
    CaseId, ClinicId, ClinicLocationId, ClinicPatientId, InvoiceId, LegacyCaseId,
    LegacyInvoiceId, LegacyServiceId, LegacyUserId, RadiologistInvoiceId, ServiceId, UserId,
};
pub use legacy::{
    LegacyCase, LegacyCaseFile, LegacyCaseInvoiceLink, LegacyCaseKey, LegacyCasePatient,
    LegacyCaseReport, LegacyClientInvoice, LegacyClientInvoiceLine, LegacyPractice,
    LegacyRadiologist, LegacyRadiologistInvoice, LegacyRadiologistInvoiceLine, LegacyService,
    LegacyServiceCharge, LegacyStudyPurpose, LegacyUser, StudyPurposeFlags,
};
pub use status::{CaseStatus, ClinicStatus, Gender, InvoiceType, PaymentMethod, ReviewStatus};
pub use target::{
    CaseKey, ClinicLocationRef, ClinicOwner, MasterService, NewCase, NewCaseFile, NewCasePatient,
    NewCaseService, NewCaseStudyPurpose, NewClinic, NewClinicLocation, NewClinicPatient,
    NewInvoice, NewInvoiceCaseService, NewRadiologistInvoice, NewRadiologistInvoiceCaseService,
    NewServiceCharge, OwnerLocationLink, TargetRow, TargetUser, UserLegacyLink,
};
