use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a transparent newtype identifier.
///
/// Destination surrogate keys are PostgreSQL `INTEGER` columns and wrap `i32`.
/// Legacy keys are read from MySQL through `CAST(.. AS SIGNED)` and wrap `i64`.
macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

identifier!(
    /// `Users."uId"`
    UserId(i32)
);
identifier!(
    /// `Clinics."cId"`
    ClinicId(i32)
);
identifier!(
    /// `ClinicLocations."clId"`
    ClinicLocationId(i32)
);
identifier!(
    /// `Invoices."iId"`
    InvoiceId(i32)
);
identifier!(
    /// `RadiologistInvoices."riId"`
    RadiologistInvoiceId(i32)
);
identifier!(
    /// `Cases."cId"`
    CaseId(i32)
);
identifier!(
    /// `MasterServices."sId"`
    ServiceId(i32)
);
identifier!(
    /// `ClinicPatients."cpId"`
    ClinicPatientId(i32)
);

identifier!(
    /// Legacy user key. Shared by `tbl_users.user_id` and
    /// `tbl_radiologist.radiologist_id`, and stored in `Users.olduserid`.
    LegacyUserId(i64)
);
identifier!(
    /// `tbl_cases.cases_id`
    LegacyCaseId(i64)
);
identifier!(
    /// `tbl_add_services.services_id`
    LegacyServiceId(i64)
);
identifier!(
    /// `tbl_client_invoices.id`
    LegacyInvoiceId(i64)
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_display_their_inner_value() {
        assert_eq!(UserId(42).to_string(), "42");
        assert_eq!(LegacyUserId(9_000_000_000).to_string(), "9000000000");
    }

    #[test]
    fn identifiers_of_equal_value_hash_together() {
        let set: HashSet<CaseId> = [CaseId(1), CaseId::from(1), CaseId(2)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn identifiers_serialize_transparently() {
        let json = serde_json::to_string(&ClinicLocationId(7)).unwrap();
        assert_eq!(json, "7");

        let back: LegacyCaseId = serde_json::from_str("12").unwrap();
        assert_eq!(back, LegacyCaseId(12));
    }
}
