mod common;

use bigdecimal::BigDecimal;
use common::{legacy_user, target_user, MockSource, MockTarget};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use voxel_migrate_pipeline::audit::{audit_users, REPORT_DIR, REPORT_FILE};
use voxel_migrate_pipeline::errors::{StepError, WriterError};
use voxel_migrate_pipeline::maintenance::{reset, RESET_ORDER};
use voxel_migrate_pipeline::steps::{
    CaseServicesStep, CasesStep, ClinicsStep, InvoiceCaseServicesStep, InvoicesStep,
    MigrationStep, RadiologistInvoicesStep, RunOptions, StepContext, UsersStep,
};
use voxel_migrate_pipeline::transform::SkipReason;
use voxel_migrate_repository::TargetTable;
use voxel_migrate_shared::types::{
    CaseId, CaseKey, ClinicLocationId, ClinicStatus, LegacyCase, LegacyCaseId, LegacyCaseKey,
    LegacyCaseReport, LegacyClientInvoice, LegacyClientInvoiceLine, LegacyInvoiceId,
    LegacyPractice, LegacyRadiologistInvoice, LegacyService, LegacyServiceId, LegacyUserId,
    MasterService, OwnerLocationLink, RadiologistInvoiceId, ServiceId, TargetRow, UserId,
};

fn practice(id: i64, owner: i64) -> LegacyPractice {
    LegacyPractice {
        practice_id: id,
        practice_name: format!(" Practice {id} "),
        street_line_one: Some("1 Main St".to_string()),
        street_line_two: Some("  ".to_string()),
        city: Some("Springfield".to_string()),
        region: None,
        zipcode: None,
        country: Some("US".to_string()),
        phonenumber: Some("555-0100".to_string()),
        status: Some("1".to_string()),
        user_id: Some(LegacyUserId(owner)),
    }
}

fn invoice_line(invoice: i64, case: i64) -> LegacyClientInvoiceLine {
    LegacyClientInvoiceLine {
        client_invoice_id: Some(LegacyInvoiceId(invoice)),
        case_id: Some(LegacyCaseId(case)),
        total_amount: Some("120.50".to_string()),
        case_date: Some("2023-05-01 10:00:00".to_string()),
        rush_fee: Some("15".to_string()),
    }
}

fn client_invoice(id: i64) -> LegacyClientInvoice {
    LegacyClientInvoice {
        id: LegacyInvoiceId(id),
        invoice_no: Some(format!("INV-{id}")),
        invoice_type: Some("MONTHLY".to_string()),
        user_id: Some(LegacyUserId(100)),
        send_status: Some(1),
        created_at: Some("2023-01-31 09:00:00".to_string()),
        month: Some("1".to_string()),
        year: Some("2023".to_string()),
    }
}

fn legacy_case(id: i64, doctor: i64) -> LegacyCase {
    LegacyCase {
        cases_id: LegacyCaseId(id),
        voxel_cases_id: Some(format!("V-{id}")),
        doctor_id: Some(LegacyUserId(doctor)),
        next_appointment_date: None,
        scan_date: Some("2023-03-01 08:30:00".to_string()),
        services_total_cost: Some("250.00".to_string()),
        status: Some(1),
        draft_status: Some(0),
        submitted_status: Some(1),
        completed_status: Some(0),
        archived_status: Some(0),
        assigned_radiologist_id: None,
        revenue_amount: None,
        review_status: None,
        case_result_summary: None,
        internal_comments: None,
        add_time: Some("2023-03-01 08:00:00".to_string()),
        update_time: None,
        submitted_date: None,
        completed_date: None,
        reffering_doctor: None,
    }
}

fn context(source: MockSource, target: Arc<MockTarget>, options: RunOptions) -> StepContext {
    StepContext::new(Arc::new(source), target, options)
}

fn key_sets(entries: &[(TargetTable, &[i32])]) -> HashMap<TargetTable, HashSet<i32>> {
    entries
        .iter()
        .map(|(table, keys)| (*table, keys.iter().copied().collect()))
        .collect()
}

#[tokio::test]
async fn test_clinics_claim_each_owner_once() {
    let source = MockSource {
        users: vec![legacy_user(100)],
        practices: vec![practice(1, 100), practice(2, 100)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        users: vec![target_user(1, Some(100), "DOCTOR")],
        ..MockTarget::default()
    });

    let stats = ClinicsStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.migrated, 1);
    assert_eq!(stats.skipped_for(&SkipReason::NoOwnerAvailable), 1);
    assert_eq!(stats.counter("migrated_clinic_locations"), 1);

    let rows = target.committed_rows();
    assert_eq!(rows.len(), 1);
    match &rows[0] {
        TargetRow::ClinicWithLocation(clinic, location) => {
            assert_eq!(clinic.owner_user_id, UserId(1));
            assert_eq!(clinic.title, "Practice 1");
            assert_eq!(clinic.status, Some(ClinicStatus::Approved));
            assert_eq!(clinic.address.as_deref(), Some("1 Main St, Springfield, US"));
            assert_eq!(location.zipcode, "00000");
            assert_eq!(location.contact_number.as_deref(), Some("555-0100"));
        }
        other => panic!("unexpected row {other:?}"),
    }
}

#[tokio::test]
async fn test_invoice_lines_without_parents_count_as_foreign_key_violations() {
    let source = MockSource {
        client_invoice_lines: vec![invoice_line(1, 10), invoice_line(2, 10), invoice_line(1, 11)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        key_sets: key_sets(&[(TargetTable::Invoices, &[1]), (TargetTable::Cases, &[10])]),
        ..MockTarget::default()
    });

    let stats = InvoiceCaseServicesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.migrated, 1);
    assert_eq!(stats.foreign_key_violations, 2);
    assert_eq!(stats.skipped_for(&SkipReason::ForeignKeyMissing("invoice")), 1);
    assert_eq!(stats.skipped_for(&SkipReason::ForeignKeyMissing("case")), 1);
    assert_eq!(target.get_committed_count(), 1);
}

#[tokio::test]
async fn test_rows_after_a_rejected_row_are_still_committed() {
    let source = MockSource {
        client_invoice_lines: vec![invoice_line(1, 10), invoice_line(1, 11), invoice_line(1, 12)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        key_sets: key_sets(&[
            (TargetTable::Invoices, &[1]),
            (TargetTable::Cases, &[10, 11, 12]),
        ]),
        rejected_case_ids: HashSet::from([11]),
        ..MockTarget::default()
    });
    let options = RunOptions {
        commit_every: 2,
        ..RunOptions::default()
    };

    let stats = InvoiceCaseServicesStep
        .run(&context(source, target.clone(), options))
        .await
        .unwrap();

    assert_eq!(stats.migrated, 2);
    assert_eq!(stats.foreign_key_violations, 1);
    assert_eq!(stats.failed, 0);
    let cases: Vec<i32> = target
        .committed_rows()
        .iter()
        .filter_map(|row| match row {
            TargetRow::InvoiceCaseService(line) => Some(line.case_id.0),
            _ => None,
        })
        .collect();
    assert_eq!(cases, vec![10, 12]);
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let source = MockSource {
        client_invoices: vec![client_invoice(5)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        invoice_type_labels: vec!["MONTHLY".to_string(), "YEARLY".to_string()],
        ..MockTarget::default()
    });
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let stats = InvoicesStep
        .run(&context(source, target.clone(), options))
        .await
        .unwrap();

    assert!(stats.dry_run);
    assert_eq!(stats.migrated, 1);
    assert_eq!(target.get_committed_count(), 0);
    assert_eq!(target.get_batches_opened(), 0);
    assert!(target.get_calls().is_empty());
}

#[tokio::test]
async fn test_assume_empty_refuses_a_loaded_table() {
    let target = Arc::new(MockTarget {
        existing_rows: HashMap::from([(TargetTable::InvoiceCaseServices, 4)]),
        ..MockTarget::default()
    });

    let result = InvoiceCaseServicesStep
        .run(&context(MockSource::default(), target.clone(), RunOptions::default()))
        .await;

    assert!(matches!(
        result,
        Err(StepError::TableNotEmpty {
            table: "InvoiceCaseServices",
            rows: 4
        })
    ));
    assert_eq!(target.get_batches_opened(), 0);
}

#[tokio::test]
async fn test_reset_clears_children_before_parents() {
    let target = MockTarget::default();

    let report = reset(&target, false).await.unwrap();

    let deletes: Vec<String> = target
        .get_calls()
        .into_iter()
        .filter(|call| call.starts_with("delete "))
        .collect();
    let expected: Vec<String> = RESET_ORDER
        .iter()
        .map(|table| format!("delete {}", table.as_str()))
        .collect();
    assert_eq!(deletes, expected);
    assert_eq!(deletes.first().map(String::as_str), Some("delete InvoiceCaseServices"));
    assert_eq!(deletes.last().map(String::as_str), Some("delete RadiologistInvoices"));
    assert!(report.legacy_id_column_added);
    assert_eq!(report.enum_values_added, vec!["enum_Invoices_invoiceType.ADHOC"]);
}

#[tokio::test]
async fn test_reset_dry_run_executes_nothing() {
    let target = MockTarget::default();

    let report = reset(&target, true).await.unwrap();

    assert!(target.get_calls().is_empty());
    assert_eq!(report.deleted_total(), 0);
}

#[tokio::test]
async fn test_audit_writes_missing_users_report() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource {
        users: vec![legacy_user(100), legacy_user(101)],
        ..MockSource::default()
    };
    let target = MockTarget {
        users: vec![target_user(1, Some(100), "DOCTOR")],
        ..MockTarget::default()
    };

    let (missing, path) = audit_users(&source, &target, dir.path()).await.unwrap();

    assert_eq!(path, dir.path().join(REPORT_DIR).join(REPORT_FILE));
    assert_eq!(missing.total(), 1);
    assert!(missing.tbl_users.contains(&LegacyUserId(101)));

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["tbl_users"], serde_json::json!([101]));
    assert_eq!(written["tbl_radiologist"], serde_json::json!([]));
}

#[tokio::test]
async fn test_failed_commit_still_restores_the_table() {
    let source = MockSource {
        client_invoices: vec![client_invoice(5)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        invoice_type_labels: vec!["MONTHLY".to_string()],
        fail_commit: true,
        ..MockTarget::default()
    });

    let result = InvoicesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await;

    assert!(matches!(result, Err(StepError::Writer(WriterError::Commit(_)))));
    assert_eq!(target.get_committed_count(), 0);
    assert_eq!(
        target.get_calls(),
        vec![
            "triggers Invoices false",
            "drop_key_default Invoices",
            "restore_key_default Invoices",
            "triggers Invoices true",
        ]
    );
}

#[tokio::test]
async fn test_lost_connection_aborts_on_the_first_row() {
    let source = MockSource {
        client_invoices: (1..=5).map(client_invoice).collect(),
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        invoice_type_labels: vec!["MONTHLY".to_string()],
        lose_connection: true,
        ..MockTarget::default()
    });

    let result = InvoicesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await;

    assert!(matches!(result, Err(StepError::Writer(WriterError::Transaction(_)))));
    assert_eq!(target.get_batches_opened(), 1);
    assert_eq!(target.get_committed_count(), 0);
    let calls = target.get_calls();
    assert_eq!(calls.last().map(String::as_str), Some("triggers Invoices true"));
    assert!(calls.contains(&"restore_key_default Invoices".to_string()));
}

#[tokio::test]
async fn test_users_link_every_matching_destination_user() {
    let source = MockSource {
        users: vec![legacy_user(100), legacy_user(101)],
        ..MockSource::default()
    };
    let mut twin = target_user(2, None, "DOCTOR");
    twin.email = Some(" USER100@example.com".to_string());
    twin.first_name = Some("first100".to_string());
    twin.last_name = Some("LAST100 ".to_string());
    let mut first = target_user(1, None, "DOCTOR");
    first.email = Some("user100@example.com".to_string());
    first.first_name = Some("First100".to_string());
    first.last_name = Some("Last100".to_string());
    let target = Arc::new(MockTarget {
        users: vec![first, twin, target_user(3, None, "DOCTOR")],
        ..MockTarget::default()
    });

    let stats = UsersStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.migrated, 1);
    assert_eq!(stats.counter("updated_users"), 2);
    assert_eq!(stats.skipped_for(&SkipReason::UnresolvedMapping("user")), 1);
    assert!(target.get_calls().is_empty());
    match target.committed_rows().as_slice() {
        [TargetRow::UserLegacyLink(link)] => {
            assert_eq!(link.user_ids, vec![UserId(1), UserId(2)]);
            assert_eq!(link.legacy_id, LegacyUserId(100));
        }
        other => panic!("unexpected rows {other:?}"),
    }
}

#[tokio::test]
async fn test_radiologist_invoices_swap_the_invoice_number_trigger() {
    let source = MockSource {
        radiologist_invoices: vec![
            LegacyRadiologistInvoice {
                id: 7,
                invoice_no: Some(" RI-7 ".to_string()),
                radiologist_id: Some(LegacyUserId(40)),
                month: Some("March".to_string()),
                year: Some("2023".to_string()),
            },
            LegacyRadiologistInvoice {
                id: 8,
                invoice_no: None,
                radiologist_id: Some(LegacyUserId(40)),
                month: Some("13".to_string()),
                year: Some("2023".to_string()),
            },
        ],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        users: vec![target_user(5, Some(40), "RADIOLOGIST")],
        ..MockTarget::default()
    });

    let stats = RadiologistInvoicesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.migrated, 1);
    assert_eq!(stats.skipped_for(&SkipReason::InvalidValue("month")), 1);
    assert_eq!(
        target.get_calls(),
        vec![
            "drop_triggers RadiologistInvoices",
            "drop_key_default RadiologistInvoices",
            "restore_key_default RadiologistInvoices",
            "install_radiologist_invoice_no_trigger",
        ]
    );
    match target.committed_rows().as_slice() {
        [TargetRow::RadiologistInvoice(invoice)] => {
            assert_eq!(invoice.id, RadiologistInvoiceId(7));
            assert_eq!(invoice.radiologist_user_id, Some(UserId(5)));
            assert_eq!((invoice.month_number, invoice.year_number), (3, 2023));
            assert_eq!(invoice.invoice_no.as_deref(), Some("RI-7"));
        }
        other => panic!("unexpected rows {other:?}"),
    }
}

#[tokio::test]
async fn test_cases_keep_legacy_ids_and_fall_back_to_the_referring_doctor() {
    let mut referred = legacy_case(501, 11);
    referred.reffering_doctor = Some("  first2   LAST2 ".to_string());
    let source = MockSource {
        users: vec![legacy_user(10), legacy_user(11)],
        cases: vec![legacy_case(500, 10), referred, legacy_case(502, 12)],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        users: vec![
            target_user(1, Some(10), "DOCTOR"),
            target_user(2, None, "DOCTOR"),
        ],
        owner_location_links: vec![OwnerLocationLink {
            legacy_user_id: LegacyUserId(10),
            location_id: ClinicLocationId(3),
        }],
        ..MockTarget::default()
    });

    let stats = CasesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.migrated, 2);
    assert_eq!(stats.counter("doctor_exact"), 1);
    assert_eq!(stats.counter("doctor_by_name"), 1);
    assert_eq!(stats.skipped_for(&SkipReason::InvalidValue("doctor_id")), 1);
    assert_eq!(
        target.get_calls(),
        vec!["delete Cases", "drop_key_default Cases", "restore_key_default Cases"]
    );

    let cases: Vec<(CaseId, UserId, Option<ClinicLocationId>)> = target
        .committed_rows()
        .iter()
        .filter_map(|row| match row {
            TargetRow::Case(case) => Some((case.id, case.doctor_user_id, case.clinic_location_id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        cases,
        vec![
            (CaseId(500), UserId(1), Some(ClinicLocationId(3))),
            (CaseId(501), UserId(2), None),
        ]
    );
}

#[tokio::test]
async fn test_case_services_resolve_cases_by_number_and_services_by_title() {
    let report = |id: i64, status: &str| LegacyCaseReport {
        cases_report_id: id,
        cases_id: Some(LegacyCaseId(500)),
        doctors_id: Some(LegacyUserId(10)),
        add_services_id: Some(LegacyServiceId(3)),
        services_name: None,
        price: Some("0".to_string()),
        rush_fee: Some("25".to_string()),
        status: Some(status.to_string()),
        add_time: Some("2023-03-02 10:00:00".to_string()),
    };
    let source = MockSource {
        users: vec![legacy_user(10)],
        case_reports: vec![report(1, "1"), report(2, "Deleted")],
        services: vec![LegacyService {
            services_id: LegacyServiceId(3),
            services_name: Some("MRI  Radiology Report".to_string()),
        }],
        case_keys: vec![LegacyCaseKey {
            cases_id: LegacyCaseId(500),
            voxel_cases_id: Some(" V-500 ".to_string()),
        }],
        ..MockSource::default()
    };
    let target = Arc::new(MockTarget {
        case_keys: vec![CaseKey {
            id: CaseId(9),
            voxel_case_id: Some("V-500".to_string()),
        }],
        master_services: vec![MasterService {
            id: ServiceId(4),
            title: "MRI Radiology Report".to_string(),
        }],
        ..MockTarget::default()
    });

    let stats = CaseServicesStep
        .run(&context(source, target.clone(), RunOptions::default()))
        .await
        .unwrap();

    assert_eq!(stats.migrated, 1);
    assert_eq!(stats.skipped_for(&SkipReason::DeletedAtSource), 1);
    assert_eq!(stats.warning_count("minimum_amount"), 1);
    assert_eq!(
        target.get_calls(),
        vec![
            "reactivate_master_services",
            "delete CaseServices",
            "drop_key_default CaseServices",
            "restore_key_default CaseServices",
        ]
    );
    match target.committed_rows().as_slice() {
        [TargetRow::CaseService(service)] => {
            assert_eq!(service.id, 1);
            assert_eq!(service.case_id, CaseId(9));
            assert_eq!(service.service_id, ServiceId(4));
            assert!(service.has_rush);
            assert_eq!(service.amount, BigDecimal::from_str("1.00").unwrap());
            assert_eq!(service.rush_fee, BigDecimal::from(25));
        }
        other => panic!("unexpected rows {other:?}"),
    }
}
