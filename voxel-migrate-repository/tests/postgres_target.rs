//! Integration tests for the PostgreSQL target repository implementation.
//!
//! These tests require a real PostgreSQL database and use SQLx test macros
//! to ensure proper test isolation and cleanup.
//!
//! Run with: `cargo test --test postgres_target`

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;
use voxel_migrate_repository::{
    OrphanCheck, PostgresTargetRepository, SampleQuery, TargetRepository, TargetRepositoryError,
    TargetTable,
};
use voxel_migrate_shared::types::{
    CaseId, CaseStatus, ClinicStatus, InvoiceId, InvoiceType, LegacyUserId, NewCase, NewClinic,
    NewClinicLocation, NewInvoice, NewInvoiceCaseService, NewRadiologistInvoice, PaymentMethod,
    RadiologistInvoiceId, TargetRow, UserId, UserLegacyLink,
};

async fn repository(pool: &sqlx::PgPool) -> PostgresTargetRepository {
    let repository = PostgresTargetRepository::new(pool.clone()).await.unwrap();
    repository.ensure_legacy_id_column().await.unwrap();
    repository
}

async fn insert_user(pool: &sqlx::PgPool, email: &str, first: &str, last: &str, kind: &str) -> i32 {
    sqlx::query_scalar(
        r#"INSERT INTO "Users" (email, "firstName", "lastName", "userType")
           VALUES ($1, $2, $3, $4::text::"enum_Users_userType") RETURNING "uId""#,
    )
    .bind(email)
    .bind(first)
    .bind(last)
    .bind(kind)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn timestamp() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn clinic(owner: i32, status: Option<ClinicStatus>) -> TargetRow {
    TargetRow::ClinicWithLocation(
        NewClinic {
            owner_user_id: UserId(owner),
            title: "Bright Smiles".to_string(),
            contact_number: Some("555-0100".to_string()),
            address: Some("1 Main St, Springfield".to_string()),
            status,
            invoice_type: PaymentMethod::PayAsYouGo,
        },
        NewClinicLocation {
            contact_number: Some("555-0100".to_string()),
            address: Some("1 Main St, Springfield".to_string()),
            zipcode: "00000".to_string(),
            payment_method: PaymentMethod::PayAsYouGo,
        },
    )
}

fn case(id: i32, doctor: i32) -> TargetRow {
    TargetRow::Case(Box::new(NewCase {
        id: CaseId(id),
        voxel_case_id: Some(format!("VX-{id}")),
        doctor_user_id: UserId(doctor),
        radiologist_user_id: None,
        clinic_location_id: None,
        scanned_at: None,
        status: CaseStatus::Completed,
        review_status: None,
        total_service_cost: BigDecimal::from_str("1.00").unwrap(),
        created_by_user_id: UserId(doctor),
        is_deleted: false,
        created_at: timestamp(),
        updated_at: None,
        next_appointment_at: None,
        revenue_amount: None,
        internal_comments: None,
        case_result_summary: None,
        submitted_at: None,
        completed_at: None,
        invoice_id: None,
    }))
}

// ============================================================================
// Preparation Tests
// ============================================================================

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_ensure_legacy_id_column_is_idempotent(pool: sqlx::PgPool) {
    let repository = PostgresTargetRepository::new(pool.clone()).await.unwrap();

    assert!(repository.ensure_legacy_id_column().await.unwrap());
    assert!(!repository.ensure_legacy_id_column().await.unwrap());
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_ensure_enum_value_adds_missing_label_once(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;

    assert!(repository
        .ensure_enum_value("enum_Invoices_invoiceType", "ADHOC")
        .await
        .unwrap());
    assert!(!repository
        .ensure_enum_value("enum_Invoices_invoiceType", "ADHOC")
        .await
        .unwrap());

    let labels = repository.invoice_type_labels().await.unwrap();
    assert_eq!(labels, vec!["MONTHLY", "YEARLY", "ADHOC"]);
}

// ============================================================================
// Snapshot Tests
// ============================================================================

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_legacy_link_updates_every_matched_user(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let first = insert_user(&pool, "a@clinic.test", "Ann", "Lee", "DOCTOR").await;
    let second = insert_user(&pool, "a@clinic.test", "Ann", "Lee", "DOCTOR").await;
    let other = insert_user(&pool, "b@clinic.test", "Bob", "Ray", "DOCTOR").await;

    let mut batch = repository.begin_batch().await.unwrap();
    let receipt = batch
        .write(&TargetRow::UserLegacyLink(UserLegacyLink {
            user_ids: vec![UserId(first), UserId(second)],
            legacy_id: LegacyUserId(77),
            updated_at: timestamp(),
        }))
        .await
        .unwrap();
    batch.commit().await.unwrap();

    assert_eq!(receipt.rows_affected, 2);
    let users = repository.users().await.unwrap();
    let linked: Vec<_> = users
        .iter()
        .filter(|user| user.legacy_id == Some(LegacyUserId(77)))
        .map(|user| user.id.0)
        .collect();
    assert_eq!(linked, vec![first, second]);
    assert!(users
        .iter()
        .any(|user| user.id.0 == other && user.legacy_id.is_none()));
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_owner_location_links_join_users_clinics_and_locations(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let owner = insert_user(&pool, "owner@clinic.test", "Olga", "Nash", "DOCTOR").await;
    sqlx::query(r#"UPDATE "Users" SET olduserid = 501 WHERE "uId" = $1"#)
        .bind(owner)
        .execute(&pool)
        .await
        .unwrap();

    let mut batch = repository.begin_batch().await.unwrap();
    let receipt = batch.write(&clinic(owner, None)).await.unwrap();
    batch.commit().await.unwrap();

    let links = repository.owner_location_links().await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].legacy_user_id, LegacyUserId(501));

    let owners = repository.clinic_owners().await.unwrap();
    assert_eq!(owners[0].clinic_id.0, receipt.returned_id.unwrap());
    assert_eq!(owners[0].owner_user_id, Some(UserId(owner)));
}

// ============================================================================
// Batch Write Tests
// ============================================================================

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_clinic_and_location_are_written_together(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let owner = insert_user(&pool, "owner@clinic.test", "Olga", "Nash", "DOCTOR").await;

    let mut batch = repository.begin_batch().await.unwrap();
    batch
        .write(&clinic(owner, Some(ClinicStatus::Approved)))
        .await
        .unwrap();
    batch.commit().await.unwrap();

    assert_eq!(repository.count(TargetTable::Clinics).await.unwrap(), 1);
    assert_eq!(repository.count(TargetTable::ClinicLocations).await.unwrap(), 1);
    assert_eq!(
        repository
            .count_orphans(OrphanCheck::ClinicLocationWithoutClinic)
            .await
            .unwrap(),
        0
    );

    let samples = repository
        .sample(SampleQuery::ClinicsWithLocations, 5)
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].contains("status=APPROVED"));
    assert!(samples[0].contains("zipcode=00000"));
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_clinic_without_status_keeps_column_default(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let owner = insert_user(&pool, "owner@clinic.test", "Olga", "Nash", "DOCTOR").await;

    let mut batch = repository.begin_batch().await.unwrap();
    batch.write(&clinic(owner, None)).await.unwrap();
    batch.commit().await.unwrap();

    let status: String = sqlx::query_scalar(r#"SELECT status::text FROM "Clinics""#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "PENDING");
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_rejected_row_rolls_back_alone(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let doctor = insert_user(&pool, "doc@clinic.test", "Dee", "Fox", "DOCTOR").await;

    let mut batch = repository.begin_batch().await.unwrap();
    batch.write(&case(10, doctor)).await.unwrap();

    let orphan = TargetRow::InvoiceCaseService(NewInvoiceCaseService {
        invoice_id: InvoiceId(999),
        case_id: CaseId(10),
        amount: BigDecimal::from_str("12.50").unwrap(),
        rush_fee: BigDecimal::from(0),
        created_at: timestamp(),
    });
    let err = batch.write(&orphan).await.unwrap_err();
    assert!(err.is_foreign_key_violation());
    assert!(matches!(err, TargetRepositoryError::ForeignKeyViolation(_)));

    batch.write(&case(11, doctor)).await.unwrap();
    batch.commit().await.unwrap();

    assert_eq!(repository.count(TargetTable::Cases).await.unwrap(), 2);
    assert_eq!(repository.count(TargetTable::InvoiceCaseServices).await.unwrap(), 0);
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_uncommitted_batch_is_discarded(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let doctor = insert_user(&pool, "doc@clinic.test", "Dee", "Fox", "DOCTOR").await;

    {
        let mut batch = repository.begin_batch().await.unwrap();
        batch.write(&case(20, doctor)).await.unwrap();
    }

    assert_eq!(repository.count(TargetTable::Cases).await.unwrap(), 0);
}

// ============================================================================
// Key Default and Trigger Tests
// ============================================================================

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_restore_key_default_advances_past_explicit_keys(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;

    repository
        .drop_key_default(TargetTable::Invoices)
        .await
        .unwrap();

    let mut batch = repository.begin_batch().await.unwrap();
    batch
        .write(&TargetRow::Invoice(NewInvoice {
            id: InvoiceId(4100),
            invoice_type: InvoiceType("MONTHLY".to_string()),
            clinic_location_id: None,
            month_number: 2,
            year_number: 2023,
            emailed_status: true,
            created_at: timestamp(),
            updated_at: timestamp(),
            invoice_no: "INV-4100".to_string(),
        }))
        .await
        .unwrap();
    batch.commit().await.unwrap();

    repository
        .restore_key_default(TargetTable::Invoices)
        .await
        .unwrap();

    let next: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Invoices" ("createdAt", "updatedAt") VALUES (now(), now()) RETURNING "iId""#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(next, 4101);
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_invoice_no_trigger_fills_empty_numbers(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    repository
        .install_radiologist_invoice_no_trigger()
        .await
        .unwrap();

    let mut batch = repository.begin_batch().await.unwrap();
    batch
        .write(&TargetRow::RadiologistInvoice(NewRadiologistInvoice {
            id: RadiologistInvoiceId(31),
            radiologist_user_id: None,
            month_number: 9,
            year_number: 2022,
            invoice_no: None,
        }))
        .await
        .unwrap();
    batch.commit().await.unwrap();

    let number: String =
        sqlx::query_scalar(r#"SELECT "invoiceNo" FROM "RadiologistInvoices" WHERE "riId" = 31"#)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(number, "RI-31");

    assert_eq!(
        repository
            .drop_triggers(TargetTable::RadiologistInvoices)
            .await
            .unwrap(),
        1
    );
}

// ============================================================================
// Maintenance Tests
// ============================================================================

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_delete_all_and_truncate_clear_tables(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    let doctor = insert_user(&pool, "doc@clinic.test", "Dee", "Fox", "DOCTOR").await;

    let mut batch = repository.begin_batch().await.unwrap();
    batch.write(&case(1, doctor)).await.unwrap();
    batch.write(&case(2, doctor)).await.unwrap();
    batch.commit().await.unwrap();

    assert_eq!(repository.delete_all(TargetTable::Cases).await.unwrap(), 2);
    assert_eq!(repository.count(TargetTable::Cases).await.unwrap(), 0);

    repository.truncate(TargetTable::CaseFiles).await.unwrap();
    assert_eq!(repository.count(TargetTable::CaseFiles).await.unwrap(), 0);
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_key_set_requires_integer_key(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    insert_user(&pool, "doc@clinic.test", "Dee", "Fox", "RADIOLOGIST").await;

    let keys = repository.key_set(TargetTable::Users).await.unwrap();
    assert_eq!(keys.len(), 1);

    let err = repository
        .key_set(TargetTable::PaymentTransactions)
        .await
        .unwrap_err();
    assert!(matches!(err, TargetRepositoryError::NoIntegerKey("PaymentTransactions")));
}

#[sqlx::test(migrations = "tests/target_schema")]
async fn test_reactivate_master_services(pool: sqlx::PgPool) {
    let repository = repository(&pool).await;
    sqlx::query(
        r#"INSERT INTO "MasterServices" (title, "isDeleted")
           VALUES ('Radiology Report', true), ('MRI Radiology Report', false)"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    assert_eq!(repository.reactivate_master_services().await.unwrap(), 1);
    assert_eq!(repository.master_services().await.unwrap().len(), 2);
}
