//! Row writes against one open destination transaction.
//!
//! Every row runs inside its own savepoint so a rejected row rolls back alone
//! while the rest of the batch stays pending until `commit`.
use crate::errors::TargetRepositoryError;
use crate::interfaces::{TargetBatch, WriteReceipt};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use voxel_migrate_shared::types::{
    NewCase, NewCaseFile, NewCasePatient, NewCaseService, NewCaseStudyPurpose, NewClinic,
    NewClinicLocation, NewClinicPatient, NewInvoice, NewInvoiceCaseService,
    NewRadiologistInvoice, NewRadiologistInvoiceCaseService, NewServiceCharge, TargetRow,
    UserLegacyLink,
};

const SAVEPOINT: &str = "SAVEPOINT migrate_row";
const RELEASE: &str = "RELEASE SAVEPOINT migrate_row";
const ROLLBACK: &str = "ROLLBACK TO SAVEPOINT migrate_row";

pub struct PostgresTargetBatch {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTargetBatch {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    async fn savepoint(&mut self, statement: &'static str) -> Result<(), TargetRepositoryError> {
        sqlx::query(statement)
            .execute(&mut *self.tx)
            .await
            .map_err(TargetRepositoryError::Transaction)?;
        Ok(())
    }

    async fn write_row(&mut self, row: &TargetRow) -> Result<WriteReceipt, sqlx::Error> {
        match row {
            TargetRow::UserLegacyLink(link) => self.link_users(link).await,
            TargetRow::ClinicWithLocation(clinic, location) => {
                self.insert_clinic(clinic, location).await
            }
            TargetRow::RadiologistInvoice(invoice) => self.insert_radiologist_invoice(invoice).await,
            TargetRow::RadiologistInvoiceCaseService(line) => {
                self.insert_radiologist_invoice_line(line).await
            }
            TargetRow::Invoice(invoice) => self.insert_invoice(invoice).await,
            TargetRow::InvoiceCaseService(line) => self.insert_invoice_line(line).await,
            TargetRow::ServiceCharge(charge) => self.insert_service_charge(charge).await,
            TargetRow::Case(case) => self.insert_case(case).await,
            TargetRow::CaseFile(file) => self.insert_case_file(file).await,
            TargetRow::CaseStudyPurpose(purpose) => self.insert_study_purpose(purpose).await,
            TargetRow::Patient(patient, link) => self.insert_patient(patient, link).await,
            TargetRow::CaseService(service) => self.insert_case_service(service).await,
        }
    }

    async fn link_users(&mut self, link: &UserLegacyLink) -> Result<WriteReceipt, sqlx::Error> {
        let ids: Vec<i32> = link.user_ids.iter().map(|id| id.0).collect();
        let result = sqlx::query(
            r#"UPDATE "Users" SET olduserid = $1::int4, "updatedAt" = $2 WHERE "uId" = ANY($3)"#,
        )
        .bind(link.legacy_id.0)
        .bind(link.updated_at)
        .bind(&ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: None,
        })
    }

    async fn insert_clinic(
        &mut self,
        clinic: &NewClinic,
        location: &NewClinicLocation,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let clinic_id: i32 = match clinic.status {
            Some(status) => {
                sqlx::query_scalar(
                    r#"INSERT INTO "Clinics" (
                           "ownerUserId", title, "contactNumber", address, status,
                           "isDeleted", "invoiceType"
                       ) VALUES (
                           $1, $2, $3, $4, $5::text::"enum_Clinics_status",
                           false, $6::text::"enum_Clinics_invoiceType"
                       ) RETURNING "cId""#,
                )
                .bind(clinic.owner_user_id.0)
                .bind(&clinic.title)
                .bind(&clinic.contact_number)
                .bind(&clinic.address)
                .bind(status.as_str())
                .bind(clinic.invoice_type.as_str())
                .fetch_one(&mut *self.tx)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    r#"INSERT INTO "Clinics" (
                           "ownerUserId", title, "contactNumber", address,
                           "isDeleted", "invoiceType"
                       ) VALUES (
                           $1, $2, $3, $4, false, $5::text::"enum_Clinics_invoiceType"
                       ) RETURNING "cId""#,
                )
                .bind(clinic.owner_user_id.0)
                .bind(&clinic.title)
                .bind(&clinic.contact_number)
                .bind(&clinic.address)
                .bind(clinic.invoice_type.as_str())
                .fetch_one(&mut *self.tx)
                .await?
            }
        };

        sqlx::query(
            r#"INSERT INTO "ClinicLocations" (
                   "clinicId", "contactNumber", address, status, "isDeleted", zipcode,
                   "paymentMethod"
               ) VALUES (
                   $1, $2, $3, true, false, $4, $5::text::"enum_ClinicLocations_paymentMethod"
               )"#,
        )
        .bind(clinic_id)
        .bind(&location.contact_number)
        .bind(&location.address)
        .bind(&location.zipcode)
        .bind(location.payment_method.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(WriteReceipt {
            rows_affected: 2,
            returned_id: Some(clinic_id),
        })
    }

    async fn insert_radiologist_invoice(
        &mut self,
        invoice: &NewRadiologistInvoice,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "RadiologistInvoices" (
                   "riId", "radioLogistUserId", "monthNumber", "yearNumber",
                   "emailedStatus", "invoiceNo", "isDeleted"
               ) VALUES ($1, $2, $3, $4, false, $5, false)"#,
        )
        .bind(invoice.id.0)
        .bind(invoice.radiologist_user_id.map(|id| id.0))
        .bind(invoice.month_number)
        .bind(invoice.year_number)
        .bind(&invoice.invoice_no)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(invoice.id.0),
        })
    }

    async fn insert_radiologist_invoice_line(
        &mut self,
        line: &NewRadiologistInvoiceCaseService,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "RadiologistInvoiceCaseServices" (
                   "ricsId", "invoiceId", "caseId", amount, "createdAt",
                   "isDeleted", "deletedAt", "updatedAt"
               ) VALUES ($1, $2, $3, $4, $5, false, NULL, $6)"#,
        )
        .bind(line.id)
        .bind(line.invoice_id.0)
        .bind(line.case_id.0)
        .bind(&line.amount)
        .bind(line.created_at)
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(line.id),
        })
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "Invoices" (
                   "iId", "invoiceType", "clinicLocationId", "monthNumber", "yearNumber",
                   "emailedStatus", "createdAt", "updatedAt", "isDeleted", "deletedAt",
                   "invoiceNo"
               ) VALUES (
                   $1, $2::text::"enum_Invoices_invoiceType", $3, $4, $5,
                   $6, $7, $8, false, NULL, $9
               )"#,
        )
        .bind(invoice.id.0)
        .bind(invoice.invoice_type.as_str())
        .bind(invoice.clinic_location_id.map(|id| id.0))
        .bind(invoice.month_number)
        .bind(invoice.year_number)
        .bind(invoice.emailed_status)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(&invoice.invoice_no)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(invoice.id.0),
        })
    }

    async fn insert_invoice_line(
        &mut self,
        line: &NewInvoiceCaseService,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO "InvoiceCaseServices" (
                   "invoiceId", "caseId", amount, "rushFee", "createdAt",
                   "isDeleted", "deletedAt", "updatedAt"
               ) VALUES ($1, $2, $3, $4, $5, false, NULL, NULL)
               RETURNING "icsId""#,
        )
        .bind(line.invoice_id.0)
        .bind(line.case_id.0)
        .bind(&line.amount)
        .bind(&line.rush_fee)
        .bind(line.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: 1,
            returned_id: Some(id),
        })
    }

    async fn insert_service_charge(
        &mut self,
        charge: &NewServiceCharge,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "ClinicLocationServiceCharges" (
                   "clscId", "clinicLocationId", "serviceId", amount, "rushFee",
                   "createdAt", "updatedAt"
               ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(charge.id)
        .bind(charge.clinic_location_id.0)
        .bind(charge.service_id.0)
        .bind(&charge.amount)
        .bind(&charge.rush_fee)
        .bind(charge.created_at)
        .bind(charge.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(charge.id),
        })
    }

    async fn insert_case(&mut self, case: &NewCase) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "Cases" (
                   "cId", "voxelCaseId", "doctorUserId", "radioLogistUserId",
                   "clinicLocationId", "scannedAt", status, "reviewStatus",
                   "totalServiceCost", "createdByUserId", "isDeleted", "createdAt",
                   "updatedAt", "nextAppointmentAt", "revenueAmount", "internalComments",
                   "caseResultSummary", "submittedAt", "completedAt", "invoiceId"
               ) VALUES (
                   $1, $2, $3, $4, $5, $6,
                   $7::text::"enum_Cases_status", $8::text::"enum_Cases_reviewStatus",
                   $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
               )"#,
        )
        .bind(case.id.0)
        .bind(&case.voxel_case_id)
        .bind(case.doctor_user_id.0)
        .bind(case.radiologist_user_id.map(|id| id.0))
        .bind(case.clinic_location_id.map(|id| id.0))
        .bind(case.scanned_at)
        .bind(case.status.as_str())
        .bind(case.review_status.map(|status| status.as_str()))
        .bind(&case.total_service_cost)
        .bind(case.created_by_user_id.0)
        .bind(case.is_deleted)
        .bind(case.created_at)
        .bind(case.updated_at)
        .bind(case.next_appointment_at)
        .bind(&case.revenue_amount)
        .bind(&case.internal_comments)
        .bind(&case.case_result_summary)
        .bind(case.submitted_at)
        .bind(case.completed_at)
        .bind(case.invoice_id.map(|id| id.0))
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(case.id.0),
        })
    }

    async fn insert_case_file(&mut self, file: &NewCaseFile) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "CaseFiles" (
                   "cfId", "caseId", "fileName", "fileSize", "objectKey", "uploadByUserId",
                   "createdAt", "isDeleted", "deletedAt", "deletedByUserId"
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, false, NULL, NULL)"#,
        )
        .bind(file.id)
        .bind(file.case_id.0)
        .bind(&file.file_name)
        .bind(file.file_size)
        .bind(&file.object_key)
        .bind(file.upload_by_user_id.0)
        .bind(file.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(file.id),
        })
    }

    async fn insert_study_purpose(
        &mut self,
        purpose: &NewCaseStudyPurpose,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "CaseStudyPurposes" (
                   "cspId", "caseId", "airwayFlag", "generalFlag", "impactionFlag",
                   "implantFlag", "orthodonticFlag", "pathologyFlag", "sinusFlag", "painFlag",
                   "doctorsNotes", "caseComments", "updatedAt"
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(purpose.id)
        .bind(purpose.case_id.0)
        .bind(purpose.airway)
        .bind(purpose.general)
        .bind(purpose.impaction)
        .bind(purpose.implant)
        .bind(purpose.orthodontic)
        .bind(purpose.pathology)
        .bind(purpose.sinus)
        .bind(purpose.pain)
        .bind(&purpose.doctors_notes)
        .bind(&purpose.case_comments)
        .bind(purpose.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(purpose.id),
        })
    }

    async fn insert_patient(
        &mut self,
        patient: &NewClinicPatient,
        link: &NewCasePatient,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let clinic_patient_id: i32 = sqlx::query_scalar(
            r#"INSERT INTO "ClinicPatients" (
                   "clinicId", "firstName", "lastName", gender, dob,
                   "platformId", "createdAt", "updatedAt"
               ) VALUES ($1, $2, $3, $4::text::"enum_ClinicPatients_gender", $5, $6, $7, $7)
               RETURNING "cpId""#,
        )
        .bind(patient.clinic_id.0)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.gender.as_str())
        .bind(patient.dob)
        .bind(patient.platform_id)
        .bind(patient.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO "CasePatients" (
                   "caseId", "clinicPatientId", "firstName", "lastName", gender, dob
               ) VALUES ($1, $2, $3, $4, $5::text::"enum_CasePatients_gender", $6)"#,
        )
        .bind(link.case_id.0)
        .bind(clinic_patient_id)
        .bind(&link.first_name)
        .bind(&link.last_name)
        .bind(link.gender.as_str())
        .bind(link.dob)
        .execute(&mut *self.tx)
        .await?;

        Ok(WriteReceipt {
            rows_affected: 2,
            returned_id: Some(clinic_patient_id),
        })
    }

    async fn insert_case_service(
        &mut self,
        service: &NewCaseService,
    ) -> Result<WriteReceipt, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO "CaseServices" (
                   "csId", "caseId", "serviceId", "hasRush", amount, "rushFee", "createdAt"
               ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(service.id)
        .bind(service.case_id.0)
        .bind(service.service_id.0)
        .bind(service.has_rush)
        .bind(&service.amount)
        .bind(&service.rush_fee)
        .bind(service.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(WriteReceipt {
            rows_affected: result.rows_affected(),
            returned_id: Some(service.id),
        })
    }
}

#[async_trait]
impl TargetBatch for PostgresTargetBatch {
    async fn write(&mut self, row: &TargetRow) -> Result<WriteReceipt, TargetRepositoryError> {
        self.savepoint(SAVEPOINT).await?;
        match self.write_row(row).await {
            Ok(receipt) => {
                self.savepoint(RELEASE).await?;
                Ok(receipt)
            }
            Err(err) => {
                self.savepoint(ROLLBACK).await?;
                Err(TargetRepositoryError::from_write(err))
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), TargetRepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
