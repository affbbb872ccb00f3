//! MySQL implementation of the legacy source repository.
//!
//! Keys are read through `CAST(.. AS SIGNED)` so every legacy integer column
//! decodes as `i64` whatever its declared width. Datetimes and money are
//! read through `CAST(.. AS CHAR)` and parsed by the pipeline.
use crate::errors::SourceRepositoryError;
use crate::interfaces::{LegacyTable, SourceRepository};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use std::collections::HashSet;
use voxel_migrate_shared::types::{
    LegacyCase, LegacyCaseFile, LegacyCaseId, LegacyCaseInvoiceLink, LegacyCaseKey,
    LegacyCasePatient, LegacyCaseReport, LegacyClientInvoice, LegacyClientInvoiceLine,
    LegacyInvoiceId, LegacyPractice, LegacyRadiologist, LegacyRadiologistInvoice,
    LegacyRadiologistInvoiceLine, LegacyService, LegacyServiceCharge, LegacyServiceId,
    LegacyStudyPurpose, LegacyUser, LegacyUserId, StudyPurposeFlags,
};

/// Read-only repository over the legacy MySQL schema.
pub struct MySqlSourceRepository {
    pool: sqlx::MySqlPool,
}

impl MySqlSourceRepository {
    /// Creates a new source repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool to the legacy database
    pub fn new(pool: sqlx::MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<MySqlRow>, SourceRepositoryError> {
        Ok(sqlx::query(sql).fetch_all(&self.pool).await?)
    }
}

fn text(row: &MySqlRow, column: &str) -> Result<Option<String>, sqlx::Error> {
    row.try_get::<Option<String>, _>(column)
}

fn int(row: &MySqlRow, column: &str) -> Result<Option<i64>, sqlx::Error> {
    row.try_get::<Option<i64>, _>(column)
}

fn user(row: &MySqlRow, column: &str) -> Result<Option<LegacyUserId>, sqlx::Error> {
    Ok(int(row, column)?.map(LegacyUserId))
}

fn case(row: &MySqlRow, column: &str) -> Result<Option<LegacyCaseId>, sqlx::Error> {
    Ok(int(row, column)?.map(LegacyCaseId))
}

#[async_trait]
impl SourceRepository for MySqlSourceRepository {
    async fn users(&self) -> Result<Vec<LegacyUser>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(user_id AS SIGNED) AS user_id, title, fname, lname, email
                 FROM tbl_users ORDER BY user_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyUser {
                    user_id: LegacyUserId(row.try_get("user_id")?),
                    title: text(row, "title")?,
                    fname: text(row, "fname")?,
                    lname: text(row, "lname")?,
                    email: text(row, "email")?,
                })
            })
            .collect()
    }

    async fn radiologists(&self) -> Result<Vec<LegacyRadiologist>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(radiologist_id AS SIGNED) AS radiologist_id, email, fname, lname
                 FROM tbl_radiologist ORDER BY radiologist_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyRadiologist {
                    radiologist_id: LegacyUserId(row.try_get("radiologist_id")?),
                    email: text(row, "email")?,
                    fname: text(row, "fname")?,
                    lname: text(row, "lname")?,
                })
            })
            .collect()
    }

    async fn practices(&self) -> Result<Vec<LegacyPractice>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(practice_id AS SIGNED) AS practice_id, practice_name,
                        street_line_one, street_line_two, city, region,
                        CAST(zipcode AS CHAR) AS zipcode, country,
                        CAST(phonenumber AS CHAR) AS phonenumber,
                        CAST(status AS CHAR) AS status,
                        CAST(user_id AS SIGNED) AS user_id
                 FROM tbl_practice
                 WHERE practice_name IS NOT NULL AND practice_name <> ''
                 ORDER BY practice_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyPractice {
                    practice_id: row.try_get("practice_id")?,
                    practice_name: row.try_get("practice_name")?,
                    street_line_one: text(row, "street_line_one")?,
                    street_line_two: text(row, "street_line_two")?,
                    city: text(row, "city")?,
                    region: text(row, "region")?,
                    zipcode: text(row, "zipcode")?,
                    country: text(row, "country")?,
                    phonenumber: text(row, "phonenumber")?,
                    status: text(row, "status")?,
                    user_id: user(row, "user_id")?,
                })
            })
            .collect()
    }

    async fn radiologist_invoices(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoice>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(id AS SIGNED) AS id, invoice_no,
                        CAST(radiologist_id AS SIGNED) AS radiologist_id,
                        CAST(month AS CHAR) AS month, CAST(year AS CHAR) AS year
                 FROM tbl_radiologist_invoices ORDER BY id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyRadiologistInvoice {
                    id: row.try_get("id")?,
                    invoice_no: text(row, "invoice_no")?,
                    radiologist_id: user(row, "radiologist_id")?,
                    month: text(row, "month")?,
                    year: text(row, "year")?,
                })
            })
            .collect()
    }

    async fn radiologist_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoiceLine>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(ri.id AS SIGNED) AS invoice_id,
                        CAST(rid.id AS SIGNED) AS detail_id,
                        CAST(rid.case_id AS CHAR) AS case_id,
                        CAST(rid.revenue_amount AS CHAR) AS detail_revenue_amount,
                        rid.services_name,
                        CAST(rid.created_at AS CHAR) AS created_at
                 FROM tbl_radiologist_invoices ri
                 JOIN tbl_radiologist_invoice_details rid ON ri.id = rid.radiologist_invoice_id
                 ORDER BY ri.id, rid.id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyRadiologistInvoiceLine {
                    invoice_id: int(row, "invoice_id")?,
                    detail_id: int(row, "detail_id")?,
                    case_id: text(row, "case_id")?,
                    detail_revenue_amount: text(row, "detail_revenue_amount")?,
                    services_name: text(row, "services_name")?,
                    created_at: text(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn client_invoices(&self) -> Result<Vec<LegacyClientInvoice>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(id AS SIGNED) AS id, invoice_no, invoice_type,
                        CAST(user_id AS SIGNED) AS user_id,
                        CAST(send_status AS SIGNED) AS send_status,
                        CAST(created_at AS CHAR) AS created_at,
                        CAST(month AS CHAR) AS month, CAST(year AS CHAR) AS year
                 FROM tbl_client_invoices ORDER BY id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyClientInvoice {
                    id: LegacyInvoiceId(row.try_get("id")?),
                    invoice_no: text(row, "invoice_no")?,
                    invoice_type: text(row, "invoice_type")?,
                    user_id: user(row, "user_id")?,
                    send_status: int(row, "send_status")?,
                    created_at: text(row, "created_at")?,
                    month: text(row, "month")?,
                    year: text(row, "year")?,
                })
            })
            .collect()
    }

    async fn client_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyClientInvoiceLine>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(d.client_invoice_id AS SIGNED) AS client_invoice_id,
                        CAST(d.case_id AS SIGNED) AS case_id,
                        CAST(d.total_amount AS CHAR) AS total_amount,
                        CAST(d.case_date AS CHAR) AS case_date,
                        CAST(r.rush_fee AS CHAR) AS rush_fee
                 FROM tbl_client_invoice_details d
                 JOIN tbl_client_invoice_reports r ON d.id = r.client_invoice_details_id
                 ORDER BY d.id, r.id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyClientInvoiceLine {
                    client_invoice_id: int(row, "client_invoice_id")?.map(LegacyInvoiceId),
                    case_id: case(row, "case_id")?,
                    total_amount: text(row, "total_amount")?,
                    case_date: text(row, "case_date")?,
                    rush_fee: text(row, "rush_fee")?,
                })
            })
            .collect()
    }

    async fn service_charges(&self) -> Result<Vec<LegacyServiceCharge>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(usc_id AS SIGNED) AS usc_id,
                        CAST(services_id AS SIGNED) AS services_id,
                        CAST(user_id AS SIGNED) AS user_id,
                        CAST(price AS CHAR) AS price,
                        CAST(rush_fee AS CHAR) AS rush_fee,
                        CAST(add_time AS CHAR) AS add_time,
                        CAST(update_time AS CHAR) AS update_time
                 FROM tbl_user_service_charge ORDER BY usc_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyServiceCharge {
                    usc_id: row.try_get("usc_id")?,
                    services_id: int(row, "services_id")?.map(LegacyServiceId),
                    user_id: user(row, "user_id")?,
                    price: text(row, "price")?,
                    rush_fee: text(row, "rush_fee")?,
                    add_time: text(row, "add_time")?,
                    update_time: text(row, "update_time")?,
                })
            })
            .collect()
    }

    async fn cases(&self) -> Result<Vec<LegacyCase>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_id AS SIGNED) AS cases_id,
                        CAST(voxel_cases_id AS CHAR) AS voxel_cases_id,
                        CAST(doctor_id AS SIGNED) AS doctor_id,
                        CAST(next_appointment_date AS CHAR) AS next_appointment_date,
                        CAST(scan_date AS CHAR) AS scan_date,
                        CAST(services_total_cost AS CHAR) AS services_total_cost,
                        CAST(status AS SIGNED) AS status,
                        CAST(draft_status AS SIGNED) AS draft_status,
                        CAST(submitted_status AS SIGNED) AS submitted_status,
                        CAST(completed_status AS SIGNED) AS completed_status,
                        CAST(archived_status AS SIGNED) AS archived_status,
                        CAST(assigned_radiologist_id AS SIGNED) AS assigned_radiologist_id,
                        CAST(revenue_amount AS CHAR) AS revenue_amount,
                        CAST(review_status AS CHAR) AS review_status,
                        case_result_summary, internal_comments,
                        CAST(add_time AS CHAR) AS add_time,
                        CAST(update_time AS CHAR) AS update_time,
                        CAST(submitted_date AS CHAR) AS submitted_date,
                        CAST(completed_date AS CHAR) AS completed_date,
                        reffering_doctor
                 FROM tbl_cases ORDER BY cases_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCase {
                    cases_id: LegacyCaseId(row.try_get("cases_id")?),
                    voxel_cases_id: text(row, "voxel_cases_id")?,
                    doctor_id: user(row, "doctor_id")?,
                    next_appointment_date: text(row, "next_appointment_date")?,
                    scan_date: text(row, "scan_date")?,
                    services_total_cost: text(row, "services_total_cost")?,
                    status: int(row, "status")?,
                    draft_status: int(row, "draft_status")?,
                    submitted_status: int(row, "submitted_status")?,
                    completed_status: int(row, "completed_status")?,
                    archived_status: int(row, "archived_status")?,
                    assigned_radiologist_id: user(row, "assigned_radiologist_id")?,
                    revenue_amount: text(row, "revenue_amount")?,
                    review_status: text(row, "review_status")?,
                    case_result_summary: text(row, "case_result_summary")?,
                    internal_comments: text(row, "internal_comments")?,
                    add_time: text(row, "add_time")?,
                    update_time: text(row, "update_time")?,
                    submitted_date: text(row, "submitted_date")?,
                    completed_date: text(row, "completed_date")?,
                    reffering_doctor: text(row, "reffering_doctor")?,
                })
            })
            .collect()
    }

    async fn case_files(&self) -> Result<Vec<LegacyCaseFile>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_file_id AS SIGNED) AS cases_file_id,
                        CAST(cases_id AS SIGNED) AS cases_id,
                        filetitle,
                        CAST(filesize AS CHAR) AS filesize,
                        bucket_url,
                        CAST(uploaded_by AS SIGNED) AS uploaded_by,
                        usertype
                 FROM tbl_cases_files_new ORDER BY cases_file_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCaseFile {
                    cases_file_id: row.try_get("cases_file_id")?,
                    cases_id: case(row, "cases_id")?,
                    filetitle: text(row, "filetitle")?,
                    filesize: text(row, "filesize")?,
                    bucket_url: text(row, "bucket_url")?,
                    uploaded_by: user(row, "uploaded_by")?,
                    usertype: text(row, "usertype")?,
                })
            })
            .collect()
    }

    async fn study_purposes(&self) -> Result<Vec<LegacyStudyPurpose>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(study_purposes_id AS SIGNED) AS study_purposes_id,
                        CAST(cases_id AS SIGNED) AS cases_id,
                        CAST(doctor_id AS SIGNED) AS doctor_id,
                        CAST(airway AS SIGNED) AS airway,
                        CAST(general AS SIGNED) AS general,
                        CAST(impaction AS SIGNED) AS impaction,
                        CAST(implant AS SIGNED) AS implant,
                        CAST(orthodontic AS SIGNED) AS orthodontic,
                        CAST(pathology AS SIGNED) AS pathology,
                        CAST(sinus AS SIGNED) AS sinus,
                        CAST(pain AS SIGNED) AS pain,
                        CAST(doctors_notes AS BINARY) AS doctors_notes,
                        CAST(cases_comments AS BINARY) AS cases_comments,
                        CAST(update_time AS CHAR) AS update_time
                 FROM tbl_study_purposes ORDER BY study_purposes_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyStudyPurpose {
                    study_purposes_id: row.try_get("study_purposes_id")?,
                    cases_id: case(row, "cases_id")?,
                    doctor_id: user(row, "doctor_id")?,
                    flags: StudyPurposeFlags {
                        airway: int(row, "airway")?,
                        general: int(row, "general")?,
                        impaction: int(row, "impaction")?,
                        implant: int(row, "implant")?,
                        orthodontic: int(row, "orthodontic")?,
                        pathology: int(row, "pathology")?,
                        sinus: int(row, "sinus")?,
                        pain: int(row, "pain")?,
                    },
                    doctors_notes: row.try_get("doctors_notes")?,
                    cases_comments: row.try_get("cases_comments")?,
                    update_time: text(row, "update_time")?,
                })
            })
            .collect()
    }

    async fn case_patients(&self) -> Result<Vec<LegacyCasePatient>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_id AS SIGNED) AS cases_id,
                        patient_firstname, patient_lastname, gender,
                        CAST(dob AS CHAR) AS dob,
                        CAST(doctor_id AS SIGNED) AS doctor_id
                 FROM tbl_cases
                 WHERE patient_firstname IS NOT NULL AND patient_firstname <> ''
                   AND patient_lastname IS NOT NULL AND patient_lastname <> ''
                 ORDER BY cases_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCasePatient {
                    cases_id: LegacyCaseId(row.try_get("cases_id")?),
                    patient_firstname: row.try_get("patient_firstname")?,
                    patient_lastname: row.try_get("patient_lastname")?,
                    gender: text(row, "gender")?,
                    dob: text(row, "dob")?,
                    doctor_id: user(row, "doctor_id")?,
                })
            })
            .collect()
    }

    async fn case_reports(&self) -> Result<Vec<LegacyCaseReport>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_report_id AS SIGNED) AS cases_report_id,
                        CAST(cases_id AS SIGNED) AS cases_id,
                        CAST(doctors_id AS SIGNED) AS doctors_id,
                        CAST(add_services_id AS SIGNED) AS add_services_id,
                        services_name,
                        CAST(price AS CHAR) AS price,
                        CAST(rush_fee AS CHAR) AS rush_fee,
                        CAST(status AS CHAR) AS status,
                        CAST(add_time AS CHAR) AS add_time
                 FROM tbl_cases_report ORDER BY cases_report_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCaseReport {
                    cases_report_id: row.try_get("cases_report_id")?,
                    cases_id: case(row, "cases_id")?,
                    doctors_id: user(row, "doctors_id")?,
                    add_services_id: int(row, "add_services_id")?.map(LegacyServiceId),
                    services_name: text(row, "services_name")?,
                    price: text(row, "price")?,
                    rush_fee: text(row, "rush_fee")?,
                    status: text(row, "status")?,
                    add_time: text(row, "add_time")?,
                })
            })
            .collect()
    }

    async fn services(&self) -> Result<Vec<LegacyService>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(services_id AS SIGNED) AS services_id, services_name
                 FROM tbl_add_services ORDER BY services_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyService {
                    services_id: LegacyServiceId(row.try_get("services_id")?),
                    services_name: text(row, "services_name")?,
                })
            })
            .collect()
    }

    async fn case_keys(&self) -> Result<Vec<LegacyCaseKey>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_id AS SIGNED) AS cases_id,
                        CAST(voxel_cases_id AS CHAR) AS voxel_cases_id
                 FROM tbl_cases ORDER BY cases_id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCaseKey {
                    cases_id: LegacyCaseId(row.try_get("cases_id")?),
                    voxel_cases_id: text(row, "voxel_cases_id")?,
                })
            })
            .collect()
    }

    async fn case_invoice_links(
        &self,
    ) -> Result<Vec<LegacyCaseInvoiceLink>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(case_id AS SIGNED) AS case_id,
                        CAST(client_invoice_id AS SIGNED) AS client_invoice_id
                 FROM tbl_client_invoice_details
                 WHERE case_id IS NOT NULL AND client_invoice_id IS NOT NULL
                 ORDER BY id",
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyCaseInvoiceLink {
                    case_id: LegacyCaseId(row.try_get("case_id")?),
                    client_invoice_id: LegacyInvoiceId(row.try_get("client_invoice_id")?),
                })
            })
            .collect()
    }

    async fn user_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError> {
        let rows = self
            .fetch("SELECT CAST(user_id AS SIGNED) AS id FROM tbl_users")
            .await?;
        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyUserId(row.try_get("id")?))
            })
            .collect()
    }

    async fn radiologist_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError> {
        let rows = self
            .fetch("SELECT CAST(radiologist_id AS SIGNED) AS id FROM tbl_radiologist")
            .await?;
        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok(LegacyUserId(row.try_get("id")?))
            })
            .collect()
    }

    async fn duplicate_study_purpose_cases(
        &self,
    ) -> Result<Vec<(LegacyCaseId, i64)>, SourceRepositoryError> {
        let rows = self
            .fetch(
                "SELECT CAST(cases_id AS SIGNED) AS cases_id, COUNT(*) AS total
                 FROM tbl_study_purposes
                 WHERE cases_id IS NOT NULL
                 GROUP BY cases_id HAVING COUNT(*) > 1
                 ORDER BY cases_id",
            )
            .await?;
        rows.iter()
            .map(|row| -> Result<_, SourceRepositoryError> {
                Ok((LegacyCaseId(row.try_get("cases_id")?), row.try_get("total")?))
            })
            .collect()
    }

    async fn count_study_purpose_cases(&self) -> Result<i64, SourceRepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT cases_id) FROM tbl_study_purposes WHERE cases_id IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count(&self, table: LegacyTable) -> Result<i64, SourceRepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
