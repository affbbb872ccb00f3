//! PostgreSQL implementation of the destination repository.
//!
//! Table and column identifiers are the quoted camel-case names of the
//! destination schema. Enum columns are bound as text and cast explicitly to
//! their enum types.
use crate::errors::TargetRepositoryError;
use crate::interfaces::{
    OrphanCheck, SampleQuery, TargetBatch, TargetRepository, TargetTable, WriteReceipt,
};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use voxel_migrate_shared::types::{
    CaseId, CaseKey, ClinicId, ClinicLocationId, ClinicLocationRef, ClinicOwner, LegacyUserId,
    MasterService, OwnerLocationLink, ServiceId, TargetUser, UserId,
};

/// PostgreSQL-backed destination repository.
pub struct PostgresTargetRepository {
    /// PostgreSQL connection pool
    pool: sqlx::PgPool,
}

impl PostgresTargetRepository {
    /// Creates a new PostgreSQL target repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool to a database carrying the destination schema
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresTargetRepository)` - Ready-to-use repository instance
    /// * `Err(TargetRepositoryError)` - Future validation errors (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, TargetRepositoryError> {
        Ok(Self { pool })
    }

    fn key_of(table: TargetTable) -> Result<&'static str, TargetRepositoryError> {
        table
            .primary_key()
            .ok_or(TargetRepositoryError::NoIntegerKey(table.as_str()))
    }

    async fn serial_sequence(
        &self,
        table: TargetTable,
    ) -> Result<Option<String>, TargetRepositoryError> {
        let key = Self::key_of(table)?;
        let sequence: Option<String> =
            sqlx::query_scalar("SELECT pg_get_serial_sequence($1, $2)")
                .bind(format!("\"{}\"", table.as_str()))
                .bind(key)
                .fetch_one(&self.pool)
                .await?;
        Ok(sequence)
    }
}

/// Doubles single quotes for use inside a SQL string literal.
fn literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Doubles double quotes for use inside a quoted SQL identifier.
fn identifier(value: &str) -> String {
    value.replace('"', "\"\"")
}

fn sample_line(row: &PgRow, columns: &[&str]) -> Result<String, sqlx::Error> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        let value: Option<String> = row.try_get(*column)?;
        parts.push(format!("{}={}", column, value.as_deref().unwrap_or("NULL")));
    }
    Ok(parts.join(" | "))
}

#[async_trait]
impl TargetRepository for PostgresTargetRepository {
    async fn users(&self) -> Result<Vec<TargetUser>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT "uId", email, "firstName", "lastName", "nameTitle",
                      "userType"::text AS "userType", olduserid
               FROM "Users" ORDER BY "uId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(TargetUser {
                    id: UserId(row.try_get("uId")?),
                    email: row.try_get("email")?,
                    first_name: row.try_get("firstName")?,
                    last_name: row.try_get("lastName")?,
                    name_title: row.try_get("nameTitle")?,
                    user_type: row.try_get("userType")?,
                    legacy_id: row
                        .try_get::<Option<i32>, _>("olduserid")?
                        .map(|id| LegacyUserId(i64::from(id))),
                })
            })
            .collect()
    }

    async fn clinic_owners(&self) -> Result<Vec<ClinicOwner>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT "cId", "ownerUserId", "isDeleted" FROM "Clinics" ORDER BY "cId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(ClinicOwner {
                    clinic_id: ClinicId(row.try_get("cId")?),
                    owner_user_id: row.try_get::<Option<i32>, _>("ownerUserId")?.map(UserId),
                    is_deleted: row
                        .try_get::<Option<bool>, _>("isDeleted")?
                        .unwrap_or(false),
                })
            })
            .collect()
    }

    async fn clinic_locations(&self) -> Result<Vec<ClinicLocationRef>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT "clId", "clinicId" FROM "ClinicLocations"
               WHERE "clinicId" IS NOT NULL ORDER BY "clId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(ClinicLocationRef {
                    location_id: ClinicLocationId(row.try_get("clId")?),
                    clinic_id: ClinicId(row.try_get("clinicId")?),
                })
            })
            .collect()
    }

    async fn owner_location_links(
        &self,
    ) -> Result<Vec<OwnerLocationLink>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT u.olduserid, cl."clId"
               FROM "Users" u
               JOIN "Clinics" c ON u."uId" = c."ownerUserId"
               JOIN "ClinicLocations" cl ON c."cId" = cl."clinicId"
               WHERE u.olduserid IS NOT NULL
               ORDER BY cl."clId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(OwnerLocationLink {
                    legacy_user_id: LegacyUserId(i64::from(row.try_get::<i32, _>("olduserid")?)),
                    location_id: ClinicLocationId(row.try_get("clId")?),
                })
            })
            .collect()
    }

    async fn master_services(&self) -> Result<Vec<MasterService>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT "sId", title FROM "MasterServices" WHERE title IS NOT NULL ORDER BY "sId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(MasterService {
                    id: ServiceId(row.try_get("sId")?),
                    title: row.try_get("title")?,
                })
            })
            .collect()
    }

    async fn case_keys(&self) -> Result<Vec<CaseKey>, TargetRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT "cId", "voxelCaseId"::text AS "voxelCaseId" FROM "Cases" ORDER BY "cId""#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, TargetRepositoryError> {
                Ok(CaseKey {
                    id: CaseId(row.try_get("cId")?),
                    voxel_case_id: row.try_get("voxelCaseId")?,
                })
            })
            .collect()
    }

    async fn key_set(&self, table: TargetTable) -> Result<HashSet<i32>, TargetRepositoryError> {
        let key = Self::key_of(table)?;
        let sql = format!(r#"SELECT "{}" FROM "{}""#, key, table.as_str());
        let keys: Vec<i32> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(keys.into_iter().collect())
    }

    async fn case_ids_with_patient(&self) -> Result<HashSet<CaseId>, TargetRepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"SELECT DISTINCT "caseId" FROM "CasePatients" WHERE "caseId" IS NOT NULL"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(CaseId).collect())
    }

    async fn invoice_type_labels(&self) -> Result<Vec<String>, TargetRepositoryError> {
        let labels: Vec<String> = sqlx::query_scalar(
            r#"SELECT unnest(enum_range(NULL::"enum_Invoices_invoiceType"))::text"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }

    async fn count(&self, table: TargetTable) -> Result<i64, TargetRepositoryError> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, table.as_str());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn count_linked_radiologists(&self) -> Result<i64, TargetRepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM "Users"
               WHERE "userType"::text = 'RADIOLOGIST' AND olduserid IS NOT NULL"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_orphans(&self, check: OrphanCheck) -> Result<i64, TargetRepositoryError> {
        let (child, column, parent, key) = check.relation();
        let sql = format!(
            r#"SELECT COUNT(*) FROM "{child}" c
               LEFT JOIN "{parent}" p ON c."{column}" = p."{key}"
               WHERE c."{column}" IS NOT NULL AND p."{key}" IS NULL"#
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn sample(
        &self,
        query: SampleQuery,
        limit: i64,
    ) -> Result<Vec<String>, TargetRepositoryError> {
        let (sql, columns): (&str, &[&str]) = match query {
            SampleQuery::ClinicsWithLocations => (
                r#"SELECT c."cId"::text AS "cId", c.title, c.address, c.status::text AS status,
                          cl."clId"::text AS "clId", cl.zipcode
                   FROM "Clinics" c JOIN "ClinicLocations" cl ON c."cId" = cl."clinicId"
                   ORDER BY c."cId" DESC LIMIT $1"#,
                &["cId", "title", "address", "status", "clId", "zipcode"],
            ),
            SampleQuery::CasePatients => (
                r#"SELECT cp."caseId"::text AS "caseId", cp."firstName", cp."lastName",
                          cp.gender::text AS gender, cp.dob::text AS dob,
                          clp."clinicId"::text AS "clinicId"
                   FROM "CasePatients" cp
                   JOIN "ClinicPatients" clp ON cp."clinicPatientId" = clp."cpId"
                   ORDER BY cp."cpId" DESC LIMIT $1"#,
                &["caseId", "firstName", "lastName", "gender", "dob", "clinicId"],
            ),
            SampleQuery::CaseServices => (
                r#"SELECT cs."csId"::text AS "csId", cs."caseId"::text AS "caseId", ms.title,
                          cs.amount::text AS amount, cs."hasRush"::text AS "hasRush"
                   FROM "CaseServices" cs
                   JOIN "MasterServices" ms ON cs."serviceId" = ms."sId"
                   ORDER BY cs."csId" LIMIT $1"#,
                &["csId", "caseId", "title", "amount", "hasRush"],
            ),
        };

        let rows = sqlx::query(sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| sample_line(row, columns).map_err(TargetRepositoryError::from))
            .collect()
    }

    async fn truncate(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        let sql = format!(r#"TRUNCATE TABLE "{}" RESTART IDENTITY CASCADE"#, table.as_str());
        sqlx::query(&sql).execute(&self.pool).await?;
        info!(table = table.as_str(), "Table truncated and sequence reset");
        Ok(())
    }

    async fn delete_all(&self, table: TargetTable) -> Result<u64, TargetRepositoryError> {
        let sql = format!(r#"DELETE FROM "{}""#, table.as_str());
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        info!(table = table.as_str(), deleted = result.rows_affected(), "Cleared table");
        Ok(result.rows_affected())
    }

    async fn drop_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        let key = Self::key_of(table)?;
        let sql = format!(
            r#"ALTER TABLE "{}" ALTER COLUMN "{}" DROP DEFAULT"#,
            table.as_str(),
            key
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(table = table.as_str(), key, "Dropped key default");
        Ok(())
    }

    async fn restore_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        let key = Self::key_of(table)?;
        let Some(sequence) = self.serial_sequence(table).await? else {
            warn!(table = table.as_str(), key, "No serial sequence owns the key; default not restored");
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let set_default = format!(
            r#"ALTER TABLE "{}" ALTER COLUMN "{}" SET DEFAULT nextval('{}'::regclass)"#,
            table.as_str(),
            key,
            literal(&sequence)
        );
        sqlx::query(&set_default).execute(&mut *tx).await?;

        let advance = format!(
            r#"SELECT setval('{}'::regclass, COALESCE(MAX("{}"), 0) + 1, false) FROM "{}""#,
            literal(&sequence),
            key,
            table.as_str()
        );
        sqlx::query(&advance).execute(&mut *tx).await?;
        tx.commit().await?;

        info!(table = table.as_str(), key, sequence = %sequence, "Restored key default");
        Ok(())
    }

    async fn set_triggers_enabled(
        &self,
        table: TargetTable,
        enabled: bool,
    ) -> Result<(), TargetRepositoryError> {
        let action = if enabled { "ENABLE" } else { "DISABLE" };
        let sql = format!(r#"ALTER TABLE "{}" {} TRIGGER ALL"#, table.as_str(), action);
        sqlx::query(&sql).execute(&self.pool).await?;
        info!(table = table.as_str(), enabled, "Toggled triggers");
        Ok(())
    }

    async fn drop_triggers(&self, table: TargetTable) -> Result<u64, TargetRepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT trigger_name::text FROM information_schema.triggers
             WHERE event_object_table = $1",
        )
        .bind(table.as_str())
        .fetch_all(&self.pool)
        .await?;

        for name in &names {
            let sql = format!(
                r#"DROP TRIGGER IF EXISTS "{}" ON "{}""#,
                identifier(name),
                table.as_str()
            );
            sqlx::query(&sql).execute(&self.pool).await?;
            info!(table = table.as_str(), trigger = %name, "Dropped trigger");
        }
        Ok(names.len() as u64)
    }

    async fn install_radiologist_invoice_no_trigger(&self) -> Result<(), TargetRepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"CREATE OR REPLACE FUNCTION generate_radiologist_invoice_no()
               RETURNS TRIGGER AS $$
               BEGIN
                   IF NEW."invoiceNo" IS NULL OR NEW."invoiceNo" = '' THEN
                       NEW."invoiceNo" := 'RI-' || NEW."riId"::text;
                   END IF;
                   RETURN NEW;
               END;
               $$ LANGUAGE plpgsql"#,
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(r#"DROP TRIGGER IF EXISTS radiologist_invoice_no_trigger ON "RadiologistInvoices""#)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"CREATE TRIGGER radiologist_invoice_no_trigger
               BEFORE INSERT ON "RadiologistInvoices"
               FOR EACH ROW EXECUTE FUNCTION generate_radiologist_invoice_no()"#,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        info!("Installed invoiceNo trigger on RadiologistInvoices");
        Ok(())
    }

    async fn reactivate_master_services(&self) -> Result<u64, TargetRepositoryError> {
        let result =
            sqlx::query(r#"UPDATE "MasterServices" SET "isDeleted" = false WHERE "isDeleted" = true"#)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn ensure_legacy_id_column(&self) -> Result<bool, TargetRepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_name = 'Users' AND column_name = 'olduserid'
             )",
        )
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Ok(false);
        }
        sqlx::query(r#"ALTER TABLE "Users" ADD COLUMN olduserid INTEGER"#)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn ensure_enum_value(
        &self,
        enum_type: &str,
        value: &str,
    ) -> Result<bool, TargetRepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM pg_enum e JOIN pg_type t ON e.enumtypid = t.oid
                WHERE t.typname = $1 AND e.enumlabel = $2
             )",
        )
        .bind(enum_type)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Ok(false);
        }
        let sql = format!(
            r#"ALTER TYPE "{}" ADD VALUE '{}'"#,
            identifier(enum_type),
            literal(value)
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(true)
    }

    async fn begin_batch(&self) -> Result<Box<dyn TargetBatch>, TargetRepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(super::PostgresTargetBatch::new(tx)))
    }
}
