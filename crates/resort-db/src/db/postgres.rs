use crate::db::entity_store::EntityStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use resort_core::models::{
    EntityKind, EntityRef, RetentionCandidate, SensitiveDocumentRef, VersionedCollection,
};
use resort_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Postgres entity store
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn select_images_sql(kind: EntityKind) -> String {
    format!(
        "SELECT images, images_version FROM {} WHERE id = $1",
        kind.table_name()
    )
}

fn select_version_sql(kind: EntityKind) -> String {
    format!(
        "SELECT images_version FROM {} WHERE id = $1",
        kind.table_name()
    )
}

fn update_images_sql(kind: EntityKind) -> String {
    format!(
        r#"
        UPDATE {}
        SET images = $1, images_version = images_version + 1, updated_at = NOW()
        WHERE id = $2 AND images_version = $3
        RETURNING images_version
        "#,
        kind.table_name()
    )
}

#[async_trait]
impl EntityStore for PgEntityStore {
    #[tracing::instrument(skip(self), fields(db.table = "bookings", db.operation = "select"))]
    async fn find_candidates_for_retention(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<RetentionCandidate>, AppError> {
        let candidates = sqlx::query_as::<Postgres, RetentionCandidate>(
            r#"
            SELECT id AS booking_id,
                   license_url AS document_url,
                   license_uploaded_at AS document_uploaded_at,
                   check_in AS eligibility_date,
                   document_purge_attempts AS purge_attempts
            FROM bookings
            WHERE license_url IS NOT NULL
              AND license_url <> ''
              AND check_in <= $1
            ORDER BY check_in ASC, id ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    #[tracing::instrument(skip(self, expected_url), fields(db.table = "bookings", db.operation = "update", db.record_id = %booking_id))]
    async fn clear_document_ref(
        &self,
        booking_id: Uuid,
        expected_url: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET license_url = NULL,
                license_uploaded_at = NULL,
                document_purge_attempts = 0,
                updated_at = NOW()
            WHERE id = $1 AND license_url = $2
            "#,
        )
        .bind(booking_id)
        .bind(expected_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing cleared: either the booking is gone or it references another document
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1)",
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        if !exists {
            return Err(AppError::NotFound(format!("booking {}", booking_id)));
        }
        Ok(false)
    }

    #[tracing::instrument(skip(self), fields(db.table = "bookings", db.operation = "select", db.record_id = %booking_id))]
    async fn read_document_ref(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<SensitiveDocumentRef>, AppError> {
        let row = sqlx::query_as::<Postgres, (Option<String>, Option<DateTime<Utc>>)>(
            "SELECT license_url, license_uploaded_at FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        let (url, uploaded_at) =
            row.ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;

        Ok(url
            .filter(|u| !u.is_empty())
            .map(|url| SensitiveDocumentRef { url, uploaded_at }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "bookings", db.operation = "update", db.record_id = %booking_id))]
    async fn record_purge_failure(&self, booking_id: Uuid) -> Result<i32, AppError> {
        let attempts = sqlx::query_scalar::<Postgres, i32>(
            r#"
            UPDATE bookings
            SET document_purge_attempts = document_purge_attempts + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING document_purge_attempts
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        attempts.ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))
    }

    #[tracing::instrument(skip(self, url), fields(db.table = "bookings", db.operation = "update", db.record_id = %booking_id))]
    async fn attach_document(
        &self,
        booking_id: Uuid,
        url: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET license_url = $2,
                license_uploaded_at = $3,
                document_purge_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(url)
        .bind(uploaded_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("booking {}", booking_id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = %entity.kind.table_name(), db.operation = "select", db.record_id = %entity.id))]
    async fn read_image_collection(
        &self,
        entity: EntityRef,
    ) -> Result<VersionedCollection, AppError> {
        let sql = select_images_sql(entity.kind);
        let row = sqlx::query_as::<Postgres, (Vec<String>, i64)>(&sql)
            .bind(entity.id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((images, version)) => Ok(VersionedCollection {
                images: images.into(),
                version,
            }),
            None => Err(AppError::NotFound(entity.to_string())),
        }
    }

    #[tracing::instrument(skip(self, images), fields(db.table = %entity.kind.table_name(), db.operation = "update", db.record_id = %entity.id, images = images.len()))]
    async fn write_image_collection(
        &self,
        entity: EntityRef,
        images: &[String],
        expected_version: i64,
    ) -> Result<i64, AppError> {
        let sql = update_images_sql(entity.kind);
        let new_version = sqlx::query_scalar::<Postgres, i64>(&sql)
            .bind(images)
            .bind(entity.id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(version) = new_version {
            return Ok(version);
        }

        // Nothing updated: either the row is gone or someone wrote first
        let sql = select_version_sql(entity.kind);
        let actual = sqlx::query_scalar::<Postgres, i64>(&sql)
            .bind(entity.id)
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => Err(AppError::VersionConflict {
                expected: expected_version,
                actual: Some(actual),
            }),
            None => Err(AppError::NotFound(entity.to_string())),
        }
    }
}
