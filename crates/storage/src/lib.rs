use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    Ethnicity, Gender, Race, RecipientFields, RecipientId, RecipientRecord, RevisionMarker,
};

const RECIPIENT_COLUMNS: &str = "id, first_name, last_name, date_of_birth, gender, race, ethnicity, veteran_status, household_id, active_status";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every pooled connection to `sqlite::memory:` would open its own database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn current_revision(&self) -> Result<RevisionMarker> {
        let revision: i64 = sqlx::query_scalar("SELECT revision FROM store_revision WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .context("failed to read store revision")?;
        revision_marker(revision)
    }

    /// Lists every recipient together with the revision the list belongs to.
    pub async fn list_recipients(&self) -> Result<(RevisionMarker, Vec<RecipientRecord>)> {
        let mut tx = self.pool.begin().await?;
        let revision: i64 = sqlx::query_scalar("SELECT revision FROM store_revision WHERE id = 1")
            .fetch_one(&mut *tx)
            .await
            .context("failed to read store revision")?;
        let rows = sqlx::query(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients ORDER BY id ASC"
        ))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let records = rows
            .iter()
            .map(recipient_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((revision_marker(revision)?, records))
    }

    pub async fn recipient(&self, recipient_id: RecipientId) -> Result<Option<RecipientRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = ?"
        ))
        .bind(recipient_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(recipient_from_row).transpose()
    }

    pub async fn create_recipient(
        &self,
        fields: &RecipientFields,
    ) -> Result<(RecipientId, RevisionMarker)> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO recipients (first_name, last_name, date_of_birth, gender, race, ethnicity, veteran_status, household_id, active_status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.date_of_birth)
        .bind(fields.gender.as_str())
        .bind(fields.race.as_str())
        .bind(fields.ethnicity.as_str())
        .bind(fields.veteran_status)
        .bind(&fields.household_id)
        .bind(fields.active_status)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert recipient")?;
        let recipient_id = RecipientId(rec.get::<i64, _>(0));
        let revision = bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok((recipient_id, revision))
    }

    /// Replaces every field of an existing recipient. Returns `None` and leaves
    /// the revision untouched when the id is unknown.
    pub async fn update_recipient(
        &self,
        recipient_id: RecipientId,
        fields: &RecipientFields,
    ) -> Result<Option<RevisionMarker>> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE recipients
             SET first_name = ?, last_name = ?, date_of_birth = ?, gender = ?, race = ?, ethnicity = ?,
                 veteran_status = ?, household_id = ?, active_status = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.date_of_birth)
        .bind(fields.gender.as_str())
        .bind(fields.race.as_str())
        .bind(fields.ethnicity.as_str())
        .bind(fields.veteran_status)
        .bind(&fields.household_id)
        .bind(fields.active_status)
        .bind(recipient_id.0)
        .execute(&mut *tx)
        .await
        .context("failed to update recipient")?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        let revision = bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(Some(revision))
    }

    pub async fn delete_recipient(
        &self,
        recipient_id: RecipientId,
    ) -> Result<Option<RevisionMarker>> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM recipients WHERE id = ?")
            .bind(recipient_id.0)
            .execute(&mut *tx)
            .await
            .context("failed to delete recipient")?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        let revision = bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(Some(revision))
    }
}

async fn bump_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<RevisionMarker> {
    let revision: i64 = sqlx::query_scalar(
        "UPDATE store_revision SET revision = revision + 1 WHERE id = 1 RETURNING revision",
    )
    .fetch_one(&mut **tx)
    .await
    .context("failed to advance store revision")?;
    revision_marker(revision)
}

fn revision_marker(revision: i64) -> Result<RevisionMarker> {
    u64::try_from(revision)
        .map(RevisionMarker)
        .with_context(|| format!("store revision {revision} is negative"))
}

fn recipient_from_row(r: &SqliteRow) -> Result<RecipientRecord> {
    let recipient_id = RecipientId(r.get::<i64, _>(0));
    let fields = RecipientFields {
        first_name: r.get::<String, _>(1),
        last_name: r.get::<String, _>(2),
        date_of_birth: r.get::<NaiveDate, _>(3),
        gender: Gender::from_str(&r.get::<String, _>(4))
            .with_context(|| format!("recipient {recipient_id} has a corrupt gender"))?,
        race: Race::from_str(&r.get::<String, _>(5))
            .with_context(|| format!("recipient {recipient_id} has a corrupt race"))?,
        ethnicity: Ethnicity::from_str(&r.get::<String, _>(6))
            .with_context(|| format!("recipient {recipient_id} has a corrupt ethnicity"))?,
        veteran_status: r.get::<bool, _>(7),
        household_id: r.get::<String, _>(8),
        active_status: r.get::<bool, _>(9),
    };
    Ok(RecipientRecord::new(recipient_id, fields))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
