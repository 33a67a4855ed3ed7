// SQLite JobRepository Implementation

use async_trait::async_trait;
use renderq_core::domain::{Job, JobId, JobStatus};
use renderq_core::error::{AppError, Result};
use renderq_core::port::generation_client::OperationHandle;
use renderq_core::port::JobRepository;
use sqlx::SqlitePool;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, shot_id, title, operation, status, created_at, file_path)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.shot_id)
        .bind(&job.title)
        .bind(job.operation.as_str())
        .bind(job.status.to_string())
        .bind(job.created_at)
        .bind(&job.file_path)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_job()))
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|r| r.into_job()).collect())
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM jobs WHERE status = ? ORDER BY created_at ASC")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|r| r.into_job()).collect())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        file_path: Option<&str>,
    ) -> Result<()> {
        // Conditional update: a DONE job never regresses, even if a stale
        // poller task finishes late
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, file_path = COALESCE(?, file_path)
            WHERE id = ? AND status != 'DONE'
            "#,
        )
        .bind(status.to_string())
        .bind(file_path)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            // Diagnose: missing row vs refused transition
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

            match current {
                None => Err(AppError::NotFound(format!("Job {} not found", id))),
                Some(current_status) => Err(AppError::InvalidState(format!(
                    "Cannot update job {} from {} to {}",
                    id, current_status, status
                ))),
            }
        } else {
            Ok(())
        }
    }

    async fn delete(&self, id: &JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    shot_id: Option<String>,
    title: Option<String>,
    operation: String,
    status: String,
    created_at: i64,
    file_path: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Job {
        let status = match self.status.as_str() {
            "DONE" => JobStatus::Done,
            _ => JobStatus::Pending,
        };

        Job {
            id: self.id,
            shot_id: self.shot_id,
            title: self.title,
            operation: OperationHandle::new(self.operation),
            status,
            created_at: self.created_at,
            file_path: self.file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_repo() -> SqliteJobRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobRepository::new(pool)
    }

    fn job(id: &str, created_at: i64) -> Job {
        Job::new(
            id,
            created_at,
            Some(format!("{}-shot", id)),
            Some(format!("{} title", id)),
            OperationHandle::new(format!("operations/{}", id)),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_repo().await;
        let job = job("job-1", 1_000);

        repo.insert(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.operation, job.operation);
        assert!(found.file_path.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let repo = setup_repo().await;
        let job = job("job-1", 1_000);

        repo.insert(&job).await.unwrap();
        let err = repo.insert(&job).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_find_by_status_oldest_first() {
        let repo = setup_repo().await;
        repo.insert(&job("job-2", 2_000)).await.unwrap();
        repo.insert(&job("job-1", 1_000)).await.unwrap();

        let pending = repo.find_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "job-1");
        assert_eq!(pending[1].id, "job-2");

        assert!(repo
            .find_by_status(JobStatus::Done)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let repo = setup_repo().await;
        repo.insert(&job("job-1", 1_000)).await.unwrap();
        repo.insert(&job("job-2", 2_000)).await.unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all[0].id, "job-2");
        assert_eq!(all[1].id, "job-1");
    }

    #[tokio::test]
    async fn test_update_status_marks_done_with_path() {
        let repo = setup_repo().await;
        repo.insert(&job("job-1", 1_000)).await.unwrap();

        repo.update_status(
            &"job-1".to_string(),
            JobStatus::Done,
            Some("/videos/job-1.mp4"),
        )
        .await
        .unwrap();

        let found = repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Done);
        assert_eq!(found.file_path.as_deref(), Some("/videos/job-1.mp4"));
        assert_eq!(repo.count_by_status(JobStatus::Done).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_done_job_never_regresses_to_pending() {
        let repo = setup_repo().await;
        repo.insert(&job("job-1", 1_000)).await.unwrap();
        repo.update_status(
            &"job-1".to_string(),
            JobStatus::Done,
            Some("/videos/job-1.mp4"),
        )
        .await
        .unwrap();

        let err = repo
            .update_status(&"job-1".to_string(), JobStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let found = repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Done);
        assert_eq!(found.file_path.as_deref(), Some("/videos/job-1.mp4"));
    }

    #[tokio::test]
    async fn test_update_status_unknown_job_is_not_found() {
        let repo = setup_repo().await;
        let err = repo
            .update_status(&"ghost".to_string(), JobStatus::Done, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_was_removed() {
        let repo = setup_repo().await;
        repo.insert(&job("job-1", 1_000)).await.unwrap();

        assert!(repo.delete(&"job-1".to_string()).await.unwrap());
        assert!(!repo.delete(&"job-1".to_string()).await.unwrap());
        assert!(repo.find_by_id(&"job-1".to_string()).await.unwrap().is_none());
    }
}
