// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for per-name job metadata.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::instrument;

use foreman_core::JobDefinition;

use crate::error::{DbError, Result};

/// Repository trait for job definitions.
#[async_trait]
pub trait JobDefinitionRepository: Send + Sync {
	async fn save(&self, definition: &JobDefinition) -> Result<()>;
	async fn find(&self, name: &str) -> Result<Option<JobDefinition>>;
	async fn find_all(&self) -> Result<Vec<JobDefinition>>;
	async fn set_disabled(&self, name: &str, disabled: bool) -> Result<()>;
	async fn clear(&self) -> Result<()>;

	/// Seed the well-known `JOBS` sentinel used as the repository-wide
	/// execution semaphore. Existing sentinel rows are left untouched.
	async fn ensure_global_semaphore(&self) -> Result<()>;
}

/// SQLite implementation of the job definition repository.
#[derive(Clone)]
pub struct SqliteJobDefinitionRepository {
	pool: SqlitePool,
}

impl SqliteJobDefinitionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl JobDefinitionRepository for SqliteJobDefinitionRepository {
	#[instrument(skip(self, definition), fields(job_name = %definition.name))]
	async fn save(&self, definition: &JobDefinition) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO job_definitions (name, timeout_period, polling_interval, remote, disabled)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(name) DO UPDATE SET
				timeout_period = excluded.timeout_period,
				polling_interval = excluded.polling_interval,
				remote = excluded.remote,
				disabled = excluded.disabled
			"#,
		)
		.bind(&definition.name)
		.bind(definition.timeout_period)
		.bind(definition.polling_interval)
		.bind(definition.remote)
		.bind(definition.disabled)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find(&self, name: &str) -> Result<Option<JobDefinition>> {
		let row = sqlx::query_as::<_, (String, i64, i64, bool, bool)>(
			r#"
			SELECT name, timeout_period, polling_interval, remote, disabled
			FROM job_definitions
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(
			|(name, timeout_period, polling_interval, remote, disabled)| JobDefinition {
				name,
				timeout_period,
				polling_interval,
				remote,
				disabled,
			},
		))
	}

	#[instrument(skip(self))]
	async fn find_all(&self) -> Result<Vec<JobDefinition>> {
		let rows = sqlx::query_as::<_, (String, i64, i64, bool, bool)>(
			r#"
			SELECT name, timeout_period, polling_interval, remote, disabled
			FROM job_definitions
			ORDER BY name ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(
			rows
				.into_iter()
				.map(
					|(name, timeout_period, polling_interval, remote, disabled)| JobDefinition {
						name,
						timeout_period,
						polling_interval,
						remote,
						disabled,
					},
				)
				.collect(),
		)
	}

	#[instrument(skip(self), fields(job_name = %name, disabled = disabled))]
	async fn set_disabled(&self, name: &str, disabled: bool) -> Result<()> {
		let result = sqlx::query("UPDATE job_definitions SET disabled = ? WHERE name = ?")
			.bind(disabled)
			.bind(name)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(name.to_string()));
		}

		Ok(())
	}

	#[instrument(skip(self))]
	async fn clear(&self) -> Result<()> {
		sqlx::query("DELETE FROM job_definitions")
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn ensure_global_semaphore(&self) -> Result<()> {
		let sentinel = JobDefinition::global_semaphore();
		sqlx::query(
			r#"
			INSERT INTO job_definitions (name, timeout_period, polling_interval, remote, disabled)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(name) DO NOTHING
			"#,
		)
		.bind(&sentinel.name)
		.bind(sentinel.timeout_period)
		.bind(sentinel.polling_interval)
		.bind(sentinel.remote)
		.bind(sentinel.disabled)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_job_test_pool;

	async fn repo() -> SqliteJobDefinitionRepository {
		SqliteJobDefinitionRepository::new(create_job_test_pool().await)
	}

	#[tokio::test]
	async fn save_and_find_definition() {
		let repo = repo().await;

		let def = JobDefinition::new("import", 60_000, 5_000);
		repo.save(&def).await.unwrap();

		let found = repo.find("import").await.unwrap().unwrap();
		assert_eq!(found, def);
	}

	#[tokio::test]
	async fn save_upserts_existing_definition() {
		let repo = repo().await;

		repo.save(&JobDefinition::new("import", 60_000, 5_000)).await.unwrap();
		repo
			.save(&JobDefinition::new("import", 120_000, 10_000).remote(true))
			.await
			.unwrap();

		let found = repo.find("import").await.unwrap().unwrap();
		assert_eq!(found.timeout_period, 120_000);
		assert_eq!(found.polling_interval, 10_000);
		assert!(found.remote);
	}

	#[tokio::test]
	async fn find_missing_definition() {
		let repo = repo().await;
		assert!(repo.find("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn find_all_sorted_by_name() {
		let repo = repo().await;
		repo.save(&JobDefinition::new("import", 1, 1)).await.unwrap();
		repo.save(&JobDefinition::new("export", 1, 1)).await.unwrap();

		let all = repo.find_all().await.unwrap();
		assert_eq!(all.len(), 2);
		assert_eq!(all[0].name, "export");
		assert_eq!(all[1].name, "import");
	}

	#[tokio::test]
	async fn set_disabled_toggles_flag() {
		let repo = repo().await;
		repo.save(&JobDefinition::new("import", 60_000, 5_000)).await.unwrap();

		repo.set_disabled("import", true).await.unwrap();
		assert!(repo.find("import").await.unwrap().unwrap().disabled);

		repo.set_disabled("import", false).await.unwrap();
		assert!(!repo.find("import").await.unwrap().unwrap().disabled);
	}

	#[tokio::test]
	async fn set_disabled_unknown_name_is_not_found() {
		let repo = repo().await;
		let result = repo.set_disabled("missing", true).await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}

	#[tokio::test]
	async fn ensure_global_semaphore_is_idempotent() {
		let repo = repo().await;

		repo.ensure_global_semaphore().await.unwrap();
		repo.ensure_global_semaphore().await.unwrap();

		let sentinel = repo
			.find(JobDefinition::GLOBAL_SEMAPHORE)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(sentinel.timeout_period, 0);
		assert_eq!(sentinel.polling_interval, 0);
	}

	#[tokio::test]
	async fn clear_removes_definitions() {
		let repo = repo().await;
		repo.save(&JobDefinition::new("import", 1, 1)).await.unwrap();

		repo.clear().await.unwrap();
		assert!(repo.find("import").await.unwrap().is_none());
	}
}
