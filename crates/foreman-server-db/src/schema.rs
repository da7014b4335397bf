// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table and index creation for the job store.

use sqlx::SqlitePool;

use crate::error::Result;

/// Create the job tables and their indexes if they do not exist.
///
/// The UNIQUE index on `(name, running_state)` is the mutual-exclusion
/// mechanism for the whole cluster: it admits one QUEUED and one RUNNING
/// record per name while finished records, whose state is a unique
/// `FINISHED_<uuid>` token, accumulate freely underneath it.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS job_infos (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL,
			host TEXT NOT NULL,
			thread TEXT NOT NULL,
			creation_time TEXT NOT NULL,
			start_time TEXT,
			finish_time TEXT,
			last_modification_time TEXT NOT NULL,
			running_state TEXT NOT NULL,
			result_state TEXT,
			result_message TEXT,
			status_message TEXT,
			execution_priority TEXT NOT NULL,
			max_execution_time INTEGER NOT NULL,
			max_idle_time INTEGER,
			parameters TEXT NOT NULL DEFAULT '{}',
			additional_data TEXT NOT NULL DEFAULT '{}',
			log_lines TEXT NOT NULL DEFAULT '[]'
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_infos_name ON job_infos(name)")
		.execute(pool)
		.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_job_infos_last_modification_time ON job_infos(last_modification_time)",
	)
	.execute(pool)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_job_infos_running_state_creation_time ON job_infos(running_state, creation_time)",
	)
	.execute(pool)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_job_infos_name_creation_time ON job_infos(name, creation_time)",
	)
	.execute(pool)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_job_infos_name_running_state ON job_infos(name, running_state)",
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS job_definitions (
			name TEXT PRIMARY KEY,
			timeout_period INTEGER NOT NULL,
			polling_interval INTEGER NOT NULL,
			remote INTEGER NOT NULL DEFAULT 0,
			disabled INTEGER NOT NULL DEFAULT 0
		)
		"#,
	)
	.execute(pool)
	.await?;

	tracing::debug!("job store migrations applied");
	Ok(())
}
