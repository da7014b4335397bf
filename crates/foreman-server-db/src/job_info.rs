// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for per-execution job records.
//!
//! Two write classes exist on purpose. State transitions (create,
//! activate, finish) are acknowledged writes whose errors surface to the
//! caller; the unique `(name, running_state)` index arbitrates races
//! between hosts. Telemetry updates (log lines, status message,
//! additional data, host/thread refresh) are best-effort: failures are
//! logged and swallowed so a runnable never blocks on them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

use foreman_core::{
	ExecutionPriority, JobInfo, JobInfoId, LogLine, ResultCode, RunningState,
};

use crate::error::{render_error_chain, DbError, Result};

/// Fields supplied when a new execution record is created.
#[derive(Debug, Clone)]
pub struct NewJobInfo {
	pub name: String,
	pub host: String,
	pub thread: String,
	pub max_execution_time: i64,
	pub running_state: RunningState,
	pub execution_priority: ExecutionPriority,
	pub parameters: BTreeMap<String, String>,
	pub additional_data: BTreeMap<String, String>,
}

impl NewJobInfo {
	pub fn new(
		name: impl Into<String>,
		host: impl Into<String>,
		thread: impl Into<String>,
		max_execution_time: i64,
		running_state: RunningState,
	) -> Self {
		Self {
			name: name.into(),
			host: host.into(),
			thread: thread.into(),
			max_execution_time,
			running_state,
			execution_priority: ExecutionPriority::default(),
			parameters: BTreeMap::new(),
			additional_data: BTreeMap::new(),
		}
	}

	pub fn with_priority(mut self, priority: ExecutionPriority) -> Self {
		self.execution_priority = priority;
		self
	}

	pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
		self.parameters = parameters;
		self
	}

	pub fn with_additional_data(mut self, additional_data: BTreeMap<String, String>) -> Self {
		self.additional_data = additional_data;
		self
	}
}

/// Repository trait for job execution records.
#[async_trait]
pub trait JobInfoRepository: Send + Sync {
	/// Insert a new record. Returns `Ok(None)` when the unique
	/// `(name, running_state)` index rejected the insert because another
	/// record already occupies that slot.
	async fn create(&self, new_job: &NewJobInfo) -> Result<Option<JobInfoId>>;

	// Queries
	async fn find_by_id(&self, id: JobInfoId) -> Result<Option<JobInfo>>;
	async fn find_by_name_and_running_state(
		&self,
		name: &str,
		state: &RunningState,
	) -> Result<Option<JobInfo>>;
	async fn find_by_name(&self, name: &str, limit: u32) -> Result<Vec<JobInfo>>;
	async fn find_by_name_and_time_range(
		&self,
		name: &str,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
		result_code: Option<ResultCode>,
	) -> Result<Vec<JobInfo>>;
	async fn find_most_recent(&self, name: &str) -> Result<Option<JobInfo>>;
	async fn find_most_recent_finished(&self, name: &str) -> Result<Option<JobInfo>>;
	async fn find_most_recent_by_name_and_result_state(
		&self,
		name: &str,
		result_set: &[ResultCode],
	) -> Result<Option<JobInfo>>;
	async fn find_queued_jobs_sorted_asc_by_creation_time(&self) -> Result<Vec<JobInfo>>;
	/// The most recent record of every distinct job name.
	async fn find_most_recent_per_name(&self) -> Result<Vec<JobInfo>>;
	async fn distinct_job_names(&self) -> Result<Vec<String>>;

	// State transitions
	/// Atomically transition the single QUEUED record for `name` to
	/// RUNNING. True iff exactly one record was updated; a duplicate-key
	/// race with another activator yields false.
	async fn activate_queued_job(&self, name: &str) -> Result<bool>;
	/// Transition the RUNNING record to a fresh `FINISHED_<uuid>` state.
	/// A second call finds no RUNNING record and returns false.
	async fn mark_running_as_finished(
		&self,
		name: &str,
		result_code: ResultCode,
		message: Option<String>,
	) -> Result<bool>;
	/// Same transition, keyed by id instead of name.
	async fn mark_as_finished_by_id(
		&self,
		id: JobInfoId,
		result_code: ResultCode,
		message: Option<String>,
	) -> Result<bool>;
	async fn mark_queued_as_not_executed(&self, name: &str) -> Result<bool>;
	/// Finish the RUNNING record for `name` with TIMED_OUT when its last
	/// modification is older than its own `max_execution_time`. No-op
	/// (false) when no such record exists.
	async fn remove_job_if_timed_out(&self, name: &str, now: DateTime<Utc>) -> Result<bool>;

	async fn mark_running_as_finished_with_error(
		&self,
		name: &str,
		error: &(dyn std::error::Error + Send + Sync + 'static),
	) -> Result<bool> {
		self
			.mark_running_as_finished(name, ResultCode::Failed, Some(render_error_chain(error)))
			.await
	}

	async fn mark_running_as_finished_successfully(&self, name: &str) -> Result<bool> {
		self
			.mark_running_as_finished(name, ResultCode::Successful, None)
			.await
	}

	// Best-effort telemetry writes; errors are logged and swallowed.
	async fn update_host_thread_information(&self, name: &str, host: &str, thread: &str);
	async fn add_additional_data(&self, name: &str, key: &str, value: &str);
	async fn set_status_message(&self, name: &str, message: &str);
	async fn add_log_line(&self, name: &str, line: &str);

	/// Append several log lines in one acknowledged write. True iff a
	/// RUNNING record for `name` existed.
	async fn append_log_lines(&self, name: &str, lines: &[LogLine]) -> Result<bool>;

	// Admin / retention primitives
	async fn clear(&self) -> Result<()>;
	async fn remove(&self, id: JobInfoId) -> Result<()>;
	async fn count(&self) -> Result<u64>;
	/// Finish every stale RUNNING record with TIMED_OUT; returns the
	/// names that were marked.
	async fn cleanup_timed_out_jobs(&self, now: DateTime<Utc>) -> Result<Vec<String>>;
	/// Delete non-RUNNING records created before `cutoff`.
	async fn cleanup_old_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64>;
	/// Delete NOT_EXECUTED records created before `cutoff`.
	async fn cleanup_not_executed_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLite implementation of the job info repository.
#[derive(Clone)]
pub struct SqliteJobInfoRepository {
	pool: SqlitePool,
}

impl SqliteJobInfoRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	async fn try_update_host_thread(&self, name: &str, host: &str, thread: &str) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE job_infos
			SET host = ?, thread = ?
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(host)
		.bind(thread)
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn try_add_additional_data(&self, name: &str, key: &str, value: &str) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE job_infos
			SET additional_data = json_set(additional_data, '$.' || ?, ?),
				last_modification_time = ?
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(Utc::now())
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn try_set_status_message(&self, name: &str, message: &str) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE job_infos
			SET status_message = ?, last_modification_time = ?
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(message)
		.bind(Utc::now())
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn try_add_log_line(&self, name: &str, line: &str) -> Result<()> {
		let entry = serde_json::to_string(&LogLine::new(line))?;
		sqlx::query(
			r#"
			UPDATE job_infos
			SET log_lines = json_insert(log_lines, '$[#]', json(?)),
				last_modification_time = ?
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(entry)
		.bind(Utc::now())
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[async_trait]
impl JobInfoRepository for SqliteJobInfoRepository {
	#[instrument(skip(self, new_job), fields(job_name = %new_job.name, state = %new_job.running_state))]
	async fn create(&self, new_job: &NewJobInfo) -> Result<Option<JobInfoId>> {
		let id = JobInfoId::new();
		let now = Utc::now();
		let start_time = match new_job.running_state {
			RunningState::Running => Some(now),
			_ => None,
		};
		let parameters = serde_json::to_string(&new_job.parameters)?;
		let additional_data = serde_json::to_string(&new_job.additional_data)?;

		let result = sqlx::query(
			r#"
			INSERT INTO job_infos (
				id, name, host, thread,
				creation_time, start_time, last_modification_time,
				running_state, execution_priority,
				max_execution_time, parameters, additional_data
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(&new_job.name)
		.bind(&new_job.host)
		.bind(&new_job.thread)
		.bind(now)
		.bind(start_time)
		.bind(now)
		.bind(new_job.running_state.as_str())
		.bind(new_job.execution_priority.as_str())
		.bind(new_job.max_execution_time)
		.bind(parameters)
		.bind(additional_data)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(Some(id)),
			Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self), fields(job_info_id = %id))]
	async fn find_by_id(&self, id: JobInfoId) -> Result<Option<JobInfo>> {
		let row = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(job_name = %name, state = %state))]
	async fn find_by_name_and_running_state(
		&self,
		name: &str,
		state: &RunningState,
	) -> Result<Option<JobInfo>> {
		let row = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE name = ? AND running_state = ?
			"#,
		)
		.bind(name)
		.bind(state.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find_by_name(&self, name: &str, limit: u32) -> Result<Vec<JobInfo>> {
		let rows = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE name = ?
			ORDER BY julianday(creation_time) DESC
			LIMIT ?
			"#,
		)
		.bind(name)
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find_by_name_and_time_range(
		&self,
		name: &str,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
		result_code: Option<ResultCode>,
	) -> Result<Vec<JobInfo>> {
		let rows = match result_code {
			Some(code) => {
				sqlx::query_as::<_, JobInfoRow>(
					r#"
					SELECT id, name, host, thread,
						   creation_time, start_time, finish_time, last_modification_time,
						   running_state, result_state, result_message, status_message,
						   execution_priority, max_execution_time, max_idle_time,
						   parameters, additional_data, log_lines
					FROM job_infos
					WHERE name = ?
					  AND julianday(creation_time) >= julianday(?)
					  AND julianday(creation_time) <= julianday(?)
					  AND result_state = ?
					ORDER BY julianday(creation_time) DESC
					"#,
				)
				.bind(name)
				.bind(start)
				.bind(end)
				.bind(code.as_str())
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, JobInfoRow>(
					r#"
					SELECT id, name, host, thread,
						   creation_time, start_time, finish_time, last_modification_time,
						   running_state, result_state, result_message, status_message,
						   execution_priority, max_execution_time, max_idle_time,
						   parameters, additional_data, log_lines
					FROM job_infos
					WHERE name = ?
					  AND julianday(creation_time) >= julianday(?)
					  AND julianday(creation_time) <= julianday(?)
					ORDER BY julianday(creation_time) DESC
					"#,
				)
				.bind(name)
				.bind(start)
				.bind(end)
				.fetch_all(&self.pool)
				.await?
			}
		};

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find_most_recent(&self, name: &str) -> Result<Option<JobInfo>> {
		let row = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE name = ?
			ORDER BY julianday(creation_time) DESC
			LIMIT 1
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find_most_recent_finished(&self, name: &str) -> Result<Option<JobInfo>> {
		// Finished records are recognized by their token prefix; QUEUED
		// and RUNNING never match it.
		let row = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE name = ? AND running_state LIKE 'FINISHED\_%' ESCAPE '\'
			ORDER BY julianday(creation_time) DESC
			LIMIT 1
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn find_most_recent_by_name_and_result_state(
		&self,
		name: &str,
		result_set: &[ResultCode],
	) -> Result<Option<JobInfo>> {
		if result_set.is_empty() {
			return Ok(None);
		}

		let placeholders = vec!["?"; result_set.len()].join(", ");
		let sql = format!(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE name = ? AND result_state IN ({placeholders})
			ORDER BY julianday(creation_time) DESC
			LIMIT 1
			"#,
		);

		let mut query = sqlx::query_as::<_, JobInfoRow>(&sql).bind(name);
		for code in result_set {
			query = query.bind(code.as_str());
		}

		let row = query.fetch_optional(&self.pool).await?;
		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self))]
	async fn find_queued_jobs_sorted_asc_by_creation_time(&self) -> Result<Vec<JobInfo>> {
		let rows = sqlx::query_as::<_, JobInfoRow>(
			r#"
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM job_infos
			WHERE running_state = 'QUEUED'
			ORDER BY julianday(creation_time) ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn find_most_recent_per_name(&self) -> Result<Vec<JobInfo>> {
		let rows = sqlx::query_as::<_, JobInfoRow>(
			r#"
			WITH ranked AS (
				SELECT id, name, host, thread,
					   creation_time, start_time, finish_time, last_modification_time,
					   running_state, result_state, result_message, status_message,
					   execution_priority, max_execution_time, max_idle_time,
					   parameters, additional_data, log_lines,
					   ROW_NUMBER() OVER (
						   PARTITION BY name ORDER BY julianday(creation_time) DESC
					   ) AS rn
				FROM job_infos
			)
			SELECT id, name, host, thread,
				   creation_time, start_time, finish_time, last_modification_time,
				   running_state, result_state, result_message, status_message,
				   execution_priority, max_execution_time, max_idle_time,
				   parameters, additional_data, log_lines
			FROM ranked
			WHERE rn = 1
			ORDER BY name ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn distinct_job_names(&self) -> Result<Vec<String>> {
		let rows = sqlx::query_as::<_, (String,)>(
			"SELECT DISTINCT name FROM job_infos ORDER BY name ASC",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(|(name,)| name).collect())
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn activate_queued_job(&self, name: &str) -> Result<bool> {
		let now = Utc::now();
		let result = sqlx::query(
			r#"
			UPDATE job_infos
			SET running_state = 'RUNNING', start_time = ?, last_modification_time = ?
			WHERE name = ? AND running_state = 'QUEUED'
			"#,
		)
		.bind(now)
		.bind(now)
		.bind(name)
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) => Ok(done.rows_affected() == 1),
			// Another activator won the RUNNING slot between our read
			// and this write.
			Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, message), fields(job_name = %name, result = %result_code))]
	async fn mark_running_as_finished(
		&self,
		name: &str,
		result_code: ResultCode,
		message: Option<String>,
	) -> Result<bool> {
		let token = RunningState::finished();
		let now = Utc::now();
		let result = sqlx::query(
			r#"
			UPDATE job_infos
			SET running_state = ?,
				result_state = ?,
				finish_time = ?,
				last_modification_time = ?,
				result_message = COALESCE(?, result_message)
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(token.as_str())
		.bind(result_code.as_str())
		.bind(now)
		.bind(now)
		.bind(message)
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self, message), fields(job_info_id = %id, result = %result_code))]
	async fn mark_as_finished_by_id(
		&self,
		id: JobInfoId,
		result_code: ResultCode,
		message: Option<String>,
	) -> Result<bool> {
		let token = RunningState::finished();
		let now = Utc::now();
		let result = sqlx::query(
			r#"
			UPDATE job_infos
			SET running_state = ?,
				result_state = ?,
				finish_time = ?,
				last_modification_time = ?,
				result_message = COALESCE(?, result_message)
			WHERE id = ? AND running_state IN ('QUEUED', 'RUNNING')
			"#,
		)
		.bind(token.as_str())
		.bind(result_code.as_str())
		.bind(now)
		.bind(now)
		.bind(message)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn mark_queued_as_not_executed(&self, name: &str) -> Result<bool> {
		let token = RunningState::finished();
		let now = Utc::now();
		let result = sqlx::query(
			r#"
			UPDATE job_infos
			SET running_state = ?,
				result_state = 'NOT_EXECUTED',
				finish_time = ?,
				last_modification_time = ?
			WHERE name = ? AND running_state = 'QUEUED'
			"#,
		)
		.bind(token.as_str())
		.bind(now)
		.bind(now)
		.bind(name)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(job_name = %name))]
	async fn remove_job_if_timed_out(&self, name: &str, now: DateTime<Utc>) -> Result<bool> {
		let token = RunningState::finished();
		let result = sqlx::query(
			r#"
			UPDATE job_infos
			SET running_state = ?,
				result_state = 'TIMED_OUT',
				finish_time = ?,
				last_modification_time = ?
			WHERE name = ? AND running_state = 'RUNNING'
			  AND julianday(last_modification_time) + max_execution_time / 86400000.0
				  < julianday(?)
			"#,
		)
		.bind(token.as_str())
		.bind(now)
		.bind(now)
		.bind(name)
		.bind(now)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn update_host_thread_information(&self, name: &str, host: &str, thread: &str) {
		if let Err(error) = self.try_update_host_thread(name, host, thread).await {
			warn!(job_name = %name, %error, "host/thread refresh failed");
		}
	}

	async fn add_additional_data(&self, name: &str, key: &str, value: &str) {
		if let Err(error) = self.try_add_additional_data(name, key, value).await {
			warn!(job_name = %name, key = %key, %error, "additional data write failed");
		}
	}

	async fn set_status_message(&self, name: &str, message: &str) {
		if let Err(error) = self.try_set_status_message(name, message).await {
			warn!(job_name = %name, %error, "status message write failed");
		}
	}

	async fn add_log_line(&self, name: &str, line: &str) {
		if let Err(error) = self.try_add_log_line(name, line).await {
			warn!(job_name = %name, %error, "log line write failed");
		}
	}

	#[instrument(skip(self, lines), fields(job_name = %name, line_count = lines.len()))]
	async fn append_log_lines(&self, name: &str, lines: &[LogLine]) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		let row = sqlx::query_as::<_, (String,)>(
			"SELECT log_lines FROM job_infos WHERE name = ? AND running_state = 'RUNNING'",
		)
		.bind(name)
		.fetch_optional(&mut *tx)
		.await?;

		let Some((log_lines_json,)) = row else {
			return Ok(false);
		};

		let mut log_lines: Vec<LogLine> = serde_json::from_str(&log_lines_json)?;
		log_lines.extend_from_slice(lines);
		let updated = serde_json::to_string(&log_lines)?;

		sqlx::query(
			r#"
			UPDATE job_infos
			SET log_lines = ?, last_modification_time = ?
			WHERE name = ? AND running_state = 'RUNNING'
			"#,
		)
		.bind(updated)
		.bind(Utc::now())
		.bind(name)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		Ok(true)
	}

	#[instrument(skip(self))]
	async fn clear(&self) -> Result<()> {
		sqlx::query("DELETE FROM job_infos").execute(&self.pool).await?;
		Ok(())
	}

	#[instrument(skip(self), fields(job_info_id = %id))]
	async fn remove(&self, id: JobInfoId) -> Result<()> {
		sqlx::query("DELETE FROM job_infos WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn count(&self) -> Result<u64> {
		let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM job_infos")
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0 as u64)
	}

	#[instrument(skip(self))]
	async fn cleanup_timed_out_jobs(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
		let stale = sqlx::query_as::<_, (String,)>(
			r#"
			SELECT name FROM job_infos
			WHERE running_state = 'RUNNING'
			  AND julianday(last_modification_time) + max_execution_time / 86400000.0
				  < julianday(?)
			"#,
		)
		.bind(now)
		.fetch_all(&self.pool)
		.await?;

		let mut removed = Vec::new();
		for (name,) in stale {
			if self.remove_job_if_timed_out(&name, now).await? {
				removed.push(name);
			}
		}

		Ok(removed)
	}

	#[instrument(skip(self))]
	async fn cleanup_old_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query(
			r#"
			DELETE FROM job_infos
			WHERE running_state != 'RUNNING'
			  AND julianday(creation_time) < julianday(?)
			"#,
		)
		.bind(cutoff)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}

	#[instrument(skip(self))]
	async fn cleanup_not_executed_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query(
			r#"
			DELETE FROM job_infos
			WHERE result_state = 'NOT_EXECUTED'
			  AND julianday(creation_time) < julianday(?)
			"#,
		)
		.bind(cutoff)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}
}

// Database row type for sqlx

#[derive(sqlx::FromRow)]
struct JobInfoRow {
	id: String,
	name: String,
	host: String,
	thread: String,
	creation_time: DateTime<Utc>,
	start_time: Option<DateTime<Utc>>,
	finish_time: Option<DateTime<Utc>>,
	last_modification_time: DateTime<Utc>,
	running_state: String,
	result_state: Option<String>,
	result_message: Option<String>,
	status_message: Option<String>,
	execution_priority: String,
	max_execution_time: i64,
	max_idle_time: Option<i64>,
	parameters: String,
	additional_data: String,
	log_lines: String,
}

impl TryFrom<JobInfoRow> for JobInfo {
	type Error = DbError;

	fn try_from(row: JobInfoRow) -> Result<Self> {
		Ok(JobInfo {
			id: row
				.id
				.parse()
				.map_err(|_| DbError::Internal("Invalid job info ID".to_string()))?,
			name: row.name,
			host: row.host,
			thread: row.thread,
			creation_time: row.creation_time,
			start_time: row.start_time,
			finish_time: row.finish_time,
			last_modification_time: row.last_modification_time,
			running_state: row
				.running_state
				.parse()
				.map_err(DbError::Internal)?,
			result_state: row
				.result_state
				.map(|s| s.parse().map_err(DbError::Internal))
				.transpose()?,
			result_message: row.result_message,
			status_message: row.status_message,
			execution_priority: row
				.execution_priority
				.parse()
				.map_err(DbError::Internal)?,
			max_execution_time: row.max_execution_time,
			max_idle_time: row.max_idle_time,
			parameters: serde_json::from_str(&row.parameters)?,
			additional_data: serde_json::from_str(&row.additional_data)?,
			log_lines: serde_json::from_str(&row.log_lines)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::create_pool;
	use crate::schema::run_migrations;
	use crate::testing::create_job_test_pool;
	use chrono::Duration;
	use std::sync::Arc;

	fn running(name: &str) -> NewJobInfo {
		NewJobInfo::new(name, "host-1", "worker-1", 60_000, RunningState::Running)
	}

	fn queued(name: &str) -> NewJobInfo {
		NewJobInfo::new(name, "host-1", "worker-1", 60_000, RunningState::Queued)
	}

	async fn repo() -> SqliteJobInfoRepository {
		SqliteJobInfoRepository::new(create_job_test_pool().await)
	}

	async fn backdate_creation(
		repo: &SqliteJobInfoRepository,
		id: JobInfoId,
		creation_time: DateTime<Utc>,
	) {
		sqlx::query("UPDATE job_infos SET creation_time = ? WHERE id = ?")
			.bind(creation_time)
			.bind(id.to_string())
			.execute(&repo.pool)
			.await
			.unwrap();
	}

	async fn backdate_modification(
		repo: &SqliteJobInfoRepository,
		name: &str,
		last_modification_time: DateTime<Utc>,
	) {
		sqlx::query(
			"UPDATE job_infos SET last_modification_time = ? WHERE name = ? AND running_state = 'RUNNING'",
		)
		.bind(last_modification_time)
		.bind(name)
		.execute(&repo.pool)
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn create_persists_record() {
		let repo = repo().await;

		let mut parameters = BTreeMap::new();
		parameters.insert("source".to_string(), "catalog".to_string());
		let id = repo
			.create(&running("import").with_parameters(parameters.clone()))
			.await
			.unwrap()
			.unwrap();

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.name, "import");
		assert_eq!(info.host, "host-1");
		assert_eq!(info.running_state, RunningState::Running);
		assert_eq!(info.parameters, parameters);
		assert!(info.start_time.is_some());
		assert!(info.result_state.is_none());
		assert!(info.creation_time <= info.start_time.unwrap());
	}

	#[tokio::test]
	async fn create_queued_has_no_start_time() {
		let repo = repo().await;
		let id = repo.create(&queued("import")).await.unwrap().unwrap();

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.running_state, RunningState::Queued);
		assert!(info.start_time.is_none());
	}

	#[tokio::test]
	async fn create_rejects_second_running_record() {
		let repo = repo().await;

		assert!(repo.create(&running("import")).await.unwrap().is_some());
		assert!(repo.create(&running("import")).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn create_allows_one_queued_behind_running() {
		let repo = repo().await;

		assert!(repo.create(&running("import")).await.unwrap().is_some());
		assert!(repo.create(&queued("import")).await.unwrap().is_some());
		assert!(repo.create(&queued("import")).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn create_is_independent_per_name() {
		let repo = repo().await;

		assert!(repo.create(&running("import")).await.unwrap().is_some());
		assert!(repo.create(&running("export")).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn concurrent_creates_admit_exactly_one() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}/jobs.db", dir.path().display());
		let pool = create_pool(&url).await.unwrap();
		run_migrations(&pool).await.unwrap();
		let repo = Arc::new(SqliteJobInfoRepository::new(pool));

		let a = Arc::clone(&repo);
		let b = Arc::clone(&repo);
		let (first, second) = tokio::join!(
			tokio::spawn(async move { a.create(&running("import")).await.unwrap() }),
			tokio::spawn(async move { b.create(&running("import")).await.unwrap() }),
		);

		let created = [first.unwrap(), second.unwrap()]
			.iter()
			.filter(|id| id.is_some())
			.count();
		assert_eq!(created, 1);
	}

	#[tokio::test]
	async fn activate_queued_job_transitions_to_running() {
		let repo = repo().await;
		let id = repo.create(&queued("import")).await.unwrap().unwrap();

		assert!(repo.activate_queued_job("import").await.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.running_state, RunningState::Running);
		assert!(info.start_time.is_some());
		assert!(info.creation_time <= info.start_time.unwrap());
		assert!(info.start_time.unwrap() <= info.last_modification_time);
	}

	#[tokio::test]
	async fn activate_queued_job_without_queued_record() {
		let repo = repo().await;
		assert!(!repo.activate_queued_job("import").await.unwrap());
	}

	#[tokio::test]
	async fn activate_queued_job_blocked_by_running_record() {
		let repo = repo().await;
		repo.create(&running("import")).await.unwrap().unwrap();
		let queued_id = repo.create(&queued("import")).await.unwrap().unwrap();

		// The RUNNING slot is taken; the unique index rejects the update.
		assert!(!repo.activate_queued_job("import").await.unwrap());

		let info = repo.find_by_id(queued_id).await.unwrap().unwrap();
		assert_eq!(info.running_state, RunningState::Queued);
	}

	#[tokio::test]
	async fn activation_race_has_single_winner() {
		let repo = Arc::new(repo().await);
		repo.create(&queued("import")).await.unwrap().unwrap();

		let a = Arc::clone(&repo);
		let b = Arc::clone(&repo);
		let (first, second) = tokio::join!(
			tokio::spawn(async move { a.activate_queued_job("import").await.unwrap() }),
			tokio::spawn(async move { b.activate_queued_job("import").await.unwrap() }),
		);

		let winners = [first.unwrap(), second.unwrap()]
			.iter()
			.filter(|won| **won)
			.count();
		assert_eq!(winners, 1);

		let info = repo
			.find_by_name_and_running_state("import", &RunningState::Running)
			.await
			.unwrap();
		assert!(info.is_some());
	}

	#[tokio::test]
	async fn mark_running_as_finished_rewrites_state() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		let finished = repo
			.mark_running_as_finished(
				"import",
				ResultCode::Successful,
				Some("42 items".to_string()),
			)
			.await
			.unwrap();
		assert!(finished);

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert!(info.running_state.is_finished());
		assert!(info
			.running_state
			.as_str()
			.starts_with(RunningState::FINISHED_PREFIX));
		assert_eq!(info.result_state, Some(ResultCode::Successful));
		assert_eq!(info.result_message.as_deref(), Some("42 items"));
		assert!(info.finish_time.is_some());
		assert!(info.creation_time <= info.finish_time.unwrap());
	}

	#[tokio::test]
	async fn mark_running_as_finished_twice_is_a_noop() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		assert!(repo
			.mark_running_as_finished("import", ResultCode::Successful, None)
			.await
			.unwrap());
		let after_first = repo.find_by_id(id).await.unwrap().unwrap();

		assert!(!repo
			.mark_running_as_finished("import", ResultCode::Failed, Some("late".to_string()))
			.await
			.unwrap());
		let after_second = repo.find_by_id(id).await.unwrap().unwrap();

		assert_eq!(after_first, after_second);
	}

	#[tokio::test]
	async fn finished_records_accumulate_with_distinct_tokens() {
		let repo = repo().await;

		for _ in 0..3 {
			repo.create(&running("import")).await.unwrap().unwrap();
			assert!(repo
				.mark_running_as_finished_successfully("import")
				.await
				.unwrap());
		}

		let history = repo.find_by_name("import", 10).await.unwrap();
		assert_eq!(history.len(), 3);

		let mut tokens: Vec<&str> = history
			.iter()
			.map(|info| info.running_state.as_str())
			.collect();
		tokens.sort_unstable();
		tokens.dedup();
		assert_eq!(tokens.len(), 3);
		for token in tokens {
			assert!(token.starts_with(RunningState::FINISHED_PREFIX));
		}
	}

	#[tokio::test]
	async fn mark_as_finished_by_id() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		assert!(repo
			.mark_as_finished_by_id(id, ResultCode::Failed, Some("boom".to_string()))
			.await
			.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.result_state, Some(ResultCode::Failed));
		assert_eq!(info.result_message.as_deref(), Some("boom"));

		// A finished record cannot be finished again.
		assert!(!repo
			.mark_as_finished_by_id(id, ResultCode::Successful, None)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn mark_running_as_finished_with_error_stores_chain() {
		#[derive(Debug, thiserror::Error)]
		#[error("import exploded")]
		struct ImportError;

		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		assert!(repo
			.mark_running_as_finished_with_error("import", &ImportError)
			.await
			.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.result_state, Some(ResultCode::Failed));
		assert_eq!(info.result_message.as_deref(), Some("import exploded"));
	}

	#[tokio::test]
	async fn mark_queued_as_not_executed() {
		let repo = repo().await;
		let id = repo.create(&queued("import")).await.unwrap().unwrap();

		assert!(repo.mark_queued_as_not_executed("import").await.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert!(info.running_state.is_finished());
		assert_eq!(info.result_state, Some(ResultCode::NotExecuted));

		assert!(!repo.mark_queued_as_not_executed("import").await.unwrap());
	}

	#[tokio::test]
	async fn remove_job_if_timed_out_marks_stale_record() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();
		backdate_modification(&repo, "import", Utc::now() - Duration::milliseconds(120_000))
			.await;

		assert!(repo
			.remove_job_if_timed_out("import", Utc::now())
			.await
			.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert!(info.running_state.is_finished());
		assert_eq!(info.result_state, Some(ResultCode::TimedOut));
	}

	#[tokio::test]
	async fn remove_job_if_timed_out_spares_fresh_record() {
		let repo = repo().await;
		repo.create(&running("import")).await.unwrap().unwrap();

		assert!(!repo
			.remove_job_if_timed_out("import", Utc::now())
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn remove_job_if_timed_out_is_idempotent_without_running_record() {
		let repo = repo().await;
		assert!(!repo
			.remove_job_if_timed_out("import", Utc::now())
			.await
			.unwrap());
		assert!(!repo
			.remove_job_if_timed_out("import", Utc::now())
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn cleanup_timed_out_jobs_returns_marked_names() {
		let repo = repo().await;
		repo.create(&running("import")).await.unwrap().unwrap();
		repo.create(&running("export")).await.unwrap().unwrap();
		backdate_modification(&repo, "import", Utc::now() - Duration::milliseconds(120_000))
			.await;

		let removed = repo.cleanup_timed_out_jobs(Utc::now()).await.unwrap();
		assert_eq!(removed, vec!["import".to_string()]);

		// The fresh job is untouched.
		assert!(repo
			.find_by_name_and_running_state("export", &RunningState::Running)
			.await
			.unwrap()
			.is_some());
	}

	#[tokio::test]
	async fn cleanup_old_jobs_spares_running_records() {
		let repo = repo().await;

		let finished_id = repo.create(&running("old-finished")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("old-finished")
			.await
			.unwrap();
		backdate_creation(&repo, finished_id, Utc::now() - Duration::hours(25)).await;

		let running_id = repo.create(&running("old-running")).await.unwrap().unwrap();
		backdate_creation(&repo, running_id, Utc::now() - Duration::hours(25)).await;

		let recent_id = repo.create(&running("recent")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("recent")
			.await
			.unwrap();

		let deleted = repo
			.cleanup_old_jobs(Utc::now() - Duration::hours(24))
			.await
			.unwrap();
		assert_eq!(deleted, 1);

		assert!(repo.find_by_id(finished_id).await.unwrap().is_none());
		assert!(repo.find_by_id(running_id).await.unwrap().is_some());
		assert!(repo.find_by_id(recent_id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn cleanup_not_executed_jobs_deletes_only_skipped_records() {
		let repo = repo().await;

		let skipped_id = repo.create(&queued("skipped")).await.unwrap().unwrap();
		repo.mark_queued_as_not_executed("skipped").await.unwrap();
		backdate_creation(&repo, skipped_id, Utc::now() - Duration::hours(5)).await;

		let finished_id = repo.create(&running("done")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("done")
			.await
			.unwrap();
		backdate_creation(&repo, finished_id, Utc::now() - Duration::hours(5)).await;

		let deleted = repo
			.cleanup_not_executed_jobs(Utc::now() - Duration::hours(4))
			.await
			.unwrap();
		assert_eq!(deleted, 1);

		assert!(repo.find_by_id(skipped_id).await.unwrap().is_none());
		assert!(repo.find_by_id(finished_id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn find_by_name_orders_newest_first_and_limits() {
		let repo = repo().await;

		for hours_ago in [3_i64, 2, 1] {
			let id = repo.create(&running("import")).await.unwrap().unwrap();
			repo
				.mark_running_as_finished_successfully("import")
				.await
				.unwrap();
			backdate_creation(&repo, id, Utc::now() - Duration::hours(hours_ago)).await;
		}

		let history = repo.find_by_name("import", 2).await.unwrap();
		assert_eq!(history.len(), 2);
		assert!(history[0].creation_time > history[1].creation_time);
	}

	#[tokio::test]
	async fn find_most_recent_finished_skips_active_records() {
		let repo = repo().await;

		let finished_id = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		backdate_creation(&repo, finished_id, Utc::now() - Duration::hours(1)).await;

		// Newer active records must not win.
		repo.create(&running("import")).await.unwrap().unwrap();
		repo.create(&queued("import")).await.unwrap().unwrap();

		let most_recent = repo.find_most_recent_finished("import").await.unwrap().unwrap();
		assert_eq!(most_recent.id, finished_id);

		let overall = repo.find_most_recent("import").await.unwrap().unwrap();
		assert_ne!(overall.id, finished_id);
	}

	#[tokio::test]
	async fn find_most_recent_by_name_and_result_state() {
		let repo = repo().await;

		let failed_id = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished("import", ResultCode::Failed, Some("boom".to_string()))
			.await
			.unwrap();
		backdate_creation(&repo, failed_id, Utc::now() - Duration::hours(2)).await;

		let ok_id = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		backdate_creation(&repo, ok_id, Utc::now() - Duration::hours(1)).await;

		let found = repo
			.find_most_recent_by_name_and_result_state("import", &[ResultCode::Failed])
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.id, failed_id);

		let found = repo
			.find_most_recent_by_name_and_result_state(
				"import",
				&[ResultCode::Successful, ResultCode::Failed],
			)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.id, ok_id);

		assert!(repo
			.find_most_recent_by_name_and_result_state("import", &[])
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn find_by_name_and_time_range_filters_by_result() {
		let repo = repo().await;

		let in_range_id = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		backdate_creation(&repo, in_range_id, Utc::now() - Duration::hours(2)).await;

		let out_of_range_id = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		backdate_creation(&repo, out_of_range_id, Utc::now() - Duration::hours(10)).await;

		let start = Utc::now() - Duration::hours(3);
		let end = Utc::now();

		let found = repo
			.find_by_name_and_time_range("import", start, end, None)
			.await
			.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].id, in_range_id);

		let found = repo
			.find_by_name_and_time_range("import", start, end, Some(ResultCode::Failed))
			.await
			.unwrap();
		assert!(found.is_empty());
	}

	#[tokio::test]
	async fn find_queued_jobs_sorted_ascending() {
		let repo = repo().await;

		let newer = repo.create(&queued("beta")).await.unwrap().unwrap();
		backdate_creation(&repo, newer, Utc::now() - Duration::hours(1)).await;
		let older = repo.create(&queued("alpha")).await.unwrap().unwrap();
		backdate_creation(&repo, older, Utc::now() - Duration::hours(2)).await;
		repo.create(&running("gamma")).await.unwrap().unwrap();

		let jobs = repo
			.find_queued_jobs_sorted_asc_by_creation_time()
			.await
			.unwrap();
		assert_eq!(jobs.len(), 2);
		assert_eq!(jobs[0].id, older);
		assert_eq!(jobs[1].id, newer);
	}

	#[tokio::test]
	async fn find_most_recent_per_name_returns_one_record_each() {
		let repo = repo().await;

		let import_old = repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		backdate_creation(&repo, import_old, Utc::now() - Duration::hours(2)).await;

		let import_new = repo.create(&running("import")).await.unwrap().unwrap();
		let export = repo.create(&running("export")).await.unwrap().unwrap();

		let most_recent = repo.find_most_recent_per_name().await.unwrap();
		assert_eq!(most_recent.len(), 2);
		assert_eq!(most_recent[0].name, "export");
		assert_eq!(most_recent[0].id, export);
		assert_eq!(most_recent[1].name, "import");
		assert_eq!(most_recent[1].id, import_new);
	}

	#[tokio::test]
	async fn distinct_job_names_sorted() {
		let repo = repo().await;
		repo.create(&running("import")).await.unwrap().unwrap();
		repo
			.mark_running_as_finished_successfully("import")
			.await
			.unwrap();
		repo.create(&running("import")).await.unwrap().unwrap();
		repo.create(&running("export")).await.unwrap().unwrap();

		let names = repo.distinct_job_names().await.unwrap();
		assert_eq!(names, vec!["export".to_string(), "import".to_string()]);
	}

	#[tokio::test]
	async fn add_log_line_appends_to_running_record() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		repo.add_log_line("import", "first").await;
		repo.add_log_line("import", "second").await;

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		let lines: Vec<&str> = info.log_lines.iter().map(|l| l.line.as_str()).collect();
		assert_eq!(lines, vec!["first", "second"]);
	}

	#[tokio::test]
	async fn add_log_line_without_running_record_is_silent() {
		let repo = repo().await;
		repo.add_log_line("missing", "orphan").await;
		assert_eq!(repo.count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn append_log_lines_preserves_order() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		assert!(repo
			.append_log_lines("import", &[LogLine::new("a")])
			.await
			.unwrap());
		assert!(repo
			.append_log_lines("import", &[LogLine::new("b"), LogLine::new("c")])
			.await
			.unwrap());

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		let lines: Vec<&str> = info.log_lines.iter().map(|l| l.line.as_str()).collect();
		assert_eq!(lines, vec!["a", "b", "c"]);
	}

	#[tokio::test]
	async fn append_log_lines_reports_missing_running_record() {
		let repo = repo().await;
		assert!(!repo
			.append_log_lines("import", &[LogLine::new("a")])
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn add_additional_data_sets_key_and_refreshes_modification_time() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();
		backdate_modification(&repo, "import", Utc::now() - Duration::hours(1)).await;
		let before = repo.find_by_id(id).await.unwrap().unwrap();

		repo.add_additional_data("import", "resultHash", "http://worker/status/7").await;
		repo.add_additional_data("import", "resultHash", "http://worker/status/8").await;

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(
			info.additional_data.get("resultHash").map(String::as_str),
			Some("http://worker/status/8")
		);
		assert!(info.last_modification_time > before.last_modification_time);
	}

	#[tokio::test]
	async fn set_status_message_updates_running_record() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		repo.set_status_message("import", "halfway there").await;

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.status_message.as_deref(), Some("halfway there"));
	}

	#[tokio::test]
	async fn update_host_thread_information() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();

		repo
			.update_host_thread_information("import", "host-9", "worker-9")
			.await;

		let info = repo.find_by_id(id).await.unwrap().unwrap();
		assert_eq!(info.host, "host-9");
		assert_eq!(info.thread, "worker-9");
	}

	#[tokio::test]
	async fn clear_remove_and_count() {
		let repo = repo().await;
		let id = repo.create(&running("import")).await.unwrap().unwrap();
		repo.create(&running("export")).await.unwrap().unwrap();
		assert_eq!(repo.count().await.unwrap(), 2);

		repo.remove(id).await.unwrap();
		assert_eq!(repo.count().await.unwrap(), 1);

		repo.clear().await.unwrap();
		assert_eq!(repo.count().await.unwrap(), 0);
	}
}
