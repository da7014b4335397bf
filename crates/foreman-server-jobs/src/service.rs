// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The job service: dispatch, queue draining, remote polling, and the
//! retention sweeps.
//!
//! The service holds no scheduling state of its own. Which job is
//! queued or running lives entirely in the store, so any number of
//! processes can run the same service against one database and the
//! unique `(name, running_state)` index arbitrates between them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use foreman_core::{
	ExecutionPriority, JobDefinition, JobInfoId, LogLine, RunningState,
};
use foreman_remote::RemoteJobExecutor;
use foreman_server_db::{
	render_error_chain, DbError, JobDefinitionRepository, JobInfoRepository, NewJobInfo,
};

use crate::config::JobServiceConfig;
use crate::context::JobExecutionContext;
use crate::error::{JobError, Result};
use crate::runnable::JobRunnable;

/// Additional-data key holding a remote job's status URL.
pub const RESULT_HASH_KEY: &str = "resultHash";
/// Additional-data key counting remote log lines already persisted.
pub const LOG_LINE_OFFSET_KEY: &str = "logLineOffset";
/// Additional-data key a sweep writes its removal count under.
pub const NUMBER_OF_REMOVED_JOBS_KEY: &str = "numberOfRemovedJobs";
/// Additional-data key the timeout sweep writes the marked names under.
pub const REMOVED_JOBS_KEY: &str = "removedJobs";

/// Meta-job names under which the sweeps register their own executions.
pub const TIMED_OUT_SWEEP_JOB: &str = "cleanup-timed-out-jobs";
pub const OLD_JOBS_SWEEP_JOB: &str = "cleanup-old-jobs";
pub const NOT_EXECUTED_SWEEP_JOB: &str = "cleanup-not-executed-jobs";

const SWEEP_MAX_EXECUTION_TIME: i64 = 60_000;

/// Orchestrates executions of registered runnables.
pub struct JobService {
	job_infos: Arc<dyn JobInfoRepository>,
	job_definitions: Arc<dyn JobDefinitionRepository>,
	remote_executor: Option<Arc<dyn RemoteJobExecutor>>,
	runnables: HashMap<String, Arc<dyn JobRunnable>>,
	config: JobServiceConfig,
	worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobService {
	pub fn new(
		job_infos: Arc<dyn JobInfoRepository>,
		job_definitions: Arc<dyn JobDefinitionRepository>,
		config: JobServiceConfig,
	) -> Self {
		Self {
			job_infos,
			job_definitions,
			remote_executor: None,
			runnables: HashMap::new(),
			config,
			worker_handles: Mutex::new(Vec::new()),
		}
	}

	pub fn with_remote_executor(mut self, executor: Arc<dyn RemoteJobExecutor>) -> Self {
		self.remote_executor = Some(executor);
		self
	}

	pub fn config(&self) -> &JobServiceConfig {
		&self.config
	}

	/// Bind a runnable to its job name. One runnable per name.
	pub fn register(&mut self, runnable: Arc<dyn JobRunnable>) -> Result<()> {
		let name = runnable.job_definition().name;
		if self.runnables.contains_key(&name) {
			return Err(JobError::AlreadyRegistered(name));
		}
		info!(job_name = %name, "job registered");
		self.runnables.insert(name, runnable);
		Ok(())
	}

	/// Definitions of registered remote jobs; the scheduler polls each
	/// at its own interval.
	pub fn remote_definitions(&self) -> Vec<JobDefinition> {
		self
			.runnables
			.values()
			.map(|runnable| runnable.job_definition())
			.filter(|definition| definition.remote)
			.collect()
	}

	/// Persist the definitions of all registered runnables and seed the
	/// global semaphore sentinel. An admin's disabled toggle survives
	/// re-registration.
	#[instrument(skip(self))]
	pub async fn save_definitions(&self) -> Result<()> {
		self.job_definitions.ensure_global_semaphore().await?;

		for runnable in self.runnables.values() {
			let mut definition = runnable.job_definition();
			if let Some(existing) = self.job_definitions.find(&definition.name).await? {
				definition.disabled = existing.disabled;
			}
			self.job_definitions.save(&definition).await?;
		}

		Ok(())
	}

	pub async fn execute(&self, name: &str, priority: ExecutionPriority) -> Result<JobInfoId> {
		self
			.execute_with_parameters(name, priority, std::collections::BTreeMap::new())
			.await
	}

	/// Run or enqueue the named job.
	///
	/// At most one execution per name may be running and at most one
	/// queued; the store's unique index enforces this even against
	/// concurrent callers on other hosts.
	#[instrument(skip(self, parameters), fields(job_name = %name, priority = %priority))]
	pub async fn execute_with_parameters(
		&self,
		name: &str,
		priority: ExecutionPriority,
		parameters: std::collections::BTreeMap<String, String>,
	) -> Result<JobInfoId> {
		let runnable = self
			.runnables
			.get(name)
			.cloned()
			.ok_or_else(|| JobError::NotRegistered(name.to_string()))?;
		let definition = self.resolved_definition(&runnable).await?;

		if definition.disabled {
			return Err(JobError::ExecutionDisabled(name.to_string()));
		}

		if self
			.job_infos
			.find_by_name_and_running_state(name, &RunningState::Running)
			.await?
			.is_some()
		{
			return self.enqueue(name, &definition, priority, parameters).await;
		}

		if priority == ExecutionPriority::CheckPreconditions
			&& !runnable.is_execution_necessary().await
		{
			return Err(JobError::ExecutionNotNecessary(name.to_string()));
		}

		let new_job = NewJobInfo::new(
			name,
			&self.config.host,
			current_thread_name(),
			definition.timeout_period,
			RunningState::Running,
		)
		.with_priority(priority)
		.with_parameters(parameters);

		let Some(id) = self.job_infos.create(&new_job).await? else {
			// Another host claimed the running slot in between.
			return Err(JobError::AlreadyRunning(name.to_string()));
		};

		self.dispatch(runnable, &definition, id).await?;
		Ok(id)
	}

	async fn enqueue(
		&self,
		name: &str,
		definition: &JobDefinition,
		priority: ExecutionPriority,
		parameters: std::collections::BTreeMap<String, String>,
	) -> Result<JobInfoId> {
		if self
			.job_infos
			.find_by_name_and_running_state(name, &RunningState::Queued)
			.await?
			.is_some()
		{
			return Err(JobError::AlreadyQueued(name.to_string()));
		}

		let new_job = NewJobInfo::new(
			name,
			&self.config.host,
			current_thread_name(),
			definition.timeout_period,
			RunningState::Queued,
		)
		.with_priority(priority)
		.with_parameters(parameters);

		match self.job_infos.create(&new_job).await? {
			Some(id) => {
				info!(job_name = %name, job_info_id = %id, "job queued behind running execution");
				Ok(id)
			}
			None => Err(JobError::AlreadyQueued(name.to_string())),
		}
	}

	/// Drain the queue in ascending creation-time order: every queued
	/// job whose running slot is free is activated and dispatched.
	/// Queued jobs whose precondition no longer holds become
	/// NOT_EXECUTED.
	#[instrument(skip(self))]
	pub async fn execute_queued_jobs(&self) -> Result<()> {
		for queued in self
			.job_infos
			.find_queued_jobs_sorted_asc_by_creation_time()
			.await?
		{
			// Queued records of jobs registered on other hosts are
			// theirs to activate.
			let Some(runnable) = self.runnables.get(&queued.name).cloned() else {
				continue;
			};

			if self
				.job_infos
				.find_by_name_and_running_state(&queued.name, &RunningState::Running)
				.await?
				.is_some()
			{
				continue;
			}

			if queued.execution_priority == ExecutionPriority::CheckPreconditions
				&& !runnable.is_execution_necessary().await
			{
				self.job_infos.mark_queued_as_not_executed(&queued.name).await?;
				continue;
			}

			if self.job_infos.activate_queued_job(&queued.name).await? {
				let definition = self.resolved_definition(&runnable).await?;
				if let Err(error) = self.dispatch(runnable, &definition, queued.id).await {
					warn!(job_name = %queued.name, %error, "dispatch of activated job failed");
				}
			}
		}

		Ok(())
	}

	/// Poll every running remote job once.
	#[instrument(skip(self))]
	pub async fn poll_remote_jobs(&self) -> Result<()> {
		for definition in self.remote_definitions() {
			if let Err(error) = self.poll_remote_job(&definition.name).await {
				// Transient worker trouble; the next tick retries, and
				// the timeout sweep reconciles jobs that stay silent.
				warn!(job_name = %definition.name, %error, "remote poll failed");
			}
		}

		Ok(())
	}

	/// Poll one remote job: append log lines not yet persisted and
	/// finish the record when the worker reports a terminal status.
	#[instrument(skip(self), fields(job_name = %name))]
	pub async fn poll_remote_job(&self, name: &str) -> Result<()> {
		let Some(executor) = &self.remote_executor else {
			return Ok(());
		};

		let Some(job) = self
			.job_infos
			.find_by_name_and_running_state(name, &RunningState::Running)
			.await?
		else {
			return Ok(());
		};

		let Some(status_url) = job.additional_data.get(RESULT_HASH_KEY) else {
			warn!(job_name = %name, "running remote job has no status URL");
			return Ok(());
		};

		let status = executor.fetch_status(status_url).await?;

		let offset = job
			.additional_data
			.get(LOG_LINE_OFFSET_KEY)
			.and_then(|value| value.parse::<usize>().ok())
			.unwrap_or(0);

		if status.log_lines.len() > offset {
			let new_lines: Vec<LogLine> = status.log_lines[offset..]
				.iter()
				.map(|line| LogLine::new(line.clone()))
				.collect();

			if self.job_infos.append_log_lines(name, &new_lines).await? {
				self
					.job_infos
					.add_additional_data(name, LOG_LINE_OFFSET_KEY, &status.log_lines.len().to_string())
					.await;
			}
		}

		if status.status.is_terminal() {
			self
				.job_infos
				.mark_running_as_finished(name, status.result_code(), status.message)
				.await?;
			info!(job_name = %name, "remote job finished");
		}

		Ok(())
	}

	/// Finish every running job whose record went stale for longer than
	/// its own `max_execution_time`. Runs as a meta-job so only one host
	/// sweeps at a time.
	#[instrument(skip(self))]
	pub async fn cleanup_timed_out_jobs(&self) -> Result<u64> {
		if !self.begin_sweep(TIMED_OUT_SWEEP_JOB).await? {
			return Ok(0);
		}

		match self.job_infos.cleanup_timed_out_jobs(Utc::now()).await {
			Ok(names) => {
				self
					.job_infos
					.add_additional_data(
						TIMED_OUT_SWEEP_JOB,
						NUMBER_OF_REMOVED_JOBS_KEY,
						&names.len().to_string(),
					)
					.await;
				let removed = serde_json::to_string(&names).map_err(DbError::from)?;
				self
					.job_infos
					.add_additional_data(TIMED_OUT_SWEEP_JOB, REMOVED_JOBS_KEY, &removed)
					.await;
				self
					.job_infos
					.mark_running_as_finished_successfully(TIMED_OUT_SWEEP_JOB)
					.await?;
				Ok(names.len() as u64)
			}
			Err(error) => {
				let _ = self
					.job_infos
					.mark_running_as_finished_with_error(TIMED_OUT_SWEEP_JOB, &error)
					.await;
				Err(error.into())
			}
		}
	}

	/// Delete finished history older than the configured retention.
	#[instrument(skip(self))]
	pub async fn cleanup_old_jobs(&self) -> Result<u64> {
		if !self.begin_sweep(OLD_JOBS_SWEEP_JOB).await? {
			return Ok(0);
		}

		let cutoff =
			Utc::now() - chrono::Duration::hours(self.config.hours_after_which_old_jobs_are_deleted);

		match self.job_infos.cleanup_old_jobs(cutoff).await {
			Ok(deleted) => {
				self
					.job_infos
					.add_additional_data(
						OLD_JOBS_SWEEP_JOB,
						NUMBER_OF_REMOVED_JOBS_KEY,
						&deleted.to_string(),
					)
					.await;
				self
					.job_infos
					.mark_running_as_finished_successfully(OLD_JOBS_SWEEP_JOB)
					.await?;
				Ok(deleted)
			}
			Err(error) => {
				let _ = self
					.job_infos
					.mark_running_as_finished_with_error(OLD_JOBS_SWEEP_JOB, &error)
					.await;
				Err(error.into())
			}
		}
	}

	/// Delete precondition-skipped records older than the configured
	/// retention.
	#[instrument(skip(self))]
	pub async fn cleanup_not_executed_jobs(&self) -> Result<u64> {
		if !self.begin_sweep(NOT_EXECUTED_SWEEP_JOB).await? {
			return Ok(0);
		}

		let cutoff = Utc::now()
			- chrono::Duration::hours(self.config.hours_after_which_not_executed_jobs_are_deleted);

		match self.job_infos.cleanup_not_executed_jobs(cutoff).await {
			Ok(deleted) => {
				self
					.job_infos
					.add_additional_data(
						NOT_EXECUTED_SWEEP_JOB,
						NUMBER_OF_REMOVED_JOBS_KEY,
						&deleted.to_string(),
					)
					.await;
				self
					.job_infos
					.mark_running_as_finished_successfully(NOT_EXECUTED_SWEEP_JOB)
					.await?;
				Ok(deleted)
			}
			Err(error) => {
				let _ = self
					.job_infos
					.mark_running_as_finished_with_error(NOT_EXECUTED_SWEEP_JOB, &error)
					.await;
				Err(error.into())
			}
		}
	}

	/// Await every worker task spawned by this service so far.
	pub async fn join_workers(&self) {
		let mut handles = self.worker_handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}
	}

	async fn resolved_definition(&self, runnable: &Arc<dyn JobRunnable>) -> Result<JobDefinition> {
		let definition = runnable.job_definition();
		Ok(
			self
				.job_definitions
				.find(&definition.name)
				.await?
				.unwrap_or(definition),
		)
	}

	/// Claim a sweep's meta-record. False means another host already
	/// holds the sweep's running slot.
	async fn begin_sweep(&self, name: &str) -> Result<bool> {
		let new_job = NewJobInfo::new(
			name,
			&self.config.host,
			current_thread_name(),
			SWEEP_MAX_EXECUTION_TIME,
			RunningState::Running,
		)
		.with_priority(ExecutionPriority::IgnorePreconditions);

		match self.job_infos.create(&new_job).await? {
			Some(_) => Ok(true),
			None => {
				debug!(job_name = %name, "sweep already active in the cluster");
				Ok(false)
			}
		}
	}

	async fn dispatch(
		&self,
		runnable: Arc<dyn JobRunnable>,
		definition: &JobDefinition,
		id: JobInfoId,
	) -> Result<()> {
		if definition.remote {
			return self.start_remote(definition, id).await;
		}

		let job_infos = Arc::clone(&self.job_infos);
		let context = JobExecutionContext::new(definition.name.clone(), Arc::clone(&self.job_infos));
		let name = definition.name.clone();

		let handle = tokio::spawn(async move {
			// The runnable runs on its own task so a panic surfaces as
			// a join error instead of tearing down the supervisor.
			let outcome = tokio::spawn(async move { runnable.execute(&context).await }).await;

			let (result_code, message) = match outcome {
				Ok(Ok(result_code)) => (result_code, None),
				Ok(Err(error)) => (
					foreman_core::ResultCode::Failed,
					Some(render_error_chain(error.as_ref())),
				),
				Err(join_error) => (
					foreman_core::ResultCode::Failed,
					Some(join_error.to_string()),
				),
			};

			match job_infos.mark_as_finished_by_id(id, result_code, message).await {
				Ok(true) => {}
				Ok(false) => {
					// The timeout sweep got there first.
					debug!(job_name = %name, job_info_id = %id, "job was already finished");
				}
				Err(error) => {
					warn!(job_name = %name, job_info_id = %id, %error, "failed to record job completion");
				}
			}
		});

		self.worker_handles.lock().await.push(handle);
		Ok(())
	}

	async fn start_remote(&self, definition: &JobDefinition, id: JobInfoId) -> Result<()> {
		let name = &definition.name;
		let executor = self
			.remote_executor
			.as_ref()
			.ok_or_else(|| JobError::RemoteExecutorMissing(name.clone()))?;

		match executor.start_job(name).await {
			Ok(status_url) => {
				self
					.job_infos
					.add_additional_data(name, RESULT_HASH_KEY, &status_url)
					.await;
				info!(job_name = %name, status_url = %status_url, "remote job started");
				Ok(())
			}
			Err(error) => {
				let message = render_error_chain(&error);
				if let Err(finish_error) = self
					.job_infos
					.mark_as_finished_by_id(id, foreman_core::ResultCode::Failed, Some(message))
					.await
				{
					warn!(job_name = %name, %finish_error, "failed to record remote start failure");
				}
				Err(error.into())
			}
		}
	}
}

fn current_thread_name() -> String {
	std::thread::current()
		.name()
		.unwrap_or("worker")
		.to_string()
}
