// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy surfaced from the job service.

use foreman_remote::RemoteError;
use foreman_server_db::DbError;
use thiserror::Error;

/// Result type for job service operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that can occur when driving jobs.
#[derive(Debug, Error)]
pub enum JobError {
	#[error("no runnable registered for job: {0}")]
	NotRegistered(String),

	#[error("a runnable is already registered for job: {0}")]
	AlreadyRegistered(String),

	#[error("job is already running: {0}")]
	AlreadyRunning(String),

	#[error("job is already queued: {0}")]
	AlreadyQueued(String),

	#[error("job execution is disabled: {0}")]
	ExecutionDisabled(String),

	#[error("job execution is not necessary: {0}")]
	ExecutionNotNecessary(String),

	#[error("remote execution failed: {0}")]
	RemoteExecutionFailed(#[from] RemoteError),

	#[error("remote executor is not configured for job: {0}")]
	RemoteExecutorMissing(String),

	#[error("persistence error: {0}")]
	Persistence(#[from] DbError),
}
