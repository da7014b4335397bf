// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use foreman_core::{JobDefinition, ResultCode};

use crate::context::JobExecutionContext;

/// A runnable failure; rendered into the record's result message.
pub type RunnableError = Box<dyn std::error::Error + Send + Sync>;

/// The callable bound to a job name.
///
/// Local jobs run `execute` on a worker task; remote jobs never have it
/// called because their work happens on an external worker.
#[async_trait]
pub trait JobRunnable: Send + Sync {
	fn job_definition(&self) -> JobDefinition;

	/// Consulted by the scheduler under `CHECK_PRECONDITIONS`.
	async fn is_execution_necessary(&self) -> bool {
		true
	}

	async fn execute(
		&self,
		context: &JobExecutionContext,
	) -> std::result::Result<ResultCode, RunnableError>;
}
