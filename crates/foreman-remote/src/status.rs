// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Status payloads reported by remote workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foreman_core::ResultCode;

/// Execution phase reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteRunningStatus {
	Starting,
	Running,
	Finished,
}

impl RemoteRunningStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Finished)
	}
}

/// Body of a `GET <status-url>` poll response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJobStatus {
	pub status: RemoteRunningStatus,
	#[serde(default)]
	pub result: Option<ResultCode>,
	#[serde(default)]
	pub message: Option<String>,
	/// Complete log so far; the poller tracks how many lines it already
	/// persisted and appends only the tail.
	#[serde(default)]
	pub log_lines: Vec<String>,
	#[serde(default)]
	pub finish_time: Option<DateTime<Utc>>,
}

impl RemoteJobStatus {
	/// The result code to store once the worker reports FINISHED. A
	/// terminal status without an explicit result is treated as failed.
	pub fn result_code(&self) -> ResultCode {
		self.result.unwrap_or(ResultCode::Failed)
	}
}
