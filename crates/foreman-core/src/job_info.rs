// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-execution job records.
//!
//! One [`JobInfo`] exists for every execution of a named job. The store
//! enforces a unique index on `(name, running_state)`, so at most one
//! record per name may be `QUEUED` and at most one `RUNNING` at any
//! moment. Finished executions are kept as history: finishing rewrites
//! the running state to a fresh `FINISHED_<uuid>` token, which keeps
//! every historical record distinct under the same unique index.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a job execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobInfoId(pub Uuid);

impl JobInfoId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for JobInfoId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobInfoId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobInfoId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Execution state of a job record.
///
/// `Queued` and `Running` are the two active states. A finished record
/// carries its full `FINISHED_<uuid>` token so that any number of
/// historical records per name coexist under the unique
/// `(name, running_state)` index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RunningState {
	Queued,
	Running,
	Finished(String),
}

impl RunningState {
	pub const FINISHED_PREFIX: &'static str = "FINISHED_";

	/// Mint a finished state with a fresh unique token.
	pub fn finished() -> Self {
		Self::Finished(format!("{}{}", Self::FINISHED_PREFIX, Uuid::new_v4()))
	}

	/// Active means the record occupies the per-name queued or running slot.
	pub fn is_active(&self) -> bool {
		matches!(self, Self::Queued | Self::Running)
	}

	pub fn is_finished(&self) -> bool {
		matches!(self, Self::Finished(_))
	}

	pub fn as_str(&self) -> &str {
		match self {
			Self::Queued => "QUEUED",
			Self::Running => "RUNNING",
			Self::Finished(token) => token,
		}
	}
}

impl fmt::Display for RunningState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for RunningState {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"QUEUED" => Ok(Self::Queued),
			"RUNNING" => Ok(Self::Running),
			other if other.starts_with(Self::FINISHED_PREFIX) => {
				Ok(Self::Finished(other.to_string()))
			}
			other => Err(format!("unknown running state: {other}")),
		}
	}
}

impl From<RunningState> for String {
	fn from(state: RunningState) -> Self {
		state.as_str().to_string()
	}
}

impl TryFrom<String> for RunningState {
	type Error = String;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		s.parse()
	}
}

/// Outcome of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
	Successful,
	Failed,
	TimedOut,
	NotExecuted,
}

impl ResultCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Successful => "SUCCESSFUL",
			Self::Failed => "FAILED",
			Self::TimedOut => "TIMED_OUT",
			Self::NotExecuted => "NOT_EXECUTED",
		}
	}
}

impl fmt::Display for ResultCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for ResultCode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"SUCCESSFUL" => Ok(Self::Successful),
			"FAILED" => Ok(Self::Failed),
			"TIMED_OUT" => Ok(Self::TimedOut),
			"NOT_EXECUTED" => Ok(Self::NotExecuted),
			_ => Err(format!("unknown result code: {s}")),
		}
	}
}

/// How strictly preconditions are evaluated before an execution starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPriority {
	/// Run without consulting the runnable's precondition.
	IgnorePreconditions,
	/// Ask the runnable whether execution is necessary (default).
	CheckPreconditions,
	/// Run even where a queued record would otherwise be skipped.
	ForceExecution,
}

impl Default for ExecutionPriority {
	fn default() -> Self {
		Self::CheckPreconditions
	}
}

impl ExecutionPriority {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::IgnorePreconditions => "IGNORE_PRECONDITIONS",
			Self::CheckPreconditions => "CHECK_PRECONDITIONS",
			Self::ForceExecution => "FORCE_EXECUTION",
		}
	}
}

impl fmt::Display for ExecutionPriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for ExecutionPriority {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"IGNORE_PRECONDITIONS" => Ok(Self::IgnorePreconditions),
			"CHECK_PRECONDITIONS" => Ok(Self::CheckPreconditions),
			"FORCE_EXECUTION" => Ok(Self::ForceExecution),
			_ => Err(format!("unknown execution priority: {s}")),
		}
	}
}

/// One timestamped line of execution output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
	pub timestamp: DateTime<Utc>,
	pub line: String,
}

impl LogLine {
	pub fn new(line: impl Into<String>) -> Self {
		Self {
			timestamp: Utc::now(),
			line: line.into(),
		}
	}
}

/// A single execution of a named job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
	pub id: JobInfoId,
	pub name: String,

	/// Host that created the record.
	pub host: String,
	/// Worker identifier on that host.
	pub thread: String,

	pub creation_time: DateTime<Utc>,
	pub start_time: Option<DateTime<Utc>>,
	pub finish_time: Option<DateTime<Utc>>,
	pub last_modification_time: DateTime<Utc>,

	pub running_state: RunningState,
	pub result_state: Option<ResultCode>,
	/// Free-form completion message; error chain for failed jobs.
	pub result_message: Option<String>,
	/// Progress message updated while running.
	pub status_message: Option<String>,

	pub execution_priority: ExecutionPriority,

	/// Milliseconds a running record may go unmodified before it is
	/// considered timed out.
	pub max_execution_time: i64,
	pub max_idle_time: Option<i64>,

	/// Caller-supplied parameters, fixed at create.
	pub parameters: BTreeMap<String, String>,
	/// Key/value data appended during execution.
	pub additional_data: BTreeMap<String, String>,

	pub log_lines: Vec<LogLine>,
}

impl JobInfo {
	/// A running record is timed out once its last modification is older
	/// than `max_execution_time` milliseconds.
	pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
		self.running_state == RunningState::Running
			&& self.last_modification_time + Duration::milliseconds(self.max_execution_time) < now
	}
}
