// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-name job metadata.

use serde::{Deserialize, Serialize};

/// Metadata describing how executions of a named job behave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
	pub name: String,
	/// Milliseconds a running execution may go unmodified before the
	/// timeout sweep finishes it.
	pub timeout_period: i64,
	/// Milliseconds between remote status polls.
	pub polling_interval: i64,
	/// Executed on an external worker rather than in-process.
	pub remote: bool,
	/// Disabled jobs reject new executions.
	pub disabled: bool,
}

impl JobDefinition {
	/// Name of the sentinel definition acting as the repository-wide
	/// execution semaphore.
	pub const GLOBAL_SEMAPHORE: &'static str = "JOBS";

	pub fn new(name: impl Into<String>, timeout_period: i64, polling_interval: i64) -> Self {
		Self {
			name: name.into(),
			timeout_period,
			polling_interval,
			remote: false,
			disabled: false,
		}
	}

	pub fn remote(mut self, remote: bool) -> Self {
		self.remote = remote;
		self
	}

	/// The well-known `JOBS` sentinel with zero timeout and interval.
	pub fn global_semaphore() -> Self {
		Self::new(Self::GLOBAL_SEMAPHORE, 0, 0)
	}
}
