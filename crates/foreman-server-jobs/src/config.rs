// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Configuration for the job service and its scheduler.
#[derive(Debug, Clone)]
pub struct JobServiceConfig {
	/// Host name recorded on executions created by this process.
	pub host: String,
	/// Retention for finished history; non-RUNNING records older than
	/// this many hours are deleted by the cleanup sweep.
	pub hours_after_which_old_jobs_are_deleted: i64,
	/// Retention for precondition-skipped records.
	pub hours_after_which_not_executed_jobs_are_deleted: i64,
	/// Cadence of the queue-draining loop.
	pub queue_drain_interval: Duration,
	/// Cadence of the retention and timeout sweeps.
	pub sweep_interval: Duration,
}

impl Default for JobServiceConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			hours_after_which_old_jobs_are_deleted: 168,
			hours_after_which_not_executed_jobs_are_deleted: 4,
			queue_drain_interval: Duration::from_secs(10),
			sweep_interval: Duration::from_secs(300),
		}
	}
}

impl JobServiceConfig {
	/// Defaults with the host taken from the `HOSTNAME` environment
	/// variable when present.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Ok(host) = std::env::var("HOSTNAME") {
			if !host.is_empty() {
				config.host = host;
			}
		}
		config
	}

	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = host.into();
		self
	}
}
