// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use foreman_server_db::JobInfoRepository;

/// Handle a running job uses to report progress.
///
/// Every write refreshes the record's last modification time, which is
/// what keeps a long-running job out of the timeout sweep's reach. All
/// writes are best-effort; a storage hiccup never fails the job.
pub struct JobExecutionContext {
	job_name: String,
	job_infos: Arc<dyn JobInfoRepository>,
}

impl JobExecutionContext {
	pub fn new(job_name: impl Into<String>, job_infos: Arc<dyn JobInfoRepository>) -> Self {
		Self {
			job_name: job_name.into(),
			job_infos,
		}
	}

	pub fn job_name(&self) -> &str {
		&self.job_name
	}

	/// Append one line to the execution log.
	pub async fn add_logging_data(&self, line: &str) {
		self.job_infos.add_log_line(&self.job_name, line).await;
	}

	/// Replace the progress message shown for the running job.
	pub async fn set_status_message(&self, message: &str) {
		self.job_infos.set_status_message(&self.job_name, message).await;
	}

	/// Attach a key/value pair to the running record.
	pub async fn save_additional_data(&self, key: &str, value: &str) {
		self.job_infos.add_additional_data(&self.job_name, key, value).await;
	}
}
