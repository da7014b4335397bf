// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only projection of job executions for UI consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use foreman_core::{JobInfo, JobInfoId, ResultCode};
use foreman_server_db::JobInfoRepository;

use crate::error::Result;

/// Query facade over the job info repository. Never mutates.
pub struct JobInfoService {
	job_infos: Arc<dyn JobInfoRepository>,
}

impl JobInfoService {
	pub fn new(job_infos: Arc<dyn JobInfoRepository>) -> Self {
		Self { job_infos }
	}

	pub async fn get_job_info(&self, id: JobInfoId) -> Result<Option<JobInfo>> {
		Ok(self.job_infos.find_by_id(id).await?)
	}

	pub async fn get_job_infos_by_name(&self, name: &str, limit: u32) -> Result<Vec<JobInfo>> {
		Ok(self.job_infos.find_by_name(name, limit).await?)
	}

	pub async fn get_job_infos_by_time_range(
		&self,
		name: &str,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
		result_code: Option<ResultCode>,
	) -> Result<Vec<JobInfo>> {
		Ok(
			self
				.job_infos
				.find_by_name_and_time_range(name, start, end, result_code)
				.await?,
		)
	}

	pub async fn get_most_recent(&self, name: &str) -> Result<Option<JobInfo>> {
		Ok(self.job_infos.find_most_recent(name).await?)
	}

	pub async fn get_most_recent_finished(&self, name: &str) -> Result<Option<JobInfo>> {
		Ok(self.job_infos.find_most_recent_finished(name).await?)
	}

	/// One record per distinct job name, each the most recent.
	pub async fn get_most_recent_of_each(&self) -> Result<Vec<JobInfo>> {
		Ok(self.job_infos.find_most_recent_per_name().await?)
	}

	pub async fn get_job_names(&self) -> Result<Vec<String>> {
		Ok(self.job_infos.distinct_job_names().await?)
	}
}
