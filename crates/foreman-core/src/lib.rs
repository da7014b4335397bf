// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Foreman job coordination service.

pub mod job_definition;
pub mod job_info;

pub use job_definition::JobDefinition;
pub use job_info::{
	ExecutionPriority, JobInfo, JobInfoId, LogLine, ResultCode, RunningState,
};
