// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job service and scheduler for Foreman.
//!
//! This crate orchestrates job executions against the shared store:
//! dispatching local and remote jobs, draining the queue, polling
//! remote workers, and running the retention sweeps as self-hosting
//! meta-jobs.

pub mod config;
pub mod context;
pub mod error;
pub mod info;
pub mod runnable;
pub mod scheduler;
pub mod service;

pub use config::JobServiceConfig;
pub use context::JobExecutionContext;
pub use error::{JobError, Result};
pub use info::JobInfoService;
pub use runnable::{JobRunnable, RunnableError};
pub use scheduler::JobScheduler;
pub use service::JobService;
