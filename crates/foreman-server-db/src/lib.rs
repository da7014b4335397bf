// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence layer for the Foreman job coordination service.
//!
//! All scheduling state lives in the backing store: there is no
//! in-process queue. Mutual exclusion between hosts is serialized by the
//! unique `(name, running_state)` index, which every state transition in
//! this crate leans on.

pub mod error;
pub mod job_definition;
pub mod job_info;
pub mod pool;
pub mod schema;
pub mod testing;

pub use error::{render_error_chain, DbError, Result};
pub use job_definition::{JobDefinitionRepository, SqliteJobDefinitionRepository};
pub use job_info::{JobInfoRepository, NewJobInfo, SqliteJobInfoRepository};
pub use pool::create_pool;
pub use schema::run_migrations;
