// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Archive seam between the executor and the artifact store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Supplies the artifact archive uploaded when a remote job starts.
///
/// Implementations produce a tar.gz of the per-job directory plus the
/// per-environment subdirectory keyed by the suffix after the last `_`
/// in the job name. Packaging lives outside this crate; the executor
/// only streams the bytes.
#[async_trait]
pub trait ArchiveProvider: Send + Sync {
	async fn create_archive(&self, job_name: &str) -> Result<Bytes>;
}
