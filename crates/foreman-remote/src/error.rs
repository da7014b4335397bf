// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the remote executor.

use thiserror::Error;

/// Result type for remote executor operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors that can occur talking to a remote worker.
#[derive(Debug, Error)]
pub enum RemoteError {
	#[error("remote start rejected with status {status}")]
	StartRejected { status: u16 },

	#[error("remote response carries no usable Location header")]
	MissingLocation,

	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("server error: status {status}: {message}")]
	ServerError { status: u16, message: String },

	#[error("archive creation failed: {0}")]
	Archive(String),
}
