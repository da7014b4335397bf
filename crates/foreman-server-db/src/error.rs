// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Render an error and its source chain into a single message, one
/// cause per line. Stored as the result message of failed executions.
pub fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
	let mut rendered = error.to_string();
	let mut source = error.source();
	while let Some(cause) = source {
		rendered.push_str("\ncaused by: ");
		rendered.push_str(&cause.to_string());
		source = cause.source();
	}
	rendered
}
