// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry logic with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retrying an operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Number of retries after the initial attempt.
	pub max_retries: u32,
	/// Delay before the first retry; doubles on each subsequent retry.
	pub base_delay: Duration,
	/// Upper bound on the backoff delay.
	pub max_delay: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(10),
		}
	}
}

/// Errors that can signal whether a retry is worthwhile.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		self.is_timeout() || self.is_connect()
	}
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// retry budget is exhausted. Backoff doubles per attempt with random
/// jitter so competing pollers don't fall into lockstep.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Display,
{
	let mut attempt = 0u32;

	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(error) if error.is_retryable() && attempt < config.max_retries => {
				attempt += 1;
				let delay = backoff_delay(config, attempt);
				warn!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying after transient failure");
				tokio::time::sleep(delay).await;
			}
			Err(error) => return Err(error),
		}
	}
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
	let exponential = config
		.base_delay
		.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
		.min(config.max_delay);
	let jitter_budget = (exponential.as_millis() as u64 / 4).max(1);
	exponential + Duration::from_millis(fastrand::u64(0..jitter_budget))
}
