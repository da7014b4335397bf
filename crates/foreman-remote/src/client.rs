// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client driving jobs on a remote worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foreman_common_http::RetryConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::archive::ArchiveProvider;
use crate::error::{RemoteError, Result};
use crate::status::RemoteJobStatus;

/// Configuration for the remote executor.
#[derive(Debug, Clone)]
pub struct RemoteExecutorConfig {
	/// Base URL of the worker, e.g. `http://worker:8080/jobs`.
	pub base_url: String,
	/// Timeout for HTTP requests.
	pub request_timeout: Duration,
	/// Retry configuration for transient transport failures.
	pub retry: RetryConfig,
}

impl RemoteExecutorConfig {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			request_timeout: Duration::from_secs(30),
			retry: RetryConfig::default(),
		}
	}
}

/// Driving seam for remote execution.
///
/// The scheduler talks to the worker exclusively through this trait, so
/// tests can substitute a scripted executor.
#[async_trait]
pub trait RemoteJobExecutor: Send + Sync {
	/// Start `job_name` on the worker. Returns the status URL to poll.
	/// A worker already running the job answers with the same URL.
	async fn start_job(&self, job_name: &str) -> Result<String>;

	/// Read the current status from a status URL.
	async fn fetch_status(&self, status_url: &str) -> Result<RemoteJobStatus>;

	/// Ask the worker to abandon the job. Idempotent.
	async fn stop_job(&self, status_url: &str) -> Result<()>;
}

/// Remote executor speaking the worker's HTTP contract.
#[derive(Clone)]
pub struct HttpRemoteJobExecutor {
	config: RemoteExecutorConfig,
	archive_provider: Arc<dyn ArchiveProvider>,
	http_client: Client,
}

impl HttpRemoteJobExecutor {
	pub fn new(
		config: RemoteExecutorConfig,
		archive_provider: Arc<dyn ArchiveProvider>,
	) -> Result<Self> {
		let base_url = config.base_url.trim_end_matches('/').to_string();

		// 303 See Other is a meaningful start response; the client must
		// surface it instead of following the redirect.
		let http_client = foreman_common_http::builder()
			.timeout(config.request_timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(RemoteError::Request)?;

		info!(base_url = %base_url, "remote executor initialized");

		Ok(Self {
			config: RemoteExecutorConfig { base_url, ..config },
			archive_provider,
			http_client,
		})
	}
}

#[async_trait]
impl RemoteJobExecutor for HttpRemoteJobExecutor {
	async fn start_job(&self, job_name: &str) -> Result<String> {
		let archive = self.archive_provider.create_archive(job_name).await?;
		let url = format!("{}/{}", self.config.base_url, job_name);

		debug!(url = %url, job_name = %job_name, archive_bytes = archive.len(), "starting remote job");

		let response = foreman_common_http::retry(&self.config.retry, || async {
			let part = Part::bytes(archive.to_vec())
				.file_name(format!("{job_name}.tar.gz"))
				.mime_str("application/gzip")?;
			let form = Form::new().part("archive", part);
			self.http_client.post(&url).multipart(form).send().await
		})
		.await?;

		match response.status() {
			StatusCode::CREATED => {
				let status_url = location_of(&response)?;
				info!(job_name = %job_name, status_url = %status_url, "remote job started");
				Ok(status_url)
			}
			StatusCode::SEE_OTHER => {
				let status_url = location_of(&response)?;
				info!(job_name = %job_name, status_url = %status_url, "remote job already running");
				Ok(status_url)
			}
			status => {
				warn!(job_name = %job_name, status = status.as_u16(), "remote start rejected");
				Err(RemoteError::StartRejected {
					status: status.as_u16(),
				})
			}
		}
	}

	async fn fetch_status(&self, status_url: &str) -> Result<RemoteJobStatus> {
		let response = foreman_common_http::retry(&self.config.retry, || async {
			self.http_client.get(status_url).send().await
		})
		.await?;

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(RemoteError::ServerError { status, message });
		}

		Ok(response.json().await?)
	}

	async fn stop_job(&self, status_url: &str) -> Result<()> {
		let response = foreman_common_http::retry(&self.config.retry, || async {
			self.http_client.delete(status_url).send().await
		})
		.await?;

		// A worker that no longer knows the job already satisfied us.
		if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
			debug!(status_url = %status_url, "remote job stopped");
			return Ok(());
		}

		let status = response.status().as_u16();
		let message = response.text().await.unwrap_or_default();
		Err(RemoteError::ServerError { status, message })
	}
}

/// Resolve the Location header against the URL that produced it.
fn location_of(response: &reqwest::Response) -> Result<String> {
	let location = response
		.headers()
		.get(reqwest::header::LOCATION)
		.and_then(|value| value.to_str().ok())
		.ok_or(RemoteError::MissingLocation)?;

	let resolved = response
		.url()
		.join(location)
		.map_err(|_| RemoteError::MissingLocation)?;

	Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::Bytes;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	struct FixedArchiveProvider;

	#[async_trait]
	impl ArchiveProvider for FixedArchiveProvider {
		async fn create_archive(&self, _job_name: &str) -> Result<Bytes> {
			Ok(Bytes::from_static(b"archive-bytes"))
		}
	}

	struct FailingArchiveProvider;

	#[async_trait]
	impl ArchiveProvider for FailingArchiveProvider {
		async fn create_archive(&self, job_name: &str) -> Result<Bytes> {
			Err(RemoteError::Archive(format!("no artifacts for {job_name}")))
		}
	}

	fn executor(base_url: &str) -> HttpRemoteJobExecutor {
		HttpRemoteJobExecutor::new(
			RemoteExecutorConfig::new(base_url),
			Arc::new(FixedArchiveProvider),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn start_job_returns_status_url_on_created() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/import"))
			.respond_with(
				ResponseTemplate::new(201).insert_header("Location", "/import/status/1"),
			)
			.mount(&server)
			.await;

		let status_url = executor(&server.uri()).start_job("import").await.unwrap();
		assert_eq!(status_url, format!("{}/import/status/1", server.uri()));
	}

	#[tokio::test]
	async fn start_job_treats_see_other_as_started() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/import"))
			.respond_with(
				ResponseTemplate::new(303).insert_header("Location", "/import/status/1"),
			)
			.mount(&server)
			.await;

		let status_url = executor(&server.uri()).start_job("import").await.unwrap();
		assert_eq!(status_url, format!("{}/import/status/1", server.uri()));
	}

	#[tokio::test]
	async fn start_job_accepts_absolute_location() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/import"))
			.respond_with(
				ResponseTemplate::new(201)
					.insert_header("Location", "http://elsewhere.example/status/9"),
			)
			.mount(&server)
			.await;

		let status_url = executor(&server.uri()).start_job("import").await.unwrap();
		assert_eq!(status_url, "http://elsewhere.example/status/9");
	}

	#[tokio::test]
	async fn start_job_rejects_unexpected_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/import"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let result = executor(&server.uri()).start_job("import").await;
		assert!(matches!(
			result,
			Err(RemoteError::StartRejected { status: 500 })
		));
	}

	#[tokio::test]
	async fn start_job_requires_location_header() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/import"))
			.respond_with(ResponseTemplate::new(201))
			.mount(&server)
			.await;

		let result = executor(&server.uri()).start_job("import").await;
		assert!(matches!(result, Err(RemoteError::MissingLocation)));
	}

	#[tokio::test]
	async fn start_job_surfaces_archive_failure() {
		let server = MockServer::start().await;
		let executor = HttpRemoteJobExecutor::new(
			RemoteExecutorConfig::new(server.uri()),
			Arc::new(FailingArchiveProvider),
		)
		.unwrap();

		let result = executor.start_job("import").await;
		assert!(matches!(result, Err(RemoteError::Archive(_))));
		assert!(server.received_requests().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn fetch_status_parses_payload() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/import/status/1"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"status": "RUNNING",
				"logLines": ["a", "b"]
			})))
			.mount(&server)
			.await;

		let status = executor(&server.uri())
			.fetch_status(&format!("{}/import/status/1", server.uri()))
			.await
			.unwrap();
		assert_eq!(status.status, crate::status::RemoteRunningStatus::Running);
		assert_eq!(status.log_lines, vec!["a", "b"]);
	}

	#[tokio::test]
	async fn fetch_status_surfaces_server_errors() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/import/status/1"))
			.respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
			.mount(&server)
			.await;

		let result = executor(&server.uri())
			.fetch_status(&format!("{}/import/status/1", server.uri()))
			.await;
		assert!(matches!(
			result,
			Err(RemoteError::ServerError { status: 502, .. })
		));
	}

	#[tokio::test]
	async fn stop_job_is_idempotent() {
		let server = MockServer::start().await;
		Mock::given(method("DELETE"))
			.and(path("/import/status/1"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		executor(&server.uri())
			.stop_job(&format!("{}/import/status/1", server.uri()))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn stop_job_surfaces_server_errors() {
		let server = MockServer::start().await;
		Mock::given(method("DELETE"))
			.and(path("/import/status/1"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let result = executor(&server.uri())
			.stop_job(&format!("{}/import/status/1", server.uri()))
			.await;
		assert!(matches!(
			result,
			Err(RemoteError::ServerError { status: 500, .. })
		));
	}

}
