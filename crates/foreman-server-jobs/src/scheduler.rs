// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic driver for the job service.
//!
//! One scheduler per process. It owns the tokio tasks that drain the
//! queue, poll remote jobs, and run the retention sweeps; the service
//! itself stays free of timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::service::JobService;

pub struct JobScheduler {
	service: Arc<JobService>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new(service: Arc<JobService>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			service,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Persist the registered definitions, then spawn the periodic
	/// loops: queue draining, retention sweeps, and one poll loop per
	/// remote job at its own polling interval.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		self.service.save_definitions().await?;

		let mut handles = self.handles.lock().await;

		{
			let service = Arc::clone(&self.service);
			let interval = service.config().queue_drain_interval;
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			handles.push(tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if let Err(error) = service.execute_queued_jobs().await {
								warn!(%error, "queue draining failed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!("shutting down queue draining loop");
							break;
						}
					}
				}
			}));
		}

		{
			let service = Arc::clone(&self.service);
			let interval = service.config().sweep_interval;
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			handles.push(tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if let Err(error) = service.cleanup_timed_out_jobs().await {
								warn!(%error, "timeout sweep failed");
							}
							if let Err(error) = service.cleanup_old_jobs().await {
								warn!(%error, "old-jobs sweep failed");
							}
							if let Err(error) = service.cleanup_not_executed_jobs().await {
								warn!(%error, "not-executed sweep failed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!("shutting down sweep loop");
							break;
						}
					}
				}
			}));
		}

		for definition in self.service.remote_definitions() {
			let service = Arc::clone(&self.service);
			let name = definition.name.clone();
			// Definitions with no usable interval fall back to a slow poll.
			let interval = if definition.polling_interval > 0 {
				Duration::from_millis(definition.polling_interval as u64)
			} else {
				Duration::from_secs(1)
			};
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			handles.push(tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if let Err(error) = service.poll_remote_job(&name).await {
								warn!(job_name = %name, %error, "remote poll failed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!(job_name = %name, "shutting down remote poll loop");
							break;
						}
					}
				}
			}));
		}

		info!(task_count = handles.len(), "job scheduler started");
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}
		self.service.join_workers().await;

		info!("job scheduler shut down");
	}
}
