// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process delayed actions that outlive the handler that scheduled them.
//!
//! Actions are lost on restart. [`DeferredActions::shutdown`] cancels every
//! action still waiting and joins the tasks. Once shutdown has begun, new
//! actions are refused.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub struct DeferredActions {
	shutdown_tx: broadcast::Sender<()>,
	shutting_down: AtomicBool,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for DeferredActions {
	fn default() -> Self {
		Self::new()
	}
}

impl DeferredActions {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			shutdown_tx,
			shutting_down: AtomicBool::new(false),
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Run `action` after `delay` unless shut down first. Returns `false`,
	/// dropping the action, when shutdown has already begun.
	#[instrument(skip(self, action), fields(delay_secs = delay.as_secs()))]
	pub async fn schedule<F>(&self, name: &'static str, delay: Duration, action: F) -> bool
	where
		F: Future<Output = ()> + Send + 'static,
	{
		// Subscribe before reading the flag: a shutdown that starts after the
		// check is still seen by the receiver.
		let mut shutdown_rx = self.shutdown_tx.subscribe();
		if self.shutting_down.load(Ordering::SeqCst) {
			warn!(action = name, "shutting down, deferred action refused");
			return false;
		}
		let handle = tokio::spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(delay) => {
					debug!(action = name, "running deferred action");
					action.await;
				}
				_ = shutdown_rx.recv() => {
					info!(action = name, "deferred action cancelled by shutdown");
				}
			}
		});

		let mut handles = self.handles.lock().await;
		handles.retain(|h| !h.is_finished());
		handles.push(handle);
		debug!(action = name, pending = handles.len(), "deferred action scheduled");
		true
	}

	/// Actions scheduled and not yet finished.
	pub async fn pending(&self) -> usize {
		let mut handles = self.handles.lock().await;
		handles.retain(|h| !h.is_finished());
		handles.len()
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.shutting_down.store(true, Ordering::SeqCst);
		let _ = self.shutdown_tx.send(());
		let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
		let count = handles.len();
		for handle in handles {
			if let Err(e) = handle.await {
				warn!(error = %e, "deferred action task panicked");
			}
		}
		info!(count, "deferred actions stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::sync::Arc;

	#[tokio::test(start_paused = true)]
	async fn test_action_runs_after_delay() {
		let deferred = DeferredActions::new();
		let ran = Arc::new(AtomicUsize::new(0));
		let counter = ran.clone();
		deferred
			.schedule("count", Duration::from_secs(30), async move {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.await;

		assert_eq!(deferred.pending().await, 1);
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(ran.load(Ordering::SeqCst), 0);

		tokio::time::sleep(Duration::from_secs(25)).await;
		assert_eq!(ran.load(Ordering::SeqCst), 1);
		assert_eq!(deferred.pending().await, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_cancels_waiting_actions() {
		let deferred = DeferredActions::new();
		let ran = Arc::new(AtomicUsize::new(0));
		for _ in 0..3 {
			let counter = ran.clone();
			deferred
				.schedule("count", Duration::from_secs(60), async move {
					counter.fetch_add(1, Ordering::SeqCst);
				})
				.await;
		}
		assert_eq!(deferred.pending().await, 3);

		deferred.shutdown().await;
		assert_eq!(deferred.pending().await, 0);

		tokio::time::sleep(Duration::from_secs(120)).await;
		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_schedule_after_shutdown_is_refused() {
		let deferred = DeferredActions::new();
		deferred.shutdown().await;

		let ran = Arc::new(AtomicUsize::new(0));
		let counter = ran.clone();
		let accepted = deferred
			.schedule("count", Duration::from_secs(1), async move {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.await;

		assert!(!accepted);
		assert_eq!(deferred.pending().await, 0);
		tokio::time::sleep(Duration::from_secs(5)).await;
		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}
}
