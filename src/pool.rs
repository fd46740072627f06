//! Bounded fan-out/fan-in over tokio tasks.
//!
//! A feeder pushes every item into a dispatch channel and closes it. At most
//! `workers` tasks drain that channel, each producing exactly one result per
//! item, and the caller collects until it has seen as many results as it
//! dispatched. Both resolution stages run on top of this.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool {
  workers: usize,
}

impl Default for Pool {
  fn default() -> Self {
    Self::new(DEFAULT_WORKERS)
  }
}

impl Pool {
  /// A pool of at most `workers` concurrent tasks. Zero is bumped to one.
  #[must_use]
  pub fn new(workers: usize) -> Self {
    Self {
      workers: workers.max(1),
    }
  }

  #[must_use]
  pub const fn workers(&self) -> usize {
    self.workers
  }

  /// Number of tasks actually spawned for `items` items.
  #[must_use]
  pub fn effective_workers(&self, items: usize) -> usize {
    self.workers.min(items)
  }

  /// Runs `work` once per item and returns every result, in completion
  /// order.
  ///
  /// Returns immediately, without spawning anything, when `items` is empty.
  pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<R>
  where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
  {
    let expected = items.len();
    let workers = self.effective_workers(expected);
    if workers == 0 {
      return Vec::new();
    }
    debug!(items = expected, workers, "starting pool");

    let (work_tx, work_rx) = mpsc::channel::<T>(workers);
    let (result_tx, mut result_rx) = mpsc::channel::<R>(workers);
    let work_rx = Arc::new(Mutex::new(work_rx));
    let work = Arc::new(work);

    let feeder = tokio::spawn(async move {
      for item in items {
        if work_tx.send(item).await.is_err() {
          break;
        }
      }
      // dropping work_tx closes the dispatch channel
    });

    let handles: Vec<_> = (0..workers)
      .map(|_| {
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let work = Arc::clone(&work);
        tokio::spawn(async move {
          loop {
            let next = work_rx.lock().await.recv().await;
            let Some(item) = next else { break };
            if result_tx.send(work(item).await).await.is_err() {
              break;
            }
          }
        })
      })
      .collect();
    drop(result_tx);

    let mut results = Vec::with_capacity(expected);
    while results.len() < expected {
      match result_rx.recv().await {
        Some(result) => results.push(result),
        None => break,
      }
    }

    if results.len() < expected {
      warn!(
        expected,
        received = results.len(),
        "pool workers exited before every item was processed"
      );
    }

    let _ = feeder.await;
    for joined in join_all(handles).await {
      if let Err(e) = joined {
        warn!("pool worker failed: {e}");
      }
    }

    results
  }
}
