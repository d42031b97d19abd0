// Batch orchestrator - runs items sequentially or on a fixed worker pool

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::errors::DownloadError;
use super::models::{MediaItem, Outcome};
use super::progress::{ItemProgress, ProgressTracker};
use super::traits::DownloadUnit;

/// What happened to one item of the batch
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub index: Option<usize>,
    pub title: String,
    pub outcome: Outcome,
}

/// Per-item outcomes in input order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Downloaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ItemReport, &DownloadError)> {
        self.items.iter().filter_map(|r| match &r.outcome {
            Outcome::Failed(e) => Some((r, e)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct BatchOrchestrator {
    unit: Arc<dyn DownloadUnit>,
    tracker: Arc<ProgressTracker>,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(unit: Arc<dyn DownloadUnit>, tracker: Arc<ProgressTracker>, concurrency: usize) -> Self {
        Self {
            unit,
            tracker,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, items: Vec<MediaItem>) -> BatchReport {
        let total = items.len();
        tracing::info!(
            "Starting batch of {} item(s) with concurrency {}",
            total,
            self.concurrency
        );

        let labels: Vec<(Option<usize>, String)> =
            items.iter().map(|item| (item.index, item.title.clone())).collect();
        let handles: Arc<Vec<ItemProgress>> =
            Arc::new(items.iter().map(|item| self.tracker.item(item)).collect());

        let slots: Vec<Option<ItemReport>> = if self.concurrency == 1 {
            self.run_sequential(items, &handles).await
        } else {
            self.run_pool(items, &handles).await
        };

        // Every item counts exactly once, even if a worker died mid-item.
        for handle in handles.iter() {
            handle.complete();
        }

        BatchReport {
            items: fill_missing(slots, labels),
        }
    }

    async fn run_sequential(
        &self,
        items: Vec<MediaItem>,
        handles: &Arc<Vec<ItemProgress>>,
    ) -> Vec<Option<ItemReport>> {
        let total = items.len();
        let mut slots = Vec::with_capacity(total);
        for (pos, item) in items.into_iter().enumerate() {
            let report =
                process_item(self.unit.as_ref(), &self.tracker, &handles[pos], item, total).await;
            slots.push(Some(report));
        }
        slots
    }

    async fn run_pool(
        &self,
        items: Vec<MediaItem>,
        handles: &Arc<Vec<ItemProgress>>,
    ) -> Vec<Option<ItemReport>> {
        let total = items.len();
        let queue: Arc<Mutex<VecDeque<(usize, MediaItem)>>> =
            Arc::new(Mutex::new(items.into_iter().enumerate().collect()));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let queue = Arc::clone(&queue);
            let unit = Arc::clone(&self.unit);
            let tracker = Arc::clone(&self.tracker);
            let handles = Arc::clone(handles);

            workers.spawn(async move {
                let mut done = Vec::new();
                loop {
                    // Pop under the lock, release it before running the item
                    let next = queue.lock().pop_front();
                    let Some((pos, item)) = next else { break };
                    tracing::debug!("Worker {} picked item {}", worker_id, pos + 1);
                    let report =
                        process_item(unit.as_ref(), &tracker, &handles[pos], item, total).await;
                    done.push((pos, report));
                }
                done
            });
        }

        let mut slots: Vec<Option<ItemReport>> = (0..total).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => {
                    for (pos, report) in done {
                        slots[pos] = Some(report);
                    }
                }
                Err(e) => tracing::error!("Download worker stopped: {}", e),
            }
        }
        slots
    }
}

/// Run `items` through `unit`, one at a time or on `concurrency` workers.
pub async fn run_batch(
    items: Vec<MediaItem>,
    concurrency: usize,
    unit: Arc<dyn DownloadUnit>,
    tracker: Arc<ProgressTracker>,
) -> BatchReport {
    BatchOrchestrator::new(unit, tracker, concurrency).run(items).await
}

async fn process_item(
    unit: &dyn DownloadUnit,
    tracker: &ProgressTracker,
    handle: &ItemProgress,
    item: MediaItem,
    total: usize,
) -> ItemReport {
    if let Some(idx) = item.index {
        tracker.print_info(&format!(
            "Processing video {}/{}: {}",
            idx, total, item.title
        ));
    }

    let outcome = match AssertUnwindSafe(unit.download_one(&item, handle))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("Unexpected failure while downloading {}: {}", item.label(), message);
            Outcome::Failed(DownloadError::Download(format!(
                "unexpected failure: {}",
                message
            )))
        }
    };

    let which = match item.index {
        Some(idx) => format!("video {}", idx),
        None => "video".to_string(),
    };
    match &outcome {
        Outcome::Downloaded => {}
        Outcome::Skipped { existing } => tracker.print_warn(&format!(
            "Skipping {}: Already downloaded ({})",
            which,
            existing.display()
        )),
        Outcome::Failed(DownloadError::MissingUrl) => {
            tracker.print_error(&format!("Skipping {}: URL not found.", which))
        }
        Outcome::Failed(e) => tracker.print_error(&format!("Skipping {}: {}", which, e)),
    }

    handle.complete();

    ItemReport {
        index: item.index,
        title: item.title,
        outcome,
    }
}

/// Reports in input order; items whose worker died get a failure entry.
fn fill_missing(
    slots: Vec<Option<ItemReport>>,
    labels: Vec<(Option<usize>, String)>,
) -> Vec<ItemReport> {
    slots
        .into_iter()
        .zip(labels)
        .map(|(slot, (index, title))| {
            slot.unwrap_or_else(|| ItemReport {
                index,
                title,
                outcome: Outcome::Failed(DownloadError::Download(
                    "worker stopped unexpectedly".to_string(),
                )),
            })
        })
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
