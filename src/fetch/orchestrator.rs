// Batch fan-out over a bounded worker pool
//
// Each batch gets its own pool; all batches share the limiter inside the
// RetryingFetcher. Item failures are recorded, never propagated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::{BatchError, BatchReport, ErrorKind, FetchResult, ItemFetcher, RetryingFetcher};
use crate::marketplace::Marketplace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub max_batch_size: usize,
    pub max_workers: usize,
    /// Budget for one identifier, counted from when it gets a worker slot.
    pub item_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_workers: 5,
            item_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BatchOrchestrator<F: ?Sized> {
    fetcher: Arc<RetryingFetcher<F>>,
    options: BatchOptions,
}

impl<F> BatchOrchestrator<F>
where
    F: ItemFetcher + ?Sized + 'static,
{
    pub fn new(fetcher: RetryingFetcher<F>, options: BatchOptions) -> Result<Self, BatchError> {
        if options.max_batch_size == 0 {
            return Err(BatchError::invalid_setting(
                "max_batch_size must be greater than 0",
            ));
        }
        if options.max_workers == 0 {
            return Err(BatchError::invalid_setting(
                "max_workers must be greater than 0",
            ));
        }
        if options.item_timeout.is_zero() {
            return Err(BatchError::invalid_setting(
                "item timeout must be greater than 0",
            ));
        }

        Ok(Self {
            fetcher: Arc::new(fetcher),
            options,
        })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn fetcher(&self) -> &RetryingFetcher<F> {
        &self.fetcher
    }

    /// Check batch preconditions without doing any work.
    pub fn validate(&self, identifiers: &[String]) -> Result<(), BatchError> {
        if identifiers.is_empty() {
            return Err(BatchError::validation("No ASINs provided"));
        }
        if identifiers.len() > self.options.max_batch_size {
            return Err(BatchError::validation(format!(
                "Batch size {} exceeds maximum of {}",
                identifiers.len(),
                self.options.max_batch_size
            )));
        }
        if let Some(position) = identifiers.iter().position(|id| id.trim().is_empty()) {
            return Err(BatchError::validation(format!(
                "ASIN at position {} is empty",
                position
            )));
        }
        Ok(())
    }

    /// Fetch every identifier and return once each has an outcome.
    ///
    /// Results come back in submission order regardless of completion order.
    pub async fn process_batch(
        &self,
        identifiers: Vec<String>,
        marketplace: Marketplace,
    ) -> Result<BatchReport<F::Payload>, BatchError> {
        self.validate(&identifiers)?;

        let start = Instant::now();
        counter!("batch.requests").increment(1);
        histogram!("batch.items").record(identifiers.len() as f64);
        info!(
            items = identifiers.len(),
            marketplace = %marketplace,
            max_workers = self.options.max_workers,
            "Processing batch"
        );

        let pool = Arc::new(Semaphore::new(self.options.max_workers));
        let handles: Vec<_> = identifiers
            .iter()
            .map(|identifier| {
                let pool = Arc::clone(&pool);
                let fetcher = Arc::clone(&self.fetcher);
                let identifier = identifier.clone();
                let item_timeout = self.options.item_timeout;

                tokio::spawn(async move {
                    let _slot = match pool.acquire_owned().await {
                        Ok(slot) => slot,
                        Err(_) => {
                            return FetchResult::failure(
                                identifier,
                                ErrorKind::Internal,
                                "worker pool closed",
                            );
                        }
                    };
                    run_with_timeout(&fetcher, identifier, marketplace, item_timeout).await
                })
            })
            .collect();

        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .zip(identifiers)
            .map(|(joined, identifier)| match joined {
                Ok(result) => result,
                Err(err) => {
                    error!(identifier = %identifier, error = %err, "Batch worker failed");
                    counter!("fetch.failures", "kind" => ErrorKind::Internal.as_str())
                        .increment(1);
                    FetchResult::failure(
                        identifier,
                        ErrorKind::Internal,
                        format!("worker failed: {}", err),
                    )
                }
            })
            .collect();

        let report = BatchReport::from_results(results);
        histogram!("batch.latency_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        info!(
            total = report.total_requested,
            successful = report.success_count,
            failed = report.failure_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok(report)
    }

    /// Fetch one identifier through the same retry and timeout path as a batch item.
    ///
    /// A blank identifier is a validation error, as it is inside a batch.
    pub async fn fetch_single(
        &self,
        identifier: &str,
        marketplace: Marketplace,
    ) -> Result<FetchResult<F::Payload>, BatchError> {
        if identifier.trim().is_empty() {
            return Err(BatchError::validation("ASIN is empty"));
        }
        let result = run_with_timeout(
            &self.fetcher,
            identifier.to_string(),
            marketplace,
            self.options.item_timeout,
        )
        .await;
        Ok(result)
    }
}

async fn run_with_timeout<F>(
    fetcher: &RetryingFetcher<F>,
    identifier: String,
    marketplace: Marketplace,
    item_timeout: Duration,
) -> FetchResult<F::Payload>
where
    F: ItemFetcher + ?Sized,
{
    match tokio::time::timeout(item_timeout, fetcher.fetch(&identifier, marketplace)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                identifier = %identifier,
                timeout_ms = item_timeout.as_millis() as u64,
                "Item timed out"
            );
            counter!("fetch.failures", "kind" => ErrorKind::Timeout.as_str()).increment(1);
            FetchResult::failure(
                identifier,
                ErrorKind::Timeout,
                format!("timed out after {:.1}s", item_timeout.as_secs_f64()),
            )
        }
    }
}
