use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::content::ContentReference;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::install::events::{emit, EventSink, InstallEvent, SubProgress};

/// Default parallelism when no configuration is supplied.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Transfers per reference before a hash mismatch or transport error is
/// reported.
const FETCH_ATTEMPTS: usize = 3;

/// The network primitive under the scheduler: one GET, whole body.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }
}

#[async_trait]
impl FetchTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Byte counters shared by every worker of a batch.
#[derive(Debug, Default)]
pub struct FetchProgress {
    total_bytes: AtomicU64,
    transferred_bytes: AtomicU64,
}

impl FetchProgress {
    pub fn reset(&self) {
        self.total_bytes.store(0, Ordering::SeqCst);
        self.transferred_bytes.store(0, Ordering::SeqCst);
    }

    pub fn add_total(&self, bytes: u64) {
        self.total_bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Returns the new transferred count.
    pub fn add_transferred(&self, bytes: u64) -> u64 {
        self.transferred_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes
    }

    pub fn total(&self) -> u64 {
        self.total_bytes.load(Ordering::SeqCst)
    }

    pub fn transferred(&self) -> u64 {
        self.transferred_bytes.load(Ordering::SeqCst)
    }
}

/// What happened to each reference of a finished batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Transferred from the network.
    pub fetched: usize,
    /// Already satisfied locally (copied to their second location if any).
    pub satisfied: usize,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

enum Disposition {
    Fetched,
    Satisfied,
    /// Never started because an earlier worker failed.
    Abandoned,
}

/// Concurrent, hash-validated fetch scheduler.
pub struct Downloader {
    transport: Arc<dyn FetchTransport>,
    /// Maximum number of parallel transfers.
    concurrency: usize,
    progress: Arc<FetchProgress>,
    events: Option<EventSink>,
}

impl Downloader {
    pub fn new(transport: Arc<dyn FetchTransport>) -> Self {
        Self {
            transport,
            concurrency: DEFAULT_CONCURRENCY,
            progress: Arc::new(FetchProgress::default()),
            events: None,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_events(mut self, events: Option<EventSink>) -> Self {
        self.events = events;
        self
    }

    // ── Documents ───────────────────────────────────────

    /// Fetch a small document (manifest, catalog, profile) as text.
    pub async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        let bytes = self.transport.fetch(url).await?;
        String::from_utf8(bytes)
            .map_err(|e| LauncherError::Other(format!("{url} is not valid UTF-8: {e}")))
    }

    // ── Single reference ────────────────────────────────

    /// Satisfy one reference outside of a batch (no byte accounting).
    /// Returns `true` when a transfer happened.
    pub async fn fetch_one(&self, reference: &ContentReference) -> LauncherResult<bool> {
        if reference.needs_fetch().await? {
            self.transfer(reference).await?;
            Ok(true)
        } else {
            self.copy_secondary(reference).await?;
            Ok(false)
        }
    }

    /// Download, verify, write, then copy to the secondary location.
    async fn transfer(&self, reference: &ContentReference) -> LauncherResult<u64> {
        emit(
            self.events.as_ref(),
            InstallEvent::Task {
                message: format!("Downloading {}", reference.file_name()),
            },
        );

        let bytes = self.fetch_verified(reference).await?;

        write_file(&reference.dest, &bytes).await?;
        self.copy_secondary(reference).await?;

        debug!("Downloaded: {} -> {:?}", reference.url, reference.dest);
        Ok(bytes.len() as u64)
    }

    async fn fetch_verified(&self, reference: &ContentReference) -> LauncherResult<Vec<u8>> {
        let mut attempt = 1;
        loop {
            let result = match self.transport.fetch(&reference.url).await {
                Ok(bytes) => match &reference.hash {
                    Some(hash) => hash.verify(&bytes, &reference.dest).map(|()| bytes),
                    None => Ok(bytes),
                },
                Err(e) => Err(e),
            };

            match result {
                Err(e @ (LauncherError::HashMismatch { .. } | LauncherError::Http(_)))
                    if attempt < FETCH_ATTEMPTS =>
                {
                    warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, FETCH_ATTEMPTS, reference.url, e
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn copy_secondary(&self, reference: &ContentReference) -> LauncherResult<()> {
        let Some(copy_to) = &reference.copy_to else {
            return Ok(());
        };
        if copy_to == &reference.dest {
            return Ok(());
        }

        if let Some(parent) = copy_to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&reference.dest, copy_to)
            .await
            .map_err(|e| LauncherError::io(copy_to, e))?;
        Ok(())
    }

    // ── Batch ───────────────────────────────────────────

    /// Run a whole batch with bounded parallelism.
    ///
    /// Two full passes: the first decides which references need a transfer
    /// and sums their sizes into the phase total, the second performs the
    /// transfers. Returns only after every worker has finished. On failure,
    /// workers that have not started yet are abandoned and the first error
    /// is returned.
    pub async fn fetch_batch(&self, entries: Vec<ContentReference>) -> LauncherResult<BatchReport> {
        info!(
            "Starting batch: {} references, concurrency={}",
            entries.len(),
            self.concurrency
        );

        self.progress.reset();
        emit(
            self.events.as_ref(),
            InstallEvent::SubProgress {
                progress: SubProgress::Unknown,
            },
        );

        // Pass 1: size accounting.
        let checked: Vec<(ContentReference, LauncherResult<bool>)> = stream::iter(entries)
            .map(|reference| async move {
                let needs = reference.needs_fetch().await;
                (reference, needs)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut planned = Vec::with_capacity(checked.len());
        for (reference, needs) in checked {
            let needs = needs?;
            if needs {
                self.progress.add_total(reference.size);
            }
            planned.push((reference, needs));
        }

        let total = self.progress.total();
        emit(
            self.events.as_ref(),
            InstallEvent::SubProgress {
                progress: SubProgress::Bytes {
                    transferred: 0,
                    total,
                },
            },
        );

        // Pass 2: transfers.
        let aborted = AtomicBool::new(false);
        let aborted = &aborted;
        let this = self;

        let results: Vec<LauncherResult<Disposition>> = stream::iter(planned)
            .map(move |(reference, needs)| async move {
                if aborted.load(Ordering::SeqCst) {
                    return Ok(Disposition::Abandoned);
                }

                let result = if needs {
                    match this.transfer(&reference).await {
                        Ok(bytes) => {
                            let transferred = this.progress.add_transferred(bytes);
                            emit(
                                this.events.as_ref(),
                                InstallEvent::SubProgress {
                                    progress: SubProgress::Bytes {
                                        transferred,
                                        total: this.progress.total(),
                                    },
                                },
                            );
                            Ok(Disposition::Fetched)
                        }
                        Err(e) => Err(e),
                    }
                } else {
                    this.copy_secondary(&reference)
                        .await
                        .map(|_| Disposition::Satisfied)
                };

                if result.is_err() {
                    aborted.store(true, Ordering::SeqCst);
                }
                result
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Disposition::Fetched) => report.fetched += 1,
                Ok(Disposition::Satisfied) => report.satisfied += 1,
                Ok(Disposition::Abandoned) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        emit(
            self.events.as_ref(),
            InstallEvent::SubProgress {
                progress: SubProgress::Hidden,
            },
        );

        if let Some(error) = first_error {
            return Err(error);
        }

        report.total_bytes = self.progress.total();
        report.transferred_bytes = self.progress.transferred();
        info!(
            "Batch finished: {} fetched, {} already present ({} bytes)",
            report.fetched, report.satisfied, report.transferred_bytes
        );
        Ok(report)
    }
}

/// Write a file, creating parents. The handle is dropped before returning.
pub(crate) async fn write_file(dest: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }

    {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
    }

    Ok(())
}
