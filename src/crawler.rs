use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::SoftwareStore;
use crate::describe::software_from_page;
use crate::discover::discover;
use crate::error::{CrawlError, Result};
use crate::fetch::Fetch;
use crate::filter::is_substantive;
use crate::model::Software;
use crate::settings::FailurePolicy;

const EVENT_BUFFER: usize = 64;

/// Where an orchestrator stands. Only `Running` blocks a new crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running { year: i64 },
    Done { year: i64, stored: usize },
    Failed { year: i64, error: String },
}

/// Worker-to-caller signals, delivered in emission order. `Done` or `Failed`
/// is always the last event of a crawl, and exactly one of them is sent.
#[derive(Debug)]
pub enum CrawlEvent {
    /// One more candidate page handled, kept or not.
    Progress(u32),
    Record(Software),
    Done,
    Failed(CrawlError),
}

/// Callback view of the event stream for front ends.
pub trait CrawlObserver {
    fn on_progress(&mut self, _increment: u32) {}
    fn on_record(&mut self, _software: &Software) {}
    fn on_done(&mut self) {}
    fn on_error(&mut self, _error: &CrawlError) {}
}

pub struct CrawlHandle {
    pub year: i64,
    events: mpsc::Receiver<CrawlEvent>,
    task: JoinHandle<()>,
}

impl CrawlHandle {
    pub async fn next_event(&mut self) -> Option<CrawlEvent> {
        self.events.recv().await
    }

    /// Feed every event to `observer` until the crawl ends. Returns the
    /// crawl's error if it failed.
    pub async fn observe<O: CrawlObserver>(mut self, observer: &mut O) -> Result<()> {
        let mut outcome = Ok(());
        let mut finished = false;
        while let Some(event) = self.next_event().await {
            match event {
                CrawlEvent::Progress(n) => observer.on_progress(n),
                CrawlEvent::Record(sw) => observer.on_record(&sw),
                CrawlEvent::Done => {
                    finished = true;
                    observer.on_done();
                }
                CrawlEvent::Failed(e) => {
                    finished = true;
                    observer.on_error(&e);
                    outcome = Err(e);
                }
            }
        }
        if let Err(join) = self.task.await {
            if !finished {
                let e = CrawlError::Worker(join.to_string());
                observer.on_error(&e);
                outcome = Err(e);
            }
        }
        outcome
    }
}

/// Runs one crawl at a time on a background task and stores what it finds.
pub struct Crawler<F: Fetch> {
    fetcher: Arc<F>,
    store: SoftwareStore,
    index_url: String,
    policy: FailurePolicy,
    state: Arc<Mutex<CrawlState>>,
}

impl<F: Fetch> Crawler<F> {
    pub fn new(fetcher: F, store: SoftwareStore, index_url: &str, policy: FailurePolicy) -> Self {
        Crawler {
            fetcher: Arc::new(fetcher),
            store,
            index_url: index_url.to_string(),
            policy,
            state: Arc::new(Mutex::new(CrawlState::Idle)),
        }
    }

    pub fn state(&self) -> CrawlState {
        lock(&self.state).clone()
    }

    /// Start crawling `year` in the background. Rejected while another crawl
    /// on this orchestrator is still running.
    pub fn start_crawl(&self, year: i64) -> Result<CrawlHandle> {
        {
            let mut state = lock(&self.state);
            if let CrawlState::Running { year: active } = *state {
                return Err(CrawlError::AlreadyRunning { year: active });
            }
            *state = CrawlState::Running { year };
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let worker = Worker {
            fetcher: Arc::clone(&self.fetcher),
            store: self.store.clone(),
            index_url: self.index_url.clone(),
            policy: self.policy,
            year,
            tx,
        };
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let tx = worker.tx.clone();
            // Inner task so a panic comes back as a JoinError instead of
            // leaving the state at Running.
            let outcome = match tokio::spawn(worker.run()).await {
                Ok(result) => result,
                Err(join) => Err(CrawlError::Worker(join.to_string())),
            };
            match outcome {
                Ok(stored) => {
                    info!("Crawl {} done: {} records stored", year, stored);
                    *lock(&state) = CrawlState::Done { year, stored };
                    let _ = tx.send(CrawlEvent::Done).await;
                }
                Err(e) => {
                    warn!("Crawl {} failed: {}", year, e);
                    *lock(&state) = CrawlState::Failed {
                        year,
                        error: e.to_string(),
                    };
                    let _ = tx.send(CrawlEvent::Failed(e)).await;
                }
            }
        });

        Ok(CrawlHandle {
            year,
            events: rx,
            task,
        })
    }
}

fn lock(state: &Mutex<CrawlState>) -> MutexGuard<'_, CrawlState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker<F: Fetch> {
    fetcher: Arc<F>,
    store: SoftwareStore,
    index_url: String,
    policy: FailurePolicy,
    year: i64,
    tx: mpsc::Sender<CrawlEvent>,
}

impl<F: Fetch> Worker<F> {
    /// discover → per candidate: fetch, filter, describe, store, emit.
    async fn run(self) -> Result<usize> {
        let candidates = discover(&*self.fetcher, &self.index_url, self.year).await?;
        let total = candidates.len();
        let mut stored = 0usize;
        let mut skipped = 0usize;

        for url in candidates {
            match self.process(&url).await {
                Ok(Some(software)) => {
                    // A failed write loses this row only; the crawl goes on.
                    match self.save(&software).await {
                        Ok(()) => stored += 1,
                        Err(e) => warn!("Could not store {} ({}): {}", software.team, self.year, e),
                    }
                    let _ = self.tx.send(CrawlEvent::Record(software)).await;
                }
                Ok(None) => {
                    skipped += 1;
                    debug!("Placeholder page, skipped: {}", url);
                }
                Err(e) if self.policy == FailurePolicy::Skip => {
                    skipped += 1;
                    warn!("Skipping {}: {}", url, e);
                }
                Err(e) => return Err(e),
            }
            let _ = self.tx.send(CrawlEvent::Progress(1)).await;
        }

        info!(
            "Processed {} candidates for {} ({} stored, {} skipped)",
            total, self.year, stored, skipped
        );
        Ok(stored)
    }

    async fn process(&self, url: &str) -> Result<Option<Software>> {
        let page = self.fetcher.get_text(url).await?;
        if !is_substantive(&page) {
            return Ok(None);
        }
        software_from_page(&page, url, self.year).map(Some)
    }

    /// Upsert on the blocking pool; the store lock may be held by a reader.
    async fn save(&self, software: &Software) -> Result<()> {
        let store = self.store.clone();
        let row = software.clone();
        tokio::task::spawn_blocking(move || store.upsert(&row))
            .await
            .map_err(|join| CrawlError::Worker(join.to_string()))?
    }
}
