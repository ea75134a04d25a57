//! Batch highlighting session
//!
//! A session owns a working directory, the shared config and page cache, and
//! one async lock per combined output path. Each evidence item runs in two
//! phases on the blocking pool:
//!
//! 1. locate, with no lock held. The fuzzy pass carries a deadline equal to
//!    the item timeout, so an abandoned locate stops on its own.
//! 2. commit (open base, annotate, write-then-rename) under the output's
//!    lock. Its timeout starts once the lock is held.
//!
//! Failures and timeouts are recorded per item and never stop the batch. A
//! commit that times out is abandoned, not cancelled: it keeps the lock until
//! it finishes and may still land.

use crate::cache::PageIndexCache;
use crate::config::HighlightConfig;
use crate::error::{HighlightError, Result};
use crate::locator::{Located, MatchPass};
use crate::naming;
use crate::pipeline::{apply_highlights, locate_evidence, EvidenceSpan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// One evidence item with its chunk metadata already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRequest {
    pub chunk_id: usize,
    pub text: String,
    pub source: PathBuf,
    /// 0-based
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Highlighted {
        count: usize,
        pass: MatchPass,
        output: PathBuf,
    },
    NoMatch,
    Failed {
        error: String,
    },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub chunk_id: usize,
    pub source: PathBuf,
    pub page: usize,
    #[serde(flatten)]
    pub status: ItemStatus,
}

/// Per-item results of a batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub highlighted: usize,
    pub no_match: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    fn push(&mut self, item: ItemReport) {
        match item.status {
            ItemStatus::Highlighted { .. } => self.highlighted += 1,
            ItemStatus::NoMatch => self.no_match += 1,
            ItemStatus::Failed { .. } => self.failed += 1,
            ItemStatus::TimedOut => self.timed_out += 1,
        }
        self.items.push(item);
    }
}

pub struct HighlightSession {
    workdir: PathBuf,
    config: Arc<HighlightConfig>,
    cache: Arc<PageIndexCache>,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl HighlightSession {
    /// Validate `config` and make sure `workdir` exists.
    pub fn new(workdir: impl Into<PathBuf>, config: HighlightConfig) -> Result<Self> {
        config.validate()?;
        let workdir = workdir.into();
        fs::create_dir_all(&workdir).map_err(|e| HighlightError::persist(&workdir, e))?;
        Ok(Self {
            workdir,
            config: Arc::new(config),
            cache: Arc::new(PageIndexCache::new()),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        naming::combined_output_path(&self.workdir, source)
    }

    fn path_lock(&self, output: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(output.to_path_buf()).or_default())
    }

    /// Highlight one item. Never fails; the outcome is in the report.
    pub async fn highlight_one(&self, request: &EvidenceRequest) -> ItemReport {
        let status = self
            .process(request)
            .await
            .unwrap_or_else(|status| status);
        ItemReport {
            chunk_id: request.chunk_id,
            source: request.source.clone(),
            page: request.page,
            status,
        }
    }

    /// `Err` carries the status of an item that stopped before committing.
    async fn process(&self, request: &EvidenceRequest) -> std::result::Result<ItemStatus, ItemStatus> {
        let span = EvidenceSpan {
            text: request.text.clone(),
            source: request.source.clone(),
            page: request.page,
        };
        let config = Arc::clone(&self.config);
        let cache = Arc::clone(&self.cache);
        let deadline = Instant::now() + self.config.timeout();
        let located = self
            .run_blocking(request, "locate", move || {
                locate_evidence(&span, &config, Some(cache.as_ref()), Some(deadline))
            })
            .await?;

        let pass = match located.pass() {
            Some(pass) => pass,
            None if located == Located::Expired => return Err(self.timed_out(request, "locate")),
            None => {
                warn!(chunk_id = request.chunk_id, "Evidence not locatable, skipping");
                return Ok(ItemStatus::NoMatch);
            }
        };

        let output = self.output_path_for(&request.source);
        let guard = self.path_lock(&output).lock_owned().await;
        let rects = located.rects();
        let source = request.source.clone();
        let page = request.page;
        let style = self.config.style.clone();
        let target = output.clone();
        let count = self
            .run_blocking(request, "commit", move || {
                let _guard = guard;
                apply_highlights(&source, page, &rects, &target, &style)
            })
            .await?;

        Ok(ItemStatus::Highlighted {
            count,
            pass,
            output,
        })
    }

    /// Run `work` on the blocking pool, bounded by the item timeout.
    async fn run_blocking<T, F>(
        &self,
        request: &EvidenceRequest,
        phase: &'static str,
        work: F,
    ) -> std::result::Result<T, ItemStatus>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                warn!(chunk_id = request.chunk_id, phase, error = %e, "Evidence item failed, skipping");
                Err(ItemStatus::Failed {
                    error: e.to_string(),
                })
            }
            Ok(Err(join_error)) => {
                warn!(chunk_id = request.chunk_id, phase, error = %join_error, "Highlight task panicked");
                Err(ItemStatus::Failed {
                    error: format!("Highlight task panicked: {}", join_error),
                })
            }
            Err(_elapsed) => Err(self.timed_out(request, phase)),
        }
    }

    fn timed_out(&self, request: &EvidenceRequest, phase: &'static str) -> ItemStatus {
        warn!(
            chunk_id = request.chunk_id,
            phase,
            timeout_ms = self.config.timeout_ms,
            "Evidence item timed out, skipping"
        );
        ItemStatus::TimedOut
    }

    /// Highlight every item in order.
    pub async fn highlight_batch(&self, requests: Vec<EvidenceRequest>) -> BatchReport {
        let mut report = BatchReport::default();
        for request in &requests {
            report.push(self.highlight_one(request).await);
        }
        info!(
            highlighted = report.highlighted,
            no_match = report.no_match,
            failed = report.failed,
            timed_out = report.timed_out,
            "Batch complete"
        );
        report
    }
}
