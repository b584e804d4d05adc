use crate::app::ports::{ObjectStorePort, RiotApiPort, StoredObject};
use crate::cancel::CancelToken;
use crate::constants::{MATCHES_PREFIX, MATCH_IDS_PREFIX, SUMMONERS_PREFIX};
use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Which upstream operation an id feeds, and where its payload lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Summoners,
    Matches,
    MatchIds { offset: u32, count: u32 },
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Summoners => "summoners",
            EntityKind::Matches => "matches",
            EntityKind::MatchIds { .. } => "match_ids",
        }
    }

    /// Object key for `id`, after checking the id can be a path segment.
    pub fn object_key(&self, id: &str) -> Result<String> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') || id == "." || id == ".." {
            return Err(IngestError::InvalidInput(format!("'{}' is not a usable entity id", id)));
        }
        Ok(match self {
            EntityKind::Summoners => format!("{}/{}", SUMMONERS_PREFIX, id),
            EntityKind::Matches => format!("{}/{}", MATCHES_PREFIX, id),
            EntityKind::MatchIds { offset, count } => {
                format!("{}/{}/{}-{}", MATCH_IDS_PREFIX, id, offset, count)
            }
        })
    }
}

#[derive(Debug)]
pub enum IngestOutcome {
    Stored { key: String, size: usize },
    Skipped { key: String },
    Failed(IngestError),
    Cancelled,
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Stored { .. } => "stored",
            IngestOutcome::Skipped { .. } => "skipped",
            IngestOutcome::Failed(_) => "failed",
            IngestOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Stored { key, size } => write!(f, "stored {} ({} bytes)", key, size),
            IngestOutcome::Skipped { key } => write!(f, "skipped, {} already stored", key),
            IngestOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            IngestOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct EntityReport {
    pub id: String,
    pub outcome: IngestOutcome,
}

#[derive(Debug)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub kind: EntityKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per input id, in input order
    pub entries: Vec<EntityReport>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl IngestReport {
    pub fn summary(&self) -> ReportSummary {
        let mut s = ReportSummary::default();
        for entry in &self.entries {
            match entry.outcome {
                IngestOutcome::Stored { .. } => s.stored += 1,
                IngestOutcome::Skipped { .. } => s.skipped += 1,
                IngestOutcome::Failed(_) => s.failed += 1,
                IngestOutcome::Cancelled => s.cancelled += 1,
            }
        }
        s
    }

    pub fn is_clean(&self) -> bool {
        let s = self.summary();
        s.failed == 0 && s.cancelled == 0
    }

    pub fn outcome_for(&self, id: &str) -> Option<&IngestOutcome> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.outcome)
    }
}

/// Check-then-store ingestion of upstream entities.
pub struct IngestUseCase {
    api: Arc<dyn RiotApiPort>,
    store: Arc<dyn ObjectStorePort>,
    concurrency: usize,
}

impl IngestUseCase {
    pub fn new(api: Arc<dyn RiotApiPort>, store: Arc<dyn ObjectStorePort>, concurrency: usize) -> Self {
        Self {
            api,
            store,
            concurrency: concurrency.max(1),
        }
    }

    #[instrument(skip(self, ids, cancel), fields(count = ids.len()))]
    pub async fn ingest(
        &self,
        kind: EntityKind,
        ids: &[String],
        force_refetch: bool,
        cancel: &CancelToken,
    ) -> IngestReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, kind = kind.label(), force_refetch, "starting ingest run");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (index, id) in ids.iter().enumerate() {
            let api = self.api.clone();
            let store = self.store.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            let id = id.clone();
            tasks.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => IngestOutcome::Cancelled,
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => {
                            ingest_one(api.as_ref(), store.as_ref(), kind, &id, force_refetch, &cancel).await
                        }
                        Err(_) => IngestOutcome::Cancelled,
                    },
                };
                (index, EntityReport { id, outcome })
            });
        }

        let mut slots: Vec<Option<EntityReport>> = (0..ids.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "ingest task panicked"),
            }
        }

        // A panicked task still gets a line in the report.
        let entries: Vec<EntityReport> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| EntityReport {
                    id: id.clone(),
                    outcome: IngestOutcome::Failed(IngestError::Internal(
                        "ingest task aborted".to_string(),
                    )),
                })
            })
            .collect();

        let report = IngestReport {
            run_id,
            kind,
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        let s = report.summary();
        info!(
            %run_id,
            stored = s.stored,
            skipped = s.skipped,
            failed = s.failed,
            cancelled = s.cancelled,
            "ingest run finished"
        );
        report
    }
}

async fn ingest_one(
    api: &dyn RiotApiPort,
    store: &dyn ObjectStorePort,
    kind: EntityKind,
    id: &str,
    force_refetch: bool,
    cancel: &CancelToken,
) -> IngestOutcome {
    let outcome = match fetch_and_store(api, store, kind, id, force_refetch, cancel).await {
        Ok(outcome) => outcome,
        Err(IngestError::Cancelled) => IngestOutcome::Cancelled,
        Err(e) => {
            warn!(id, kind = kind.label(), error = %e, "ingest failed");
            IngestOutcome::Failed(e)
        }
    };
    crate::metrics::ingest::outcome(kind.label(), outcome.label());
    outcome
}

async fn fetch_and_store(
    api: &dyn RiotApiPort,
    store: &dyn ObjectStorePort,
    kind: EntityKind,
    id: &str,
    force_refetch: bool,
    cancel: &CancelToken,
) -> Result<IngestOutcome> {
    let key = kind.object_key(id)?;
    let id = id.trim();

    if force_refetch {
        debug!(key = %key, "force refetch set, existence check skipped");
    } else if cancel.run(store.exists(&key)).await? {
        debug!(key = %key, "already stored, download skipped");
        return Ok(IngestOutcome::Skipped { key });
    }

    let raw = match kind {
        EntityKind::Summoners => api.fetch_summoner(id, cancel).await?.raw,
        EntityKind::Matches => api.fetch_match(id, cancel).await?.raw,
        EntityKind::MatchIds { offset, count } => {
            api.fetch_match_ids(id, offset, count, cancel).await?.raw
        }
    };

    let object = StoredObject::new(key, raw);
    cancel.run(store.store(&object)).await?;
    Ok(IngestOutcome::Stored {
        size: object.size(),
        key: object.key,
    })
}
