use chrono::{Local, NaiveDate};
use resort_core::models::{PurgeOutcome, RetentionCandidate, SweepSummary};
use resort_core::{AppError, RetentionConfig};
use resort_db::EntityStore;
use resort_storage::{DeleteOutcome, MediaStoreClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Purges driver's-license documents once their booking has aged past the retention window.
///
/// Each candidate moves from eligible to either purged (remote object gone,
/// local reference cleared) or failed (reference kept, attempt counted). A
/// failing candidate never stops the sweep; the next run picks it up again.
/// When the booking's reference changed while its old document was being
/// purged, the current reference is kept and the candidate counts as superseded.
#[derive(Clone)]
pub struct RetentionSweeper {
    entities: Arc<dyn EntityStore>,
    media: MediaStoreClient,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(entities: Arc<dyn EntityStore>, media: MediaStoreClient, config: RetentionConfig) -> Self {
        Self {
            entities,
            media,
            config,
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Latest eligibility date that is due for purging when sweeping on `today`.
    pub fn cutoff(today: NaiveDate, window_days: i64) -> NaiveDate {
        today
            .checked_sub_signed(chrono::Duration::days(window_days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Start the periodic sweep; stops when `cancel` fires
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_secs);
            tracing::info!(
                window_days = self.config.window_days,
                interval_secs = period.as_secs(),
                "Retention sweeper started"
            );

            let mut sweep_interval = interval(period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Retention sweeper stopping");
                        break;
                    }
                    _ = sweep_interval.tick() => {
                        tracing::info!("Starting scheduled retention sweep");

                        if let Err(e) = self.sweep_now().await {
                            tracing::error!(error = %e, "Retention sweep failed");
                        }
                    }
                }
            }
        })
    }

    /// Sweep using the current local date
    pub async fn sweep_now(&self) -> Result<SweepSummary, AppError> {
        self.sweep_at(Local::now().date_naive()).await
    }

    /// Sweep as if run on `today`.
    ///
    /// Only the candidate query can fail the sweep as a whole.
    #[tracing::instrument(skip(self), fields(retention.window_days = self.config.window_days))]
    pub async fn sweep_at(&self, today: NaiveDate) -> Result<SweepSummary, AppError> {
        let start = Instant::now();
        let cutoff = Self::cutoff(today, self.config.window_days);

        let candidates = self.entities.find_candidates_for_retention(cutoff).await?;
        let mut summary = SweepSummary {
            found: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            let outcome = self.process_candidate(&candidate).await;
            if let PurgeOutcome::RemoteDeleteFailed {
                attempts: Some(attempts),
                ..
            } = &outcome
            {
                if *attempts >= self.config.alert_after_failures {
                    summary.alerting += 1;
                }
            }
            summary.record(outcome);
        }

        tracing::info!(
            cutoff = %cutoff,
            found = summary.found,
            purged = summary.purged,
            superseded = summary.superseded,
            failed = summary.failed,
            alerting = summary.alerting,
            duration_ms = start.elapsed().as_millis() as u64,
            "Retention sweep completed"
        );

        Ok(summary)
    }

    async fn process_candidate(&self, candidate: &RetentionCandidate) -> PurgeOutcome {
        let booking_id = candidate.booking_id;
        let call_timeout = Duration::from_secs(self.config.call_timeout_secs);

        let result = match tokio::time::timeout(call_timeout, self.purge(candidate)).await {
            Ok(result) => result,
            Err(_) => Err(format!("purge timed out after {}s", call_timeout.as_secs())),
        };

        match result {
            Ok(Purge::Superseded) => {
                tracing::info!(
                    booking_id = %booking_id,
                    url = %candidate.document_url,
                    "License document removed; booking no longer references it"
                );
                PurgeOutcome::Superseded {
                    booking_id,
                    url: candidate.document_url.clone(),
                }
            }
            Ok(Purge::Cleared { already_absent }) => {
                tracing::info!(
                    booking_id = %booking_id,
                    url = %candidate.document_url,
                    eligibility_date = %candidate.eligibility_date,
                    already_absent,
                    "License document purged"
                );
                PurgeOutcome::Purged {
                    booking_id,
                    already_absent,
                }
            }
            Err(error) => {
                let attempts = match self.entities.record_purge_failure(booking_id).await {
                    Ok(attempts) => Some(attempts),
                    Err(e) => {
                        tracing::warn!(
                            booking_id = %booking_id,
                            error = %e,
                            "Failed to record purge failure"
                        );
                        None
                    }
                };

                let alert = attempts.is_some_and(|a| a >= self.config.alert_after_failures);
                if alert {
                    tracing::error!(
                        booking_id = %booking_id,
                        url = %candidate.document_url,
                        attempts = ?attempts,
                        alert = true,
                        error = %error,
                        "License document purge keeps failing; reference retained"
                    );
                } else {
                    tracing::warn!(
                        booking_id = %booking_id,
                        url = %candidate.document_url,
                        attempts = ?attempts,
                        error = %error,
                        "License document purge failed; reference retained"
                    );
                }

                PurgeOutcome::RemoteDeleteFailed {
                    booking_id,
                    url: candidate.document_url.clone(),
                    error,
                    attempts,
                }
            }
        }
    }

    /// Delete the remote object, then clear the local reference if it still
    /// points at that object.
    async fn purge(&self, candidate: &RetentionCandidate) -> Result<Purge, String> {
        let outcome = self
            .media
            .delete_by_url(&candidate.document_url)
            .await
            .map_err(|e| e.to_string())?;

        let cleared = self
            .entities
            .clear_document_ref(candidate.booking_id, &candidate.document_url)
            .await
            .map_err(|e| format!("remote object removed but reference not cleared: {}", e))?;

        if !cleared {
            return Ok(Purge::Superseded);
        }
        Ok(Purge::Cleared {
            already_absent: matches!(outcome, DeleteOutcome::AlreadyAbsent),
        })
    }
}

enum Purge {
    Cleared { already_absent: bool },
    Superseded,
}
