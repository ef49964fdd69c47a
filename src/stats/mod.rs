use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::address::Address;
use crate::clock::to_fixed_offset;
use crate::config::AggregatorConfig;
use crate::entities::prelude::{ProjectStats, Submission};
use crate::entities::{project_stats, submission};
use crate::error::RegistryError;
use crate::gateway::{ChainSource, ChainTransaction};
use crate::registration::SubmissionStatus;
use crate::state::ApiCache;

pub mod ranking;

use ranking::{StatsSnapshot, recompute_rankings};

const WINDOW_HOURS: i64 = 12;

/// Outcome summary of one full aggregator pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PassReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<PassFailure>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PassFailure {
    pub wallet: String,
    pub error: String,
}

/// Recomputes per-project activity metrics for every approved submission
/// on a fixed schedule, then rewrites both leaderboard rankings. One
/// project's upstream failure never aborts the pass.
pub struct StatsAggregator {
    database: DatabaseConnection,
    source: Arc<dyn ChainSource>,
    config: AggregatorConfig,
    cache: Arc<ApiCache>,
    last_pass_at: Arc<AtomicI64>,
}

impl StatsAggregator {
    pub fn new(
        database: DatabaseConnection,
        source: Arc<dyn ChainSource>,
        config: AggregatorConfig,
        cache: Arc<ApiCache>,
        last_pass_at: Arc<AtomicI64>,
    ) -> Self {
        assert!(config.concurrency() > 0, "Worker pool must not be empty");
        assert!(
            Arc::strong_count(&last_pass_at) >= 1,
            "Pass timestamp must be shared"
        );
        Self {
            database,
            source,
            config,
            cache,
            last_pass_at,
        }
    }

    /// Scheduler loop: one pass per interval until shutdown. Pass errors
    /// are logged, never propagated; stale stats beat a dead task.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Starting stats aggregator loop");
        if self.config.run_on_start {
            self.run_logged_pass().await;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(_) => {
                            if *shutdown.borrow() {
                                info!("Aggregator shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Shutdown channel closed unexpectedly. Exiting aggregator loop");
                            break;
                        }
                    }
                }
                _ = sleep(self.config.pass_interval()) => {
                    self.run_logged_pass().await;
                }
            }
        }
    }

    async fn run_logged_pass(&self) {
        match self.run_pass().await {
            Ok(report) => info!(
                "Stats pass complete: {}/{} projects refreshed, {} failed, {}ms",
                report.succeeded, report.processed, report.failed, report.duration_ms
            ),
            Err(err) => error!("Stats pass aborted before completion: {err}"),
        }
    }

    /// One full pass: refresh every approved project with bounded
    /// concurrency, then recompute both rankings over the whole table.
    pub async fn run_pass(&self) -> Result<PassReport, RegistryError> {
        let started = Instant::now();
        let approved = Submission::find()
            .filter(submission::Column::Status.eq(SubmissionStatus::Approved.as_str()))
            .order_by_asc(submission::Column::SubmittedAt)
            .all(&self.database)
            .await?;

        let now = Utc::now();
        let cutoff = now - ChronoDuration::hours(WINDOW_HOURS);

        let mut report = PassReport {
            processed: approved.len(),
            ..PassReport::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let mut workers: JoinSet<(String, Result<(), RegistryError>)> = JoinSet::new();

        for project in approved {
            let database = self.database.clone();
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let throttle = self.config.throttle();

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("aggregator semaphore never closes");
                // Spacing between requests while holding a permit keeps
                // the pool inside the explorer's rate limit.
                sleep(throttle).await;

                let wallet = project.wallet_address.clone();
                let outcome = refresh_project(&database, source.as_ref(), &project, cutoff, now).await;
                (wallet, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.succeeded += 1,
                Ok((wallet, Err(err))) => {
                    warn!("Skipping stats refresh for {wallet}: {err}");
                    report.failed += 1;
                    report.failures.push(PassFailure {
                        wallet,
                        error: err.to_string(),
                    });
                }
                Err(join_err) => {
                    error!("Stats worker panicked: {join_err}");
                    report.failed += 1;
                    report.failures.push(PassFailure {
                        wallet: "<unknown>".to_string(),
                        error: join_err.to_string(),
                    });
                }
            }
        }
        assert_eq!(
            report.succeeded + report.failed,
            report.processed,
            "Pass accounting must balance"
        );

        // Ranking runs over the whole table, including rows whose refresh
        // was skipped this pass, and commits atomically.
        self.persist_rankings().await?;
        self.cache.leaderboards.invalidate_all();
        self.cache.project_stats.invalidate_all();
        self.last_pass_at
            .store(now.timestamp(), AtomicOrdering::SeqCst);

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn persist_rankings(&self) -> Result<(), RegistryError> {
        let txn = self.database.begin().await?;

        let rows = ProjectStats::find()
            .order_by_asc(project_stats::Column::CreatedAt)
            .order_by_asc(project_stats::Column::WalletAddress)
            .all(&txn)
            .await?;

        let snapshots: Vec<StatsSnapshot> = rows
            .iter()
            .map(|row| StatsSnapshot {
                wallet: row.wallet_address.clone(),
                total_transactions: row.total_transactions,
                unique_wallets: row.unique_wallets,
            })
            .collect();
        let assignments = recompute_rankings(&snapshots);
        assert_eq!(
            assignments.len(),
            rows.len(),
            "Ranking must cover every row"
        );

        for (row, assignment) in rows.into_iter().zip(assignments) {
            assert_eq!(
                row.wallet_address, assignment.wallet,
                "Rank assignment misaligned with row order"
            );
            let mut active = row.into_active_model();
            active.tx_rank = Set(Some(assignment.tx_rank));
            active.wallet_rank = Set(Some(assignment.wallet_rank));
            active.update(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

async fn refresh_project(
    database: &DatabaseConnection,
    source: &dyn ChainSource,
    project: &submission::Model,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    let contract = Address::parse(&project.contract_address)
        .map_err(|err| RegistryError::Corrupt(format!("stored contract address: {err}")))?;

    let transactions = source.transactions_of(&contract, 0).await?;
    let metrics = ActivityMetrics::compute(&transactions, cutoff);

    let existing = ProjectStats::find_by_id(project.wallet_address.clone())
        .one(database)
        .await?;
    let previous_total = existing
        .as_ref()
        .map(|row| row.total_transactions)
        .unwrap_or(0);
    let growth = growth_rate(metrics.total_transactions as i64, previous_total);
    let scanned_at = to_fixed_offset(now);

    match existing {
        Some(row) => {
            let mut active = row.into_active_model();
            active.contract_address = Set(contract.to_string());
            active.total_transactions = Set(metrics.total_transactions as i64);
            active.transactions_last_12h = Set(metrics.transactions_last_12h as i64);
            active.unique_wallets = Set(metrics.unique_wallets as i64);
            active.unique_wallets_last_12h = Set(metrics.unique_wallets_last_12h as i64);
            active.growth_rate = Set(growth);
            active.last_scanned = Set(scanned_at);
            // Ranks stay untouched here; only the ranking pass writes them.
            active.update(database).await?;
        }
        None => {
            // Created lazily the first time an approved project is seen.
            let active = project_stats::ActiveModel {
                wallet_address: Set(project.wallet_address.clone()),
                contract_address: Set(contract.to_string()),
                total_transactions: Set(metrics.total_transactions as i64),
                transactions_last_12h: Set(metrics.transactions_last_12h as i64),
                unique_wallets: Set(metrics.unique_wallets as i64),
                unique_wallets_last_12h: Set(metrics.unique_wallets_last_12h as i64),
                growth_rate: Set(growth),
                tx_rank: Set(None),
                wallet_rank: Set(None),
                last_scanned: Set(scanned_at),
                created_at: Set(scanned_at),
            };
            active.insert(database).await?;
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ActivityMetrics {
    pub total_transactions: u64,
    pub transactions_last_12h: u64,
    pub unique_wallets: u64,
    pub unique_wallets_last_12h: u64,
}

impl ActivityMetrics {
    /// Unique wallets are the union of senders and recipients; addresses
    /// are canonical lowercase so the set is case-insensitive by
    /// construction. The trailing window compares block timestamps
    /// against a cutoff fixed once per pass.
    pub(crate) fn compute(transactions: &[ChainTransaction], cutoff: DateTime<Utc>) -> Self {
        let mut all_wallets: HashSet<Address> = HashSet::new();
        let mut recent_wallets: HashSet<Address> = HashSet::new();
        let mut recent_count = 0u64;

        for tx in transactions {
            all_wallets.insert(tx.sender);
            if let Some(recipient) = tx.recipient {
                all_wallets.insert(recipient);
            }
            if tx.timestamp >= cutoff {
                recent_count += 1;
                recent_wallets.insert(tx.sender);
                if let Some(recipient) = tx.recipient {
                    recent_wallets.insert(recipient);
                }
            }
        }

        Self {
            total_transactions: transactions.len() as u64,
            transactions_last_12h: recent_count,
            unique_wallets: all_wallets.len() as u64,
            unique_wallets_last_12h: recent_wallets.len() as u64,
        }
    }
}

/// Period-over-period percentage against the previous total. A missing
/// or zero previous total yields 0 rather than a division by zero.
pub(crate) fn growth_rate(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        (current - previous) as f64 / previous as f64 * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::address::ADDRESS_BYTES;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes[ADDRESS_BYTES - 1] = last;
        Address::from_bytes(bytes)
    }

    fn tx_at(sender: Address, recipient: Option<Address>, unix: i64) -> ChainTransaction {
        ChainTransaction {
            sender,
            recipient,
            contract_created: None,
            block_number: 1,
            timestamp: Utc.timestamp_opt(unix, 0).unwrap(),
        }
    }

    #[test]
    fn trailing_window_partitions_by_timestamp() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let cutoff = now - ChronoDuration::hours(WINDOW_HOURS);

        let thirteen_hours_ago = (now - ChronoDuration::hours(13)).timestamp();
        let one_hour_ago = (now - ChronoDuration::hours(1)).timestamp();
        let transactions = vec![
            tx_at(addr(1), Some(addr(2)), thirteen_hours_ago),
            tx_at(addr(3), Some(addr(2)), one_hour_ago),
        ];

        let metrics = ActivityMetrics::compute(&transactions, cutoff);
        assert_eq!(metrics.total_transactions, 2);
        assert_eq!(metrics.transactions_last_12h, 1);
        assert_eq!(metrics.unique_wallets, 3);
        assert_eq!(metrics.unique_wallets_last_12h, 2);
    }

    #[test]
    fn unique_wallets_union_senders_and_recipients() {
        let cutoff = Utc.timestamp_opt(0, 0).unwrap();
        let transactions = vec![
            tx_at(addr(1), Some(addr(2)), 100),
            tx_at(addr(2), Some(addr(1)), 200),
            tx_at(addr(1), None, 300),
        ];
        let metrics = ActivityMetrics::compute(&transactions, cutoff);
        assert_eq!(metrics.unique_wallets, 2);
    }

    #[test]
    fn growth_rate_guards_division_by_zero() {
        assert_eq!(growth_rate(500, 0), 0.0);
        assert_eq!(growth_rate(0, 0), 0.0);
        assert_eq!(growth_rate(150, 100), 50.0);
        assert_eq!(growth_rate(50, 100), -50.0);
    }

    #[test]
    fn empty_history_yields_zero_metrics() {
        let cutoff = Utc.timestamp_opt(0, 0).unwrap();
        let metrics = ActivityMetrics::compute(&[], cutoff);
        assert_eq!(metrics, ActivityMetrics::default());
    }
}
