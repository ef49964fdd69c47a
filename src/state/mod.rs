use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde_json::Value;

use crate::address::Address;
use crate::config::CacheConfig;
use crate::models::leaderboard::ProjectStatsView;
use crate::ownership::OwnershipResolver;
use crate::registration::RegistrationGate;
use crate::stats::StatsAggregator;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub resolver: Arc<OwnershipResolver>,
    pub gate: Arc<RegistrationGate>,
    pub aggregator: Arc<StatsAggregator>,
    pub admin_wallet: Address,
    pub start_time: Instant,
    pub last_pass_at: Arc<AtomicI64>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        resolver: Arc<OwnershipResolver>,
        gate: Arc<RegistrationGate>,
        aggregator: Arc<StatsAggregator>,
        admin_wallet: Address,
        last_pass_at: Arc<AtomicI64>,
    ) -> Self {
        assert!(
            cache.leaderboard_capacity >= 10,
            "Leaderboard cache capacity must be configured"
        );
        assert!(
            Arc::strong_count(&last_pass_at) >= 1,
            "Aggregator state must be shared"
        );
        Self {
            database,
            cache,
            resolver,
            gate,
            aggregator,
            admin_wallet,
            start_time: Instant::now(),
            last_pass_at,
        }
    }
}

pub struct ApiCache {
    pub leaderboards: Cache<String, Value>,
    pub project_stats: Cache<String, Arc<ProjectStatsView>>,
    pub leaderboard_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.leaderboards_max_capacity >= 10,
            "Leaderboard cache capacity threshold"
        );
        assert!(
            config.stats_max_capacity >= 100,
            "Stats cache capacity threshold"
        );

        let leaderboards = Cache::builder()
            .max_capacity(config.leaderboards_max_capacity)
            .time_to_live(Duration::from_secs(config.leaderboards_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.leaderboards_ttl_seconds / 2 + 1))
            .build();

        let project_stats = Cache::builder()
            .max_capacity(config.stats_max_capacity)
            .time_to_live(Duration::from_secs(config.stats_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.stats_ttl_seconds / 2 + 1))
            .build();

        Self {
            leaderboards,
            project_stats,
            leaderboard_capacity: config.leaderboards_max_capacity,
        }
    }
}
