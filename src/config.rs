//! Configuration inputs collected into a validated
//! `CacheConfig` built via `CacheConfigBuilder`, a hand-written builder in
//! the style of `cachelito-core::GlobalCache::new`'s explicit-parameter
//! constructor, not a file-loading layer.

use crate::eviction::EvictionPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_items: Option<usize>,
    pub max_expiration: Option<Duration>,
    pub default_expiration: Option<Duration>,
    pub eviction_policy: EvictionPolicy,
    pub eviction_sample_percentage: f64,
    pub enable_background_cleanup: bool,
    pub cleanup_interval: Duration,
    pub enable_statistics: bool,
    pub enable_fast_path: bool,
    pub fast_path_track_metrics: bool,
    pub max_tag_mappings: usize,
    pub sweeper_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_items: None,
            max_expiration: None,
            default_expiration: None,
            eviction_policy: EvictionPolicy::default(),
            eviction_sample_percentage: 0.1,
            enable_background_cleanup: true,
            cleanup_interval: Duration::from_secs(60),
            enable_statistics: true,
            enable_fast_path: true,
            fast_path_track_metrics: true,
            max_tag_mappings: 100_000,
            sweeper_batch_size: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        CacheConfigBuilder::default()
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = Some(max_items);
        self
    }

    pub fn max_expiration(mut self, duration: Duration) -> Self {
        self.config.max_expiration = Some(duration);
        self
    }

    pub fn default_expiration(mut self, duration: Duration) -> Self {
        self.config.default_expiration = Some(duration);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    pub fn eviction_sample_percentage(mut self, pct: f64) -> Self {
        self.config.eviction_sample_percentage = pct.clamp(0.0001, 1.0);
        self
    }

    pub fn enable_background_cleanup(mut self, enabled: bool) -> Self {
        self.config.enable_background_cleanup = enabled;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn enable_statistics(mut self, enabled: bool) -> Self {
        self.config.enable_statistics = enabled;
        self
    }

    pub fn enable_fast_path(mut self, enabled: bool) -> Self {
        self.config.enable_fast_path = enabled;
        self
    }

    pub fn fast_path_track_metrics(mut self, enabled: bool) -> Self {
        self.config.fast_path_track_metrics = enabled;
        self
    }

    pub fn max_tag_mappings(mut self, max: usize) -> Self {
        self.config.max_tag_mappings = max;
        self
    }

    pub fn sweeper_batch_size(mut self, batch_size: usize) -> Self {
        self.config.sweeper_batch_size = batch_size;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}
