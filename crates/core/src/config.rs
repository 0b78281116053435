use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CDP_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// What a producer does when its target queue shard is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Run the work item in the producer's task.
    #[default]
    Inline,
    /// Discard the work item (logged and counted).
    Drop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Total capacity across all event shards.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// Total capacity across all execution shards.
    #[serde(default = "default_execution_queue_capacity")]
    pub execution_queue_capacity: usize,
    #[serde(default = "default_shards")]
    pub event_shards: usize,
    #[serde(default = "default_shards")]
    pub execution_shards: usize,
    #[serde(default)]
    pub execution_overflow: OverflowPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scanner_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tenants: Vec<String>,
    #[serde(default = "default_scan_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_abandon_after_secs")]
    pub abandon_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "cdp-01".to_string()
}
fn default_event_queue_capacity() -> usize {
    1000
}
fn default_execution_queue_capacity() -> usize {
    100
}
fn default_shards() -> usize {
    1
}
fn default_scanner_enabled() -> bool {
    true
}
fn default_scan_interval_secs() -> u64 {
    300
}
fn default_abandon_after_secs() -> u64 {
    3600
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_event_queue_capacity(),
            execution_queue_capacity: default_execution_queue_capacity(),
            event_shards: default_shards(),
            execution_shards: default_shards(),
            execution_overflow: OverflowPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Capacity of each event shard; never below 1.
    pub fn event_shard_capacity(&self) -> usize {
        (self.event_queue_capacity / self.event_shards.max(1)).max(1)
    }

    /// Capacity of each execution shard; never below 1.
    pub fn execution_shard_capacity(&self) -> usize {
        (self.execution_queue_capacity / self.execution_shards.max(1)).max(1)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scanner_enabled(),
            tenants: Vec::new(),
            interval_secs: default_scan_interval_secs(),
            abandon_after_secs: default_abandon_after_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            pipeline: PipelineConfig::default(),
            scanner: ScannerConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CDP_ENGINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scanner.tenants"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
