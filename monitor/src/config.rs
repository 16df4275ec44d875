//! TOML Configuration for the DCI Monitor
//!
//! Every tunable has a default so a minimal file only needs the feed addresses.

use common::types::{DciFormat, Rnti};
use layers::engine::PipelineConfig;
use layers::phy::{BlindDecoderConfig, DecodeThresholds};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// One entry per monitored carrier, in carrier order
    pub carriers: Vec<CarrierFeedConfig>,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// RNTI whose grants fill the UE usage columns
    pub target_rnti: Option<u16>,
}

/// Subframe feed of one carrier
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierFeedConfig {
    /// Synchronization layer PUB endpoint
    pub address: String,
    /// Subframes buffered between the feed and the decoders
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    32
}

/// Blind decoder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderConfig {
    /// Decoder threads per carrier
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Formats tried at every location ("0", "1", "1A", "2", "2A")
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_candidate_llr")]
    pub candidate_llr: f32,
    #[serde(default = "default_pass_confidence")]
    pub pass_confidence: f32,
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,
    #[serde(default = "default_rnti_min")]
    pub rnti_min: u16,
    #[serde(default = "default_rnti_max")]
    pub rnti_max: u16,
}

fn default_threads() -> usize {
    layers::engine::DEFAULT_DECODER_THREADS
}

fn default_formats() -> Vec<String> {
    layers::phy::DEFAULT_FORMATS.iter().map(|f| f.label().to_string()).collect()
}

fn default_candidate_llr() -> f32 {
    DecodeThresholds::default().candidate_llr
}

fn default_pass_confidence() -> f32 {
    DecodeThresholds::default().pass_confidence
}

fn default_high_confidence() -> f32 {
    DecodeThresholds::default().high_confidence
}

fn default_rnti_min() -> u16 {
    Rnti::MIN_VALID
}

fn default_rnti_max() -> u16 {
    Rnti::MAX_VALID
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            formats: default_formats(),
            candidate_llr: default_candidate_llr(),
            pass_confidence: default_pass_confidence(),
            high_confidence: default_high_confidence(),
            rnti_min: default_rnti_min(),
            rnti_max: default_rnti_max(),
        }
    }
}

/// Active UE tracker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Subframes without a grant before an RNTI counts as inactive
    #[serde(default = "default_inactivity_window")]
    pub inactivity_window: u64,
}

fn default_inactivity_window() -> u64 {
    layers::mac::DEFAULT_INACTIVITY_WINDOW
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inactivity_window: default_inactivity_window(),
        }
    }
}

/// PRB budget resolver settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Slack subtracted from the PRB budget, tried in order
    #[serde(default = "default_budget_offsets")]
    pub budget_offsets: Vec<u16>,
    /// Largest unreliable group searched exhaustively
    #[serde(default = "default_max_search")]
    pub max_search: usize,
}

fn default_budget_offsets() -> Vec<u16> {
    layers::mac::subframe_resolver::DEFAULT_BUDGET_OFFSETS.to_vec()
}

fn default_max_search() -> usize {
    layers::mac::subframe_resolver::MAX_SEARCH_MESSAGES
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            budget_offsets: default_budget_offsets(),
            max_search: default_max_search(),
        }
    }
}

/// Status ring and reporting settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Subframes covered by each status report
    #[serde(default = "default_report_window")]
    pub report_window: usize,
    /// Seconds between statistics log lines
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Milliseconds a decoder waits on its queue before checking for shutdown
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_ring_capacity() -> usize {
    layers::engine::DEFAULT_RING_CAPACITY
}

fn default_report_window() -> usize {
    100
}

fn default_stats_interval() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    100
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            report_window: default_report_window(),
            stats_interval_secs: default_stats_interval(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Where finalized records and reports go
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Tab-separated DCI log file
    pub tsv_path: Option<String>,
    /// ZeroMQ PUB endpoint for DCI records
    pub dci_publish: Option<String>,
    /// ZeroMQ PUB endpoint for JSON status reports
    pub status_publish: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(contents)?;
        if config.carriers.is_empty() {
            return Err(anyhow::anyhow!("at least one carrier must be configured"));
        }
        Ok(config)
    }

    /// Parse the configured format labels
    pub fn formats(&self) -> anyhow::Result<Vec<DciFormat>> {
        self.decoder
            .formats
            .iter()
            .map(|label| {
                label
                    .parse::<DciFormat>()
                    .map_err(|_| anyhow::anyhow!("Unknown DCI format: {}", label))
            })
            .collect()
    }

    /// Engine parameters shared by every carrier
    pub fn pipeline(&self) -> anyhow::Result<PipelineConfig> {
        let decoder = BlindDecoderConfig {
            formats: self.formats()?,
            thresholds: DecodeThresholds {
                candidate_llr: self.decoder.candidate_llr,
                pass_confidence: self.decoder.pass_confidence,
                high_confidence: self.decoder.high_confidence,
            },
            rnti_min: self.decoder.rnti_min,
            rnti_max: self.decoder.rnti_max,
        };

        Ok(PipelineConfig {
            decoder_threads: self.decoder.threads,
            ring_capacity: self.status.ring_capacity,
            decoder,
            inactivity_window: self.tracker.inactivity_window,
            budget_offsets: self.resolver.budget_offsets.clone(),
            max_search: self.resolver.max_search,
            target: self.target_rnti.map(Rnti),
            poll_interval: Duration::from_millis(self.status.poll_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [[carriers]]
            address = "tcp://127.0.0.1:5550"
            "#,
        )
        .unwrap();

        assert_eq!(config.carriers.len(), 1);
        assert_eq!(config.carriers[0].queue_depth, 32);
        assert_eq!(config.decoder.threads, 3);
        assert_eq!(config.resolver.budget_offsets, vec![0, 4, 8]);
        assert_eq!(
            config.formats().unwrap(),
            vec![DciFormat::Format0, DciFormat::Format1A, DciFormat::Format2]
        );

        let pipeline = config.pipeline().unwrap();
        assert_eq!(pipeline.decoder.thresholds.pass_confidence, 75.0);
        assert!(pipeline.target.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = MonitorConfig::from_toml_str(
            r#"
            target_rnti = 17921

            [[carriers]]
            address = "tcp://127.0.0.1:5550"

            [[carriers]]
            address = "tcp://127.0.0.1:5551"
            queue_depth = 8

            [decoder]
            threads = 4
            formats = ["0", "1A"]
            high_confidence = 95.0

            [status]
            ring_capacity = 200

            [output]
            tsv_path = "dci.tsv"
            "#,
        )
        .unwrap();

        let pipeline = config.pipeline().unwrap();
        assert_eq!(pipeline.decoder_threads, 4);
        assert_eq!(pipeline.ring_capacity, 200);
        assert_eq!(pipeline.decoder.formats.len(), 2);
        assert_eq!(pipeline.decoder.thresholds.high_confidence, 95.0);
        assert_eq!(pipeline.target, Some(Rnti(17921)));
        assert_eq!(config.output.tsv_path.as_deref(), Some("dci.tsv"));
        assert_eq!(config.carriers[1].queue_depth, 8);
    }

    #[test]
    fn test_bad_configs_rejected() {
        assert!(MonitorConfig::from_toml_str("carriers = []").is_err());

        let config = MonitorConfig::from_toml_str(
            r#"
            [[carriers]]
            address = "tcp://127.0.0.1:5550"

            [decoder]
            formats = ["3"]
            "#,
        )
        .unwrap();
        assert!(config.pipeline().is_err());
    }
}
