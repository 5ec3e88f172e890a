use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Publish cycle period in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// File name of the feed written next to the playlist and served by the gateway
    #[serde(default = "default_feed_name")]
    pub feed_name: String,

    /// Regex matched against file names when waiting for a playlist in a directory
    #[serde(default = "default_playlist_pattern")]
    pub playlist_pattern: String,

    /// Artifact piece length in bytes
    #[serde(default = "default_piece_length")]
    pub piece_length: u64,
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_feed_name() -> String {
    "stream.magnets".to_string()
}

fn default_playlist_pattern() -> String {
    r"\.m3u8$".to_string()
}

fn default_piece_length() -> u64 {
    magnetcast_content::DEFAULT_PIECE_LENGTH
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            feed_name: default_feed_name(),
            playlist_pattern: default_playlist_pattern(),
            piece_length: default_piece_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Maximum number of artifacts seeded at once
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    5
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Order in which retrieved payloads enter the delivery queue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOrder {
    /// Queue payloads as their retrievals complete.
    #[default]
    Completion,
    /// Re-sequence payloads by timeline position before queueing.
    Feed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    /// Feed poll period in milliseconds
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub delivery_order: DeliveryOrder,

    /// Extra attempts per failed retrieval (0 = drop and log)
    #[serde(default)]
    pub retrieval_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-retrieval timeout in seconds (unset = wait indefinitely)
    #[serde(default)]
    pub retrieval_timeout_secs: Option<u64>,

    /// Base URL of the swarm gateway (defaults to the feed URL's origin)
    #[serde(default)]
    pub gateway: Option<String>,

    /// File the reconstructed stream is appended to
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl ConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retrieval_timeout(&self) -> Option<Duration> {
        self.retrieval_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_interval_ms(),
            delivery_order: DeliveryOrder::default(),
            retrieval_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            retrieval_timeout_secs: None,
            gateway: None,
            output: None,
        }
    }
}
