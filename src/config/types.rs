use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub cloud_transform: CloudTransformConfig,

    #[serde(default)]
    pub file_share: FileShareConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub preload: PreloadConfig,

    #[serde(default)]
    pub cache: CacheConfig,
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

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Root directory local-file references are resolved under.
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Path to the JSON backend-descriptor catalog.
    #[serde(default = "default_catalog_path")]
    pub catalog: PathBuf,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from("./catalog.json")
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            catalog: default_catalog_path(),
        }
    }
}

/// Credentials for the cloud media-transform service.
///
/// Only private deliveries need these; public transformations are derived
/// from the per-video base URL alone.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CloudTransformConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Secret used to sign private delivery URLs.
    #[serde(default)]
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileShareConfig {
    /// Primary download host.
    #[serde(default = "default_share_host")]
    pub host: String,

    /// Alternate download host tried when the primary serves interstitials.
    #[serde(default = "default_share_alt_host")]
    pub alt_host: String,

    /// User agent sent on probe requests. The hosting service serves HTML
    /// warning pages to clients it does not recognize as browsers.
    #[serde(default = "default_share_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for probe attempts, in seconds.
    #[serde(default = "default_share_timeout")]
    pub timeout_secs: u64,
}

fn default_share_host() -> String {
    "share.example.com".to_string()
}
fn default_share_alt_host() -> String {
    "dl.share.example.com".to_string()
}
fn default_share_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}
fn default_share_timeout() -> u64 {
    10
}

impl Default for FileShareConfig {
    fn default() -> Self {
        Self {
            host: default_share_host(),
            alt_host: default_share_alt_host(),
            user_agent: default_share_user_agent(),
            timeout_secs: default_share_timeout(),
        }
    }
}

/// Fixed transformation tokens injected into cloud-transform delivery URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_quality")]
    pub quality: String,

    #[serde(default = "default_format")]
    pub format: String,
}

fn default_width() -> u32 {
    720
}
fn default_height() -> u32 {
    1280
}
fn default_quality() -> String {
    "auto".to_string()
}
fn default_format() -> String {
    "mp4".to_string()
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            quality: default_quality(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreloadConfig {
    /// Size of each buffered read, in bytes.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: u64,

    /// Minimum interval between progress emissions, in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_chunk_bytes() -> u64 {
    256 * 1024
}
fn default_progress_interval() -> u64 {
    100
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: default_chunk_bytes(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Whether the background cache worker runs at all.
    #[serde(default)]
    pub enabled: bool,

    /// Directory cached media bytes are stored under.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Upper bound on total cached bytes; oldest entries are evicted first.
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: u64,

    /// Entries unused for longer than this are dropped by the cleanup pass.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}
fn default_cache_max_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_cache_ttl() -> u64 {
    24 * 3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_cache_dir(),
            max_bytes: default_cache_max_bytes(),
            ttl_secs: default_cache_ttl(),
        }
    }
}
