//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temp media directory, an empty
//! descriptor catalog, and a full [`AppContext`]. The [`with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use tempfile::TempDir;

use clipstream::catalog::DescriptorStore;
use clipstream::config::Config;
use clipstream::server::{create_router, AppContext};
use clipstream_common::{BackendDescriptor, BackendRef, VideoId};

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// temp media directory.
pub struct TestHarness {
    pub ctx: AppContext,
    media_dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration.
    ///
    /// The media root is always redirected into a fresh temp directory.
    pub fn with_config(mut config: Config) -> Self {
        let media_dir = tempfile::tempdir().expect("failed to create temp media dir");
        config.media.root = media_dir.path().to_path_buf();

        let ctx = AppContext::new(config, DescriptorStore::new());

        Self { ctx, media_dir }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Register a descriptor in the catalog.
    pub fn insert(&self, descriptor: BackendDescriptor) {
        self.ctx.catalog.insert(descriptor);
    }

    /// Write a media file under the temp media root and register a
    /// local-file descriptor pointing at it.
    pub fn add_local_video(&self, file_name: &str, data: &[u8]) -> VideoId {
        let path = self.media_dir.path().join(file_name);
        std::fs::write(&path, data).expect("failed to write media file");

        let video_id = VideoId::new();
        self.insert(BackendDescriptor::single(
            video_id,
            BackendRef::LocalFile {
                path: file_name.to_string(),
                thumbnail_url: None,
            },
        ));
        video_id
    }

    /// A reqwest client that does not follow redirects, for asserting on
    /// 302 responses directly.
    pub fn no_redirect_client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build client")
    }
}
