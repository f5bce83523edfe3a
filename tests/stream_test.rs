//! Integration tests for the streaming endpoint: local-file delivery with
//! range and conditional requests, and the redirect paths.

mod common;

use common::TestHarness;

use clipstream_common::{BackendDescriptor, BackendRef, VideoId};

#[tokio::test]
async fn local_file_full_response() {
    let (h, addr) = TestHarness::with_server().await;
    let video_data = vec![7u8; 1024];
    let id = h.add_local_video("clip.mp4", &video_data);

    let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "video/mp4"
    );
    assert_eq!(
        resp.headers().get("accept-ranges").unwrap().to_str().unwrap(),
        "bytes"
    );
    assert!(resp.headers().get("etag").is_some());
    assert!(resp.headers().get("last-modified").is_some());
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), 1024);
}

#[tokio::test]
async fn local_file_range_round_trip() {
    let (h, addr) = TestHarness::with_server().await;
    let video_data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let id = h.add_local_video("range.mp4", &video_data);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("Range", "bytes=0-99")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(
        resp.headers()
            .get("content-range")
            .unwrap()
            .to_str()
            .unwrap(),
        "bytes 0-99/1000"
    );
    assert_eq!(
        resp.headers()
            .get("content-length")
            .unwrap()
            .to_str()
            .unwrap(),
        "100"
    );
    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], &video_data[..100]);
}

#[tokio::test]
async fn local_file_open_ended_range() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("open.mp4", &vec![42u8; 500]);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("Range", "bytes=400-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(
        resp.headers()
            .get("content-range")
            .unwrap()
            .to_str()
            .unwrap(),
        "bytes 400-499/500"
    );
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), 100);
}

#[tokio::test]
async fn conditional_request_via_etag() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("etag.mp4", &vec![1u8; 256]);

    let client = reqwest::Client::new();
    let first = client
        .get(format!("http://{addr}/stream/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    let etag = first
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    first.bytes().await.unwrap();

    let second = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("If-None-Match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    let body = second.bytes().await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn conditional_request_via_if_modified_since() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("ims.mp4", &vec![2u8; 128]);

    let client = reqwest::Client::new();
    let first = client
        .get(format!("http://{addr}/stream/{id}"))
        .send()
        .await
        .unwrap();
    let last_modified = first
        .headers()
        .get("last-modified")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    first.bytes().await.unwrap();

    let second = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("If-Modified-Since", &last_modified)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
}

#[tokio::test]
async fn etag_changes_with_requested_dimensions() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("dims.mp4", &vec![3u8; 64]);

    let client = reqwest::Client::new();
    let default_resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .send()
        .await
        .unwrap();
    let resized_resp = client
        .get(format!("http://{addr}/stream/{id}?w=480&h=854"))
        .send()
        .await
        .unwrap();

    let etag_a = default_resp.headers().get("etag").unwrap().clone();
    let etag_b = resized_resp.headers().get("etag").unwrap().clone();
    assert_ne!(etag_a, etag_b);
    assert!(etag_b.to_str().unwrap().contains("480x854"));
}

#[tokio::test]
async fn range_past_eof_is_unsatisfiable() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("eof.mp4", &vec![5u8; 100]);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("Range", "bytes=500-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 416);
    assert_eq!(
        resp.headers()
            .get("content-range")
            .unwrap()
            .to_str()
            .unwrap(),
        "bytes */100"
    );
}

#[tokio::test]
async fn malformed_range_is_rejected_not_served_whole() {
    let (h, addr) = TestHarness::with_server().await;
    let id = h.add_local_video("bad.mp4", &vec![5u8; 100]);

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .header("Range", "bytes=oops-nope")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 416);
}

#[tokio::test]
async fn content_type_follows_extension() {
    let (h, addr) = TestHarness::with_server().await;
    let mkv = h.add_local_video("clip.mkv", &vec![0u8; 32]);
    let webm = h.add_local_video("clip.webm", &vec![0u8; 32]);
    let unknown = h.add_local_video("clip.dat", &vec![0u8; 32]);

    for (id, expected) in [
        (mkv, "video/x-matroska"),
        (webm, "video/webm"),
        (unknown, "video/mp4"),
    ] {
        let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("content-type").unwrap().to_str().unwrap(),
            expected
        );
    }
}

#[tokio::test]
async fn missing_local_file_is_404() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor::single(
        id,
        BackendRef::LocalFile {
            path: "not-there.mp4".into(),
            thumbnail_url: None,
        },
    ));

    let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "local_file_missing");
}

#[tokio::test]
async fn traversal_in_catalog_path_is_rejected() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor::single(
        id,
        BackendRef::LocalFile {
            path: "../outside.mp4".into(),
            thumbnail_url: None,
        },
    ));

    let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_video_is_404() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::get(format!("http://{addr}/stream/{}", VideoId::new()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn invalid_video_id_is_400() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::get(format!("http://{addr}/stream/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn empty_descriptor_is_source_not_available() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor {
        video_id: id,
        refs: Vec::new(),
    });

    let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "source_not_available");
}

#[tokio::test]
async fn managed_cdn_redirects_with_long_cache() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor::single(
        id,
        BackendRef::ManagedCdn {
            asset_id: "asset-9".into(),
            playback_url: "https://cdn.example.com/asset-9/play.mp4".into(),
            thumbnail_url: None,
        },
    ));

    let client = TestHarness::no_redirect_client();
    let resp = client
        .get(format!("http://{addr}/stream/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        "https://cdn.example.com/asset-9/play.mp4"
    );
    assert!(resp
        .headers()
        .get("cache-control")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("immutable"));
}

#[tokio::test]
async fn public_cloud_transform_redirects_with_query_overrides() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor::single(
        id,
        BackendRef::CloudTransform {
            public_id: "clips/xyz".into(),
            base_url: "https://media.example.com/acme".into(),
            private: false,
            thumbnail_url: None,
        },
    ));

    let client = TestHarness::no_redirect_client();
    let resp = client
        .get(format!("http://{addr}/stream/{id}?w=480&h=854&q=60"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.contains("w_480,h_854"));
    assert!(location.contains("q_60"));
    assert!(location.ends_with("clips/xyz.mp4"));
}

#[tokio::test]
async fn private_cloud_without_credentials_is_503() {
    let (h, addr) = TestHarness::with_server().await;
    let id = VideoId::new();
    h.insert(BackendDescriptor::single(
        id,
        BackendRef::CloudTransform {
            public_id: "clips/secret".into(),
            base_url: "https://media.example.com/acme".into(),
            private: true,
            thumbnail_url: None,
        },
    ));

    let resp = reqwest::get(format!("http://{addr}/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "configuration_missing");
}

#[tokio::test]
async fn health_check_responds() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}
