//! FallbackProber behavior against a scripted upstream: strict candidate
//! ordering with early exit, HTML interstitial rejection, and the
//! browser-like request shape.

use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipstream::config::FileShareConfig;
use clipstream::resolve::FallbackProber;
use clipstream_common::Error;

fn prober_for(server: &MockServer) -> FallbackProber {
    FallbackProber::new(FileShareConfig {
        host: server.uri(),
        alt_host: server.uri(),
        ..FileShareConfig::default()
    })
}

#[tokio::test]
async fn accepts_first_playable_candidate_and_stops() {
    let server = MockServer::start().await;

    // Candidate 1 (direct download /d/...) fails with a server error.
    // Candidate 2 (alt host, same path here) would be identical, so fail the
    // shared /d/ path and succeed on candidate 3 (legacy /file/...). The
    // preview candidate must never be attempted.
    Mock::given(method("GET"))
        .and(path("/d/f123"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/file/f123"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![0u8; 16]),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/preview/f123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let prober = prober_for(&server);
    let probed = prober.probe("f123", None, None).await.unwrap();
    assert_eq!(probed.template, "legacy-download");
    assert!(probed.url.contains("/file/f123"));
}

#[tokio::test]
async fn second_candidate_success_means_exactly_two_attempts() {
    let primary = MockServer::start().await;
    let alternate = MockServer::start().await;

    // Candidate 1 (primary direct download) fails; candidate 2 (alternate
    // host) succeeds; later candidates are never attempted.
    Mock::given(method("GET"))
        .and(path("/d/f222"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/d/f222"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![0u8; 16]),
        )
        .expect(1)
        .mount(&alternate)
        .await;

    Mock::given(method("GET"))
        .and(path("/file/f222"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/preview/f222"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&primary)
        .await;

    let prober = FallbackProber::new(FileShareConfig {
        host: primary.uri(),
        alt_host: alternate.uri(),
        ..FileShareConfig::default()
    });

    let probed = prober.probe("f222", None, None).await.unwrap();
    assert_eq!(probed.template, "alt-host-download");
}

#[tokio::test]
async fn html_success_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/d/f456"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>download quota exceeded</html>".to_string(), "text/html; charset=utf-8"),
        )
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/file/f456"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(vec![0u8; 16]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let prober = prober_for(&server);
    let probed = prober.probe("f456", None, None).await.unwrap();
    assert_eq!(probed.template, "legacy-download");
}

#[tokio::test]
async fn saved_url_is_probed_after_templates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>".to_string(), "text/html"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/stored/f789.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![0u8; 16]),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    let prober = prober_for(&server);
    let saved = format!("{}/stored/f789.mp4", server.uri());
    let probed = prober.probe("f789", Some(&saved), None).await.unwrap();
    assert_eq!(probed.template, "saved-url");
    assert_eq!(probed.url, saved);
}

#[tokio::test]
async fn exhaustion_reports_attempts_and_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let prober = prober_for(&server);
    let err = prober.probe("f000", None, None).await.unwrap_err();
    match err {
        Error::UpstreamUnreachable {
            attempts,
            last_error,
        } => {
            // direct, alt-host, legacy, preview.
            assert_eq!(attempts, 4);
            assert!(last_error.contains("preview"));
        }
        other => panic!("expected UpstreamUnreachable, got {other:?}"),
    }
}

#[tokio::test]
async fn probes_with_browser_user_agent_and_range() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/d/f111"))
        .and(header("range", "bytes=64-127"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-type", "video/mp4")
                .insert_header("content-range", "bytes 64-127/1024")
                .set_body_bytes(vec![0u8; 64]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let prober = prober_for(&server);
    let probed = prober
        .probe("f111", None, Some("bytes=64-127"))
        .await
        .unwrap();
    assert_eq!(probed.template, "direct-download");
}
