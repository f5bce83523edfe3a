//! Cloud-transform delivery URL construction.
//!
//! The transform service addresses derived renditions as
//! `{base}/video/upload/{tokens}/{public_id}.{format}` where `tokens` is a
//! comma-separated transformation string. Private assets additionally carry
//! an `s--{sig}--` path component whose signature covers everything after it,
//! so a leaked URL cannot be rewritten to another rendition or asset.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::TransformConfig;

type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated URL signature, in base64 characters.
const SIGNATURE_LEN: usize = 8;

/// Concrete transformation tokens for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformParams {
    pub width: u32,
    pub height: u32,
    pub quality: String,
    pub format: String,
}

impl TransformParams {
    /// Apply per-request overrides on top of the configured defaults.
    pub fn with_overrides(
        config: &TransformConfig,
        width: Option<u32>,
        height: Option<u32>,
        quality: Option<String>,
    ) -> Self {
        Self {
            width: width.unwrap_or(config.width),
            height: height.unwrap_or(config.height),
            quality: quality.unwrap_or_else(|| config.quality.clone()),
            format: config.format.clone(),
        }
    }

    /// The transformation path component, e.g. `w_720,h_1280,c_fill,q_auto`.
    pub fn tokens(&self) -> String {
        format!(
            "w_{},h_{},c_fill,q_{}",
            self.width, self.height, self.quality
        )
    }
}

impl From<&TransformConfig> for TransformParams {
    fn from(config: &TransformConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            quality: config.quality.clone(),
            format: config.format.clone(),
        }
    }
}

/// Delivery URL for a public asset.
pub fn public_delivery_url(base_url: &str, public_id: &str, params: &TransformParams) -> String {
    format!(
        "{}/video/upload/{}/{}.{}",
        base_url.trim_end_matches('/'),
        params.tokens(),
        public_id,
        params.format
    )
}

/// Delivery URL for an asset without any transformation applied.
///
/// This is the form the asset was originally stored under and the target of
/// the one-shot fallback when a signed fetch fails.
pub fn raw_delivery_url(base_url: &str, public_id: &str, format: &str) -> String {
    format!(
        "{}/video/upload/{}.{}",
        base_url.trim_end_matches('/'),
        public_id,
        format
    )
}

/// Signed delivery URL for a private asset.
pub fn signed_delivery_url(
    base_url: &str,
    public_id: &str,
    params: &TransformParams,
    api_secret: &str,
) -> String {
    let to_sign = format!("{}/{}.{}", params.tokens(), public_id, params.format);
    let signature = sign(&to_sign, api_secret);
    format!(
        "{}/video/upload/s--{}--/{}",
        base_url.trim_end_matches('/'),
        signature,
        to_sign
    )
}

fn sign(payload: &str, api_secret: &str) -> String {
    // HMAC keys accept any length, so new_from_slice cannot fail.
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded[..SIGNATURE_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TransformParams {
        TransformParams {
            width: 720,
            height: 1280,
            quality: "auto".into(),
            format: "mp4".into(),
        }
    }

    #[test]
    fn public_url_injects_tokens() {
        let url = public_delivery_url("https://media.example.com/acme/", "clips/abc", &params());
        assert_eq!(
            url,
            "https://media.example.com/acme/video/upload/w_720,h_1280,c_fill,q_auto/clips/abc.mp4"
        );
    }

    #[test]
    fn raw_url_has_no_tokens() {
        let url = raw_delivery_url("https://media.example.com/acme", "clips/abc", "mp4");
        assert_eq!(
            url,
            "https://media.example.com/acme/video/upload/clips/abc.mp4"
        );
    }

    #[test]
    fn signed_url_is_deterministic() {
        let a = signed_delivery_url("https://m.example.com/x", "clips/abc", &params(), "s3cret");
        let b = signed_delivery_url("https://m.example.com/x", "clips/abc", &params(), "s3cret");
        assert_eq!(a, b);
        assert!(a.contains("/video/upload/s--"));
        assert!(a.ends_with("/w_720,h_1280,c_fill,q_auto/clips/abc.mp4"));
    }

    #[test]
    fn signature_covers_transformation() {
        let base = signed_delivery_url("https://m.example.com/x", "clips/abc", &params(), "s3cret");
        let mut other = params();
        other.width = 1080;
        let resized = signed_delivery_url("https://m.example.com/x", "clips/abc", &other, "s3cret");
        let sig = |u: &str| u.split("s--").nth(1).unwrap().split("--").next().unwrap().to_string();
        assert_ne!(sig(&base), sig(&resized));
    }

    #[test]
    fn overrides_replace_defaults_individually() {
        let config = TransformConfig::default();
        let p = TransformParams::with_overrides(&config, Some(480), None, None);
        assert_eq!(p.width, 480);
        assert_eq!(p.height, config.height);
        assert_eq!(p.quality, config.quality);
    }
}
