//! Feed fetcher with security measures.
//!
//! Fetches feed documents over HTTP with SSRF protection, bounded timeouts
//! and a size limit.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::parse::parse_feed;
use super::types::ParsedFeed;
use crate::config::FetchConfig;
use crate::{PollerError, Result};

/// Source of parsed feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;

    /// Fetch the raw body of `url` and return a short sample of it.
    ///
    /// Used to log what a server sent when parsing failed.
    async fn diagnose(&self, url: &str) -> Result<String>;

    /// Whether `url` answers a GET with `200 OK`.
    async fn check_link(&self, url: &str) -> bool;
}

/// [`FeedFetcher`] over a shared reqwest client.
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: Client,
    max_feed_size: u64,
    sample_chars: usize,
}

impl HttpFeedFetcher {
    /// Create a fetcher from the fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PollerError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            sample_chars: config.diagnostic_sample_chars,
        })
    }

    async fn get_body(&self, url: &str) -> Result<FetchedBody> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PollerError::Feed(format!("failed to fetch feed: {}", e)))?;

        let status = response.status();

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(PollerError::Feed(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PollerError::Feed(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(PollerError::Feed(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        Ok(FetchedBody {
            status,
            bytes: bytes.to_vec(),
        })
    }
}

struct FetchedBody {
    status: StatusCode,
    bytes: Vec<u8>,
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let body = self.get_body(url).await?;
        if !body.status.is_success() {
            return Err(PollerError::Feed(format!("HTTP error: {}", body.status)));
        }
        let feed = parse_feed(&body.bytes)?;
        debug!("Parsed {} entries from {}", feed.items.len(), url);
        Ok(feed)
    }

    async fn diagnose(&self, url: &str) -> Result<String> {
        let body = self.get_body(url).await?;
        let text = String::from_utf8_lossy(&body.bytes);
        Ok(format!(
            "HTTP {}: {}",
            body.status,
            sample(&text, self.sample_chars)
        ))
    }

    async fn check_link(&self, url: &str) -> bool {
        if validate_url(url).is_err() {
            return false;
        }
        match self.client.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Link check failed for {}: {}", url, e);
                false
            }
        }
    }
}

/// First `max_chars` characters of `text`.
pub fn sample(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| PollerError::Feed(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(PollerError::Feed(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| PollerError::Feed("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(PollerError::Feed(format!("forbidden host: {}", domain)));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(PollerError::Feed(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }

    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (first & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (first & 0xffc0) == 0xfe80
                || ipv6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
