//! Proxy selection
//!
//! The proxy is decided once, before any download starts. An explicitly configured
//! proxy must pass a reachability probe or the run is aborted; without one the
//! connection is direct, unless local auto-detection is switched on.

use crate::error::UpdateError;
use crate::types::{ArtupSettings, DEFAULT_PROXY};
use reqwest::redirect::Policy;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinSet;

/// Well-known local proxy endpoints tried by auto-detection.
pub const LOCAL_PROXY_CANDIDATES: &[&str] = &[
    "http://127.0.0.1:1080",
    "http://127.0.0.1:1088",
    "socks5://127.0.0.1:1080",
    "socks5://127.0.0.1:1088",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
}

impl ProxyScheme {
    fn default_port(&self) -> u16 {
        match self {
            ProxyScheme::Http => 80,
            ProxyScheme::Https => 443,
            ProxyScheme::Socks5 => 1080,
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Https => write!(f, "https"),
            ProxyScheme::Socks5 => write!(f, "socks5"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Parse `scheme://host[:port]`. A bare `host:port` is taken as an HTTP proxy.
    pub fn parse(url: &str) -> Result<Self, String> {
        let url = url.trim();
        let with_scheme = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };

        let parsed = reqwest::Url::parse(&with_scheme)
            .map_err(|e| format!("Could not parse proxy URL '{}': {}", url, e))?;

        let scheme = match parsed.scheme() {
            "http" => ProxyScheme::Http,
            "https" => ProxyScheme::Https,
            "socks" | "socks5" | "socks5h" => ProxyScheme::Socks5,
            other => return Err(format!("Unsupported proxy scheme '{}'", other)),
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| format!("Proxy URL '{}' has no host", url))?
            .to_string();
        let port = parsed.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self { scheme, host, port })
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn to_reqwest(&self) -> reqwest::Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.url())
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Probe `probe_url` through `proxy`. Any failure is reported as `false`.
pub async fn test_proxy(proxy: &ProxyConfig, probe_url: &str, timeout: Duration) -> bool {
    let client = match proxy.to_reqwest().and_then(|p| {
        reqwest::Client::builder()
            .proxy(p)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
    }) {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Could not build client for proxy {}: {}", proxy, e);
            return false;
        }
    };

    match client.get(probe_url).send().await {
        Ok(response) => {
            let status = response.status();
            tracing::debug!("Proxy {} answered {} for {}", proxy, status, probe_url);
            status.is_success() || status.is_redirection()
        }
        Err(e) => {
            tracing::debug!("Proxy {} failed: {}", proxy, e);
            false
        }
    }
}

/// Race every candidate; the first one that passes the probe wins and the rest are
/// abandoned. Gives up after `timeout` in total.
pub async fn detect_proxy(
    candidates: Vec<ProxyConfig>,
    probe_url: &str,
    timeout: Duration,
) -> Option<ProxyConfig> {
    let mut probes = JoinSet::new();
    for candidate in candidates {
        let probe_url = probe_url.to_string();
        probes.spawn(async move {
            let valid = test_proxy(&candidate, &probe_url, timeout).await;
            (candidate, valid)
        });
    }

    let race = async {
        while let Some(joined) = probes.join_next().await {
            if let Ok((candidate, true)) = joined {
                return Some(candidate);
            }
        }
        None
    };

    let found = tokio::time::timeout(timeout, race).await.ok().flatten();
    probes.abort_all();
    found
}

/// Decide which proxy every later request goes through.
pub async fn resolve_proxy(
    configured: Option<&str>,
    settings: &ArtupSettings,
) -> Result<Option<ProxyConfig>, UpdateError> {
    let timeout = Duration::from_secs(settings.probe_timeout_secs.max(1));
    let configured = configured
        .map(str::trim)
        .filter(|url| !url.is_empty() && !url.eq_ignore_ascii_case(DEFAULT_PROXY));

    let proxy = if let Some(url) = configured {
        let proxy = ProxyConfig::parse(url).map_err(|reason| UpdateError::InvalidProxy {
            url: url.to_string(),
            reason,
        })?;

        tracing::info!("Testing proxy {}...", proxy);
        if !test_proxy(&proxy, &settings.proxy_probe_url, timeout).await {
            return Err(UpdateError::InvalidProxy {
                url: url.to_string(),
                reason: format!("could not reach {} through it", settings.proxy_probe_url),
            });
        }
        tracing::info!("Proxy is valid.");
        Some(proxy)
    } else if settings.auto_detect_proxy {
        let candidates = LOCAL_PROXY_CANDIDATES
            .iter()
            .filter_map(|url| ProxyConfig::parse(url).ok())
            .collect();
        tracing::debug!("Probing local proxies for up to {:?}", timeout);
        detect_proxy(candidates, &settings.proxy_probe_url, timeout).await
    } else {
        None
    };

    match &proxy {
        Some(proxy) => tracing::info!("Using proxy: {}", proxy),
        None => tracing::info!("Using proxy: none (direct connection)"),
    }
    Ok(proxy)
}
