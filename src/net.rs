use crate::error::UpdateError;
use crate::proxy::{resolve_proxy, ProxyConfig};
use crate::types::ArtupSettings;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Network state shared by every component that talks to the repository.
///
/// Built once per run with the resolved proxy baked into the client, never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct NetContext {
    client: reqwest::Client,
    proxy: Option<ProxyConfig>,
}

impl NetContext {
    /// Resolve the proxy and build the shared client.
    pub async fn establish(
        settings: &ArtupSettings,
        configured_proxy: Option<&str>,
    ) -> Result<Self, UpdateError> {
        let proxy = resolve_proxy(configured_proxy, settings).await?;
        Self::with_proxy(proxy)
    }

    pub fn with_proxy(proxy: Option<ProxyConfig>) -> Result<Self, UpdateError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("artup/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT);

        builder = match &proxy {
            Some(proxy) => {
                let proxy_settings = proxy.to_reqwest().map_err(|e| UpdateError::InvalidProxy {
                    url: proxy.url(),
                    reason: e.to_string(),
                })?;
                builder.proxy(proxy_settings)
            }
            None => builder.no_proxy(),
        };

        let client = builder.build().map_err(|e| UpdateError::FetchFailed {
            context: "Could not build HTTP client".to_string(),
            failures: vec![e.to_string()],
        })?;

        Ok(Self { client, proxy })
    }

    /// Direct connection, no proxy.
    #[cfg(test)]
    pub fn direct() -> Result<Self, UpdateError> {
        Self::with_proxy(None)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }
}
