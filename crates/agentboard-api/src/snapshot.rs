// HTTP snapshot client
//
// Point-in-time reads of the three dashboard resources. Used both to
// bootstrap the dashboard before the realtime channel delivers anything
// and as the body of the polling fallback.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::protocol::Channel;
use crate::transport::TransportConfig;

/// Raw HTTP client for the dashboard snapshot endpoints.
///
/// Every method returns the decoded JSON body untouched; typing the
/// payload is the consumer's business.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SnapshotClient {
    /// Create a snapshot client from a `TransportConfig`.
    ///
    /// `base_url` is the server root (e.g. `http://127.0.0.1:8000/`);
    /// endpoint paths are resolved relative to it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::from_reqwest(base_url, http))
    }

    /// Create a snapshot client with a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: Url, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
        }
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of a channel's snapshot endpoint.
    pub fn endpoint(&self, channel: Channel) -> Result<Url, Error> {
        Ok(self.base_url.join(channel.snapshot_path())?)
    }

    /// Fetch one channel's snapshot.
    ///
    /// Non-2xx responses are errors, as are bodies that are not JSON.
    pub async fn fetch(&self, channel: Channel) -> Result<serde_json::Value, Error> {
        let url = self.endpoint(channel)?;
        debug!(%channel, url = %url, "fetching snapshot");

        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Fetch all three snapshots concurrently.
    ///
    /// Each result is independent: one failing resource never cancels or
    /// fails the other two.
    pub async fn fetch_all(&self) -> [(Channel, Result<serde_json::Value, Error>); 3] {
        let (collaboration, tasks, performance) = tokio::join!(
            self.fetch(Channel::Collaboration),
            self.fetch(Channel::Tasks),
            self.fetch(Channel::Performance),
        );

        [
            (Channel::Collaboration, collaboration),
            (Channel::Tasks, tasks),
            (Channel::Performance, performance),
        ]
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> SnapshotClient {
        SnapshotClient::from_reqwest(Url::parse(base).unwrap(), reqwest::Client::new())
    }

    #[test]
    fn endpoints_resolve_against_root() {
        let c = client("http://127.0.0.1:8000");
        assert_eq!(
            c.endpoint(Channel::Tasks).unwrap().as_str(),
            "http://127.0.0.1:8000/api/tasks"
        );
    }

    #[test]
    fn endpoints_keep_path_prefix() {
        let c = client("http://example.com/dashboard");
        assert_eq!(c.base_url().as_str(), "http://example.com/dashboard/");
        assert_eq!(
            c.endpoint(Channel::Collaboration).unwrap().as_str(),
            "http://example.com/dashboard/api/collaboration"
        );
    }
}
