//! ZeroTier Central membership API client.

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Deserialize;

use crate::error::{Result, SyncError};

/// ZeroTier Central API base URL.
pub const DEFAULT_API_URL: &str = "https://api.zerotier.com/api/v1";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One network member as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    /// Member name, used as the hostname.
    pub name: String,
    /// ZeroTier node ID (`config.id`).
    pub id: String,
    /// First managed IP assignment, if the member has one.
    pub ip: Option<String>,
}

impl MemberRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>, ip: Option<&str>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            ip: ip.map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: Option<ApiMemberConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMemberConfig {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ip_assignments: Option<Vec<String>>,
}

impl From<ApiMember> for MemberRecord {
    fn from(member: ApiMember) -> Self {
        let config = member.config.unwrap_or_default();
        Self {
            name: member.name.unwrap_or_default(),
            id: config.id.unwrap_or_default(),
            ip: config.ip_assignments.and_then(|ips| ips.into_iter().next()),
        }
    }
}

/// Parses a member list response body.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] if `body` is not a JSON array of member objects.
pub fn parse_members(body: &str) -> Result<Vec<MemberRecord>> {
    let members: Vec<ApiMember> = serde_json::from_str(body)?;
    Ok(members.into_iter().map(MemberRecord::from).collect())
}

/// Blocking client for the member list of one network.
///
/// # Example
///
/// ```rust,ignore
/// use zerotier_hosts::MembershipClient;
///
/// let client = MembershipClient::builder("api-token", "8056c2e21c000001").build()?;
/// for member in client.fetch()? {
///     println!("{} {:?}", member.name, member.ip);
/// }
/// ```
pub struct MembershipClient {
    http: HttpClient,
    api_key: String,
    url: String,
}

impl MembershipClient {
    /// Creates a builder with the default API URL and timeout.
    #[must_use]
    pub fn builder(
        api_key: impl Into<String>,
        network_id: impl Into<String>,
    ) -> MembershipClientBuilder {
        MembershipClientBuilder::new(api_key, network_id)
    }

    /// Returns the member list URL this client queries.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the current member list.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fetch`] on transport failure, [`SyncError::Api`]
    /// on a non-2xx status and [`SyncError::Parse`] on a malformed body.
    pub fn fetch(&self) -> Result<Vec<MemberRecord>> {
        tracing::debug!(url = %self.url, "GET member list");

        let response = self
            .http
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .map_err(|e| SyncError::Fetch(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SyncError::Fetch(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Membership API rejected request");
            return Err(SyncError::Api {
                code: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let members = parse_members(&body)?;
        tracing::debug!(count = members.len(), "Fetched member list");
        Ok(members)
    }
}

/// Pulls `message` out of a JSON error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body)
}

/// Builder for [`MembershipClient`].
pub struct MembershipClientBuilder {
    api_key: String,
    network_id: String,
    base_url: String,
    timeout: Duration,
}

impl MembershipClientBuilder {
    /// Creates a builder with the default API URL and timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>, network_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            network_id: network_id.into(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the API base URL (useful for testing).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fetch`] if the HTTP client cannot be initialized.
    pub fn build(self) -> Result<MembershipClient> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(concat!("zerotier-hosts/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Fetch(e.to_string()))?;

        let url = format!(
            "{}/network/{}/member",
            self.base_url.trim_end_matches('/'),
            self.network_id
        );

        Ok(MembershipClient {
            http,
            api_key: self.api_key,
            url,
        })
    }
}
