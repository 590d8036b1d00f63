//! Proxy data models

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Proxy authentication credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl ProxyAuth {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

/// Failure to turn a proxy identifier into a usable proxy URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyUrlError {
    #[error("invalid proxy {proxy:?}: {reason}")]
    Parse { proxy: String, reason: String },

    #[error("invalid proxy {0:?}: missing host")]
    MissingHost(String),

    #[error("proxy {0:?} cannot carry credentials")]
    Credentials(String),
}

/// Identifier of a single proxy, as read from input.
///
/// Usually `host:port`, optionally prefixed with a scheme such as
/// `http://` or `socks5://`. The identifier is kept verbatim so the report
/// shows exactly what the operator supplied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proxy(String);

impl Proxy {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the proxy URL the transport should route through.
    ///
    /// A bare `host:port` is treated as an HTTP proxy. Credentials are only
    /// embedded as userinfo for SOCKS proxies; HTTP proxies get them as a
    /// basic auth header from the executor, which keeps an empty password.
    pub fn url(&self, auth: Option<&ProxyAuth>) -> Result<Url, ProxyUrlError> {
        let raw = if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        };

        let mut url = Url::parse(&raw).map_err(|e| ProxyUrlError::Parse {
            proxy: self.0.clone(),
            reason: e.to_string(),
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ProxyUrlError::MissingHost(self.0.clone()));
        }

        if let Some(auth) = auth.filter(|_| is_socks(&url)) {
            url.set_username(&auth.username)
                .map_err(|_| ProxyUrlError::Credentials(self.0.clone()))?;
            url.set_password(Some(&auth.password))
                .map_err(|_| ProxyUrlError::Credentials(self.0.clone()))?;
        }

        Ok(url)
    }
}

/// Whether the proxy URL speaks SOCKS rather than HTTP
pub(crate) fn is_socks(url: &Url) -> bool {
    url.scheme().starts_with("socks")
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Proxy {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Proxy {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outcome class of one probe.
///
/// The variant order is the report order: `Unknown` sorts first and
/// `Success` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    #[default]
    Unknown,
    ProxyInvalid,
    Timeout,
    Error,
    Forbidden,
    Success,
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultState::Unknown => write!(f, "unknown"),
            ResultState::ProxyInvalid => write!(f, "invalid proxy"),
            ResultState::Timeout => write!(f, "timeout"),
            ResultState::Error => write!(f, "error"),
            ResultState::Forbidden => write!(f, "forbidden"),
            ResultState::Success => write!(f, "success"),
        }
    }
}

/// Classified result of probing one proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResult {
    pub proxy: Proxy,
    pub state: ResultState,
    pub error: Option<String>,
    pub ip: Option<String>,
    /// HTTP status of the probe response, 0 when none was received
    pub status: u16,
    pub response_time_ms: Option<u64>,
}

impl ProxyResult {
    fn new(proxy: Proxy, state: ResultState, status: u16) -> Self {
        Self {
            proxy,
            state,
            error: None,
            ip: None,
            status,
            response_time_ms: None,
        }
    }

    pub fn success(proxy: Proxy, status: u16) -> Self {
        Self::new(proxy, ResultState::Success, status)
    }

    pub fn forbidden(proxy: Proxy, status: u16, ip: String) -> Self {
        Self {
            ip: Some(ip),
            ..Self::new(proxy, ResultState::Forbidden, status)
        }
    }

    pub fn invalid(proxy: Proxy) -> Self {
        Self::new(proxy, ResultState::ProxyInvalid, 0)
    }

    pub fn timeout(proxy: Proxy, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(proxy, ResultState::Timeout, 0)
        }
    }

    pub fn failed(proxy: Proxy, status: u16, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(proxy, ResultState::Error, status)
        }
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }
}

impl fmt::Display for ProxyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (status {}", self.proxy, self.state, self.status)?;
        if let Some(ip) = &self.ip {
            write!(f, ", ip {}", ip)?;
        }
        if let Some(error) = &self.error {
            write!(f, ", error {}", error)?;
        }
        write!(f, ")")
    }
}
