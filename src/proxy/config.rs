//! Checker configuration

use crate::error::ConfigError;
use crate::proxy::classifier::{AuthRequiredPhrase, Classifier, IpParser, RejectionDetector};
use crate::proxy::models::ProxyAuth;
use reqwest::{Method, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default URL to probe through each proxy
const DEFAULT_URL: &str = "https://google.com";

const DEFAULT_OK_STATUS: u16 = 200;

const DEFAULT_FORBIDDEN_STATUS: u16 = 403;

/// Default timeout for a single probe round trip in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of proxies probed at once.
/// Some proxy services rate-limit a source IP, so keep this low.
const DEFAULT_CONCURRENCY: usize = 2;

/// Default pause before each probe in milliseconds
const DEFAULT_SLEEP_MS: u64 = 1000;

/// Configuration for a checker run
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// URL requested through every proxy
    pub url: String,
    pub method: Method,
    /// Status that marks a working proxy
    pub ok_status: u16,
    /// Status that marks a blocked proxy
    pub forbidden_status: u16,
    /// Credentials for the proxy service under test
    pub auth: Option<ProxyAuth>,
    /// Deadline for one whole probe round trip
    pub timeout: Duration,
    /// Print transport lifecycle events to stdout
    pub trace: bool,
    /// Print each result as soon as it completes
    pub realtime: bool,
    /// Maximum number of probes in flight
    pub concurrency: usize,
    /// Pause taken after admission and before each probe
    pub sleep: Duration,
    pub ip_parser: IpParser,
    pub rejection: Arc<dyn RejectionDetector>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            method: Method::GET,
            ok_status: DEFAULT_OK_STATUS,
            forbidden_status: DEFAULT_FORBIDDEN_STATUS,
            auth: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            trace: false,
            realtime: false,
            concurrency: DEFAULT_CONCURRENCY,
            sleep: Duration::from_millis(DEFAULT_SLEEP_MS),
            ip_parser: IpParser::default(),
            rejection: Arc::new(AuthRequiredPhrase),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_ok_status(mut self, status: u16) -> Self {
        self.ok_status = status;
        self
    }

    pub fn with_forbidden_status(mut self, status: u16) -> Self {
        self.forbidden_status = status;
        self
    }

    pub fn with_auth(mut self, username: String, password: String) -> Self {
        self.auth = Some(ProxyAuth::new(username, password));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn with_ip_parser(mut self, ip_parser: IpParser) -> Self {
        self.ip_parser = ip_parser;
        self
    }

    pub fn with_rejection_detector(mut self, rejection: Arc<dyn RejectionDetector>) -> Self {
        self.rejection = rejection;
        self
    }

    /// Parse an HTTP method name such as `GET` or `HEAD`.
    pub fn parse_method(method: &str) -> Result<Method, ConfigError> {
        Method::from_bytes(method.as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(method.to_string()))
    }

    /// Check the configuration before any probe is issued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        for status in [self.ok_status, self.forbidden_status] {
            StatusCode::from_u16(status).map_err(|_| ConfigError::InvalidStatus(status))?;
        }

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ConcurrencyTooLarge {
                requested: self.concurrency,
                max: Semaphore::MAX_PERMITS,
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    /// Classifier matching this configuration
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.ok_status, self.forbidden_status)
            .with_ip_parser(Arc::new(self.ip_parser))
            .with_rejection_detector(Arc::clone(&self.rejection))
    }
}
