//! Classification of raw probe outcomes into result states
//!
//! Everything in here is a pure function of its inputs: the probe executor
//! gathers a [`ProbeOutcome`] and hands it to a [`Classifier`], which never
//! touches the network or any shared state.

use crate::error::ConfigError;
use crate::proxy::models::{Proxy, ProxyResult};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Permissive IPv4 shape: four dot-separated groups of one to three digits.
/// Groups above 255 are not rejected.
static IPV4_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}")
        .expect("IPv4 pattern is a valid regex")
});

/// Why a probe failed before any response was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request or the client could not be constructed.
    Build,
    /// The configured deadline expired.
    Timeout,
    /// Any other connection or protocol failure.
    Transport,
}

/// A transport-level failure with its full error chain flattened to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: FailureKind,
    /// Human readable message including every cause.
    pub message: String,
    /// Text of each error in the source chain, outermost first.
    pub causes: Vec<String>,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            causes: vec![message.clone()],
            message,
        }
    }

    /// Flatten an error and its sources.
    pub fn from_error(kind: FailureKind, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        // Some error types already print their source, skip repeats.
        let mut message = causes[0].clone();
        for cause in &causes[1..] {
            if !message.contains(cause.as_str()) {
                message.push_str(": ");
                message.push_str(cause);
            }
        }

        Self {
            kind,
            message,
            causes,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_builder() {
            FailureKind::Build
        } else {
            FailureKind::Transport
        };
        Self::from_error(kind, err)
    }
}

/// What became of the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRead {
    /// Not read: the status already decided the result.
    Skipped,
    Complete(String),
    Failed(String),
}

/// A response received through the proxy
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyRead,
    pub elapsed: Duration,
}

/// Everything the executor observed for one probe
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Failed(TransportFailure),
    Responded(ProbeResponse),
}

/// Decides whether an outcome means the proxy itself refused us.
pub trait RejectionDetector: Send + Sync + fmt::Debug {
    fn is_rejection(&self, outcome: &ProbeOutcome) -> bool;
}

/// Recognizes a rejected proxy by the "Proxy Authentication Required" phrase.
///
/// Some proxies answer a tunnel request with an undocumented redirect or a
/// 407, and the HTTP stack reports that only as an error carrying this
/// phrase. This is a string match on error text, so it breaks if the
/// transport changes its wording; swap in another [`RejectionDetector`] if so.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequiredPhrase;

impl RejectionDetector for AuthRequiredPhrase {
    fn is_rejection(&self, outcome: &ProbeOutcome) -> bool {
        let Some(phrase) = StatusCode::PROXY_AUTHENTICATION_REQUIRED.canonical_reason() else {
            return false;
        };
        match outcome {
            ProbeOutcome::Failed(failure) => failure
                .causes
                .iter()
                .any(|cause| cause.trim().eq_ignore_ascii_case(phrase)),
            ProbeOutcome::Responded(_) => false,
        }
    }
}

/// Pulls the caller's public IP out of a blocked response.
pub trait IpExtractor: Send + Sync + fmt::Debug {
    fn extract(&self, response: &ProbeResponse, body: &str) -> Option<String>;
}

/// First IPv4-shaped substring of the body
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyIpExtractor;

impl IpExtractor for BodyIpExtractor {
    fn extract(&self, _response: &ProbeResponse, body: &str) -> Option<String> {
        IPV4_PATTERN.find(body).map(|m| m.as_str().to_string())
    }
}

/// IP extraction strategies selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpParser {
    #[default]
    Body,
}

impl IpParser {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "body" => Ok(IpParser::Body),
            other => Err(ConfigError::UnknownIpParser(other.to_string())),
        }
    }
}

impl IpExtractor for IpParser {
    fn extract(&self, response: &ProbeResponse, body: &str) -> Option<String> {
        match self {
            IpParser::Body => BodyIpExtractor.extract(response, body),
        }
    }
}

/// Maps a [`ProbeOutcome`] to a [`ProxyResult`].
#[derive(Debug, Clone)]
pub struct Classifier {
    ok_status: u16,
    forbidden_status: u16,
    ip_parser: Arc<dyn IpExtractor>,
    rejection: Arc<dyn RejectionDetector>,
}

impl Classifier {
    pub fn new(ok_status: u16, forbidden_status: u16) -> Self {
        Self {
            ok_status,
            forbidden_status,
            ip_parser: Arc::new(IpParser::Body),
            rejection: Arc::new(AuthRequiredPhrase),
        }
    }

    pub fn with_ip_parser(mut self, ip_parser: Arc<dyn IpExtractor>) -> Self {
        self.ip_parser = ip_parser;
        self
    }

    pub fn with_rejection_detector(mut self, rejection: Arc<dyn RejectionDetector>) -> Self {
        self.rejection = rejection;
        self
    }

    /// Classify one outcome.
    ///
    /// Precedence: proxy rejection, timeout, other transport failure, success
    /// status, body read failure, blocked status (which needs an IP), then
    /// everything else is an error carrying the body.
    pub fn classify(&self, proxy: &Proxy, outcome: &ProbeOutcome) -> ProxyResult {
        if self.rejection.is_rejection(outcome) {
            return ProxyResult::invalid(proxy.clone());
        }

        let response = match outcome {
            ProbeOutcome::Failed(failure) if failure.kind == FailureKind::Timeout => {
                return ProxyResult::timeout(proxy.clone(), failure.message.clone());
            }
            ProbeOutcome::Failed(failure) => {
                return ProxyResult::failed(proxy.clone(), 0, failure.message.clone());
            }
            ProbeOutcome::Responded(response) => response,
        };

        let status = response.status;
        let elapsed_ms = response.elapsed.as_millis() as u64;

        if status == self.ok_status {
            return ProxyResult::success(proxy.clone(), status).with_response_time(elapsed_ms);
        }

        let body = match &response.body {
            BodyRead::Complete(body) => body.as_str(),
            BodyRead::Skipped => "",
            BodyRead::Failed(err) => {
                return ProxyResult::failed(proxy.clone(), status, err.clone())
                    .with_response_time(elapsed_ms);
            }
        };

        let result = if status == self.forbidden_status {
            match self.ip_parser.extract(response, body) {
                Some(ip) if !ip.is_empty() => ProxyResult::forbidden(proxy.clone(), status, ip),
                _ => ProxyResult::failed(
                    proxy.clone(),
                    status,
                    format!("could not parse IP from {} body", status),
                ),
            }
        } else {
            ProxyResult::failed(
                proxy.clone(),
                status,
                format!("unexpected status, body: {}", body),
            )
        };

        result.with_response_time(elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ResultState;

    fn responded(status: u16, body: BodyRead) -> ProbeOutcome {
        ProbeOutcome::Responded(ProbeResponse {
            status,
            headers: HeaderMap::new(),
            body,
            elapsed: Duration::from_millis(12),
        })
    }

    fn body(text: &str) -> BodyRead {
        BodyRead::Complete(text.to_string())
    }

    #[test]
    fn test_auth_required_error_is_proxy_invalid() {
        let classifier = Classifier::new(200, 403);
        let outcome = ProbeOutcome::Failed(TransportFailure {
            kind: FailureKind::Transport,
            message: "error sending request: proxy authentication required".to_string(),
            causes: vec![
                "error sending request".to_string(),
                "proxy authentication required".to_string(),
            ],
        });

        let result = classifier.classify(&Proxy::new("p"), &outcome);
        assert_eq!(result.state, ResultState::ProxyInvalid);
        assert_eq!(result.status, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_auth_phrase_only_matches_whole_cause() {
        let outcome = ProbeOutcome::Failed(TransportFailure::new(
            FailureKind::Transport,
            "upstream said proxy authentication required twice",
        ));
        assert!(!AuthRequiredPhrase.is_rejection(&outcome));
        assert!(!AuthRequiredPhrase.is_rejection(&responded(407, BodyRead::Skipped)));
    }

    #[test]
    fn test_timeout() {
        let classifier = Classifier::new(200, 403);
        let outcome =
            ProbeOutcome::Failed(TransportFailure::new(FailureKind::Timeout, "operation timed out"));

        let result = classifier.classify(&Proxy::new("p"), &outcome);
        assert_eq!(result.state, ResultState::Timeout);
        assert_eq!(result.error.as_deref(), Some("operation timed out"));
    }

    #[test]
    fn test_transport_error() {
        let classifier = Classifier::new(200, 403);
        let outcome = ProbeOutcome::Failed(TransportFailure::new(
            FailureKind::Transport,
            "tcp connect error: Connection refused",
        ));

        let result = classifier.classify(&Proxy::new("p"), &outcome);
        assert_eq!(result.state, ResultState::Error);
        assert_eq!(result.status, 0);
        assert_eq!(
            result.error.as_deref(),
            Some("tcp connect error: Connection refused")
        );
    }

    #[test]
    fn test_build_failure_is_error() {
        let classifier = Classifier::new(200, 403);
        let outcome = ProbeOutcome::Failed(TransportFailure::new(FailureKind::Build, "bad proxy"));
        let result = classifier.classify(&Proxy::new("p"), &outcome);
        assert_eq!(result.state, ResultState::Error);
    }

    #[test]
    fn test_success_ignores_body() {
        let classifier = Classifier::new(200, 403);

        let result = classifier.classify(&Proxy::new("p"), &responded(200, BodyRead::Skipped));
        assert_eq!(result.state, ResultState::Success);
        assert_eq!(result.status, 200);
        assert_eq!(result.response_time_ms, Some(12));

        let result = classifier.classify(
            &Proxy::new("p"),
            &responded(200, BodyRead::Failed("body broke".to_string())),
        );
        assert_eq!(result.state, ResultState::Success);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_body_read_failure_is_error() {
        let classifier = Classifier::new(200, 403);
        let result = classifier.classify(
            &Proxy::new("p"),
            &responded(403, BodyRead::Failed("connection reset".to_string())),
        );
        assert_eq!(result.state, ResultState::Error);
        assert_eq!(result.status, 403);
        assert_eq!(result.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_forbidden_with_ip() {
        let classifier = Classifier::new(200, 403);
        let result = classifier.classify(
            &Proxy::new("p"),
            &responded(403, body("blocked, your ip is 10.0.0.1 please retry")),
        );
        assert_eq!(result.state, ResultState::Forbidden);
        assert_eq!(result.ip.as_deref(), Some("10.0.0.1"));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_forbidden_without_ip_downgrades_to_error() {
        let classifier = Classifier::new(200, 403);
        let result = classifier.classify(&Proxy::new("p"), &responded(403, body("access denied")));
        assert_eq!(result.state, ResultState::Error);
        assert_eq!(result.status, 403);
        assert!(result.ip.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("could not parse IP from 403 body")
        );
    }

    #[test]
    fn test_unexpected_status_includes_body() {
        let classifier = Classifier::new(200, 403);
        let result =
            classifier.classify(&Proxy::new("p"), &responded(502, body("upstream is down")));
        assert_eq!(result.state, ResultState::Error);
        assert_eq!(result.status, 502);
        assert_eq!(
            result.error.as_deref(),
            Some("unexpected status, body: upstream is down")
        );
    }

    #[test]
    fn test_custom_statuses() {
        let classifier = Classifier::new(204, 451);
        let proxy = Proxy::new("p");

        assert_eq!(
            classifier.classify(&proxy, &responded(204, BodyRead::Skipped)).state,
            ResultState::Success
        );
        assert_eq!(
            classifier.classify(&proxy, &responded(200, body(""))).state,
            ResultState::Error
        );
        assert_eq!(
            classifier.classify(&proxy, &responded(451, body("from 8.8.4.4"))).state,
            ResultState::Forbidden
        );
    }

    #[test]
    fn test_classify_is_repeatable() {
        let classifier = Classifier::new(200, 403);
        let proxy = Proxy::new("p");
        let outcomes = [
            responded(403, body("ip 1.2.3.4")),
            responded(500, body("oops")),
            ProbeOutcome::Failed(TransportFailure::new(FailureKind::Timeout, "timed out")),
        ];

        let first: Vec<_> = outcomes.iter().map(|o| classifier.classify(&proxy, o)).collect();
        let second: Vec<_> = outcomes
            .iter()
            .rev()
            .map(|o| classifier.classify(&proxy, o))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        assert_eq!(first, second);
    }

    #[derive(Debug)]
    struct AlwaysRejected;

    impl RejectionDetector for AlwaysRejected {
        fn is_rejection(&self, _outcome: &ProbeOutcome) -> bool {
            true
        }
    }

    #[test]
    fn test_custom_rejection_detector() {
        let classifier = Classifier::new(200, 403).with_rejection_detector(Arc::new(AlwaysRejected));
        let result = classifier.classify(&Proxy::new("p"), &responded(200, BodyRead::Skipped));
        assert_eq!(result.state, ResultState::ProxyInvalid);
    }

    #[test]
    fn test_body_ip_extraction() {
        let response = ProbeResponse {
            status: 403,
            headers: HeaderMap::new(),
            body: BodyRead::Skipped,
            elapsed: Duration::ZERO,
        };
        let parser = IpParser::Body;

        assert_eq!(
            parser.extract(&response, "blocked, your ip is 10.0.0.1 please retry"),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(
            parser.extract(&response, "first 999.1.22.333 then 1.1.1.1"),
            Some("999.1.22.333".to_string())
        );
        assert_eq!(parser.extract(&response, "no address here, v1.2"), None);
    }

    #[test]
    fn test_ip_parser_names() {
        assert_eq!(IpParser::from_name("body").unwrap(), IpParser::Body);
        assert_eq!(
            IpParser::from_name("json"),
            Err(ConfigError::UnknownIpParser("json".to_string()))
        );
    }

    #[test]
    fn test_failure_from_error_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "proxy authentication required");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        let failure = TransportFailure::from_error(FailureKind::Transport, &outer);

        assert!(failure
            .causes
            .iter()
            .any(|c| c == "proxy authentication required"));
        assert_eq!(failure.message, "proxy authentication required");
    }
}
