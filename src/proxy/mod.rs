//! Proxy module for probing proxies and reporting the outcome
//!
//! This module provides functionality for:
//! - Classifying a probe outcome into a [`ResultState`]
//! - Sending one probe request through a proxy
//! - Running probes over a proxy list with bounded concurrency
//! - Sorting and rendering the final report

pub mod checker;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod models;
pub mod parser;
pub mod progress;
pub mod report;
pub mod trace;

pub use checker::ProxyChecker;
pub use classifier::{
    AuthRequiredPhrase, BodyIpExtractor, BodyRead, Classifier, FailureKind, IpExtractor, IpParser,
    ProbeOutcome, ProbeResponse, RejectionDetector, TransportFailure,
};
pub use config::CheckerConfig;
pub use executor::{HttpProber, Prober};
pub use models::{Proxy, ProxyAuth, ProxyResult, ProxyUrlError, ResultState};
pub use parser::ProxyParser;
pub use progress::Progress;
pub use report::{render_json_lines, render_lines, sort_results};
pub use trace::{StdoutTrace, TraceEvent, TraceSink, TracingResolver};
