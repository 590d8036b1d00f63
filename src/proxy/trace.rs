//! Probe lifecycle tracing
//!
//! A debugging aid enabled with `--trace`. Events are printed as they happen
//! and never influence classification. DNS events come from a resolver that
//! wraps the system lookup for the proxy host; IP literals skip resolution,
//! so they produce no DNS events. Raw header and body writes are logged by
//! reqwest under the `reqwest::connect::verbose` target, which the binary
//! raises to trace level and sends to stdout when `--trace` is set.

use crate::proxy::models::Proxy;
use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// One observable step of a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// The request is about to ask the pool for a connection to the proxy.
    /// There is no matching event for when the connection is handed over.
    GetConn { proxy_addr: String },
    DnsStart { host: String },
    DnsDone { addrs: Vec<SocketAddr> },
    DnsFailed { error: String },
    /// Response headers arrived.
    GotFirstResponseByte { status: u16 },
    BodyRead { bytes: usize },
    BodySkipped,
    RequestFailed { error: String },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::GetConn { proxy_addr } => write!(f, "GetConn {}", proxy_addr),
            TraceEvent::DnsStart { host } => write!(f, "DNSStart {}", host),
            TraceEvent::DnsDone { addrs } => {
                let addrs: Vec<String> = addrs.iter().map(ToString::to_string).collect();
                write!(f, "DNSDone [{}]", addrs.join(" "))
            }
            TraceEvent::DnsFailed { error } => write!(f, "DNSDone error {}", error),
            TraceEvent::GotFirstResponseByte { status } => {
                write!(f, "GotFirstResponseByte status {}", status)
            }
            TraceEvent::BodyRead { bytes } => write!(f, "BodyRead {} bytes", bytes),
            TraceEvent::BodySkipped => write!(f, "BodySkipped"),
            TraceEvent::RequestFailed { error } => write!(f, "RequestFailed {}", error),
        }
    }
}

/// Receives trace events for a probe.
pub trait TraceSink: Send + Sync {
    fn record(&self, proxy: &Proxy, event: &TraceEvent);
}

/// Prints each event on its own stdout line
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutTrace;

impl TraceSink for StdoutTrace {
    fn record(&self, proxy: &Proxy, event: &TraceEvent) {
        println!("[{}] {}", proxy, event);
    }
}

/// System resolver that reports lookups to a [`TraceSink`]
pub struct TracingResolver {
    proxy: Proxy,
    sink: Arc<dyn TraceSink>,
}

impl TracingResolver {
    pub fn new(proxy: Proxy, sink: Arc<dyn TraceSink>) -> Self {
        Self { proxy, sink }
    }
}

impl Resolve for TracingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let proxy = self.proxy.clone();
        let sink = Arc::clone(&self.sink);

        Box::pin(async move {
            let host = name.as_str().to_string();
            sink.record(&proxy, &TraceEvent::DnsStart { host: host.clone() });

            match tokio::net::lookup_host(format!("{}:0", host)).await {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    sink.record(&proxy, &TraceEvent::DnsDone { addrs: addrs.clone() });
                    let addrs: Addrs = Box::new(addrs.into_iter());
                    Ok(addrs)
                }
                Err(e) => {
                    sink.record(&proxy, &TraceEvent::DnsFailed { error: e.to_string() });
                    Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        assert_eq!(
            TraceEvent::GetConn {
                proxy_addr: "10.0.0.1:3128".to_string()
            }
            .to_string(),
            "GetConn 10.0.0.1:3128"
        );
        assert_eq!(
            TraceEvent::DnsDone {
                addrs: vec!["127.0.0.1:0".parse().unwrap()]
            }
            .to_string(),
            "DNSDone [127.0.0.1:0]"
        );
        assert_eq!(
            TraceEvent::GotFirstResponseByte { status: 200 }.to_string(),
            "GotFirstResponseByte status 200"
        );
    }
}
