//! Probe executor: one HTTP request through one proxy

use crate::proxy::classifier::{
    BodyRead, Classifier, FailureKind, ProbeOutcome, ProbeResponse, TransportFailure,
};
use crate::proxy::config::CheckerConfig;
use crate::proxy::models::{is_socks, Proxy, ProxyResult};
use crate::proxy::trace::{StdoutTrace, TraceEvent, TraceSink, TracingResolver};
use futures::future::BoxFuture;
use log::debug;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::Arc;
use std::time::Instant;

/// Something that can probe a proxy and classify the outcome.
///
/// The scheduler only depends on this trait, so tests can substitute a
/// prober that never touches the network.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, proxy: &'a Proxy) -> BoxFuture<'a, ProxyResult>;
}

/// Probes proxies with a real HTTP request
pub struct HttpProber {
    config: CheckerConfig,
    classifier: Classifier,
    trace: Option<Arc<dyn TraceSink>>,
}

impl HttpProber {
    pub fn new(config: CheckerConfig) -> Self {
        let classifier = config.classifier();
        let trace: Option<Arc<dyn TraceSink>> = if config.trace {
            Some(Arc::new(StdoutTrace))
        } else {
            None
        };

        Self {
            config,
            classifier,
            trace,
        }
    }

    /// Send trace events somewhere other than stdout.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Issue the probe request and collect the raw outcome.
    ///
    /// The body is only read when the status differs from the success status.
    pub async fn execute(&self, proxy: &Proxy) -> ProbeOutcome {
        let (client, proxy_addr) = match self.create_client(proxy) {
            Ok(built) => built,
            Err(failure) => {
                debug!("could not build client for {}: {}", proxy, failure.message);
                return ProbeOutcome::Failed(failure);
            }
        };

        let request = client.request(self.config.method.clone(), &self.config.url);

        self.emit(proxy, TraceEvent::GetConn { proxy_addr });
        let start = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let failure = TransportFailure::from_reqwest(&e);
                self.emit(
                    proxy,
                    TraceEvent::RequestFailed {
                        error: failure.message.clone(),
                    },
                );
                return ProbeOutcome::Failed(failure);
            }
        };

        let status = response.status().as_u16();
        self.emit(proxy, TraceEvent::GotFirstResponseByte { status });
        let headers = response.headers().clone();

        let body = if status == self.config.ok_status {
            self.emit(proxy, TraceEvent::BodySkipped);
            BodyRead::Skipped
        } else {
            match response.text().await {
                Ok(text) => {
                    self.emit(proxy, TraceEvent::BodyRead { bytes: text.len() });
                    BodyRead::Complete(text)
                }
                Err(e) => {
                    let failure = TransportFailure::from_reqwest(&e);
                    self.emit(
                        proxy,
                        TraceEvent::RequestFailed {
                            error: failure.message.clone(),
                        },
                    );
                    BodyRead::Failed(failure.message)
                }
            }
        };

        ProbeOutcome::Responded(ProbeResponse {
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }

    /// Build a client whose proxy resolution always routes through `proxy`.
    ///
    /// Returns the client and the proxy address used for tracing.
    fn create_client(&self, proxy: &Proxy) -> Result<(Client, String), TransportFailure> {
        let proxy_url = proxy
            .url(self.config.auth.as_ref())
            .map_err(|e| TransportFailure::new(FailureKind::Build, e.to_string()))?;

        let proxy_addr = format!(
            "{}:{}",
            proxy_url.host_str().unwrap_or_default(),
            proxy_url.port_or_known_default().unwrap_or_default()
        );

        let target = proxy_url.clone();
        let mut reqwest_proxy = ReqwestProxy::custom(move |_url| Some(target.clone()));
        if let Some(auth) = self.config.auth.as_ref().filter(|_| !is_socks(&proxy_url)) {
            reqwest_proxy = reqwest_proxy.basic_auth(&auth.username, &auth.password);
        }

        let mut builder = Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout);

        if let Some(sink) = &self.trace {
            builder = builder
                .dns_resolver(Arc::new(TracingResolver::new(proxy.clone(), Arc::clone(sink))))
                .connection_verbose(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportFailure::from_error(FailureKind::Build, &e))?;

        Ok((client, proxy_addr))
    }

    fn emit(&self, proxy: &Proxy, event: TraceEvent) {
        if let Some(sink) = &self.trace {
            sink.record(proxy, &event);
        }
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, proxy: &'a Proxy) -> BoxFuture<'a, ProxyResult> {
        Box::pin(async move {
            let outcome = self.execute(proxy).await;
            self.classifier.classify(proxy, &outcome)
        })
    }
}
