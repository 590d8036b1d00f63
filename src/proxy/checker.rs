//! Proxy checker: runs probes over a proxy list with bounded concurrency

use crate::error::ConfigError;
use crate::proxy::config::CheckerConfig;
use crate::proxy::executor::{HttpProber, Prober};
use crate::proxy::models::{Proxy, ProxyResult};
use crate::proxy::progress::Progress;
use futures::future::join_all;
use log::{debug, info, warn};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Proxy checker for validating proxies
pub struct ProxyChecker {
    config: CheckerConfig,
    prober: Arc<dyn Prober>,
}

impl ProxyChecker {
    /// Create a checker that probes over HTTP
    pub fn new(config: CheckerConfig) -> Result<Self, ConfigError> {
        let prober = Arc::new(HttpProber::new(config.clone()));
        Self::with_prober(config, prober)
    }

    /// Create a checker around any [`Prober`]
    pub fn with_prober(
        config: CheckerConfig,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, prober })
    }

    /// Check every proxy, reporting progress on stdout.
    ///
    /// Results come back in input order; see [`sort_results`](crate::proxy::sort_results)
    /// for the report order.
    pub async fn check_proxies(&self, proxies: Vec<Proxy>) -> Vec<ProxyResult> {
        let progress = Progress::stdout(proxies.len(), self.config.realtime);
        self.run(proxies, progress).await
    }

    /// Like [`check_proxies`](Self::check_proxies) but progress goes to `out`.
    pub async fn check_proxies_with_output(
        &self,
        proxies: Vec<Proxy>,
        out: Box<dyn Write + Send>,
    ) -> Vec<ProxyResult> {
        let progress = Progress::new(proxies.len(), self.config.realtime, out);
        self.run(proxies, progress).await
    }

    async fn run(&self, proxies: Vec<Proxy>, progress: Progress) -> Vec<ProxyResult> {
        info!(
            "checking {} proxies, concurrency {}, delay {:?}",
            proxies.len(),
            self.config.concurrency,
            self.config.sleep
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let progress = Arc::new(progress);
        let delay = self.config.sleep;

        // Every task is spawned up front and waits on the semaphore.
        let handles: Vec<_> = proxies
            .iter()
            .cloned()
            .map(|proxy| {
                let semaphore = Arc::clone(&semaphore);
                let progress = Arc::clone(&progress);
                let prober = Arc::clone(&self.prober);

                tokio::spawn(async move {
                    let result = match semaphore.acquire().await {
                        Ok(_permit) => {
                            tokio::time::sleep(delay).await;
                            prober.probe(&proxy).await
                        }
                        Err(e) => {
                            ProxyResult::failed(proxy, 0, format!("admission gate closed: {}", e))
                        }
                    };
                    debug!("{}", result);
                    progress.complete(&result);
                    result
                })
            })
            .collect();

        // join_all keeps input order, so slot i always holds proxy i.
        let results = join_all(handles)
            .await
            .into_iter()
            .zip(proxies)
            .map(|(joined, proxy)| match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("probe task for {} did not finish: {}", proxy, e);
                    let result =
                        ProxyResult::failed(proxy, 0, format!("probe task failed: {}", e));
                    progress.complete(&result);
                    result
                }
            })
            .collect();

        progress.finish();
        results
    }
}
