//! In-process harness: one service, one in-memory listener, one client.

use crate::client::PluginClient;
use crate::error::{HarnessError, HarnessResult};
use crate::listener;
use crate::server;
use costsource_types::CostSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Harness tuning.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Per-call timeout handed to the client.
    pub default_timeout: Duration,
    /// How long `start` waits for the server to accept the client.
    pub handshake_timeout: Duration,
    /// Pending connections the listener queues.
    pub backlog: usize,
    /// In-flight frames buffered per connection.
    pub frame_buffer: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            backlog: 16,
            frame_buffer: 256,
        }
    }
}

struct Running {
    client: PluginClient,
    // Held so the listener stays open for the lifetime of the run.
    dialer: listener::Dialer,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
}

/// Isolated server/client pair around one [`CostSource`].
///
/// Nothing is shared between harness instances: each `start` binds a fresh
/// listener. Dropping a started harness without `stop` aborts its server.
pub struct InProcessHarness {
    service: Arc<dyn CostSource>,
    config: HarnessConfig,
    running: Option<Running>,
}

impl InProcessHarness {
    /// Harness with default configuration.
    pub fn new(service: Arc<dyn CostSource>) -> Self {
        Self {
            service,
            config: HarnessConfig::default(),
            running: None,
        }
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Client of the running harness, if started.
    pub fn client(&self) -> Option<&PluginClient> {
        self.running.as_ref().map(|r| &r.client)
    }

    /// Bind the listener, spawn the serving loop and dial a client.
    ///
    /// Returns once the server has accepted the client, so the client can
    /// make calls immediately.
    pub async fn start(&mut self) -> HarnessResult<PluginClient> {
        if self.running.is_some() {
            return Err(HarnessError::AlreadyStarted);
        }

        let (dialer, listener) = listener::bind(self.config.backlog, self.config.frame_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(server::serve(self.service.clone(), listener, shutdown_rx));

        let connection = match dialer.dial(self.config.handshake_timeout).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(error = %e, "In-process transport setup failed");
                let _ = shutdown_tx.send(true);
                server.abort();
                return Err(e);
            }
        };

        let client = PluginClient::new(connection.frames, self.config.default_timeout);
        tracing::info!(connection = connection.id, "In-process harness started");

        self.running = Some(Running {
            client: client.clone(),
            dialer,
            shutdown: shutdown_tx,
            server,
        });
        Ok(client)
    }

    /// Dial an additional client against the running server.
    pub async fn connect(&self) -> HarnessResult<PluginClient> {
        let running = self.running.as_ref().ok_or(HarnessError::ListenerClosed)?;
        let connection = running.dialer.dial(self.config.handshake_timeout).await?;
        Ok(PluginClient::new(
            connection.frames,
            self.config.default_timeout,
        ))
    }

    /// Close the client, then halt the server.
    ///
    /// Idempotent; a no-op on a harness that never started.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.client.close();
        drop(running.client);
        drop(running.dialer);

        let _ = running.shutdown.send(true);
        if let Err(e) = running.server.await {
            if e.is_panic() {
                tracing::error!("In-process server panicked during shutdown");
            }
        }
        tracing::info!("In-process harness stopped");
    }
}

impl Drop for InProcessHarness {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.client.close();
            let _ = running.shutdown.send(true);
            running.server.abort();
        }
    }
}

impl std::fmt::Debug for InProcessHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessHarness")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Builder that checks its preconditions up front.
#[derive(Default)]
pub struct HarnessBuilder {
    service: Option<Arc<dyn CostSource>>,
    config: HarnessConfig,
}

impl HarnessBuilder {
    pub fn service(mut self, service: Arc<dyn CostSource>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails with [`HarnessError::MissingService`] when no service was given.
    pub fn build(self) -> HarnessResult<InProcessHarness> {
        let service = self.service.ok_or(HarnessError::MissingService)?;
        Ok(InProcessHarness {
            service,
            config: self.config,
            running: None,
        })
    }
}
