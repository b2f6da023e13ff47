//! Scheduler server: dispatcher task plus HTTP and WebSocket listener

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use rainbow_core::SearchConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::dispatcher::Dispatcher;
use crate::error::{Result, ServerError};
use crate::event::DispatcherHandle;
use crate::routes::{create_router, AppState};

/// Queued events before connection tasks start waiting on the dispatcher
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

pub struct SchedulerServer {
    state: AppState,
    addr: SocketAddr,
    dispatcher_task: JoinHandle<()>,
}

impl SchedulerServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn dispatcher(&self) -> DispatcherHandle {
        self.state.dispatcher.clone()
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Run until the process is killed
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// stop the dispatcher
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting rainbow scheduler on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        tracing::info!("Listener closed, stopping dispatcher");
        if self.state.dispatcher.shutdown().await.is_ok() {
            self.dispatcher_task
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))?;
        }
        Ok(())
    }
}

/// Builder for SchedulerServer
pub struct ServerBuilder {
    config: SearchConfig,
    addr: SocketAddr,
    metrics: Option<PrometheusHandle>,
    event_capacity: usize,
}

impl ServerBuilder {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            addr: ([127, 0, 0, 1], 3000).into(),
            metrics: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.addr = ([0, 0, 0, 0], port).into();
        self
    }

    /// Serve `GET /metrics` from this recorder handle
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Validate the configuration and start the dispatcher task
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<SchedulerServer> {
        let dispatcher = Dispatcher::new(&self.config)?;
        let (handle, dispatcher_task) = dispatcher.spawn(self.event_capacity);

        Ok(SchedulerServer {
            state: AppState {
                dispatcher: handle,
                metrics: self.metrics,
            },
            addr: self.addr,
            dispatcher_task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = SearchConfig::default().with_alphabet("aa");
        assert!(matches!(
            ServerBuilder::new(config).build(),
            Err(ServerError::Core(rainbow_core::Error::InvalidAlphabet(_)))
        ));
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let server = ServerBuilder::new(SearchConfig::default()).build().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dispatcher = server.dispatcher();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        assert!(dispatcher.status().await.is_ok());
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(dispatcher.status().await.is_err());
    }
}
