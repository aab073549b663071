use crate::engine::counters::CounterRegistry;
use crate::engine::gate::ReleaseGate;
use crate::engine::requester::{Requester, RequesterFactory};
use crate::error::{CloseError, ConnectError, RequestError};
use crate::types::HarnessConfig;
use crate::ws::{WsConnection, connect};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unestablished,
    Standby,
    InFlight,
    Closed,
}

/// Connection settings shared by every worker.
#[derive(Debug)]
struct Target {
    url: String,
    origin: Option<String>,
    headers: Vec<(String, String)>,
    payload: String,
    connect_timeout: Duration,
}

pub struct WsRequesterFactory {
    target: Arc<Target>,
    registry: Arc<CounterRegistry>,
    begin: Arc<ReleaseGate>,
}

impl WsRequesterFactory {
    pub fn new(
        config: &HarnessConfig,
        registry: Arc<CounterRegistry>,
        begin: Arc<ReleaseGate>,
    ) -> Self {
        Self {
            target: Arc::new(Target {
                url: config.url.clone(),
                origin: config.origin.clone(),
                headers: config.headers.clone(),
                payload: config.payload.clone(),
                connect_timeout: config.connect_timeout,
            }),
            registry,
            begin,
        }
    }
}

impl RequesterFactory for WsRequesterFactory {
    type Requester = WsRequester;

    fn get_requester(&self, index: u64) -> WsRequester {
        WsRequester {
            id: index,
            target: self.target.clone(),
            registry: self.registry.clone(),
            begin: self.begin.clone(),
            connection: None,
            state: WorkerState::Unestablished,
        }
    }
}

/// Parks on the begin gate, then writes one fixed payload per request.
pub struct WsRequester {
    id: u64,
    target: Arc<Target>,
    registry: Arc<CounterRegistry>,
    begin: Arc<ReleaseGate>,
    connection: Option<WsConnection>,
    state: WorkerState,
}

impl WsRequester {
    #[cfg(test)]
    pub fn state(&self) -> WorkerState {
        self.state
    }
}

impl Requester for WsRequester {
    async fn setup(&mut self) -> Result<(), ConnectError> {
        let result = connect(
            &self.target.url,
            self.target.origin.as_deref(),
            &self.target.headers,
            self.target.connect_timeout,
        )
        .await;

        match result {
            Ok(conn) => {
                tracing::debug!(
                    "Worker {} connected in {}us",
                    self.id,
                    conn.connect_time_us
                );
                self.connection = Some(conn);
                self.state = WorkerState::Standby;
                self.registry.record_connected();
                Ok(())
            }
            Err(e) => {
                let hint = e.kind().suggestion();
                if hint.is_empty() {
                    tracing::debug!("Worker {} failed to connect: {}", self.id, e);
                } else {
                    tracing::debug!("Worker {} failed to connect: {} ({})", self.id, e, hint);
                }
                self.registry.record_connect_failed();
                Err(e)
            }
        }
    }

    async fn request(&mut self) -> Result<(), RequestError> {
        if self.connection.is_none() {
            return Err(RequestError::NotConnected);
        }

        self.begin.wait().await;
        if self.state == WorkerState::Standby {
            self.state = WorkerState::InFlight;
            self.registry.record_released();
        }

        let Some(conn) = self.connection.as_mut() else {
            return Err(RequestError::NotConnected);
        };
        let result = conn.send(&self.target.payload).await;

        match &result {
            Ok(()) => self.registry.record_request(true),
            Err(e) => {
                tracing::warn!("Worker {} failed to send message on socket: {}", self.id, e);
                self.registry.record_request(false);
            }
        }
        result
    }

    async fn teardown(&mut self) -> Result<(), CloseError> {
        let Some(conn) = self.connection.take() else {
            return Err(CloseError::NotConnected);
        };
        self.state = WorkerState::Closed;

        let result = conn.close().await;
        match &result {
            Ok(()) => self.registry.record_closed(true),
            Err(e) => {
                tracing::warn!("Worker {} failed to shutdown: {}", self.id, e);
                self.registry.record_closed(false);
            }
        }
        result
    }

    fn ready(&self) -> impl Future<Output = ()> + Send {
        let begin = self.begin.clone();
        async move { begin.wait().await }
    }
}
