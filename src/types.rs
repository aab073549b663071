use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// WebSocket Error Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WsErrorKind {
    ConnectFailed,
    HandshakeFailed,
    Timeout,
    ConnectionClosed,
    SendFailed,
    ProtocolError,
    Tls,
    Other,
}

impl WsErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WsErrorKind::ConnectFailed => "connect_failed",
            WsErrorKind::HandshakeFailed => "handshake_failed",
            WsErrorKind::Timeout => "timeout",
            WsErrorKind::ConnectionClosed => "connection_closed",
            WsErrorKind::SendFailed => "send_failed",
            WsErrorKind::ProtocolError => "protocol_error",
            WsErrorKind::Tls => "tls",
            WsErrorKind::Other => "other",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            WsErrorKind::ConnectFailed => "check server is running and URL is correct",
            WsErrorKind::HandshakeFailed => "server may not support WebSocket or rejected the origin",
            WsErrorKind::Timeout => "try increasing --connect-timeout",
            WsErrorKind::ConnectionClosed => "server closed connection unexpectedly",
            WsErrorKind::SendFailed => "failed to send message",
            WsErrorKind::ProtocolError => "WebSocket protocol error",
            WsErrorKind::Tls => "try ws:// instead of wss://",
            WsErrorKind::Other => "",
        }
    }
}

impl fmt::Display for WsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Test Phases
// ============================================================================

/// Operator-driven phase of a run. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    #[default]
    Initializing,
    CreatingConnections,
    StartingTraffic,
    RetractingConnections,
}

impl Phase {
    /// Label pushed to observers in the `state` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::CreatingConnections => "Creating connections",
            Phase::StartingTraffic => "Starting Traffic",
            Phase::RetractingConnections => "Retracting connections",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Telemetry Snapshot
// ============================================================================

/// Wire shape of one telemetry frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub state: String,
    pub standby: u64,
    pub active_connections: u64,
    pub failed_connections: u64,
    pub failed_requests: u64,
    pub successful_requests: u64,
    pub graceful_close: u64,
    pub error_close: u64,
}

// ============================================================================
// Harness Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub url: String,
    pub origin: Option<String>,
    pub headers: Vec<(String, String)>,
    pub payload: String,
    pub rate: u32, // total requests/sec across all connections, 0 = full throttle
    pub connections: u64,
    pub duration: Duration,
    pub connect_timeout: Duration,
    pub http_addr: String,
    pub stats_interval: Duration,
    pub ping_period: Duration,
    pub pong_wait: Duration,
    pub write_wait: Duration,
    pub dest: PathBuf,
    pub percentile_ticks: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            origin: None,
            headers: Vec::new(),
            payload: String::new(),
            rate: 0,
            connections: 1000,
            duration: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            http_addr: "0.0.0.0:80".to_string(),
            stats_interval: Duration::from_secs(2),
            ping_period: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            dest: PathBuf::from("result.txt"),
            percentile_ticks: 5,
        }
    }
}

impl HarnessConfig {
    pub fn telemetry(&self) -> TelemetrySettings {
        TelemetrySettings {
            stats_interval: self.stats_interval,
            ping_period: self.ping_period,
            pong_wait: self.pong_wait,
            write_wait: self.write_wait,
        }
    }
}

/// Timing knobs for one observation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub stats_interval: Duration,
    pub ping_period: Duration,
    pub pong_wait: Duration,
    pub write_wait: Duration,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        HarnessConfig::default().telemetry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Initializing < Phase::CreatingConnections);
        assert!(Phase::CreatingConnections < Phase::StartingTraffic);
        assert!(Phase::StartingTraffic < Phase::RetractingConnections);
    }

    #[test]
    fn snapshot_serializes_with_wire_field_names() {
        let snapshot = StatsSnapshot {
            state: Phase::StartingTraffic.as_str().to_string(),
            standby: 1,
            active_connections: 2,
            failed_connections: 3,
            failed_requests: 4,
            successful_requests: 5,
            graceful_close: 6,
            error_close: 7,
        };

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "Starting Traffic");
        assert_eq!(json["standby"], 1);
        assert_eq!(json["active_connections"], 2);
        assert_eq!(json["failed_connections"], 3);
        assert_eq!(json["failed_requests"], 4);
        assert_eq!(json["successful_requests"], 5);
        assert_eq!(json["graceful_close"], 6);
        assert_eq!(json["error_close"], 7);
        assert_eq!(json.as_object().unwrap().len(), 8);
    }

    #[test]
    fn default_ping_period_is_under_pong_wait() {
        let settings = TelemetrySettings::default();
        assert!(settings.ping_period < settings.pong_wait);
    }
}
