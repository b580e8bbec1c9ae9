use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probe protocol selector for a monitored target.
///
/// A closed set: the executor matches on it exhaustively, so a new kind
/// cannot be added without wiring a checker for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Push-style target reporting in over a dedicated TCP listen port.
    Heartbeat,
    /// TCP-listening server, probed by connecting to host:port.
    Port,
    /// HTTP endpoint, probed with a GET.
    Http,
    /// Audio-relay server: TCP connect plus a version sub-probe.
    Relay,
}

impl ServiceKind {
    pub fn icon(self) -> &'static str {
        match self {
            ServiceKind::Heartbeat => "🤖",
            ServiceKind::Port => "🖥️",
            ServiceKind::Http => "🌐",
            ServiceKind::Relay => "🎵",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Heartbeat => write!(f, "heartbeat"),
            ServiceKind::Port => write!(f, "port"),
            ServiceKind::Http => write!(f, "http"),
            ServiceKind::Relay => write!(f, "relay"),
        }
    }
}

/// Static configuration entry for one monitored target.
///
/// `name` is the unique key for the process lifetime. Which of the optional
/// fields must be present depends on `kind`; `validation::validate_targets`
/// enforces that at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub kind: ServiceKind,
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Listen port for heartbeat targets, connect port for port/relay targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Target {
    /// host:port pair for connect-style probes.
    pub fn endpoint(&self) -> Result<(&str, u16), ProbeError> {
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) => Ok((host, port)),
            _ => Err(ProbeError::Internal(format!("{} has no host:port", self.name))),
        }
    }

    pub fn endpoint_url(&self) -> Result<&str, ProbeError> {
        self.url
            .as_deref()
            .ok_or_else(|| ProbeError::Internal(format!("{} has no url", self.name)))
    }
}

/// Failure modes a probe can resolve to.
///
/// None of these escape the executor boundary; they all fold into an
/// offline `CheckResult` carrying the rendered label.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    /// Connection refused, DNS failure, unreachable network.
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    Http(String),
    /// A fault inside a probe implementation, e.g. a target missing a field
    /// the validator should have rejected.
    #[error("probe fault: {0}")]
    Internal(String),
}

/// Uniform outcome of one probe against one target.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub alive: bool,

    /// Round-trip time on success; absent when the probe failed before
    /// completing, or for the passive heartbeat lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Failure label, or the relay degraded-case annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Version payload reported by a relay sub-probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CheckResult {
    pub fn online(latency_ms: u64) -> Self {
        Self { alive: true, latency_ms: Some(latency_ms), status_code: None, detail: None, version: None }
    }

    /// Alive without a measured round-trip (passive heartbeat lookup).
    pub fn online_passive() -> Self {
        Self { alive: true, latency_ms: None, status_code: None, detail: None, version: None }
    }

    pub fn offline(label: impl Into<String>) -> Self {
        Self {
            alive: false,
            latency_ms: None,
            status_code: None,
            detail: Some(label.into()),
            version: None,
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}
