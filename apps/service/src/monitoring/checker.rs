use anyhow::Result;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::timeout;

use super::heartbeat::HeartbeatTable;
use super::types::{CheckResult, ProbeError, Target};

/// How recent a heartbeat must be for its target to count as alive.
pub const HEARTBEAT_FRESHNESS: Duration = Duration::from_secs(180);
/// Connect budget for plain TCP probes.
pub const TCP_TIMEOUT: Duration = Duration::from_secs(5);
/// Round-trip budget for HTTP probes, and for the relay probe overall.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack reserved out of the relay budget before the version sub-probe.
const RELAY_SUBPROBE_MARGIN: Duration = Duration::from_secs(2);

/// Checker trait for the different probe protocols.
///
/// Implementations stay total in practice: every failure mode maps to a
/// `ProbeError`, which the executor folds into an offline result.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, target: &Target) -> Result<CheckResult, ProbeError>;
}

/// Passive heartbeat lookup. No network I/O; reads the table the listeners
/// write.
pub struct HeartbeatChecker {
    table: HeartbeatTable,
}

impl HeartbeatChecker {
    pub fn new(table: HeartbeatTable) -> Self {
        Self { table }
    }
}

/// A beat is fresh while its age stays within `HEARTBEAT_FRESHNESS`.
pub fn is_fresh(last_beat: SystemTime, now: SystemTime) -> bool {
    now.duration_since(last_beat).map(|age| age <= HEARTBEAT_FRESHNESS).unwrap_or(true)
}

#[async_trait::async_trait]
impl Checker for HeartbeatChecker {
    async fn check(&self, target: &Target) -> Result<CheckResult, ProbeError> {
        let now = SystemTime::now();
        Ok(match self.table.last_beat(&target.name) {
            Some(beat) if is_fresh(beat, now) => CheckResult::online_passive(),
            Some(_) => CheckResult::offline("heartbeat stale"),
            None => CheckResult::offline("no heartbeat received"),
        })
    }
}

/// TCP port checker: connect, measure, close. No data is exchanged.
pub struct TcpChecker {
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, target: &Target) -> Result<CheckResult, ProbeError> {
        let (host, port) = target.endpoint()?;
        let started = Instant::now();

        let connect = tokio::net::TcpStream::connect((host, port));
        let stream = timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|err| ProbeError::Connect(connect_label(&err)))?;
        drop(stream);

        Ok(CheckResult::online(started.elapsed().as_millis() as u64))
    }
}

fn connect_label(err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => "connection refused".to_string(),
        std::io::ErrorKind::TimedOut => "timeout".to_string(),
        _ => err.to_string(),
    }
}

/// HTTP endpoint checker. Any completed round-trip counts as reachable;
/// only statuses below 400 count as alive.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout_duration).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &Target) -> Result<CheckResult, ProbeError> {
        let url = target.endpoint_url()?;
        let started = Instant::now();

        let response = self.client.get(url).send().await.map_err(classify_request_error)?;
        let latency = started.elapsed().as_millis() as u64;
        let status = response.status().as_u16();

        Ok(if status < 400 {
            CheckResult::online(latency).with_status_code(status)
        } else {
            CheckResult::offline(format!("status {status}")).with_status_code(status)
        })
    }
}

fn classify_request_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else if err.is_connect() {
        ProbeError::Connect(err.to_string())
    } else {
        ProbeError::Http(err.to_string())
    }
}

/// Audio-relay checker: a TCP stage gates a version sub-probe.
///
/// The control port accepting connections is sufficient for liveness even
/// when the protocol layer behind it is not answering yet; the sub-probe
/// only enriches the result with the reported version.
pub struct RelayChecker {
    tcp: TcpChecker,
    client: reqwest::Client,
}

impl RelayChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT - RELAY_SUBPROBE_MARGIN)
            .build()?;
        Ok(Self { tcp: TcpChecker::new(HTTP_TIMEOUT), client })
    }
}

#[async_trait::async_trait]
impl Checker for RelayChecker {
    async fn check(&self, target: &Target) -> Result<CheckResult, ProbeError> {
        let (host, port) = target.endpoint()?;

        let port_check = match self.tcp.check(target).await {
            Ok(result) => result,
            Err(_) => return Ok(CheckResult::offline("port closed")),
        };

        let url = format!("http://{host}:{port}/version");
        let started = Instant::now();
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let latency = started.elapsed().as_millis() as u64;
                let status = response.status().as_u16();
                let mut result = CheckResult::online(latency).with_status_code(status);
                if let Ok(version) = response.text().await {
                    if !version.is_empty() {
                        result = result.with_version(version);
                    }
                }
                Ok(result)
            }
            Ok(_) | Err(_) => Ok(port_check.with_detail("port open, protocol unreachable")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ServiceKind;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn target(kind: ServiceKind, host: Option<&str>, port: Option<u16>, url: Option<String>) -> Target {
        Target {
            name: "probe-me".into(),
            kind,
            category: "services".into(),
            host: host.map(str::to_string),
            port,
            url,
            description: None,
            link: None,
        }
    }

    /// Minimal loopback HTTP responder: one canned response for any request.
    async fn spawn_http_stub(status_line: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    /// A port that accepts and immediately hangs up, so the TCP stage
    /// passes but any HTTP exchange on it fails.
    async fn spawn_mute_listener() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                drop(stream);
            }
        });
        addr
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn heartbeat_freshness_boundary() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert!(is_fresh(t0, t0 + Duration::from_secs(180)));
        assert!(!is_fresh(t0, t0 + Duration::from_secs(181)));
    }

    #[tokio::test]
    async fn heartbeat_without_any_beat_is_offline() {
        let checker = HeartbeatChecker::new(HeartbeatTable::new());
        let target = target(ServiceKind::Heartbeat, None, Some(25579), None);

        let result = checker.check(&target).await.unwrap();
        assert!(!result.alive);
        assert_eq!(result.detail.as_deref(), Some("no heartbeat received"));
    }

    #[tokio::test]
    async fn heartbeat_recent_beat_is_alive() {
        let table = HeartbeatTable::new();
        table.record("probe-me", SystemTime::now());
        let checker = HeartbeatChecker::new(table);
        let target = target(ServiceKind::Heartbeat, None, Some(25579), None);

        let result = checker.check(&target).await.unwrap();
        assert!(result.alive);
    }

    #[tokio::test]
    async fn heartbeat_stale_beat_is_offline() {
        let table = HeartbeatTable::new();
        table.record("probe-me", SystemTime::now() - Duration::from_secs(600));
        let checker = HeartbeatChecker::new(table);
        let target = target(ServiceKind::Heartbeat, None, Some(25579), None);

        let result = checker.check(&target).await.unwrap();
        assert!(!result.alive);
        assert_eq!(result.detail.as_deref(), Some("heartbeat stale"));
    }

    #[tokio::test]
    async fn tcp_check_succeeds_against_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                drop(stream);
            }
        });

        let checker = TcpChecker::new(TCP_TIMEOUT);
        let target = target(ServiceKind::Port, Some("127.0.0.1"), Some(addr.port()), None);
        let result = checker.check(&target).await.unwrap();
        assert!(result.alive);
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn tcp_check_fails_against_closed_port() {
        let port = closed_port().await;
        let checker = TcpChecker::new(TCP_TIMEOUT);
        let target = target(ServiceKind::Port, Some("127.0.0.1"), Some(port), None);

        let err = checker.check(&target).await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect(_)));
    }

    #[tokio::test]
    async fn tcp_check_on_misconfigured_target_is_internal_fault() {
        let checker = TcpChecker::new(TCP_TIMEOUT);
        let target = target(ServiceKind::Port, None, None, None);

        let err = checker.check(&target).await.unwrap_err();
        assert!(matches!(err, ProbeError::Internal(_)));
    }

    #[tokio::test]
    async fn http_check_ok_status_is_alive() {
        let addr = spawn_http_stub("200 OK", "").await;
        let checker = HttpChecker::new(HTTP_TIMEOUT).unwrap();
        let target = target(ServiceKind::Http, None, None, Some(format!("http://{addr}/")));

        let result = checker.check(&target).await.unwrap();
        assert!(result.alive);
        assert_eq!(result.status_code, Some(200));
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn http_check_server_error_is_reachable_but_offline() {
        let addr = spawn_http_stub("500 Internal Server Error", "").await;
        let checker = HttpChecker::new(HTTP_TIMEOUT).unwrap();
        let target = target(ServiceKind::Http, None, None, Some(format!("http://{addr}/")));

        let result = checker.check(&target).await.unwrap();
        assert!(!result.alive);
        assert_eq!(result.status_code, Some(500));
        assert_eq!(result.detail.as_deref(), Some("status 500"));
    }

    #[tokio::test]
    async fn http_check_refused_connection_is_a_connect_error() {
        let port = closed_port().await;
        let checker = HttpChecker::new(HTTP_TIMEOUT).unwrap();
        let target =
            target(ServiceKind::Http, None, None, Some(format!("http://127.0.0.1:{port}/")));

        let err = checker.check(&target).await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect(_)));
    }

    #[tokio::test]
    async fn relay_closed_port_reports_port_closed() {
        let port = closed_port().await;
        let checker = RelayChecker::new().unwrap();
        let target = target(ServiceKind::Relay, Some("127.0.0.1"), Some(port), None);

        let result = checker.check(&target).await.unwrap();
        assert!(!result.alive);
        assert_eq!(result.detail.as_deref(), Some("port closed"));
    }

    #[tokio::test]
    async fn relay_version_subprobe_attaches_payload() {
        let addr = spawn_http_stub("200 OK", "{\"version\":\"4.0.8\"}").await;
        let checker = RelayChecker::new().unwrap();
        let target = target(ServiceKind::Relay, Some("127.0.0.1"), Some(addr.port()), None);

        let result = checker.check(&target).await.unwrap();
        assert!(result.alive);
        assert!(result.version.as_deref().unwrap().contains("4.0.8"));
    }

    #[tokio::test]
    async fn relay_open_port_with_dead_protocol_is_alive_but_degraded() {
        let addr = spawn_mute_listener().await;
        let checker = RelayChecker::new().unwrap();
        let target = target(ServiceKind::Relay, Some("127.0.0.1"), Some(addr.port()), None);

        let result = checker.check(&target).await.unwrap();
        assert!(result.alive);
        assert_eq!(result.detail.as_deref(), Some("port open, protocol unreachable"));
        assert!(result.version.is_none());
    }
}
