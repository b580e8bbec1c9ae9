use anyhow::Result;
use tracing::warn;

use super::checker::{
    Checker, HeartbeatChecker, HttpChecker, RelayChecker, TcpChecker, HTTP_TIMEOUT, TCP_TIMEOUT,
};
use super::heartbeat::HeartbeatTable;
use super::types::{CheckResult, ServiceKind, Target};

/// Executes individual probes, dispatching each target to the checker its
/// kind selects.
pub struct ProbeExecutor {
    heartbeat_checker: HeartbeatChecker,
    tcp_checker: TcpChecker,
    http_checker: HttpChecker,
    relay_checker: RelayChecker,
}

impl ProbeExecutor {
    pub fn new(table: HeartbeatTable) -> Result<Self> {
        Ok(Self {
            heartbeat_checker: HeartbeatChecker::new(table),
            tcp_checker: TcpChecker::new(TCP_TIMEOUT),
            http_checker: HttpChecker::new(HTTP_TIMEOUT)?,
            relay_checker: RelayChecker::new()?,
        })
    }

    /// Probe one target. Total: every probe fault is folded into an offline
    /// result here, so a bad target can never stall or abort a tick.
    pub async fn execute(&self, target: &Target) -> CheckResult {
        let checker: &dyn Checker = match target.kind {
            ServiceKind::Heartbeat => &self.heartbeat_checker,
            ServiceKind::Port => &self.tcp_checker,
            ServiceKind::Http => &self.http_checker,
            ServiceKind::Relay => &self.relay_checker,
        };

        match checker.check(target).await {
            Ok(result) => result,
            Err(err) => {
                warn!(target_name = %target.name, kind = %target.kind, "probe failed: {err}");
                CheckResult::offline(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn heartbeat_target(name: &str) -> Target {
        Target {
            name: name.into(),
            kind: ServiceKind::Heartbeat,
            category: "services".into(),
            host: None,
            port: Some(25579),
            url: None,
            description: None,
            link: None,
        }
    }

    #[tokio::test]
    async fn dispatches_heartbeat_kind_to_the_passive_checker() {
        let table = HeartbeatTable::new();
        table.record("bot", SystemTime::now());
        let executor = ProbeExecutor::new(table).unwrap();

        let result = executor.execute(&heartbeat_target("bot")).await;
        assert!(result.alive);
        // Passive lookup performs no round-trip.
        assert!(result.latency_ms.is_none());
    }

    #[tokio::test]
    async fn probe_fault_becomes_offline_result() {
        let executor = ProbeExecutor::new(HeartbeatTable::new()).unwrap();
        // A port target without host:port trips the internal-fault path.
        let broken = Target {
            name: "broken".into(),
            kind: ServiceKind::Port,
            category: "games".into(),
            host: None,
            port: None,
            url: None,
            description: None,
            link: None,
        };

        let result = executor.execute(&broken).await;
        assert!(!result.alive);
        assert!(result.detail.as_deref().unwrap().contains("probe fault"));
    }
}
