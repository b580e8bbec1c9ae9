use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::Serialize;

use crate::monitoring::heartbeat::HeartbeatTable;
use crate::monitoring::types::{ServiceKind, Target};
use crate::monitoring::uptime::UptimeRecord;

struct BoardInner {
    live: HashMap<String, bool>,
    uptime: HashMap<String, UptimeRecord>,
}

/// Shared view of the monitoring state.
///
/// The scheduler is the only writer of the live/uptime stores; the
/// heartbeat listeners own their table. Everyone else only ever reads,
/// through `snapshot()`. Lock sections are short and never held across an
/// await.
#[derive(Clone)]
pub struct StatusBoard {
    targets: Arc<Vec<Target>>,
    heartbeats: HeartbeatTable,
    inner: Arc<RwLock<BoardInner>>,
}

impl StatusBoard {
    /// Every target starts offline: never confirmed alive counts as down.
    pub fn new(targets: Vec<Target>, heartbeats: HeartbeatTable) -> Self {
        let now = SystemTime::now();
        let live = targets.iter().map(|t| (t.name.clone(), false)).collect();
        let uptime = targets.iter().map(|t| (t.name.clone(), UptimeRecord::new(now))).collect();
        Self {
            targets: Arc::new(targets),
            heartbeats,
            inner: Arc::new(RwLock::new(BoardInner { live, uptime })),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Fold a poll-tick sample into the ledger and the live store.
    /// Returns true when the target transitioned.
    pub fn apply_sample(&self, name: &str, alive: bool, now: SystemTime) -> bool {
        let mut inner = self.inner.write().expect("status board poisoned");
        if let Some(record) = inner.uptime.get_mut(name) {
            record.update(alive, now);
        }
        match inner.live.get_mut(name) {
            Some(current) if *current != alive => {
                *current = alive;
                true
            }
            _ => false,
        }
    }

    /// Out-of-band status write for the heartbeat push path. The ledger is
    /// untouched: it is a poll-tick time integral, and crediting time from
    /// before the beat arrived would count a known-offline interval.
    pub fn apply_status(&self, name: &str, alive: bool) -> bool {
        let mut inner = self.inner.write().expect("status board poisoned");
        match inner.live.get_mut(name) {
            Some(current) if *current != alive => {
                *current = alive;
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.inner.read().expect("status board poisoned").live.get(name).copied().unwrap_or(false)
    }

    #[cfg(test)]
    pub fn uptime_record(&self, name: &str) -> Option<UptimeRecord> {
        self.inner.read().expect("status board poisoned").uptime.get(name).cloned()
    }

    /// Build an immutable snapshot of the current state. Callable at any
    /// time, independent of the tick cycle.
    pub fn snapshot(&self) -> StatusSnapshot {
        let now = SystemTime::now();
        let inner = self.inner.read().expect("status board poisoned");

        let services: Vec<ServiceView> = self
            .targets
            .iter()
            .map(|target| {
                let online = inner.live.get(&target.name).copied().unwrap_or(false);
                let uptime = inner
                    .uptime
                    .get(&target.name)
                    .map(|record| record.display(online, now))
                    .unwrap_or_else(|| "0s".to_string());
                let last_heartbeat = match target.kind {
                    ServiceKind::Heartbeat => {
                        self.heartbeats.last_beat(&target.name).map(epoch_millis)
                    }
                    _ => None,
                };

                ServiceView {
                    name: target.name.clone(),
                    kind: target.kind,
                    category: target.category.clone(),
                    online,
                    uptime,
                    icon: target.kind.icon(),
                    last_heartbeat,
                    description: target.description.clone(),
                    link: target.link.clone(),
                }
            })
            .collect();

        let online = services.iter().filter(|s| s.online).count();
        let total = services.len();

        StatusSnapshot {
            services,
            summary: Summary { online, total, generated_at: Utc::now().to_rfc3339() },
        }
    }
}

fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// One target as consumers see it.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub kind: ServiceKind,
    pub category: String,
    pub online: bool,
    pub uptime: String,
    pub icon: &'static str,
    /// Epoch milliseconds of the last inbound beat; heartbeat targets only.
    pub last_heartbeat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub online: usize,
    pub total: usize,
    pub generated_at: String,
}

/// Immutable status snapshot handed to every consumer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub services: Vec<ServiceView>,
    pub summary: Summary,
}
