use std::time::{Duration, SystemTime};

/// Accumulated uptime for one target.
///
/// `total_online` is a time integral over the sample stream: it advances by
/// the elapsed wall-time between samples only when the target is online at
/// the newer sample, and never across a known-offline interval.
#[derive(Debug, Clone)]
pub struct UptimeRecord {
    pub first_online: Option<SystemTime>,
    pub last_online: Option<SystemTime>,
    pub total_online: Duration,
    pub last_sample: SystemTime,
}

impl UptimeRecord {
    pub fn new(now: SystemTime) -> Self {
        Self { first_online: None, last_online: None, total_online: Duration::ZERO, last_sample: now }
    }

    /// Fold one alive/dead sample into the record. Runs on every poll tick
    /// for every target, transition or not.
    pub fn update(&mut self, online: bool, now: SystemTime) {
        let elapsed = now.duration_since(self.last_sample).unwrap_or(Duration::ZERO);
        if online {
            self.total_online += elapsed;
            self.last_online = Some(now);
            if self.first_online.is_none() {
                self.first_online = Some(now);
            }
        }
        self.last_sample = now;
    }

    /// Render the accumulated uptime as the largest two non-zero units.
    ///
    /// While online, the interval since the last sample counts as live time.
    pub fn display(&self, online: bool, now: SystemTime) -> String {
        if self.first_online.is_none() {
            return "0s".to_string();
        }

        let mut total = self.total_online;
        if online {
            total += now.duration_since(self.last_sample).unwrap_or(Duration::ZERO);
        }

        let seconds = total.as_secs();
        let days = seconds / 86_400;
        let hours = (seconds % 86_400) / 3_600;
        let minutes = (seconds % 3_600) / 60;

        if days > 0 {
            format!("{days}d {hours}h")
        } else if hours > 0 {
            format!("{hours}h {minutes}m")
        } else if minutes > 0 {
            format!("{minutes}m")
        } else {
            format!("{seconds}s")
        }
    }
}
