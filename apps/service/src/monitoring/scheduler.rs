use std::time::{Duration, SystemTime};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::executor::ProbeExecutor;
use super::types::ServiceKind;
use crate::bus::StatusBus;
use crate::status::StatusBoard;

const BEAT_CHANNEL_CAPACITY: usize = 64;

/// The monitoring orchestrator.
///
/// One recurring timer drives ticks over the whole target table; a second,
/// slower timer forces a notification even when nothing changed, so
/// slow-moving consumers stay current. Heartbeat listeners push target
/// names in between ticks. Ticks never overlap: the loop awaits each tick
/// before selecting again.
pub struct Scheduler {
    board: StatusBoard,
    bus: StatusBus,
    executor: ProbeExecutor,
    poll_period: Duration,
    refresh_period: Duration,
    beat_tx: mpsc::Sender<String>,
    beat_rx: mpsc::Receiver<String>,
}

impl Scheduler {
    pub fn new(
        board: StatusBoard,
        bus: StatusBus,
        executor: ProbeExecutor,
        poll_period: Duration,
        refresh_period: Duration,
    ) -> Self {
        let (beat_tx, beat_rx) = mpsc::channel(BEAT_CHANNEL_CAPACITY);
        Self { board, bus, executor, poll_period, refresh_period, beat_tx, beat_rx }
    }

    /// Sender handed to heartbeat listeners for the push path.
    pub fn beat_sender(&self) -> mpsc::Sender<String> {
        self.beat_tx.clone()
    }

    pub async fn run(mut self) {
        let mut poll = interval(self.poll_period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh = interval(self.refresh_period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            targets = self.board.targets().len(),
            poll_secs = self.poll_period.as_secs(),
            refresh_secs = self.refresh_period.as_secs(),
            "monitoring started"
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.run_tick().await;
                }
                _ = refresh.tick() => {
                    self.publish_refresh();
                }
                Some(name) = self.beat_rx.recv() => {
                    self.handle_beat(&name).await;
                }
            }
        }
    }

    /// Probe every target once and fold the results in configuration order.
    ///
    /// The ledger is updated for every target whether or not it
    /// transitioned; at most one notification fires per tick, so several
    /// simultaneous flips coalesce into a single snapshot.
    pub async fn run_tick(&self) -> bool {
        let targets = self.board.targets();
        let results = join_all(targets.iter().map(|target| self.executor.execute(target))).await;

        let now = SystemTime::now();
        let mut dirty = false;
        for (target, result) in targets.iter().zip(results) {
            if self.board.apply_sample(&target.name, result.alive, now) {
                info!(
                    target_name = %target.name,
                    online = result.alive,
                    detail = result.detail.as_deref().unwrap_or(""),
                    "status transition"
                );
                dirty = true;
            }
        }

        if dirty {
            self.bus.publish(self.board.snapshot());
        }
        dirty
    }

    /// Forced notification on the slow timer, dirty or not.
    fn publish_refresh(&self) {
        debug!(subscribers = self.bus.subscriber_count(), "periodic refresh");
        self.bus.publish(self.board.snapshot());
    }

    /// Push path: a beat just arrived for `name`, so re-evaluate the
    /// passive protocol for that one target and notify on a transition.
    pub async fn handle_beat(&self, name: &str) {
        let Some(target) = self
            .board
            .targets()
            .iter()
            .find(|t| t.kind == ServiceKind::Heartbeat && t.name == name)
        else {
            return;
        };

        let result = self.executor.execute(target).await;
        if self.board.apply_status(name, result.alive) {
            info!(target_name = %name, online = result.alive, "status transition (heartbeat)");
            self.bus.publish(self.board.snapshot());
        }
    }
}
