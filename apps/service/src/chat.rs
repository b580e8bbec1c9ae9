//! Chat-platform summary: renders a snapshot into a category-grouped
//! markdown message and keeps one published message current through the
//! edit/send contract. The platform client itself lives outside this
//! repository; it only has to implement `SummaryPublisher`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::bus::StatusBus;
use crate::status::{ServiceView, StatusBoard, StatusSnapshot};

pub type MessageHandle = String;

/// Edit/send contract a chat platform offers.
#[async_trait]
pub trait SummaryPublisher: Send + Sync {
    async fn send(&self, content: &str) -> Result<MessageHandle>;
    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<()>;
}

/// Default publisher: writes the rendered summary to the log.
pub struct LogPublisher;

#[async_trait]
impl SummaryPublisher for LogPublisher {
    async fn send(&self, content: &str) -> Result<MessageHandle> {
        info!("status summary:\n{content}");
        Ok("log".to_string())
    }

    async fn edit(&self, _handle: &MessageHandle, content: &str) -> Result<()> {
        info!("status summary:\n{content}");
        Ok(())
    }
}

fn category_label(category: &str) -> String {
    match category {
        "services" => "🛠️ Services & Bots".to_string(),
        "games" => "🎮 Game Servers".to_string(),
        "websites" => "🌐 Websites".to_string(),
        other => other.to_string(),
    }
}

fn service_line(service: &ServiceView) -> String {
    let status_icon = if service.online { "🟢" } else { "🔴" };
    let mut line = format!("{status_icon} **{}** • {}", service.name, service.uptime);
    if service.online {
        if let Some(link) = &service.link {
            line.push_str(&format!(" • [link]({link})"));
        }
    }
    line
}

/// Render a snapshot as the chat summary message.
pub fn render_summary(snapshot: &StatusSnapshot, public_url: Option<&str>) -> String {
    let mut out = format!(
        "**Server Status** — {}/{} services online\nLast update: {}\n",
        snapshot.summary.online, snapshot.summary.total, snapshot.summary.generated_at
    );
    if let Some(url) = public_url {
        out.push_str(&format!("Live dashboard: {url}\n"));
    }

    // Categories appear in configuration order of first appearance.
    let mut categories: Vec<&str> = Vec::new();
    for service in &snapshot.services {
        if !categories.contains(&service.category.as_str()) {
            categories.push(&service.category);
        }
    }

    for category in categories {
        out.push_str(&format!("\n__{}__\n", category_label(category)));
        for service in snapshot.services.iter().filter(|s| s.category == category) {
            out.push_str(&service_line(service));
            out.push('\n');
        }
    }
    out
}

/// Keeps one chat message in sync with the monitor: sends it on first use,
/// edits it on every following notification.
pub struct ChatUpdater {
    publisher: Arc<dyn SummaryPublisher>,
    public_url: Option<String>,
    handle: Option<MessageHandle>,
}

impl ChatUpdater {
    pub fn new(publisher: Arc<dyn SummaryPublisher>, public_url: Option<String>) -> Self {
        Self { publisher, public_url, handle: None }
    }

    /// Publish one snapshot. A failed edit invalidates the handle so the
    /// next apply sends a fresh message instead.
    pub async fn apply(&mut self, snapshot: &StatusSnapshot) {
        let content = render_summary(snapshot, self.public_url.as_deref());
        match &self.handle {
            Some(handle) => {
                if let Err(err) = self.publisher.edit(handle, &content).await {
                    warn!("summary edit failed, sending fresh next time: {err}");
                    self.handle = None;
                }
            }
            None => match self.publisher.send(&content).await {
                Ok(handle) => self.handle = Some(handle),
                Err(err) => warn!("summary send failed: {err}"),
            },
        }
    }

    pub async fn run(mut self, board: StatusBoard, bus: StatusBus) {
        let mut events = bus.subscribe();
        // Initial sync before any notification arrives.
        self.apply(&board.snapshot()).await;
        loop {
            match events.recv().await {
                Ok(snapshot) => self.apply(&snapshot).await,
                Err(RecvError::Lagged(n)) => {
                    // Each snapshot is a full state, skipping some is fine.
                    warn!("summary updater lagged by {n} notifications");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
