//! Startup validation of the target table.
//!
//! The table is immutable for the process lifetime, so everything a probe
//! would otherwise have to tolerate is rejected once, up front: a kind
//! whose required fields are missing, fields that contradict the kind, a
//! duplicate name.

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use url::Url;

use super::types::{ServiceKind, Target};

pub fn validate_targets(targets: &[Target]) -> Result<()> {
    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.name.as_str()) {
            return Err(anyhow!("duplicate target name: {}", target.name));
        }
        validate_target(target)
            .map_err(|err| anyhow!("target {}: {err}", target.name))?;
    }
    Ok(())
}

fn validate_target(target: &Target) -> Result<()> {
    match target.kind {
        ServiceKind::Heartbeat => {
            require_port(target)?;
            if target.host.is_some() || target.url.is_some() {
                return Err(anyhow!("heartbeat targets take only a listen port"));
            }
        }
        ServiceKind::Port | ServiceKind::Relay => {
            require_port(target)?;
            if target.host.as_deref().is_none_or(str::is_empty) {
                return Err(anyhow!("{} targets need a host", target.kind));
            }
            if target.url.is_some() {
                return Err(anyhow!("{} targets take host:port, not a url", target.kind));
            }
        }
        ServiceKind::Http => {
            if target.host.is_some() || target.port.is_some() {
                return Err(anyhow!("http targets take a url, not host:port"));
            }
            let url = target.url.as_deref().ok_or_else(|| anyhow!("http targets need a url"))?;
            let parsed = Url::parse(url).map_err(|err| anyhow!("invalid url: {err}"))?;
            match parsed.scheme() {
                "http" | "https" => {}
                other => return Err(anyhow!("unsupported url scheme: {other}")),
            }
        }
    }
    Ok(())
}

fn require_port(target: &Target) -> Result<()> {
    match target.port {
        Some(0) => Err(anyhow!("port must be non-zero")),
        Some(_) => Ok(()),
        None => Err(anyhow!("{} targets need a port", target.kind)),
    }
}
