//! CLI commands for the handshake client
//!
//! Dials the peer, runs the handshake and prints what the peer announced.

use crate::network::{connect, HandshakeConfig, HandshakeReport, Handshaker};
use tokio_util::sync::CancellationToken;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Connect to `addr` and perform one handshake
pub async fn cmd_handshake(addr: &str, config: HandshakeConfig, json: bool) -> CliResult<()> {
    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, aborting handshake...");
            ctrl_c.cancel();
        }
    });

    let stream = connect(addr, config.connect_timeout).await?;
    let report = match Handshaker::new(config).with_shutdown(shutdown).run(stream).await {
        Ok(report) => report,
        Err(e) if e.is_protocol_violation() => {
            log::warn!("Peer {} broke the handshake protocol", addr);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(addr, &report));
    }

    Ok(())
}

/// Human-readable summary of a handshake
pub fn format_report(addr: &str, report: &HandshakeReport) -> String {
    let mut out = format!("🤝 Handshake with {}: {:?}\n", addr, report.state);

    match &report.peer_version {
        Some(version) => {
            let time = chrono::DateTime::from_timestamp(version.timestamp, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| version.timestamp.to_string());

            out.push_str(&format!("   ├─ Protocol version: {}\n", version.protocol_version));
            out.push_str(&format!("   ├─ User agent: {}\n", version.user_agent));
            out.push_str(&format!("   ├─ Services: {:#x}\n", version.services.bits()));
            out.push_str(&format!("   ├─ Start height: {}\n", version.start_height));
            out.push_str(&format!("   ├─ Peer time: {}\n", time));
            out.push_str(&format!("   ├─ Sees us as: {}\n", version.addr_recv));
            out.push_str(&format!("   ├─ Relay: {}\n", version.relay));
        }
        None => out.push_str("   ├─ Peer version: unknown\n"),
    }
    out.push_str(&format!("   └─ Frames received: {}", report.frames_received));

    out
}
