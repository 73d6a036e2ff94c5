//! Line-oriented event input: one JSON event per line in, one JSON
//! response per line out.
//!
//! ```text
//! {"event":"node_connected","node":"node2.example.com"}
//! {"event":"packet","packet":{"type":"command","id":"1","from":"admin@example.com","to":"sess-man@example.com","node":"add-script","permission":"admin"}}
//! ```

use std::io::Write;

use corvid_component::Component;
use corvid_core::Packet;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Packet { packet: Packet },
    NodeConnected { node: String },
    NodeDisconnected { node: String },
    /// Rebuild the command set from sources and stored definitions.
    Reload,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub handled: usize,
    pub responses: usize,
    /// Lines that could not be parsed.
    pub skipped: usize,
}

/// Process events in order until `reader` is exhausted.
///
/// Blank lines and lines starting with `#` are ignored; malformed lines are
/// logged and skipped.
pub async fn drive<R, W>(component: &Component, reader: R, mut out: W) -> anyhow::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "unreadable event skipped");
                summary.skipped += 1;
                continue;
            }
        };
        summary.events += 1;

        match event {
            Event::Packet { packet } => {
                let dispatch = component.process_packet(&packet).await;
                if dispatch.is_handled() {
                    summary.handled += 1;
                }
                for response in dispatch.into_packets() {
                    serde_json::to_writer(&mut out, &response)?;
                    out.write_all(b"\n")?;
                    summary.responses += 1;
                }
                out.flush()?;
            }
            Event::NodeConnected { node } => {
                let added = component.node_connected(&node)?;
                debug!(%node, added, "cluster node connected");
            }
            Event::NodeDisconnected { node } => {
                let removed = component.node_disconnected(&node)?;
                debug!(%node, removed, "cluster node disconnected");
            }
            Event::Reload => component.reload_commands()?,
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::{ComponentConfig, OutboundPacket};

    fn component() -> Component {
        let config = ComponentConfig::from_toml(
            r#"
name = "sess-man"
default_hostname = "node1.example.com"
admins = ["admin@example.com"]
trusted = ["{clusterNode}"]
local_domains = ["example.com"]

[commands]
ALL = ["ADMIN"]
motd = ["LOCAL"]
"#,
        )
        .unwrap();
        let component = crate::build_component(config, None).unwrap();
        component.initialize().unwrap();
        component
    }

    fn responses(out: &[u8]) -> Vec<OutboundPacket> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn replays_membership_and_commands_in_order() {
        let component = component();
        let input = br#"
# install a text command from a trusted cluster node
{"event":"node_connected","node":"node2.example.com"}
{"event":"packet","packet":{"type":"command","id":"1","from":"node2.example.com","to":"sess-man@example.com","node":"add-script","permission":"authenticated","fields":[{"var":"command-id","values":["motd"]},{"var":"script","values":["Hello"]}]}}
{"event":"packet","packet":{"type":"command","id":"2","from":"alice@example.com","to":"sess-man@example.com","node":"motd","permission":"local"}}
{"event":"node_disconnected","node":"node2.example.com"}
{"event":"packet","packet":{"type":"command","id":"3","from":"node2.example.com","to":"sess-man@example.com","node":"del-script","permission":"authenticated"}}
"#;
        let mut out = Vec::new();
        let summary = drive(&component, &input[..], &mut out).await.unwrap();

        assert_eq!(summary.events, 5);
        assert_eq!(summary.handled, 3);
        assert_eq!(summary.skipped, 0);

        let replies = responses(&out);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0].field("note"), Some("Command motd installed."));
        assert_eq!(replies[1].field("text"), Some("Hello"));
        assert!(replies[2].is_forbidden());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let component = component();
        let input = b"not json\n{\"event\":\"reload\"}\n{\"event\":\"unknown\"}\n";
        let mut out = Vec::new();
        let summary = drive(&component, &input[..], &mut out).await.unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.skipped, 2);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn commands_without_permission_are_skipped() {
        let component = component();
        let input = br#"{"event":"packet","packet":{"type":"command","id":"1","from":"admin@example.com","to":"sess-man@example.com","node":"add-script"}}"#;
        let mut out = Vec::new();
        let summary = drive(&component, &input[..], &mut out).await.unwrap();
        assert_eq!(summary.events, 0);
        assert_eq!(summary.skipped, 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn stanzas_produce_no_output() {
        let component = component();
        let input = br#"{"event":"packet","packet":{"type":"stanza","id":"m","from":"a@example.com","to":"sess-man@example.com","kind":"message"}}"#;
        let mut out = Vec::new();
        let summary = drive(&component, &input[..], &mut out).await.unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.handled, 0);
        assert!(out.is_empty());
    }
}
