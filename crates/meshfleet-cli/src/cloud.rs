//! Line-oriented stand-in for the cloud shadow service.
//!
//! | stdin line | published event |
//! |---|---|
//! | `{ ... }` | `ShadowDelta` with the line as the document |
//! | `reset` | `FleetReset` |
//! | `remove <key>` | `RobotRemoved` for the robot with that shadow key |
//! | `connect` / `disconnect` | `CloudConnected` / `CloudDisconnected` |
//!
//! Every `ShadowReport` is printed to stdout as one JSON line.  End of input
//! counts as a cloud disconnect.

use meshfleet_middleware::MessageBus;
use meshfleet_types::{Event, EventKind, EventPayload, RobotAddress};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const SOURCE: &str = "cloud";

/// Map one input line to the event it stands for.
pub fn parse_command(line: &str) -> Option<EventPayload> {
    let line = line.trim();
    if line.starts_with('{') {
        return Some(EventPayload::ShadowDelta {
            document: line.to_string(),
        });
    }
    if let Some(key) = line.strip_prefix("remove ") {
        return RobotAddress::parse_shadow_key(key.trim()).map(|address| EventPayload::RobotRemoved { address });
    }
    match line {
        "reset" => Some(EventPayload::FleetReset),
        "connect" => Some(EventPayload::CloudConnected),
        "disconnect" => Some(EventPayload::CloudDisconnected),
        _ => None,
    }
}

/// Publish events for every line of `input` until it ends.
pub async fn read_commands<R>(bus: MessageBus, input: R)
where
    R: AsyncBufRead + Unpin,
{
    bus.publish(Event::new(SOURCE, EventPayload::CloudConnected));
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match parse_command(&line) {
                Some(payload) => {
                    bus.publish(Event::new(SOURCE, payload));
                }
                None => warn!(line = %line.trim(), "unrecognised command"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "cloud input failed");
                break;
            }
        }
    }
    info!("cloud input closed");
    bus.publish(Event::new(SOURCE, EventPayload::CloudDisconnected));
}

/// Start the stdio bridge: one task reading commands, one printing reports.
pub fn spawn_stdio(bus: &MessageBus) -> Vec<JoinHandle<()>> {
    let mut outbox = bus.subscribe(SOURCE, &[EventKind::ShadowReport, EventKind::Error]);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = outbox.recv().await {
            match event.payload {
                EventPayload::ShadowReport { document } => {
                    let line = format!("{document}\n");
                    if let Err(e) = stdout.write_all(line.as_bytes()).await {
                        warn!(error = %e, "report output failed");
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                EventPayload::Error { module, message } => error!(module = %module, error = %message, "module error"),
                _ => {}
            }
        }
    });

    let reader_bus = bus.clone();
    let reader = tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        read_commands(reader_bus, stdin).await;
    });

    vec![writer, reader]
}
