//! Output formatting for CLI client commands.
//!
//! Status lines and events go to stdout for `watch`. Pasted bytes go to
//! stdout untouched; everything else about a paste goes to stderr.

use std::io::{self, Write};

use crate::clipboard::ClipboardEvent;

/// Print one event as a human-readable line or a JSON object.
pub fn print_event(event: &ClipboardEvent, json: bool) -> Result<(), io::Error> {
    let line = if json {
        serde_json::to_string(event).map_err(io::Error::other)?
    } else {
        describe_event(event)
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

/// Write pasted content to stdout.
pub fn print_content(content: &[u8]) -> Result<(), io::Error> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content)?;
    stdout.flush()
}

/// Print the claim status line to stderr.
pub fn print_claimed(kind: &str, formats: &[String], len: usize) {
    eprintln!(
        "Serving {len} bytes on the {kind} clipboard as {}",
        formats.join(", ")
    );
}

fn describe_event(event: &ClipboardEvent) -> String {
    match event {
        ClipboardEvent::OfferFormatDiscovered {
            kind,
            offer,
            mime_type,
        } => format!("{kind:<8} {offer} offers {mime_type}"),
        ClipboardEvent::SendRequested {
            kind,
            source,
            mime_type,
            delivered,
        } => format!(
            "{kind:<8} {source} sent {mime_type}{}",
            if *delivered { "" } else { " (failed)" }
        ),
        ClipboardEvent::Cancelled { kind, source } => {
            format!("{kind:<8} {source} cancelled")
        }
        ClipboardEvent::SelectionChanged {
            kind,
            offer: Some(offer),
            formats,
        } => format!("{kind:<8} selection {offer} [{}]", format_list(formats)),
        ClipboardEvent::SelectionChanged {
            kind, offer: None, ..
        } => format!("{kind:<8} selection cleared"),
    }
}

fn format_list(formats: &[String]) -> String {
    if formats.is_empty() {
        "-".to_string()
    } else {
        formats.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardKind, OfferId, SourceId};

    #[test]
    fn describe_selection() {
        let offer = OfferId::next();
        let line = describe_event(&ClipboardEvent::SelectionChanged {
            kind: ClipboardKind::Regular,
            offer: Some(offer),
            formats: vec!["text/plain".into(), "text/html".into()],
        });
        assert!(line.starts_with("regular "));
        assert!(line.contains(&offer.to_string()));
        assert!(line.ends_with("[text/plain, text/html]"));
    }

    #[test]
    fn describe_cleared_selection() {
        let line = describe_event(&ClipboardEvent::SelectionChanged {
            kind: ClipboardKind::PrimarySelection,
            offer: None,
            formats: vec![],
        });
        assert_eq!(line, "primary  selection cleared");
    }

    #[test]
    fn describe_failed_send() {
        let line = describe_event(&ClipboardEvent::SendRequested {
            kind: ClipboardKind::Regular,
            source: SourceId::next(),
            mime_type: "text/plain".into(),
            delivered: false,
        });
        assert!(line.ends_with("sent text/plain (failed)"));
    }

    #[test]
    fn empty_format_list() {
        assert_eq!(format_list(&[]), "-");
    }

    #[test]
    fn json_is_tagged() {
        let event = ClipboardEvent::Cancelled {
            kind: ClipboardKind::PrimarySelection,
            source: SourceId::next(),
        };
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "cancelled");
        assert_eq!(value["kind"], "primary_selection");
        assert!(value["source"].is_u64());
    }
}
