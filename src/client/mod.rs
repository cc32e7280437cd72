//! CLI client: the clipboard controller behind `copy`, `paste` and `watch`.
//!
//! Each command starts the Wayland dispatch thread, drives it through a
//! [`ClipboardHandle`], and shuts it down before returning.

mod format;
mod owner;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::{Command, kind_for};
use crate::clipboard::formats::{TEXT_MIME_TYPES, is_valid_mime, preferred_type};
use crate::clipboard::{
    ClipboardConfig, ClipboardError, ClipboardEvent, ClipboardKind, ClipboardOwner, Serial,
    SourceId,
};
use crate::wayland::{self, ClipboardHandle, WaylandError};
use owner::BufferOwner;

/// How long `copy` waits for its own cancellation after releasing.
const RELEASE_GRACE: Duration = Duration::from_secs(1);

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no input serial available; pass --serial")]
    NoSerial,
    #[error("the {0} clipboard is empty")]
    EmptySelection(ClipboardKind),
    #[error("invalid MIME type: {0}")]
    InvalidMime(String),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("wayland: {0}")]
    Wayland(#[from] WaylandError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command. Called from `main.rs`.
pub async fn run(command: Command, config: ClipboardConfig) -> Result<(), ClientError> {
    match command {
        Command::Copy {
            primary,
            types,
            serial,
            file,
        } => {
            let content = load_content(file.as_deref()).await?;
            let formats = offer_types(&types, &content)?;
            let (handle, mut events) = wayland::spawn(config).await?;
            let result = copy(
                &handle,
                &mut events,
                kind_for(primary),
                serial.map(Serial),
                formats,
                content,
            )
            .await;
            handle.shutdown().await;
            result
        }
        Command::Paste { primary, mime_type } => {
            if let Some(m) = &mime_type
                && !is_valid_mime(m)
            {
                return Err(ClientError::InvalidMime(m.clone()));
            }
            let (handle, mut events) = wayland::spawn(config).await?;
            let result = paste(&handle, &mut events, kind_for(primary), mime_type, config).await;
            handle.shutdown().await;
            format::print_content(&result?)?;
            Ok(())
        }
        Command::Watch { json } => {
            let (handle, mut events) = wayland::spawn(config).await?;
            let result = watch(&handle, &mut events, json).await;
            handle.shutdown().await;
            result
        }
    }
}

/// Claim the selection and serve it until it is taken or a signal
/// arrives.
async fn copy(
    handle: &ClipboardHandle,
    events: &mut UnboundedReceiver<ClipboardEvent>,
    kind: ClipboardKind,
    serial: Option<Serial>,
    formats: Vec<String>,
    content: Bytes,
) -> Result<(), ClientError> {
    let owner: Arc<dyn ClipboardOwner> = Arc::new(BufferOwner::new());
    handle.initialize(kind, owner.clone()).await?;

    let serial = match serial {
        Some(s) => s,
        None => handle
            .keyboard_serial()
            .await?
            .ok_or(ClientError::NoSerial)?,
    };

    let len = content.len();
    let source = handle
        .claim(kind, serial, formats.clone(), owner, Arc::new(content))
        .await?;
    format::print_claimed(&kind.to_string(), &formats, len);

    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClipboardEvent::Cancelled { source: s, .. }) if s == source => {
                    tracing::info!(%kind, "selection taken by another client");
                    return Ok(());
                }
                Some(ClipboardEvent::SendRequested { mime_type, delivered, .. }) => {
                    tracing::debug!(%kind, %mime_type, delivered, "paste served");
                }
                Some(_) => {}
                None => return Err(ClipboardError::Disconnected.into()),
            },

            _ = sig_term.recv() => {
                tracing::info!("received SIGTERM, releasing selection");
                break;
            }

            _ = sig_int.recv() => {
                tracing::info!("received SIGINT, releasing selection");
                break;
            }
        }
    }

    handle.release(kind, serial).await?;
    if tokio::time::timeout(RELEASE_GRACE, wait_cancelled(events, source))
        .await
        .is_err()
    {
        tracing::debug!(%source, "no cancellation before exit");
    }
    Ok(())
}

async fn wait_cancelled(events: &mut UnboundedReceiver<ClipboardEvent>, source: SourceId) {
    while let Some(event) = events.recv().await {
        if matches!(event, ClipboardEvent::Cancelled { source: s, .. } if s == source) {
            return;
        }
    }
}

/// Wait for the compositor to announce the selection, then read it.
async fn paste(
    handle: &ClipboardHandle,
    events: &mut UnboundedReceiver<ClipboardEvent>,
    kind: ClipboardKind,
    mime_type: Option<String>,
    config: ClipboardConfig,
) -> Result<Vec<u8>, ClientError> {
    handle
        .initialize(kind, Arc::new(BufferOwner::new()))
        .await?;

    tokio::time::timeout(config.read_timeout, wait_selection(events, kind))
        .await
        .map_err(|_| ClipboardError::Timeout(config.read_timeout))??;
    // The selection may have moved on since the announcement; use the
    // current one.
    let Some(selection) = handle.selection(kind).await? else {
        return Err(ClientError::EmptySelection(kind));
    };

    let mime_type = match mime_type {
        Some(m) => m,
        None => preferred_type(&selection.formats)
            .map(str::to_owned)
            .ok_or(ClientError::EmptySelection(kind))?,
    };
    tracing::debug!(%kind, %mime_type, "reading selection");
    Ok(handle.read(kind, mime_type).await?)
}

/// Wait for the first selection announcement for `kind`.
async fn wait_selection(
    events: &mut UnboundedReceiver<ClipboardEvent>,
    kind: ClipboardKind,
) -> Result<(), ClientError> {
    while let Some(event) = events.recv().await {
        if let ClipboardEvent::SelectionChanged { kind: k, .. } = event
            && k == kind
        {
            return Ok(());
        }
    }
    Err(ClipboardError::Disconnected.into())
}

/// Print every event for both clipboards until a signal arrives.
async fn watch(
    handle: &ClipboardHandle,
    events: &mut UnboundedReceiver<ClipboardEvent>,
    json: bool,
) -> Result<(), ClientError> {
    let owner: Arc<dyn ClipboardOwner> = Arc::new(BufferOwner::new());
    for kind in ClipboardKind::ALL {
        if !handle.supports(kind).await? {
            tracing::warn!(%kind, "clipboard not supported by compositor, skipping");
            continue;
        }
        handle.initialize(kind, owner.clone()).await?;
    }

    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(ClipboardError::Disconnected.into());
                };
                format::print_event(&event, json)?;
            }

            _ = sig_term.recv() => break,
            _ = sig_int.recv() => break,
        }
    }
    Ok(())
}

/// Read the content to copy from `path`, or stdin when `None`.
async fn load_content(path: Option<&Path>) -> Result<Bytes, std::io::Error> {
    let data = match path {
        Some(p) => tokio::fs::read(p).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };
    Ok(Bytes::from(data))
}

/// MIME types to advertise for `content`.
///
/// Explicit types are validated and deduplicated in order. Without any,
/// UTF-8 content is offered as text and anything else as
/// `application/octet-stream`.
fn offer_types(types: &[String], content: &[u8]) -> Result<Vec<String>, ClientError> {
    if types.is_empty() {
        if std::str::from_utf8(content).is_ok() {
            return Ok(TEXT_MIME_TYPES.iter().map(|s| s.to_string()).collect());
        }
        return Ok(vec!["application/octet-stream".to_string()]);
    }

    let mut out: Vec<String> = Vec::with_capacity(types.len());
    for t in types {
        if !is_valid_mime(t) {
            return Err(ClientError::InvalidMime(t.clone()));
        }
        if !out.contains(t) {
            out.push(t.clone());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn text_content_defaults_to_text_types() {
        let types = offer_types(&[], "héllo".as_bytes()).unwrap();
        assert_eq!(types, TEXT_MIME_TYPES);
    }

    #[test]
    fn binary_content_defaults_to_octet_stream() {
        let types = offer_types(&[], &[0xff, 0xfe, 0x00]).unwrap();
        assert_eq!(types, vec!["application/octet-stream"]);
    }

    #[test]
    fn explicit_types_keep_order_and_dedupe() {
        let given = vec![
            "text/html".to_string(),
            "text/plain".to_string(),
            "text/html".to_string(),
        ];
        let types = offer_types(&given, b"<p>x</p>").unwrap();
        assert_eq!(types, vec!["text/html", "text/plain"]);
    }

    #[test]
    fn invalid_type_rejected() {
        let err = offer_types(&["not a type".to_string()], b"x").unwrap_err();
        assert!(matches!(err, ClientError::InvalidMime(t) if t == "not a type"));
    }

    #[tokio::test]
    async fn loads_content_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents\n").unwrap();
        let content = load_content(Some(file.path())).await.unwrap();
        assert_eq!(&content[..], b"file contents\n");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_content(Some(&dir.path().join("absent")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn wait_selection_skips_other_kind() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let offer = crate::clipboard::OfferId::next();
        let regular = ClipboardEvent::SelectionChanged {
            kind: ClipboardKind::Regular,
            offer: Some(offer),
            formats: vec!["text/plain".into()],
        };
        tx.send(ClipboardEvent::SelectionChanged {
            kind: ClipboardKind::PrimarySelection,
            offer: None,
            formats: vec![],
        })
        .unwrap();
        tx.send(regular).unwrap();
        tx.send(ClipboardEvent::Cancelled {
            kind: ClipboardKind::Regular,
            source: SourceId::next(),
        })
        .unwrap();

        wait_selection(&mut rx, ClipboardKind::Regular)
            .await
            .unwrap();
        // Stops right after the matching announcement.
        assert!(matches!(
            rx.try_recv(),
            Ok(ClipboardEvent::Cancelled { .. })
        ));
    }

    #[tokio::test]
    async fn wait_selection_fails_when_thread_gone() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ClipboardEvent>();
        drop(tx);
        assert!(matches!(
            wait_selection(&mut rx, ClipboardKind::Regular).await,
            Err(ClientError::Clipboard(ClipboardError::Disconnected))
        ));
    }

    #[tokio::test]
    async fn wait_cancelled_matches_source() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ours = SourceId::next();
        tx.send(ClipboardEvent::Cancelled {
            kind: ClipboardKind::Regular,
            source: SourceId::next(),
        })
        .unwrap();
        tx.send(ClipboardEvent::Cancelled {
            kind: ClipboardKind::Regular,
            source: ours,
        })
        .unwrap();
        wait_cancelled(&mut rx, ours).await;
        assert!(rx.try_recv().is_err());
    }
}
