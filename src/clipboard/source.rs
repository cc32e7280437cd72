//! Source listener: send and cancellation events for sources we own.

use std::fs::File;
use std::os::fd::{AsFd, OwnedFd};

use nix::fcntl::{FcntlArg, OFlag, fcntl};

use super::{ClipboardEvent, Negotiator, SourceId, Transport};

impl<T: Transport> Negotiator<T> {
    /// A remote consumer wants `mime_type` from `source`, written into
    /// `channel`.
    ///
    /// The owner's transfer callback streams the bytes; the channel is
    /// closed when this returns, whatever the callback did. With no live
    /// payload or an empty MIME type the channel is closed untouched.
    pub fn on_send(&mut self, source: SourceId, mime_type: &str, channel: OwnedFd) {
        let mut file = File::from(channel);

        if mime_type.is_empty() {
            tracing::warn!(%source, "send request without a MIME type — closing channel");
            return;
        }

        let Some(entry) = self.payloads.get(source) else {
            // Either the compositor raced a send past the cancellation or
            // the source was never ours.
            tracing::error!(%source, mime_type, "send for source without payload — closing channel");
            return;
        };
        let kind = entry.kind;

        if let Err(e) = clear_nonblocking(&file) {
            tracing::debug!(%source, error = %e, "could not clear O_NONBLOCK on send channel");
        }

        let delivered = match entry
            .payload
            .owner
            .transfer(&entry.payload.content, mime_type, &mut file)
        {
            Ok(()) => {
                tracing::debug!(%kind, %source, mime_type, "transfer complete");
                true
            }
            Err(e) => {
                tracing::warn!(%kind, %source, mime_type, error = %e, "transfer failed");
                false
            }
        };
        drop(file);

        self.emit(ClipboardEvent::SendRequested {
            kind,
            source,
            mime_type: mime_type.to_owned(),
            delivered,
        });
    }

    /// `source` lost the selection. Frees its payload and destroys it.
    ///
    /// Fires once per source; a repeat is logged and ignored.
    pub fn on_cancelled(&mut self, source: SourceId) {
        let Some(entry) = self.payloads.remove(source) else {
            tracing::warn!(%source, "cancellation for unknown source — ignored");
            return;
        };
        let kind = entry.kind;
        drop(entry);

        self.transport.destroy_source(source);

        if let Some(device) = self.devices.get_mut(&kind)
            && device.active_source == Some(source)
        {
            device.active_source = None;
        }

        tracing::info!(%kind, %source, "source cancelled");
        self.emit(ClipboardEvent::Cancelled { kind, source });
    }
}

/// Compositors may hand out non-blocking pipes; owners expect to write
/// with plain blocking I/O.
fn clear_nonblocking(file: &File) -> nix::Result<()> {
    let fd = file.as_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    if flags.contains(OFlag::O_NONBLOCK) {
        fcntl(fd, FcntlArg::F_SETFL(flags - OFlag::O_NONBLOCK))?;
    }
    Ok(())
}
