//! Transport surface consumed by the negotiator.
//!
//! The transport owns the real protocol objects; the core only ever sees
//! the ids it hands out. Requests are fire-and-forget: their effects come
//! back later as listener calls on the dispatch thread.

use std::os::fd::{BorrowedFd, OwnedFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use super::{ClipboardError, ClipboardKind, DeviceHandle, OfferId, Serial, SourceId};

/// Requests the negotiator sends to the compositor connection.
pub trait Transport {
    /// Whether the compositor advertises the protocol for `kind`.
    fn supports(&self, kind: ClipboardKind) -> bool;

    /// Create the device object for `kind` and start delivering its
    /// offer events.
    fn create_device(&mut self, kind: ClipboardKind) -> Result<DeviceHandle, ClipboardError>;

    /// Create a new source and start delivering its send/cancel events.
    fn create_source(&mut self, kind: ClipboardKind) -> Result<SourceId, ClipboardError>;

    /// Advertise one MIME type on a source.
    fn source_offer(&mut self, source: SourceId, mime_type: &str);

    /// Make `source` the device's selection, or clear it with `None`.
    fn set_selection(&mut self, device: DeviceHandle, source: Option<SourceId>, serial: Serial);

    /// Destroy a source after its cancellation.
    fn destroy_source(&mut self, source: SourceId);

    /// Ask the owner of `offer` to write `mime_type` into `channel`.
    fn request_receive(
        &mut self,
        offer: OfferId,
        mime_type: &str,
        channel: BorrowedFd<'_>,
    ) -> Result<(), ClipboardError>;

    /// Destroy a remote offer that is no longer needed.
    fn destroy_offer(&mut self, offer: OfferId);

    /// Push queued requests to the compositor.
    fn flush(&mut self) -> Result<(), ClipboardError>;

    /// Open a unidirectional `(readable, writable)` channel pair.
    fn create_channel_pair(&mut self) -> Result<(OwnedFd, OwnedFd), ClipboardError> {
        open_pipe()
    }
}

/// Close-on-exec pipe, `(read end, write end)`.
pub fn open_pipe() -> Result<(OwnedFd, OwnedFd), ClipboardError> {
    pipe2(OFlag::O_CLOEXEC).map_err(|e| ClipboardError::ChannelFailure(e.into()))
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn pipe_carries_bytes_until_writer_closes() {
        let (read_end, write_end) = open_pipe().unwrap();

        let mut writer = File::from(write_end);
        writer.write_all(b"through the pipe").unwrap();
        drop(writer);

        let mut out = Vec::new();
        File::from(read_end).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"through the pipe");
    }
}
