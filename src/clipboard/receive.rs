//! Content requester: blocking read of a remote offer.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, OwnedFd};
use std::time::{Duration, Instant};

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use super::{ClipboardError, Negotiator, OfferId, Transport};

const READ_CHUNK: usize = 64 * 1024;

impl<T: Transport> Negotiator<T> {
    /// Read `mime_type` from `offer`, blocking until the remote owner
    /// closes its end or the read timeout expires.
    ///
    /// Each call uses its own pipe. The receive request is flushed before
    /// blocking. A timeout discards whatever arrived; an owner that
    /// writes nothing yields an empty vector.
    pub fn read(
        &mut self,
        offer: Option<OfferId>,
        mime_type: &str,
    ) -> Result<Vec<u8>, ClipboardError> {
        let Some(offer) = offer else {
            return Err(ClipboardError::Unsupported("clipboard is empty".into()));
        };
        if self.offers.get(offer).is_none() {
            return Err(ClipboardError::Unsupported(format!("{offer} is not live")));
        }
        if !self.offer_has_format(offer, mime_type) {
            return Err(ClipboardError::Unsupported(format!(
                "{offer} does not offer {mime_type}"
            )));
        }

        let (read_end, write_end) = self.transport.create_channel_pair()?;
        self.transport
            .request_receive(offer, mime_type, write_end.as_fd())?;
        // Only the remote owner writes.
        drop(write_end);
        self.transport.flush()?;

        let timeout = self.config.read_timeout;
        let bytes = drain(read_end, timeout)?;
        tracing::debug!(%offer, mime_type, len = bytes.len(), "clipboard read complete");
        Ok(bytes)
    }
}

/// Read `channel` to end of stream, giving up after `timeout`.
fn drain(channel: OwnedFd, timeout: Duration) -> Result<Vec<u8>, ClipboardError> {
    let deadline = Instant::now() + timeout;
    let mut file = File::from(channel);
    let mut out = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(?timeout, partial = out.len(), "clipboard read timed out");
            return Err(ClipboardError::Timeout(timeout));
        }

        let millis = remaining.as_millis().clamp(1, u16::MAX as u128) as u16;
        let ready = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(millis))
        };
        match ready {
            Ok(0) => continue,
            Ok(_) => {}
            Err(nix::Error::EINTR) => continue,
            Err(e) => return Err(ClipboardError::Io(e.into())),
        }

        match file.read(&mut chunk) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(e) => return Err(ClipboardError::Io(e)),
        }
    }
}
