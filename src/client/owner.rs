//! Clipboard owner for in-memory content.

use std::fs::File;
use std::io::{self, Write};

use bytes::Bytes;

use crate::clipboard::{ClipboardOwner, Content, OfferId};

/// Serves a single byte buffer under every MIME type it was offered as.
///
/// The buffer is the claim's `Content`, stored as [`Bytes`].
#[derive(Debug, Default)]
pub struct BufferOwner;

impl BufferOwner {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardOwner for BufferOwner {
    fn transfer(&self, content: &Content, mime_type: &str, channel: &mut File) -> io::Result<()> {
        let Some(bytes) = (**content).downcast_ref::<Bytes>() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "clipboard content is not a byte buffer",
            ));
        };
        channel.write_all(bytes)?;
        channel.flush()?;
        tracing::debug!(mime_type, len = bytes.len(), "served clipboard content");
        Ok(())
    }

    fn format_discovered(&self, offer: OfferId, mime_type: &str) {
        tracing::trace!(%offer, mime_type, "format discovered");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::Arc;

    use super::*;
    use crate::clipboard::formats::TEXT_MIME_TYPES;

    fn channel() -> (File, File) {
        let (r, w) = nix::unistd::pipe().unwrap();
        (File::from(r), File::from(w))
    }

    #[test]
    fn writes_buffer() {
        let content: Content = Arc::new(Bytes::from_static(b"copied text"));
        let (mut reader, mut writer) = channel();

        BufferOwner::new()
            .transfer(&content, TEXT_MIME_TYPES[0], &mut writer)
            .unwrap();
        drop(writer);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"copied text");
    }

    #[test]
    fn rejects_foreign_content() {
        let content: Content = Arc::new(42u32);
        let (_reader, mut writer) = channel();
        let err = BufferOwner::new()
            .transfer(&content, "text/plain", &mut writer)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
