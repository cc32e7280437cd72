//! In-memory transport and owner doubles for the core's unit tests.
//!
//! [`FakeTransport`] records every request and plays the compositor's
//! part where the core depends on it: replacing a selection queues a
//! cancellation for the previous source, and receive requests are served
//! from `remote_data` over the real pipe the core created.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::sync::Mutex;

use super::transport::open_pipe;
use super::{
    ClipboardError, ClipboardKind, ClipboardOwner, Content, DeviceHandle, OfferId, Serial,
    SourceId, Transport,
};

/// One recorded transport request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateDevice(ClipboardKind),
    CreateSource(SourceId),
    Offer(SourceId, String),
    SetSelection(DeviceHandle, Option<SourceId>, Serial),
    DestroySource(SourceId),
    Receive(OfferId, String),
    DestroyOffer(OfferId),
    Flush,
}

#[derive(Debug)]
pub struct FakeTransport {
    pub requests: Vec<Request>,
    pub primary_supported: bool,
    pub fail_create_source: bool,
    pub fail_channel: bool,
    /// Bytes the simulated remote owner writes, per MIME type. Types
    /// missing here are never written: the write end is held open.
    pub remote_data: HashMap<String, Vec<u8>>,
    held_channels: Vec<OwnedFd>,
    selections: HashMap<DeviceHandle, SourceId>,
    pending_cancellations: Vec<SourceId>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            primary_supported: true,
            fail_create_source: false,
            fail_channel: false,
            remote_data: HashMap::new(),
            held_channels: Vec::new(),
            selections: HashMap::new(),
            pending_cancellations: Vec::new(),
        }
    }

    /// Cancellations the compositor would now deliver, oldest first.
    pub fn take_cancellations(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.pending_cancellations)
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }
}

impl Transport for FakeTransport {
    fn supports(&self, kind: ClipboardKind) -> bool {
        match kind {
            ClipboardKind::Regular => true,
            ClipboardKind::PrimarySelection => self.primary_supported,
        }
    }

    fn create_device(&mut self, kind: ClipboardKind) -> Result<DeviceHandle, ClipboardError> {
        self.requests.push(Request::CreateDevice(kind));
        Ok(DeviceHandle::next())
    }

    fn create_source(&mut self, _kind: ClipboardKind) -> Result<SourceId, ClipboardError> {
        if self.fail_create_source {
            return Err(ClipboardError::AllocationFailure("source refused".into()));
        }
        let id = SourceId::next();
        self.requests.push(Request::CreateSource(id));
        Ok(id)
    }

    fn source_offer(&mut self, source: SourceId, mime_type: &str) {
        self.requests.push(Request::Offer(source, mime_type.to_owned()));
    }

    fn set_selection(&mut self, device: DeviceHandle, source: Option<SourceId>, serial: Serial) {
        self.requests
            .push(Request::SetSelection(device, source, serial));
        let previous = match source {
            Some(s) => self.selections.insert(device, s),
            None => self.selections.remove(&device),
        };
        if let Some(prev) = previous
            && Some(prev) != source
        {
            self.pending_cancellations.push(prev);
        }
    }

    fn destroy_source(&mut self, source: SourceId) {
        self.requests.push(Request::DestroySource(source));
    }

    fn request_receive(
        &mut self,
        offer: OfferId,
        mime_type: &str,
        channel: BorrowedFd<'_>,
    ) -> Result<(), ClipboardError> {
        self.requests
            .push(Request::Receive(offer, mime_type.to_owned()));
        let dup = channel.try_clone_to_owned()?;
        match self.remote_data.get(mime_type) {
            Some(bytes) => {
                let mut writer = File::from(dup);
                writer.write_all(bytes)?;
            }
            None => self.held_channels.push(dup),
        }
        Ok(())
    }

    fn destroy_offer(&mut self, offer: OfferId) {
        self.requests.push(Request::DestroyOffer(offer));
    }

    fn flush(&mut self) -> Result<(), ClipboardError> {
        self.requests.push(Request::Flush);
        Ok(())
    }

    fn create_channel_pair(&mut self) -> Result<(OwnedFd, OwnedFd), ClipboardError> {
        if self.fail_channel {
            return Err(ClipboardError::ChannelFailure(std::io::Error::from_raw_os_error(
                nix::libc::EMFILE,
            )));
        }
        open_pipe()
    }
}

/// Owner that writes a fixed body and records every callback.
#[derive(Debug, Default)]
pub struct RecordingOwner {
    body: Vec<u8>,
    fail: bool,
    pub transfers: Mutex<Vec<String>>,
    pub discovered: Mutex<Vec<(OfferId, String)>>,
}

impl RecordingOwner {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            ..Self::default()
        }
    }

    /// Owner whose transfer callback always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn transfers(&self) -> Vec<String> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn discovered(&self) -> Vec<(OfferId, String)> {
        self.discovered.lock().unwrap().clone()
    }
}

impl ClipboardOwner for RecordingOwner {
    fn transfer(
        &self,
        _content: &Content,
        mime_type: &str,
        channel: &mut File,
    ) -> std::io::Result<()> {
        self.transfers.lock().unwrap().push(mime_type.to_owned());
        if self.fail {
            return Err(std::io::Error::other("owner refused"));
        }
        channel.write_all(&self.body)
    }

    fn format_discovered(&self, offer: OfferId, mime_type: &str) {
        self.discovered
            .lock()
            .unwrap()
            .push((offer, mime_type.to_owned()));
    }
}
