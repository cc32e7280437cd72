//! Device negotiator — per-kind device registry and ownership claims.
//!
//! Holds one device per [`ClipboardKind`], created by
//! [`initialize`](Negotiator::initialize) and kept for the life of the
//! negotiator. [`claim`](Negotiator::claim) builds a source, attaches a
//! transfer payload, advertises formats and asks the transport to make it
//! the selection. Superseding an earlier source is left to the
//! compositor, which cancels it asynchronously.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::formats::FormatRegistry;
use super::offer::{OfferContext, OfferTable};
use super::payload::{PayloadStore, TransferPayload};
use super::{
    ClipboardConfig, ClipboardError, ClipboardEvent, ClipboardKind, ClipboardOwner, Content,
    DeviceHandle, OfferId, Serial, SourceId, Transport,
};

/// State held for one initialized clipboard kind.
#[derive(Debug)]
pub(super) struct DeviceState {
    pub handle: DeviceHandle,
    pub context: OfferContext,
    /// Offer currently holding the selection, if any.
    pub selection: Option<OfferId>,
    /// Our most recently claimed source that has not been cancelled.
    pub active_source: Option<SourceId>,
}

/// Clipboard negotiator for both kinds.
///
/// Owned by the transport's dispatch thread. All listener methods and
/// operations must be called from that thread.
pub struct Negotiator<T: Transport> {
    pub(super) transport: T,
    pub(super) config: ClipboardConfig,
    pub(super) devices: HashMap<ClipboardKind, DeviceState>,
    pub(super) payloads: PayloadStore,
    pub(super) offers: OfferTable,
    pub(super) formats: FormatRegistry,
    events: mpsc::UnboundedSender<ClipboardEvent>,
}

impl<T: Transport> Negotiator<T> {
    /// Create a negotiator over `transport` and the receiver for its
    /// typed events.
    pub fn new(
        transport: T,
        config: ClipboardConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClipboardEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let negotiator = Self {
            transport,
            config,
            devices: HashMap::new(),
            payloads: PayloadStore::new(),
            offers: OfferTable::new(),
            formats: FormatRegistry::new(),
            events,
        };
        (negotiator, rx)
    }

    /// Create the device for `kind` and bind its offer listener to a
    /// fresh context for `owner`.
    ///
    /// Fails with `AlreadyInitialized` on a second call for the same
    /// kind, and with `Unsupported` when the compositor lacks the
    /// protocol for `kind`.
    pub fn initialize(
        &mut self,
        kind: ClipboardKind,
        owner: Arc<dyn ClipboardOwner>,
    ) -> Result<DeviceHandle, ClipboardError> {
        if self.devices.contains_key(&kind) {
            return Err(ClipboardError::AlreadyInitialized(kind));
        }
        if !self.transport.supports(kind) {
            return Err(ClipboardError::Unsupported(format!(
                "compositor does not support the {kind} clipboard"
            )));
        }

        let handle = self.transport.create_device(kind)?;
        self.devices.insert(
            kind,
            DeviceState {
                handle,
                context: OfferContext::new(owner),
                selection: None,
                active_source: None,
            },
        );

        tracing::info!(%kind, device = %handle, "clipboard device initialized");
        Ok(handle)
    }

    /// Offer `content` under `formats` as the new selection of `kind`.
    ///
    /// Formats are advertised in the given order; the first is the
    /// preferred one. The previous owner of the selection, local or
    /// remote, is cancelled later by the compositor. On failure nothing
    /// is sent and the previous owner stays in place.
    pub fn claim(
        &mut self,
        kind: ClipboardKind,
        serial: Serial,
        formats: &[String],
        owner: Arc<dyn ClipboardOwner>,
        content: Content,
    ) -> Result<SourceId, ClipboardError> {
        let device_handle = self.device(kind)?.handle;
        if formats.is_empty() {
            return Err(ClipboardError::NoFormats);
        }

        let payload = TransferPayload::new(owner, content);
        let source = match self.transport.create_source(kind) {
            Ok(source) => source,
            Err(e) => {
                // Releases owner and content before the error propagates.
                drop(payload);
                tracing::warn!(%kind, error = %e, "source creation failed — selection unchanged");
                return Err(e);
            }
        };
        self.payloads.insert(source, kind, payload);

        for mime_type in formats {
            self.transport.source_offer(source, mime_type);
        }
        self.transport
            .set_selection(device_handle, Some(source), serial);

        if let Some(device) = self.devices.get_mut(&kind)
            && let Some(previous) = device.active_source.replace(source)
        {
            tracing::debug!(%kind, %previous, "previous source superseded — awaiting cancellation");
        }

        tracing::info!(
            %kind,
            %source,
            serial = serial.0,
            formats = formats.len(),
            "selection claimed"
        );
        Ok(source)
    }

    /// Clear the selection of `kind` if this process owns it.
    ///
    /// The active source's payload is freed by the cancellation that
    /// follows, not here. With no active source this is a no-op.
    pub fn release(&mut self, kind: ClipboardKind, serial: Serial) -> Result<(), ClipboardError> {
        let device = self.device(kind)?;
        let Some(source) = device.active_source else {
            tracing::debug!(%kind, "release with no active source — nothing to do");
            return Ok(());
        };
        let handle = device.handle;

        self.transport.set_selection(handle, None, serial);
        tracing::info!(%kind, %source, serial = serial.0, "selection released");
        Ok(())
    }

    /// Whether a device exists for `kind`.
    pub fn is_initialized(&self, kind: ClipboardKind) -> bool {
        self.devices.contains_key(&kind)
    }

    /// Offer currently holding the selection of `kind`.
    pub fn selection(&self, kind: ClipboardKind) -> Option<OfferId> {
        self.devices.get(&kind).and_then(|d| d.selection)
    }

    /// Our uncancelled source for `kind`, if we claimed one.
    pub fn active_source(&self, kind: ClipboardKind) -> Option<SourceId> {
        self.devices.get(&kind).and_then(|d| d.active_source)
    }

    /// Number of sources whose payload is still alive.
    pub fn live_payloads(&self) -> usize {
        self.payloads.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(super) fn device(&self, kind: ClipboardKind) -> Result<&DeviceState, ClipboardError> {
        self.devices
            .get(&kind)
            .ok_or(ClipboardError::NotInitialized(kind))
    }

    /// Push an event to the controller. A dropped receiver is ignored.
    pub(super) fn emit(&self, event: ClipboardEvent) {
        let _ = self.events.send(event);
    }
}
