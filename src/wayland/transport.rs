//! [`Transport`] over the two Wayland clipboard protocols.
//!
//! Proxies are held in tagged enums so a regular source can never be set
//! on a primary device. Sources and offers carry their core id as proxy
//! user data; dispatch reads it back to call the negotiator.

use std::collections::HashMap;
use std::os::fd::BorrowedFd;

use wayland_client::protocol::wl_data_device::WlDataDevice;
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_data_offer::WlDataOffer;
use wayland_client::protocol::wl_data_source::WlDataSource;
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::{Connection, Proxy, QueueHandle};
use wayland_protocols::wp::primary_selection::zv1::client::{
    zwp_primary_selection_device_manager_v1::ZwpPrimarySelectionDeviceManagerV1,
    zwp_primary_selection_device_v1::ZwpPrimarySelectionDeviceV1,
    zwp_primary_selection_offer_v1::ZwpPrimarySelectionOfferV1,
    zwp_primary_selection_source_v1::ZwpPrimarySelectionSourceV1,
};

use super::WaylandState;
use crate::clipboard::{
    ClipboardError, ClipboardKind, DeviceHandle, OfferId, Serial, SourceId, Transport,
};

#[derive(Debug)]
pub(crate) enum DeviceProxy {
    Regular(WlDataDevice),
    Primary(ZwpPrimarySelectionDeviceV1),
}

#[derive(Debug)]
pub(crate) enum SourceProxy {
    Regular(WlDataSource),
    Primary(ZwpPrimarySelectionSourceV1),
}

#[derive(Debug)]
pub(crate) enum OfferProxy {
    Regular(WlDataOffer),
    Primary(ZwpPrimarySelectionOfferV1),
}

impl OfferProxy {
    fn id(&self) -> Option<OfferId> {
        match self {
            OfferProxy::Regular(o) => o.data::<OfferId>().copied(),
            OfferProxy::Primary(o) => o.data::<OfferId>().copied(),
        }
    }
}

pub(crate) struct WaylandTransport {
    conn: Connection,
    qh: QueueHandle<WaylandState>,
    seat: WlSeat,
    data_device_manager: WlDataDeviceManager,
    primary_manager: Option<ZwpPrimarySelectionDeviceManagerV1>,
    devices: HashMap<DeviceHandle, DeviceProxy>,
    sources: HashMap<SourceId, SourceProxy>,
    offers: HashMap<OfferId, OfferProxy>,
}

impl WaylandTransport {
    pub fn new(
        conn: Connection,
        qh: QueueHandle<WaylandState>,
        seat: WlSeat,
        data_device_manager: WlDataDeviceManager,
        primary_manager: Option<ZwpPrimarySelectionDeviceManagerV1>,
    ) -> Self {
        Self {
            conn,
            qh,
            seat,
            data_device_manager,
            primary_manager,
            devices: HashMap::new(),
            sources: HashMap::new(),
            offers: HashMap::new(),
        }
    }

    /// Keep a newly announced offer proxy and return its id.
    pub fn track_offer(&mut self, proxy: OfferProxy) -> Option<OfferId> {
        let Some(id) = proxy.id() else {
            tracing::error!("offer proxy without id");
            return None;
        };
        self.offers.insert(id, proxy);
        Some(id)
    }
}

impl Transport for WaylandTransport {
    fn supports(&self, kind: ClipboardKind) -> bool {
        match kind {
            ClipboardKind::Regular => true,
            ClipboardKind::PrimarySelection => self.primary_manager.is_some(),
        }
    }

    fn create_device(&mut self, kind: ClipboardKind) -> Result<DeviceHandle, ClipboardError> {
        let proxy = match kind {
            ClipboardKind::Regular => DeviceProxy::Regular(
                self.data_device_manager
                    .get_data_device(&self.seat, &self.qh, ()),
            ),
            ClipboardKind::PrimarySelection => {
                let manager = self.primary_manager.as_ref().ok_or_else(|| {
                    ClipboardError::Unsupported("no primary selection manager".into())
                })?;
                DeviceProxy::Primary(manager.get_device(&self.seat, &self.qh, ()))
            }
        };
        let handle = DeviceHandle::next();
        self.devices.insert(handle, proxy);
        Ok(handle)
    }

    fn create_source(&mut self, kind: ClipboardKind) -> Result<SourceId, ClipboardError> {
        let id = SourceId::next();
        let proxy = match kind {
            ClipboardKind::Regular => {
                SourceProxy::Regular(self.data_device_manager.create_data_source(&self.qh, id))
            }
            ClipboardKind::PrimarySelection => {
                let manager = self.primary_manager.as_ref().ok_or_else(|| {
                    ClipboardError::Unsupported("no primary selection manager".into())
                })?;
                SourceProxy::Primary(manager.create_source(&self.qh, id))
            }
        };
        let alive = match &proxy {
            SourceProxy::Regular(s) => s.is_alive(),
            SourceProxy::Primary(s) => s.is_alive(),
        };
        if !alive {
            return Err(ClipboardError::AllocationFailure(format!(
                "{kind} source not created: connection is dead"
            )));
        }
        self.sources.insert(id, proxy);
        Ok(id)
    }

    fn source_offer(&mut self, source: SourceId, mime_type: &str) {
        match self.sources.get(&source) {
            Some(SourceProxy::Regular(s)) => s.offer(mime_type.to_owned()),
            Some(SourceProxy::Primary(s)) => s.offer(mime_type.to_owned()),
            None => tracing::warn!(%source, "offer on unknown source"),
        }
    }

    fn set_selection(&mut self, device: DeviceHandle, source: Option<SourceId>, serial: Serial) {
        let proxy = match source {
            Some(id) => match self.sources.get(&id) {
                Some(p) => Some(p),
                None => {
                    tracing::warn!(source = %id, "set_selection with unknown source");
                    return;
                }
            },
            None => None,
        };

        match (self.devices.get(&device), proxy) {
            (Some(DeviceProxy::Regular(d)), None) => d.set_selection(None, serial.0),
            (Some(DeviceProxy::Regular(d)), Some(SourceProxy::Regular(s))) => {
                d.set_selection(Some(s), serial.0)
            }
            (Some(DeviceProxy::Primary(d)), None) => d.set_selection(None, serial.0),
            (Some(DeviceProxy::Primary(d)), Some(SourceProxy::Primary(s))) => {
                d.set_selection(Some(s), serial.0)
            }
            (Some(_), Some(_)) => {
                tracing::error!(%device, "source and device belong to different clipboards")
            }
            (None, _) => tracing::warn!(%device, "set_selection on unknown device"),
        }
    }

    fn destroy_source(&mut self, source: SourceId) {
        match self.sources.remove(&source) {
            Some(SourceProxy::Regular(s)) => s.destroy(),
            Some(SourceProxy::Primary(s)) => s.destroy(),
            None => tracing::debug!(%source, "destroy of unknown source"),
        }
    }

    fn request_receive(
        &mut self,
        offer: OfferId,
        mime_type: &str,
        channel: BorrowedFd<'_>,
    ) -> Result<(), ClipboardError> {
        match self.offers.get(&offer) {
            Some(OfferProxy::Regular(o)) => o.receive(mime_type.to_owned(), channel),
            Some(OfferProxy::Primary(o)) => o.receive(mime_type.to_owned(), channel),
            None => {
                return Err(ClipboardError::Unsupported(format!(
                    "{offer} has no live proxy"
                )));
            }
        }
        Ok(())
    }

    fn destroy_offer(&mut self, offer: OfferId) {
        match self.offers.remove(&offer) {
            Some(OfferProxy::Regular(o)) => o.destroy(),
            Some(OfferProxy::Primary(o)) => o.destroy(),
            None => tracing::debug!(%offer, "destroy of unknown offer"),
        }
    }

    fn flush(&mut self) -> Result<(), ClipboardError> {
        self.conn
            .flush()
            .map_err(|e| ClipboardError::Transport(e.to_string()))
    }
}
