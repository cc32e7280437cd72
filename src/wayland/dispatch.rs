//! Event routing from the Wayland queue into the clipboard core.

use wayland_client::globals::GlobalListContents;
use wayland_client::protocol::{
    wl_data_device, wl_data_device::WlDataDevice, wl_data_device_manager::WlDataDeviceManager,
    wl_data_offer, wl_data_offer::WlDataOffer, wl_data_source, wl_data_source::WlDataSource,
    wl_keyboard, wl_keyboard::WlKeyboard, wl_registry, wl_seat, wl_seat::WlSeat,
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum, event_created_child};
use wayland_protocols::wp::primary_selection::zv1::client::{
    zwp_primary_selection_device_manager_v1::ZwpPrimarySelectionDeviceManagerV1,
    zwp_primary_selection_device_v1::{self, ZwpPrimarySelectionDeviceV1},
    zwp_primary_selection_offer_v1::{self, ZwpPrimarySelectionOfferV1},
    zwp_primary_selection_source_v1::{self, ZwpPrimarySelectionSourceV1},
};

use super::WaylandState;
use super::transport::OfferProxy;
use crate::clipboard::{ClipboardKind, OfferId, SourceId};

impl WaylandState {
    fn offer_announced(&mut self, kind: ClipboardKind, proxy: OfferProxy) {
        if let Some(offer) = self.clipboard.transport_mut().track_offer(proxy) {
            self.clipboard.on_new_offer(kind, offer);
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // Globals are bound once at startup; hotplugged seats are ignored.
        if let wl_registry::Event::GlobalRemove { name } = event {
            tracing::debug!(name, "global removed");
        }
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(caps),
        } = event
            && caps.contains(wl_seat::Capability::Keyboard)
            && state.input.keyboard.is_none()
        {
            state.input.keyboard = Some(seat.get_keyboard(qh, ()));
            tracing::debug!("keyboard bound");
        }
    }
}

impl Dispatch<WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Enter { serial, .. } => state.input.record_enter(serial),
            wl_keyboard::Event::Key { serial, .. } => state.input.record_key(serial),
            wl_keyboard::Event::Leave { serial, .. } => state.input.record_leave(serial),
            _ => {}
        }
    }
}

impl Dispatch<WlDataDeviceManager, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &WlDataDeviceManager,
        _event: <WlDataDeviceManager as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpPrimarySelectionDeviceManagerV1, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &ZwpPrimarySelectionDeviceManagerV1,
        _event: <ZwpPrimarySelectionDeviceManagerV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

// -- Devices --

impl Dispatch<WlDataDevice, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlDataDevice,
        event: wl_data_device::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_device::Event::DataOffer { id } => {
                state.offer_announced(ClipboardKind::Regular, OfferProxy::Regular(id));
            }
            wl_data_device::Event::Selection { id } => {
                let offer = id.as_ref().and_then(|o| o.data::<OfferId>().copied());
                state
                    .clipboard
                    .on_selection_changed(ClipboardKind::Regular, offer);
            }
            // Drag-and-drop is not handled. Its offers are destroyed on the
            // next selection change.
            other => tracing::trace!(event = ?other, "drag-and-drop event ignored"),
        }
    }

    event_created_child!(WaylandState, WlDataDevice, [
        wl_data_device::EVT_DATA_OFFER_OPCODE => (WlDataOffer, OfferId::next()),
    ]);
}

impl Dispatch<ZwpPrimarySelectionDeviceV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZwpPrimarySelectionDeviceV1,
        event: zwp_primary_selection_device_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwp_primary_selection_device_v1::Event::DataOffer { offer } => {
                state.offer_announced(ClipboardKind::PrimarySelection, OfferProxy::Primary(offer));
            }
            zwp_primary_selection_device_v1::Event::Selection { id } => {
                let offer = id.as_ref().and_then(|o| o.data::<OfferId>().copied());
                state
                    .clipboard
                    .on_selection_changed(ClipboardKind::PrimarySelection, offer);
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, ZwpPrimarySelectionDeviceV1, [
        zwp_primary_selection_device_v1::EVT_DATA_OFFER_OPCODE => (ZwpPrimarySelectionOfferV1, OfferId::next()),
    ]);
}

// -- Offers --

impl Dispatch<WlDataOffer, OfferId> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlDataOffer,
        event: wl_data_offer::Event,
        offer: &OfferId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_data_offer::Event::Offer { mime_type } = event {
            state.clipboard.on_format(*offer, &mime_type);
        }
    }
}

impl Dispatch<ZwpPrimarySelectionOfferV1, OfferId> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZwpPrimarySelectionOfferV1,
        event: zwp_primary_selection_offer_v1::Event,
        offer: &OfferId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let zwp_primary_selection_offer_v1::Event::Offer { mime_type } = event {
            state.clipboard.on_format(*offer, &mime_type);
        }
    }
}

// -- Sources --

impl Dispatch<WlDataSource, SourceId> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlDataSource,
        event: wl_data_source::Event,
        source: &SourceId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_source::Event::Send { mime_type, fd } => {
                state.clipboard.on_send(*source, &mime_type, fd);
            }
            wl_data_source::Event::Cancelled => state.clipboard.on_cancelled(*source),
            other => tracing::trace!(%source, event = ?other, "data source event ignored"),
        }
    }
}

impl Dispatch<ZwpPrimarySelectionSourceV1, SourceId> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZwpPrimarySelectionSourceV1,
        event: zwp_primary_selection_source_v1::Event,
        source: &SourceId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwp_primary_selection_source_v1::Event::Send { mime_type, fd } => {
                state.clipboard.on_send(*source, &mime_type, fd);
            }
            zwp_primary_selection_source_v1::Event::Cancelled => {
                state.clipboard.on_cancelled(*source)
            }
            _ => {}
        }
    }
}
