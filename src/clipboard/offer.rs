//! Offer listener: remote announcements and their formats.
//!
//! Every device carries one [`OfferContext`], created by `initialize` and
//! shared by all offers that device announces. Formats are interned in
//! the negotiator's registry and recorded per offer in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::formats::FormatId;
use super::{ClipboardEvent, ClipboardKind, ClipboardOwner, Negotiator, OfferId, Transport};

/// Owner that format discoveries for one device are relayed to.
pub(super) struct OfferContext {
    pub owner: Arc<dyn ClipboardOwner>,
}

impl OfferContext {
    pub fn new(owner: Arc<dyn ClipboardOwner>) -> Self {
        Self { owner }
    }
}

impl fmt::Debug for OfferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfferContext").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(super) struct OfferRecord {
    pub kind: ClipboardKind,
    pub formats: Vec<FormatId>,
}

/// Live remote offers.
#[derive(Debug, Default)]
pub(super) struct OfferTable {
    offers: HashMap<OfferId, OfferRecord>,
}

impl OfferTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offer: OfferId, kind: ClipboardKind) {
        self.offers.insert(
            offer,
            OfferRecord {
                kind,
                formats: Vec::new(),
            },
        );
    }

    pub fn get(&self, offer: OfferId) -> Option<&OfferRecord> {
        self.offers.get(&offer)
    }

    pub fn get_mut(&mut self, offer: OfferId) -> Option<&mut OfferRecord> {
        self.offers.get_mut(&offer)
    }

    /// Drop every offer of `kind` except `keep`, returning the dropped ids.
    pub fn retain_only(&mut self, kind: ClipboardKind, keep: Option<OfferId>) -> Vec<OfferId> {
        let stale: Vec<OfferId> = self
            .offers
            .iter()
            .filter(|(id, rec)| rec.kind == kind && Some(**id) != keep)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.offers.remove(id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }
}

impl<T: Transport> Negotiator<T> {
    /// A remote client announced `offer` on the `kind` device.
    pub fn on_new_offer(&mut self, kind: ClipboardKind, offer: OfferId) {
        if !self.devices.contains_key(&kind) {
            tracing::warn!(%kind, %offer, "offer on uninitialized device — ignored");
            return;
        }
        self.offers.insert(offer, kind);
        tracing::trace!(%kind, %offer, "new offer");
    }

    /// `offer` advertises `mime_type`.
    ///
    /// Recorded for later reads and relayed to the device's owner.
    pub fn on_format(&mut self, offer: OfferId, mime_type: &str) {
        let id = self.formats.intern(mime_type);
        let Some(record) = self.offers.get_mut(offer) else {
            tracing::warn!(%offer, mime_type, "format for unknown offer — ignored");
            return;
        };
        if !record.formats.contains(&id) {
            record.formats.push(id);
        }
        let kind = record.kind;

        if let Some(device) = self.devices.get(&kind) {
            device.context.owner.format_discovered(offer, mime_type);
        }
        tracing::trace!(%kind, %offer, mime_type, "offer format");

        self.emit(ClipboardEvent::OfferFormatDiscovered {
            kind,
            offer,
            mime_type: mime_type.to_owned(),
        });
    }

    /// The selection of `kind` is now `offer`, or empty with `None`.
    ///
    /// Older offers of the same kind can no longer be read and are
    /// destroyed.
    pub fn on_selection_changed(&mut self, kind: ClipboardKind, offer: Option<OfferId>) {
        let Some(device) = self.devices.get_mut(&kind) else {
            tracing::warn!(%kind, "selection on uninitialized device — ignored");
            return;
        };
        device.selection = offer;

        for stale in self.offers.retain_only(kind, offer) {
            self.transport.destroy_offer(stale);
        }

        let formats = offer.map(|o| self.formats_of(o)).unwrap_or_default();
        match offer {
            Some(o) => {
                tracing::info!(%kind, offer = %o, formats = formats.len(), "selection changed")
            }
            None => tracing::info!(%kind, "selection cleared — clipboard empty"),
        }

        self.emit(ClipboardEvent::SelectionChanged {
            kind,
            offer,
            formats,
        });
    }

    /// Formats advertised so far by `offer`, in arrival order.
    pub fn formats(&self, offer: OfferId) -> Option<Vec<String>> {
        self.offers.get(offer).map(|_| self.formats_of(offer))
    }

    pub(super) fn offer_has_format(&self, offer: OfferId, mime_type: &str) -> bool {
        match (self.offers.get(offer), self.formats.lookup(mime_type)) {
            (Some(record), Some(id)) => record.formats.contains(&id),
            _ => false,
        }
    }

    fn formats_of(&self, offer: OfferId) -> Vec<String> {
        self.offers
            .get(offer)
            .map(|record| {
                record
                    .formats
                    .iter()
                    .filter_map(|id| self.formats.name(*id))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}
