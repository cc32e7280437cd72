//! Clipboard protocol core — ownership negotiation and content transfer.
//!
//! Transport-agnostic state machine for the two clipboard kinds (the
//! regular clipboard and the primary selection). A single [`Negotiator`]
//! owns one device per kind, the in-flight transfer payloads, and the
//! table of remote offers. Transport events are fed in through the
//! listener methods (`on_send`, `on_cancelled`, `on_new_offer`,
//! `on_format`, `on_selection_changed`); each one pushes a typed
//! [`ClipboardEvent`] to the owning controller.
//!
//! Architecture: single writer. The negotiator is owned by the thread
//! that dispatches transport events, and claim/release/read run on that
//! same thread. There is no internal locking.

mod device;
pub mod formats;
mod offer;
mod payload;
mod receive;
mod source;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::any::Any;
use std::fmt;
use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

pub use device::Negotiator;
pub use transport::Transport;

/// Which clipboard a device, source or offer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardKind {
    /// The regular (copy/paste) clipboard.
    Regular,
    /// The primary selection (select/middle-click).
    PrimarySelection,
}

impl ClipboardKind {
    pub const ALL: [ClipboardKind; 2] = [ClipboardKind::Regular, ClipboardKind::PrimarySelection];
}

impl fmt::Display for ClipboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardKind::Regular => f.pad("regular"),
            ClipboardKind::PrimarySelection => f.pad("primary"),
        }
    }
}

/// Input-event serial that authorizes an ownership change.
///
/// Passed through to the transport untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Serial(pub u32);

impl From<u32> for Serial {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(u64);

        impl $name {
            /// Allocate the next process-unique id.
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

object_id!(
    /// Local source: content this process offers for a selection.
    SourceId,
    "source"
);
object_id!(
    /// Remote offer: an announcement of content owned by another client.
    OfferId,
    "offer"
);
object_id!(
    /// Transport device object for one clipboard kind.
    DeviceHandle,
    "device"
);

/// Opaque data holder being offered. Only the owner interprets it.
pub type Content = Arc<dyn Any + Send + Sync>;

/// Host callback surface, implemented by the controller that owns the
/// clipboard contents.
///
/// `Send + Sync` because owners are created on the controller side and
/// handed to the dispatch thread.
pub trait ClipboardOwner: Send + Sync {
    /// Write the representation of `content` in `mime_type` into
    /// `channel`. The channel is closed by the caller afterwards.
    fn transfer(&self, content: &Content, mime_type: &str, channel: &mut File)
    -> std::io::Result<()>;

    /// A remote offer advertises `mime_type`. Arrival order carries no
    /// priority.
    fn format_discovered(&self, _offer: OfferId, _mime_type: &str) {}
}

/// Typed notification pushed by the listeners, in transport order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipboardEvent {
    /// A remote offer advertised another format.
    OfferFormatDiscovered {
        kind: ClipboardKind,
        offer: OfferId,
        mime_type: String,
    },
    /// A remote consumer asked one of our sources for data.
    SendRequested {
        kind: ClipboardKind,
        source: SourceId,
        mime_type: String,
        /// `false` when the owner's transfer callback failed.
        delivered: bool,
    },
    /// One of our sources lost the selection and was destroyed.
    Cancelled { kind: ClipboardKind, source: SourceId },
    /// The selection of `kind` now points at `offer` (`None` = empty).
    SelectionChanged {
        kind: ClipboardKind,
        offer: Option<OfferId>,
        formats: Vec<String>,
    },
}

/// Runtime configuration for the negotiator and the dispatch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardConfig {
    /// Upper bound on a blocking `read`.
    pub read_timeout: Duration,
    /// How long the dispatch thread waits on the connection before
    /// checking for commands again.
    pub poll_interval: Duration,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Errors returned by the clipboard core.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// A device of this kind already exists for this process.
    #[error("{0} clipboard device already initialized")]
    AlreadyInitialized(ClipboardKind),

    /// An operation referenced a kind whose device was never created.
    #[error("{0} clipboard device not initialized")]
    NotInitialized(ClipboardKind),

    /// Capability or format not available (e.g. no primary-selection
    /// support on this compositor, unknown offer, unadvertised MIME type).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A claim was made with nothing to offer.
    #[error("no formats to offer")]
    NoFormats,

    /// The transport could not allocate a protocol object.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    /// The pipe for a transfer could not be created.
    #[error("channel failure: {0}")]
    ChannelFailure(#[source] std::io::Error),

    /// The remote owner did not finish writing in time.
    #[error("timed out after {0:?} waiting for clipboard data")]
    Timeout(Duration),

    /// The transport rejected or failed to send a request.
    #[error("transport: {0}")]
    Transport(String),

    /// The dispatch thread is gone.
    #[error("clipboard dispatch thread disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
