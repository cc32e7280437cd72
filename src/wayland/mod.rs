//! Wayland transport — `wl_data_device_manager` and
//! `zwp_primary_selection_device_manager_v1` behind the clipboard core.
//!
//! The connection, event queue and [`Negotiator`] live on one dispatch
//! thread (see [`thread`]). Everything else talks to it through a
//! [`ClipboardHandle`].

mod dispatch;
mod input;
mod thread;
mod transport;

use crate::clipboard::Negotiator;

pub use thread::{ClipboardHandle, spawn};

use input::InputState;
use transport::WaylandTransport;

/// Wayland transport errors.
#[derive(Debug, thiserror::Error)]
pub enum WaylandError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("registry: {0}")]
    Registry(String),
    #[error("compositor does not advertise {0}")]
    MissingGlobal(&'static str),
    #[error("dispatch: {0}")]
    Dispatch(String),
    #[error("backend: {0}")]
    Backend(String),
    #[error("dispatch thread exited before it was ready")]
    ThreadGone,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dispatch state for the event queue.
pub(crate) struct WaylandState {
    pub clipboard: Negotiator<WaylandTransport>,
    pub input: InputState,
}
