//! Dispatch thread and the async handle that drives it.
//!
//! The thread owns the connection and the negotiator. Each turn of its
//! loop drains pending commands, flushes, then waits up to
//! `poll_interval` on the connection fd and dispatches what arrived.
//! Commands are answered over `oneshot` channels.

use std::sync::Arc;
use std::thread::JoinHandle;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::{Connection, EventQueue};
use wayland_protocols::wp::primary_selection::zv1::client::zwp_primary_selection_device_manager_v1::ZwpPrimarySelectionDeviceManagerV1;

use super::transport::WaylandTransport;
use super::{InputState, WaylandError, WaylandState};
use crate::clipboard::{
    ClipboardConfig, ClipboardError, ClipboardEvent, ClipboardKind, ClipboardOwner, Content,
    Negotiator, OfferId, Serial, SourceId, Transport,
};

type Reply<T> = oneshot::Sender<Result<T, ClipboardError>>;

/// Snapshot of one clipboard's current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInfo {
    pub offer: OfferId,
    pub formats: Vec<String>,
}

enum Command {
    Supports {
        kind: ClipboardKind,
        reply: oneshot::Sender<bool>,
    },
    Initialize {
        kind: ClipboardKind,
        owner: Arc<dyn ClipboardOwner>,
        reply: Reply<()>,
    },
    Claim {
        kind: ClipboardKind,
        serial: Serial,
        formats: Vec<String>,
        owner: Arc<dyn ClipboardOwner>,
        content: Content,
        reply: Reply<SourceId>,
    },
    Release {
        kind: ClipboardKind,
        serial: Serial,
        reply: Reply<()>,
    },
    Selection {
        kind: ClipboardKind,
        reply: oneshot::Sender<Option<SelectionInfo>>,
    },
    Read {
        kind: ClipboardKind,
        mime_type: String,
        reply: Reply<Vec<u8>>,
    },
    KeyboardSerial {
        reply: oneshot::Sender<Option<Serial>>,
    },
    Shutdown,
}

/// Async front end to the dispatch thread.
pub struct ClipboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    thread: Option<JoinHandle<()>>,
}

/// Connect to the compositor and start the dispatch thread.
///
/// Returns once the globals are bound and the seat has been announced,
/// together with the receiver for clipboard events.
pub async fn spawn(
    config: ClipboardConfig,
) -> Result<(ClipboardHandle, mpsc::UnboundedReceiver<ClipboardEvent>), WaylandError> {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    let thread = std::thread::Builder::new()
        .name("wayland-dispatch".into())
        .spawn(move || {
            let (queue, mut state, events) = match connect(config) {
                Ok(parts) => parts,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if ready_tx.send(Ok(events)).is_err() {
                return;
            }
            match run(queue, &mut state, command_rx, config) {
                Ok(()) => tracing::debug!(
                    live_payloads = state.clipboard.live_payloads(),
                    "dispatch thread finished"
                ),
                Err(e) => tracing::error!(error = %e, "dispatch thread failed"),
            }
        })?;

    let events = ready_rx.await.map_err(|_| WaylandError::ThreadGone)??;
    tracing::info!("connected to Wayland compositor");

    let handle = ClipboardHandle {
        commands,
        thread: Some(thread),
    };
    Ok((handle, events))
}

fn connect(
    config: ClipboardConfig,
) -> Result<
    (
        EventQueue<WaylandState>,
        WaylandState,
        mpsc::UnboundedReceiver<ClipboardEvent>,
    ),
    WaylandError,
> {
    let conn = Connection::connect_to_env().map_err(|e| WaylandError::Connect(e.to_string()))?;
    let (globals, mut queue) = registry_queue_init::<WaylandState>(&conn)
        .map_err(|e| WaylandError::Registry(e.to_string()))?;
    let qh = queue.handle();

    let seat: WlSeat = globals
        .bind(&qh, 1..=7, ())
        .map_err(|_| WaylandError::MissingGlobal("wl_seat"))?;
    let data_device_manager: WlDataDeviceManager = globals
        .bind(&qh, 1..=3, ())
        .map_err(|_| WaylandError::MissingGlobal("wl_data_device_manager"))?;
    let primary_manager: Option<ZwpPrimarySelectionDeviceManagerV1> =
        globals.bind(&qh, 1..=1, ()).ok();
    if primary_manager.is_none() {
        tracing::info!("compositor has no primary selection support");
    }

    let transport = WaylandTransport::new(
        conn.clone(),
        qh,
        seat,
        data_device_manager,
        primary_manager,
    );
    let (clipboard, events) = Negotiator::new(transport, config);
    let mut state = WaylandState {
        clipboard,
        input: InputState::new(),
    };

    // Seat capabilities arrive here; the keyboard is bound in dispatch.
    queue
        .roundtrip(&mut state)
        .map_err(|e| WaylandError::Dispatch(e.to_string()))?;

    Ok((queue, state, events))
}

fn run(
    mut queue: EventQueue<WaylandState>,
    state: &mut WaylandState,
    mut commands: mpsc::UnboundedReceiver<Command>,
    config: ClipboardConfig,
) -> Result<(), WaylandError> {
    let poll_ms = config.poll_interval.as_millis().clamp(1, u16::MAX as u128) as u16;

    loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return Ok(()),
                Ok(command) => handle_command(state, command),
                Err(TryRecvError::Empty) => break,
            }
        }

        queue
            .flush()
            .map_err(|e| WaylandError::Backend(e.to_string()))?;
        queue
            .dispatch_pending(state)
            .map_err(|e| WaylandError::Dispatch(e.to_string()))?;

        // Events already queued; dispatch them before blocking.
        let Some(guard) = queue.prepare_read() else {
            continue;
        };

        let ready = {
            let mut fds = [PollFd::new(guard.connection_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(poll_ms))
        };
        match ready {
            Ok(0) => drop(guard),
            Ok(_) => {
                if let Err(e) = guard.read() {
                    match e {
                        wayland_client::backend::WaylandError::Io(io)
                            if io.kind() == std::io::ErrorKind::WouldBlock => {}
                        other => return Err(WaylandError::Backend(other.to_string())),
                    }
                }
            }
            Err(nix::Error::EINTR) => drop(guard),
            Err(e) => return Err(WaylandError::Io(e.into())),
        }

        queue
            .dispatch_pending(state)
            .map_err(|e| WaylandError::Dispatch(e.to_string()))?;
    }
}

fn handle_command(state: &mut WaylandState, command: Command) {
    let clipboard = &mut state.clipboard;
    match command {
        Command::Supports { kind, reply } => {
            let _ = reply.send(clipboard.transport().supports(kind));
        }
        Command::Initialize { kind, owner, reply } => {
            let _ = reply.send(clipboard.initialize(kind, owner).map(|_| ()));
        }
        Command::Claim {
            kind,
            serial,
            formats,
            owner,
            content,
            reply,
        } => {
            let _ = reply.send(clipboard.claim(kind, serial, &formats, owner, content));
        }
        Command::Release {
            kind,
            serial,
            reply,
        } => {
            let _ = reply.send(clipboard.release(kind, serial));
        }
        Command::Selection { kind, reply } => {
            let info = clipboard.selection(kind).and_then(|offer| {
                clipboard
                    .formats(offer)
                    .map(|formats| SelectionInfo { offer, formats })
            });
            let _ = reply.send(info);
        }
        Command::Read {
            kind,
            mime_type,
            reply,
        } => {
            let offer = clipboard.selection(kind);
            let _ = reply.send(clipboard.read(offer, &mime_type));
        }
        Command::KeyboardSerial { reply } => {
            let _ = reply.send(state.input.enter_serial().or(state.input.latest_serial()));
        }
        Command::Shutdown => {}
    }
}

impl ClipboardHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClipboardError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ClipboardError::Disconnected)?;
        rx.await.map_err(|_| ClipboardError::Disconnected)
    }

    /// Whether the compositor supports `kind`.
    pub async fn supports(&self, kind: ClipboardKind) -> Result<bool, ClipboardError> {
        self.request(|reply| Command::Supports { kind, reply }).await
    }

    pub async fn initialize(
        &self,
        kind: ClipboardKind,
        owner: Arc<dyn ClipboardOwner>,
    ) -> Result<(), ClipboardError> {
        self.request(|reply| Command::Initialize { kind, owner, reply })
            .await?
    }

    pub async fn claim(
        &self,
        kind: ClipboardKind,
        serial: Serial,
        formats: Vec<String>,
        owner: Arc<dyn ClipboardOwner>,
        content: Content,
    ) -> Result<SourceId, ClipboardError> {
        self.request(|reply| Command::Claim {
            kind,
            serial,
            formats,
            owner,
            content,
            reply,
        })
        .await?
    }

    pub async fn release(&self, kind: ClipboardKind, serial: Serial) -> Result<(), ClipboardError> {
        self.request(|reply| Command::Release {
            kind,
            serial,
            reply,
        })
        .await?
    }

    /// Current selection of `kind` and the formats it advertised.
    pub async fn selection(
        &self,
        kind: ClipboardKind,
    ) -> Result<Option<SelectionInfo>, ClipboardError> {
        self.request(|reply| Command::Selection { kind, reply })
            .await
    }

    /// Read `mime_type` from the current selection of `kind`.
    ///
    /// Blocks the dispatch thread until the data arrives or the read
    /// timeout expires. Reading a selection this process owns therefore
    /// times out: the send request cannot be dispatched meanwhile.
    pub async fn read(
        &self,
        kind: ClipboardKind,
        mime_type: impl Into<String>,
    ) -> Result<Vec<u8>, ClipboardError> {
        let mime_type = mime_type.into();
        self.request(|reply| Command::Read {
            kind,
            mime_type,
            reply,
        })
        .await?
    }

    /// Best keyboard serial seen so far, preferring the focus-enter one.
    pub async fn keyboard_serial(&self) -> Result<Option<Serial>, ClipboardError> {
        self.request(|reply| Command::KeyboardSerial { reply }).await
    }

    /// Stop the dispatch thread and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                tracing::warn!("dispatch thread did not exit cleanly");
            }
        }
    }
}
