//! Keyboard serial tracking.
//!
//! Ownership changes must carry the serial of a recent input event. We
//! keep the latest serial seen on `wl_keyboard` enter and key events.

use wayland_client::protocol::wl_keyboard::WlKeyboard;

use crate::clipboard::Serial;

#[derive(Debug, Default)]
pub(crate) struct InputState {
    pub keyboard: Option<WlKeyboard>,
    enter_serial: Option<Serial>,
    latest_serial: Option<Serial>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enter(&mut self, serial: u32) {
        self.enter_serial = Some(Serial(serial));
        self.latest_serial = Some(Serial(serial));
    }

    pub fn record_key(&mut self, serial: u32) {
        self.latest_serial = Some(Serial(serial));
    }

    pub fn record_leave(&mut self, serial: u32) {
        self.latest_serial = Some(Serial(serial));
    }

    /// Serial of the last keyboard enter, if focus was ever received.
    pub fn enter_serial(&self) -> Option<Serial> {
        self.enter_serial
    }

    /// Most recent keyboard serial of any kind.
    pub fn latest_serial(&self) -> Option<Serial> {
        self.latest_serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_serial() {
        let input = InputState::new();
        assert_eq!(input.enter_serial(), None);
        assert_eq!(input.latest_serial(), None);
    }

    #[test]
    fn key_updates_latest_but_not_enter() {
        let mut input = InputState::new();
        input.record_enter(10);
        input.record_key(12);
        assert_eq!(input.enter_serial(), Some(Serial(10)));
        assert_eq!(input.latest_serial(), Some(Serial(12)));
    }

    #[test]
    fn leave_keeps_enter_serial() {
        let mut input = InputState::new();
        input.record_enter(3);
        input.record_leave(4);
        assert_eq!(input.enter_serial(), Some(Serial(3)));
        assert_eq!(input.latest_serial(), Some(Serial(4)));
    }
}
