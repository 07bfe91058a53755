//! The engine → host callback surface.
//!
//! Everything the screen needs from its embedder goes through one trait with
//! no-op defaults, so hosts implement exactly the events they care about.
//! All callbacks fire synchronously on the engine thread, in the order the
//! triggering bytes were processed.

/// Cursor blink component of DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorDisplay {
    Steady,
    #[default]
    Blink,
}

/// Cursor shape component of DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underscore,
    Bar,
    Rectangle,
}

/// Mouse reporting protocol selected by DECSET 9/1000/1001/1002/1003.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseProtocol {
    X10,
    NormalTracking,
    HighlightTracking,
    ButtonTracking,
    AnyEventTracking,
}

/// Mouse coordinate encoding selected by DECSET 1005/1006/1015.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseTransport {
    #[default]
    Default,
    Extended,
    Sgr,
    Urxvt,
}

/// Wheel-event translation selected by DECSET 1007.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseWheelMode {
    #[default]
    Default,
    NormalCursorKeys,
    ApplicationCursorKeys,
}

/// Which grid is active after a buffer switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenBuffer {
    Primary,
    Alternate,
}

/// Host callback surface.
///
/// Default implementations ignore every event; [`NullHandler`] is the
/// canonical do-nothing instance for tests and headless use.
#[allow(unused_variables)]
pub trait EventHandler {
    /// Emit engine output (reports, query replies) toward the PTY. Replies
    /// are best-effort; a host with a closed channel simply drops them.
    fn reply(&mut self, data: &[u8]) {}

    /// BEL reached the screen.
    fn bell(&mut self) {}

    /// OSC 0/2 window title change.
    fn set_window_title(&mut self, title: &str) {}

    /// XTWINOPS 22: push the current title.
    fn save_window_title(&mut self) {}

    /// XTWINOPS 23: pop a previously pushed title.
    fn restore_window_title(&mut self) {}

    /// DECSCUSR cursor style change.
    fn set_cursor_style(&mut self, display: CursorDisplay, shape: CursorShape) {}

    /// DECTCEM visibility change.
    fn set_cursor_visibility(&mut self, visible: bool) {}

    /// A mouse protocol was enabled or disabled.
    fn set_mouse_protocol(&mut self, protocol: MouseProtocol, enable: bool) {}

    /// The mouse coordinate transport changed.
    fn set_mouse_transport(&mut self, transport: MouseTransport) {}

    /// The wheel translation mode changed.
    fn set_mouse_wheel_mode(&mut self, mode: MouseWheelMode) {}

    /// DECCKM.
    fn use_application_cursor_keys(&mut self, enable: bool) {}

    /// DECKPAM / DECKPNM.
    fn set_application_keypad_mode(&mut self, enable: bool) {}

    /// DECSET 2004.
    fn set_bracketed_paste(&mut self, enable: bool) {}

    /// DECSET 1004.
    fn set_generate_focus_events(&mut self, enable: bool) {}

    /// The active grid switched between primary and alternate.
    fn buffer_changed(&mut self, buffer: ScreenBuffer) {}

    /// ED 3 wiped the history ring.
    fn scrollback_cleared(&mut self) {}

    /// RIS completed.
    fn hard_reset_happened(&mut self) {}

    /// Visible content changed; the host may schedule a repaint.
    fn screen_updated(&mut self) {}

    /// XTWINOPS 4/8: the application asked for a window resize.
    fn resize_window(&mut self, width: u16, height: u16, in_pixels: bool) {}

    /// OSC 777/9-style notification.
    fn notify(&mut self, title: &str, body: &str) {}

    /// A state dump was requested (diagnostics).
    fn dump_state(&mut self) {}

    /// OSC 52: the application wrote the clipboard. `selection` names the
    /// target ("c", "p", "s", ...); `data` is the decoded payload.
    fn set_clipboard(&mut self, selection: &str, data: &[u8]) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl EventHandler for NullHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handler_accepts_everything() {
        let mut h = NullHandler;
        h.reply(b"\x1b[0n");
        h.bell();
        h.set_window_title("x");
        h.buffer_changed(ScreenBuffer::Alternate);
        h.set_cursor_style(CursorDisplay::Steady, CursorShape::Bar);
    }
}
