//! Remote input injection: mouse and keyboard events replayed into the
//! host OS.
//!
//! # Platform
//!
//! [`SystemInputInjector`] uses Win32 `SendInput` and is Windows-only.
//! On other platforms the type is defined but all methods return an
//! error. The key-name table is platform-independent and unit-tested
//! everywhere.

use crate::error::GlintError;

// ── Event vocabulary ─────────────────────────────────────────────

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Down,
    Up,
}

/// Which mouse button to toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Injects mouse and keyboard events into the OS input stream.
pub trait InputInjector: Send + Sync {
    /// Move the cursor to absolute display coordinates.
    fn move_mouse(&self, x: i32, y: i32) -> Result<(), GlintError>;

    /// Press or release a mouse button at the current cursor position.
    fn toggle_mouse_button(&self, state: ButtonState, button: MouseButton)
        -> Result<(), GlintError>;

    /// Tap (press and release) a named key, optionally holding a
    /// modifier around it.
    fn tap_key(&self, key: &str, modifier: Option<&str>) -> Result<(), GlintError>;
}

// ── Key-name table ───────────────────────────────────────────────

/// Resolve a wire key name to a Win32 virtual-key code.
///
/// Accepts single characters (letters, digits) and the common named
/// keys, case-insensitively.
pub fn virtual_key(name: &str) -> Option<u16> {
    let lower = name.to_ascii_lowercase();

    if lower.len() == 1 {
        let ch = lower.as_bytes()[0];
        return match ch {
            b'a'..=b'z' => Some((ch as u16) - (b'a' as u16) + 0x41),
            b'0'..=b'9' => Some((ch as u16) - (b'0' as u16) + 0x30),
            b' ' => Some(0x20),
            _ => None,
        };
    }

    let vk = match lower.as_str() {
        "enter" | "return" => 0x0D,
        "tab" => 0x09,
        "backspace" => 0x08,
        "delete" => 0x2E,
        "escape" | "esc" => 0x1B,
        "space" => 0x20,
        "up" => 0x26,
        "down" => 0x28,
        "left" => 0x25,
        "right" => 0x27,
        "home" => 0x24,
        "end" => 0x23,
        "pageup" => 0x21,
        "pagedown" => 0x22,
        "insert" => 0x2D,
        "f1" => 0x70,
        "f2" => 0x71,
        "f3" => 0x72,
        "f4" => 0x73,
        "f5" => 0x74,
        "f6" => 0x75,
        "f7" => 0x76,
        "f8" => 0x77,
        "f9" => 0x78,
        "f10" => 0x79,
        "f11" => 0x7A,
        "f12" => 0x7B,
        _ => return None,
    };
    Some(vk)
}

/// Resolve a wire modifier name to its virtual-key code.
pub fn modifier_key(name: &str) -> Option<u16> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Some(0x10),
        "ctrl" | "control" => Some(0x11),
        "alt" => Some(0x12),
        "meta" | "cmd" | "win" | "super" => Some(0x5B),
        _ => None,
    }
}

// ── SystemInputInjector ──────────────────────────────────────────

/// `SendInput`-backed injector for the host desktop session.
#[derive(Debug, Default)]
pub struct SystemInputInjector;

impl SystemInputInjector {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
        MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
        MOUSEEVENTF_RIGHTUP, MOUSEINPUT, VIRTUAL_KEY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    fn send(inputs: &[INPUT]) -> Result<(), GlintError> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(GlintError::Input(format!(
                "SendInput injected {sent} of {} events",
                inputs.len()
            )));
        }
        Ok(())
    }

    fn mouse_input(dx: i32, dy: i32, flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn key_input(vk: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    impl InputInjector for SystemInputInjector {
        fn move_mouse(&self, x: i32, y: i32) -> Result<(), GlintError> {
            let (screen_w, screen_h) = unsafe {
                (
                    GetSystemMetrics(SM_CXSCREEN),
                    GetSystemMetrics(SM_CYSCREEN),
                )
            };
            if screen_w == 0 || screen_h == 0 {
                return Err(GlintError::Input("GetSystemMetrics returned 0".into()));
            }
            // SendInput absolute coordinates are normalized to 0..65535.
            let abs_x = (x as i64 * 65535 / screen_w as i64) as i32;
            let abs_y = (y as i64 * 65535 / screen_h as i64) as i32;
            send(&[mouse_input(
                abs_x,
                abs_y,
                MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
            )])
        }

        fn toggle_mouse_button(
            &self,
            state: ButtonState,
            button: MouseButton,
        ) -> Result<(), GlintError> {
            let flags = match (button, state) {
                (MouseButton::Left, ButtonState::Down) => MOUSEEVENTF_LEFTDOWN,
                (MouseButton::Left, ButtonState::Up) => MOUSEEVENTF_LEFTUP,
                (MouseButton::Right, ButtonState::Down) => MOUSEEVENTF_RIGHTDOWN,
                (MouseButton::Right, ButtonState::Up) => MOUSEEVENTF_RIGHTUP,
                (MouseButton::Middle, ButtonState::Down) => MOUSEEVENTF_MIDDLEDOWN,
                (MouseButton::Middle, ButtonState::Up) => MOUSEEVENTF_MIDDLEUP,
            };
            send(&[mouse_input(0, 0, flags)])
        }

        fn tap_key(&self, key: &str, modifier: Option<&str>) -> Result<(), GlintError> {
            let vk = virtual_key(key).ok_or_else(|| GlintError::UnknownKey(key.to_string()))?;
            let mod_vk = modifier
                .map(|m| modifier_key(m).ok_or_else(|| GlintError::UnknownKey(m.to_string())))
                .transpose()?;

            let mut inputs = Vec::with_capacity(4);
            if let Some(m) = mod_vk {
                inputs.push(key_input(m, KEYBD_EVENT_FLAGS(0)));
            }
            inputs.push(key_input(vk, KEYBD_EVENT_FLAGS(0)));
            inputs.push(key_input(vk, KEYEVENTF_KEYUP));
            if let Some(m) = mod_vk {
                inputs.push(key_input(m, KEYEVENTF_KEYUP));
            }
            send(&inputs)
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl InputInjector for SystemInputInjector {
    fn move_mouse(&self, _x: i32, _y: i32) -> Result<(), GlintError> {
        Err(GlintError::Input(
            "input injection is only available on Windows".into(),
        ))
    }

    fn toggle_mouse_button(
        &self,
        _state: ButtonState,
        _button: MouseButton,
    ) -> Result<(), GlintError> {
        Err(GlintError::Input(
            "input injection is only available on Windows".into(),
        ))
    }

    fn tap_key(&self, _key: &str, _modifier: Option<&str>) -> Result<(), GlintError> {
        Err(GlintError::Input(
            "input injection is only available on Windows".into(),
        ))
    }
}

// ── Tests ────────────────────────────────────────────────────────
