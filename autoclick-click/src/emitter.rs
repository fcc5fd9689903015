//! ClickEmitter (C6): resolves the deepest clickable child under a point
//! and posts a synthetic left-click as a `WM_LBUTTONDOWN`/`WM_LBUTTONUP`
//! pair, never moving the real cursor.

use crate::error::Result;

const MAX_CHILD_DEPTH: u32 = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenClickOptions {
    pub enhanced_window_finding: bool,
    pub verify_window: bool,
    pub send_mousemove: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientClickOptions {
    pub find_deep_child: bool,
    pub verify_window: bool,
    pub send_mousemove: bool,
}

fn make_lparam(x: i32, y: i32) -> isize {
    (((y & 0xFFFF) << 16) | (x & 0xFFFF)) as isize
}

#[derive(Default)]
pub struct ClickEmitter;

impl ClickEmitter {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the window under screen point `(x, y)`, optionally walking
    /// down to its deepest clickable child, then clicks it.
    pub fn click_screen(&self, x: i32, y: i32, options: ScreenClickOptions) -> Result<()> {
        imp::click_screen(x, y, options)
    }

    /// Clicks at client-area point `(cx, cy)` of `hwnd` directly, optionally
    /// resolving the deepest clickable child first.
    pub fn click_client(&self, hwnd: isize, cx: i32, cy: i32, options: ClientClickOptions) -> Result<()> {
        imp::click_client(hwnd, cx, cy, options)
    }
}

#[cfg(target_os = "windows")]
mod imp {
    use super::{ClientClickOptions, ScreenClickOptions, make_lparam, MAX_CHILD_DEPTH};
    use crate::error::{ClickError, Result};
    use windows::Win32::Foundation::{HWND, LPARAM, POINT, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        ChildWindowFromPointEx, CWP_SKIPDISABLED, CWP_SKIPINVISIBLE, CWP_SKIPTRANSPARENT,
        MapWindowPoints, PostMessageW, ScreenToClient, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
        WindowFromPoint,
    };

    /// Walks down from `root` toward the deepest enabled, visible, opaque
    /// child under `point` (given in `root`'s client coordinates), capped
    /// at [`MAX_CHILD_DEPTH`] levels. Returns the resolved window and the
    /// point translated into its client coordinate space.
    fn resolve_deepest_child(root: HWND, mut point: POINT) -> (HWND, POINT) {
        let mut current = root;
        for _ in 0..MAX_CHILD_DEPTH {
            let flags = CWP_SKIPINVISIBLE | CWP_SKIPDISABLED | CWP_SKIPTRANSPARENT;
            let child = unsafe { ChildWindowFromPointEx(current, point, flags) };
            match child {
                Some(c) if c != current => {
                    let mut pts = [point];
                    unsafe { MapWindowPoints(Some(current), Some(c), &mut pts) };
                    point = pts[0];
                    current = c;
                }
                _ => break,
            }
        }
        (current, point)
    }

    fn post_click(hwnd: HWND, point: POINT, send_mousemove: bool) -> Result<()> {
        let lparam = LPARAM(make_lparam(point.x, point.y));
        if send_mousemove {
            unsafe { PostMessageW(Some(hwnd), WM_MOUSEMOVE, WPARAM(0), lparam) }
                .map_err(|e| ClickError::PostMessage(e.to_string()))?;
        }
        unsafe { PostMessageW(Some(hwnd), WM_LBUTTONDOWN, WPARAM(1), lparam) }
            .map_err(|e| ClickError::PostMessage(e.to_string()))?;
        unsafe { PostMessageW(Some(hwnd), WM_LBUTTONUP, WPARAM(0), lparam) }
            .map_err(|e| ClickError::PostMessage(e.to_string()))?;
        Ok(())
    }

    pub fn click_screen(x: i32, y: i32, options: ScreenClickOptions) -> Result<()> {
        let monitors = autoclick_capture::win32::enumerate_monitors();
        if !monitors.iter().any(|m| m.contains(x, y)) {
            return Err(ClickError::OutOfMonitorBounds(x, y));
        }

        let screen_point = POINT { x, y };
        let hwnd = unsafe { WindowFromPoint(screen_point) };
        if hwnd.0.is_null() {
            return Err(ClickError::WindowGone);
        }

        if options.verify_window && !autoclick_capture::win32::is_window_enabled(hwnd.0 as isize) {
            return Err(ClickError::WindowDisabled);
        }

        let mut client_point = screen_point;
        unsafe { ScreenToClient(hwnd, &mut client_point) };

        let (target, point) = if options.enhanced_window_finding {
            resolve_deepest_child(hwnd, client_point)
        } else {
            (hwnd, client_point)
        };

        post_click(target, point, options.send_mousemove)
    }

    pub fn click_client(hwnd: isize, cx: i32, cy: i32, options: ClientClickOptions) -> Result<()> {
        if !autoclick_capture::win32::is_window(hwnd) {
            return Err(ClickError::WindowGone);
        }
        if options.verify_window && !autoclick_capture::win32::is_window_enabled(hwnd) {
            return Err(ClickError::WindowDisabled);
        }

        let root = HWND(hwnd as *mut _);
        let point = POINT { x: cx, y: cy };
        let (target, point) = if options.find_deep_child {
            resolve_deepest_child(root, point)
        } else {
            (root, point)
        };

        post_click(target, point, options.send_mousemove)
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use super::{ClientClickOptions, ScreenClickOptions};
    use crate::error::{ClickError, Result};

    pub fn click_screen(_x: i32, _y: i32, _options: ScreenClickOptions) -> Result<()> {
        Err(ClickError::Unsupported)
    }

    pub fn click_client(_hwnd: isize, _cx: i32, _cy: i32, _options: ClientClickOptions) -> Result<()> {
        Err(ClickError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lparam_packs_x_in_low_word_and_y_in_high_word() {
        let packed = make_lparam(0x1234, 0x5678) as u32;
        assert_eq!(packed & 0xFFFF, 0x1234);
        assert_eq!((packed >> 16) & 0xFFFF, 0x5678);
    }

    #[test]
    fn lparam_handles_negative_coordinates_via_16_bit_wraparound() {
        let packed = make_lparam(-1, -1) as u32;
        assert_eq!(packed, 0xFFFF_FFFF);
    }
}
