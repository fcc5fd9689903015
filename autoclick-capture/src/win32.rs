//! Win32 window/monitor enumeration and the minimized-window restore dance.
//! `windows-capture` owns the graphics-capture surface itself; everything
//! here is plain Win32 bookkeeping around it.

/// Wraps a raw `HWND` so it can cross a `std::thread::spawn` boundary.
/// `HWND` is a thin pointer-sized handle with no thread affinity of its
/// own; the affinity lives in the message queue of the thread that created
/// it, which every access here already respects via `Is*` queries rather
/// than direct message-queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendHwnd(pub isize);

unsafe impl Send for SendHwnd {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedWindow {
    pub hwnd: isize,
    pub title: String,
    pub class_name: String,
    pub process_name: String,
    pub process_path: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorRect {
    pub index: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl MonitorRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

#[cfg(target_os = "windows")]
mod win {
    use super::{EnumeratedWindow, MonitorRect};
    use crate::error::{CaptureError, Result};
    use std::time::{Duration, Instant};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO,
    };
    use windows::Win32::System::ProcessStatus::GetModuleBaseNameW;
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetClassNameW, GetClientRect, GetWindowTextLengthW, GetWindowTextW,
        GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowEnabled, IsWindowVisible,
        SW_MINIMIZE, SW_SHOWNOACTIVATE, ShowWindow,
    };

    fn window_title(hwnd: HWND) -> String {
        let len = unsafe { GetWindowTextLengthW(hwnd) };
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u16; len as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
        String::from_utf16_lossy(&buf[..copied.max(0) as usize])
    }

    fn window_class(hwnd: HWND) -> String {
        let mut buf = [0u16; 256];
        let copied = unsafe { GetClassNameW(hwnd, &mut buf) };
        String::from_utf16_lossy(&buf[..copied.max(0) as usize])
    }

    fn process_name(hwnd: HWND) -> (String, String) {
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        if pid == 0 {
            return (String::new(), String::new());
        }
        let Ok(process) = (unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) })
        else {
            return (String::new(), String::new());
        };
        let mut buf = [0u16; 512];
        let copied = unsafe { GetModuleBaseNameW(process, None, &mut buf) };
        let base_name = String::from_utf16_lossy(&buf[..copied.max(0) as usize]);
        let _ = unsafe { windows::Win32::Foundation::CloseHandle(process) };
        (base_name.clone(), base_name)
    }

    unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let out = unsafe { &mut *(lparam.0 as *mut Vec<EnumeratedWindow>) };
        let visible = unsafe { IsWindowVisible(hwnd) }.as_bool();
        let title = window_title(hwnd);
        let class_name = window_class(hwnd);
        let (process_name, process_path) = process_name(hwnd);
        out.push(EnumeratedWindow {
            hwnd: hwnd.0 as isize,
            title,
            class_name,
            process_name,
            process_path,
            visible,
        });
        BOOL::from(true)
    }

    /// Enumerates all top-level windows. Mirrors the unsafe
    /// `extern "system"` callback-over-raw-pointer pattern used for Win32
    /// enumeration APIs throughout the pack.
    pub fn enumerate_windows() -> Result<Vec<EnumeratedWindow>> {
        let mut collected: Vec<EnumeratedWindow> = Vec::new();
        let lparam = LPARAM(&mut collected as *mut _ as isize);
        unsafe { EnumWindows(Some(enum_windows_proc), lparam) }
            .map_err(|e| CaptureError::CaptureStart(e.to_string()))?;
        Ok(collected)
    }

    pub fn is_window(hwnd: isize) -> bool {
        unsafe { IsWindow(Some(HWND(hwnd as *mut _))) }.as_bool()
    }

    pub fn is_window_enabled(hwnd: isize) -> bool {
        unsafe { IsWindowEnabled(HWND(hwnd as *mut _)) }.as_bool()
    }

    pub fn is_iconic(hwnd: isize) -> bool {
        unsafe { IsIconic(HWND(hwnd as *mut _)) }.as_bool()
    }

    /// Restores an iconic window without activating it, polling in 10ms
    /// steps up to 100ms for `IsIconic` to clear. Never calls any API that
    /// would bring the window to the foreground.
    pub fn restore_without_activate_if_iconic(hwnd: isize) -> bool {
        if !is_iconic(hwnd) {
            return false;
        }
        let h = HWND(hwnd as *mut _);
        let _ = unsafe { ShowWindow(h, SW_SHOWNOACTIVATE) };
        let deadline = Instant::now() + Duration::from_millis(100);
        while Instant::now() < deadline && is_iconic(hwnd) {
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    pub fn minimize(hwnd: isize) {
        let h = HWND(hwnd as *mut _);
        let _ = unsafe { ShowWindow(h, SW_MINIMIZE) };
    }

    /// The window's client area size, used to scale match coordinates
    /// (in capture-content pixels) down to client-area pixels before
    /// clicking.
    pub fn client_size(hwnd: isize) -> Option<(u32, u32)> {
        let mut rect = RECT::default();
        let ok = unsafe { GetClientRect(HWND(hwnd as *mut _), &mut rect) };
        if ok.is_err() {
            return None;
        }
        Some(((rect.right - rect.left) as u32, (rect.bottom - rect.top) as u32))
    }

    unsafe extern "system" fn enum_monitors_proc(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let out = unsafe { &mut *(lparam.0 as *mut Vec<MonitorRect>) };
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if unsafe { GetMonitorInfoW(hmonitor, &mut info) }.as_bool() {
            let index = out.len() as u32;
            out.push(MonitorRect {
                index,
                left: info.rcMonitor.left,
                top: info.rcMonitor.top,
                right: info.rcMonitor.right,
                bottom: info.rcMonitor.bottom,
            });
        }
        BOOL::from(true)
    }

    pub fn enumerate_monitors() -> Vec<MonitorRect> {
        let mut collected: Vec<MonitorRect> = Vec::new();
        let lparam = LPARAM(&mut collected as *mut _ as isize);
        let _ = unsafe { EnumDisplayMonitors(None, None, Some(enum_monitors_proc), lparam) };
        collected
    }
}

#[cfg(target_os = "windows")]
pub use win::{
    client_size, enumerate_monitors, enumerate_windows, is_iconic, is_window, is_window_enabled,
    minimize, restore_without_activate_if_iconic,
};

#[cfg(not(target_os = "windows"))]
pub fn enumerate_windows() -> crate::error::Result<Vec<EnumeratedWindow>> {
    Err(crate::error::CaptureError::CaptureStart(
        "window enumeration requires Windows".into(),
    ))
}

#[cfg(not(target_os = "windows"))]
pub fn enumerate_monitors() -> Vec<MonitorRect> {
    Vec::new()
}

#[cfg(not(target_os = "windows"))]
pub fn is_window(_hwnd: isize) -> bool {
    false
}

#[cfg(not(target_os = "windows"))]
pub fn is_window_enabled(_hwnd: isize) -> bool {
    false
}

#[cfg(not(target_os = "windows"))]
pub fn is_iconic(_hwnd: isize) -> bool {
    false
}

#[cfg(not(target_os = "windows"))]
pub fn restore_without_activate_if_iconic(_hwnd: isize) -> bool {
    false
}

#[cfg(not(target_os = "windows"))]
pub fn minimize(_hwnd: isize) {}

#[cfg(not(target_os = "windows"))]
pub fn client_size(_hwnd: isize) -> Option<(u32, u32)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_rect_contains_checks_half_open_bounds() {
        let m = MonitorRect {
            index: 0,
            left: 0,
            top: 0,
            right: 1920,
            bottom: 1080,
        };
        assert!(m.contains(0, 0));
        assert!(m.contains(1919, 1079));
        assert!(!m.contains(1920, 0));
        assert!(!m.contains(-1, 0));
    }
}
