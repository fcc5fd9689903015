//! DPI awareness declaration and per-window/per-monitor DPI queries.
//!
//! The system declares Per-Monitor-V2 awareness at process start so that
//! client-area and click-coordinate math downstream operates in physical
//! pixels rather than DPI-virtualized ones.

#[cfg(target_os = "windows")]
mod win {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{HMONITOR, MONITOR_DEFAULTTONEAREST, MonitorFromWindow};
    use windows::Win32::UI::HiDpi::{
        DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, GetDpiForMonitor, GetDpiForWindow,
        MDT_EFFECTIVE_DPI, SetProcessDpiAwarenessContext,
    };

    /// Requests Per-Monitor-V2 DPI awareness for the current process. Must
    /// be called once, as early as possible, before any window or monitor
    /// handle is queried.
    pub fn declare_per_monitor_v2_awareness() {
        unsafe {
            if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
                log::warn!("failed to set Per-Monitor-V2 DPI awareness; coordinates may be scaled");
            }
        }
    }

    /// DPI for a specific window, falling back to 96 (100%) on failure.
    pub fn dpi_for_window(hwnd: isize) -> u32 {
        let dpi = unsafe { GetDpiForWindow(HWND(hwnd as *mut _)) };
        if dpi == 0 { 96 } else { dpi }
    }

    /// DPI for the monitor nearest a window, falling back to 96 on failure.
    pub fn dpi_for_monitor_nearest(hwnd: isize) -> u32 {
        unsafe {
            let monitor: HMONITOR =
                MonitorFromWindow(HWND(hwnd as *mut _), MONITOR_DEFAULTTONEAREST);
            let mut dpi_x = 96u32;
            let mut dpi_y = 96u32;
            if GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y).is_ok() {
                dpi_x
            } else {
                96
            }
        }
    }
}

#[cfg(target_os = "windows")]
pub use win::{declare_per_monitor_v2_awareness, dpi_for_monitor_nearest, dpi_for_window};

#[cfg(not(target_os = "windows"))]
pub fn declare_per_monitor_v2_awareness() {
    log::debug!("DPI awareness declaration is a no-op off Windows");
}

#[cfg(not(target_os = "windows"))]
pub fn dpi_for_window(_hwnd: isize) -> u32 {
    96
}

#[cfg(not(target_os = "windows"))]
pub fn dpi_for_monitor_nearest(_hwnd: isize) -> u32 {
    96
}

/// Scale factor implied by a DPI value, relative to the 96 DPI (100%)
/// baseline.
pub fn scale_factor(dpi: u32) -> f32 {
    dpi as f32 / 96.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_at_baseline_is_one() {
        assert!((scale_factor(96) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn scale_factor_at_150_percent() {
        assert!((scale_factor(144) - 1.5).abs() < 0.001);
    }
}
