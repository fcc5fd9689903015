//! Out-of-context `SetWinEventHook` wrapper. The hook callback is a plain
//! `extern "system" fn` with no user-data parameter, so it cannot close
//! over per-instance state directly; instead it forwards through a single
//! process-wide channel slot that each `EventHook` installs for the
//! lifetime of its own background thread (the "trampoline").

use autoclick_ipc::WindowEvent;

#[cfg(target_os = "windows")]
mod win {
    use super::WindowEvent;
    use crate::error::{FinderError, Result};
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Sender};
    use std::thread::JoinHandle;
    use std::time::Duration;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Accessibility::{HWINEVENTHOOK, SetWinEventHook, UnhookWinEvent};
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, EVENT_OBJECT_CREATE, EVENT_OBJECT_NAMECHANGE, EVENT_OBJECT_SHOW,
        EVENT_SYSTEM_FOREGROUND, MSG, PM_REMOVE, PeekMessageW, TranslateMessage, WINEVENT_OUTOFCONTEXT,
    };

    static TRAMPOLINE: Mutex<Option<Sender<WindowEvent>>> = Mutex::new(None);

    unsafe extern "system" fn win_event_proc(
        _hook: HWINEVENTHOOK,
        event: u32,
        hwnd: HWND,
        _id_object: i32,
        _id_child: i32,
        _event_thread: u32,
        _event_time: u32,
    ) {
        if hwnd.0.is_null() {
            return;
        }
        let mapped = match event {
            e if e == EVENT_SYSTEM_FOREGROUND => Some(WindowEvent::Foreground { hwnd: hwnd.0 as u64 }),
            e if e == EVENT_OBJECT_SHOW || e == EVENT_OBJECT_CREATE => {
                Some(WindowEvent::CreateOrShow { hwnd: hwnd.0 as u64 })
            }
            e if e == EVENT_OBJECT_NAMECHANGE => Some(WindowEvent::NameChange { hwnd: hwnd.0 as u64 }),
            _ => None,
        };
        if let Some(ev) = mapped
            && let Ok(guard) = TRAMPOLINE.lock()
            && let Some(sender) = guard.as_ref()
        {
            let _ = sender.send(ev);
        }
    }

    pub struct EventHook {
        thread: Option<JoinHandle<()>>,
        stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl EventHook {
        /// Spawns a dedicated thread that registers the hook and pumps
        /// messages until `stop()` is called. `SetWinEventHook` delivers
        /// callbacks on the thread that registered it, so that thread must
        /// run its own message loop for the lifetime of the hook.
        pub fn install() -> Result<(Self, mpsc::Receiver<WindowEvent>)> {
            let (tx, rx) = mpsc::channel();
            {
                let mut guard = TRAMPOLINE
                    .lock()
                    .map_err(|_| FinderError::HookRegistration("trampoline lock poisoned".into()))?;
                *guard = Some(tx);
            }

            let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            let stop_for_thread = stop.clone();
            let thread = std::thread::spawn(move || {
                let hook = unsafe {
                    SetWinEventHook(
                        EVENT_SYSTEM_FOREGROUND,
                        EVENT_OBJECT_NAMECHANGE,
                        None,
                        Some(win_event_proc),
                        0,
                        0,
                        WINEVENT_OUTOFCONTEXT,
                    )
                };
                if hook.is_invalid() {
                    log::warn!("SetWinEventHook returned an invalid handle");
                    return;
                }

                let mut msg = MSG::default();
                while !stop_for_thread.load(std::sync::atomic::Ordering::Relaxed) {
                    while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
                        unsafe {
                            let _ = TranslateMessage(&msg);
                            DispatchMessageW(&msg);
                        }
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }

                unsafe {
                    let _ = UnhookWinEvent(hook);
                }
            });

            Ok((
                Self {
                    thread: Some(thread),
                    stop,
                },
                rx,
            ))
        }

        /// Requests the hook thread stop and joins it, bounded to roughly
        /// 2 seconds (the thread's own poll granularity is 20ms, so it
        /// should return almost immediately).
        pub fn stop(&mut self) {
            self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
            if let Some(handle) = self.thread.take() {
                let _ = handle.join();
            }
            if let Ok(mut guard) = TRAMPOLINE.lock() {
                *guard = None;
            }
        }
    }

    impl Drop for EventHook {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

#[cfg(target_os = "windows")]
pub use win::EventHook;

#[cfg(not(target_os = "windows"))]
pub struct EventHook;

#[cfg(not(target_os = "windows"))]
impl EventHook {
    pub fn install() -> crate::error::Result<(Self, std::sync::mpsc::Receiver<WindowEvent>)> {
        Err(crate::error::FinderError::Unsupported)
    }

    pub fn stop(&mut self) {}
}
