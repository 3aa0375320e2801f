// OS notifications bridged into `AppEvent`s.
//
// One hidden top-level window receives the global hotkey and the
// WM_DISPLAYCHANGE broadcast (message-only windows miss broadcasts). Two
// WinEvent hooks, foreground and focus, both map to `FocusChanged`.
//
// Hooks are out-of-context, so their callbacks run on the installing thread
// while it pumps messages. Callbacks only queue events; the owner of the
// controller drains the queue.

use std::cell::RefCell;

use log::{debug, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GWLP_USERDATA, WINDOW_STYLE, WM_DISPLAYCHANGE,
    WM_HOTKEY, WS_EX_TOOLWINDOW,
};

use super::{get_window_long, module_instance, register_window_class, set_window_long, wide};
use crate::error::{BlackoutError, Result};
use crate::events::{AppEvent, EventSender};
use crate::hotkey::Hotkey;

const CLASS_NAME: &str = "DisplayBlackoutSystemEvents";
const HOTKEY_ID: i32 = 1;

// WinEvent constants
const EVENT_SYSTEM_FOREGROUND: u32 = 0x0003;
const EVENT_OBJECT_FOCUS: u32 = 0x8005;
const WINEVENT_OUTOFCONTEXT: u32 = 0x0000;
const WINEVENT_SKIPOWNPROCESS: u32 = 0x0002;

thread_local! {
    // WinEvent callbacks carry no user data; this is the sink for hooks
    // installed on this thread.
    static HOOK_SINK: RefCell<Option<EventSender>> = const { RefCell::new(None) };
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let sink = get_window_long(hwnd, GWLP_USERDATA) as *const EventSender;
    match msg {
        WM_HOTKEY if wparam.0 as i32 == HOTKEY_ID => {
            if let Some(sink) = sink.as_ref() {
                sink.send(AppEvent::HotkeyPressed);
            }
            LRESULT(0)
        }
        WM_DISPLAYCHANGE => {
            if let Some(sink) = sink.as_ref() {
                sink.send(AppEvent::DisplayChanged);
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    _event: u32,
    _hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_event_thread: u32,
    _event_time: u32,
) {
    HOOK_SINK.with(|sink| {
        if let Some(sink) = sink.borrow().as_ref() {
            sink.send(AppEvent::FocusChanged);
        }
    });
}

fn install_hook(event: u32, name: &'static str) -> Result<HWINEVENTHOOK> {
    let hook = unsafe {
        SetWinEventHook(
            event,
            event,
            None,
            Some(win_event_proc),
            0,
            0,
            WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
        )
    };
    if hook.is_invalid() {
        Err(BlackoutError::HookInstall { hook: name })
    } else {
        Ok(hook)
    }
}

/// Owns the hidden window, the toggle hotkey and both focus hooks.
///
/// Construct once on the UI thread at start-up and keep it alive until
/// shutdown. Every resource is released by [`dispose`](Self::dispose) or on
/// drop.
pub struct SystemEventMonitor {
    hwnd: Option<HWND>,
    window_sink: *mut EventSender,
    hotkey: Hotkey,
    hotkey_registered: bool,
    foreground_hook: Option<HWINEVENTHOOK>,
    focus_hook: Option<HWINEVENTHOOK>,
}

impl SystemEventMonitor {
    pub fn new(sender: EventSender, hotkey: Hotkey) -> Result<Self> {
        register_window_class(CLASS_NAME, Some(window_proc), None)?;

        let class_name = wide(CLASS_NAME);
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW,
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE(0),
                0,
                0,
                0,
                0,
                None,
                None,
                Some(module_instance()),
                None,
            )
        }
        .map_err(|e| BlackoutError::WindowCreation(e.to_string()))?;

        // From here on, an early return drops `monitor` and releases
        // whatever was acquired so far.
        let mut monitor = Self {
            hwnd: Some(hwnd),
            window_sink: Box::into_raw(Box::new(sender.clone())),
            hotkey,
            hotkey_registered: false,
            foreground_hook: None,
            focus_hook: None,
        };
        unsafe {
            set_window_long(hwnd, GWLP_USERDATA, monitor.window_sink as isize);
        }

        let modifiers = HOT_KEY_MODIFIERS(hotkey.modifiers.bits() | MOD_NOREPEAT.0);
        unsafe { RegisterHotKey(Some(hwnd), HOTKEY_ID, modifiers, hotkey.key.virtual_key()) }
            .map_err(|e| BlackoutError::HotkeyRegistration {
                binding: hotkey.to_string(),
                reason: e.to_string(),
            })?;
        monitor.hotkey_registered = true;

        HOOK_SINK.with(|sink| *sink.borrow_mut() = Some(sender));
        monitor.foreground_hook = Some(install_hook(EVENT_SYSTEM_FOREGROUND, "foreground")?);
        monitor.focus_hook = Some(install_hook(EVENT_OBJECT_FOCUS, "focus")?);

        info!("listening for {hotkey}, display and focus changes");
        Ok(monitor)
    }

    pub fn hotkey(&self) -> Hotkey {
        self.hotkey
    }

    /// Releases hooks, hotkey and window. Each step runs at most once.
    pub fn dispose(&mut self) {
        for hook in [self.foreground_hook.take(), self.focus_hook.take()]
            .into_iter()
            .flatten()
        {
            if !unsafe { UnhookWinEvent(hook) }.as_bool() {
                warn!("UnhookWinEvent failed");
            }
        }
        HOOK_SINK.with(|sink| sink.borrow_mut().take());

        if let Some(hwnd) = self.hwnd.take() {
            unsafe {
                if self.hotkey_registered {
                    let _ = UnregisterHotKey(Some(hwnd), HOTKEY_ID);
                    self.hotkey_registered = false;
                }
                set_window_long(hwnd, GWLP_USERDATA, 0);
                if let Err(e) = DestroyWindow(hwnd) {
                    warn!("destroying system event window failed: {e}");
                }
            }
        }

        if !self.window_sink.is_null() {
            // SAFETY: allocated in `new` and detached from the window above.
            drop(unsafe { Box::from_raw(self.window_sink) });
            self.window_sink = std::ptr::null_mut();
            debug!("system event monitor disposed");
        }
    }
}

impl Drop for SystemEventMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(all(test, windows))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::{channel, NoopWaker};

    #[test]
    fn dispose_twice_then_drop() {
        let (sender, _rx) = channel(Arc::new(NoopWaker));
        let hotkey: Hotkey = "Ctrl+Alt+Shift+F24".parse().unwrap();
        let mut monitor = SystemEventMonitor::new(sender, hotkey).unwrap();
        assert!(monitor.hwnd.is_some());
        assert!(monitor.hotkey_registered);
        assert!(monitor.foreground_hook.is_some() && monitor.focus_hook.is_some());

        monitor.dispose();
        assert!(monitor.hwnd.is_none());
        assert!(!monitor.hotkey_registered);
        assert!(monitor.foreground_hook.is_none() && monitor.focus_hook.is_none());
        assert!(monitor.window_sink.is_null());
        assert!(HOOK_SINK.with(|sink| sink.borrow().is_none()));

        monitor.dispose();
        assert!(monitor.window_sink.is_null());
        drop(monitor);
    }
}
