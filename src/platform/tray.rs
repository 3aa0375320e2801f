// System tray icon with context menu

use std::cell::Cell;

use log::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    GetCursorPos, LoadIconW, SetForegroundWindow, TrackPopupMenu, GWLP_USERDATA, HMENU,
    IDI_APPLICATION, MENU_ITEM_FLAGS, MF_CHECKED, MF_POPUP, MF_SEPARATOR, MF_STRING,
    TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RETURNCMD, WINDOW_STYLE, WM_APP, WM_LBUTTONUP,
    WM_RBUTTONUP, WS_EX_TOOLWINDOW,
};

use super::{get_window_long, module_instance, register_window_class, set_window_long, wide};
use crate::error::{BlackoutError, Result};
use crate::events::{AppEvent, EventSender};

const CLASS_NAME: &str = "DisplayBlackoutTray";

/// Custom message ID for tray icon callbacks
pub const WM_TRAY_ICON: u32 = WM_APP + 2;

const TRAY_UID: u32 = 1;
const TOOLTIP: &str = "Display Blackout";
const TOOLTIP_ACTIVE: &str = "Display Blackout (active)";

/// Menu item IDs
const IDM_TOGGLE: u32 = 1001;
const IDM_CLICK_THROUGH: u32 = 1002;
const IDM_GAME_MODE: u32 = 1003;
const IDM_EXIT: u32 = 1004;
const IDM_OPACITY_BASE: u32 = 1100;

const OPACITY_PRESETS: [u8; 4] = [25, 50, 75, 100];

/// What the context menu shows as checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    pub blacked_out: bool,
    pub opacity: u8,
    pub click_through: bool,
    pub game_mode_auto: bool,
}

struct TrayContext {
    sink: EventSender,
    menu: Cell<MenuState>,
    menu_open: Cell<bool>,
}

/// Copyable handle for refreshing the tooltip from a state listener.
#[derive(Debug, Clone, Copy)]
pub struct TrayHandle(HWND);

impl TrayHandle {
    /// Swaps the tooltip to reflect the blackout state.
    pub fn set_active(self, active: bool) {
        unsafe {
            let mut nid = base_notify_data(self.0);
            nid.uFlags = NIF_TIP;
            write_tip(&mut nid, if active { TOOLTIP_ACTIVE } else { TOOLTIP });
            if !Shell_NotifyIconW(NIM_MODIFY, &nid).as_bool() {
                debug!("tray tooltip update failed");
            }

            let ctx = get_window_long(self.0, GWLP_USERDATA) as *const TrayContext;
            if let Some(ctx) = ctx.as_ref() {
                let mut menu = ctx.menu.get();
                menu.blacked_out = active;
                ctx.menu.set(menu);
            }
        }
    }
}

fn base_notify_data(hwnd: HWND) -> NOTIFYICONDATAW {
    NOTIFYICONDATAW {
        cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: TRAY_UID,
        ..Default::default()
    }
}

fn write_tip(nid: &mut NOTIFYICONDATAW, text: &str) {
    let tip = wide(text);
    let len = tip.len().min(nid.szTip.len());
    nid.szTip[..len].copy_from_slice(&tip[..len]);
}

fn append(menu: HMENU, flags: MENU_ITEM_FLAGS, id: usize, text: &str) {
    let text = wide(text);
    unsafe {
        let _ = AppendMenuW(menu, flags, id, PCWSTR(text.as_ptr()));
    }
}

fn checked_if(on: bool) -> MENU_ITEM_FLAGS {
    if on {
        MF_STRING | MF_CHECKED
    } else {
        MF_STRING
    }
}

/// Show the tray context menu and return the chosen command, if any.
fn show_context_menu(hwnd: HWND, state: MenuState) -> Option<u32> {
    unsafe {
        let menu = CreatePopupMenu().ok()?;
        let opacity_menu = match CreatePopupMenu() {
            Ok(m) => m,
            Err(_) => {
                let _ = DestroyMenu(menu);
                return None;
            }
        };

        for (i, preset) in OPACITY_PRESETS.iter().enumerate() {
            append(
                opacity_menu,
                checked_if(*preset == state.opacity),
                (IDM_OPACITY_BASE + i as u32) as usize,
                &format!("{preset}%"),
            );
        }

        append(
            menu,
            checked_if(state.blacked_out),
            IDM_TOGGLE as usize,
            "Black out monitors",
        );
        append(menu, MF_STRING | MF_POPUP, opacity_menu.0 as usize, "Opacity");
        append(
            menu,
            checked_if(state.click_through),
            IDM_CLICK_THROUGH as usize,
            "Click-through",
        );
        append(
            menu,
            checked_if(state.game_mode_auto),
            IDM_GAME_MODE as usize,
            "Black out during fullscreen games",
        );
        let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
        append(menu, MF_STRING, IDM_EXIT as usize, "Exit");

        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);

        // Required for TrackPopupMenu to work correctly with tray icons
        let _ = SetForegroundWindow(hwnd);

        let cmd = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_BOTTOMALIGN | TPM_RETURNCMD,
            pt.x,
            pt.y,
            Some(0),
            hwnd,
            None,
        );

        // Destroys the opacity submenu too.
        let _ = DestroyMenu(menu);
        (cmd.0 != 0).then_some(cmd.0 as u32)
    }
}

fn command_event(cmd: u32) -> Option<AppEvent> {
    match cmd {
        IDM_TOGGLE => Some(AppEvent::Toggle),
        IDM_CLICK_THROUGH => Some(AppEvent::ToggleClickThrough),
        IDM_GAME_MODE => Some(AppEvent::ToggleGameModeAuto),
        IDM_EXIT => Some(AppEvent::Exit),
        _ => cmd
            .checked_sub(IDM_OPACITY_BASE)
            .and_then(|i| OPACITY_PRESETS.get(i as usize))
            .map(|p| AppEvent::SetOpacity(*p)),
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg != WM_TRAY_ICON {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    let Some(ctx) = (get_window_long(hwnd, GWLP_USERDATA) as *const TrayContext).as_ref() else {
        return LRESULT(0);
    };

    match (lparam.0 & 0xFFFF) as u32 {
        WM_LBUTTONUP => ctx.sink.send(AppEvent::Toggle),
        // The menu runs a modal loop that keeps dispatching tray messages.
        WM_RBUTTONUP if !ctx.menu_open.replace(true) => {
            let chosen = show_context_menu(hwnd, ctx.menu.get());
            ctx.menu_open.set(false);
            if let Some(event) = chosen.and_then(command_event) {
                ctx.sink.send(event);
            }
        }
        _ => {}
    }
    LRESULT(0)
}

/// Tray icon plus the hidden window that receives its callbacks.
pub struct Tray {
    hwnd: Option<HWND>,
    context: *mut TrayContext,
}

impl Tray {
    pub fn new(sink: EventSender, state: MenuState) -> Result<Self> {
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

        let tray = Self {
            hwnd: Some(hwnd),
            context: Box::into_raw(Box::new(TrayContext {
                sink,
                menu: Cell::new(state),
                menu_open: Cell::new(false),
            })),
        };

        unsafe {
            set_window_long(hwnd, GWLP_USERDATA, tray.context as isize);

            let mut nid = base_notify_data(hwnd);
            nid.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
            nid.uCallbackMessage = WM_TRAY_ICON;
            if let Ok(icon) = LoadIconW(None, IDI_APPLICATION) {
                nid.hIcon = icon;
            }
            write_tip(&mut nid, if state.blacked_out { TOOLTIP_ACTIVE } else { TOOLTIP });

            if !Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
                return Err(BlackoutError::TrayIcon);
            }
        }
        Ok(tray)
    }

    pub fn handle(&self) -> Option<TrayHandle> {
        self.hwnd.map(TrayHandle)
    }

    /// Updates the checkmarks shown next time the menu opens.
    pub fn set_menu_state(&self, state: MenuState) {
        if let Some(ctx) = unsafe { self.context.as_ref() } {
            ctx.menu.set(state);
        }
    }
}

impl Drop for Tray {
    fn drop(&mut self) {
        if let Some(hwnd) = self.hwnd.take() {
            unsafe {
                let _ = Shell_NotifyIconW(NIM_DELETE, &base_notify_data(hwnd));
                set_window_long(hwnd, GWLP_USERDATA, 0);
                if let Err(e) = DestroyWindow(hwnd) {
                    warn!("destroying tray window failed: {e}");
                }
            }
        }
        if !self.context.is_null() {
            drop(unsafe { Box::from_raw(self.context) });
            self.context = std::ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_commands_map_to_events() {
        assert_eq!(command_event(IDM_TOGGLE), Some(AppEvent::Toggle));
        assert_eq!(command_event(IDM_EXIT), Some(AppEvent::Exit));
        assert_eq!(command_event(IDM_OPACITY_BASE + 1), Some(AppEvent::SetOpacity(50)));
        assert_eq!(command_event(IDM_OPACITY_BASE + 9), None);
        assert_eq!(command_event(7), None);
    }
}
