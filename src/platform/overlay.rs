// Native overlay surfaces: borderless, topmost, layered popup windows.
//
// Each surface is two windows, top half and bottom half of the monitor. A
// single window matching the monitor's bounds is treated by Windows as a
// fullscreen app and switches on Focus Assist system-wide.
//
// Styles:
//   • WS_EX_TOOLWINDOW   no taskbar or Alt+Tab entry
//   • WS_EX_NOACTIVATE   never takes focus, not even when shown
//   • WS_EX_TOPMOST      enters the topmost z-band
//   • WS_EX_LAYERED      alpha via SetLayeredWindowAttributes
//   • WS_EX_TRANSPARENT  only in click-through mode

use std::sync::Mutex;

use log::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    GetLastError, SetLastError, COLORREF, HWND, LPARAM, LRESULT, WIN32_ERROR, WPARAM,
};
use windows::Win32::Graphics::Gdi::{GetStockObject, BLACK_BRUSH, HBRUSH};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, IsWindowVisible, SetLayeredWindowAttributes,
    SetWindowPos, ShowWindow, GWL_EXSTYLE, HWND_TOPMOST, LWA_ALPHA, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOSIZE, SW_SHOWNOACTIVATE, WINDOW_EX_STYLE, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

use super::{module_instance, register_window_class, set_window_long, wide};
use crate::error::{BlackoutError, Result};
use crate::monitor::Rect;
use crate::surface::{opacity_to_alpha, split_bounds, OverlaySurface, SurfaceFactory, MAX_OPACITY};

const CLASS_NAME: &str = "DisplayBlackoutOverlay";

static CLASS_REGISTERED: Mutex<bool> = Mutex::new(false);

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Registered once per process on first use, never unregistered.
fn ensure_class_registered() -> Result<()> {
    let mut registered = CLASS_REGISTERED.lock().unwrap_or_else(|e| e.into_inner());
    if *registered {
        return Ok(());
    }
    // Stock objects are never freed.
    let black = HBRUSH(unsafe { GetStockObject(BLACK_BRUSH) }.0);
    register_window_class(CLASS_NAME, Some(window_proc), Some(black))?;
    *registered = true;
    Ok(())
}

fn create_half(ex_style: WINDOW_EX_STYLE, bounds: Rect) -> Result<HWND> {
    let class_name = wide(CLASS_NAME);
    unsafe {
        CreateWindowExW(
            ex_style,
            PCWSTR(class_name.as_ptr()),
            PCWSTR::null(),
            WS_POPUP,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            None,
            None,
            Some(module_instance()),
            None,
        )
        .map_err(|e| BlackoutError::WindowCreation(e.to_string()))
    }
}

pub struct Win32OverlaySurface {
    bounds: Rect,
    hwnds: [Option<HWND>; 2],
    opacity: u8,
    ex_style: WINDOW_EX_STYLE,
}

impl Win32OverlaySurface {
    pub fn create(bounds: Rect, opacity: u8, click_through: bool) -> Result<Self> {
        ensure_class_registered()?;

        let mut ex_style = WS_EX_TOOLWINDOW | WS_EX_TOPMOST | WS_EX_NOACTIVATE | WS_EX_LAYERED;
        if click_through {
            ex_style = WINDOW_EX_STYLE(ex_style.0 | WS_EX_TRANSPARENT.0);
        }

        // Any early return drops `surface`, which destroys what was built.
        let mut surface = Self {
            bounds,
            hwnds: [None, None],
            opacity,
            ex_style,
        };
        for (slot, half) in split_bounds(bounds).into_iter().enumerate() {
            surface.hwnds[slot] = Some(create_half(ex_style, half)?);
        }

        // Alpha before the first show, or the windows flash fully opaque.
        surface.set_opacity(opacity)?;

        for hwnd in surface.live() {
            unsafe {
                let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
                if !IsWindowVisible(hwnd).as_bool() {
                    return Err(BlackoutError::WindowCreation(format!(
                        "overlay for {bounds} did not become visible"
                    )));
                }
            }
        }

        debug!("overlay up on {bounds}");
        Ok(surface)
    }

    fn live(&self) -> impl Iterator<Item = HWND> + '_ {
        self.hwnds.iter().flatten().copied()
    }
}

impl OverlaySurface for Win32OverlaySurface {
    fn set_opacity(&mut self, percent: u8) -> Result<()> {
        let percent = percent.min(MAX_OPACITY);
        let alpha = opacity_to_alpha(percent);
        for hwnd in self.live() {
            unsafe {
                SetLayeredWindowAttributes(hwnd, COLORREF(0), alpha, LWA_ALPHA)
                    .map_err(|e| BlackoutError::Opacity(e.to_string()))?;
            }
        }
        self.opacity = percent;
        Ok(())
    }

    fn set_click_through(&mut self, click_through: bool) -> Result<()> {
        let ex_style = if click_through {
            WINDOW_EX_STYLE(self.ex_style.0 | WS_EX_TRANSPARENT.0)
        } else {
            WINDOW_EX_STYLE(self.ex_style.0 & !WS_EX_TRANSPARENT.0)
        };
        if ex_style == self.ex_style {
            return Ok(());
        }

        for hwnd in self.live() {
            unsafe {
                // Zero is also a legal previous style; only the last error
                // tells a failure apart.
                SetLastError(WIN32_ERROR(0));
                if set_window_long(hwnd, GWL_EXSTYLE, ex_style.0 as isize) == 0 {
                    let err = GetLastError();
                    if err.0 != 0 {
                        return Err(BlackoutError::ClickThrough(
                            windows::core::Error::from(err.to_hresult()).to_string(),
                        ));
                    }
                }
            }
        }
        self.ex_style = ex_style;
        Ok(())
    }

    fn bring_to_front(&self) {
        for hwnd in self.live() {
            unsafe {
                if let Err(e) = SetWindowPos(
                    hwnd,
                    Some(HWND_TOPMOST),
                    0,
                    0,
                    0,
                    0,
                    SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
                ) {
                    debug!("re-asserting topmost on {} failed: {e}", self.bounds);
                }
            }
        }
    }

    fn destroy(&mut self) {
        for slot in &mut self.hwnds {
            if let Some(hwnd) = slot.take() {
                unsafe {
                    if let Err(e) = DestroyWindow(hwnd) {
                        warn!("destroying overlay window on {} failed: {e}", self.bounds);
                    }
                }
            }
        }
    }

    fn opacity(&self) -> u8 {
        self.opacity
    }

    fn click_through(&self) -> bool {
        self.ex_style.0 & WS_EX_TRANSPARENT.0 != 0
    }
}

impl Drop for Win32OverlaySurface {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32SurfaceFactory;

impl SurfaceFactory for Win32SurfaceFactory {
    type Surface = Win32OverlaySurface;

    fn create(&mut self, bounds: Rect, opacity: u8, click_through: bool) -> Result<Win32OverlaySurface> {
        Win32OverlaySurface::create(bounds, opacity, click_through)
    }
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;

    #[test]
    fn destroy_twice_then_drop() {
        let mut surface = Win32OverlaySurface::create(Rect::new(0, 0, 64, 48), 50, true).unwrap();
        assert_eq!(surface.live().count(), 2);
        assert!(surface.click_through());

        surface.destroy();
        assert_eq!(surface.live().count(), 0);
        surface.destroy();
        assert_eq!(surface.live().count(), 0);
        drop(surface);
    }
}
