// Win32 implementations of the overlay, monitor, event and tray seams.

pub mod monitors;
pub mod notification;
pub mod overlay;
pub mod system_events;
pub mod tray;
pub mod wake;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{GetLastError, ERROR_CLASS_ALREADY_EXISTS, HINSTANCE, HWND};
use windows::Win32::Graphics::Gdi::HBRUSH;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    LoadCursorW, RegisterClassW, CS_HREDRAW, CS_VREDRAW, IDC_ARROW, WINDOW_LONG_PTR_INDEX,
    WNDCLASSW, WNDPROC,
};

use crate::error::{BlackoutError, Result};

pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub(crate) fn module_instance() -> HINSTANCE {
    unsafe { GetModuleHandleW(PCWSTR::null()).unwrap_or_default().into() }
}

/// Registers a window class. A class left over from an earlier
/// registration in this process counts as success.
pub(crate) fn register_window_class(
    class: &'static str,
    proc: WNDPROC,
    background: Option<HBRUSH>,
) -> Result<()> {
    let class_name = wide(class);
    unsafe {
        let wc = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: proc,
            hInstance: module_instance(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: background.unwrap_or_default(),
            ..Default::default()
        };
        if RegisterClassW(&wc) != 0 {
            return Ok(());
        }
        let err = GetLastError();
        if err == ERROR_CLASS_ALREADY_EXISTS {
            Ok(())
        } else {
            Err(BlackoutError::ClassRegistration {
                class,
                reason: windows::core::Error::from(err.to_hresult()).to_string(),
            })
        }
    }
}

#[cfg(target_pointer_width = "64")]
pub(crate) unsafe fn set_window_long(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX, value: isize) -> isize {
    windows::Win32::UI::WindowsAndMessaging::SetWindowLongPtrW(hwnd, index, value)
}

#[cfg(target_pointer_width = "32")]
pub(crate) unsafe fn set_window_long(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX, value: isize) -> isize {
    windows::Win32::UI::WindowsAndMessaging::SetWindowLongW(hwnd, index, value as i32) as isize
}

#[cfg(target_pointer_width = "64")]
pub(crate) unsafe fn get_window_long(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW(hwnd, index)
}

#[cfg(target_pointer_width = "32")]
pub(crate) unsafe fn get_window_long(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongW(hwnd, index) as isize
}
