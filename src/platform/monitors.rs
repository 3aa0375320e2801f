use windows::Win32::Foundation::{LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO};

use crate::error::{BlackoutError, Result};
use crate::monitor::{MonitorDescriptor, MonitorEnumerator, Rect};

const MONITORINFOF_PRIMARY: u32 = 1;

/// Walks the live display topology with `EnumDisplayMonitors`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32MonitorEnumerator;

unsafe extern "system" fn monitor_enum_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _lprect: *mut RECT,
    lparam: LPARAM,
) -> windows::core::BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<MonitorDescriptor>);

    let mut mi = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if GetMonitorInfoW(hmonitor, &mut mi).as_bool() {
        let rect = mi.rcMonitor;
        monitors.push(MonitorDescriptor::new(
            Rect::new(rect.left, rect.top, rect.right - rect.left, rect.bottom - rect.top),
            mi.dwFlags & MONITORINFOF_PRIMARY != 0,
        ));
    }

    windows::core::BOOL::from(true)
}

impl MonitorEnumerator for Win32MonitorEnumerator {
    fn enumerate(&self) -> Result<Vec<MonitorDescriptor>> {
        let mut monitors: Vec<MonitorDescriptor> = Vec::new();
        // SAFETY: the callback only runs inside this call, while `monitors`
        // is alive and not otherwise borrowed.
        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(monitor_enum_proc),
                LPARAM(&mut monitors as *mut Vec<MonitorDescriptor> as isize),
            )
        };
        if !ok.as_bool() {
            return Err(BlackoutError::Enumeration(
                windows::core::Error::from_win32().to_string(),
            ));
        }
        log::debug!("enumerated {} monitor(s)", monitors.len());
        Ok(monitors)
    }
}
