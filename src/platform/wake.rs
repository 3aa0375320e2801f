use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_APP};

use crate::events::Waker;

/// Thread message that only exists to make `GetMessageW` return.
pub const WM_APP_WAKE: u32 = WM_APP + 1;

/// Wakes the message loop of the thread that created it.
#[derive(Debug, Clone, Copy)]
pub struct ThreadWaker {
    thread_id: u32,
}

impl ThreadWaker {
    pub fn current() -> Self {
        Self {
            thread_id: unsafe { GetCurrentThreadId() },
        }
    }
}

impl Waker for ThreadWaker {
    fn wake(&self) {
        unsafe {
            if let Err(e) = PostThreadMessageW(self.thread_id, WM_APP_WAKE, WPARAM(0), LPARAM(0)) {
                log::debug!("wake-up post failed: {e}");
            }
        }
    }
}
