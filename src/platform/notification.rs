use windows::Win32::UI::Shell::{SHQueryUserNotificationState, QUNS_RUNNING_D3D_FULL_SCREEN};

use crate::game_mode::NotificationStateProbe;

/// Reads the shell's user notification state, which reports a running
/// exclusive-fullscreen Direct3D application.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellNotificationProbe;

impl NotificationStateProbe for ShellNotificationProbe {
    fn is_exclusive_fullscreen(&self) -> bool {
        match unsafe { SHQueryUserNotificationState() } {
            Ok(state) => state == QUNS_RUNNING_D3D_FULL_SCREEN,
            Err(e) => {
                log::debug!("SHQueryUserNotificationState failed: {e}");
                false
            }
        }
    }
}
