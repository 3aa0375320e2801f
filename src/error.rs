use thiserror::Error;

/// Errors raised by the overlay and system-event layers.
///
/// Only strict operations return these. Best-effort calls such as
/// re-asserting topmost order log and swallow their failures instead.
#[derive(Debug, Error)]
pub enum BlackoutError {
    #[error("failed to register window class `{class}`: {reason}")]
    ClassRegistration { class: &'static str, reason: String },

    #[error("failed to create overlay window: {0}")]
    WindowCreation(String),

    #[error("failed to register hotkey {binding}; it may be in use by another application ({reason})")]
    HotkeyRegistration { binding: String, reason: String },

    #[error("failed to install {hook} event hook")]
    HookInstall { hook: &'static str },

    #[error("failed to add tray icon")]
    TrayIcon,

    #[error("failed to enumerate monitors: {0}")]
    Enumeration(String),

    #[error("failed to set overlay opacity: {0}")]
    Opacity(String),

    #[error("failed to change click-through mode: {0}")]
    ClickThrough(String),

    #[error("invalid hotkey `{0}`")]
    InvalidHotkey(String),
}

pub type Result<T> = std::result::Result<T, BlackoutError>;
