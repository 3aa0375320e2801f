// Wiring for the Windows build: single-instance guard, event sources,
// controller, tray, and the Win32 message loop that owns all of them.

use std::ops::ControlFlow;
use std::process::ExitCode;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use log::{error, info, warn};
use windows::core::PCWSTR;
use windows::Win32::System::Threading::{CreateMutexW, OpenMutexW, SYNCHRONIZATION_ACCESS_RIGHTS};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PostQuitMessage, TranslateMessage, MSG,
};

use display_blackout::config::{self, JsonSettings, SettingsStore};
use display_blackout::events::{self, AppEvent, EventSender};
use display_blackout::game_mode::{GameModeMonitor, GameModeSignal, DEFAULT_POLL_INTERVAL};
use display_blackout::platform::monitors::Win32MonitorEnumerator;
use display_blackout::platform::notification::ShellNotificationProbe;
use display_blackout::platform::overlay::Win32SurfaceFactory;
use display_blackout::platform::system_events::SystemEventMonitor;
use display_blackout::platform::tray::{MenuState, Tray};
use display_blackout::platform::wake::{ThreadWaker, WM_APP_WAKE};
use display_blackout::BlackoutController;

use crate::Args;

const SINGLE_INSTANCE_MUTEX: &str = "DisplayBlackoutMutex\0";

/// Check if another instance is already running
fn is_already_running() -> bool {
    let name: Vec<u16> = SINGLE_INSTANCE_MUTEX.encode_utf16().collect();

    unsafe {
        // Try to open existing mutex
        let existing = OpenMutexW(
            SYNCHRONIZATION_ACCESS_RIGHTS(0x001F0001), // MUTEX_ALL_ACCESS
            false,
            PCWSTR(name.as_ptr()),
        );
        if existing.is_ok() {
            return true;
        }

        // Create the mutex (this instance owns it until exit)
        let _ = CreateMutexW(None, true, PCWSTR(name.as_ptr()));
        false
    }
}

fn start_game_mode(sender: &EventSender) -> GameModeMonitor {
    let sender = sender.clone();
    GameModeMonitor::start(
        Arc::new(ShellNotificationProbe),
        DEFAULT_POLL_INTERVAL,
        move |signal| {
            sender.send(match signal {
                GameModeSignal::Entered => AppEvent::GameModeEntered,
                GameModeSignal::Exited => AppEvent::GameModeExited,
            })
        },
    )
}

struct App {
    controller: BlackoutController<Win32SurfaceFactory>,
    settings: JsonSettings,
    sender: EventSender,
    tray: Tray,
    game_mode: Option<GameModeMonitor>,
}

impl App {
    fn menu_state(&self) -> MenuState {
        MenuState {
            blacked_out: self.controller.is_blacked_out(),
            opacity: self.controller.opacity(),
            click_through: self.controller.click_through(),
            game_mode_auto: self.game_mode.is_some(),
        }
    }

    fn black_out(&mut self) {
        if let Err(e) = self.controller.black_out() {
            error!("blackout failed: {e}");
        }
    }

    fn handle(&mut self, event: AppEvent) -> ControlFlow<()> {
        match event {
            AppEvent::HotkeyPressed | AppEvent::Toggle => {
                if let Err(e) = self.controller.toggle() {
                    error!("blackout failed: {e}");
                }
            }
            // Signals still queued after auto blackout was switched off are stale.
            AppEvent::GameModeEntered if self.game_mode.is_some() => self.black_out(),
            AppEvent::GameModeExited if self.game_mode.is_some() => self.controller.restore(),
            AppEvent::GameModeEntered | AppEvent::GameModeExited => {}
            AppEvent::DisplayChanged => self.controller.on_display_changed(),
            AppEvent::FocusChanged => self.controller.bring_all_to_front(),
            AppEvent::SetOpacity(percent) => {
                if let Err(e) = self.controller.update_opacity(percent) {
                    warn!("{e}");
                }
            }
            AppEvent::ToggleClickThrough => {
                let click_through = !self.controller.click_through();
                if let Err(e) = self.controller.update_click_through(click_through) {
                    warn!("{e}");
                }
            }
            AppEvent::ToggleGameModeAuto => {
                match self.game_mode.take() {
                    Some(mut monitor) => monitor.stop(),
                    None => self.game_mode = Some(start_game_mode(&self.sender)),
                }
                self.settings.save_game_mode_auto(self.game_mode.is_some());
            }
            AppEvent::Exit => return ControlFlow::Break(()),
        }
        self.tray.set_menu_state(self.menu_state());
        ControlFlow::Continue(())
    }

    fn run_message_loop(&mut self, rx: &Receiver<AppEvent>) {
        unsafe {
            let mut msg = MSG::default();
            // 0 is WM_QUIT, -1 is an error.
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                // Wake-ups are thread messages with no window to dispatch to.
                if !(msg.hwnd.is_invalid() && msg.message == WM_APP_WAKE) {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                for event in events::drain_pending(rx) {
                    if self.handle(event).is_break() {
                        PostQuitMessage(0);
                        break;
                    }
                }
            }
        }
    }

    fn shutdown(mut self) {
        if let Some(mut monitor) = self.game_mode.take() {
            monitor.stop();
        }
        self.controller.restore();
    }
}

pub fn run(args: &Args) -> ExitCode {
    if is_already_running() {
        info!("another instance is already running");
        return ExitCode::SUCCESS;
    }

    let settings = JsonSettings::open_default();
    if args.reset_settings {
        settings.reset();
        info!("settings reset");
    }

    let (sender, rx) = events::channel(Arc::new(ThreadWaker::current()));

    let mut system_events = match SystemEventMonitor::new(sender.clone(), settings.load_hotkey()) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut controller = BlackoutController::new(
        Win32SurfaceFactory,
        Box::new(Win32MonitorEnumerator),
        Box::new(JsonSettings::open_default()),
    );

    if let Some(keys) = &args.select {
        controller.update_selection(config::parse_selection(keys));
    }

    let game_mode_auto = args.game_mode || settings.load_game_mode_auto();
    let initial = MenuState {
        blacked_out: false,
        opacity: controller.opacity(),
        click_through: controller.click_through(),
        game_mode_auto,
    };
    let tray = match Tray::new(sender.clone(), initial) {
        Ok(tray) => tray,
        Err(e) => {
            error!("{e}");
            system_events.dispose();
            return ExitCode::FAILURE;
        }
    };
    if let Some(handle) = tray.handle() {
        controller.subscribe(move |active| handle.set_active(active));
    }

    let mut app = App {
        controller,
        settings,
        game_mode: game_mode_auto.then(|| start_game_mode(&sender)),
        sender,
        tray,
    };

    if args.blackout {
        app.black_out();
    }

    info!("running; press {} to toggle", system_events.hotkey());
    app.run_message_loop(&rx);

    app.shutdown();
    system_events.dispose();
    ExitCode::SUCCESS
}
