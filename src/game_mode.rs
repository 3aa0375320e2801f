// Fullscreen ("game mode") detection.
//
// There is no push notification for an exclusive-fullscreen session, so the
// user notification state is polled on a background thread. Only edges are
// reported: entering and leaving game mode.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameModeSignal {
    Entered,
    Exited,
}

/// Answers "is a fullscreen D3D application in front right now?".
pub trait NotificationStateProbe: Send + Sync {
    fn is_exclusive_fullscreen(&self) -> bool;
}

/// Edge detector over successive probe samples.
#[derive(Debug, Clone, Copy)]
pub struct GameModeTracker {
    in_game_mode: bool,
}

impl GameModeTracker {
    pub fn new(initial: bool) -> Self {
        Self {
            in_game_mode: initial,
        }
    }

    pub fn in_game_mode(&self) -> bool {
        self.in_game_mode
    }

    pub fn update(&mut self, now: bool) -> Option<GameModeSignal> {
        if now == self.in_game_mode {
            return None;
        }
        self.in_game_mode = now;
        Some(if now {
            GameModeSignal::Entered
        } else {
            GameModeSignal::Exited
        })
    }
}

/// Background poller. Dropping it stops polling.
pub struct GameModeMonitor {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl GameModeMonitor {
    /// Samples the probe once to seed the tracker, then polls every
    /// `interval` on a background thread. `on_signal` runs on that thread.
    pub fn start<F>(probe: Arc<dyn NotificationStateProbe>, interval: Duration, on_signal: F) -> Self
    where
        F: Fn(GameModeSignal) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let mut tracker = GameModeTracker::new(probe.is_exclusive_fullscreen());
        debug!(
            "game mode monitor started (in game mode: {})",
            tracker.in_game_mode()
        );

        let thread = std::thread::Builder::new()
            .name("game-mode-poll".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(signal) = tracker.update(probe.is_exclusive_fullscreen()) {
                            info!("game mode {signal:?}");
                            on_signal(signal);
                        }
                    }
                    // Stop requested, or the monitor was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("could not start game mode polling: {e}");
                None
            }
        };

        Self {
            stop_tx: Some(stop_tx),
            thread,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops polling and waits for the poller to exit. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("game mode monitor stopped");
        }
    }
}

impl Drop for GameModeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    #[test]
    fn tracker_reports_only_edges() {
        let mut tracker = GameModeTracker::new(false);
        assert_eq!(tracker.update(false), None);
        assert_eq!(tracker.update(true), Some(GameModeSignal::Entered));
        assert_eq!(tracker.update(true), None);
        assert_eq!(tracker.update(false), Some(GameModeSignal::Exited));
        assert_eq!(tracker.update(false), None);
    }

    #[test]
    fn tracker_seeded_in_game_mode_waits_for_exit() {
        let mut tracker = GameModeTracker::new(true);
        assert_eq!(tracker.update(true), None);
        assert_eq!(tracker.update(false), Some(GameModeSignal::Exited));
    }

    #[derive(Default)]
    struct Switch(AtomicBool);

    impl NotificationStateProbe for Switch {
        fn is_exclusive_fullscreen(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn wait_for(signals: &Mutex<Vec<GameModeSignal>>, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while signals.lock().unwrap().len() < len && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn monitor_emits_transitions() {
        let probe = Arc::new(Switch::default());
        let signals = Arc::new(Mutex::new(Vec::new()));
        let sink = signals.clone();
        let mut monitor = GameModeMonitor::start(probe.clone(), Duration::from_millis(10), move |s| {
            sink.lock().unwrap().push(s)
        });
        assert!(monitor.is_running());

        probe.0.store(true, Ordering::SeqCst);
        wait_for(&signals, 1);
        probe.0.store(false, Ordering::SeqCst);
        wait_for(&signals, 2);
        monitor.stop();

        assert_eq!(
            *signals.lock().unwrap(),
            vec![GameModeSignal::Entered, GameModeSignal::Exited]
        );
    }

    #[test]
    fn stop_is_prompt_and_idempotent() {
        let probe = Arc::new(Switch::default());
        let mut monitor = GameModeMonitor::start(probe, Duration::from_secs(60), |_| {});
        let started = Instant::now();
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
