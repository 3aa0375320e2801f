// Signals flowing into the thread that owns the controller.
//
// OS callbacks and the game-mode poller never touch controller state
// directly. They push an `AppEvent` through an `EventSender`, which
// wakes the owning thread so it can drain the queue.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    HotkeyPressed,
    DisplayChanged,
    FocusChanged,
    GameModeEntered,
    GameModeExited,
    Toggle,
    ToggleClickThrough,
    ToggleGameModeAuto,
    SetOpacity(u8),
    Exit,
}

impl AppEvent {
    /// Events that flip blackout on or off.
    pub fn is_toggle(self) -> bool {
        matches!(self, AppEvent::HotkeyPressed | AppEvent::Toggle)
    }
}

/// Nudges the owning thread after an event was queued.
pub trait Waker: Send + Sync {
    fn wake(&self);
}

/// Waker for owners that poll the queue on their own.
pub struct NoopWaker;

impl Waker for NoopWaker {
    fn wake(&self) {}
}

#[derive(Clone)]
pub struct EventSender {
    tx: Sender<AppEvent>,
    waker: Arc<dyn Waker>,
}

impl EventSender {
    /// Queues `event`; silently dropped once the receiver is gone.
    pub fn send(&self, event: AppEvent) {
        if self.tx.send(event).is_ok() {
            self.waker.wake();
        }
    }
}

pub fn channel(waker: Arc<dyn Waker>) -> (EventSender, Receiver<AppEvent>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx, waker }, rx)
}

/// Drains everything queued right now.
///
/// Back-to-back toggle requests (a double click, a bouncing hotkey) cancel
/// out instead of building and tearing down a full set of overlays. Repeated
/// focus changes collapse into one.
pub fn drain_pending(rx: &Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events: Vec<AppEvent> = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.is_toggle() {
            if events.last() == Some(&AppEvent::Toggle) {
                events.pop();
            } else {
                events.push(AppEvent::Toggle);
            }
        } else if event != AppEvent::FocusChanged || !events.contains(&event) {
            events.push(event);
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Waker for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn send_wakes_owner_from_another_thread() {
        let waker = Arc::new(CountingWaker::default());
        let (tx, rx) = channel(waker.clone());
        std::thread::spawn(move || tx.send(AppEvent::GameModeEntered))
            .join()
            .unwrap();
        assert_eq!(rx.recv().unwrap(), AppEvent::GameModeEntered);
        assert_eq!(waker.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_after_receiver_dropped_does_not_wake() {
        let waker = Arc::new(CountingWaker::default());
        let (tx, rx) = channel(waker.clone());
        drop(rx);
        tx.send(AppEvent::Exit);
        assert_eq!(waker.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn paired_toggles_cancel_out() {
        let (tx, rx) = channel(Arc::new(NoopWaker));
        tx.send(AppEvent::Toggle);
        tx.send(AppEvent::HotkeyPressed);
        tx.send(AppEvent::SetOpacity(30));
        assert_eq!(drain_pending(&rx), vec![AppEvent::SetOpacity(30)]);
    }

    #[test]
    fn separated_toggles_keep_their_order() {
        let (tx, rx) = channel(Arc::new(NoopWaker));
        tx.send(AppEvent::FocusChanged);
        tx.send(AppEvent::HotkeyPressed);
        tx.send(AppEvent::DisplayChanged);
        tx.send(AppEvent::FocusChanged);
        tx.send(AppEvent::Toggle);
        assert_eq!(
            drain_pending(&rx),
            vec![
                AppEvent::FocusChanged,
                AppEvent::Toggle,
                AppEvent::DisplayChanged,
                AppEvent::Toggle,
            ]
        );
    }

    #[test]
    fn three_toggles_leave_one() {
        let (tx, rx) = channel(Arc::new(NoopWaker));
        for _ in 0..3 {
            tx.send(AppEvent::Toggle);
        }
        assert_eq!(drain_pending(&rx), vec![AppEvent::Toggle]);
    }
}
