// Overlay surface abstraction.
//
// A surface occludes exactly one monitor. Strict operations (create, opacity,
// click-through) return `Result`; ordering re-assertion and teardown are
// best-effort and never fail at the interface.
//
// Split policy: an overlay is never a single window whose bounds equal the
// monitor's full bounds. Windows treats such a window as a fullscreen app and
// turns on Focus Assist, which silences notifications system-wide. Each
// overlay is therefore two abutting windows, top half and bottom half.

use crate::error::Result;
use crate::monitor::Rect;

/// Highest accepted opacity percentage.
pub const MAX_OPACITY: u8 = 100;

pub trait OverlaySurface {
    /// Applies a new opacity (0..=100) to every window of the surface.
    fn set_opacity(&mut self, percent: u8) -> Result<()>;

    /// Toggles pointer transparency. No native call when already in the
    /// requested mode.
    fn set_click_through(&mut self, click_through: bool) -> Result<()>;

    /// Re-asserts topmost ordering without moving, resizing or activating.
    fn bring_to_front(&self);

    /// Releases the native windows. Safe to call more than once.
    fn destroy(&mut self);

    fn opacity(&self) -> u8;

    fn click_through(&self) -> bool;
}

/// Builds surfaces; fails with [`BlackoutError::WindowCreation`] without
/// leaking any half-created window.
///
/// [`BlackoutError::WindowCreation`]: crate::error::BlackoutError::WindowCreation
pub trait SurfaceFactory {
    type Surface: OverlaySurface;

    fn create(&mut self, bounds: Rect, opacity: u8, click_through: bool) -> Result<Self::Surface>;
}

/// Splits monitor bounds into the two windows that make up one overlay.
pub fn split_bounds(bounds: Rect) -> [Rect; 2] {
    let half = bounds.height / 2;
    [
        Rect::new(bounds.x, bounds.y, bounds.width, half),
        Rect::new(bounds.x, bounds.y + half, bounds.width, bounds.height - half),
    ]
}

/// Converts an opacity percentage to a layered-window alpha byte.
pub fn opacity_to_alpha(percent: u8) -> u8 {
    (u32::from(percent.min(MAX_OPACITY)) * 255 / 100) as u8
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::BlackoutError;

    /// Shared log of everything the fake surfaces did.
    #[derive(Debug, Default)]
    pub struct Journal {
        pub created: Vec<Rect>,
        pub destroyed: Vec<Rect>,
        pub raised: usize,
        pub click_through_calls: usize,
    }

    pub struct FakeSurface {
        bounds: Rect,
        opacity: u8,
        click_through: bool,
        alive: bool,
        journal: Rc<RefCell<Journal>>,
    }

    impl OverlaySurface for FakeSurface {
        fn set_opacity(&mut self, percent: u8) -> Result<()> {
            self.opacity = percent.min(MAX_OPACITY);
            Ok(())
        }

        fn set_click_through(&mut self, click_through: bool) -> Result<()> {
            if self.click_through == click_through {
                return Ok(());
            }
            self.click_through = click_through;
            self.journal.borrow_mut().click_through_calls += 1;
            Ok(())
        }

        fn bring_to_front(&self) {
            self.journal.borrow_mut().raised += 1;
        }

        fn destroy(&mut self) {
            if self.alive {
                self.alive = false;
                self.journal.borrow_mut().destroyed.push(self.bounds);
            }
        }

        fn opacity(&self) -> u8 {
            self.opacity
        }

        fn click_through(&self) -> bool {
            self.click_through
        }
    }

    /// Factory whose n-th creation (1-based) can be made to fail.
    #[derive(Default)]
    pub struct FakeFactory {
        pub journal: Rc<RefCell<Journal>>,
        pub fail_on: Option<usize>,
        attempts: usize,
    }

    impl FakeFactory {
        pub fn failing_on(n: usize) -> Self {
            Self {
                fail_on: Some(n),
                ..Self::default()
            }
        }
    }

    impl SurfaceFactory for FakeFactory {
        type Surface = FakeSurface;

        fn create(&mut self, bounds: Rect, opacity: u8, click_through: bool) -> Result<FakeSurface> {
            self.attempts += 1;
            if self.fail_on == Some(self.attempts) {
                return Err(BlackoutError::WindowCreation("simulated".into()));
            }
            self.journal.borrow_mut().created.push(bounds);
            Ok(FakeSurface {
                bounds,
                opacity,
                click_through,
                alive: true,
                journal: self.journal.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeFactory;
    use super::*;

    #[test]
    fn destroying_twice_releases_once() {
        let mut factory = FakeFactory::default();
        let mut surface = factory.create(Rect::new(0, 0, 800, 600), 100, false).unwrap();
        surface.destroy();
        surface.destroy();
        assert_eq!(factory.journal.borrow().destroyed.len(), 1);
    }

    #[test]
    fn halves_abut_and_cover_the_monitor() {
        let bounds = Rect::new(1920, -200, 2560, 1441);
        let [top, bottom] = split_bounds(bounds);
        assert_eq!(top, Rect::new(1920, -200, 2560, 720));
        assert_eq!(bottom, Rect::new(1920, 520, 2560, 721));
        assert_eq!(top.height + bottom.height, bounds.height);
    }

    #[test]
    fn no_half_matches_full_bounds() {
        for height in [2, 3, 768, 1080, 2160] {
            let bounds = Rect::new(0, 0, 1920, height);
            assert!(split_bounds(bounds).iter().all(|half| *half != bounds));
        }
    }

    #[test]
    fn alpha_scales_to_byte_range() {
        assert_eq!(opacity_to_alpha(0), 0);
        assert_eq!(opacity_to_alpha(40), 102);
        assert_eq!(opacity_to_alpha(100), 255);
        assert_eq!(opacity_to_alpha(250), 255);
    }
}
