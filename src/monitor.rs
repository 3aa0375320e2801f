use std::fmt;

use crate::error::Result;

/// A rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// One display region as reported by the OS.
///
/// Recomputed on every enumeration, never cached across operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDescriptor {
    pub bounds: Rect,
    pub is_primary: bool,
}

impl MonitorDescriptor {
    pub fn new(bounds: Rect, is_primary: bool) -> Self {
        Self { bounds, is_primary }
    }

    /// Durable identity of this monitor, `"x,y,w,h"`.
    ///
    /// OS display ids change across reboots on some systems, bounds do not.
    pub fn stable_key(&self) -> String {
        monitor_key(&self.bounds)
    }
}

pub fn monitor_key(bounds: &Rect) -> String {
    bounds.to_string()
}

/// Queries the current display topology.
pub trait MonitorEnumerator {
    fn enumerate(&self) -> Result<Vec<MonitorDescriptor>>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Monitor list that tests can swap out between calls.
    #[derive(Clone, Default)]
    pub struct FixedMonitors {
        monitors: Rc<RefCell<Vec<MonitorDescriptor>>>,
    }

    impl FixedMonitors {
        pub fn new(monitors: Vec<MonitorDescriptor>) -> Self {
            Self {
                monitors: Rc::new(RefCell::new(monitors)),
            }
        }

        pub fn three() -> Self {
            Self::new(vec![
                MonitorDescriptor::new(Rect::new(0, 0, 1920, 1080), true),
                MonitorDescriptor::new(Rect::new(1920, 0, 2560, 1440), false),
                MonitorDescriptor::new(Rect::new(-1080, 0, 1080, 1920), false),
            ])
        }

        pub fn set(&self, monitors: Vec<MonitorDescriptor>) {
            *self.monitors.borrow_mut() = monitors;
        }
    }

    impl MonitorEnumerator for FixedMonitors {
        fn enumerate(&self) -> Result<Vec<MonitorDescriptor>> {
            Ok(self.monitors.borrow().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_key_is_derived_from_bounds() {
        let m = MonitorDescriptor::new(Rect::new(-1920, 0, 1920, 1080), false);
        assert_eq!(m.stable_key(), "-1920,0,1920,1080");
    }

    #[test]
    fn equal_bounds_give_equal_keys() {
        let a = MonitorDescriptor::new(Rect::new(0, 0, 1920, 1080), true);
        let b = MonitorDescriptor::new(Rect::new(0, 0, 1920, 1080), false);
        assert_eq!(a.stable_key(), b.stable_key());
    }
}
