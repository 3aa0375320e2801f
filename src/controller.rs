// Blackout state machine.
//
// Owns every live overlay surface, keyed by stable monitor key, and the
// current configuration. Runs on the single thread that owns the native
// windows; other threads reach it only through the event queue.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, warn};

use crate::config::{BlackoutConfiguration, SettingsStore};
use crate::error::Result;
use crate::monitor::{MonitorDescriptor, MonitorEnumerator};
use crate::surface::{OverlaySurface, SurfaceFactory, MAX_OPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackoutState {
    Restored,
    BlackedOut,
}

type StateListener = Box<dyn FnMut(bool)>;

pub struct BlackoutController<F: SurfaceFactory> {
    factory: F,
    monitors: Box<dyn MonitorEnumerator>,
    settings: Box<dyn SettingsStore>,
    config: BlackoutConfiguration,
    state: BlackoutState,
    surfaces: BTreeMap<String, F::Surface>,
    listeners: Vec<StateListener>,
}

/// Default policy occludes everything but the primary monitor.
fn should_occlude(monitor: &MonitorDescriptor, selection: Option<&BTreeSet<String>>) -> bool {
    match selection {
        Some(keys) => keys.contains(&monitor.stable_key()),
        None => !monitor.is_primary,
    }
}

impl<F: SurfaceFactory> BlackoutController<F> {
    /// Loads the stored configuration once; later changes go through the
    /// `update_*` methods.
    pub fn new(
        factory: F,
        monitors: Box<dyn MonitorEnumerator>,
        settings: Box<dyn SettingsStore>,
    ) -> Self {
        let config = BlackoutConfiguration::load(settings.as_ref());
        debug!("loaded blackout configuration: {config:?}");
        Self {
            factory,
            monitors,
            settings,
            config,
            state: BlackoutState::Restored,
            surfaces: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> BlackoutState {
        self.state
    }

    pub fn is_blacked_out(&self) -> bool {
        self.state == BlackoutState::BlackedOut
    }

    pub fn configuration(&self) -> &BlackoutConfiguration {
        &self.config
    }

    pub fn selected_monitor_keys(&self) -> Option<&BTreeSet<String>> {
        self.config.selected_monitor_keys.as_ref()
    }

    pub fn opacity(&self) -> u8 {
        self.config.opacity_percent
    }

    pub fn click_through(&self) -> bool {
        self.config.click_through
    }

    /// Keys of the monitors currently covered, in sorted order.
    pub fn active_monitor_keys(&self) -> Vec<String> {
        self.surfaces.keys().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn surfaces(&self) -> impl Iterator<Item = &F::Surface> {
        self.surfaces.values()
    }

    /// Registers a `BlackoutStateChanged` listener.
    pub fn subscribe(&mut self, listener: impl FnMut(bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, blacked_out: bool) {
        for listener in &mut self.listeners {
            listener(blacked_out);
        }
    }

    pub fn toggle(&mut self) -> Result<()> {
        match self.state {
            BlackoutState::Restored => self.black_out(),
            BlackoutState::BlackedOut => {
                self.restore();
                Ok(())
            }
        }
    }

    /// Covers every targeted monitor. With nothing targeted the controller
    /// still enters `BlackedOut`, holding no surfaces.
    ///
    /// If any overlay fails to come up, the ones already built in this pass
    /// are destroyed and the controller stays `Restored`.
    pub fn black_out(&mut self) -> Result<()> {
        if self.state == BlackoutState::BlackedOut {
            return Ok(());
        }

        let monitors = self.monitors.enumerate()?;
        let selection = self.config.selected_monitor_keys.as_ref();
        let mut created: BTreeMap<String, F::Surface> = BTreeMap::new();

        for monitor in monitors.iter().filter(|m| should_occlude(m, selection)) {
            let key = monitor.stable_key();
            // Mirrored displays report identical bounds.
            if created.contains_key(&key) {
                continue;
            }
            match self.factory.create(
                monitor.bounds,
                self.config.opacity_percent,
                self.config.click_through,
            ) {
                Ok(surface) => {
                    created.insert(key, surface);
                }
                Err(e) => {
                    error!("overlay for monitor {key} failed, rolling back: {e}");
                    for surface in created.values_mut() {
                        surface.destroy();
                    }
                    return Err(e);
                }
            }
        }

        if created.is_empty() {
            info!("no monitor selected for blackout");
        } else {
            info!("blacked out {} monitor(s)", created.len());
        }
        self.surfaces = created;
        self.state = BlackoutState::BlackedOut;
        self.notify(true);
        Ok(())
    }

    pub fn restore(&mut self) {
        if self.state == BlackoutState::Restored {
            return;
        }
        for surface in self.surfaces.values_mut() {
            surface.destroy();
        }
        self.surfaces.clear();
        self.state = BlackoutState::Restored;
        info!("restored all monitors");
        self.notify(false);
    }

    /// Stores the selection; it applies from the next `black_out`.
    ///
    /// An empty set clears back to the default policy.
    pub fn update_selection(&mut self, keys: Option<BTreeSet<String>>) {
        let keys = keys.filter(|k| !k.is_empty());
        self.settings.save_selection(keys.as_ref());
        self.config.selected_monitor_keys = keys;
    }

    /// Stores the opacity and applies it to every live overlay.
    ///
    /// Every surface is updated even if one fails; the first failure is
    /// returned.
    pub fn update_opacity(&mut self, percent: u8) -> Result<()> {
        let percent = percent.min(MAX_OPACITY);
        self.config.opacity_percent = percent;
        self.settings.save_opacity(percent);

        let mut first_error = None;
        for (key, surface) in &mut self.surfaces {
            if let Err(e) = surface.set_opacity(percent) {
                warn!("opacity update on {key} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stores click-through mode and applies it to every live overlay.
    pub fn update_click_through(&mut self, click_through: bool) -> Result<()> {
        self.config.click_through = click_through;
        self.settings.save_click_through(click_through);

        let mut first_error = None;
        for (key, surface) in &mut self.surfaces {
            if let Err(e) = surface.set_click_through(click_through) {
                warn!("click-through update on {key} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Keeps overlays above whatever window just took focus.
    pub fn bring_all_to_front(&self) {
        for surface in self.surfaces.values() {
            surface.bring_to_front();
        }
    }

    /// Cached overlay bounds are stale after a topology change, so drop
    /// occlusion entirely and let the user trigger it again.
    pub fn on_display_changed(&mut self) {
        if self.is_blacked_out() {
            info!("display configuration changed, restoring");
            self.restore();
        }
    }
}

impl<F: SurfaceFactory> Drop for BlackoutController<F> {
    fn drop(&mut self) {
        for surface in self.surfaces.values_mut() {
            surface.destroy();
        }
    }
}
