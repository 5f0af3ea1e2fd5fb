//! The deck: owns the active visualizer slot, the per-id instance cache and
//! saved settings, and drives random switching and mutation ticks from the
//! host's frame loop.
//!
//! Single-threaded and cooperative: every operation runs synchronously from
//! the caller's point of view, so at most one visualizer ever draws to the
//! shared canvas and no locking is needed.

use std::collections::HashMap;

use super::registry::{AppliedMutation, Registry, VisualizerInfo};
use super::settings::{SettingValue, SettingsSchema};
use super::{FrameCtx, Visualizer, MUTATE_MODE};
use crate::audio::SampleBlock;
use crate::canvas::{Canvas, Rgb};

/// Random mode redraws its switch interval uniformly from this range after
/// every switch.
const RANDOM_MIN_SECS: f32 = 5.0;
const RANDOM_MAX_SECS: f32 = 25.0;

/// How long a mutation batch counts as "recent" for UI highlighting.
const MUTATION_FLASH_SECS: f32 = 1.5;

/// Snapshot of a visualizer's schema-declared values, in schema order.
pub type SavedSettings = Vec<(&'static str, SettingValue)>;

struct Slot {
    viz: Box<dyn Visualizer>,
    /// The "is running" token: set by start, cleared by stop. While clear,
    /// the deck never invokes the instance's render step, which is the
    /// no-draw-after-stop guarantee.
    running: bool,
    /// Seconds accumulated toward the next mutation tick.
    mutation_clock: f32,
}

pub struct Deck {
    registry: Registry,
    slots: HashMap<&'static str, Slot>,
    saved: HashMap<&'static str, SavedSettings>,
    current: Option<&'static str>,
    canvas: Canvas,
    playing: bool,
    random_mode: bool,
    /// Set alongside random mode: newly created and restored instances get
    /// their mutate flag forced on, overriding any restored "off".
    force_mutate: bool,
    since_switch: f32,
    random_interval: f32,
    elapsed: f32,
    rng: fastrand::Rng,
    recent: Vec<AppliedMutation>,
    recent_at: f32,
}

impl Deck {
    pub fn new(registry: Registry) -> Self {
        Self::with_rng(registry, fastrand::Rng::new())
    }

    /// Seedable constructor so random-mode and mutation behavior is
    /// reproducible in tests.
    pub fn with_rng(registry: Registry, mut rng: fastrand::Rng) -> Self {
        let random_interval = RANDOM_MIN_SECS + rng.f32() * (RANDOM_MAX_SECS - RANDOM_MIN_SECS);
        let first = registry.all().first().map(|info| info.id);
        let mut deck = Self {
            registry,
            slots: HashMap::new(),
            saved: HashMap::new(),
            current: None,
            canvas: Canvas::new(),
            playing: false,
            random_mode: false,
            force_mutate: false,
            since_switch: 0.0,
            random_interval,
            elapsed: 0.0,
            rng,
            recent: Vec::new(),
            recent_at: -MUTATION_FLASH_SECS,
        };
        // First registered is default-active.
        if let Some(id) = first {
            deck.switch_to(id);
        }
        deck
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn current_id(&self) -> Option<&'static str> {
        self.current
    }

    pub fn current_info(&self) -> Option<&VisualizerInfo> {
        self.current.and_then(|id| self.registry.get(id))
    }

    pub fn current_schema(&self) -> Option<&'static SettingsSchema> {
        let slot = self.slots.get(self.current?)?;
        Some(slot.viz.schema())
    }

    pub fn current_setting(&self, key: &str) -> Option<SettingValue> {
        let slot = self.slots.get(self.current?)?;
        slot.viz.setting(key)
    }

    /// Route one settings-UI edit to the active visualizer.
    pub fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(id) = self.current else { return };
        if let Some(slot) = self.slots.get_mut(id) {
            slot.viz.set_setting(key, value);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn random_mode(&self) -> bool {
        self.random_mode
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.canvas.resize(w, h);
        // Every cached instance gets the new geometry, not just the active
        // one; a stale instance resuming after a switch would otherwise
        // paint one frame with dead coordinates.
        for slot in self.slots.values_mut() {
            slot.viz.on_resize(w, h);
        }
    }

    /// The full switch transition: snapshot + stop the old instance, look
    /// up or lazily construct the new one (restoring its saved settings),
    /// clear the shared canvas, and start the new instance if the host is
    /// playing. Unknown ids are a no-op.
    pub fn switch_to(&mut self, id: &str) -> bool {
        let Some(info) = self.registry.get(id) else {
            return false;
        };
        let id = info.id;

        if let Some(cur) = self.current {
            if let Some(slot) = self.slots.get_mut(cur) {
                self.saved.insert(cur, snapshot_settings(slot.viz.as_ref()));
                stop_slot(slot);
            }
        }

        if let Some(slot) = self.slots.get_mut(id) {
            if let Some(saved) = self.saved.get(id) {
                for &(key, value) in saved {
                    slot.viz.set_setting(key, value);
                }
            }
            // The override takes precedence over a restored "off".
            if self.force_mutate {
                slot.viz.set_setting(MUTATE_MODE, SettingValue::Flag(true));
            }
        } else if let Some(info) = self.registry.get(id) {
            let mut viz = info.instantiate();
            viz.init();
            if self.canvas.width() > 0 && self.canvas.height() > 0 {
                viz.on_resize(self.canvas.width(), self.canvas.height());
            }
            if self.force_mutate {
                viz.set_setting(MUTATE_MODE, SettingValue::Flag(true));
            }
            self.slots.insert(
                id,
                Slot {
                    viz,
                    running: false,
                    mutation_clock: 0.0,
                },
            );
        }

        // Blank frame between owners so no stale pixels bleed through.
        self.canvas.clear(Rgb::BLACK);

        self.current = Some(id);
        self.since_switch = 0.0;

        if self.playing {
            self.start_visualization();
        }
        true
    }

    /// Cycle through the catalog in registration order.
    pub fn next_visualizer(&mut self) {
        self.step_visualizer(1);
    }

    pub fn prev_visualizer(&mut self) {
        self.step_visualizer(-1);
    }

    fn step_visualizer(&mut self, dir: isize) {
        let n = self.registry.len();
        if n == 0 {
            return;
        }
        let pos = self
            .current
            .and_then(|cur| self.registry.all().iter().position(|e| e.id == cur))
            .unwrap_or(0);
        let next = (pos as isize + dir).rem_euclid(n as isize) as usize;
        let id = self.registry.all()[next].id;
        self.switch_to(id);
    }

    /// Begin rendering the active instance. Idempotent: a second call while
    /// already running is a no-op, so there is never more than one live
    /// render loop per instance.
    pub fn start_visualization(&mut self) {
        let Some(id) = self.current else { return };
        if let Some(slot) = self.slots.get_mut(id) {
            if !slot.running {
                slot.running = true;
                slot.viz.on_start();
            }
        }
    }

    /// Stop rendering. Safe to call when not running; after return no
    /// further draw calls reach the instance.
    pub fn stop_visualization(&mut self) {
        let Some(id) = self.current else { return };
        if let Some(slot) = self.slots.get_mut(id) {
            stop_slot(slot);
        }
    }

    pub fn set_playing(&mut self, on: bool) {
        self.playing = on;
        if on {
            self.since_switch = 0.0;
            self.start_visualization();
        } else {
            self.stop_visualization();
        }
    }

    /// Random mode: free-running timed switches to a uniformly chosen other
    /// visualizer. Enabling it also force-enables mutate mode everywhere —
    /// on the current instance, every cached instance, and every saved
    /// snapshot — for maximum variety.
    pub fn set_random_mode(&mut self, on: bool) {
        self.random_mode = on;
        self.force_mutate = on;
        self.registry.global_mutation = on;
        self.since_switch = 0.0;
        if on {
            for slot in self.slots.values_mut() {
                slot.viz.set_setting(MUTATE_MODE, SettingValue::Flag(true));
            }
            for saved in self.saved.values_mut() {
                for entry in saved.iter_mut() {
                    if entry.0 == MUTATE_MODE {
                        entry.1 = SettingValue::Flag(true);
                    }
                }
            }
        }
    }

    /// One immediate mutation tick against the active visualizer.
    pub fn mutate_now(&mut self) -> Vec<AppliedMutation> {
        let Some(id) = self.current else {
            return Vec::new();
        };
        let Some(slot) = self.slots.get_mut(id) else {
            return Vec::new();
        };
        let applied = self.registry.apply_mutations(slot.viz.as_mut(), &mut self.rng);
        if !applied.is_empty() {
            self.recent = applied.clone();
            self.recent_at = self.elapsed;
        }
        applied
    }

    pub fn reset_current_to_defaults(&mut self) {
        let Some(id) = self.current else { return };
        if let Some(slot) = self.slots.get_mut(id) {
            self.registry.reset_to_defaults(slot.viz.as_mut());
            slot.mutation_clock = 0.0;
        }
    }

    /// Mutations applied within the last flash window, for UI highlighting.
    pub fn recent_mutations(&self) -> &[AppliedMutation] {
        if self.elapsed - self.recent_at <= MUTATION_FLASH_SECS {
            &self.recent
        } else {
            &[]
        }
    }

    /// Drop all cached instances and saved settings.
    pub fn clear_session(&mut self) {
        let keep = self.current;
        self.slots.clear();
        self.saved.clear();
        self.current = None;
        if let Some(id) = keep {
            self.switch_to(id);
        }
    }

    /// One host frame: advance random switching, fire due mutation ticks,
    /// and render the active visualizer into the canvas. The caller
    /// refreshes `samples` before this, which is what orders sample refresh
    /// before feature extraction before drawing within a frame.
    pub fn advance(&mut self, dt: f32, samples: Option<&SampleBlock>) {
        self.elapsed += dt;

        if self.random_mode && self.playing {
            self.since_switch += dt;
            if self.since_switch >= self.random_interval {
                self.random_interval =
                    RANDOM_MIN_SECS + self.rng.f32() * (RANDOM_MAX_SECS - RANDOM_MIN_SECS);
                if let Some(target) = self.pick_random_other() {
                    self.switch_to(target);
                    // Random mode lands on a fresh-looking plugin: schema
                    // defaults, not the restored customization...
                    self.reset_current_to_defaults();
                    // ...except the mutate flag, which random mode keeps on.
                    if self.force_mutate {
                        self.set_setting(MUTATE_MODE, SettingValue::Flag(true));
                    }
                }
                self.since_switch = 0.0;
            }
        }

        if !self.playing {
            return;
        }
        let Some(id) = self.current else { return };
        let Some(slot) = self.slots.get_mut(id) else {
            return;
        };

        // Instance flag OR global flag, decided here once rather than
        // inside every plugin's frame step.
        let instance_on = slot
            .viz
            .setting(MUTATE_MODE)
            .and_then(SettingValue::as_flag)
            .unwrap_or(false);
        if instance_on || self.registry.global_mutation {
            slot.mutation_clock += dt;
            if slot.mutation_clock >= slot.viz.mutation_period().as_secs_f32() {
                slot.mutation_clock = 0.0;
                let applied = self.registry.apply_mutations(slot.viz.as_mut(), &mut self.rng);
                if !applied.is_empty() {
                    self.recent = applied;
                    self.recent_at = self.elapsed;
                }
            }
        } else {
            slot.mutation_clock = 0.0;
        }

        // Missing samples or a zero-sized canvas skip the frame; the next
        // tick simply tries again.
        if !slot.running {
            return;
        }
        let Some(samples) = samples else { return };
        let (w, h) = (self.canvas.width(), self.canvas.height());
        if w == 0 || h == 0 {
            return;
        }
        let ctx = FrameCtx {
            t: self.elapsed,
            dt,
            w,
            h,
        };
        slot.viz.render(&ctx, samples, &mut self.canvas);
    }

    fn pick_random_other(&mut self) -> Option<&'static str> {
        let others: Vec<&'static str> = self
            .registry
            .all()
            .iter()
            .map(|e| e.id)
            .filter(|&id| Some(id) != self.current)
            .collect();
        if others.is_empty() {
            return None;
        }
        Some(others[self.rng.usize(..others.len())])
    }
}

fn snapshot_settings(viz: &dyn Visualizer) -> SavedSettings {
    viz.schema()
        .settings
        .iter()
        .filter_map(|spec| viz.setting(spec.key).map(|v| (spec.key, v)))
        .collect()
}

fn stop_slot(slot: &mut Slot) {
    if slot.running {
        slot.running = false;
        slot.viz.on_stop();
    }
}
