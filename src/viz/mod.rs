//! The visualizer plugin contract and its runtime: settings schemas,
//! the registry/mutation engine, and the deck that orchestrates switching.

pub mod deck;
pub mod plugins;
pub mod registry;
pub mod settings;

pub use deck::{Deck, SavedSettings};
pub use registry::{
    AppliedMutation, MutationDraw, MutationEntry, Registry, VisualizerInfo,
};
pub use settings::{
    clean_value, snap_to_step, SelectOption, SettingKind, SettingSpec, SettingValue,
    SettingsSchema,
};

use crate::audio::SampleBlock;
use crate::canvas::Canvas;
use std::time::Duration;

/// Schema key of the per-instance auto-mutate toggle. Every mutable plugin
/// declares it; the deck reads it each frame and ORs it with the registry's
/// global flag.
pub const MUTATE_MODE: &str = "mutate_mode";

/// Per-frame context handed to the active visualizer alongside the sample
/// block and the canvas.
pub struct FrameCtx {
    /// Seconds since the deck started.
    pub t: f32,
    pub dt: f32,
    pub w: usize,
    pub h: usize,
}

/// The plugin contract.
///
/// Schema-declared parameters are the only state that survives switching
/// away and back; simulation state (particles, phase accumulators, cached
/// geometry) belongs to the instance and resets on restart. Rendering is
/// immediate-mode: one frame per call, no buffering, and a render step that
/// cannot proceed (zero-sized canvas, missing samples) is skipped by the
/// deck rather than surfaced.
pub trait Visualizer {
    /// Pure and stable across calls; drives the settings UI and the
    /// save/restore key set.
    fn schema(&self) -> &'static SettingsSchema;

    /// Empty table means the plugin is non-mutable.
    fn mutation_table(&self) -> &'static [MutationEntry] {
        &[]
    }

    /// How often a mutation tick fires while mutate mode is on.
    fn mutation_period(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// One-time setup after construction.
    fn init(&mut self) {}

    /// Called on the not-running -> running transition. Transient
    /// simulation state resets here.
    fn on_start(&mut self) {}

    fn on_stop(&mut self) {}

    /// Recompute size-dependent cached state. May be called before the
    /// first render, or never.
    fn on_resize(&mut self, _w: usize, _h: usize) {}

    /// Apply one validated parameter change. Unknown keys are ignored;
    /// numeric values clamp to the schema bounds.
    fn set_setting(&mut self, key: &str, value: SettingValue);

    /// Read back the current value of a schema key (save/restore, UI sync).
    fn setting(&self, key: &str) -> Option<SettingValue>;

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas);
}

/// Register the built-in visualizers in their canonical order; the first
/// one is the default on startup.
pub fn register_builtins(registry: &mut Registry) {
    registry.register(VisualizerInfo::new(
        "bars",
        "Spectrum Bars",
        "Classic frequency bars with peak dots and gradient fills",
        || Box::new(plugins::bars::BarsViz::new()),
    ));
    registry.register(VisualizerInfo::new(
        "particles",
        "Particle Storm",
        "Band-driven particle system with connection lines and trails",
        || Box::new(plugins::particles::ParticlesViz::new()),
    ));
    registry.register(VisualizerInfo::new(
        "scope",
        "Oscilloscope",
        "Layered time-domain traces with persistence",
        || Box::new(plugins::scope::ScopeViz::new()),
    ));
    registry.register(VisualizerInfo::new(
        "plasma",
        "Plasma Flow",
        "Sinusoidal interference field with audio-modulated palettes",
        || Box::new(plugins::plasma::PlasmaViz::new()),
    ));
    registry.register(VisualizerInfo::new(
        "kaleidoscope",
        "Kaleidoscope",
        "Mirrored radial segments with band-driven petals",
        || Box::new(plugins::kaleidoscope::KaleidoscopeViz::new()),
    ));
}
