//! The visualizer catalog plus the mutation engine and the shared
//! settings utilities every plugin leans on.

use super::settings::{snap_to_step, SettingValue};
use super::Visualizer;

pub type VisualizerFactory = fn() -> Box<dyn Visualizer>;

/// One catalog entry. Registered once at startup, immutable thereafter.
pub struct VisualizerInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    factory: VisualizerFactory,
}

impl VisualizerInfo {
    pub fn new(
        id: &'static str,
        display_name: &'static str,
        description: &'static str,
        factory: VisualizerFactory,
    ) -> Self {
        Self {
            id,
            display_name,
            description,
            factory,
        }
    }

    pub fn instantiate(&self) -> Box<dyn Visualizer> {
        (self.factory)()
    }
}

/// Per-parameter mutation declaration. Exactly one draw strategy per entry;
/// the tagged enum makes a "neither values nor range" entry unrepresentable.
pub struct MutationEntry {
    pub key: &'static str,
    /// Bound of the independent Bernoulli trial for this key per tick.
    pub probability: f32,
    pub draw: MutationDraw,
}

pub enum MutationDraw {
    /// Uniform pick from a fixed set.
    Values(&'static [SettingValue]),
    /// Uniform draw from [min, max], snapped to multiples of `step`.
    Range { min: f32, max: f32, step: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppliedMutation {
    pub key: &'static str,
    pub value: SettingValue,
}

pub struct Registry {
    entries: Vec<VisualizerInfo>,
    /// Process-wide mutation override: when set, every active visualizer
    /// mutates on its timer regardless of its own `mutate_mode` flag. The
    /// OR with the per-instance flag is evaluated by the deck's frame step.
    pub global_mutation: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            global_mutation: false,
        }
    }

    /// Append a descriptor. Duplicate ids are rejected deterministically:
    /// the first registration wins and the shadowed duplicate is reported
    /// back to the caller via `false`.
    pub fn register(&mut self, info: VisualizerInfo) -> bool {
        if self.entries.iter().any(|e| e.id == info.id) {
            return false;
        }
        self.entries.push(info);
        true
    }

    /// All descriptors in registration order; the first entry is the
    /// default-active visualizer.
    pub fn all(&self) -> &[VisualizerInfo] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&VisualizerInfo> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// One mutation tick: for each entry in the visualizer's table, draw an
    /// independent Bernoulli trial at its probability and, on success, apply
    /// a freshly drawn value through `set_setting`. Keys whose trial failed
    /// are untouched. Returns what changed (possibly nothing) so the host
    /// can flash the affected controls.
    pub fn apply_mutations(
        &self,
        viz: &mut dyn Visualizer,
        rng: &mut fastrand::Rng,
    ) -> Vec<AppliedMutation> {
        let mut applied = Vec::new();
        for entry in viz.mutation_table() {
            if rng.f32() >= entry.probability {
                continue;
            }
            let value = match entry.draw {
                MutationDraw::Values(options) => {
                    if options.is_empty() {
                        continue;
                    }
                    options[rng.usize(..options.len())]
                }
                MutationDraw::Range { min, max, step } => {
                    let raw = min + rng.f32() * (max - min);
                    SettingValue::Number(snap_to_step(raw, min, max, step))
                }
            };
            viz.set_setting(entry.key, value);
            applied.push(AppliedMutation {
                key: entry.key,
                value,
            });
        }
        applied
    }

    /// Walk the schema and push every key back to its declared default.
    pub fn reset_to_defaults(&self, viz: &mut dyn Visualizer) {
        for spec in viz.schema().settings {
            viz.set_setting(spec.key, spec.default);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
