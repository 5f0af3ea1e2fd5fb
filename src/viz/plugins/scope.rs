//! Oscilloscope: layered time-domain traces drawn over a persistence fade.

use std::time::Duration;

use crate::audio::{SampleBlock, SPECTRUM_BINS};
use crate::canvas::{Canvas, Rgb};
use crate::viz::registry::{MutationDraw, MutationEntry};
use crate::viz::settings::{
    SelectOption, SettingKind, SettingSpec, SettingValue, SettingsSchema,
};
use crate::viz::{FrameCtx, Visualizer, MUTATE_MODE};

fn layer_colors(name: &str) -> [Rgb; 4] {
    match name {
        "amber" => [
            Rgb::new(255, 176, 0),
            Rgb::new(255, 208, 64),
            Rgb::new(255, 232, 128),
            Rgb::new(200, 140, 0),
        ],
        "plasma" => [
            Rgb::new(255, 0, 128),
            Rgb::new(255, 64, 128),
            Rgb::new(255, 128, 128),
            Rgb::new(200, 0, 100),
        ],
        "mono" => [
            Rgb::WHITE,
            Rgb::new(200, 200, 200),
            Rgb::new(150, 150, 150),
            Rgb::new(100, 100, 100),
        ],
        // "phosphor"
        _ => [
            Rgb::new(0, 255, 102),
            Rgb::new(102, 255, 153),
            Rgb::new(0, 204, 255),
            Rgb::new(0, 153, 76),
        ],
    }
}

static SCHEME_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "phosphor", label: "Green Phosphor" },
    SelectOption { value: "amber", label: "Amber" },
    SelectOption { value: "plasma", label: "Plasma" },
    SelectOption { value: "mono", label: "Mono" },
];

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Oscilloscope",
    settings: &[
        SettingSpec {
            key: "layers",
            label: "Trace Layers",
            kind: SettingKind::Range { min: 1.0, max: 4.0, step: 1.0, unit: "" },
            default: SettingValue::Number(2.0),
        },
        SettingSpec {
            key: "line_width",
            label: "Line Width",
            kind: SettingKind::Range { min: 1.0, max: 5.0, step: 1.0, unit: "px" },
            default: SettingValue::Number(2.0),
        },
        SettingSpec {
            key: "amplitude",
            label: "Amplitude",
            kind: SettingKind::Range { min: 25.0, max: 200.0, step: 5.0, unit: "%" },
            default: SettingValue::Number(100.0),
        },
        SettingSpec {
            key: "persistence",
            label: "Persistence",
            kind: SettingKind::Range { min: 0.0, max: 90.0, step: 5.0, unit: "%" },
            default: SettingValue::Number(40.0),
        },
        SettingSpec {
            key: "glow",
            label: "Glow",
            kind: SettingKind::Toggle,
            default: SettingValue::Flag(true),
        },
        SettingSpec {
            key: "color_scheme",
            label: "Color Scheme",
            kind: SettingKind::Select { options: SCHEME_OPTIONS },
            default: SettingValue::Choice("phosphor"),
        },
        SettingSpec {
            key: MUTATE_MODE,
            label: "Auto Mutate",
            kind: SettingKind::Toggle,
            default: SettingValue::Flag(false),
        },
    ],
};

static MUTATIONS: &[MutationEntry] = &[
    MutationEntry {
        key: "color_scheme",
        probability: 0.5,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("phosphor"),
            SettingValue::Choice("amber"),
            SettingValue::Choice("plasma"),
            SettingValue::Choice("mono"),
        ]),
    },
    MutationEntry {
        key: "layers",
        probability: 0.2,
        draw: MutationDraw::Values(&[
            SettingValue::Number(1.0),
            SettingValue::Number(2.0),
            SettingValue::Number(3.0),
            SettingValue::Number(4.0),
        ]),
    },
    MutationEntry {
        key: "persistence",
        probability: 0.3,
        draw: MutationDraw::Range { min: 0.0, max: 80.0, step: 5.0 },
    },
    MutationEntry {
        key: "line_width",
        probability: 0.25,
        draw: MutationDraw::Range { min: 1.0, max: 4.0, step: 1.0 },
    },
];

pub struct ScopeViz {
    layers: usize,
    line_width: f32,
    amplitude_pct: f32,
    persistence_pct: f32,
    glow: bool,
    scheme: &'static str,
    mutate_mode: bool,
}

impl ScopeViz {
    pub fn new() -> Self {
        Self {
            layers: 2,
            line_width: 2.0,
            amplitude_pct: 100.0,
            persistence_pct: 40.0,
            glow: true,
            scheme: "phosphor",
            mutate_mode: false,
        }
    }
}

impl Default for ScopeViz {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for ScopeViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(6)
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("layers", SettingValue::Number(v)) => self.layers = v as usize,
            ("line_width", SettingValue::Number(v)) => self.line_width = v,
            ("amplitude", SettingValue::Number(v)) => self.amplitude_pct = v,
            ("persistence", SettingValue::Number(v)) => self.persistence_pct = v,
            ("glow", SettingValue::Flag(v)) => self.glow = v,
            ("color_scheme", SettingValue::Choice(v)) => self.scheme = v,
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "layers" => Some(SettingValue::Number(self.layers as f32)),
            "line_width" => Some(SettingValue::Number(self.line_width)),
            "amplitude" => Some(SettingValue::Number(self.amplitude_pct)),
            "persistence" => Some(SettingValue::Number(self.persistence_pct)),
            "glow" => Some(SettingValue::Flag(self.glow)),
            "color_scheme" => Some(SettingValue::Choice(self.scheme)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas) {
        let (w, h) = (ctx.w as f32, ctx.h as f32);

        // Persistence: the higher it is, the less we fade the old traces.
        let fade = (1.0 - self.persistence_pct / 100.0) * 0.45 + 0.05;
        canvas.fade(fade);

        let colors = layer_colors(self.scheme);
        let amp = self.amplitude_pct / 100.0;
        let layers = self.layers.clamp(1, 4);
        let lane_h = h / (layers as f32 + 1.0);

        for layer in 0..layers {
            let base_y = lane_h * (layer as f32 + 1.0);
            let color = colors[layer % colors.len()];
            // Each layer reads the waveform with a phase offset so the
            // traces separate instead of stacking.
            let phase = layer * 16;

            let mut prev: Option<(f32, f32)> = None;
            let steps = ctx.w.max(2);
            for sx in 0..steps {
                let t = sx as f32 / (steps - 1) as f32;
                let idx = ((t * (SPECTRUM_BINS - 1) as f32) as usize + phase) % SPECTRUM_BINS;
                let v = (samples.wave[idx] as f32 - 128.0) / 128.0;
                let x = t * (w - 1.0);
                let y = base_y + v * lane_h * 0.9 * amp;

                if let Some((px, py)) = prev {
                    if self.glow {
                        canvas.line_blend(px, py, x, y, color, 0.18);
                    }
                    for off in 0..self.line_width as i32 {
                        let o = off as f32 - (self.line_width - 1.0) * 0.5;
                        canvas.line(px, py + o, x, y + o, color);
                    }
                }
                prev = Some((x, y));
            }

            // Faint centre line per lane, scope-style.
            canvas.line_blend(0.0, base_y, w - 1.0, base_y, color.scale(0.3), 0.15);
        }
    }
}
