//! Plasma flow: a sinusoidal interference field whose scale, pace and
//! brightness ride the band energy.

use std::f32::consts::PI;
use std::time::Duration;

use crate::audio::{SampleBlock, SPECTRUM_BINS};
use crate::canvas::{Canvas, Rgb};
use crate::viz::registry::{MutationDraw, MutationEntry};
use crate::viz::settings::{
    SelectOption, SettingKind, SettingSpec, SettingValue, SettingsSchema,
};
use crate::viz::{FrameCtx, Visualizer, MUTATE_MODE};

fn palette_color(name: &str, phase: f32, brightness: f32) -> Rgb {
    let tri = |shift: f32| (0.5 + 0.5 * (phase * PI * 2.0 + shift).sin()) * brightness;
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    match name {
        "fire" => Rgb::new(
            byte(tri(0.0) * 1.1),
            byte(tri(0.0) * tri(0.0) * 0.8),
            byte(tri(2.1) * 0.15),
        ),
        "ocean" => Rgb::new(byte(tri(2.4) * 0.2), byte(tri(1.2) * 0.7), byte(tri(0.0))),
        "acid" => Rgb::new(byte(tri(1.6)), byte(tri(0.0)), byte(tri(3.6) * 0.6)),
        "mono" => {
            let v = byte(tri(0.0));
            Rgb::new(v, v, v)
        }
        // "prism"
        _ => Rgb::new(byte(tri(0.0)), byte(tri(2.1)), byte(tri(4.2))),
    }
}

static PALETTE_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "prism", label: "Prism" },
    SelectOption { value: "fire", label: "Fire" },
    SelectOption { value: "ocean", label: "Ocean" },
    SelectOption { value: "acid", label: "Acid" },
    SelectOption { value: "mono", label: "Monochrome" },
];

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Plasma Flow",
    settings: &[
        SettingSpec {
            key: "scale",
            label: "Field Scale",
            kind: SettingKind::Range { min: 1.0, max: 8.0, step: 0.5, unit: "" },
            default: SettingValue::Number(3.0),
        },
        SettingSpec {
            key: "speed",
            label: "Speed",
            kind: SettingKind::Range { min: 25.0, max: 200.0, step: 25.0, unit: "%" },
            default: SettingValue::Number(100.0),
        },
        SettingSpec {
            key: "detail",
            label: "Detail",
            kind: SettingKind::Range { min: 1.0, max: 4.0, step: 1.0, unit: "" },
            default: SettingValue::Number(2.0),
        },
        SettingSpec {
            key: "palette",
            label: "Palette",
            kind: SettingKind::Select { options: PALETTE_OPTIONS },
            default: SettingValue::Choice("prism"),
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
        key: "palette",
        probability: 0.5,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("prism"),
            SettingValue::Choice("fire"),
            SettingValue::Choice("ocean"),
            SettingValue::Choice("acid"),
            SettingValue::Choice("mono"),
        ]),
    },
    MutationEntry {
        key: "scale",
        probability: 0.3,
        draw: MutationDraw::Range { min: 1.5, max: 6.0, step: 0.5 },
    },
    MutationEntry {
        key: "speed",
        probability: 0.25,
        draw: MutationDraw::Range { min: 50.0, max: 175.0, step: 25.0 },
    },
];

pub struct PlasmaViz {
    scale: f32,
    speed_pct: f32,
    /// Inverse block size: 1 = chunky, 4 = per-pixel-ish.
    detail: usize,
    palette: &'static str,
    mutate_mode: bool,

    /// Field time; advances with audio-modulated pace, so it is simulation
    /// state rather than wall-clock.
    phase: f32,
    bass: f32,
    level: f32,
}

impl PlasmaViz {
    pub fn new() -> Self {
        Self {
            scale: 3.0,
            speed_pct: 100.0,
            detail: 2,
            palette: "prism",
            mutate_mode: false,
            phase: 0.0,
            bass: 0.0,
            level: 0.0,
        }
    }
}

impl Default for PlasmaViz {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for PlasmaViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn on_start(&mut self) {
        self.phase = 0.0;
        self.bass = 0.0;
        self.level = 0.0;
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("scale", SettingValue::Number(v)) => self.scale = v,
            ("speed", SettingValue::Number(v)) => self.speed_pct = v,
            ("detail", SettingValue::Number(v)) => self.detail = v as usize,
            ("palette", SettingValue::Choice(v)) => self.palette = v,
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "scale" => Some(SettingValue::Number(self.scale)),
            "speed" => Some(SettingValue::Number(self.speed_pct)),
            "detail" => Some(SettingValue::Number(self.detail as f32)),
            "palette" => Some(SettingValue::Choice(self.palette)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas) {
        let bass = samples.band_average(1, 12);
        let level = samples.level();
        self.bass = self.bass * 0.8 + bass * 0.2;
        self.level = self.level * 0.8 + level * 0.2;

        // Audio drives the clock: quiet passages crawl, loud ones churn.
        let pace = self.speed_pct / 100.0 * (0.35 + self.level * 2.2);
        self.phase += ctx.dt * pace;

        let t = self.phase;
        let freq = self.scale * (1.0 + self.bass * 0.6);
        let brightness = 0.35 + self.level * 1.3;
        let block = (5 - self.detail.clamp(1, 4)).max(1);

        let (w, h) = (ctx.w, ctx.h);
        for by in (0..h).step_by(block) {
            for bx in (0..w).step_by(block) {
                let nx = bx as f32 / w as f32 * 2.0 - 1.0;
                let ny = by as f32 / h as f32 * 2.0 - 1.0;

                let v = (nx * freq + t).sin()
                    + (ny * freq - t * 1.3).sin()
                    + ((nx + ny) * freq * 0.7 + t * 0.7).sin()
                    + ((nx * nx + ny * ny).sqrt() * freq * 1.5 - t).sin();
                let phase = v * 0.25 + t * 0.05;

                let c = palette_color(self.palette, phase, brightness);
                canvas.fill_rect(bx as i32, by as i32, block as i32, block as i32, c);
            }
        }

        // Treble sparkle: brief bright flecks seeded by the upper bins.
        let treble = samples.band_average(SPECTRUM_BINS / 2, SPECTRUM_BINS);
        if treble > 0.25 {
            let count = (treble * 24.0) as usize;
            for _ in 0..count {
                let x = fastrand::usize(..w.max(1)) as i32;
                let y = fastrand::usize(..h.max(1)) as i32;
                canvas.add(x, y, Rgb::WHITE, treble * 0.5);
            }
        }
    }
}
