//! Kaleidoscope: band magnitudes drawn as petals in one wedge, then
//! replicated around the centre with alternating mirror segments.

use std::f32::consts::TAU;
use std::time::Duration;

use crate::audio::{SampleBlock, SPECTRUM_BINS};
use crate::canvas::{Canvas, Rgb};
use crate::viz::registry::{MutationDraw, MutationEntry};
use crate::viz::settings::{
    SelectOption, SettingKind, SettingSpec, SettingValue, SettingsSchema,
};
use crate::viz::{FrameCtx, Visualizer, MUTATE_MODE};

/// Number of petal samples taken across the spectrum per wedge.
const PETALS: usize = 14;

fn cycle_color(hue: f32, level: f32) -> Rgb {
    let h = hue.rem_euclid(1.0) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let k = 0.25 + level * 0.75;
    Rgb::new(
        (r * k * 255.0) as u8,
        (g * k * 255.0) as u8,
        (b * k * 255.0) as u8,
    )
}

static PATTERN_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "petals", label: "Petals" },
    SelectOption { value: "orbits", label: "Orbits" },
    SelectOption { value: "spokes", label: "Spokes" },
];

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Kaleidoscope",
    settings: &[
        SettingSpec {
            key: "segments",
            label: "Segments",
            kind: SettingKind::Range { min: 4.0, max: 16.0, step: 2.0, unit: "" },
            default: SettingValue::Number(8.0),
        },
        SettingSpec {
            key: "rotation_speed",
            label: "Rotation Speed",
            kind: SettingKind::Range { min: 0.0, max: 200.0, step: 10.0, unit: "%" },
            default: SettingValue::Number(60.0),
        },
        SettingSpec {
            key: "color_cycle",
            label: "Color Cycle",
            kind: SettingKind::Range { min: 0.0, max: 100.0, step: 5.0, unit: "%" },
            default: SettingValue::Number(30.0),
        },
        SettingSpec {
            key: "trail_fade",
            label: "Trail Fade",
            kind: SettingKind::Range { min: 1.0, max: 30.0, step: 1.0, unit: "" },
            default: SettingValue::Number(8.0),
        },
        SettingSpec {
            key: "pattern",
            label: "Pattern",
            kind: SettingKind::Select { options: PATTERN_OPTIONS },
            default: SettingValue::Choice("petals"),
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
        key: "segments",
        probability: 0.3,
        draw: MutationDraw::Values(&[
            SettingValue::Number(6.0),
            SettingValue::Number(8.0),
            SettingValue::Number(10.0),
            SettingValue::Number(12.0),
        ]),
    },
    MutationEntry {
        key: "pattern",
        probability: 0.4,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("petals"),
            SettingValue::Choice("orbits"),
            SettingValue::Choice("spokes"),
        ]),
    },
    MutationEntry {
        key: "rotation_speed",
        probability: 0.25,
        draw: MutationDraw::Range { min: 20.0, max: 160.0, step: 10.0 },
    },
    MutationEntry {
        key: "trail_fade",
        probability: 0.2,
        draw: MutationDraw::Range { min: 4.0, max: 20.0, step: 1.0 },
    },
];

pub struct KaleidoscopeViz {
    segments: usize,
    rotation_pct: f32,
    color_cycle_pct: f32,
    trail_fade: f32,
    pattern: &'static str,
    mutate_mode: bool,

    rotation: f32,
    hue: f32,
    levels: [f32; PETALS],

    // Cached geometry, refreshed on resize.
    cx: f32,
    cy: f32,
    radius: f32,
}

impl KaleidoscopeViz {
    pub fn new() -> Self {
        Self {
            segments: 8,
            rotation_pct: 60.0,
            color_cycle_pct: 30.0,
            trail_fade: 8.0,
            pattern: "petals",
            mutate_mode: false,
            rotation: 0.0,
            hue: 0.0,
            levels: [0.0; PETALS],
            cx: 0.0,
            cy: 0.0,
            radius: 0.0,
        }
    }

    fn update_levels(&mut self, samples: &SampleBlock) {
        // One bucket per petal over the musical lower 3/4 of the spectrum.
        let span = SPECTRUM_BINS * 3 / 4 / PETALS;
        for (i, slot) in self.levels.iter_mut().enumerate() {
            let v = samples.band_average(i * span, (i + 1) * span);
            *slot = *slot * 0.6 + v * 0.4;
        }
    }

    fn ensure_geometry(&mut self, w: usize, h: usize) {
        // Recomputed lazily too: resize is not guaranteed before the first
        // render.
        let (w, h) = (w as f32, h as f32);
        if self.cx != w * 0.5 || self.cy != h * 0.5 {
            self.cx = w * 0.5;
            self.cy = h * 0.5;
            self.radius = w.min(h) * 0.48;
        }
    }

    /// Draw one point in wedge space at every segment, mirroring odd
    /// segments, which is what produces the kaleidoscope symmetry.
    fn stamp(&self, canvas: &mut Canvas, angle: f32, dist: f32, size: f32, c: Rgb) {
        let seg_angle = TAU / self.segments as f32;
        for s in 0..self.segments {
            let mirrored = if s % 2 == 0 { angle } else { seg_angle - angle };
            let a = mirrored + s as f32 * seg_angle + self.rotation;
            let x = self.cx + a.cos() * dist;
            let y = self.cy + a.sin() * dist;
            canvas.blend_circle(x, y, size, c, 0.8);
        }
    }
}

impl Default for KaleidoscopeViz {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for KaleidoscopeViz {
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
        self.rotation = 0.0;
        self.hue = 0.0;
        self.levels = [0.0; PETALS];
    }

    fn on_resize(&mut self, w: usize, h: usize) {
        self.ensure_geometry(w, h);
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("segments", SettingValue::Number(v)) => self.segments = v as usize,
            ("rotation_speed", SettingValue::Number(v)) => self.rotation_pct = v,
            ("color_cycle", SettingValue::Number(v)) => self.color_cycle_pct = v,
            ("trail_fade", SettingValue::Number(v)) => self.trail_fade = v,
            ("pattern", SettingValue::Choice(v)) => self.pattern = v,
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "segments" => Some(SettingValue::Number(self.segments as f32)),
            "rotation_speed" => Some(SettingValue::Number(self.rotation_pct)),
            "color_cycle" => Some(SettingValue::Number(self.color_cycle_pct)),
            "trail_fade" => Some(SettingValue::Number(self.trail_fade)),
            "pattern" => Some(SettingValue::Choice(self.pattern)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas) {
        self.ensure_geometry(ctx.w, ctx.h);
        self.update_levels(samples);

        let bass = samples.band_average(1, 12);
        self.rotation += ctx.dt * self.rotation_pct / 100.0 * (0.4 + bass * 2.0);
        self.hue += ctx.dt * self.color_cycle_pct / 100.0 * 0.25;

        canvas.fade(self.trail_fade * 0.015 + ctx.dt * 0.3);

        let seg_angle = TAU / self.segments as f32;
        for (i, &level) in self.levels.iter().enumerate() {
            let petal_frac = i as f32 / PETALS as f32;
            let angle = petal_frac * seg_angle;
            let c = cycle_color(self.hue + petal_frac * 0.5, level);

            match self.pattern {
                "orbits" => {
                    // Rings whose radius pulses with the band.
                    let dist = self.radius * (0.2 + petal_frac * 0.75);
                    let size = 1.0 + level * 6.0;
                    let orbit_angle = angle + ctx.t * (0.2 + petal_frac * 0.4);
                    self.stamp(canvas, orbit_angle % seg_angle, dist, size, c);
                }
                "spokes" => {
                    // Dotted spokes growing outward with level.
                    let len = self.radius * (0.15 + level * 0.85);
                    let dots = 6;
                    for d in 0..dots {
                        let dist = len * (d as f32 + 1.0) / dots as f32;
                        self.stamp(canvas, angle, dist, 1.0 + level * 2.5, c);
                    }
                }
                // "petals"
                _ => {
                    let dist = self.radius * (0.18 + level * 0.8);
                    let size = 1.5 + level * 7.0;
                    self.stamp(canvas, angle, dist, size, c);
                }
            }
        }

        // Centre pulse on overall level.
        let level = samples.level();
        canvas.blend_circle(
            self.cx,
            self.cy,
            2.0 + level * self.radius * 0.12,
            cycle_color(self.hue, 1.0),
            0.5,
        );
    }
}
