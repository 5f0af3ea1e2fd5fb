//! Spectrum bars: logarithmic frequency banding, exponential smoothing,
//! gradient fills and falling peak dots.

use std::time::Duration;

use crate::audio::{SampleBlock, SPECTRUM_BINS};
use crate::canvas::{Canvas, Rgb};
use crate::viz::registry::{MutationDraw, MutationEntry};
use crate::viz::settings::{
    SelectOption, SettingKind, SettingSpec, SettingValue, SettingsSchema,
};
use crate::viz::{FrameCtx, Visualizer, MUTATE_MODE};

const MIN_BARS: usize = 16;
const MAX_BARS: usize = 128;
/// Pixels per second a peak dot falls once its bar drops away.
const PEAK_FALL_PX_PER_SEC: f32 = 18.0;

struct Scheme {
    primary: Rgb,
    secondary: Rgb,
    accent: Rgb,
    peak: Rgb,
}

fn scheme(name: &str) -> Scheme {
    match name {
        "rainbow" => Scheme {
            primary: Rgb::new(255, 0, 0),
            secondary: Rgb::new(255, 255, 0),
            accent: Rgb::new(0, 255, 0),
            peak: Rgb::WHITE,
        },
        "fire" => Scheme {
            primary: Rgb::new(255, 69, 0),
            secondary: Rgb::new(255, 101, 0),
            accent: Rgb::new(255, 255, 0),
            peak: Rgb::WHITE,
        },
        "ocean" => Scheme {
            primary: Rgb::new(0, 102, 204),
            secondary: Rgb::new(0, 153, 255),
            accent: Rgb::new(0, 204, 255),
            peak: Rgb::WHITE,
        },
        "neon" => Scheme {
            primary: Rgb::new(0, 255, 0),
            secondary: Rgb::new(0, 255, 136),
            accent: Rgb::new(0, 255, 255),
            peak: Rgb::WHITE,
        },
        "ice" => Scheme {
            primary: Rgb::new(77, 184, 255),
            secondary: Rgb::new(128, 208, 255),
            accent: Rgb::new(179, 224, 255),
            peak: Rgb::WHITE,
        },
        // "purple"
        _ => Scheme {
            primary: Rgb::new(99, 102, 241),
            secondary: Rgb::new(139, 92, 246),
            accent: Rgb::new(236, 72, 153),
            peak: Rgb::new(245, 158, 11),
        },
    }
}

enum Background {
    Solid(Rgb),
    Radial { inner: Rgb, outer: Rgb },
}

fn background(name: &str) -> Background {
    match name {
        "black" => Background::Solid(Rgb::BLACK),
        "navy" => Background::Solid(Rgb::new(10, 10, 26)),
        "purple" => Background::Solid(Rgb::new(26, 10, 26)),
        "teal" => Background::Solid(Rgb::new(10, 42, 42)),
        "galaxy" => Background::Radial {
            inner: Rgb::new(26, 10, 42),
            outer: Rgb::new(0, 0, 16),
        },
        "glow" => Background::Radial {
            inner: Rgb::new(10, 42, 10),
            outer: Rgb::new(0, 10, 0),
        },
        // "dark"
        _ => Background::Solid(Rgb::new(12, 12, 12)),
    }
}

static SCHEME_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "purple", label: "Purple Gradient" },
    SelectOption { value: "rainbow", label: "Rainbow" },
    SelectOption { value: "fire", label: "Fire" },
    SelectOption { value: "ocean", label: "Ocean" },
    SelectOption { value: "neon", label: "Neon Green" },
    SelectOption { value: "ice", label: "Ice Blue" },
];

static BACKGROUND_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "dark", label: "Dark" },
    SelectOption { value: "black", label: "Pure Black" },
    SelectOption { value: "navy", label: "Deep Navy" },
    SelectOption { value: "purple", label: "Dark Purple" },
    SelectOption { value: "teal", label: "Deep Teal" },
    SelectOption { value: "galaxy", label: "Galaxy" },
    SelectOption { value: "glow", label: "Neon Glow" },
];

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Spectrum Bars",
    settings: &[
        SettingSpec {
            key: "bar_count",
            label: "Bar Count",
            kind: SettingKind::Range { min: 16.0, max: 128.0, step: 16.0, unit: "" },
            default: SettingValue::Number(64.0),
        },
        SettingSpec {
            key: "smoothing",
            label: "Smoothing",
            kind: SettingKind::Range { min: 0.0, max: 95.0, step: 5.0, unit: "%" },
            default: SettingValue::Number(80.0),
        },
        SettingSpec {
            key: "sensitivity",
            label: "Sensitivity",
            kind: SettingKind::Range { min: 25.0, max: 100.0, step: 5.0, unit: "%" },
            default: SettingValue::Number(50.0),
        },
        SettingSpec {
            key: "peak_dots",
            label: "Peak Dots",
            kind: SettingKind::Toggle,
            default: SettingValue::Flag(true),
        },
        SettingSpec {
            key: "color_scheme",
            label: "Color Scheme",
            kind: SettingKind::Select { options: SCHEME_OPTIONS },
            default: SettingValue::Choice("purple"),
        },
        SettingSpec {
            key: "background",
            label: "Background",
            kind: SettingKind::Select { options: BACKGROUND_OPTIONS },
            default: SettingValue::Choice("dark"),
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
        probability: 0.6,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("purple"),
            SettingValue::Choice("rainbow"),
            SettingValue::Choice("fire"),
            SettingValue::Choice("ocean"),
            SettingValue::Choice("neon"),
            SettingValue::Choice("ice"),
        ]),
    },
    MutationEntry {
        key: "bar_count",
        probability: 0.3,
        draw: MutationDraw::Values(&[
            SettingValue::Number(48.0),
            SettingValue::Number(64.0),
            SettingValue::Number(80.0),
            SettingValue::Number(96.0),
        ]),
    },
    MutationEntry {
        key: "smoothing",
        probability: 0.25,
        draw: MutationDraw::Range { min: 70.0, max: 90.0, step: 5.0 },
    },
    MutationEntry {
        key: "peak_dots",
        probability: 0.15,
        draw: MutationDraw::Values(&[SettingValue::Flag(true), SettingValue::Flag(false)]),
    },
    MutationEntry {
        key: "background",
        probability: 0.5,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("dark"),
            SettingValue::Choice("black"),
            SettingValue::Choice("navy"),
            SettingValue::Choice("purple"),
            SettingValue::Choice("teal"),
            SettingValue::Choice("galaxy"),
            SettingValue::Choice("glow"),
        ]),
    },
];

pub struct BarsViz {
    bars: usize,
    smoothing_pct: f32,
    sensitivity_pct: f32,
    peak_dots: bool,
    scheme: &'static str,
    background: &'static str,
    mutate_mode: bool,

    // Simulation state; reset when the bar count changes.
    prev_heights: Vec<f32>,
    peaks: Vec<f32>,
}

impl BarsViz {
    pub fn new() -> Self {
        Self {
            bars: 64,
            smoothing_pct: 80.0,
            sensitivity_pct: 50.0,
            peak_dots: true,
            scheme: "purple",
            background: "dark",
            mutate_mode: false,
            prev_heights: vec![0.0; 64],
            peaks: vec![0.0; 64],
        }
    }

    fn set_bar_count(&mut self, count: usize) {
        self.bars = count.clamp(MIN_BARS, MAX_BARS);
        self.prev_heights = vec![0.0; self.bars];
        self.peaks = vec![0.0; self.bars];
    }

    /// Log-curve mapping of bars onto the lower 60% of the spectrum (roughly
    /// 20 Hz - 8 kHz, where the musical content lives), averaged over a
    /// small neighbourhood, normalized, boosted toward the treble end and
    /// exponentially smoothed against the previous frame.
    fn bar_heights(&mut self, samples: &SampleBlock, height: f32) -> Vec<f32> {
        let bars = self.bars;
        let smoothing = self.smoothing_pct / 100.0;
        let sensitivity = self.sensitivity_pct / 100.0 * 2.0;
        let max_idx = (SPECTRUM_BINS as f32 * 0.6) as usize;

        let mut out = vec![0.0f32; bars];
        for (i, slot) in out.iter_mut().enumerate() {
            let log_pos = (i as f32 / (bars - 1).max(1) as f32).powf(2.8);
            let data_idx = (log_pos * max_idx as f32) as usize;

            let range = (max_idx / bars / 3).max(1);
            let lo = data_idx.saturating_sub(range);
            let hi = (data_idx + range + 1).min(max_idx.max(1));
            let avg = samples.band_average(lo, hi);

            let boost = 1.0 + (i as f32 / bars as f32) * 0.8;
            let v = (avg * sensitivity * boost).min(1.0).powf(0.65);

            let smoothed = self.prev_heights[i] * smoothing + v * (1.0 - smoothing);
            self.prev_heights[i] = smoothed;
            *slot = smoothed * height;
        }
        out
    }

    fn draw_background(&self, canvas: &mut Canvas) {
        match background(self.background) {
            Background::Solid(c) => canvas.clear(c),
            Background::Radial { inner, outer } => canvas.fill_radial(inner, outer),
        }
    }
}

impl Default for BarsViz {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for BarsViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("bar_count", SettingValue::Number(v)) => self.set_bar_count(v as usize),
            ("smoothing", SettingValue::Number(v)) => self.smoothing_pct = v,
            ("sensitivity", SettingValue::Number(v)) => self.sensitivity_pct = v,
            ("peak_dots", SettingValue::Flag(v)) => self.peak_dots = v,
            ("color_scheme", SettingValue::Choice(v)) => self.scheme = v,
            ("background", SettingValue::Choice(v)) => self.background = v,
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "bar_count" => Some(SettingValue::Number(self.bars as f32)),
            "smoothing" => Some(SettingValue::Number(self.smoothing_pct)),
            "sensitivity" => Some(SettingValue::Number(self.sensitivity_pct)),
            "peak_dots" => Some(SettingValue::Flag(self.peak_dots)),
            "color_scheme" => Some(SettingValue::Choice(self.scheme)),
            "background" => Some(SettingValue::Choice(self.background)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas) {
        let w = ctx.w as f32;
        let h = ctx.h as f32;
        self.draw_background(canvas);

        let heights = self.bar_heights(samples, h);
        let colors = scheme(self.scheme);
        let bar_w = w / self.bars as f32;

        for (i, &bar_h) in heights.iter().enumerate() {
            let x = (i as f32 * bar_w) as i32;
            let draw_w = ((bar_w - 1.0).max(1.0)) as i32;
            let top = (h - bar_h) as i32;

            // Bottom-to-top gradient: primary -> secondary -> accent.
            let hot = bar_h > h * 0.6;
            for y in top..ctx.h as i32 {
                let frac = 1.0 - (y as f32 / h);
                let c = if frac < 0.5 {
                    colors.primary.lerp(colors.secondary, frac * 2.0)
                } else {
                    colors.secondary.lerp(colors.accent, (frac - 0.5) * 2.0)
                };
                let c = if hot { c.scale(1.25) } else { c };
                canvas.fill_rect(x, y, draw_w, 1, c);
            }

            if self.peak_dots {
                if bar_h > self.peaks[i] {
                    self.peaks[i] = bar_h;
                } else {
                    self.peaks[i] = (self.peaks[i] - PEAK_FALL_PX_PER_SEC * ctx.dt * h / 100.0).max(0.0);
                }
                if self.peaks[i] > 0.5 {
                    let cx = i as f32 * bar_w + bar_w * 0.5;
                    let cy = h - self.peaks[i];
                    canvas.fill_circle(cx, cy, (bar_w * 0.18).clamp(1.0, 2.5), colors.peak);
                }
            }
        }
    }

    fn on_resize(&mut self, _w: usize, h: usize) {
        // Peaks are stored in pixels; drop them so they re-seed at the new
        // height instead of floating mid-air.
        let h = h as f32;
        for p in &mut self.peaks {
            *p = p.min(h);
        }
    }
}
