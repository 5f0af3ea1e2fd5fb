//! Particle storm: particles spawn with the energy of the band that birthed
//! them, drift under gravity and friction, and link up with connection
//! lines when they pass close to each other.

use std::time::Duration;

use crate::audio::{SampleBlock, SPECTRUM_BINS};
use crate::canvas::{Canvas, Rgb};
use crate::viz::registry::{MutationDraw, MutationEntry};
use crate::viz::settings::{
    SelectOption, SettingKind, SettingSpec, SettingValue, SettingsSchema,
};
use crate::viz::{FrameCtx, Visualizer, MUTATE_MODE};

const GRAVITY: f32 = 14.0;
const FRICTION_PER_SEC: f32 = 0.55;
const LIFE_SECS: f32 = 5.0;

#[derive(Clone, Copy, PartialEq)]
enum Band {
    Bass,
    Mid,
    Treble,
}

struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
    band: Band,
}

struct Scheme {
    bass: Rgb,
    mid: Rgb,
    treble: Rgb,
    connection: Rgb,
}

fn scheme(name: &str) -> Scheme {
    match name {
        "fire" => Scheme {
            bass: Rgb::new(255, 102, 0),
            mid: Rgb::new(255, 153, 0),
            treble: Rgb::new(255, 204, 0),
            connection: Rgb::new(255, 51, 0),
        },
        "ice" => Scheme {
            bass: Rgb::new(0, 204, 255),
            mid: Rgb::new(102, 221, 255),
            treble: Rgb::new(153, 238, 255),
            connection: Rgb::WHITE,
        },
        "neon" => Scheme {
            bass: Rgb::new(255, 0, 255),
            mid: Rgb::new(0, 255, 255),
            treble: Rgb::new(255, 255, 0),
            connection: Rgb::WHITE,
        },
        "aurora" => Scheme {
            bass: Rgb::new(0, 255, 128),
            mid: Rgb::new(128, 128, 255),
            treble: Rgb::new(255, 128, 128),
            connection: Rgb::new(128, 255, 128),
        },
        // "frequency"
        _ => Scheme {
            bass: Rgb::new(255, 68, 68),
            mid: Rgb::new(68, 255, 68),
            treble: Rgb::new(68, 68, 255),
            connection: Rgb::WHITE,
        },
    }
}

static SCHEME_OPTIONS: &[SelectOption] = &[
    SelectOption { value: "frequency", label: "Frequency" },
    SelectOption { value: "fire", label: "Fire" },
    SelectOption { value: "ice", label: "Ice" },
    SelectOption { value: "neon", label: "Neon" },
    SelectOption { value: "aurora", label: "Aurora" },
];

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Particle Storm",
    settings: &[
        SettingSpec {
            key: "max_particles",
            label: "Max Particles",
            kind: SettingKind::Range { min: 50.0, max: 400.0, step: 25.0, unit: "" },
            default: SettingValue::Number(200.0),
        },
        SettingSpec {
            key: "particle_size",
            label: "Particle Size",
            kind: SettingKind::Range { min: 1.0, max: 8.0, step: 1.0, unit: "px" },
            default: SettingValue::Number(3.0),
        },
        SettingSpec {
            key: "speed",
            label: "Speed",
            kind: SettingKind::Range { min: 25.0, max: 250.0, step: 25.0, unit: "%" },
            default: SettingValue::Number(100.0),
        },
        SettingSpec {
            key: "trail_fade",
            label: "Trail Fade",
            kind: SettingKind::Range { min: 1.0, max: 20.0, step: 1.0, unit: "" },
            default: SettingValue::Number(3.0),
        },
        SettingSpec {
            key: "connections",
            label: "Connection Lines",
            kind: SettingKind::Toggle,
            default: SettingValue::Flag(true),
        },
        SettingSpec {
            key: "connection_distance",
            label: "Connection Distance",
            kind: SettingKind::Range { min: 40.0, max: 160.0, step: 10.0, unit: "px" },
            default: SettingValue::Number(80.0),
        },
        SettingSpec {
            key: "color_scheme",
            label: "Color Scheme",
            kind: SettingKind::Select { options: SCHEME_OPTIONS },
            default: SettingValue::Choice("frequency"),
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
            SettingValue::Choice("frequency"),
            SettingValue::Choice("fire"),
            SettingValue::Choice("ice"),
            SettingValue::Choice("neon"),
            SettingValue::Choice("aurora"),
        ]),
    },
    MutationEntry {
        key: "max_particles",
        probability: 0.25,
        draw: MutationDraw::Values(&[
            SettingValue::Number(100.0),
            SettingValue::Number(150.0),
            SettingValue::Number(200.0),
            SettingValue::Number(250.0),
            SettingValue::Number(300.0),
        ]),
    },
    MutationEntry {
        key: "particle_size",
        probability: 0.3,
        draw: MutationDraw::Range { min: 2.0, max: 6.0, step: 1.0 },
    },
    MutationEntry {
        key: "connections",
        probability: 0.2,
        draw: MutationDraw::Values(&[SettingValue::Flag(true), SettingValue::Flag(false)]),
    },
    MutationEntry {
        key: "connection_distance",
        probability: 0.25,
        draw: MutationDraw::Range { min: 50.0, max: 120.0, step: 10.0 },
    },
];

pub struct ParticlesViz {
    max_particles: usize,
    particle_size: f32,
    speed_pct: f32,
    trail_fade: f32,
    connections: bool,
    connection_distance: f32,
    scheme: &'static str,
    mutate_mode: bool,

    particles: Vec<Particle>,
    bass: f32,
    mid: f32,
    treble: f32,
}

impl ParticlesViz {
    pub fn new() -> Self {
        Self {
            max_particles: 200,
            particle_size: 3.0,
            speed_pct: 100.0,
            trail_fade: 3.0,
            connections: true,
            connection_distance: 80.0,
            scheme: "frequency",
            mutate_mode: false,
            particles: Vec::new(),
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
        }
    }

    fn update_levels(&mut self, samples: &SampleBlock) {
        // Three coarse bands over the byte spectrum, exponentially smoothed
        // so spawn rates breathe instead of flickering.
        let bass = samples.band_average(1, 12);
        let mid = samples.band_average(12, 64);
        let treble = samples.band_average(64, SPECTRUM_BINS * 3 / 4);
        self.bass = self.bass * 0.7 + bass * 0.3;
        self.mid = self.mid * 0.7 + mid * 0.3;
        self.treble = self.treble * 0.7 + treble * 0.3;
    }

    fn spawn(&mut self, w: f32, h: f32) {
        let budget = self.max_particles.saturating_sub(self.particles.len());
        if budget == 0 {
            return;
        }
        let energy = self.bass * 1.5 + self.mid + self.treble * 0.8;
        let want = ((energy * 4.0) as usize).min(budget);
        let speed = self.speed_pct / 100.0;

        for _ in 0..want {
            // Weighted band pick: louder bands seed more of their color.
            let total = (self.bass + self.mid + self.treble).max(1e-3);
            let roll = fastrand::f32() * total;
            let (band, level) = if roll < self.bass {
                (Band::Bass, self.bass)
            } else if roll < self.bass + self.mid {
                (Band::Mid, self.mid)
            } else {
                (Band::Treble, self.treble)
            };

            let kick = (20.0 + level * 160.0) * speed;
            let angle = fastrand::f32() * std::f32::consts::TAU;
            self.particles.push(Particle {
                x: fastrand::f32() * w,
                y: h * (0.25 + fastrand::f32() * 0.6),
                vx: angle.cos() * kick,
                vy: angle.sin() * kick - level * 40.0 * speed,
                life: LIFE_SECS * (0.4 + fastrand::f32() * 0.6),
                band,
            });
        }
    }

    fn step(&mut self, dt: f32, w: f32, h: f32) {
        let friction = FRICTION_PER_SEC.powf(dt);
        for p in &mut self.particles {
            p.vx *= friction;
            p.vy = p.vy * friction + GRAVITY * dt;
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.life -= dt;

            // Bounce off the floor and walls, lose a little energy.
            if p.y > h - 1.0 {
                p.y = h - 1.0;
                p.vy = -p.vy.abs() * 0.6;
            }
            if p.x < 0.0 {
                p.x = 0.0;
                p.vx = p.vx.abs();
            } else if p.x > w - 1.0 {
                p.x = w - 1.0;
                p.vx = -p.vx.abs();
            }
        }
        self.particles.retain(|p| p.life > 0.0 && p.y > -8.0);
    }

    fn band_color(colors: &Scheme, band: Band) -> Rgb {
        match band {
            Band::Bass => colors.bass,
            Band::Mid => colors.mid,
            Band::Treble => colors.treble,
        }
    }
}

impl Default for ParticlesViz {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for ParticlesViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(4)
    }

    fn on_start(&mut self) {
        self.particles.clear();
        self.bass = 0.0;
        self.mid = 0.0;
        self.treble = 0.0;
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("max_particles", SettingValue::Number(v)) => {
                self.max_particles = v as usize;
                self.particles.truncate(self.max_particles);
            }
            ("particle_size", SettingValue::Number(v)) => self.particle_size = v,
            ("speed", SettingValue::Number(v)) => self.speed_pct = v,
            ("trail_fade", SettingValue::Number(v)) => self.trail_fade = v,
            ("connections", SettingValue::Flag(v)) => self.connections = v,
            ("connection_distance", SettingValue::Number(v)) => self.connection_distance = v,
            ("color_scheme", SettingValue::Choice(v)) => self.scheme = v,
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "max_particles" => Some(SettingValue::Number(self.max_particles as f32)),
            "particle_size" => Some(SettingValue::Number(self.particle_size)),
            "speed" => Some(SettingValue::Number(self.speed_pct)),
            "trail_fade" => Some(SettingValue::Number(self.trail_fade)),
            "connections" => Some(SettingValue::Flag(self.connections)),
            "connection_distance" => Some(SettingValue::Number(self.connection_distance)),
            "color_scheme" => Some(SettingValue::Choice(self.scheme)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn on_resize(&mut self, w: usize, h: usize) {
        let (w, h) = (w as f32, h as f32);
        for p in &mut self.particles {
            p.x = p.x.min(w - 1.0);
            p.y = p.y.min(h - 1.0);
        }
    }

    fn render(&mut self, ctx: &FrameCtx, samples: &SampleBlock, canvas: &mut Canvas) {
        let (w, h) = (ctx.w as f32, ctx.h as f32);

        self.update_levels(samples);
        self.spawn(w, h);
        self.step(ctx.dt, w, h);

        canvas.fade(self.trail_fade * 0.02 + ctx.dt * 0.5);

        let colors = scheme(self.scheme);

        // Pairwise connection pass; quadratic but capped by max_particles.
        if self.connections {
            let dist2 = self.connection_distance * self.connection_distance;
            for i in 0..self.particles.len() {
                for j in (i + 1)..self.particles.len() {
                    let a = &self.particles[i];
                    let b = &self.particles[j];
                    let dx = a.x - b.x;
                    let dy = a.y - b.y;
                    let d2 = dx * dx + dy * dy;
                    if d2 < dist2 {
                        let strength = 1.0 - (d2.sqrt() / self.connection_distance);
                        canvas.line_blend(a.x, a.y, b.x, b.y, colors.connection, strength * 0.35);
                    }
                }
            }
        }

        for p in &self.particles {
            let life_frac = (p.life / LIFE_SECS).clamp(0.0, 1.0);
            let r = self.particle_size * (0.5 + life_frac * 0.7);
            let c = Self::band_color(&colors, p.band);
            canvas.blend_circle(p.x, p.y, r * 1.8, c, 0.12);
            canvas.fill_circle(p.x, p.y, r, c.scale(0.4 + life_frac * 0.6));
        }
    }
}
