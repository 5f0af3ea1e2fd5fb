use std::time::Duration;

use vizdeck::audio::SampleBlock;
use vizdeck::canvas::{Canvas, Rgb};
use vizdeck::viz::{
    Deck, FrameCtx, MutationDraw, MutationEntry, Registry, SettingKind, SettingSpec,
    SettingValue, SettingsSchema, Visualizer, VisualizerInfo, MUTATE_MODE,
};

// --- fixtures -------------------------------------------------------------

/// Plugin "a": one range setting, paints dark grey so draws are observable.
struct SizeViz {
    size: f32,
}

static SIZE_SCHEMA: SettingsSchema = SettingsSchema {
    name: "Size Probe",
    settings: &[SettingSpec {
        key: "size",
        label: "Size",
        kind: SettingKind::Range { min: 1.0, max: 10.0, step: 1.0, unit: "" },
        default: SettingValue::Number(5.0),
    }],
};

impl Visualizer for SizeViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SIZE_SCHEMA
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SIZE_SCHEMA.sanitize(key, value) else {
            return;
        };
        if let ("size", SettingValue::Number(v)) = (key, value) {
            self.size = v;
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "size" => Some(SettingValue::Number(self.size)),
            _ => None,
        }
    }

    fn render(&mut self, ctx: &FrameCtx, _samples: &SampleBlock, canvas: &mut Canvas) {
        canvas.fill_rect(0, 0, ctx.w as i32, ctx.h as i32, Rgb::new(40, 40, 40));
    }
}

/// Plugin "b": no settings at all, paints white.
struct BlankViz;

static EMPTY_SCHEMA: SettingsSchema = SettingsSchema { name: "Blank", settings: &[] };

impl Visualizer for BlankViz {
    fn schema(&self) -> &'static SettingsSchema {
        &EMPTY_SCHEMA
    }

    fn set_setting(&mut self, _key: &str, _value: SettingValue) {}

    fn setting(&self, _key: &str) -> Option<SettingValue> {
        None
    }

    fn render(&mut self, ctx: &FrameCtx, _samples: &SampleBlock, canvas: &mut Canvas) {
        canvas.fill_rect(0, 0, ctx.w as i32, ctx.h as i32, Rgb::WHITE);
    }
}

/// Bumps the red channel of pixel (0,0) once per render and counts starts,
/// which makes loop duplication visible.
struct CountViz {
    starts: f32,
}

impl Visualizer for CountViz {
    fn schema(&self) -> &'static SettingsSchema {
        static SCHEMA: SettingsSchema = SettingsSchema { name: "Counter", settings: &[] };
        &SCHEMA
    }

    fn on_start(&mut self) {
        self.starts += 1.0;
    }

    fn set_setting(&mut self, _key: &str, _value: SettingValue) {}

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "starts" => Some(SettingValue::Number(self.starts)),
            _ => None,
        }
    }

    fn render(&mut self, _ctx: &FrameCtx, _samples: &SampleBlock, canvas: &mut Canvas) {
        let r = canvas.get(0, 0).map(|c| c.r).unwrap_or(0);
        canvas.put(0, 0, Rgb::new(r.saturating_add(1), 0, 0));
    }
}

/// Carries a mutate toggle plus a probability-1.0 mutation on "speed".
/// The mutation range deliberately excludes the default so a tick is always
/// observable, and `changes` counts every applied speed write.
struct MutableViz {
    speed: f32,
    mutate_mode: bool,
    changes: f32,
}

static MUTABLE_SCHEMA: SettingsSchema = SettingsSchema {
    name: "Mutable",
    settings: &[
        SettingSpec {
            key: "speed",
            label: "Speed",
            kind: SettingKind::Range { min: 0.0, max: 100.0, step: 1.0, unit: "%" },
            default: SettingValue::Number(50.0),
        },
        SettingSpec {
            key: MUTATE_MODE,
            label: "Auto Mutate",
            kind: SettingKind::Toggle,
            default: SettingValue::Flag(false),
        },
    ],
};

static MUTABLE_MUTATIONS: &[MutationEntry] = &[MutationEntry {
    key: "speed",
    probability: 1.0,
    draw: MutationDraw::Range { min: 60.0, max: 100.0, step: 1.0 },
}];

impl Visualizer for MutableViz {
    fn schema(&self) -> &'static SettingsSchema {
        &MUTABLE_SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTABLE_MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = MUTABLE_SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("speed", SettingValue::Number(v)) => {
                self.speed = v;
                self.changes += 1.0;
            }
            (MUTATE_MODE, SettingValue::Flag(v)) => self.mutate_mode = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "speed" => Some(SettingValue::Number(self.speed)),
            "changes" => Some(SettingValue::Number(self.changes)),
            MUTATE_MODE => Some(SettingValue::Flag(self.mutate_mode)),
            _ => None,
        }
    }

    fn render(&mut self, _ctx: &FrameCtx, _samples: &SampleBlock, _canvas: &mut Canvas) {}
}

fn ab_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(VisualizerInfo::new("a", "Size Probe", "size probe", || {
        Box::new(SizeViz { size: 5.0 })
    }));
    registry.register(VisualizerInfo::new("b", "Blank", "blank", || Box::new(BlankViz)));
    registry
}

fn seeded_deck(registry: Registry) -> Deck {
    Deck::with_rng(registry, fastrand::Rng::with_seed(0xdeca))
}

fn all_black(canvas: &Canvas) -> bool {
    canvas
        .pixels()
        .chunks_exact(4)
        .all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0)
}

// --- tests ----------------------------------------------------------------

#[test]
fn switch_preserves_customized_settings_and_random_mode_resets_them() {
    let mut deck = seeded_deck(ab_registry());
    assert_eq!(deck.current_id(), Some("a"));

    deck.set_setting("size", SettingValue::Number(9.0));
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(9.0)));

    // Away and back: the customization survives the round trip.
    assert!(deck.switch_to("b"));
    assert!(deck.switch_to("a"));
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(9.0)));

    // Now trigger a random-mode switch that can only land back on "a":
    // the restore is overridden by the fresh-start reset.
    deck.switch_to("b");
    deck.set_random_mode(true);
    deck.set_playing(true);
    deck.advance(26.0, None); // past the longest possible interval

    assert_eq!(deck.current_id(), Some("a"));
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(5.0)));
}

#[test]
fn switching_to_same_id_keeps_the_instance_state() {
    let mut deck = seeded_deck(ab_registry());
    deck.set_setting("size", SettingValue::Number(3.0));
    assert!(deck.switch_to("a"));
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(3.0)));
}

#[test]
fn next_and_prev_cycle_in_registration_order() {
    let mut deck = seeded_deck(ab_registry());
    assert_eq!(deck.current_id(), Some("a"));

    deck.next_visualizer();
    assert_eq!(deck.current_id(), Some("b"));
    deck.next_visualizer();
    assert_eq!(deck.current_id(), Some("a"));
    deck.prev_visualizer();
    assert_eq!(deck.current_id(), Some("b"));
}

#[test]
fn switch_to_unknown_id_is_a_noop() {
    let mut deck = seeded_deck(ab_registry());
    deck.set_setting("size", SettingValue::Number(7.0));

    assert!(!deck.switch_to("does-not-exist"));
    assert_eq!(deck.current_id(), Some("a"));
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(7.0)));
}

#[test]
fn canvas_is_blank_immediately_after_a_switch() {
    let mut deck = seeded_deck(ab_registry());
    deck.resize(16, 16);
    deck.set_playing(true);

    // "a" paints grey; switch over to "b" and let it paint white.
    let block = SampleBlock::default();
    deck.advance(0.016, Some(&block));
    assert!(!all_black(deck.canvas()));

    deck.switch_to("b");
    assert!(
        all_black(deck.canvas()),
        "stale pixels survived the switch to b"
    );

    deck.advance(0.016, Some(&block));
    assert!(!all_black(deck.canvas()));

    deck.switch_to("a");
    assert!(
        all_black(deck.canvas()),
        "stale pixels survived the switch back to a"
    );
}

#[test]
fn start_is_idempotent_and_stop_halts_draws() {
    let mut registry = Registry::new();
    registry.register(VisualizerInfo::new("count", "Counter", "frame counter", || {
        Box::new(CountViz { starts: 0.0 })
    }));
    let mut deck = seeded_deck(registry);
    deck.resize(8, 8);

    let block = SampleBlock::default();

    deck.set_playing(true);
    deck.start_visualization();
    deck.start_visualization();
    assert_eq!(
        deck.current_setting("starts"),
        Some(SettingValue::Number(1.0)),
        "double start must not restart the loop"
    );

    for _ in 0..5 {
        deck.advance(0.016, Some(&block));
    }
    let red = deck.canvas().get(0, 0).map(|c| c.r);
    assert_eq!(red, Some(5), "expected exactly one render per frame");

    // Stop is unconditional and immediate; repeated stop is a no-op.
    deck.stop_visualization();
    deck.stop_visualization();
    for _ in 0..3 {
        deck.advance(0.016, Some(&block));
    }
    assert_eq!(deck.canvas().get(0, 0).map(|c| c.r), Some(5));
}

#[test]
fn frames_are_skipped_without_samples() {
    let mut registry = Registry::new();
    registry.register(VisualizerInfo::new("count", "Counter", "frame counter", || {
        Box::new(CountViz { starts: 0.0 })
    }));
    let mut deck = seeded_deck(registry);
    deck.resize(8, 8);
    deck.set_playing(true);

    deck.advance(0.016, None);
    deck.advance(0.016, None);
    assert_eq!(deck.canvas().get(0, 0).map(|c| c.r), Some(0));

    let block = SampleBlock::default();
    deck.advance(0.016, Some(&block));
    assert_eq!(deck.canvas().get(0, 0).map(|c| c.r), Some(1));
}

#[test]
fn random_mode_forces_mutate_on_cached_instances_and_snapshots() {
    let mut registry = Registry::new();
    registry.register(VisualizerInfo::new("m1", "Mutable One", "mutable", || {
        Box::new(MutableViz { speed: 50.0, mutate_mode: false, changes: 0.0 })
    }));
    registry.register(VisualizerInfo::new("m2", "Mutable Two", "mutable", || {
        Box::new(MutableViz { speed: 50.0, mutate_mode: false, changes: 0.0 })
    }));
    let mut deck = seeded_deck(registry);

    // Instantiate both, leave mutate off, and park on m2.
    deck.switch_to("m2");
    assert_eq!(
        deck.current_setting(MUTATE_MODE),
        Some(SettingValue::Flag(false))
    );

    deck.set_random_mode(true);
    assert_eq!(
        deck.current_setting(MUTATE_MODE),
        Some(SettingValue::Flag(true))
    );

    // The cached m1 instance and its saved snapshot were force-enabled too,
    // so switching back cannot restore "off".
    deck.switch_to("m1");
    assert_eq!(
        deck.current_setting(MUTATE_MODE),
        Some(SettingValue::Flag(true))
    );
}

#[test]
fn deck_ticks_mutations_from_instance_or_global_flag() {
    let mut registry = Registry::new();
    registry.register(VisualizerInfo::new("m", "Mutable", "mutable", || {
        Box::new(MutableViz { speed: 50.0, mutate_mode: false, changes: 0.0 })
    }));
    let mut deck = seeded_deck(registry);
    deck.resize(8, 8);
    deck.set_playing(true);

    // Both flags off: the clock never fires.
    deck.advance(2.0, None);
    assert_eq!(deck.current_setting("speed"), Some(SettingValue::Number(50.0)));
    assert_eq!(deck.current_setting("changes"), Some(SettingValue::Number(0.0)));
    assert!(deck.recent_mutations().is_empty());

    // Global flag alone is enough (the OR is decided by the deck).
    deck.registry_mut().global_mutation = true;
    deck.advance(2.0, None);
    assert_eq!(deck.current_setting("changes"), Some(SettingValue::Number(1.0)));
    let after_global = deck.current_setting("speed").and_then(SettingValue::as_number);
    assert!((60.0..=100.0).contains(&after_global.unwrap()));
    assert!(deck
        .recent_mutations()
        .iter()
        .any(|m| m.key == "speed"));

    // Instance flag alone works the same way.
    deck.registry_mut().global_mutation = false;
    deck.set_setting(MUTATE_MODE, SettingValue::Flag(true));
    deck.advance(2.0, None);
    assert_eq!(deck.current_setting("changes"), Some(SettingValue::Number(2.0)));
}

#[test]
fn clear_session_drops_saved_settings() {
    let mut deck = seeded_deck(ab_registry());
    deck.set_setting("size", SettingValue::Number(9.0));
    deck.switch_to("b");

    deck.clear_session();

    deck.switch_to("a");
    assert_eq!(deck.current_setting("size"), Some(SettingValue::Number(5.0)));
}
