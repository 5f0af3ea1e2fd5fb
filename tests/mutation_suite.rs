use std::time::Duration;

use vizdeck::audio::SampleBlock;
use vizdeck::canvas::Canvas;
use vizdeck::viz::{
    FrameCtx, MutationDraw, MutationEntry, Registry, SettingKind, SettingSpec, SettingValue,
    SettingsSchema, Visualizer,
};

static SCHEMA: SettingsSchema = SettingsSchema {
    name: "Probe",
    settings: &[
        SettingSpec {
            key: "never",
            label: "Never",
            kind: SettingKind::Range { min: 0.0, max: 100.0, step: 1.0, unit: "" },
            default: SettingValue::Number(50.0),
        },
        SettingSpec {
            key: "always",
            label: "Always",
            kind: SettingKind::Range { min: 0.0, max: 100.0, step: 1.0, unit: "" },
            default: SettingValue::Number(50.0),
        },
        SettingSpec {
            key: "stepped",
            label: "Stepped",
            kind: SettingKind::Range { min: 0.2, max: 3.0, step: 0.2, unit: "" },
            default: SettingValue::Number(1.0),
        },
        SettingSpec {
            key: "pick",
            label: "Pick",
            kind: SettingKind::Select {
                options: &[
                    vizdeck::viz::SelectOption { value: "a", label: "A" },
                    vizdeck::viz::SelectOption { value: "b", label: "B" },
                    vizdeck::viz::SelectOption { value: "c", label: "C" },
                ],
            },
            default: SettingValue::Choice("a"),
        },
    ],
};

static MUTATIONS: &[MutationEntry] = &[
    MutationEntry {
        key: "never",
        probability: 0.0,
        draw: MutationDraw::Range { min: 0.0, max: 100.0, step: 1.0 },
    },
    MutationEntry {
        key: "always",
        probability: 1.0,
        draw: MutationDraw::Range { min: 0.0, max: 100.0, step: 1.0 },
    },
    MutationEntry {
        key: "stepped",
        probability: 1.0,
        draw: MutationDraw::Range { min: 0.2, max: 3.0, step: 0.2 },
    },
    MutationEntry {
        key: "pick",
        probability: 1.0,
        draw: MutationDraw::Values(&[
            SettingValue::Choice("a"),
            SettingValue::Choice("b"),
            SettingValue::Choice("c"),
        ]),
    },
];

struct ProbeViz {
    never: f32,
    always: f32,
    stepped: f32,
    pick: &'static str,
    always_changes: usize,
}

impl ProbeViz {
    fn new() -> Self {
        Self {
            never: 50.0,
            always: 50.0,
            stepped: 1.0,
            pick: "a",
            always_changes: 0,
        }
    }
}

impl Visualizer for ProbeViz {
    fn schema(&self) -> &'static SettingsSchema {
        &SCHEMA
    }

    fn mutation_table(&self) -> &'static [MutationEntry] {
        MUTATIONS
    }

    fn mutation_period(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn set_setting(&mut self, key: &str, value: SettingValue) {
        let Some(value) = SCHEMA.sanitize(key, value) else {
            return;
        };
        match (key, value) {
            ("never", SettingValue::Number(v)) => self.never = v,
            ("always", SettingValue::Number(v)) => {
                self.always = v;
                self.always_changes += 1;
            }
            ("stepped", SettingValue::Number(v)) => self.stepped = v,
            ("pick", SettingValue::Choice(v)) => self.pick = v,
            _ => {}
        }
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        match key {
            "never" => Some(SettingValue::Number(self.never)),
            "always" => Some(SettingValue::Number(self.always)),
            "stepped" => Some(SettingValue::Number(self.stepped)),
            "pick" => Some(SettingValue::Choice(self.pick)),
            _ => None,
        }
    }

    fn render(&mut self, _ctx: &FrameCtx, _samples: &SampleBlock, _canvas: &mut Canvas) {}
}

#[test]
fn probability_zero_never_mutates_probability_one_always_does() {
    let registry = Registry::new();
    let mut viz = ProbeViz::new();
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for tick in 0..1000 {
        let applied = registry.apply_mutations(&mut viz, &mut rng);
        assert!(
            !applied.iter().any(|m| m.key == "never"),
            "probability 0.0 key mutated on tick {tick}"
        );
        assert!(
            applied.iter().any(|m| m.key == "always"),
            "probability 1.0 key skipped on tick {tick}"
        );
    }

    assert_eq!(viz.never, 50.0);
    assert_eq!(viz.always_changes, 1000);
}

#[test]
fn range_draws_stay_in_bounds_and_on_step() {
    let registry = Registry::new();
    let mut viz = ProbeViz::new();
    let mut rng = fastrand::Rng::with_seed(42);

    for _ in 0..1000 {
        registry.apply_mutations(&mut viz, &mut rng);

        assert!((0.0..=100.0).contains(&viz.always));
        assert!((0.2..=3.0).contains(&viz.stepped));

        // Snapped to a multiple of 0.2 anchored at the range minimum.
        let steps = (viz.stepped - 0.2) / 0.2;
        assert!(
            (steps - steps.round()).abs() < 1e-3,
            "{} is off the 0.2 grid",
            viz.stepped
        );
    }
}

#[test]
fn value_draws_come_from_the_declared_set() {
    let registry = Registry::new();
    let mut viz = ProbeViz::new();
    let mut rng = fastrand::Rng::with_seed(7);

    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..300 {
        registry.apply_mutations(&mut viz, &mut rng);
        assert!(["a", "b", "c"].contains(&viz.pick));
        seen.insert(viz.pick);
    }
    // Uniform draw over three options should touch all of them.
    assert_eq!(seen.len(), 3);
}

#[test]
fn applied_list_reports_exactly_what_changed() {
    let registry = Registry::new();
    let mut viz = ProbeViz::new();
    let mut rng = fastrand::Rng::with_seed(99);

    let applied = registry.apply_mutations(&mut viz, &mut rng);
    // "never" is excluded; the three probability-1.0 keys all report.
    let keys: Vec<&str> = applied.iter().map(|m| m.key).collect();
    assert_eq!(keys, ["always", "stepped", "pick"]);

    for m in &applied {
        assert_eq!(viz.setting(m.key), Some(m.value));
    }
}

#[test]
fn empty_table_means_non_mutable() {
    struct Inert;
    impl Visualizer for Inert {
        fn schema(&self) -> &'static SettingsSchema {
            static EMPTY: SettingsSchema = SettingsSchema { name: "Inert", settings: &[] };
            &EMPTY
        }
        fn set_setting(&mut self, _key: &str, _value: SettingValue) {}
        fn setting(&self, _key: &str) -> Option<SettingValue> {
            None
        }
        fn render(&mut self, _ctx: &FrameCtx, _samples: &SampleBlock, _canvas: &mut Canvas) {}
    }

    let registry = Registry::new();
    let mut viz = Inert;
    let mut rng = fastrand::Rng::with_seed(1);
    assert!(registry.apply_mutations(&mut viz, &mut rng).is_empty());
}
