use vizdeck::audio::{SampleBlock, SPECTRUM_BINS};
use vizdeck::canvas::Canvas;
use vizdeck::viz::{
    clean_value, register_builtins, FrameCtx, MutationDraw, Registry, SettingKind,
    SettingValue,
};

/// Busy synthetic spectrum: a bass hump, a wobbling midrange and a live
/// waveform, so every plugin has something to react to.
fn synth_block(step: usize) -> SampleBlock {
    let mut block = SampleBlock::default();
    for i in 0..SPECTRUM_BINS {
        let f = i as f32 / SPECTRUM_BINS as f32;
        let bass = (1.0 - f).powf(2.0) * 215.0;
        let wobble = ((step as f32 * 0.31 + f * 12.0).sin() * 0.5 + 0.5) * 90.0;
        block.freq[i] = (bass * 0.7 + wobble).min(255.0) as u8;
        block.wave[i] =
            (128.0 + (i as f32 * 0.12 + step as f32 * 0.5).sin() * 90.0).clamp(0.0, 255.0) as u8;
    }
    block
}

fn has_non_black(canvas: &Canvas) -> bool {
    canvas
        .pixels()
        .chunks_exact(4)
        .any(|px| px[0] != 0 || px[1] != 0 || px[2] != 0)
}

fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    register_builtins(&mut registry);
    registry
}

#[test]
fn every_builtin_renders_non_black_frames() {
    let registry = builtin_registry();
    let (w, h) = (96usize, 64usize);

    for info in registry.all() {
        let mut viz = info.instantiate();
        viz.init();
        viz.on_start();
        viz.on_resize(w, h);

        let mut canvas = Canvas::with_size(w, h);
        let mut saw_pixels = false;

        for f in 0..10 {
            let ctx = FrameCtx {
                t: f as f32 / 60.0,
                dt: 1.0 / 60.0,
                w,
                h,
            };
            let block = synth_block(f);
            viz.render(&ctx, &block, &mut canvas);
            saw_pixels |= has_non_black(&canvas);
        }

        assert!(saw_pixels, "visualizer '{}' stayed fully black", info.id);
    }
}

#[test]
fn render_before_resize_does_not_panic() {
    let registry = builtin_registry();
    for info in registry.all() {
        let mut viz = info.instantiate();
        viz.init();
        // No on_resize at all; a small odd-sized canvas straight away.
        let mut canvas = Canvas::with_size(17, 9);
        let ctx = FrameCtx { t: 0.0, dt: 1.0 / 60.0, w: 17, h: 9 };
        let block = synth_block(0);
        viz.render(&ctx, &block, &mut canvas);
    }
}

#[test]
fn settings_round_trip_clamps_and_cleans() {
    let registry = builtin_registry();

    for info in registry.all() {
        let mut viz = info.instantiate();
        let schema = viz.schema();
        assert!(!schema.name.trim().is_empty());

        for spec in schema.settings {
            match spec.kind {
                SettingKind::Range { min, max, step, .. } => {
                    // A mid value lands back exactly as its cleaned form.
                    let mid = min + ((max - min) / (2.0 * step)).floor() * step;
                    viz.set_setting(spec.key, SettingValue::Number(mid));
                    let got = viz
                        .setting(spec.key)
                        .and_then(SettingValue::as_number)
                        .unwrap_or(f32::NAN);
                    assert!(
                        (got - clean_value(mid, step)).abs() < 1e-3,
                        "{}::{} round trip: set {mid}, got {got}",
                        info.id,
                        spec.key
                    );

                    // Out-of-range values clamp, never error.
                    viz.set_setting(spec.key, SettingValue::Number(max + 1000.0));
                    let got = viz.setting(spec.key).and_then(SettingValue::as_number);
                    assert_eq!(got, Some(max), "{}::{} high clamp", info.id, spec.key);

                    viz.set_setting(spec.key, SettingValue::Number(min - 1000.0));
                    let got = viz.setting(spec.key).and_then(SettingValue::as_number);
                    assert_eq!(got, Some(min), "{}::{} low clamp", info.id, spec.key);
                }
                SettingKind::Select { options } => {
                    for opt in options {
                        viz.set_setting(spec.key, SettingValue::Choice(opt.value));
                        assert_eq!(
                            viz.setting(spec.key),
                            Some(SettingValue::Choice(opt.value)),
                            "{}::{} select round trip",
                            info.id,
                            spec.key
                        );
                    }
                    // An undeclared choice is ignored.
                    let before = viz.setting(spec.key);
                    viz.set_setting(spec.key, SettingValue::Choice("definitely-not-an-option"));
                    assert_eq!(viz.setting(spec.key), before);
                }
                SettingKind::Toggle => {
                    let before = viz
                        .setting(spec.key)
                        .and_then(SettingValue::as_flag)
                        .unwrap_or(false);
                    viz.set_setting(spec.key, SettingValue::Flag(!before));
                    assert_eq!(
                        viz.setting(spec.key),
                        Some(SettingValue::Flag(!before)),
                        "{}::{} toggle round trip",
                        info.id,
                        spec.key
                    );
                }
            }
        }

        // Unknown keys are ignored without disturbing anything else.
        let snapshot: Vec<_> = schema
            .settings
            .iter()
            .map(|s| viz.setting(s.key))
            .collect();
        viz.set_setting("no_such_key", SettingValue::Number(123.0));
        let after: Vec<_> = schema
            .settings
            .iter()
            .map(|s| viz.setting(s.key))
            .collect();
        assert_eq!(snapshot, after, "{}: unknown key disturbed state", info.id);
    }
}

#[test]
fn every_schema_key_reads_back() {
    let registry = builtin_registry();
    for info in registry.all() {
        let viz = info.instantiate();
        for spec in viz.schema().settings {
            assert!(
                viz.setting(spec.key).is_some(),
                "{}::{} is declared but not readable",
                info.id,
                spec.key
            );
        }
    }
}

#[test]
fn mutation_tables_are_coherent_with_schemas() {
    let registry = builtin_registry();
    for info in registry.all() {
        let viz = info.instantiate();
        let schema = viz.schema();

        assert!(viz.mutation_period().as_secs_f32() > 0.0);

        for entry in viz.mutation_table() {
            assert!(
                (0.0..=1.0).contains(&entry.probability),
                "{}::{} probability out of range",
                info.id,
                entry.key
            );
            let spec = schema.spec(entry.key);
            assert!(
                spec.is_some(),
                "{}::{} mutates a key missing from its schema",
                info.id,
                entry.key
            );

            match entry.draw {
                MutationDraw::Values(options) => {
                    assert!(!options.is_empty());
                    for &value in options {
                        assert!(
                            schema.sanitize(entry.key, value).is_some(),
                            "{}::{} mutation value {:?} rejected by schema",
                            info.id,
                            entry.key,
                            value
                        );
                    }
                }
                MutationDraw::Range { min, max, step } => {
                    assert!(min < max && step > 0.0);
                    if let Some(SettingKind::Range { min: smin, max: smax, .. }) =
                        spec.map(|s| s.kind)
                    {
                        assert!(
                            min >= smin && max <= smax,
                            "{}::{} mutation range escapes schema bounds",
                            info.id,
                            entry.key
                        );
                    }
                }
            }
        }
    }
}
