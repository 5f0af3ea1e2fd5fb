//! Declarative settings schemas shared by every visualizer.
//!
//! A schema is a static table: one `SettingSpec` per user-adjustable
//! parameter, carrying its kind (range/select/toggle), bounds and default.
//! The same table drives the settings overlay, save/restore snapshots and
//! mutation-value validation, so plugins never hand-roll control plumbing.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SettingValue {
    Number(f32),
    Choice(&'static str),
    Flag(bool),
}

impl SettingValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_choice(self) -> Option<&'static str> {
        match self {
            Self::Choice(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => {
                if (v.fract()).abs() < 1e-6 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v:.2}")
                }
            }
            Self::Choice(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{}", if *v { "on" } else { "off" }),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub enum SettingKind {
    Range {
        min: f32,
        max: f32,
        step: f32,
        unit: &'static str,
    },
    Select {
        options: &'static [SelectOption],
    },
    Toggle,
}

#[derive(Clone, Copy, Debug)]
pub struct SettingSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: SettingKind,
    pub default: SettingValue,
}

#[derive(Clone, Copy, Debug)]
pub struct SettingsSchema {
    pub name: &'static str,
    pub settings: &'static [SettingSpec],
}

impl SettingsSchema {
    pub fn spec(&self, key: &str) -> Option<&'static SettingSpec> {
        self.settings.iter().find(|s| s.key == key)
    }

    /// Validate and normalize a value against this schema.
    ///
    /// Unknown keys and type mismatches yield `None` (the caller ignores
    /// them, per the permissive contract). Numbers are clamped to the
    /// declared bounds and cleaned to the step's precision; choices must be
    /// one of the declared options.
    pub fn sanitize(&self, key: &str, value: SettingValue) -> Option<SettingValue> {
        let spec = self.spec(key)?;
        match (spec.kind, value) {
            (SettingKind::Range { min, max, step, .. }, SettingValue::Number(v)) => {
                Some(SettingValue::Number(clean_value(v.clamp(min, max), step)))
            }
            (SettingKind::Select { options }, SettingValue::Choice(v)) => options
                .iter()
                .find(|o| o.value == v)
                .map(|o| SettingValue::Choice(o.value)),
            (SettingKind::Toggle, SettingValue::Flag(v)) => Some(SettingValue::Flag(v)),
            _ => None,
        }
    }
}

/// Round `value` to the decimal precision implied by `step`: a step of 0.05
/// keeps two decimals, any step >= 1 snaps to whole numbers. Applied to both
/// manual edits and mutation draws so stored values never carry float noise
/// beyond the declared granularity.
pub fn clean_value(value: f32, step: f32) -> f32 {
    if step <= 0.0 || step >= 1.0 {
        return value.round();
    }
    let decimals = -step.log10().floor();
    let scale = 10f32.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Snap `value` to the nearest multiple of `step` anchored at `min`, then
/// clamp into `[min, max]`. Used for range-based mutation draws.
pub fn snap_to_step(value: f32, min: f32, max: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return value.clamp(min, max);
    }
    let snapped = min + ((value - min) / step).round() * step;
    clean_value(snapped, step).clamp(min, max)
}
