//! Declarative description of the editable settings.
//!
//! Each editable field is listed once with its kind, bounds and step. A
//! settings UI walks these tables and edits through [`Editable`] without
//! knowing the fields; how values are formatted stays with the UI.

use super::{ChannelSettings, GeneralSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelField {
    Enabled,
    WarnLevel,
    WaterLevel,
    AutoWater,
    WetPoint,
    DryPoint,
    PumpTime,
    PumpSpeed,
    WateringDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralField {
    AlarmEnable,
    AlarmInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl FieldValue {
    pub fn as_f32(self) -> f32 {
        match self {
            FieldValue::Float(v) => v,
            FieldValue::Int(v) => v as f32,
            FieldValue::Bool(v) => u8::from(v) as f32,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            FieldValue::Bool(v) => v,
            FieldValue::Int(v) => v != 0,
            FieldValue::Float(v) => v != 0.0,
        }
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// One editable field. `min`, `max` and `step` are unused for bools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec<F> {
    pub field: F,
    pub title: &'static str,
    pub help: &'static str,
    pub kind: FieldKind,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl<F> FieldSpec<F> {
    const fn float(field: F, title: &'static str, help: &'static str, min: f32, max: f32, step: f32) -> Self {
        Self {
            field,
            title,
            help,
            kind: FieldKind::Float,
            min,
            max,
            step,
        }
    }

    const fn int(field: F, title: &'static str, help: &'static str, min: f32, max: f32, step: f32) -> Self {
        Self {
            field,
            title,
            help,
            kind: FieldKind::Int,
            min,
            max,
            step,
        }
    }

    const fn bool(field: F, title: &'static str, help: &'static str) -> Self {
        Self {
            field,
            title,
            help,
            kind: FieldKind::Bool,
            min: 0.0,
            max: 1.0,
            step: 1.0,
        }
    }

    /// Clamp `value` to this field's bounds and kind.
    pub fn clamp(&self, value: FieldValue) -> FieldValue {
        match self.kind {
            FieldKind::Bool => FieldValue::Bool(value.as_bool()),
            FieldKind::Float => FieldValue::Float(value.as_f32().clamp(self.min, self.max)),
            FieldKind::Int => FieldValue::Int(round(value.as_f32(), 0).clamp(self.min, self.max) as i32),
        }
    }
}

pub static CHANNEL_FIELDS: [FieldSpec<ChannelField>; 9] = [
    FieldSpec::float(
        ChannelField::WarnLevel,
        "Alarm Level",
        "Saturation at which alarm is triggered",
        0.0,
        1.0,
        0.05,
    ),
    FieldSpec::bool(ChannelField::Enabled, "Enabled", "Enable/disable this channel"),
    FieldSpec::float(
        ChannelField::WaterLevel,
        "Water Level",
        "Saturation at which watering occurs",
        0.0,
        1.0,
        0.05,
    ),
    FieldSpec::bool(ChannelField::AutoWater, "Auto Water", "Enable/disable watering"),
    FieldSpec::float(
        ChannelField::WetPoint,
        "Wet Point",
        "Value for 100% saturation",
        1.0,
        27.0,
        0.5,
    ),
    FieldSpec::float(
        ChannelField::DryPoint,
        "Dry Point",
        "Value for 0% saturation",
        1.0,
        27.0,
        0.5,
    ),
    FieldSpec::float(
        ChannelField::PumpTime,
        "Pump Time",
        "Time to run pump",
        0.05,
        2.0,
        0.05,
    ),
    FieldSpec::float(
        ChannelField::PumpSpeed,
        "Pump Speed",
        "Speed of pump",
        0.05,
        1.0,
        0.05,
    ),
    FieldSpec::int(
        ChannelField::WateringDelay,
        "Watering Delay",
        "Delay between waterings",
        30.0,
        500.0,
        10.0,
    ),
];

pub static GENERAL_FIELDS: [FieldSpec<GeneralField>; 2] = [
    FieldSpec::int(
        GeneralField::AlarmInterval,
        "Alarm Interval",
        "Time between alarm beeps.",
        1.0,
        60.0,
        1.0,
    ),
    FieldSpec::bool(GeneralField::AlarmEnable, "Alarm Enable", "Enable the piezo alarm"),
];

/// Round to `places` decimals (0..=2 is all the schema needs).
fn round(value: f32, places: u32) -> f32 {
    let scale = 10u32.pow(places) as f32;
    let scaled = value * scale;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5) as i64
    } else {
        (scaled - 0.5) as i64
    };
    rounded as f32 / scale
}

/// Settings that can be edited field by field through a schema table
pub trait Editable {
    type Field: Copy + PartialEq + 'static;

    fn fields() -> &'static [FieldSpec<Self::Field>];

    fn get(&self, field: Self::Field) -> FieldValue;

    /// Store an already clamped value.
    fn store(&mut self, field: Self::Field, value: FieldValue);

    fn spec(field: Self::Field) -> Option<&'static FieldSpec<Self::Field>> {
        Self::fields().iter().find(|spec| spec.field == field)
    }

    /// Set `field`, clamped to its bounds. Returns the stored value.
    fn set(&mut self, field: Self::Field, value: FieldValue) -> FieldValue {
        let value = match Self::spec(field) {
            Some(spec) => spec.clamp(value),
            None => value,
        };
        self.store(field, value);
        value
    }

    /// Move `field` one step up or down, clamped to its bounds. Bools become
    /// `up`. Float values are rounded to two decimals so repeated steps do
    /// not drift.
    fn step(&mut self, field: Self::Field, up: bool) -> FieldValue {
        let Some(spec) = Self::spec(field) else {
            return self.get(field);
        };

        let next = match spec.kind {
            FieldKind::Bool => FieldValue::Bool(up),
            FieldKind::Float | FieldKind::Int => {
                let current = self.get(field).as_f32();
                let delta = if up { spec.step } else { -spec.step };
                FieldValue::Float(round(current + delta, 2))
            }
        };
        self.set(field, next)
    }
}

impl Editable for ChannelSettings {
    type Field = ChannelField;

    fn fields() -> &'static [FieldSpec<ChannelField>] {
        &CHANNEL_FIELDS
    }

    fn get(&self, field: ChannelField) -> FieldValue {
        match field {
            ChannelField::Enabled => self.enabled.into(),
            ChannelField::WarnLevel => self.warn_level.into(),
            ChannelField::WaterLevel => self.water_level.into(),
            ChannelField::AutoWater => self.auto_water.into(),
            ChannelField::WetPoint => self.wet_point.into(),
            ChannelField::DryPoint => self.dry_point.into(),
            ChannelField::PumpTime => self.pump_time.into(),
            ChannelField::PumpSpeed => self.pump_speed.into(),
            ChannelField::WateringDelay => FieldValue::Int(self.watering_delay as i32),
        }
    }

    fn store(&mut self, field: ChannelField, value: FieldValue) {
        match field {
            ChannelField::Enabled => self.enabled = value.as_bool(),
            ChannelField::WarnLevel => self.warn_level = value.as_f32(),
            ChannelField::WaterLevel => self.water_level = value.as_f32(),
            ChannelField::AutoWater => self.auto_water = value.as_bool(),
            ChannelField::WetPoint => self.wet_point = value.as_f32(),
            ChannelField::DryPoint => self.dry_point = value.as_f32(),
            ChannelField::PumpTime => self.pump_time = value.as_f32(),
            ChannelField::PumpSpeed => self.pump_speed = value.as_f32(),
            ChannelField::WateringDelay => self.watering_delay = value.as_f32().max(0.0) as u32,
        }
    }
}

impl Editable for GeneralSettings {
    type Field = GeneralField;

    fn fields() -> &'static [FieldSpec<GeneralField>] {
        &GENERAL_FIELDS
    }

    fn get(&self, field: GeneralField) -> FieldValue {
        match field {
            GeneralField::AlarmEnable => self.alarm_enable.into(),
            GeneralField::AlarmInterval => FieldValue::Int(self.alarm_interval as i32),
        }
    }

    fn store(&mut self, field: GeneralField, value: FieldValue) {
        match field {
            GeneralField::AlarmEnable => self.alarm_enable = value.as_bool(),
            GeneralField::AlarmInterval => self.alarm_interval = value.as_f32().max(0.0) as u32,
        }
    }
}
