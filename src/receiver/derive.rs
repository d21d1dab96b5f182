use super::packet::{is_sentinel, SensorReading};
use std::fmt;

pub const DEFAULT_SEA_LEVEL_HPA: f64 = 1013.25;
/// Full revolution of the AS5600 magnetic encoder.
const ENCODER_STEPS: f64 = 4096.0;

pub fn pressure_hpa(pressure_pa: f64) -> f64 {
    pressure_pa / 100.0
}

/// International barometric formula.
pub fn altitude(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(1.0 / 5.255))
}

pub fn wind_direction_deg(raw: u16) -> f64 {
    f64::from(raw) / ENCODER_STEPS * 360.0
}

/// One value as forwarded to openHAB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(u16),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v:.2}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

/// A reading plus the values derived from it. Lives for one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedReading {
    pub raw: SensorReading,
    /// `None` when the pressure sensor reported the sentinel.
    pub pressure_hpa: Option<f64>,
    pub altitude: Option<f64>,
    pub wind_direction_deg: f64,
}

impl ProcessedReading {
    pub fn new(raw: SensorReading, sea_level_hpa: f64) -> Self {
        let hpa = (!is_sentinel(raw.pressure_pa)).then(|| pressure_hpa(f64::from(raw.pressure_pa)));
        Self {
            raw,
            pressure_hpa: hpa,
            altitude: hpa.map(|p| altitude(p, sea_level_hpa)),
            wind_direction_deg: wind_direction_deg(raw.wind_direction_raw),
        }
    }

    /// Look a value up by sensor key. Sentinel fields yield `None`.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        let raw_float = |v: f32| (!is_sentinel(v)).then_some(FieldValue::Float(f64::from(v)));
        match key {
            "temp" => raw_float(self.raw.temperature),
            "pressure" => raw_float(self.raw.pressure_pa),
            "humidity" => raw_float(self.raw.humidity),
            "wind_speed" => raw_float(self.raw.wind_speed),
            "wind_direction" => Some(FieldValue::Integer(self.raw.wind_direction_raw)),
            "wind_direction_deg" => Some(FieldValue::Float(self.wind_direction_deg)),
            "pressure_hpa" => self.pressure_hpa.map(FieldValue::Float),
            "altitude" => self.altitude.map(FieldValue::Float),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<FieldValue>| v.map_or_else(|| "n/a".to_string(), |v| v.to_string());
        write!(
            f,
            "temp={} humidity={} pressure_hpa={} altitude={} wind_direction_deg={} wind_speed={}",
            show(self.field("temp")),
            show(self.field("humidity")),
            show(self.field("pressure_hpa")),
            show(self.field("altitude")),
            show(self.field("wind_direction_deg")),
            show(self.field("wind_speed")),
        )
    }
}

/// Every key [`ProcessedReading::field`] understands.
pub const SENSOR_KEYS: [&str; 8] = [
    "temp",
    "pressure",
    "pressure_hpa",
    "altitude",
    "humidity",
    "wind_direction",
    "wind_direction_deg",
    "wind_speed",
];
