use std::fmt;

/// `f32 temperature, f32 pressure, f32 humidity, u16 wind direction,
/// f32 wind speed`, packed, little-endian.
pub const SENSOR_PAYLOAD_LEN: usize = 18;

/// Marks a field the transmitter could not read.
pub const SENTINEL: f32 = -999.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f32,
    pub pressure_pa: f32,
    /// Relative humidity, percent.
    pub humidity: f32,
    /// AS5600 angle, 0..4096 per revolution.
    pub wind_direction_raw: u16,
    pub wind_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    TooShort { expected: usize, actual: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort { expected, actual } => write!(
                f,
                "payload too short: expected {expected} bytes, got {actual}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

impl SensorReading {
    /// Unpack a payload. Bytes past the struct are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < SENSOR_PAYLOAD_LEN {
            return Err(DecodeError::TooShort {
                expected: SENSOR_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let f32_at = |offset: usize| {
            f32::from_le_bytes([
                payload[offset],
                payload[offset + 1],
                payload[offset + 2],
                payload[offset + 3],
            ])
        };

        Ok(Self {
            temperature: f32_at(0),
            pressure_pa: f32_at(4),
            humidity: f32_at(8),
            wind_direction_raw: u16::from_le_bytes([payload[12], payload[13]]),
            wind_speed: f32_at(14),
        })
    }

    /// Inverse of [`SensorReading::decode`].
    pub fn encode(&self) -> [u8; SENSOR_PAYLOAD_LEN] {
        let mut out = [0u8; SENSOR_PAYLOAD_LEN];
        out[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        out[4..8].copy_from_slice(&self.pressure_pa.to_le_bytes());
        out[8..12].copy_from_slice(&self.humidity.to_le_bytes());
        out[12..14].copy_from_slice(&self.wind_direction_raw.to_le_bytes());
        out[14..18].copy_from_slice(&self.wind_speed.to_le_bytes());
        out
    }
}

pub fn is_sentinel(value: f32) -> bool {
    value == SENTINEL
}
