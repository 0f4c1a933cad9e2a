//! Wire constants, data model and payload decoding for the D-LOGG protocol.
//!
//! A data frame for a single UVR1611 (mode `0xA8`) is laid out as follows:
//!
//! ```text
//! offset  size  content
//!      0     1  device identifier (0x80 = UVR1611)
//!      1    32  16 inputs, 2 bytes each (low, high)
//!     33     2  13 outputs, one bit per output
//!     35     4  pump speed stages (not decoded)
//!     39     1  heat register enable mask
//!     40    16  2 heat registers, 8 bytes each
//!     56     1  checksum (not verified)
//! ```
//!
//! Decoding is purely functional over the byte slice. A frame either decodes
//! completely into a [`SystemState`] or fails with a [`ParseError`].
use crate::error::ParseError;
use std::fmt;

/// Command byte that queries the device mode.
pub const GET_MODE: u8 = 0x81;
/// Command byte that queries the current data frame.
pub const GET_CURRENT_DATA: u8 = 0xAB;
/// Leading frame byte when the controller has no fresh sample. The device echoes the request.
pub const NO_NEW_DATA: u8 = GET_CURRENT_DATA;

/// Frame identifier of the UVR1611 controller family.
pub const UVR1611: u8 = 0x80;
/// Device mode with exactly one UVR1611 attached.
pub const MODE_SINGLE_UVR1611: u8 = 0xA8;

/// Largest frame the logger can send (two controllers attached).
pub const MAX_FRAME_SIZE: usize = 115;
/// Frame size in [`MODE_SINGLE_UVR1611`].
pub const SINGLE_FRAME_SIZE: usize = 57;

pub const NUMBER_OF_INPUTS: usize = 16;
pub const NUMBER_OF_OUTPUTS: usize = 13;
pub const NUMBER_OF_HEAT_REGISTERS: usize = 2;

const INPUT_SIZE: usize = 2;
const INPUTS_OFFSET: usize = 1;
const OUTPUTS_OFFSET: usize = 33;
const HEAT_MASK_OFFSET: usize = 39;
const HEAT_REGISTER_SIZE: usize = 8;
const UVR1611_LAYOUT_END: usize =
    HEAT_MASK_OFFSET + 1 + NUMBER_OF_HEAT_REGISTERS * HEAT_REGISTER_SIZE;

/// The kind of a decoded value.
///
/// The numeric values are the 3-bit sensor type codes used in the input
/// high byte. [`Kind::Heat`] has no code, it only appears in heat registers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Unused,
    Digital,
    Temperature,
    Flow,
    Radiation,
    RoomTemperature,
    Heat,
}

impl Kind {
    /// Maps a 3-bit sensor type code to its kind.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Kind::Unused),
            1 => Some(Kind::Digital),
            2 => Some(Kind::Temperature),
            3 => Some(Kind::Flow),
            6 => Some(Kind::Radiation),
            7 => Some(Kind::RoomTemperature),
            _ => None,
        }
    }

    /// Lower-case name of the kind, as used for exported variables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Unused => "unused",
            Kind::Digital => "digital",
            Kind::Temperature => "temperature",
            Kind::Flow => "flow",
            Kind::Radiation => "radiation",
            Kind::RoomTemperature => "room_temperature",
            Kind::Heat => "heat",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantaneous power and accumulated energy of one heat register.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heat {
    pub current_power_kw: f64,
    pub total_energy_kwh: f64,
}

/// The payload of a decoded value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Unused,
    /// On/off state.
    Digital(bool),
    /// Degree Celsius with one decimal place.
    Temperature(f32),
    /// Litres per hour.
    Flow(i32),
    Heat(Heat),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Unused => write!(f, "---"),
            Reading::Digital(true) => write!(f, "on"),
            Reading::Digital(false) => write!(f, "off"),
            Reading::Temperature(value) => write!(f, "{value:.1} °C"),
            Reading::Flow(value) => write!(f, "{value} l/h"),
            Reading::Heat(heat) => write!(
                f,
                "{:.2} kW, {:.1} kWh",
                heat.current_power_kw, heat.total_energy_kwh
            ),
        }
    }
}

/// One decoded measurement of a channel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    /// 1-based channel number within its group.
    pub id: u8,
    pub reading: Reading,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self.reading {
            Reading::Unused => Kind::Unused,
            Reading::Digital(_) => Kind::Digital,
            Reading::Temperature(_) => Kind::Temperature,
            Reading::Flow(_) => Kind::Flow,
            Reading::Heat(_) => Kind::Heat,
        }
    }
}

/// All values decoded from one frame.
///
/// Every sequence is ordered by ascending channel id.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    inputs: Vec<Value>,
    outputs: Vec<Value>,
    heat_registers: Vec<Value>,
}

impl SystemState {
    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }

    /// Only the heat registers enabled on the controller are present.
    pub fn heat_registers(&self) -> &[Value] {
        &self.heat_registers
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in &self.inputs {
            writeln!(f, "S{}: {}", value.id, value.reading)?;
        }
        for value in &self.outputs {
            writeln!(f, "A{}: {}", value.id, value.reading)?;
        }
        for value in &self.heat_registers {
            writeln!(f, "H{}: {}", value.id, value.reading)?;
        }
        Ok(())
    }
}

/// Interprets the lower `bits` bits of `raw` as a two's-complement number.
fn twos_complement(raw: u32, bits: u32) -> i32 {
    if raw & (1 << (bits - 1)) != 0 {
        raw as i32 - (1 << bits)
    } else {
        raw as i32
    }
}

/// Decodes one input channel from its `[low, high]` byte pair.
///
/// Bits 4-6 of the high byte select the sensor type, bits 0-3 together with
/// the low byte form a 12-bit two's-complement magnitude. Digital inputs
/// carry their state in bit 7 of the high byte.
pub fn decode_input(id: u8, bytes: [u8; 2]) -> Result<Value, ParseError> {
    let [low, high] = bytes;
    let code = (high & 0x70) >> 4;
    let raw = (((high & 0x0F) as u32) << 8) | low as u32;
    let signed = twos_complement(raw, 12);

    let reading = match Kind::from_code(code) {
        Some(Kind::Unused) => Reading::Unused,
        Some(Kind::Digital) => Reading::Digital(high & 0x80 != 0),
        Some(Kind::Temperature) => Reading::Temperature(signed as f32 / 10.0),
        Some(Kind::Flow) => Reading::Flow(signed * 4),
        _ => {
            return Err(ParseError::UnsupportedSensorType {
                channel: id,
                kind: code,
            })
        }
    };
    Ok(Value { id, reading })
}

/// Decodes `count` bit-packed outputs, eight per byte, least significant bit first.
///
/// At most 255 outputs fit the one-byte channel id.
pub fn decode_outputs(region: &[u8], count: usize) -> Result<Vec<Value>, ParseError> {
    if count > u8::MAX as usize {
        return Err(ParseError::Malformed {
            expected: u8::MAX as usize,
            actual: count,
        });
    }
    let needed = count.div_ceil(8);
    if region.len() < needed {
        return Err(ParseError::Malformed {
            expected: needed,
            actual: region.len(),
        });
    }
    Ok((0..count)
        .map(|i| Value {
            id: (i + 1) as u8,
            reading: Reading::Digital(region[i / 8] & (1 << (i % 8)) != 0),
        })
        .collect())
}

/// Decodes one 8-byte heat register.
///
/// Bytes 1-3 hold the power in 0.1 kW as a 24-bit two's-complement number,
/// byte 0 a binary fraction of that unit. Bytes 4-5 hold the energy in
/// 0.1 kWh and bytes 6-7 in MWh, both little-endian.
pub fn decode_heat_register(register: &[u8; HEAT_REGISTER_SIZE]) -> Heat {
    let raw = u32::from_le_bytes([register[1], register[2], register[3], 0]);
    let negative = register[3] > 127;
    let whole = twos_complement(raw, 24);
    let fraction = register[0] as i32 * 10 / 256;
    let hundredths = if negative {
        whole * 10 - fraction
    } else {
        whole * 10 + fraction
    };

    let tenth_kwh = u16::from_le_bytes([register[4], register[5]]);
    let mwh = u16::from_le_bytes([register[6], register[7]]);

    Heat {
        current_power_kw: hundredths as f64 / 100.0,
        total_energy_kwh: mwh as f64 * 1000.0 + tenth_kwh as f64 / 10.0,
    }
}

/// Decodes the heat registers enabled in the mask byte at the start of `region`.
///
/// Disabled registers are skipped, the remaining values keep their channel id.
/// The mask byte covers at most eight registers.
pub fn decode_heat_registers(region: &[u8], count: usize) -> Result<Vec<Value>, ParseError> {
    if count > u8::BITS as usize {
        return Err(ParseError::Malformed {
            expected: u8::BITS as usize,
            actual: count,
        });
    }
    let needed = 1 + count * HEAT_REGISTER_SIZE;
    if region.len() < needed {
        return Err(ParseError::Malformed {
            expected: needed,
            actual: region.len(),
        });
    }
    let mask = region[0];
    Ok(region[1..needed]
        .chunks_exact(HEAT_REGISTER_SIZE)
        .enumerate()
        .filter(|(i, _)| mask & (1 << *i) != 0)
        .filter_map(|(i, chunk)| {
            let register: &[u8; HEAT_REGISTER_SIZE] = chunk.try_into().ok()?;
            Some(Value {
                id: (i + 1) as u8,
                reading: Reading::Heat(decode_heat_register(register)),
            })
        })
        .collect())
}

fn parse_uvr1611(frame: &[u8]) -> Result<SystemState, ParseError> {
    if frame.len() < UVR1611_LAYOUT_END {
        return Err(ParseError::Malformed {
            expected: UVR1611_LAYOUT_END,
            actual: frame.len(),
        });
    }

    let inputs = frame[INPUTS_OFFSET..INPUTS_OFFSET + NUMBER_OF_INPUTS * INPUT_SIZE]
        .chunks_exact(INPUT_SIZE)
        .enumerate()
        .map(|(i, pair)| decode_input((i + 1) as u8, [pair[0], pair[1]]))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = decode_outputs(&frame[OUTPUTS_OFFSET..HEAT_MASK_OFFSET], NUMBER_OF_OUTPUTS)?;
    let heat_registers = decode_heat_registers(
        &frame[HEAT_MASK_OFFSET..UVR1611_LAYOUT_END],
        NUMBER_OF_HEAT_REGISTERS,
    )?;

    Ok(SystemState {
        inputs,
        outputs,
        heat_registers,
    })
}

/// Decodes a complete frame sent by the controller identified by `device`.
pub fn parse(frame: &[u8], device: u8) -> Result<SystemState, ParseError> {
    match device {
        UVR1611 => parse_uvr1611(frame),
        other => Err(ParseError::UnsupportedDevice(other)),
    }
}
