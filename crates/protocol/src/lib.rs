//! Wire protocol for the Meccanoid's BLE smart module.
//!
//! The robot takes commands on a single writable control characteristic.
//! Every command is a fixed 18-byte payload starting with a command tag,
//! followed by a 16-bit additive checksum (big endian), for a 20-byte frame
//! on the air. The firmware silently drops frames whose checksum doesn't
//! match, so the encoding here has to be bit-exact.
//!
//! Servo positions and light states are stateful on the wire: there is no
//! "set one servo" command, only "here are all eight". [`DeviceState`] keeps
//! the last-commanded value for every slot so that changing one field
//! re-sends the rest unchanged.

use std::str::FromStr;

use thiserror::Error;

pub mod state;

pub use state::DeviceState;

/// Payload length of every command, tag included, checksum excluded.
pub const PAYLOAD_LEN: usize = 18;
/// On-air frame length: payload plus two checksum bytes.
pub const FRAME_LEN: usize = PAYLOAD_LEN + 2;

pub type Payload = [u8; PAYLOAD_LEN];

// Servo ids. Four are wired up on the stock robot; the others are
// addressable but unassigned.
pub const RIGHT_ELBOW: i32 = 1;
pub const RIGHT_SHOULDER: i32 = 2;
pub const LEFT_SHOULDER: i32 = 3;
pub const LEFT_ELBOW: i32 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("bad servo index: {0}")]
    BadServoIndex(i32),
    #[error("bad chest light index: {0}")]
    BadLightIndex(i32),
    #[error("unknown colour: {0:?}")]
    UnknownColor(String),
}

/// Colours supported by the servo ring lights: one bit per channel,
/// blue-green-red from high to low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Off = 0x00,
    Red = 0x01,
    Green = 0x02,
    Yellow = 0x03,
    Blue = 0x04,
    Magenta = 0x05,
    Cyan = 0x06,
    White = 0x07,
}

impl Color {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Color, Error> {
        match s {
            "black" | "off" => Ok(Color::Off),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" | "on" => Ok(Color::White),
            _ => Err(Error::UnknownColor(s.to_owned())),
        }
    }
}

/// Saturating clamp to a byte.
pub(crate) fn cap(value: i32) -> u8 {
    value.clamp(0x00, 0xff) as u8
}

/// Sum of all payload bytes, truncated to 16 bits.
///
/// The sum must be accumulated wider than a byte and only truncated at the
/// end; the firmware computes it the same way.
pub fn checksum(payload: &[u8]) -> u16 {
    payload.iter().map(|&b| u32::from(b)).sum::<u32>() as u16
}

/// Appends the big-endian checksum, producing the frame that goes on the air.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum(payload).to_be_bytes());
    frame
}

fn wheel(speed: i16) -> (u8, u8) {
    let speed = i32::from(speed);
    if speed > 0 {
        (0x01, cap(speed))
    } else {
        // Zero lands here too: reverse direction with zero magnitude. That's
        // what the firmware has always been sent for "stop", so keep it.
        (0x02, cap(-speed))
    }
}

/// Wheel command, one-shot: nothing about it is remembered between calls.
/// Speeds are in [-255, 255]; negative means backwards, out-of-range
/// magnitudes are clamped.
pub fn drive(right_speed: i16, left_speed: i16) -> Payload {
    let (left_dir, left_mag) = wheel(left_speed);
    let (right_dir, right_mag) = wheel(right_speed);
    let mut payload: Payload = [0x00; PAYLOAD_LEN];
    payload[0] = 0x0d;
    payload[1] = left_dir;
    payload[2] = right_dir;
    payload[3] = left_mag;
    payload[4] = right_mag;
    payload[5] = 0xff;
    payload[6] = 0xff;
    payload
}

/// Eye colour command, one-shot. Channels are 3 bits each and clamp to 7;
/// red and green share a byte, blue gets its own.
pub fn eye_lights(r: u8, g: u8, b: u8) -> Payload {
    let (r, g, b) = (r.min(0x07), g.min(0x07), b.min(0x07));
    let mut payload: Payload = [0x00; PAYLOAD_LEN];
    payload[0] = 0x11;
    payload[3] = g << 3 | r;
    payload[4] = b;
    payload
}
