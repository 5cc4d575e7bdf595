//! Last-commanded state for the stateful command families.
//!
//! Servo positions, servo ring lights and chest lights are each commanded as
//! a whole bank: the frame always carries all eight (or four) slots. To
//! change a single slot without disturbing the others, the encoder has to
//! remember what it last sent for every slot and re-send the bank with one
//! byte changed.

use crate::{cap, Color, Error, Payload, LEFT_SHOULDER, PAYLOAD_LEN, RIGHT_ELBOW};

const SERVO_TAG: u8 = 0x08;
const SERVO_LIGHT_TAG: u8 = 0x0c;
const CHEST_LIGHT_TAG: u8 = 0x1c;

/// The three persisted command buffers for one robot.
///
/// There is exactly one of these per connection; mutations go through it one
/// at a time. A failed validation returns before touching anything, so a
/// rejected call never leaves a half-applied bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    servos: Payload,
    servo_lights: Payload,
    chest_lights: Payload,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    /// Buffers start out matching the robot's power-on pose, so the first
    /// single-slot command doesn't yank every other actuator to zero.
    pub fn new() -> Self {
        let mut servos: Payload = [0x01; PAYLOAD_LEN];
        servos[..9].copy_from_slice(&[
            SERVO_TAG,
            0x7f, 0x80, 0x00, 0xff, 0x80, 0x7f, 0x7f, 0x7f,
        ]);

        let mut servo_lights: Payload = [0x04; PAYLOAD_LEN];
        servo_lights[0] = SERVO_LIGHT_TAG;
        servo_lights[1] = 0x00;
        servo_lights[PAYLOAD_LEN - 1] = 0x00;

        let mut chest_lights: Payload = [0x00; PAYLOAD_LEN];
        chest_lights[0] = CHEST_LIGHT_TAG;

        DeviceState {
            servos,
            servo_lights,
            chest_lights,
        }
    }

    /// Set one servo's position.
    ///
    /// Positions live in [0x00, 0xff] with 0x80 centered; out-of-range
    /// values clamp. The left shoulder and right elbow are mounted mirrored
    /// relative to the user-facing scale, so their values are flipped here
    /// before storage (except exact center, which the firmware treats the
    /// same either way).
    ///
    /// Returns the full updated bank, ready for [`crate::encode`].
    pub fn set_servo(&mut self, servo: i32, value: i32) -> Result<&Payload, Error> {
        if !(0..=7).contains(&servo) {
            return Err(Error::BadServoIndex(servo));
        }

        let mut value = cap(value);
        if (servo == LEFT_SHOULDER || servo == RIGHT_ELBOW) && value != 0x80 {
            value = 0xff - value;
        }

        self.servos[servo as usize + 1] = value;
        Ok(&self.servos)
    }

    /// Set one servo's ring light colour.
    pub fn set_servo_light(&mut self, servo: i32, color: Color) -> Result<&Payload, Error> {
        if !(0..=7).contains(&servo) {
            return Err(Error::BadServoIndex(servo));
        }

        self.servo_lights[servo as usize + 1] = color.code();
        Ok(&self.servo_lights)
    }

    /// Switch one of the four chest lights on or off.
    pub fn set_chest_light(&mut self, light: i32, on: bool) -> Result<&Payload, Error> {
        if !(0..=3).contains(&light) {
            return Err(Error::BadLightIndex(light));
        }

        self.chest_lights[light as usize + 1] = u8::from(on);
        Ok(&self.chest_lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RIGHT_SHOULDER;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn servo_values_always_store_a_byte(servo in 0i32..=7, value in any::<i32>()) {
            let mut state = DeviceState::new();
            let payload = state.set_servo(servo, value).unwrap();
            let stored = payload[servo as usize + 1];

            let expected = value.clamp(0x00, 0xff) as u8;
            if (servo == LEFT_SHOULDER || servo == RIGHT_ELBOW) && expected != 0x80 {
                assert_eq!(stored, 0xff - expected);
            } else {
                assert_eq!(stored, expected);
            }
        }

        #[test]
        fn bad_servo_index_changes_nothing(servo in any::<i32>(), value in any::<i32>()) {
            prop_assume!(!(0..=7).contains(&servo));
            let mut state = DeviceState::new();
            assert_eq!(
                state.set_servo(servo, value),
                Err(Error::BadServoIndex(servo))
            );
            assert_eq!(state, DeviceState::new());
        }
    }

    #[test]
    fn power_on_pose() {
        let mut state = DeviceState::new();
        let payload = state.set_servo(5, 0x7f).unwrap();
        assert_eq!(
            payload,
            &[
                0x08, 0x7f, 0x80, 0x00, 0xff, 0x80, 0x7f, 0x7f, 0x7f, 0x01, 0x01, 0x01, 0x01,
                0x01, 0x01, 0x01, 0x01, 0x01,
            ]
        );

        let payload = state.set_servo_light(0, Color::Off).unwrap();
        assert_eq!(
            payload,
            &[
                0x0c, 0x00, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04,
                0x04, 0x04, 0x04, 0x04, 0x00,
            ]
        );

        let payload = state.set_chest_light(0, false).unwrap();
        assert_eq!(payload[0], 0x1c);
        assert!(payload[1..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn reversed_servos() {
        let mut state = DeviceState::new();
        assert_eq!(state.set_servo(LEFT_SHOULDER, 0x30).unwrap()[4], 0xcf);
        assert_eq!(state.set_servo(LEFT_SHOULDER, 0x80).unwrap()[4], 0x80);
        assert_eq!(state.set_servo(RIGHT_ELBOW, 0x10).unwrap()[2], 0xef);
        // The right shoulder is not mirrored.
        assert_eq!(state.set_servo(RIGHT_SHOULDER, 0x10).unwrap()[3], 0x10);
    }

    #[test]
    fn servo_values_clamp_not_reject() {
        let mut state = DeviceState::new();
        assert_eq!(state.set_servo(0, -5).unwrap()[1], 0x00);
        assert_eq!(state.set_servo(0, 300).unwrap()[1], 0xff);
    }

    #[test]
    fn mutation_touches_exactly_one_byte() {
        let mut state = DeviceState::new();
        let before = *state.set_servo(5, 0x7f).unwrap();
        let after = *state.set_servo(2, 0x99).unwrap();
        for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
            if i == 3 {
                assert_eq!(*a, 0x99);
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn light_slots_are_independent() {
        let mut state = DeviceState::new();
        state.set_servo_light(2, Color::Red).unwrap();
        let payload = *state.set_servo_light(6, Color::Cyan).unwrap();
        assert_eq!(payload[3], 0x01);
        assert_eq!(payload[7], 0x06);

        state.set_chest_light(1, true).unwrap();
        let payload = *state.set_chest_light(3, true).unwrap();
        assert_eq!(payload[1..5], [0x00, 0x01, 0x00, 0x01]);
        let payload = *state.set_chest_light(1, false).unwrap();
        assert_eq!(payload[1..5], [0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn bad_light_index_changes_nothing() {
        let mut state = DeviceState::new();
        assert_eq!(state.set_chest_light(4, true), Err(Error::BadLightIndex(4)));
        assert_eq!(
            state.set_chest_light(-1, true),
            Err(Error::BadLightIndex(-1))
        );
        assert_eq!(
            state.set_servo_light(8, Color::Red),
            Err(Error::BadServoIndex(8))
        );
        assert_eq!(state, DeviceState::new());
    }
}
