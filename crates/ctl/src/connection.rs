use anyhow::anyhow;
use btleplug::{
    api::{Central, Characteristic, Peripheral as _, WriteType},
    platform::{Adapter, Peripheral},
};
use mecc_protocol::{encode, Color, DeviceState};
use uuid::{uuid, Uuid};

/// The smart module's single writable control characteristic. Every command
/// frame goes to it; nothing ever comes back.
pub const CONTROL_UUID: Uuid = uuid!("0000ffe9-0000-1000-8000-00805f9b34fb");

pub struct Meccanoid {
    pub peripheral: Peripheral,
    pub control: Characteristic,
}

/// The transport side of a robot: something that accepts finished frames.
pub trait MeccanoidLike {
    async fn send(&mut self, frame: &[u8]) -> anyhow::Result<()>;
}

impl Meccanoid {
    pub fn new(peripheral: Peripheral) -> anyhow::Result<Self> {
        let control = peripheral
            .characteristics()
            .into_iter()
            .find(|ch| ch.uuid == CONTROL_UUID)
            .ok_or_else(|| anyhow!("robot was missing the control characteristic"))?;

        Ok(Meccanoid {
            peripheral,
            control,
        })
    }
}

impl MeccanoidLike for Meccanoid {
    async fn send(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        // The firmware never acks a command frame, so write without response
        // and let the error (if any) come from the link layer.
        self.peripheral
            .write(&self.control, frame, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }
}

pub async fn find_meccanoid(adapter: &mut Adapter, name: &str) -> anyhow::Result<Peripheral> {
    loop {
        let peripherals = adapter.peripherals().await?;
        for p in peripherals {
            if let Some(props) = p.properties().await? {
                // The robot advertises its name plus part of its address,
                // e.g. "MECCANOID 34A025", so match on the prefix.
                if props
                    .local_name
                    .as_deref()
                    .is_some_and(|n| n.starts_with(name))
                {
                    log::info!("found {:?} at {}", props.local_name, p.address());
                    return Ok(p);
                }
            }
        }
    }
}

/// One connected robot: the persisted command banks plus the link they are
/// sent over.
///
/// Every command goes through `&mut self` and awaits the link write before
/// returning, so there is never more than one frame in flight per robot. A
/// failed send leaves the banks ahead of what the robot last heard; the fix
/// is to re-issue the command, not to roll back.
pub struct Session<L> {
    state: DeviceState,
    link: L,
}

impl<L: MeccanoidLike> Session<L> {
    pub fn new(link: L) -> Self {
        Session {
            state: DeviceState::new(),
            link,
        }
    }

    pub async fn set_servo(&mut self, servo: i32, value: i32) -> anyhow::Result<()> {
        let frame = encode(self.state.set_servo(servo, value)?);
        self.link.send(&frame).await
    }

    pub async fn set_servo_light(&mut self, servo: i32, color: Color) -> anyhow::Result<()> {
        let frame = encode(self.state.set_servo_light(servo, color)?);
        self.link.send(&frame).await
    }

    pub async fn set_chest_light(&mut self, light: i32, on: bool) -> anyhow::Result<()> {
        let frame = encode(self.state.set_chest_light(light, on)?);
        self.link.send(&frame).await
    }

    pub async fn drive(&mut self, right_speed: i16, left_speed: i16) -> anyhow::Result<()> {
        let frame = encode(&mecc_protocol::drive(right_speed, left_speed));
        self.link.send(&frame).await
    }

    pub async fn eye_lights(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
        let frame = encode(&mecc_protocol::eye_lights(r, g, b));
        self.link.send(&frame).await
    }
}
