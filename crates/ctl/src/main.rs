#![allow(clippy::redundant_closure_call)]

use std::time::Duration;

use anyhow::anyhow;
use btleplug::{
    api::{Central as _, Manager as _, Peripheral as _, ScanFilter},
    platform::{Adapter, Manager, Peripheral},
};
use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar};
use reedline::{DefaultPrompt, Prompt, Reedline};

use crate::connection::{Meccanoid, Session};

mod connection;

const TICK: Duration = Duration::from_millis(50);

/// Wheel speed used by the interactive drive keys.
const DRIVE_SPEED: i16 = 120;

/// Interactive console for a Meccanoid robot over BLE.
#[derive(Parser)]
struct Args {
    /// Advertised-name prefix to scan for.
    #[arg(long, default_value = "MECCANOID")]
    name: String,
}

#[derive(Debug)]
enum Error {
    Exit,
    Err(anyhow::Error),
}

impl<E> From<E> for Error
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Error::Err(e.into())
    }
}

type Result<T> = std::result::Result<T, Error>;

async fn connect(adapter: &mut Adapter, name: &str) -> anyhow::Result<Peripheral> {
    let progress = MultiProgress::new();
    let mut bar = progress.add(ProgressBar::new_spinner().with_message("Searching..."));
    bar.enable_steady_tick(TICK);

    let peripheral = connection::find_meccanoid(adapter, name).await?;
    bar.finish_with_message("found!");
    bar = progress.add(ProgressBar::new_spinner().with_message("Connecting..."));
    bar.enable_steady_tick(TICK);

    peripheral.connect().await?;
    peripheral.discover_services().await?;
    bar.finish_with_message("connected!");

    Ok(peripheral)
}

/// Raw-mode wheel control, held until q or <enter>.
async fn drive_mode(session: &mut Session<Meccanoid>) -> Result<()> {
    eprintln!("Drive mode. Keys w/s to go, a/d to spin, <space> to stop, q or <enter> to leave.");
    enable_raw_mode()?;

    let res: Result<()> = (|| async move {
        let mut events = EventStream::new();
        while let Some(ev) = events.next().await.transpose()? {
            let Event::Key(ev) = ev else {
                continue;
            };
            if ev.kind != KeyEventKind::Press {
                continue;
            }
            let speeds = match ev.code {
                KeyCode::Char('q') | KeyCode::Enter => {
                    session.drive(0, 0).await?;
                    return Ok(());
                }
                KeyCode::Char('w') => Some((DRIVE_SPEED, DRIVE_SPEED)),
                KeyCode::Char('s') => Some((-DRIVE_SPEED, -DRIVE_SPEED)),
                KeyCode::Char('a') => Some((DRIVE_SPEED, -DRIVE_SPEED)),
                KeyCode::Char('d') => Some((-DRIVE_SPEED, DRIVE_SPEED)),
                KeyCode::Char(' ') => Some((0, 0)),
                _ => None,
            };
            if let Some((right, left)) = speeds {
                session.drive(right, left).await?;
            }
        }
        Err(anyhow!("event stream ended").into())
    })()
    .await;

    disable_raw_mode()?;

    res
}

async fn run_command(session: &mut Session<Meccanoid>, line: &str) -> anyhow::Result<()> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["servo", servo, pos] => session.set_servo(servo.parse()?, pos.parse()?).await,
        ["light", servo, color] => session.set_servo_light(servo.parse()?, color.parse()?).await,
        ["chest", light, state] => {
            let on = match *state {
                "on" => true,
                "off" => false,
                other => return Err(anyhow!("expected \"on\" or \"off\", got {other:?}")),
            };
            session.set_chest_light(light.parse()?, on).await
        }
        ["move", right, left] => session.drive(right.parse()?, left.parse()?).await,
        ["eyes", r, g, b] => session.eye_lights(r.parse()?, g.parse()?, b.parse()?).await,
        _ => Err(anyhow!(
            "commands: servo <id> <pos>, light <id> <colour>, chest <id> on|off, \
             move <right> <left>, eyes <r> <g> <b>, drive, quit"
        )),
    }
}

fn read_cmd(reed: &mut Reedline, prompt: &dyn Prompt) -> Result<String> {
    let s = reed.read_line(prompt)?;
    match s {
        reedline::Signal::Success(s) => Ok(s),
        reedline::Signal::CtrlC | reedline::Signal::CtrlD => Err(Error::Exit),
    }
}

async fn command_mode(session: &mut Session<Meccanoid>) -> Result<()> {
    let mut reed = Reedline::create();
    let prompt = DefaultPrompt::default();
    loop {
        let s = read_cmd(&mut reed, &prompt)?;
        let s = s.trim();

        if s.is_empty() {
            continue;
        } else if s == "quit" {
            break;
        } else if s == "drive" {
            drive_mode(session).await?;
        } else if let Err(e) = run_command(session, s).await {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

async fn handle_connection(adapter: &mut Adapter, args: &Args) -> Result<()> {
    let peripheral = connect(adapter, &args.name).await?;
    let robot = Meccanoid::new(peripheral)?;

    let mut session = Session::new(robot);
    command_mode(&mut session).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let manager = Manager::new().await?;
    let mut adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(anyhow!("no bluetooth adapter"))?;
    adapter.start_scan(ScanFilter::default()).await?;
    log::debug!("scan started, looking for {:?}", args.name);
    loop {
        if let Err(Error::Err(e)) = handle_connection(&mut adapter, &args).await {
            eprintln!("lost connection, restarting (cause: {e})");
        } else {
            eprintln!("exiting...");
            break;
        }
    }

    Ok(())
}
