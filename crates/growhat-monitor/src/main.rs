//! Host monitor for the growhat-rs plant monitor.
//!
//! Runs the channel tick loop on an embassy std executor against simulated
//! Grow HAT hardware: three soil beds with moisture probes, three pumps, a
//! piezo and a light sensor. Settings are persisted to a flat file and the
//! latest sensor snapshot is written next to it as JSON for the HTTP server.
//! Ctrl-C or SIGTERM switches every output off before exiting.
//!
//! ```text
//! growhat-monitor [SETTINGS_PATH]
//! ```
//!
//! | Variable                 | Effect                                       |
//! |--------------------------|----------------------------------------------|
//! | `RUST_LOG`               | Log filter, `info` by default                |
//! | `GROWHAT_ENABLE`         | Channels to enable with auto watering, `1,3`; not saved |
//! | `GROWHAT_FAULTY_CHANNEL` | Channel whose probe is missing               |
//!
//! Press Enter to toggle the alarm snooze.

mod settings_file;
mod sim;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embedded_hal::digital::PinState;
use log::{error, info, warn};

use growhat_core::actuators::{Piezo, PumpActuator, PumpLink, PumpSignal, run_pump};
use growhat_core::app_state::{AppState, SystemSnapshot};
use growhat_core::board::{CHANNEL_COUNT, ChannelPins, MOISTURE_PINS, PIEZO_PIN, PUMP_PINS};
use growhat_core::channel::Channel;
use growhat_core::config::Settings;
use growhat_core::gpio::{DigitalDrive, GpioChip};
use growhat_core::sensors::PolledMeter;
use growhat_core::storage::SettingsStore;

use settings_file::{DEFAULT_SETTINGS_PATH, FileBackend};
use sim::{Garden, SharedGarden, SimChip, SimOutput, SimProbe};

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Channel update rate (10 Hz)
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Probe sampling rate between ticks
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Counting window of the probe meters. The simulated probes run at tens of
/// Hz, so a full second gives 1 Hz resolution.
const METER_WINDOW: Duration = Duration::from_secs(1);

/// Ticks between sensor snapshot writes (1 s)
const SNAPSHOT_TICKS: u32 = 10;

/// Ticks between status log lines (30 s)
const STATUS_TICKS: u32 = 300;

const SNAPSHOT_FILE: &str = "sensor_data.json";

/// Time given to the pump tasks to act on their stop command
const SHUTDOWN_GRACE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

type SimMeter = PolledMeter<SimProbe>;
type SimDrive = DigitalDrive<SimOutput>;
type Monitor = AppState<SimMeter, PumpLink<'static>, SimDrive>;

static PUMP_SIGNALS: [PumpSignal; CHANNEL_COUNT] =
    [PumpSignal::new(), PumpSignal::new(), PumpSignal::new()];

#[embassy_executor::task(pool_size = 3)]
async fn pump_task(pump: PumpActuator<SimDrive>, commands: &'static PumpSignal) -> ! {
    run_pump(pump, commands).await
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Channel numbers (1-based) listed in `var`, e.g. `1,3`
fn channel_list(var: &str) -> Vec<u8> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse::<u8>().ok())
        .filter(|index| ChannelPins::for_channel(*index).is_some())
        .collect()
}

/// Build the three channels, spawning a pump task for every pump that could
/// be claimed. A channel whose pump is missing gets a detached link and
/// degrades on start.
fn build_channels(
    chip: &mut SimChip,
    spawner: &Spawner,
    settings: &Settings,
) -> [Channel<SimMeter, PumpLink<'static>>; CHANNEL_COUNT] {
    core::array::from_fn(|slot| {
        let index = slot as u8 + 1;
        let moisture_pin = MOISTURE_PINS[slot];
        let pump_pin = PUMP_PINS[slot];

        let meter = PolledMeter::claim(chip, moisture_pin).with_window(METER_WINDOW);

        let signal = &PUMP_SIGNALS[slot];
        let pump = match chip.claim_output(pump_pin, PinState::Low) {
            Ok(pin) => {
                let actuator = PumpActuator::new(DigitalDrive::new(pin), pump_pin);
                match spawner.spawn(pump_task(actuator, signal)) {
                    Ok(()) => PumpLink::new(signal),
                    Err(e) => {
                        error!("Failed to spawn pump task for channel {}: {:?}", index, e);
                        PumpLink::detached(signal)
                    }
                }
            }
            Err(e) => {
                error!("Failed to claim pump for channel {}: {:?}", index, e);
                PumpLink::detached(signal)
            }
        };

        Channel::new(index, meter, pump, settings.channels[slot])
    })
}

fn build_piezo(chip: &mut SimChip) -> Option<Piezo<SimDrive>> {
    match chip.claim_output(PIEZO_PIN, PinState::Low) {
        Ok(pin) => Some(Piezo::new(DigitalDrive::new(pin))),
        Err(e) => {
            error!("Failed to claim piezo: {:?}", e);
            None
        }
    }
}

/// Read lines from stdin on a thread of its own and raise `pressed` for each.
fn watch_snooze_key(pressed: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("snooze-key".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() {
                    break;
                }
                pressed.store(true, Ordering::Relaxed);
            }
        });
    if let Err(e) = spawned {
        warn!("Snooze key unavailable: {}", e);
    }
}

/// Raise `requested` on Ctrl-C or SIGTERM.
fn watch_shutdown(requested: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || requested.store(true, Ordering::Relaxed)) {
        warn!("Shutdown signal handler unavailable: {}", e);
    }
}

/// Enable channels listed in `GROWHAT_ENABLE` for this run.
fn apply_overrides(state: &mut Monitor, enabled: &[u8]) {
    for index in enabled {
        if let Some(channel) = state.channel_mut(*index) {
            channel.set_enabled(true);
            channel.set_auto_water(true);
        }
    }
}

/// `current` with the run-only overrides on `enabled` channels put back to
/// their `loaded` values, as it should be saved.
fn without_overrides(mut current: Settings, loaded: &Settings, enabled: &[u8]) -> Settings {
    for index in enabled {
        let slot = usize::from(*index) - 1;
        let saved = loaded.channels.get(slot);
        if let (Some(channel), Some(saved)) = (current.channels.get_mut(slot), saved) {
            channel.enabled = saved.enabled;
            channel.auto_water = saved.auto_water;
        }
    }
    current
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

fn snapshot_json(snapshot: &SystemSnapshot) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(snapshot)
}

fn write_snapshot(state: &Monitor, path: &Path, now: Instant) {
    let bytes = match snapshot_json(&state.snapshot(now)) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to encode sensor snapshot: {:?}", e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, bytes) {
        error!("Failed to write {}: {}", path.display(), e);
    }
}

fn log_status(state: &Monitor, garden: &SharedGarden, now: Instant) {
    for channel in state.channels() {
        if !channel.enabled() {
            continue;
        }
        let soil = garden
            .lock()
            .map(|g| g.saturation(channel.index() as usize - 1))
            .unwrap_or(f32::NAN);
        info!(
            "Channel {}: {:.1} Hz, saturation {:.0}% (soil {:.0}%), alarm {}",
            channel.index(),
            channel.moisture(),
            channel.saturation() * 100.0,
            soil * 100.0,
            channel.alarm()
        );
    }
    if state.alarm().sleeping(now) {
        info!("Alarm snoozed");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting growhat-rs monitor");

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let snapshot_path = settings_path.with_file_name(SNAPSHOT_FILE);

    let mut store = SettingsStore::new(FileBackend::new(&settings_path));
    let settings = match store.load() {
        Ok(Some(settings)) => {
            info!("Loaded settings from {}", settings_path.display());
            settings
        }
        Ok(None) => Settings::default(),
        Err(e) => {
            error!("Cannot start with settings from {}: {}", settings_path.display(), e);
            std::process::exit(1);
        }
    };

    let faulty = channel_list("GROWHAT_FAULTY_CHANNEL")
        .first()
        .map(|index| *index as usize - 1);
    let garden = Garden::shared(faulty);
    let mut chip = SimChip::new(garden.clone());

    let channels = build_channels(&mut chip, &spawner, &settings);
    let piezo = build_piezo(&mut chip);

    let now = Instant::now();
    let mut state: Monitor = AppState::new(channels, piezo, &settings, now);
    let enabled = channel_list("GROWHAT_ENABLE");
    apply_overrides(&mut state, &enabled);
    state.start(now);

    if state.channels().iter().all(|channel| !channel.enabled()) {
        warn!("All channels are disabled; set GROWHAT_ENABLE=1,2,3 to enable them");
    }

    let snooze_pressed = Arc::new(AtomicBool::new(false));
    watch_snooze_key(snooze_pressed.clone());
    let shutdown_requested = Arc::new(AtomicBool::new(false));
    watch_shutdown(shutdown_requested.clone());

    let mut ticker = Ticker::every(POLL_INTERVAL);
    let mut next_tick = now;
    let mut ticks: u32 = 0;

    while !shutdown_requested.load(Ordering::Relaxed) {
        let now = Instant::now();
        match garden.lock() {
            Ok(mut soil) => soil.advance(now),
            Err(e) => error!("Simulated garden unavailable: {}", e),
        }

        if snooze_pressed.swap(false, Ordering::Relaxed) {
            if let Some(sleeping) = state.snooze_button(now) {
                info!("Alarm {}", if sleeping { "snoozed" } else { "resumed" });
            }
        }

        state.poll_sensors(now);

        if now >= next_tick {
            next_tick += TICK_INTERVAL;
            ticks = ticks.wrapping_add(1);

            let lux = garden.lock().ok().map(|soil| soil.lux(now));
            let report = state.tick(now, lux);
            if report.burst.is_some() {
                warn!("Alarm: channels {:?} need water", report.alarming);
            }
            if !report.dosed.is_empty() {
                info!("Dosed channels {:?}", report.dosed);
            }

            let saved = without_overrides(state.settings(), &settings, &enabled);
            if let Err(e) = store.save_if_changed(&saved) {
                error!("Failed to save settings: {}", e);
            }
            if ticks % SNAPSHOT_TICKS == 0 {
                write_snapshot(&state, &snapshot_path, now);
            }
            if ticks % STATUS_TICKS == 0 {
                log_status(&state, &garden, now);
            }
        }

        ticker.next().await;
    }

    state.shutdown();
    Timer::after(SHUTDOWN_GRACE).await;
    info!("Monitor stopped");
    std::process::exit(0);
}
