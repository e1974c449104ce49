//! Chalak - rover controller daemon
//!
//! ## Startup
//!
//! 1. Self-check: ranger sample plus button. Failure flashes red until the
//!    process is signalled and never arms the motors.
//! 2. Network bring-up. Failure is not fatal; the rover runs offline.
//! 3. Control loop with the command channel on `[network] bind_address`.

use chalak::channel::{CommandChannel, TcpAcceptor};
use chalak::clock::{Clock, SystemClock};
use chalak::config::{ChalakConfig, PinConfig};
use chalak::control::{ControlLoop, Lifecycle};
use chalak::devices::create_device;
use chalak::error::{Error, Result};
use chalak::operator::OperatorInterface;
use chalak::startup::{GateVerdict, StartupGate, connect_network};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_CONFIG: &str = "chalak.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `chalak <path>` (positional)
/// - `chalak --config <path>` (flag-based)
/// - `chalak -c <path>` (short flag)
///
/// Returns `None` when no path was given.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

/// Explicit path, else `chalak.toml` if present, else built-in defaults
fn load_config() -> Result<(ChalakConfig, String)> {
    match parse_config_path() {
        Some(path) => Ok((ChalakConfig::load(Path::new(&path))?, path)),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok((
            ChalakConfig::load(Path::new(DEFAULT_CONFIG))?,
            DEFAULT_CONFIG.to_string(),
        )),
        None => Ok((ChalakConfig::default(), "<built-in defaults>".to_string())),
    }
}

fn log_pins(pins: &PinConfig) {
    log::debug!(
        "Pins: motors L{:?} R{:?} stby {}, button {}, hri led {:?}, ultrasonic trig {} echo {} led {:?}",
        pins.left_motor,
        pins.right_motor,
        pins.motor_standby,
        pins.button,
        pins.hri_led,
        pins.ultrasonic_trigger,
        pins.ultrasonic_echo,
        pins.ultrasonic_led
    );
}

fn main() -> Result<()> {
    let (config, config_source) = load_config()?;

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    log::info!("Chalak v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_source);
    log::info!(
        "Device: {} ({})",
        config.device.name,
        config.device.device_type
    );
    log_pins(&config.pins);

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut lifecycle = Lifecycle::Init;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let hardware = create_device(&config, Arc::clone(&clock))?;
    let mut ranger = hardware.ranger;
    let mut motors = hardware.motors;
    let mut link = hardware.link;
    let mut hri = OperatorInterface::new(hardware.panel).with_debounce(config.button_debounce());

    // Nothing moves until the self-check passes
    motors.stop()?;

    lifecycle.advance(Lifecycle::SelfCheck);
    let gate = StartupGate::new(config.startup.clone());
    if let GateVerdict::Fail(reason) = gate.check(ranger.as_mut(), &mut hri, clock.as_ref())? {
        lifecycle.advance(Lifecycle::FailHalt);
        gate.halt(&mut hri, &running, clock.as_ref())?;
        motors.stop()?;
        return Err(Error::SelfCheckFailed(reason.to_string()));
    }

    lifecycle.advance(Lifecycle::NetworkConnect);
    let online = connect_network(link.as_mut(), &config.network).is_some();

    let mut control = ControlLoop::new(&config, ranger, motors, hri, Arc::clone(&clock));
    if online {
        match TcpAcceptor::bind(config.network.bind_address.as_str(), config.read_timeout()) {
            Ok(acceptor) => {
                if let Ok(addr) = acceptor.local_addr() {
                    log::info!("Command channel listening on http://{}", addr);
                }
                let channel = CommandChannel::new(Box::new(acceptor), config.network.read_buffer_bytes);
                control = control.with_channel(channel);
            }
            Err(e) => log::warn!(
                "Failed to bind {} ({}), continuing without command channel",
                config.network.bind_address,
                e
            ),
        }
    }

    lifecycle.advance(Lifecycle::Running);
    control.run(&running)?;

    lifecycle.advance(Lifecycle::Stopped);
    Ok(())
}
