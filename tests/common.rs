//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chalak::ChalakConfig;
use chalak::channel::{CommandChannel, TcpAcceptor};
use chalak::clock::ManualClock;
use chalak::control::ControlLoop;
use chalak::core::types::OperatingMode;
use chalak::devices::mock::{RecordingMotors, ScriptedPanel, ScriptedRanger};
use chalak::operator::OperatorInterface;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Controller wired to scripted doubles, with handles to inspect them
pub struct Rig {
    pub control: ControlLoop,
    pub ranger: ScriptedRanger,
    pub motors: RecordingMotors,
    pub panel: ScriptedPanel,
    pub clock: ManualClock,
}

/// Default configuration starting in `mode`
pub fn config_in(mode: OperatingMode) -> ChalakConfig {
    let mut config = ChalakConfig::default();
    config.control.initial_mode = mode;
    config
}

pub fn rig(config: &ChalakConfig, ranger: ScriptedRanger) -> Rig {
    let motors = RecordingMotors::new();
    let panel = ScriptedPanel::new(false);
    let clock = ManualClock::new();
    let control = ControlLoop::new(
        config,
        Box::new(ranger.clone()),
        Box::new(motors.clone()),
        OperatorInterface::new(Box::new(panel.clone())),
        Arc::new(clock.clone()),
    );
    Rig {
        control,
        ranger,
        motors,
        panel,
        clock,
    }
}

/// Command channel on an ephemeral loopback port
pub fn loopback_channel() -> (CommandChannel, SocketAddr) {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0", Duration::from_millis(500)).unwrap();
    let addr = acceptor.local_addr().unwrap();
    (CommandChannel::new(Box::new(acceptor), 1024), addr)
}

/// Connect and send a GET without waiting for the answer
pub fn send_get(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(stream, "GET {} HTTP/1.1\r\nHost: robot\r\n\r\n", path).unwrap();
    stream.flush().unwrap();
    stream
}

/// Read until the server closes the connection
pub fn read_response(mut stream: TcpStream) -> String {
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}
