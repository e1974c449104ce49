//! Deterministic test doubles

use crate::core::types::{DistanceReading, MotionCommand, Rgb};
use crate::drivers::{DistanceSource, MotionActuator, NetworkLink, OperatorPanel};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Ranger that replays a queue of readings, then repeats a fallback
#[derive(Clone)]
pub struct ScriptedRanger {
    inner: Arc<Mutex<ScriptedRangerInner>>,
}

struct ScriptedRangerInner {
    script: VecDeque<DistanceReading>,
    fallback: DistanceReading,
    samples: usize,
    fail_next: bool,
    led_on: bool,
}

impl ScriptedRanger {
    pub fn new(fallback: DistanceReading) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedRangerInner {
                script: VecDeque::new(),
                fallback,
                samples: 0,
                fail_next: false,
                led_on: false,
            })),
        }
    }

    /// Script raw driver values (non-positive = invalid)
    pub fn from_raw(script: &[f32], fallback: f32) -> Self {
        let ranger = Self::new(DistanceReading::from_raw_cm(fallback));
        for raw in script {
            ranger.push(DistanceReading::from_raw_cm(*raw));
        }
        ranger
    }

    pub fn push(&self, reading: DistanceReading) {
        self.inner.lock().script.push_back(reading);
    }

    /// Make the next read fail with a device error
    pub fn fail_next(&self) {
        self.inner.lock().fail_next = true;
    }

    pub fn samples_taken(&self) -> usize {
        self.inner.lock().samples
    }

    pub fn led_on(&self) -> bool {
        self.inner.lock().led_on
    }
}

impl DistanceSource for ScriptedRanger {
    fn trigger_and_read(&mut self) -> Result<DistanceReading> {
        let mut inner = self.inner.lock();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(Error::Device("ranger echo line stuck".to_string()));
        }
        inner.samples += 1;
        let fallback = inner.fallback;
        Ok(inner.script.pop_front().unwrap_or(fallback))
    }

    fn set_indicator(&mut self, on: bool) -> Result<()> {
        self.inner.lock().led_on = on;
        Ok(())
    }
}

/// Actuator call as seen by [`RecordingMotors`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorEvent {
    Drive(MotionCommand),
    Stop,
}

/// Actuator that records every call
#[derive(Clone, Default)]
pub struct RecordingMotors {
    inner: Arc<Mutex<RecordingMotorsInner>>,
}

#[derive(Default)]
struct RecordingMotorsInner {
    events: Vec<MotorEvent>,
    fail_drive: bool,
    fail_stop: bool,
}

impl RecordingMotors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MotorEvent> {
        self.inner.lock().events.clone()
    }

    /// Only the drive commands, in order
    pub fn drives(&self) -> Vec<MotionCommand> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MotorEvent::Drive(cmd) => Some(*cmd),
                MotorEvent::Stop => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<MotorEvent> {
        self.inner.lock().events.last().copied()
    }

    pub fn stop_count(&self) -> usize {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| **e == MotorEvent::Stop)
            .count()
    }

    /// Make the next `drive` call fail (stop keeps working)
    pub fn fail_next_drive(&self) {
        self.inner.lock().fail_drive = true;
    }

    /// Make the next `stop` call fail; the one after that succeeds
    pub fn fail_next_stop(&self) {
        self.inner.lock().fail_stop = true;
    }
}

impl MotionActuator for RecordingMotors {
    fn drive(&mut self, command: MotionCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_drive {
            inner.fail_drive = false;
            return Err(Error::Device("motor driver fault".to_string()));
        }
        inner.events.push(MotorEvent::Drive(command));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_stop {
            inner.fail_stop = false;
            return Err(Error::Device("motor driver fault".to_string()));
        }
        inner.events.push(MotorEvent::Stop);
        Ok(())
    }
}

/// Panel that replays button levels and records indicator colours
#[derive(Clone)]
pub struct ScriptedPanel {
    inner: Arc<Mutex<ScriptedPanelInner>>,
}

struct ScriptedPanelInner {
    levels: VecDeque<bool>,
    resting: bool,
    colors: Vec<Rgb>,
}

impl ScriptedPanel {
    pub fn new(resting: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedPanelInner {
                levels: VecDeque::new(),
                resting,
                colors: Vec::new(),
            })),
        }
    }

    /// Queue button levels returned by the next reads
    pub fn push_levels(&self, levels: &[bool]) {
        self.inner.lock().levels.extend(levels.iter().copied());
    }

    /// Queue one press followed by a release
    pub fn press_once(&self) {
        self.push_levels(&[true, false]);
    }

    /// Every colour ever set, in order
    pub fn colors(&self) -> Vec<Rgb> {
        self.inner.lock().colors.clone()
    }

    pub fn current_color(&self) -> Option<Rgb> {
        self.inner.lock().colors.last().copied()
    }
}

impl OperatorPanel for ScriptedPanel {
    fn button_pressed(&mut self) -> Result<bool> {
        let mut inner = self.inner.lock();
        let resting = inner.resting;
        Ok(inner.levels.pop_front().unwrap_or(resting))
    }

    fn set_indicator(&mut self, color: Rgb) -> Result<()> {
        self.inner.lock().colors.push(color);
        Ok(())
    }
}

/// Link with a fixed outcome
#[derive(Clone, Debug)]
pub struct ScriptedLink {
    address: Option<String>,
}

impl ScriptedLink {
    pub fn online(address: &str) -> Self {
        Self {
            address: Some(address.to_string()),
        }
    }

    pub fn offline() -> Self {
        Self { address: None }
    }
}

impl NetworkLink for ScriptedLink {
    fn connect(&mut self, _ssid: &str, _password: &str) -> Result<Option<String>> {
        Ok(self.address.clone())
    }
}
