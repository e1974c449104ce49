//! Escape maneuver decision table and open-loop heading behaviour.

mod common;

use approx::assert_relative_eq;
use chalak::clock::{Clock, ManualClock};
use chalak::config::{EscapeConfig, SimulationConfig};
use chalak::control::TickAction;
use chalak::core::types::{DistanceReading, EscapeDecision, OperatingMode};
use chalak::devices::mock::{
    MotorEvent, RecordingMotors, ScriptedRanger, SimMotors, SimWorld,
};
use chalak::maneuver::{EscapeManeuver, EscapeOutcome, ManeuverIo};
use common::{config_in, rig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Readings in sample order: reverse, settle, pivot, right, pivot, left
fn ranger(right: f32, left: f32) -> ScriptedRanger {
    ScriptedRanger::from_raw(&[30.0, 30.0, 30.0, right, 30.0, left], 8.0)
}

fn escape(
    ranger: &mut ScriptedRanger,
    motors: &mut dyn chalak::drivers::MotionActuator,
    clock: &dyn Clock,
) -> EscapeOutcome {
    let maneuver = EscapeManeuver::new(EscapeConfig::default());
    let mut io = ManeuverIo {
        motors,
        ranger,
        clock,
    };
    maneuver.run(&mut io).unwrap()
}

fn pivots(motors: &RecordingMotors) -> usize {
    motors
        .drives()
        .iter()
        .filter(|cmd| cmd.left != cmd.right)
        .count()
}

#[test]
fn test_right_clear_skips_left_look() {
    let mut r = ranger(50.0, 60.0);
    let mut motors = RecordingMotors::new();
    let clock = ManualClock::new();

    let outcome = escape(&mut r, &mut motors, &clock);

    assert_eq!(outcome.decision, EscapeDecision::ClearRight);
    assert_eq!(outcome.left, None);
    assert_eq!(pivots(&motors), 1);
    assert_eq!(r.samples_taken(), 4);
}

#[test]
fn test_left_clear_after_blocked_right() {
    let mut r = ranger(15.0, 60.0);
    let mut motors = RecordingMotors::new();
    let clock = ManualClock::new();

    let outcome = escape(&mut r, &mut motors, &clock);

    assert_eq!(outcome.decision, EscapeDecision::ClearLeft);
    assert_eq!(outcome.right, DistanceReading::Valid(15.0));
    assert_eq!(outcome.left, Some(DistanceReading::Valid(60.0)));
    assert_eq!(pivots(&motors), 2);
}

#[test]
fn test_invalid_side_reading_counts_as_open() {
    let mut r = ranger(-1.0, 15.0);
    let mut motors = RecordingMotors::new();
    let clock = ManualClock::new();

    let outcome = escape(&mut r, &mut motors, &clock);
    assert_eq!(outcome.decision, EscapeDecision::ClearRight);
}

#[test]
fn test_trapped_ends_stopped() {
    let mut r = ranger(15.0, 15.0);
    let mut motors = RecordingMotors::new();
    let clock = ManualClock::new();

    let outcome = escape(&mut r, &mut motors, &clock);

    assert_eq!(outcome.decision, EscapeDecision::Trapped);
    assert_eq!(pivots(&motors), 3);
    assert_eq!(motors.last(), Some(MotorEvent::Stop));
    assert_eq!(clock.now(), Duration::from_millis(4450));
}

#[test]
fn test_trapped_returns_to_original_heading() {
    let sim = SimulationConfig {
        range_noise_cm: 0.0,
        dropout_probability: 0.0,
        ..SimulationConfig::default()
    };
    let clock = ManualClock::new();
    let world = Arc::new(Mutex::new(SimWorld::new(&sim, clock.now())));
    let mut motors = SimMotors::new(Arc::clone(&world), Arc::new(clock.clone()));
    let mut r = ranger(15.0, 15.0);

    let outcome = escape(&mut r, &mut motors, &clock);
    assert_eq!(outcome.decision, EscapeDecision::Trapped);

    let mut world = world.lock();
    world.advance_to(clock.now());
    let (x, _, theta) = world.pose();
    assert_relative_eq!(theta, 0.0, epsilon = 1e-3);
    // Backed away from the obstacle ahead
    assert!(x < sim.start_x_cm);
    assert_eq!(world.collisions(), 0);
}

#[test]
fn test_clear_right_leaves_robot_turned() {
    let sim = SimulationConfig {
        range_noise_cm: 0.0,
        dropout_probability: 0.0,
        ..SimulationConfig::default()
    };
    let clock = ManualClock::new();
    let world = Arc::new(Mutex::new(SimWorld::new(&sim, clock.now())));
    let mut motors = SimMotors::new(Arc::clone(&world), Arc::new(clock.clone()));
    let mut r = ranger(50.0, 50.0);

    escape(&mut r, &mut motors, &clock);

    let mut world = world.lock();
    world.advance_to(clock.now());
    let (_, _, theta) = world.pose();
    // Clockwise pivot
    assert!(theta < -0.5, "heading {}", theta);
}

#[test]
fn test_tick_escape_updates_status_distance() {
    let config = config_in(OperatingMode::Work);
    let script = ScriptedRanger::from_raw(&[6.0, 30.0, 30.0, 30.0, 15.0, 30.0, 70.0], 150.0);
    let mut r = rig(&config, script);

    let report = r.control.run_one_tick().unwrap();

    assert_eq!(report.action, TickAction::Escaped(EscapeDecision::ClearLeft));
    assert_eq!(
        r.control.state().last_distance(),
        DistanceReading::Valid(70.0)
    );
    // Next tick resumes normal governance from the new heading
    let report = r.control.run_one_tick().unwrap();
    assert!(matches!(report.action, TickAction::Drove(_)));
}
