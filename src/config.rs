//! Configuration loading for Chalak
//!
//! Every field has a serde default, so a TOML file only needs the values it
//! overrides. Defaults are the tuned values for the reference two-wheel
//! chassis with an HC-SR04 style ranger.

use crate::core::types::OperatingMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChalakConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub escape: EscapeConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which device backend to instantiate
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Backend type (currently only "mock")
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,

    /// Human readable name for logs
    #[serde(default = "default_device_name")]
    pub name: String,
}

/// Network uplink and command channel settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_wifi_ssid")]
    pub wifi_ssid: String,

    #[serde(default = "default_wifi_password")]
    pub wifi_password: String,

    /// Listen address for the status/control surface
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Upper bound on how long one request read may block the tick
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Maximum request bytes read per connection
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
}

/// GPIO assignments, consumed by board drivers
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PinConfig {
    /// (pwm, in1, in2)
    #[serde(default = "default_left_motor_pins")]
    pub left_motor: [u8; 3],
    #[serde(default = "default_right_motor_pins")]
    pub right_motor: [u8; 3],
    #[serde(default = "default_motor_standby_pin")]
    pub motor_standby: u8,
    #[serde(default = "default_button_pin")]
    pub button: u8,
    /// (r, g, b)
    #[serde(default = "default_hri_led_pins")]
    pub hri_led: [u8; 3],
    #[serde(default = "default_ultrasonic_trigger_pin")]
    pub ultrasonic_trigger: u8,
    #[serde(default = "default_ultrasonic_echo_pin")]
    pub ultrasonic_echo: u8,
    #[serde(default = "default_ultrasonic_led_pins")]
    pub ultrasonic_led: [u8; 3],
}

/// Speed governance tuning
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GovernorConfig {
    /// Forward duty when the path is clear
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,

    /// Forward duty inside the slow-down band (before fatigue scaling)
    #[serde(default = "default_slow_speed")]
    pub slow_speed: f32,

    /// Below this distance the escape maneuver runs
    #[serde(default = "default_stop_distance_cm")]
    pub stop_distance_cm: f32,

    /// Below this distance the robot creeps at slow speed
    #[serde(default = "default_slow_down_distance_cm")]
    pub slow_down_distance_cm: f32,

    /// Continuous work time after which speed is derated
    #[serde(default = "default_fatigue_threshold_s")]
    pub fatigue_threshold_s: f32,

    /// Multiplier applied to max speed once fatigued
    #[serde(default = "default_fatigue_derate")]
    pub fatigue_derate: f32,
}

/// Escape maneuver timing. All pivots are open-loop.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EscapeConfig {
    #[serde(default = "default_reverse_speed")]
    pub reverse_speed: f32,
    #[serde(default = "default_reverse_duration_s")]
    pub reverse_duration_s: f32,
    #[serde(default = "default_reverse_settle_s")]
    pub reverse_settle_s: f32,
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f32,
    /// Pivot time that approximates a quarter turn at `turn_speed`
    #[serde(default = "default_turn_90_duration_s")]
    pub turn_90_duration_s: f32,
    #[serde(default = "default_turn_settle_s")]
    pub turn_settle_s: f32,
    /// A side counts as open when its reading exceeds this
    #[serde(default = "default_clearance_cm")]
    pub clearance_cm: f32,
}

/// Self-check gate timing
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StartupConfig {
    /// Delay between the cold-start sample and the sample that is judged
    #[serde(default = "default_sensor_settle_ms")]
    pub sensor_settle_ms: u64,
    #[serde(default = "default_pass_flash_hz")]
    pub pass_flash_hz: u32,
    #[serde(default = "default_pass_window_ms")]
    pub pass_window_ms: u64,
    /// Full on+off period of the red failure flash
    #[serde(default = "default_fail_flash_period_ms")]
    pub fail_flash_period_ms: u64,
}

/// Control loop and supervision
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_initial_mode")]
    pub initial_mode: OperatingMode,

    /// Idle time at the end of each tick (0 = run flat out)
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Cooldown after the first failed tick
    #[serde(default = "default_cooldown_s")]
    pub cooldown_s: f32,

    /// Upper bound for the cooldown under repeated failures
    #[serde(default = "default_max_cooldown_s")]
    pub max_cooldown_s: f32,

    /// Cooldown multiplier per consecutive failure
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f32,

    /// Button presses this soon after a toggle are treated as contact bounce
    #[serde(default = "default_button_debounce_ms")]
    pub button_debounce_ms: u64,
}

/// Mock device world and noise
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Room size in centimeters
    #[serde(default = "default_room_width_cm")]
    pub room_width_cm: f32,
    #[serde(default = "default_room_height_cm")]
    pub room_height_cm: f32,
    #[serde(default = "default_start_x_cm")]
    pub start_x_cm: f32,
    #[serde(default = "default_start_y_cm")]
    pub start_y_cm: f32,
    /// Start heading in degrees, CCW from +X
    #[serde(default)]
    pub start_heading_deg: f32,
    /// Wheel surface speed at duty 1.0
    #[serde(default = "default_wheel_speed_cm_s")]
    pub wheel_speed_cm_s: f32,
    #[serde(default = "default_wheel_base_cm")]
    pub wheel_base_cm: f32,
    /// Readings beyond this come back invalid
    #[serde(default = "default_max_range_cm")]
    pub max_range_cm: f32,
    #[serde(default = "default_range_noise_cm")]
    pub range_noise_cm: f32,
    /// Probability of a missing echo per sample
    #[serde(default = "default_dropout_probability")]
    pub dropout_probability: f32,
    /// 0 = seed from entropy
    #[serde(default)]
    pub random_seed: u64,
    /// Hold the button during boot (exercises the failed self-check)
    #[serde(default)]
    pub button_held_at_boot: bool,
    /// Pretend the uplink is unavailable
    #[serde(default)]
    pub offline: bool,
}

/// Logging configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); RUST_LOG wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_device_type() -> String {
    "mock".to_string()
}
fn default_device_name() -> String {
    "Chalak simulated rover".to_string()
}
fn default_wifi_ssid() -> String {
    "BotSpot".to_string()
}
fn default_wifi_password() -> String {
    "physicsrules".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0:80".to_string()
}
fn default_read_timeout_ms() -> u64 {
    500
}
fn default_read_buffer_bytes() -> usize {
    1024
}

// Pin defaults
fn default_left_motor_pins() -> [u8; 3] {
    [7, 9, 8]
}
fn default_right_motor_pins() -> [u8; 3] {
    [15, 13, 14]
}
fn default_motor_standby_pin() -> u8 {
    12
}
fn default_button_pin() -> u8 {
    4
}
fn default_hri_led_pins() -> [u8; 3] {
    [16, 17, 18]
}
fn default_ultrasonic_trigger_pin() -> u8 {
    3
}
fn default_ultrasonic_echo_pin() -> u8 {
    2
}
fn default_ultrasonic_led_pins() -> [u8; 3] {
    [19, 20, 21]
}

// Behaviour defaults
fn default_max_speed() -> f32 {
    0.9
}
fn default_slow_speed() -> f32 {
    0.4
}
fn default_stop_distance_cm() -> f32 {
    10.0
}
fn default_slow_down_distance_cm() -> f32 {
    20.0
}
fn default_fatigue_threshold_s() -> f32 {
    45.0
}
fn default_fatigue_derate() -> f32 {
    0.5
}
fn default_reverse_speed() -> f32 {
    0.7
}
fn default_reverse_duration_s() -> f32 {
    0.75
}
fn default_reverse_settle_s() -> f32 {
    0.3
}
fn default_turn_speed() -> f32 {
    0.8
}
fn default_turn_90_duration_s() -> f32 {
    0.6
}
fn default_turn_settle_s() -> f32 {
    0.5
}
fn default_clearance_cm() -> f32 {
    40.0
}
fn default_sensor_settle_ms() -> u64 {
    200
}
fn default_pass_flash_hz() -> u32 {
    5
}
fn default_pass_window_ms() -> u64 {
    2000
}
fn default_fail_flash_period_ms() -> u64 {
    1000
}
fn default_initial_mode() -> OperatingMode {
    OperatingMode::Pause
}
fn default_tick_period_ms() -> u64 {
    20
}
fn default_cooldown_s() -> f32 {
    5.0
}
fn default_max_cooldown_s() -> f32 {
    5.0
}
fn default_backoff_factor() -> f32 {
    1.0
}
fn default_button_debounce_ms() -> u64 {
    50
}

// Simulation defaults
fn default_room_width_cm() -> f32 {
    300.0
}
fn default_room_height_cm() -> f32 {
    200.0
}
fn default_start_x_cm() -> f32 {
    150.0
}
fn default_start_y_cm() -> f32 {
    100.0
}
fn default_wheel_speed_cm_s() -> f32 {
    30.0
}
fn default_wheel_base_cm() -> f32 {
    12.0
}
fn default_max_range_cm() -> f32 {
    400.0
}
fn default_range_noise_cm() -> f32 {
    0.3
}
fn default_dropout_probability() -> f32 {
    0.02
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            name: default_device_name(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: default_wifi_ssid(),
            wifi_password: default_wifi_password(),
            bind_address: default_bind_address(),
            read_timeout_ms: default_read_timeout_ms(),
            read_buffer_bytes: default_read_buffer_bytes(),
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            left_motor: default_left_motor_pins(),
            right_motor: default_right_motor_pins(),
            motor_standby: default_motor_standby_pin(),
            button: default_button_pin(),
            hri_led: default_hri_led_pins(),
            ultrasonic_trigger: default_ultrasonic_trigger_pin(),
            ultrasonic_echo: default_ultrasonic_echo_pin(),
            ultrasonic_led: default_ultrasonic_led_pins(),
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            slow_speed: default_slow_speed(),
            stop_distance_cm: default_stop_distance_cm(),
            slow_down_distance_cm: default_slow_down_distance_cm(),
            fatigue_threshold_s: default_fatigue_threshold_s(),
            fatigue_derate: default_fatigue_derate(),
        }
    }
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            reverse_speed: default_reverse_speed(),
            reverse_duration_s: default_reverse_duration_s(),
            reverse_settle_s: default_reverse_settle_s(),
            turn_speed: default_turn_speed(),
            turn_90_duration_s: default_turn_90_duration_s(),
            turn_settle_s: default_turn_settle_s(),
            clearance_cm: default_clearance_cm(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            sensor_settle_ms: default_sensor_settle_ms(),
            pass_flash_hz: default_pass_flash_hz(),
            pass_window_ms: default_pass_window_ms(),
            fail_flash_period_ms: default_fail_flash_period_ms(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            initial_mode: default_initial_mode(),
            tick_period_ms: default_tick_period_ms(),
            cooldown_s: default_cooldown_s(),
            max_cooldown_s: default_max_cooldown_s(),
            backoff_factor: default_backoff_factor(),
            button_debounce_ms: default_button_debounce_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            room_width_cm: default_room_width_cm(),
            room_height_cm: default_room_height_cm(),
            start_x_cm: default_start_x_cm(),
            start_y_cm: default_start_y_cm(),
            start_heading_deg: 0.0,
            wheel_speed_cm_s: default_wheel_speed_cm_s(),
            wheel_base_cm: default_wheel_base_cm(),
            max_range_cm: default_max_range_cm(),
            range_noise_cm: default_range_noise_cm(),
            dropout_probability: default_dropout_probability(),
            random_seed: 0,
            button_held_at_boot: false,
            offline: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ChalakConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        let config: ChalakConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tuning that would make the controller misbehave
    pub fn validate(&self) -> Result<()> {
        let g = &self.governor;
        let e = &self.escape;
        let c = &self.control;
        // NaN slips through every ordered comparison below
        for (name, value) in [
            ("governor.stop_distance_cm", g.stop_distance_cm),
            ("governor.slow_down_distance_cm", g.slow_down_distance_cm),
            ("governor.fatigue_threshold_s", g.fatigue_threshold_s),
            ("escape.reverse_duration_s", e.reverse_duration_s),
            ("escape.reverse_settle_s", e.reverse_settle_s),
            ("escape.turn_90_duration_s", e.turn_90_duration_s),
            ("escape.turn_settle_s", e.turn_settle_s),
            ("escape.clearance_cm", e.clearance_cm),
            ("control.cooldown_s", c.cooldown_s),
            ("control.max_cooldown_s", c.max_cooldown_s),
            ("control.backoff_factor", c.backoff_factor),
        ] {
            if !value.is_finite() {
                return Err(Error::Config(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }

        for (name, duty) in [
            ("governor.max_speed", g.max_speed),
            ("governor.slow_speed", g.slow_speed),
            ("governor.fatigue_derate", g.fatigue_derate),
            ("escape.reverse_speed", self.escape.reverse_speed),
            ("escape.turn_speed", self.escape.turn_speed),
        ] {
            if !(0.0..=1.0).contains(&duty) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, duty
                )));
            }
        }
        if g.max_speed <= 0.0 {
            return Err(Error::Config(
                "governor.max_speed must be positive".to_string(),
            ));
        }
        if g.stop_distance_cm <= 0.0 || g.stop_distance_cm >= g.slow_down_distance_cm {
            return Err(Error::Config(format!(
                "expected 0 < stop_distance_cm ({}) < slow_down_distance_cm ({})",
                g.stop_distance_cm, g.slow_down_distance_cm
            )));
        }

        if e.turn_90_duration_s <= 0.0 || e.reverse_duration_s <= 0.0 {
            return Err(Error::Config(
                "escape durations must be positive".to_string(),
            ));
        }
        if e.reverse_settle_s < 0.0 || e.turn_settle_s < 0.0 {
            return Err(Error::Config(
                "escape settle times must not be negative".to_string(),
            ));
        }

        if self.startup.pass_flash_hz == 0 {
            return Err(Error::Config(
                "startup.pass_flash_hz must be positive".to_string(),
            ));
        }

        if c.cooldown_s < 0.0 || c.max_cooldown_s < c.cooldown_s || c.backoff_factor < 1.0 {
            return Err(Error::Config(format!(
                "expected 0 <= cooldown_s ({}) <= max_cooldown_s ({}) and backoff_factor ({}) >= 1",
                c.cooldown_s, c.max_cooldown_s, c.backoff_factor
            )));
        }

        if self.network.read_buffer_bytes == 0 {
            return Err(Error::Config(
                "network.read_buffer_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.control.tick_period_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.network.read_timeout_ms)
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_millis(self.control.button_debounce_ms)
    }
}

/// Seconds as a millisecond-resolution `Duration`; negative or NaN is zero
pub(crate) fn secs(s: f32) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_millis((s * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}
