//! Kinematic world for the simulated rover
//!
//! A differential-drive robot in an empty rectangular room. Wheel duties are
//! integrated lazily: every interaction first advances the pose to the
//! current clock time using the duties that were active since the last one.

use crate::config::SimulationConfig;
use std::f32::consts::{PI, TAU};
use std::time::Duration;

/// Distance kept between the robot centre and any wall
const BODY_RADIUS_CM: f32 = 6.0;

/// Pose and wheel state of the simulated robot
#[derive(Debug, Clone)]
pub struct SimWorld {
    /// Position in room frame (cm)
    x: f32,
    y: f32,
    /// Heading (radians, CCW from +X)
    theta: f32,
    left_duty: f32,
    right_duty: f32,
    last_update: Duration,
    width: f32,
    height: f32,
    wheel_speed: f32,
    wheel_base: f32,
    collisions: u64,
}

impl SimWorld {
    pub fn new(config: &SimulationConfig, now: Duration) -> Self {
        let min = BODY_RADIUS_CM;
        Self {
            x: config.start_x_cm.clamp(min, config.room_width_cm - min),
            y: config.start_y_cm.clamp(min, config.room_height_cm - min),
            theta: normalize_angle(config.start_heading_deg.to_radians()),
            left_duty: 0.0,
            right_duty: 0.0,
            last_update: now,
            width: config.room_width_cm,
            height: config.room_height_cm,
            wheel_speed: config.wheel_speed_cm_s,
            wheel_base: config.wheel_base_cm.max(1.0),
            collisions: 0,
        }
    }

    /// Integrate motion up to `now`
    pub fn advance_to(&mut self, now: Duration) {
        let dt = now.saturating_sub(self.last_update).as_secs_f32();
        self.last_update = self.last_update.max(now);
        if dt <= 0.0 {
            return;
        }

        let v_left = self.left_duty * self.wheel_speed;
        let v_right = self.right_duty * self.wheel_speed;
        let linear = (v_left + v_right) / 2.0;
        let angular = (v_right - v_left) / self.wheel_base;

        let (new_x, new_y, new_theta) = if angular.abs() < 1e-6 {
            (
                self.x + linear * self.theta.cos() * dt,
                self.y + linear * self.theta.sin() * dt,
                self.theta,
            )
        } else {
            let r = linear / angular;
            let new_theta = self.theta + angular * dt;
            (
                self.x + r * (new_theta.sin() - self.theta.sin()),
                self.y + r * (self.theta.cos() - new_theta.cos()),
                new_theta,
            )
        };

        // Walls stop translation, rotation still happens
        if self.inside(new_x, new_y) {
            self.x = new_x;
            self.y = new_y;
        } else {
            self.collisions += 1;
            log::debug!(
                "SimWorld: bumped wall at ({:.1}, {:.1})",
                new_x,
                new_y
            );
        }
        self.theta = normalize_angle(new_theta);
    }

    pub fn set_duties(&mut self, left: f32, right: f32, now: Duration) {
        self.advance_to(now);
        self.left_duty = left;
        self.right_duty = right;
    }

    /// Distance from the robot centre to the wall straight ahead (cm)
    pub fn range_ahead(&self) -> f32 {
        let (dx, dy) = (self.theta.cos(), self.theta.sin());
        let mut best = f32::INFINITY;

        if dx > 1e-6 {
            best = best.min((self.width - self.x) / dx);
        } else if dx < -1e-6 {
            best = best.min(-self.x / dx);
        }
        if dy > 1e-6 {
            best = best.min((self.height - self.y) / dy);
        } else if dy < -1e-6 {
            best = best.min(-self.y / dy);
        }
        best.max(0.0)
    }

    fn inside(&self, x: f32, y: f32) -> bool {
        (BODY_RADIUS_CM..=self.width - BODY_RADIUS_CM).contains(&x)
            && (BODY_RADIUS_CM..=self.height - BODY_RADIUS_CM).contains(&y)
    }

    pub fn pose(&self) -> (f32, f32, f32) {
        (self.x, self.y, self.theta)
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }
}

/// Normalize angle to [-PI, PI)
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a >= PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}
