//! Ultrasonic measurement noise for the simulated ranger

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Echo jitter and dropouts, reproducible when seeded
pub struct RangeNoise {
    rng: SmallRng,
    jitter: Option<Normal<f32>>,
    dropout_probability: f64,
}

impl RangeNoise {
    /// `seed == 0` draws from entropy, so every run differs
    pub fn new(seed: u64, stddev_cm: f32, dropout_probability: f32) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        let jitter = (stddev_cm > 0.0)
            .then(|| Normal::new(0.0, stddev_cm).ok())
            .flatten();
        Self {
            rng,
            jitter,
            dropout_probability: f64::from(dropout_probability.clamp(0.0, 1.0)),
        }
    }

    /// True when this ping gets no echo back
    pub fn dropped(&mut self) -> bool {
        self.dropout_probability > 0.0 && self.rng.gen_bool(self.dropout_probability)
    }

    /// True range plus jitter
    pub fn perturb(&mut self, range_cm: f32) -> f32 {
        match &self.jitter {
            Some(normal) => range_cm + normal.sample(&mut self.rng),
            None => range_cm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_echoes() {
        let mut a = RangeNoise::new(42, 1.0, 0.1);
        let mut b = RangeNoise::new(42, 1.0, 0.1);
        for _ in 0..20 {
            assert_eq!(a.dropped(), b.dropped());
            assert_eq!(a.perturb(100.0), b.perturb(100.0));
        }
    }

    #[test]
    fn test_quiet_sensor_is_exact() {
        let mut noise = RangeNoise::new(7, 0.0, 0.0);
        for _ in 0..100 {
            assert!(!noise.dropped());
            assert_eq!(noise.perturb(55.5), 55.5);
        }
    }

    #[test]
    fn test_certain_dropout() {
        let mut noise = RangeNoise::new(3, 0.5, 1.0);
        assert!((0..50).all(|_| noise.dropped()));
    }
}
