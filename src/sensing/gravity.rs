use crate::models::Vec3;

/// Smoothing factor for the gravity low-pass filter.
pub const GRAVITY_ALPHA: f64 = 0.1;

/// Exponential moving-average gravity estimator.
///
/// `g' = α·a + (1-α)·g` per axis. The first sample seeds the estimate so a cold
/// start does not read as a large linear acceleration.
#[derive(Debug, Clone)]
pub struct GravityEstimator {
    alpha: f64,
    estimate: Option<Vec3>,
}

impl GravityEstimator {
    pub fn new() -> Self {
        Self::with_alpha(GRAVITY_ALPHA)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            estimate: None,
        }
    }

    /// Start from a known estimate instead of seeding from the first sample.
    pub fn with_initial(alpha: f64, initial: Vec3) -> Self {
        Self {
            estimate: Some(initial),
            ..Self::with_alpha(alpha)
        }
    }

    /// Fold one acceleration reading into the estimate and return it.
    pub fn update(&mut self, accel: Vec3) -> Vec3 {
        let next = match self.estimate {
            Some(g) => Vec3::new(
                self.alpha * accel.x + (1.0 - self.alpha) * g.x,
                self.alpha * accel.y + (1.0 - self.alpha) * g.y,
                self.alpha * accel.z + (1.0 - self.alpha) * g.z,
            ),
            None => accel,
        };
        self.estimate = Some(next);
        next
    }

    pub fn estimate(&self) -> Option<Vec3> {
        self.estimate
    }

    pub fn reset(&mut self) {
        self.estimate = None;
    }
}

impl Default for GravityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_estimate() {
        let mut estimator = GravityEstimator::new();
        assert_eq!(estimator.estimate(), None);
        let g = estimator.update(Vec3::new(0.0, 0.0, 9.81));
        assert_eq!(g, Vec3::new(0.0, 0.0, 9.81));
    }

    #[test]
    fn applies_smoothing_factor() {
        let mut estimator = GravityEstimator::with_initial(0.1, Vec3::new(0.0, 0.0, 0.0));
        let g = estimator.update(Vec3::new(10.0, -10.0, 5.0));
        assert!((g.x - 1.0).abs() < 1e-12);
        assert!((g.y + 1.0).abs() < 1e-12);
        assert!((g.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn converges_monotonically_to_constant_input() {
        let target = Vec3::new(0.3, -9.7, 1.2);
        let mut estimator = GravityEstimator::with_initial(GRAVITY_ALPHA, Vec3::new(5.0, 5.0, 5.0));

        let mut last_distance = f64::INFINITY;
        for _ in 0..200 {
            let distance = estimator.update(target).distance(&target);
            assert!(distance < last_distance);
            last_distance = distance;
        }
        assert!(last_distance < 1e-6);
    }

    #[test]
    fn reset_forgets_estimate() {
        let mut estimator = GravityEstimator::new();
        estimator.update(Vec3::new(1.0, 2.0, 3.0));
        estimator.reset();
        assert_eq!(estimator.estimate(), None);
    }
}
