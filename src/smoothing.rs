// src/smoothing.rs - Constant-velocity Kalman filter for the palm position
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};

/// Kalman filter over `[x, y, vx, vy]`, observing position only.
pub struct KalmanFilter {
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    dt: f64,
}

impl KalmanFilter {
    pub fn new(dt: f64) -> Self {
        let mut process_noise = Matrix4::identity() * 1e-4;
        process_noise.fixed_view_mut::<2, 2>(2, 2).fill_diagonal(1e-3);

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity(),
            process_noise,
            measurement_noise: Matrix2::identity() * 4e-4,
            dt,
        }
    }

    pub fn seed(&mut self, position: Vector2<f64>) {
        self.state = Vector4::new(position.x, position.y, 0.0, 0.0);
        self.covariance = Matrix4::identity() * 0.01;
    }

    pub fn predict(&mut self) {
        let mut f = Matrix4::identity();
        f.fixed_view_mut::<2, 2>(0, 2).fill_diagonal(self.dt);

        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    pub fn update(&mut self, measurement: Vector2<f64>) {
        let mut h = Matrix2x4::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        let y = measurement - (h * self.state);
        let s = h * self.covariance * h.transpose() + self.measurement_noise;

        // A singular innovation covariance means the filter has diverged;
        // fall back to the raw measurement.
        let Some(s_inv) = s.try_inverse() else {
            self.seed(measurement);
            return;
        };
        let k = self.covariance * h.transpose() * s_inv;

        self.state += k * y;
        self.covariance = (Matrix4::identity() - k * h) * self.covariance;
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.state[0], self.state[1])
    }
}

/// Palm-centre smoother that restarts whenever the hand is lost.
pub struct PalmSmoother {
    filter: KalmanFilter,
    primed: bool,
}

impl Default for PalmSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl PalmSmoother {
    pub fn new() -> Self {
        Self {
            filter: KalmanFilter::new(1.0 / 30.0),
            primed: false,
        }
    }

    pub fn update(&mut self, measurement: Vector2<f64>) -> Vector2<f64> {
        if !self.primed {
            self.filter.seed(measurement);
            self.primed = true;
            return measurement;
        }
        self.filter.predict();
        self.filter.update(measurement);
        self.filter.position()
    }

    pub fn reset(&mut self) {
        self.primed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut smoother = PalmSmoother::new();
        let p = Vector2::new(0.3, 0.7);
        assert_eq!(smoother.update(p), p);
    }

    #[test]
    fn converges_on_a_still_hand() {
        let mut smoother = PalmSmoother::new();
        let target = Vector2::new(0.6, 0.4);
        smoother.update(Vector2::new(0.2, 0.2));
        let mut out = Vector2::zeros();
        for _ in 0..200 {
            out = smoother.update(target);
        }
        assert!((out - target).norm() < 1e-3, "ended at {:?}", out);
    }

    #[test]
    fn damps_single_frame_spike() {
        let mut smoother = PalmSmoother::new();
        let rest = Vector2::new(0.5, 0.5);
        for _ in 0..30 {
            smoother.update(rest);
        }
        let out = smoother.update(Vector2::new(0.9, 0.5));
        assert!(out.x < 0.9 && out.x > 0.5);
    }

    #[test]
    fn reset_reseeds_on_next_sample() {
        let mut smoother = PalmSmoother::new();
        smoother.update(Vector2::new(0.1, 0.1));
        smoother.reset();
        let p = Vector2::new(0.8, 0.8);
        assert_eq!(smoother.update(p), p);
    }
}
