use std::f64::consts::PI;

// ------------------------------------------------------------
// Swing-up reference trajectory
//
// A cubic envelope p(t) = -2t³/η³ + 3t²/η² ramps the target angle
// from 0 (hanging) to π (inverted) over the window [0, η], modulated
// by cos(2πk·t/η) for excitation shaping. The first and second time
// derivatives are the closed-form derivatives of that product; the
// controller feeds the acceleration straight into its feedforward
// term, so they must be exact, not differenced.
// ------------------------------------------------------------

pub struct SwingUpTrajectory {
    /// Window duration eta (s).
    eta: f64,
    /// Excitation wavenumber.
    k: f64,
}

impl SwingUpTrajectory {
    pub fn new(eta: f64, k: f64) -> Self {
        Self { eta, k }
    }

    /// Reference (theta, theta_dot, theta_ddot) at the given time.
    /// Time is assumed non-negative and non-decreasing across calls.
    /// From t = eta onward the reference is pinned at (π, 0, 0).
    pub fn reference(&self, time: f64) -> (f64, f64, f64) {
        let (eta, k) = (self.eta, self.k);
        if time >= eta {
            return (PI, 0.0, 0.0);
        }

        let t = time;
        let phase = (2.0 * PI * k * t) / eta;
        let (sin_p, cos_p) = phase.sin_cos();

        let theta =
            (-2.0 * t.powi(3) / eta.powi(3) + 3.0 * t.powi(2) / eta.powi(2)) * PI * cos_p;
        let theta_dot = (-6.0 * t.powi(2) / eta.powi(3) + 6.0 * t / eta.powi(2)) * PI * cos_p
            + (2.0 * t.powi(3) / eta.powi(3) - 3.0 * t.powi(2) / eta.powi(2))
                * (2.0 * PI.powi(2) * k / eta)
                * sin_p;
        let theta_ddot = (8.0 * PI.powi(3) * k.powi(2) * t.powi(3) / eta.powi(5)
            - 12.0 * PI.powi(3) * k.powi(2) * t.powi(2) / eta.powi(4)
            - 12.0 * PI * t / eta.powi(3)
            + 6.0 * PI / eta.powi(2))
            * cos_p
            + (12.0 * t.powi(2) / eta.powi(3) - 12.0 * t / eta.powi(2))
                * (2.0 * PI.powi(2) * k / eta)
                * sin_p;

        (theta, theta_dot, theta_ddot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_setpoint_is_exact_at_and_past_the_window() {
        let traj = SwingUpTrajectory::new(8.0, 0.0);
        assert_eq!(traj.reference(8.0), (PI, 0.0, 0.0));
        assert_eq!(traj.reference(8.0 + 1e-9), (PI, 0.0, 0.0));
        assert_eq!(traj.reference(1e6), (PI, 0.0, 0.0));
    }

    #[test]
    fn starts_from_rest_at_the_hanging_position() {
        let traj = SwingUpTrajectory::new(8.0, 0.0);
        let (theta, theta_dot, _) = traj.reference(0.0);
        assert_eq!(theta, 0.0);
        assert_eq!(theta_dot, 0.0);
    }

    #[test]
    fn midpoint_shows_monotonic_swing_progress() {
        let traj = SwingUpTrajectory::new(8.0, 0.0);
        let (theta, theta_dot, _) = traj.reference(4.0);
        assert!(theta > 0.0 && theta < PI, "theta = {}", theta);
        assert!(theta_dot > 0.0, "theta_dot = {}", theta_dot);
        // The cubic envelope puts the midpoint exactly halfway up.
        assert!((theta - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn analytic_derivatives_match_finite_differences() {
        let h = 1e-5;
        for k in [0.0, 1.0, 2.5] {
            let traj = SwingUpTrajectory::new(8.0, k);
            let mut t = 0.1;
            while t < 7.9 {
                let (_, dot, ddot) = traj.reference(t);
                let (th_m, dot_m, _) = traj.reference(t - h);
                let (th_p, dot_p, _) = traj.reference(t + h);

                let fd_dot = (th_p - th_m) / (2.0 * h);
                let fd_ddot = (dot_p - dot_m) / (2.0 * h);
                assert!(
                    (dot - fd_dot).abs() < 1e-4,
                    "k={} t={}: theta_dot {} vs fd {}",
                    k,
                    t,
                    dot,
                    fd_dot
                );
                assert!(
                    (ddot - fd_ddot).abs() < 1e-4,
                    "k={} t={}: theta_ddot {} vs fd {}",
                    k,
                    t,
                    ddot,
                    fd_ddot
                );
                t += 0.1;
            }
        }
    }

    #[test]
    fn envelope_reaches_pi_with_zero_rate_approaching_the_boundary() {
        let traj = SwingUpTrajectory::new(8.0, 0.0);
        let (theta, theta_dot, _) = traj.reference(8.0 - 1e-7);
        assert!((theta - PI).abs() < 1e-10);
        assert!(theta_dot.abs() < 1e-5);
    }
}
