use anyhow::Result;
use nalgebra::{Matrix1, Matrix1x4, Matrix4, Vector4};
use std::f64::consts::PI;

use crate::config::SimConfig;
use crate::lqr;
use crate::plant::{CartPole, LinearParams};
use crate::trajectory::SwingUpTrajectory;

// ------------------------------------------------------------
// Hybrid swing-up / stabilization controller
//
// During swing-up the nonlinear dynamics are inverted to track the
// reference trajectory; once the window has elapsed, the pole rate
// has settled and the stabilizing command is within actuator
// authority, the controller latches onto full-state linear feedback
// about the inverted equilibrium and never switches back.
// ------------------------------------------------------------

/// Pole angular rate below which the stabilizing feedback can take over.
const LATCH_RATE_THRESHOLD: f64 = 0.1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Swinging,
    Stabilizing,
}

/// One-way mode switch: once fired it stays in `Stabilizing` for the
/// life of the run, regardless of later state excursions.
#[derive(Debug)]
pub struct ModeLatch {
    mode: Mode,
}

impl ModeLatch {
    pub fn new() -> Self {
        Self {
            mode: Mode::Swinging,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_stabilizing(&self) -> bool {
        self.mode == Mode::Stabilizing
    }

    /// Permanently switch to `Stabilizing`.
    pub fn fire(&mut self) {
        self.mode = Mode::Stabilizing;
    }
}

impl Default for ModeLatch {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HybridController {
    trajectory: SwingUpTrajectory,
    lin: LinearParams,
    gain: Matrix1x4<f64>,
    kp: f64,
    ki: f64,
    eta: f64,
    catch_threshold: f64,
    latch: ModeLatch,
}

impl HybridController {
    /// Solves the LQR gain once, from the plant's linearization about
    /// the inverted equilibrium.
    pub fn new(plant: &CartPole, config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let lin = plant.linearization();
        let (a, b) = Self::linear_model(&lin);
        let gain = lqr::lqr_gain(&a, &b, &config.q, &Matrix1::new(config.r))?;

        Ok(Self {
            trajectory: SwingUpTrajectory::new(
                config.swing_window,
                config.excitation_wavenumber,
            ),
            lin,
            gain,
            kp: config.kp,
            ki: config.ki,
            eta: config.swing_window,
            catch_threshold: config.catch_threshold,
            latch: ModeLatch::new(),
        })
    }

    /// State-space model linearized about theta = π. The input enters
    /// with the same sign convention and pole-mass scaling as the plant
    /// equations.
    fn linear_model(lin: &LinearParams) -> (Matrix4<f64>, Vector4<f64>) {
        let LinearParams {
            k1,
            k2,
            pole_mass: m,
            pole_length: l,
            gravity: g,
        } = *lin;
        let d = 1.0 - k1 * k2;

        let a = Matrix4::new(
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, k1 * k2 * g / d, 0.0,
            0.0, 0.0, 0.0, 1.0,
            0.0, 0.0, k2 * g / d, 0.0,
        );
        let b = Vector4::new(
            0.0,
            -k1 / (m * l * d),
            0.0,
            -k1 * k2 / (m * l * d),
        );
        (a, b)
    }

    pub fn mode(&self) -> Mode {
        self.latch.mode()
    }

    pub fn gain(&self) -> Matrix1x4<f64> {
        self.gain
    }

    /// Scalar actuation force for the given state and elapsed time.
    /// The only side effect is firing the mode latch the first time the
    /// stabilization-readiness test holds.
    ///
    /// The swing-up law divides by cos(x3) and is singular with the
    /// pendulum horizontal; the non-finite force is returned as-is.
    pub fn compute_force(&mut self, state: &Vector4<f64>, time: f64) -> f64 {
        if self.latch.is_stabilizing() {
            return self.stabilizing_force(state);
        }

        // Readiness: window elapsed, pole rate settled, and the linear
        // feedback command within actuator authority. Engaging outside
        // that envelope would slam the pole out of the LQR basin.
        let candidate = self.stabilizing_force(state);
        let ready = time >= self.eta
            && state[3].abs() < LATCH_RATE_THRESHOLD
            && candidate.abs() <= self.catch_threshold;
        if !ready {
            return self.swing_up_force(state, time);
        }
        self.latch.fire();
        candidate
    }

    fn swing_up_force(&self, state: &Vector4<f64>, time: f64) -> f64 {
        let x3 = state[2];
        let x4 = state[3];
        let LinearParams {
            k1,
            k2,
            pole_mass,
            pole_length,
            gravity: g,
        } = self.lin;

        let (theta, theta_dot, theta_ddot) = self.trajectory.reference(time);
        // Commanded angular acceleration: feedforward plus feedback on
        // angle and angular-rate error (ki acts on the rate error).
        let v = theta_ddot + self.kp * (theta - x3) + self.ki * (theta_dot - x4);

        // With the pole-mass scaling the inversion is exact: the closed
        // angle dynamics reduce to x4' = v - (k2/D)*bp*x4.
        let ml = pole_mass * pole_length;
        let c1 = ml / (k1 * x3.cos());
        let c2 = ((1.0 - k1 * k2 * x3.cos().powi(2)) / k2) * v;
        let c3 = 0.5 * k1 * (2.0 * x3).sin() * x4.powi(2);
        let c4 = g * x3.sin();
        c1 * (c2 + c3 + c4)
    }

    fn stabilizing_force(&self, state: &Vector4<f64>) -> f64 {
        let shifted = Vector4::new(state[0], state[1], state[2] - PI, state[3]);
        -(self.gain * shifted)[(0, 0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn controller() -> HybridController {
        let cfg = SimConfig::default().with_fixed_damping(0.1, 0.1);
        let plant = CartPole::new(&cfg).unwrap();
        HybridController::new(&plant, &cfg).unwrap()
    }

    #[test]
    fn latch_fires_once_and_never_reverts() {
        let mut latch = ModeLatch::new();
        assert_eq!(latch.mode(), Mode::Swinging);
        latch.fire();
        assert_eq!(latch.mode(), Mode::Stabilizing);
        latch.fire();
        assert_eq!(latch.mode(), Mode::Stabilizing);
    }

    #[test]
    fn starts_in_swing_up_before_the_window_elapses() {
        let mut ctrl = controller();
        let state = Vector4::new(0.0, 0.0, 0.5, 1.0);
        ctrl.compute_force(&state, 1.0);
        assert_eq!(ctrl.mode(), Mode::Swinging);
    }

    #[test]
    fn does_not_latch_while_the_pole_is_still_moving() {
        let mut ctrl = controller();
        let state = Vector4::new(0.0, 0.0, PI, 2.0);
        ctrl.compute_force(&state, 9.0);
        assert_eq!(ctrl.mode(), Mode::Swinging);
    }

    #[test]
    fn latch_defers_until_the_stabilizing_command_is_within_authority() {
        let mut ctrl = controller();
        // Rate settled, but the pole is still half a radian from
        // inverted: the linear feedback would command a force far past
        // the engagement threshold, so the controller keeps swinging.
        let far = Vector4::new(0.0, 0.0, 2.6, 0.05);
        ctrl.compute_force(&far, 9.0);
        assert_eq!(ctrl.mode(), Mode::Swinging);

        // Settled close to the equilibrium: the command is small and
        // the latch fires.
        let near = Vector4::new(0.0, 0.0, 3.1, 0.01);
        ctrl.compute_force(&near, 9.1);
        assert_eq!(ctrl.mode(), Mode::Stabilizing);
    }

    #[test]
    fn latched_controller_uses_linear_feedback_for_any_later_state() {
        let mut ctrl = controller();
        // Window elapsed, pole rate settled: latch fires.
        let near_inverted = Vector4::new(0.0, 0.0, PI, 0.05);
        ctrl.compute_force(&near_inverted, 9.0);
        assert_eq!(ctrl.mode(), Mode::Stabilizing);

        // Re-enter the pre-fire condition (fast pole, early-looking time):
        // the stabilizing law must still apply.
        let excursion = Vector4::new(0.3, -0.1, 2.0, 5.0);
        let u = ctrl.compute_force(&excursion, 9.1);
        assert_eq!(ctrl.mode(), Mode::Stabilizing);

        let k = ctrl.gain();
        let shifted = Vector4::new(0.3, -0.1, 2.0 - PI, 5.0);
        let expected = -(k * shifted)[(0, 0)];
        assert_eq!(u, expected);
    }

    #[test]
    fn swing_up_force_matches_the_inversion_formula() {
        let mut ctrl = controller();
        let state = Vector4::new(0.1, 0.2, 0.8, -0.3);
        let time = 2.0;
        let u = ctrl.compute_force(&state, time);

        let (k1, k2, g) = (1.0 / 3.0, 2.0 / 3.0, 9.8);
        let (m, l) = (1.0, 1.0);
        let traj = SwingUpTrajectory::new(8.0, 0.0);
        let (theta, theta_dot, theta_ddot) = traj.reference(time);
        let v = theta_ddot + (theta - state[2]) + (theta_dot - state[3]);
        let c1 = (m * l) / (k1 * state[2].cos());
        let c2 = ((1.0 - k1 * k2 * state[2].cos().powi(2)) / k2) * v;
        let c3 = 0.5 * k1 * (2.0 * state[2]).sin() * state[3].powi(2);
        let c4 = g * state[2].sin();
        assert!((u - c1 * (c2 + c3 + c4)).abs() < 1e-12);
    }

    #[test]
    fn horizontal_pole_produces_an_unusable_force() {
        let mut ctrl = controller();
        // cos(π/2) rounds to ~6e-17 in f64, so the inversion either
        // overflows to infinity or blows up far past any physical scale.
        let state = Vector4::new(0.0, 0.0, PI / 2.0, 0.5);
        let u = ctrl.compute_force(&state, 1.0);
        assert!(
            !u.is_finite() || u.abs() > 1e12,
            "expected a clearly out-of-range force, got {}",
            u
        );
    }
}
