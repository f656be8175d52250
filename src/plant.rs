use anyhow::Result;
use nalgebra::Vector4;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::{Damping, SimConfig};

// ------------------------------------------------------------
// Cart-pole plant: nonlinear dynamics + fixed-step RK4
//
// State vector x = (x1, x2, x3, x4):
//   x1  cart position (m)
//   x2  cart velocity (m/s)
//   x3  pole angle from vertical-down (rad), unwrapped
//   x4  pole angular velocity (rad/s)
// ------------------------------------------------------------

pub const GRAVITY: f64 = 9.8;

const DAMPING_RANGE: std::ops::Range<f64> = 0.05..0.15;

/// Parameters of the linearization about the inverted equilibrium,
/// exported for the controller so it never reaches into plant fields.
#[derive(Clone, Copy, Debug)]
pub struct LinearParams {
    pub k1: f64,
    pub k2: f64,
    /// Mass scaling the input force in the plant equations (the pole mass).
    pub pole_mass: f64,
    pub pole_length: f64,
    pub gravity: f64,
}

pub struct CartPole {
    pole_length: f64,
    pole_mass: f64,
    // Coupling coefficients derived from the masses and geometry.
    k1: f64,
    k2: f64,
    // Friction coefficients for cart translation and pole rotation.
    bm: f64,
    bp: f64,
    dt: f64,
    state: Vector4<f64>,
    time: f64,
}

impl CartPole {
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;

        let (bm, bp) = draw_damping(config.damping);
        let k1 = (config.pole_mass * config.pole_length)
            / (config.cart_mass + config.pole_mass);
        let k2 = (config.pole_mass * config.pole_length)
            / (config.pole_mass * config.pole_length.powi(2) + config.pole_inertia);

        Ok(Self {
            pole_length: config.pole_length,
            pole_mass: config.pole_mass,
            k1,
            k2,
            bm,
            bp,
            dt: config.timestep,
            state: config.initial_state,
            time: 0.0,
        })
    }

    pub fn state(&self) -> Vector4<f64> {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> f64 {
        self.dt
    }

    /// The (cart, pole) friction coefficients drawn at construction.
    pub fn damping(&self) -> (f64, f64) {
        (self.bm, self.bp)
    }

    pub fn linearization(&self) -> LinearParams {
        LinearParams {
            k1: self.k1,
            k2: self.k2,
            pole_mass: self.pole_mass,
            pole_length: self.pole_length,
            gravity: GRAVITY,
        }
    }

    /// Right-hand side of the equations of motion. Pure in `state` and `u`;
    /// the member fields only provide parameters.
    ///
    /// The common denominator 1 - k1*k2*cos²(x3) vanishes for some mass
    /// configurations; no guard is applied, a near-singular state produces
    /// an extreme derivative that the caller observes directly.
    pub fn state_derivative(&self, state: &Vector4<f64>, u: f64) -> Vector4<f64> {
        let x2 = state[1];
        let x3 = state[2];
        let x4 = state[3];

        let (k1, k2) = (self.k1, self.k2);
        let ml = self.pole_mass * self.pole_length;
        let denom = 1.0 - k1 * k2 * x3.cos().powi(2);

        let x1_dot = x2;
        let x2_dot = (k1 / denom)
            * (0.5 * k2 * GRAVITY * (2.0 * x3).sin() + x3.sin() * x4.powi(2)
                - u / ml
                - self.bm * x2 / ml);
        let x3_dot = x4;
        let x4_dot = (k2 / denom)
            * (-0.5 * k1 * (2.0 * x3).sin() * x4.powi(2) - GRAVITY * x3.sin()
                + k1 * x3.cos() * u / ml
                - self.bp * x4);

        Vector4::new(x1_dot, x2_dot, x3_dot, x4_dot)
    }

    /// Advance state and clock by one step of classical RK4. The force `u`
    /// is held constant across all four stages (zero-order hold).
    pub fn advance(&mut self, u: f64) {
        let dt = self.dt;
        let rk1 = self.state_derivative(&self.state, u);
        let rk2 = self.state_derivative(&(self.state + rk1 * (dt / 2.0)), u);
        let rk3 = self.state_derivative(&(self.state + rk2 * (dt / 2.0)), u);
        let rk4 = self.state_derivative(&(self.state + rk3 * dt), u);

        self.state += (rk1 + rk2 * 2.0 + rk3 * 2.0 + rk4) * (dt / 6.0);
        self.time += dt;
    }
}

fn draw_damping(damping: Damping) -> (f64, f64) {
    match damping {
        Damping::Fixed { cart, pole } => (cart, pole),
        Damping::Seeded(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            (
                rng.gen_range(DAMPING_RANGE),
                rng.gen_range(DAMPING_RANGE),
            )
        }
        Damping::FromEntropy => {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(DAMPING_RANGE),
                rng.gen_range(DAMPING_RANGE),
            )
        }
    }
}
