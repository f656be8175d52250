use anyhow::{bail, Result};
use nalgebra::{Matrix4, Vector4};

// ------------------------------------------------------------
// Simulation configuration
// ------------------------------------------------------------

/// Source of the two friction coefficients (cart and pole).
/// Random draws are uniform in [0.05, 0.15).
#[derive(Clone, Copy, Debug)]
pub enum Damping {
    /// Use the given coefficients as-is.
    Fixed { cart: f64, pole: f64 },
    /// Draw both coefficients from a seeded generator (reproducible).
    Seeded(u64),
    /// Draw both coefficients from system entropy.
    FromEntropy,
}

/// All tunables for one simulation run. `Default` is the demo scenario:
/// 1 m / 1 kg pole with 0.5 kg·m² inertia on a 2 kg cart, 60 Hz steps,
/// an 8 s swing-up window and a 3000-tick budget.
///
/// The default LQR weights put nearly all the cost on the pole states.
/// The swing-up phase leaves the cart position and velocity wherever the
/// trajectory tracking pushed them, so the stabilizer must hold the pole
/// first and herd the cart back only gently; weighting the cart states
/// heavily commands forces large enough to throw the pole over.
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub pole_length: f64,
    pub pole_mass: f64,
    pub pole_inertia: f64,
    pub cart_mass: f64,
    pub initial_state: Vector4<f64>,
    pub timestep: f64,
    /// Swing-up window duration eta (s).
    pub swing_window: f64,
    /// Wavenumber of the excitation term superposed on the swing-up envelope.
    pub excitation_wavenumber: f64,
    /// Proportional gain on the reference angle error.
    pub kp: f64,
    /// Gain on the reference angular-velocity error (not an integral term).
    pub ki: f64,
    /// LQR state-cost weight.
    pub q: Matrix4<f64>,
    /// LQR control-cost weight (scalar, single input).
    pub r: f64,
    /// Stabilizing-force magnitude (N) below which the mode latch may
    /// fire. Keeps the linear feedback from engaging outside its basin.
    pub catch_threshold: f64,
    pub damping: Damping,
    /// Fixed iteration budget of the control loop.
    pub ticks: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pole_length: 1.0,
            pole_mass: 1.0,
            pole_inertia: 0.5,
            cart_mass: 2.0,
            initial_state: Vector4::zeros(),
            timestep: 0.016667,
            swing_window: 8.0,
            excitation_wavenumber: 0.0,
            kp: 1.0,
            ki: 1.0,
            q: Matrix4::from_diagonal(&Vector4::new(1e-7, 1e-5, 1e4, 1e2)),
            r: 1.0,
            catch_threshold: 20.0,
            damping: Damping::FromEntropy,
            ticks: 3000,
        }
    }
}

impl SimConfig {
    /// Fail-fast check of the physical and numerical parameters.
    pub fn validate(&self) -> Result<()> {
        if self.pole_length <= 0.0 {
            bail!("pole_length must be positive, got {}", self.pole_length);
        }
        if self.pole_mass <= 0.0 {
            bail!("pole_mass must be positive, got {}", self.pole_mass);
        }
        if self.pole_inertia <= 0.0 {
            bail!("pole_inertia must be positive, got {}", self.pole_inertia);
        }
        if self.cart_mass <= 0.0 {
            bail!("cart_mass must be positive, got {}", self.cart_mass);
        }
        if self.timestep <= 0.0 {
            bail!("timestep must be positive, got {}", self.timestep);
        }
        if self.swing_window <= 0.0 {
            bail!("swing_window must be positive, got {}", self.swing_window);
        }
        if self.excitation_wavenumber < 0.0 {
            bail!(
                "excitation_wavenumber must be non-negative, got {}",
                self.excitation_wavenumber
            );
        }
        if self.r <= 0.0 {
            bail!("control cost r must be positive, got {}", self.r);
        }
        if self.catch_threshold <= 0.0 {
            bail!(
                "catch_threshold must be positive, got {}",
                self.catch_threshold
            );
        }
        Ok(())
    }

    /// Fixed damping, useful wherever a reproducible run is needed.
    pub fn with_fixed_damping(mut self, cart: f64, pole: f64) -> Self {
        self.damping = Damping::Fixed { cart, pole };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_parameters() {
        let mut cfg = SimConfig::default();
        cfg.pole_length = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.cart_mass = -2.0;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.timestep = -0.01;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.r = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("control cost"));

        let mut cfg = SimConfig::default();
        cfg.catch_threshold = -1.0;
        assert!(cfg.validate().is_err());
    }
}
