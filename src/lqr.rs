use anyhow::{bail, Result};
use nalgebra::{Matrix1, Matrix1x4, Matrix4, Vector4};

// ------------------------------------------------------------
// Continuous-time LQR gain for a single-input 4-state system
//
// The algebraic Riccati equation
//   AᵀP + PA - P B R⁻¹ Bᵀ P + Q = 0
// is solved by integrating the Riccati ODE backwards in time with
// RK4 from P(T) = Q until the iterates settle; the gain is then
// K = R⁻¹ Bᵀ P.
// ------------------------------------------------------------

const TIME_STEP: f64 = 1e-3;
const TOLERANCE: f64 = 1e-9;
// Weightings that barely penalize some states leave slow closed-loop
// poles, and the integration horizon has to outlast the slowest of them.
const MAX_ITER: usize = 4_000_000;

fn riccati_rhs(
    p: &Matrix4<f64>,
    a: &Matrix4<f64>,
    b: &Vector4<f64>,
    q: &Matrix4<f64>,
    r_inv: &Matrix1<f64>,
) -> Matrix4<f64> {
    -(a.transpose() * p + p * a - p * b * r_inv * b.transpose() * p + q)
}

fn riccati_rk4(
    p: &Matrix4<f64>,
    h: f64,
    a: &Matrix4<f64>,
    b: &Vector4<f64>,
    q: &Matrix4<f64>,
    r_inv: &Matrix1<f64>,
) -> Matrix4<f64> {
    let k1 = riccati_rhs(p, a, b, q, r_inv);
    let k2 = riccati_rhs(&(p + k1 * (h / 2.0)), a, b, q, r_inv);
    let k3 = riccati_rhs(&(p + k2 * (h / 2.0)), a, b, q, r_inv);
    let k4 = riccati_rhs(&(p + k3 * h), a, b, q, r_inv);
    p + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// Stabilizing solution of the continuous-time algebraic Riccati equation.
pub fn solve_care(
    a: &Matrix4<f64>,
    b: &Vector4<f64>,
    q: &Matrix4<f64>,
    r: &Matrix1<f64>,
) -> Result<Matrix4<f64>> {
    let r_inv = match r.try_inverse() {
        Some(inv) => inv,
        None => bail!("control cost R is singular"),
    };

    let mut p = *q;
    for _ in 0..MAX_ITER {
        // Reverse-time integration step.
        let next = riccati_rk4(&p, -TIME_STEP, a, b, q, &r_inv);
        if !next.iter().all(|v| v.is_finite()) {
            bail!("Riccati iteration diverged");
        }
        if (next - p).norm() < TOLERANCE {
            return Ok(next);
        }
        p = next;
    }
    bail!("Riccati iteration did not converge within {} steps", MAX_ITER)
}

/// LQR feedback gain K such that u = -K x stabilizes x' = Ax + Bu.
/// Fails if the Riccati solve does not converge or the closed loop
/// A - BK has an eigenvalue in the right half plane.
pub fn lqr_gain(
    a: &Matrix4<f64>,
    b: &Vector4<f64>,
    q: &Matrix4<f64>,
    r: &Matrix1<f64>,
) -> Result<Matrix1x4<f64>> {
    let p = solve_care(a, b, q, r)?;
    let r_inv = match r.try_inverse() {
        Some(inv) => inv,
        None => bail!("control cost R is singular"),
    };
    let k = r_inv * b.transpose() * p;

    let closed_loop = a - b * k;
    let eigenvalues = closed_loop.schur().complex_eigenvalues();
    for ev in eigenvalues.iter() {
        if ev.re >= 0.0 {
            bail!(
                "closed loop is not stable: eigenvalue {} + {}i",
                ev.re,
                ev.im
            );
        }
    }
    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Linearization of the default cart-pole about the inverted
    // equilibrium (see HybridController::linear_model).
    fn default_model() -> (Matrix4<f64>, Vector4<f64>) {
        let (k1, k2, g) = (1.0 / 3.0, 2.0 / 3.0, 9.8);
        let (m, l) = (1.0, 1.0);
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

    #[test]
    fn care_residual_vanishes_for_the_default_plant() {
        let (a, b) = default_model();
        let q = Matrix4::identity();
        let r = Matrix1::new(0.001);
        let p = solve_care(&a, &b, &q, &r).unwrap();

        let r_inv = r.try_inverse().unwrap();
        let residual = a.transpose() * p + p * a - p * b * r_inv * b.transpose() * p + q;
        assert!(
            residual.norm() < 1e-4,
            "CARE residual norm = {}",
            residual.norm()
        );
        // The stabilizing solution is symmetric.
        assert!((p - p.transpose()).norm() < 1e-6);
    }

    #[test]
    fn gain_places_all_closed_loop_poles_in_the_left_half_plane() {
        let (a, b) = default_model();
        let k = lqr_gain(&a, &b, &Matrix4::identity(), &Matrix1::new(0.001)).unwrap();
        assert!(k.iter().all(|v| v.is_finite()));

        let closed_loop = a - b * k;
        for ev in closed_loop.schur().complex_eigenvalues().iter() {
            assert!(ev.re < 0.0, "unstable pole {} + {}i", ev.re, ev.im);
        }
    }

    #[test]
    fn pole_priority_weights_leave_the_cart_gains_gentle() {
        let (a, b) = default_model();
        let q = Matrix4::from_diagonal(&Vector4::new(1e-7, 1e-5, 1e4, 1e2));
        let k = lqr_gain(&a, &b, &q, &Matrix1::new(1.0)).unwrap();

        // The cart can be tens of meters out after swing-up; the feedback
        // on it must stay within a few newtons there while the angle
        // feedback stays strong enough to dominate gravity.
        assert!(k[0].abs() < 0.01, "cart position gain {}", k[0]);
        assert!(k[1].abs() < 0.5, "cart velocity gain {}", k[1]);
        assert!(k[2].abs() > 50.0, "pole angle gain {}", k[2]);
    }

    #[test]
    fn singular_control_cost_is_rejected() {
        let (a, b) = default_model();
        assert!(lqr_gain(&a, &b, &Matrix4::identity(), &Matrix1::new(0.0)).is_err());
    }
}
