// ------------------------------------------------------------
// Cart-pole swing-up and stabilization
//
// Core components:
//   - plant:       nonlinear cart-pole dynamics, fixed-step RK4
//   - trajectory:  smooth swing-up reference (angle, rate, accel)
//   - controller:  feedback-linearizing swing-up, then LQR catch
//   - lqr:         continuous-time Riccati solve for the gain
//
// Presentation (minifb window, plotters plots, CSV log) consumes
// plant state and never feeds back into it.
// ------------------------------------------------------------

pub mod config;
pub mod controller;
pub mod graphics;
pub mod lqr;
pub mod plant;
pub mod report;
pub mod trajectory;

pub use config::{Damping, SimConfig};
pub use controller::{HybridController, Mode};
pub use graphics::CartPoleView;
pub use plant::CartPole;
pub use report::History;
pub use trajectory::SwingUpTrajectory;
