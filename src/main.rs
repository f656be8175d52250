// ------------------------------------------------------------
// Cart-pole swing-up demo
//
// Drives the pendulum from hanging rest to the inverted equilibrium:
// feedback-linearizing trajectory tracking for the first 8 seconds,
// then a one-way switch to LQR full-state feedback.
//
// Loop per tick: read state -> render -> compute force -> advance.
// Runs for a fixed 3000-tick budget at 60 Hz, or until the window
// is closed.
//
// Outputs:
//   output/cartpole_swingup/*.png    state and force plots
//   output/cartpole_swingup/trajectory.csv
//
// Run with --headless to skip the live window.
// ------------------------------------------------------------

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use cartpole_swingup::{CartPole, CartPoleView, HybridController, History, SimConfig};

fn main() -> Result<()> {
    let headless = std::env::args().any(|a| a == "--headless");

    let config = SimConfig::default();
    let mut plant = CartPole::new(&config)?;
    let mut controller = HybridController::new(&plant, &config)?;
    let (bm, bp) = plant.damping();
    println!("Damping draw: cart {:.4}, pole {:.4}", bm, bp);

    let mut view = if headless {
        None
    } else {
        Some(CartPoleView::new()?)
    };

    let mut history = History::with_capacity(config.ticks);
    for tick in 0..config.ticks {
        let time = plant.time();
        let state = plant.state();

        if let Some(v) = view.as_mut() {
            if !v.step_render(state[0], state[2])? {
                println!("Window closed, stopping at tick {}", tick);
                break;
            }
        }

        let u = controller.compute_force(&state, time);
        history.push(time, &state, u);
        plant.advance(u);

        if tick % 600 == 0 {
            println!(
                "tick {}/{}  t={:.2}  x={:.3}  theta={:.3}  u={:.2}  mode={:?}",
                tick,
                config.ticks,
                time,
                state[0],
                state[2],
                u,
                controller.mode()
            );
        }
    }

    let out_dir = PathBuf::from("output").join("cartpole_swingup");
    fs::create_dir_all(&out_dir).context("Failed to create output directory")?;

    println!("Saving plots and CSV...");
    cartpole_swingup::report::save_plots(&out_dir, &history)?;
    cartpole_swingup::report::write_csv(&out_dir.join("trajectory.csv"), &history)?;

    println!("Done. Results are in: {}", out_dir.display());
    Ok(())
}
