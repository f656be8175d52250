use anyhow::{Context, Result};
use nalgebra::Vector4;
use plotters::prelude::*;
use std::f64::consts::PI;
use std::path::Path;

// ------------------------------------------------------------
// Offline reporting: per-tick history, line plots, CSV log
// ------------------------------------------------------------

/// Parallel per-tick sequences accumulated by the control loop.
#[derive(Default)]
pub struct History {
    pub time: Vec<f64>,
    pub x1: Vec<f64>,
    pub x2: Vec<f64>,
    pub x3: Vec<f64>,
    pub x4: Vec<f64>,
    pub force: Vec<f64>,
}

impl History {
    pub fn with_capacity(ticks: usize) -> Self {
        Self {
            time: Vec::with_capacity(ticks),
            x1: Vec::with_capacity(ticks),
            x2: Vec::with_capacity(ticks),
            x3: Vec::with_capacity(ticks),
            x4: Vec::with_capacity(ticks),
            force: Vec::with_capacity(ticks),
        }
    }

    pub fn push(&mut self, time: f64, state: &Vector4<f64>, force: f64) {
        self.time.push(time);
        self.x1.push(state[0]);
        self.x2.push(state[1]);
        self.x3.push(state[2]);
        self.x4.push(state[3]);
        self.force.push(force);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

// Line plot of a state series against its constant target.
fn save_tracking_plot_png(
    filename: &Path,
    title: &str,
    ylabel: &str,
    t: &[f64],
    y: &[f64],
    target: Option<f64>,
) -> Result<()> {
    if t.len() != y.len() {
        anyhow::bail!("Plot error: time and series must have the same length.");
    }
    if t.is_empty() {
        anyhow::bail!("Plot error: empty series.");
    }

    // High resolution output (suitable for ~300 DPI usage when printed).
    let (w, h) = (2400u32, 1800u32);

    let xmin = t[0];
    let xmax = t[t.len() - 1];
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for &v in y.iter().chain(target.iter()) {
        if v.is_finite() {
            ymin = ymin.min(v);
            ymax = ymax.max(v);
        }
    }
    if ymin > ymax {
        anyhow::bail!("Plot error: series has no finite values.");
    }
    let ypad = 0.05 * (ymax - ymin).abs().max(1e-9);
    ymin -= ypad;
    ymax += ypad;

    let root = BitMapBackend::new(filename, (w, h)).into_drawing_area();
    root.fill(&RGBColor(255, 255, 255))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 76))
        .x_label_area_size(110)
        .y_label_area_size(140)
        .build_cartesian_2d(xmin..xmax, ymin..ymax)?;

    chart
        .configure_mesh()
        .x_desc("time (s)")
        .y_desc(ylabel)
        .axis_desc_style(("sans-serif", 60))
        .label_style(("sans-serif", 44))
        .x_labels(10)
        .y_labels(10)
        .x_label_formatter(&|v| format!("{:.1}", v))
        .y_label_formatter(&|v| format!("{:.1}", v))
        .bold_line_style(RGBColor(160, 160, 160).stroke_width(2))
        .light_line_style(RGBColor(220, 220, 220).stroke_width(1))
        .draw()?;

    if let Some(target) = target {
        let target_color = RGBColor(220, 120, 30);
        chart
            .draw_series(LineSeries::new(
                t.iter().map(|&tv| (tv, target)),
                target_color.stroke_width(3),
            ))?
            .label("target")
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 40, y)], target_color.stroke_width(3))
            });
    }

    let state_color = RGBColor(30, 90, 200);
    chart
        .draw_series(LineSeries::new(
            t.iter().copied().zip(y.iter().copied()),
            state_color.stroke_width(4),
        ))?
        .label("state")
        .legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 40, y)], state_color.stroke_width(4))
        });

    chart
        .configure_series_labels()
        .background_style(RGBColor(255, 255, 255).mix(0.8))
        .border_style(RGBColor(120, 120, 120))
        .label_font(("sans-serif", 48))
        .draw()?;

    root.present()?;
    Ok(())
}

pub fn save_plots(out_dir: &Path, history: &History) -> Result<()> {
    let t = &history.time;
    save_tracking_plot_png(
        &out_dir.join("cart_position.png"),
        "Cart Position x1(t)",
        "x1 (m)",
        t,
        &history.x1,
        Some(0.0),
    )?;
    save_tracking_plot_png(
        &out_dir.join("cart_velocity.png"),
        "Cart Velocity x2(t)",
        "x2 (m/s)",
        t,
        &history.x2,
        Some(0.0),
    )?;
    save_tracking_plot_png(
        &out_dir.join("pole_angle.png"),
        "Pole Angle x3(t) (0 = hanging)",
        "x3 (rad)",
        t,
        &history.x3,
        Some(PI),
    )?;
    save_tracking_plot_png(
        &out_dir.join("pole_rate.png"),
        "Pole Angular Velocity x4(t)",
        "x4 (rad/s)",
        t,
        &history.x4,
        Some(0.0),
    )?;
    save_tracking_plot_png(
        &out_dir.join("control_force.png"),
        "Control Force u(t)",
        "u (N)",
        t,
        &history.force,
        None,
    )?;
    Ok(())
}

pub fn write_csv(filename: &Path, history: &History) -> Result<()> {
    let mut wtr = csv::Writer::from_path(filename)
        .with_context(|| format!("CSV: cannot open {}", filename.display()))?;

    wtr.write_record(["t", "x1", "x2", "x3", "x4", "u"])?;
    for i in 0..history.len() {
        wtr.write_record([
            history.time[i].to_string(),
            history.x1[i].to_string(),
            history.x2[i].to_string(),
            history.x3[i].to_string(),
            history.x4[i].to_string(),
            history.force[i].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
