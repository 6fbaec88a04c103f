//! Post-session charts
//!
//! Renders the monitor's rolling buffer as two stacked time series (raw EMG
//! on top, muscle activity below) into a PNG. Rendering needs the `plot`
//! feature; without it the caller gets [`PlotError::Unavailable`] and the
//! user gets instructions instead of a chart.

use crate::config::PlotSettings;
use crate::samples::SampleBuffer;
use chrono::Local;
use colored::Colorize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("plotting support was not compiled in")]
    Unavailable,

    #[error("nothing to plot")]
    NoSamples,

    #[error("cannot create plot directory {path}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render chart: {0}")]
    Render(String),
}

/// Where the next chart will be written
pub fn output_path(settings: &PlotSettings) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    settings.output_dir.join(format!("emg_{}.png", timestamp))
}

/// Render `samples` to a timestamped PNG under the configured directory
pub fn render(samples: &SampleBuffer, settings: &PlotSettings) -> Result<PathBuf, PlotError> {
    if samples.is_empty() {
        return Err(PlotError::NoSamples);
    }
    if !cfg!(feature = "plot") {
        return Err(PlotError::Unavailable);
    }

    std::fs::create_dir_all(&settings.output_dir).map_err(|source| PlotError::OutputDir {
        path: settings.output_dir.clone(),
        source,
    })?;

    let path = output_path(settings);
    draw(samples, &path, settings)?;
    Ok(path)
}

/// Render and report to the user. Never fails: an unavailable or broken
/// plotter degrades to a message.
pub fn show(samples: &SampleBuffer, settings: &PlotSettings) {
    match render(samples, settings) {
        Ok(path) => println!(
            "{} Plot saved to {}",
            "[OK]".green().bold(),
            path.display().to_string().white()
        ),
        Err(PlotError::NoSamples) => {}
        Err(PlotError::Unavailable) => {
            println!(
                "{} Plotting not available. Rebuild with: cargo build --features plot",
                "[WARNING]".yellow().bold()
            );
        }
        Err(e) => {
            log::warn!("Plot failed: {}", e);
            println!(
                "{} Could not draw the chart ({}). Check that a sans-serif font is installed.",
                "[WARNING]".yellow().bold(),
                e
            );
        }
    }
}

/// Padded axis range that is never empty
#[cfg(feature = "plot")]
fn axis_range(min: f64, max: f64) -> (f64, f64) {
    if max <= min || max.is_nan() {
        return (min - 1.0, min + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

#[cfg(feature = "plot")]
fn draw(samples: &SampleBuffer, path: &Path, settings: &PlotSettings) -> Result<(), PlotError> {
    draw_charts(samples, path, settings).map_err(|e| PlotError::Render(e.to_string()))
}

#[cfg(not(feature = "plot"))]
fn draw(_samples: &SampleBuffer, _path: &Path, _settings: &PlotSettings) -> Result<(), PlotError> {
    Err(PlotError::Unavailable)
}

#[cfg(feature = "plot")]
fn draw_charts(
    samples: &SampleBuffer,
    path: &Path,
    settings: &PlotSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    use plotters::prelude::*;

    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let (t_start, t_end) = samples.time_span().unwrap_or((0.0, 1.0));
    let (t_start, t_end) = if t_end > t_start {
        (t_start, t_end)
    } else {
        (t_start, t_start + 1.0)
    };

    let emg_min = samples.emg_values().min().unwrap_or(0) as f64;
    let emg_max = samples.emg_values().max().unwrap_or(0) as f64;
    let (emg_lo, emg_hi) = axis_range(emg_min, emg_max);

    let mut emg_chart = ChartBuilder::on(&panels[0])
        .caption("Raw EMG Signal", ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(t_start..t_end, emg_lo..emg_hi)?;

    emg_chart
        .configure_mesh()
        .y_desc("EMG Value")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    emg_chart.draw_series(LineSeries::new(
        samples.iter().map(|s| (s.time, s.emg as f64)),
        BLUE.stroke_width(1),
    ))?;

    let activity_max = samples
        .activity_values()
        .fold(100.0_f64, |acc, v| acc.max(v));
    let activity_min = samples
        .activity_values()
        .fold(0.0_f64, |acc, v| acc.min(v));

    let mut activity_chart = ChartBuilder::on(&panels[1])
        .caption("Muscle Activity", ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(t_start..t_end, activity_min..activity_max)?;

    activity_chart
        .configure_mesh()
        .x_desc("Time (seconds)")
        .y_desc("Activity (%)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    activity_chart.draw_series(LineSeries::new(
        samples.iter().map(|s| (s.time, s.activity)),
        RED.stroke_width(2),
    ))?;

    root.present()?;
    log::debug!("Rendered {} samples to {}", samples.len(), path.display());
    Ok(())
}
