//! `target-capture` CLI: rectify a quad from an image, or replay a capture scenario.

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use nalgebra::Point2;
use std::path::PathBuf;
use target_capture::convert::{load_frame, save_image, ConvertError};
use target_capture::core::{init as init_logging, LogSpec, RectifyError, LOG_ENV};
use target_capture::session::sim::{Scenario, ScenarioError};
use target_capture::session::ConfigError;
use target_capture::{Rectifier, RectifierParams};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("invalid --corners: {0}")]
    Corners(String),
    #[error("invalid --size {0:?}, expected WIDTHxHEIGHT")]
    Size(String),
    #[error(transparent)]
    Image(#[from] ConvertError),
    #[error(transparent)]
    Rectify(#[from] RectifyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

#[derive(Parser)]
#[command(name = "target-capture")]
#[command(about = "Capture perspective-corrected images of planar targets")]
#[command(version)]
struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rectify the quad given by four pixel corners.
    Rectify(RectifyArgs),
    /// Replay a synthetic capture scenario through the full session.
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
struct RectifyArgs {
    /// Input image.
    #[arg(long)]
    image: PathBuf,

    /// Corners as x0,y0,x1,y1,x2,y2,x3,y3: top-left, top-right, bottom-left, bottom-right.
    #[arg(long, allow_hyphen_values = true)]
    corners: String,

    /// Output image; the format follows the extension.
    #[arg(long)]
    out: PathBuf,

    /// Output size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1024x1024")]
    size: String,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Scenario JSON: a capture config plus the target placement.
    #[arg(long)]
    config: PathBuf,

    /// Frame shown on the camera background.
    #[arg(long)]
    image: PathBuf,

    /// Where to write the captured image.
    #[arg(long)]
    out: PathBuf,
}

fn parse_corners(raw: &str) -> Result<Vec<Point2<f64>>, CliError> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::Corners(e.to_string()))?;
    if values.len() != 8 {
        return Err(CliError::Corners(format!(
            "expected 8 numbers, got {}",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(2)
        .map(|xy| Point2::new(xy[0], xy[1]))
        .collect())
}

fn parse_size(raw: &str) -> Result<(usize, usize), CliError> {
    let bad = || CliError::Size(raw.to_string());
    let (w, h) = raw.split_once(['x', 'X']).ok_or_else(bad)?;
    let w: usize = w.trim().parse().map_err(|_| bad())?;
    let h: usize = h.trim().parse().map_err(|_| bad())?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}

fn run_rectify(args: RectifyArgs) -> Result<(), CliError> {
    let corners = parse_corners(&args.corners)?;
    let (output_width, output_height) = parse_size(&args.size)?;
    let frame = load_frame(&args.image)?;
    info!("loaded {}x{} {:?} frame", frame.width, frame.height, frame.format);

    let rectifier = Rectifier::new(RectifierParams {
        output_width,
        output_height,
        ..RectifierParams::default()
    });
    let rectified = rectifier.rectify(&frame.view(), &corners)?;
    save_image(&rectified.image, &args.out)?;

    println!(
        "rectified {}x{} region at ({}, {}) into {}",
        rectified.crop.width,
        rectified.crop.height,
        rectified.crop.x,
        rectified.crop.y,
        args.out.display()
    );
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<(), CliError> {
    let scenario = Scenario::load_json(&args.config)?;
    let frame = load_frame(&args.image)?;
    let result = scenario.run(frame)?;
    save_image(&result.image, &args.out)?;

    println!(
        "captured {} ({}x{}) into {}",
        result.target_id,
        result.image.width,
        result.image.height,
        args.out.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let spec = LogSpec::from_env(level).unwrap_or_else(|err| {
        eprintln!("{LOG_ENV}: {err}");
        LogSpec::new(level)
    });
    if let Err(err) = init_logging(spec) {
        eprintln!("logger: {err}");
    }

    let res = match cli.command {
        Commands::Rectify(args) => run_rectify(args),
        Commands::Simulate(args) => run_simulate(args),
    };
    if let Err(err) = res {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_need_eight_numbers() {
        let c = parse_corners("1,2, 3,4,5,6,7,8").expect("parse");
        assert_eq!(c[3], Point2::new(7.0, 8.0));
        assert!(matches!(parse_corners("1,2,3"), Err(CliError::Corners(_))));
        assert!(matches!(parse_corners("1,2,3,4,5,6,7,x"), Err(CliError::Corners(_))));
    }

    #[test]
    fn size_parses_width_by_height() {
        assert_eq!(parse_size("640x480").expect("size"), (640, 480));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("640").is_err());
    }
}
