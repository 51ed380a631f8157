//! vimba-helpers - capture and stream frames from Allied Vision cameras
//!
//! Runs against the simulated backend unless built with the `vimba` feature
//! and started with `--backend vimba`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use image::RgbImage;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vimba_helpers::camera::{camera_ids, Driver};
use vimba_helpers::config::Settings;
use vimba_helpers::feature::FeatureValue;
use vimba_helpers::instance::{Callback, CameraInstance};
use vimba_helpers::sim::SimDriver;



#[derive(Parser)]
#[command(name = "vimba-helpers")]
#[command(about = "Capture and stream frames from Vimba cameras")]
#[command(version)]
struct Cli {
    /// Camera SDK to drive
    #[arg(long, value_enum, default_value = "sim")]
    backend: Backend,

    /// Settings file (defaults to ./vimba-helpers.toml if present)
    #[arg(long, env = "VIMBA_HELPERS_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Sim,
    Vimba,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CallbackKind {
    /// Timestamp-named JPEGs
    Export,
    /// 1.jpg, 2.jpg, ...
    Counter,
    /// Live view
    Display,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SDK version
    Version,

    /// List visible cameras
    List,

    /// List the features of a camera
    Features {
        camera: String,
    },

    /// Show the value and range of a feature
    Info {
        camera: String,
        name: String,
    },

    /// Set one or more features
    Set {
        camera: String,

        /// Assignments of the form name=value
        #[arg(required = true, value_parser = parse_assignment)]
        features: Vec<(String, FeatureValue)>,

        /// Log old and new values
        #[arg(long)]
        verbose: bool,
    },

    /// Capture a single frame
    Grab {
        camera: String,

        /// Output directory
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// File name (defaults to the current time)
        #[arg(short, long)]
        filename: Option<String>,

        /// Feature to set before capturing, as name=value
        #[arg(long = "set", value_parser = parse_assignment)]
        features: Vec<(String, FeatureValue)>,
    },

    /// Stream frames for a duration or up to a frame count
    Stream {
        camera: String,

        /// Seconds to stream for
        #[arg(long, conflicts_with = "frames", required_unless_present = "frames")]
        duration: Option<f64>,

        /// Number of frames to keep
        #[arg(long)]
        frames: Option<u64>,

        /// Number of frame buffers
        #[arg(long)]
        buffer: Option<usize>,

        #[arg(long, value_enum, default_value = "export")]
        callback: CallbackKind,

        /// Output directory
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Feature to set before streaming, as name=value
        #[arg(long = "set", value_parser = parse_assignment)]
        features: Vec<(String, FeatureValue)>,
    },
}

fn parse_assignment(s: &str) -> std::result::Result<(String, FeatureValue), String> {
    let (name, value) = s.split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;

    if name.is_empty() {
        return Err(format!("missing feature name in '{s}'"));
    }

    Ok((name.to_string(), FeatureValue::parse_literal(value)))
}



fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.into()),
        )
        .init();

    let settings = Settings::discover(cli.config.as_deref())?;

    match cli.backend {
        Backend::Sim => run(&SimDriver::single(), cli.command, &settings),
        Backend::Vimba => run_vimba(cli.command, &settings),
    }
}

#[cfg(feature = "vimba")]
fn run_vimba(command: Commands, settings: &Settings) -> Result<()> {
    let vimba = vimba_helpers::Vimba::new().context("could not start the Vimba API")?;
    run(&vimba, command, settings)
}

#[cfg(not(feature = "vimba"))]
fn run_vimba(_command: Commands, _settings: &Settings) -> Result<()> {
    bail!("this build has no Vimba support; rebuild with --features vimba")
}

fn run<D: Driver>(driver: &D, command: Commands, settings: &Settings) -> Result<()> {
    let instance = |id, path| open_instance(driver, settings, id, path);

    match command {
        Commands::Version => {
            println!("{}", driver.version()?);
        }
        Commands::List => {
            for info in driver.list_cameras()? {
                println!("{}\t{}\t{}\t{}", info.id, info.model_name, info.serial, info.interface_id);
            }
        }
        Commands::Features { camera } => {
            for name in instance(camera, None)?.list_features()? {
                println!("{name}");
            }
        }
        Commands::Info { camera, name } => {
            let (value, range) = instance(camera, None)?.feature_info(&name)
                .with_context(|| format!("could not read feature {name}"))?;
            println!("{name}: {value} {range}");
        }
        Commands::Set { camera, features, verbose } => {
            instance(camera, None)?.set_features(&features, verbose)?;
        }
        Commands::Grab { camera, path, filename, features } => {
            let mut all = settings.feature_overrides();
            all.extend(features);

            let saved = instance(camera, path)?.acquire_frame(&all, None, filename.as_deref())?;
            println!("{}", saved.display());
        }
        Commands::Stream { camera, duration, frames, buffer, callback, path, features } => {
            let instance = instance(camera, path)?;

            let mut config = settings.stream_config().output_path(instance.path());
            config.duration = duration
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("invalid duration")?;
            config.frame_limit = frames;
            if let Some(depth) = buffer {
                config.buffer_depth = depth;
            }
            config.feature_overrides.extend(features);

            let callback = match callback {
                CallbackKind::Export => Callback::Export,
                CallbackKind::Counter => Callback::ExportWithCounter,
                CallbackKind::Display => Callback::display(show),
            };

            let summary = instance.stream(&config, callback)?;
            info!("{summary:?}");
        }
    }

    Ok(())
}

fn open_instance<'d, D: Driver>(
    driver: &'d D,
    settings: &Settings,
    camera: String,
    path: Option<PathBuf>,
) -> Result<CameraInstance<'d, D>> {
    let id = resolve_camera(driver, camera)?;
    let mut instance = CameraInstance::new(driver, &id)
        .with_live_view(settings.live_view.width, settings.live_view.height);
    instance.set_path(path.unwrap_or_else(|| settings.output_path.clone()));

    Ok(instance)
}

// "first" picks whichever camera is listed first
fn resolve_camera<D: Driver>(driver: &D, camera: String) -> Result<String> {
    if camera != "first" {
        return Ok(camera);
    }

    match camera_ids(driver)?.into_iter().next() {
        Some(id) => Ok(id),
        None => bail!("no cameras found"),
    }
}

fn show(image: &RgbImage) {
    let sum: u64 = image.as_raw().iter().map(|&b| b as u64).sum();
    let mean = sum as f64 / image.as_raw().len().max(1) as f64;

    info!("live view {}x{}, mean level {mean:.1}", image.width(), image.height());
}
