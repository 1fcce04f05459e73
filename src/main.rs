use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opencv::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ferrotrack::calibration::{self, CalibrationScale};
use ferrotrack::geometry::{ReferenceBox, Roi};
use ferrotrack::modules::input::VideoFileInput;
use ferrotrack::modules::output::VideoFileOutput;
use ferrotrack::modules::InputModule;
use ferrotrack::paths::RunPaths;
use ferrotrack::reconstruct::{self, TrajectoryStats};
use ferrotrack::records::{self, PositionWriter, TimestampLog, TrackSample};
use ferrotrack::settings::Settings;
use ferrotrack::tracker::{self, Selection, TrackReport};

#[derive(Parser)]
#[command(
	name = "ferrotrack",
	version,
	about = "Track an object through a recording and reconstruct its path in millimetres"
)]
struct Cli {
	/// Camera, reference object and tracker settings
	#[arg(long, global = true, default_value = "track.toml")]
	settings: PathBuf,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Follow the object through a video, writing positions and an annotated copy.
	Track {
		#[command(flatten)]
		args: TrackArgs,
	},

	/// Turn a positions CSV into a millimetre trajectory.
	Reconstruct {
		/// `<stem>_locations.csv` written by `track`
		#[arg(short, long)]
		locations: PathBuf,

		/// Reference box CSV (default: `<stem>_box.csv` next to the locations)
		#[arg(long)]
		reference_box_csv: Option<PathBuf>,

		/// Trajectory CSV (default: `<session>_Trajectory.csv`). Velocity and
		/// summary files are written next to it.
		#[arg(short, long)]
		output: Option<PathBuf>,
	},

	/// Track, then reconstruct.
	Run {
		#[command(flatten)]
		args: TrackArgs,
	},
}

#[derive(clap::Args)]
struct TrackArgs {
	/// Recorded video
	#[arg(short, long)]
	video: PathBuf,

	/// Initial search window as x,y,w,h
	#[arg(long)]
	roi: Roi,

	/// Reference box footprint on the first frame as x,y,w,h
	#[arg(long)]
	reference_box: ReferenceBox,

	/// Timestamp log (default: `<session>_timestamps.csv` next to the video)
	#[arg(long)]
	timestamps: Option<PathBuf>,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();
	let settings = Settings::load_or_default(&cli.settings)
		.with_context(|| format!("loading {}", cli.settings.display()))?;

	match cli.command {
		Commands::Track { args } => {
			cmd_track(&args, &settings)?;
			Ok(())
		}
		Commands::Reconstruct {
			locations,
			reference_box_csv,
			output,
		} => cmd_reconstruct(&locations, reference_box_csv, output, &settings),
		Commands::Run { args } => {
			let (paths, report) = cmd_track(&args, &settings)?;
			let scale = calibration::load_scale(&report.reference, &settings.reference, settings.camera.fx)
				.context("calibrating from the reference box")?;
			write_trajectory(&report.samples, &scale, &paths, &settings)
		}
	}
}

fn cmd_track(args: &TrackArgs, settings: &Settings) -> Result<(RunPaths, TrackReport)> {
	let paths = RunPaths::for_video(&args.video);
	let timestamps_path = args.timestamps.clone().unwrap_or_else(|| paths.timestamps.clone());

	let timestamps = TimestampLog::load(&timestamps_path).context("loading the timestamp log")?;
	let mut input = VideoFileInput::open(&paths.video).context("opening the recording")?;
	// Nothing is written until the recording and its log agree.
	tracker::check_frame_count(&input, &timestamps)?;

	let mut output = VideoFileOutput::new(&paths.tracking_video, &settings.tracker.codec, input.fps())?;
	let mut positions = PositionWriter::new(records::create_output(&paths.locations)?);
	let reference_out = records::create_output(&paths.reference_box)?;

	let roi = args.roi;
	let reference = args.reference_box;
	let report = tracker::run(
		&mut input,
		&mut output,
		&mut positions,
		reference_out,
		&timestamps,
		&settings.tracker,
		|first: &Mat| {
			let size = first.size()?;
			if !roi.fits_within(size.width, size.height) {
				warn!(%roi, width = size.width, height = size.height, "search window extends past the frame");
			}
			Ok(Selection {
				roi: roi,
				reference: reference,
			})
		},
	)
	.with_context(|| format!("tracking {}", paths.video.display()))?;
	positions.finish()?;
	records::write_summary(records::create_output(&paths.track_summary)?, &report.summary_row())?;

	info!(
		locations = %paths.locations.display(),
		video = %paths.tracking_video.display(),
		summary = %paths.track_summary.display(),
		"{}",
		report.summary()
	);
	Ok((paths, report))
}

fn cmd_reconstruct(
	locations: &Path,
	reference_box_csv: Option<PathBuf>,
	output: Option<PathBuf>,
	settings: &Settings,
) -> Result<()> {
	let mut paths = RunPaths::for_locations(locations);
	let box_path = reference_box_csv.unwrap_or_else(|| paths.reference_box.clone());
	if let Some(output) = output {
		paths = paths.with_trajectory(output);
	}

	let samples = records::load_track_samples(&paths.locations).context("loading tracked positions")?;
	let scale = calibration::load_scale_from_file(&box_path, &settings.reference, settings.camera.fx)
		.with_context(|| format!("calibrating from {}", box_path.display()))?;

	write_trajectory(&samples, &scale, &paths, settings)
}

fn write_trajectory(
	samples: &[TrackSample],
	scale: &CalibrationScale,
	paths: &RunPaths,
	settings: &Settings,
) -> Result<()> {
	let trajectory = reconstruct::reconstruct(samples, &settings.camera, scale)
		.context("reconstructing the trajectory")?;
	records::write_trajectory(records::create_output(&paths.trajectory)?, &trajectory)?;

	let velocity = reconstruct::velocity_profile(&trajectory, settings.reconstruct.velocity_window);
	records::write_velocity(records::create_output(&paths.velocity)?, &velocity)?;

	let stats = TrajectoryStats::new(&trajectory, &velocity);
	stats.log();
	let summary = stats.summary_row(trajectory.len(), scale);
	records::write_summary(records::create_output(&paths.summary)?, &summary)?;
	if scale.is_degraded() {
		warn!("trajectory is in pixel units scaled by {} mm/pixel", scale.mm_per_pixel_x);
	}

	info!(
		trajectory = %paths.trajectory.display(),
		velocity = %paths.velocity.display(),
		summary = %paths.summary.display(),
		samples = trajectory.len(),
		"wrote trajectory"
	);
	Ok(())
}
