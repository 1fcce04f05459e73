use approx::assert_relative_eq;
use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

use ferrotrack::calibration;
use ferrotrack::geometry::PixelRect;
use ferrotrack::modules::input::MemoryInput;
use ferrotrack::modules::OutputModule;
use ferrotrack::reconstruct;
use ferrotrack::records::{self, PositionWriter, TimestampLog};
use ferrotrack::settings::{CameraModel, ReferenceObject, TrackerSettings};
use ferrotrack::tracker::{self, Selection};
use ferrotrack::{Result, TrackError};

const STEP_PX: i32 = 2;

#[derive(Default)]
struct KeepFrames {
	frames: Vec<Mat>,
	closed: bool,
}

impl OutputModule for KeepFrames {
	fn run(&mut self, frame: &Mat) -> Result<()> {
		self.frames.push(frame.try_clone()?);
		Ok(())
	}

	fn finish(&mut self) -> Result<()> {
		self.closed = true;
		Ok(())
	}
}

fn sliding_box(frames: i32) -> Vec<Mat> {
	(0..frames)
		.map(|i| {
			let mut frame = Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(235.)).unwrap();
			let object = Rect::new(100 + STEP_PX * i, 110, 40, 20);
			imgproc::rectangle(&mut frame, object, Scalar::all(25.), -1, imgproc::LINE_8, 0).unwrap();
			frame
		})
		.collect()
}

fn select(_: &Mat) -> Result<Selection> {
	Ok(Selection {
		roi: PixelRect::new(80, 90, 80, 60),
		reference: PixelRect::new(20, 20, 200, 100),
	})
}

#[test]
fn sliding_box_becomes_a_straight_millimetre_path() {
	let mut input = MemoryInput::new(sliding_box(10), 25.);
	let mut output = KeepFrames::default();
	let mut positions = PositionWriter::new(Vec::new());
	let mut reference_csv = Vec::new();
	let times = (0..10).map(|i| i as f64 * 0.04).collect::<Vec<_>>();
	let timestamps = TimestampLog::from_seconds(times, "slide_timestamps.csv").unwrap();

	let settings = TrackerSettings::default();
	let report = tracker::run(&mut input, &mut output, &mut positions, &mut reference_csv, &timestamps, &settings, select)
		.unwrap();

	assert_eq!(report.frames, 10);
	assert_eq!(report.lost, 0);
	assert!(output.closed);
	assert_eq!(output.frames.len(), 10);
	assert_eq!(String::from_utf8(reference_csv.clone()).unwrap(), "X,Y,Width,Height\n20,20,200,100\n");

	// Pixel track moves by the drawing step and keeps its orientation.
	for (i, sample) in report.samples.iter().enumerate() {
		assert!((sample.x - (119.5 + (STEP_PX * i as i32) as f64)).abs() < 1., "frame {}: x={}", i, sample.x);
		assert!((sample.y - 119.5).abs() < 1., "frame {}: y={}", i, sample.y);
		assert!(sample.angle.abs() < 1e-6);
	}

	// Positions CSV reads back into the same samples.
	let bytes = positions.finish().unwrap();
	let reread = records::read_track_samples(bytes.as_slice()).unwrap();
	assert_eq!(reread, report.samples);

	let reference = records::read_reference_box(reference_csv.as_slice()).unwrap().unwrap();
	let camera = CameraModel::ideal(1400., 1400., 160., 120.);
	let scale = calibration::load_scale(&reference, &ReferenceObject::default(), camera.fx).unwrap();
	assert_relative_eq!(scale.mm_per_pixel_x, 0.54);

	let trajectory = reconstruct::reconstruct(&reread, &camera, &scale).unwrap();
	assert_eq!(trajectory.len(), reread.len());
	assert_eq!((trajectory[0].x, trajectory[0].y, trajectory[0].z), (0., 0., 0.));

	// At the reference depth the pinhole inversion reduces to the mm/pixel scale.
	for (sample, point) in reread.iter().zip(trajectory.iter()) {
		assert_relative_eq!(point.x, (sample.x - reread[0].x) * scale.mm_per_pixel_x, epsilon = 1e-9);
		assert_relative_eq!(point.y, (sample.y - reread[0].y) * scale.mm_per_pixel_x, epsilon = 1e-9);
		assert_eq!(point.z, 0.);
	}

	let velocity = reconstruct::velocity_profile(&trajectory, 3);
	assert_eq!(velocity.len(), 9);
	for v in &velocity {
		assert_relative_eq!(v.speed, STEP_PX as f64 * 0.54 / 0.04, epsilon = 1.);
	}
}

#[test]
fn short_timestamp_log_writes_nothing() {
	let mut input = MemoryInput::new(sliding_box(4), 25.);
	let mut output = KeepFrames::default();
	let mut positions = PositionWriter::new(Vec::new());
	let mut reference_csv = Vec::new();
	let timestamps = TimestampLog::from_seconds(vec![0., 0.04, 0.08], "slide_timestamps.csv").unwrap();

	let settings = TrackerSettings::default();
	let err = tracker::run(&mut input, &mut output, &mut positions, &mut reference_csv, &timestamps, &settings, select)
		.unwrap_err();

	assert!(matches!(err, TrackError::FrameCountMismatch { rows: 3, frames: 4, .. }));
	assert!(output.frames.is_empty());
	assert_eq!(positions.rows(), 0);
	assert!(reference_csv.is_empty());
}

#[test]
fn missing_reference_box_runs_uncalibrated() {
	let mut input = MemoryInput::new(sliding_box(3), 25.);
	let mut output = KeepFrames::default();
	let mut positions = PositionWriter::new(Vec::new());
	let timestamps = TimestampLog::from_seconds(vec![0., 0.5, 1.0], "slide_timestamps.csv").unwrap();

	let settings = TrackerSettings::default();
	let report = tracker::run(&mut input, &mut output, &mut positions, Vec::new(), &timestamps, &settings, select).unwrap();

	let real = ReferenceObject::default();
	let scale = calibration::load_scale_from_file("/nonexistent/slide_box.csv", &real, 1400.).unwrap();
	assert!(scale.is_degraded());

	let camera = CameraModel::ideal(1400., 1400., 160., 120.);
	let trajectory = reconstruct::reconstruct(&report.samples, &camera, &scale).unwrap();
	assert_relative_eq!(trajectory[2].x, report.samples[2].x - report.samples[0].x, epsilon = 1e-9);
	assert_eq!(trajectory[2].z, 0.);
}
