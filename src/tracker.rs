use std::io::Write;

use opencv::core::*;
use opencv::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackError};
use crate::geometry::{PixelRect, ReferenceBox, Roi};
use crate::modules::filter::{self, ContourArea};
use crate::modules::output::annotate;
use crate::modules::threshold::OtsuThreshold;
use crate::modules::{FilterModule, InputModule, OutputModule, ThresholdModule};
use crate::records::{self, PositionWriter, TimestampLog, TrackSample, TrackSummary};
use crate::settings::TrackerSettings;

/// What the tracker saw in one frame, in full-frame pixel coordinates.
#[derive(Debug, Clone)]
pub struct Observation {
	pub center: (f64, f64),
	/// Degrees, see [`canonical_angle`].
	pub angle: f64,
	pub rect: RotatedRect,
	pub bounding: PixelRect,
	pub contour: Vector<Point>,
	/// Window that was searched.
	pub window: Roi,
}

/// Orientation of a min-area rectangle as the angle of its long side from the
/// image x axis, in [-90, 90). Squares have no long side and land in [-45, 45).
pub fn canonical_angle(rect: &RotatedRect) -> f64 {
	let width = rect.size.width as f64;
	let height = rect.size.height as f64;
	let angle = rect.angle as f64;

	if (width - height).abs() <= 1e-3 * width.max(height) {
		return (angle + 45.).rem_euclid(90.) - 45.;
	}

	let long_side = if height > width { angle + 90. } else { angle };
	(long_side + 90.).rem_euclid(180.) - 90.
}

// No re-acquisition: a frame without a contour leaves the window where it was.
pub struct ContourTracker {
	roi: Roi,
	threshold: OtsuThreshold,
	filters: Vec<Box<dyn FilterModule>>,
	frame_index: usize,
	lost: usize,
	samples: Vec<TrackSample>,
}

impl ContourTracker {
	pub fn new(roi: Roi, settings: &TrackerSettings) -> Self {
		let mut filters = Vec::<Box<dyn FilterModule>>::new();
		if settings.min_contour_area > 0. {
			filters.push(Box::new(ContourArea::new(settings.min_contour_area)));
		}

		Self {
			roi: roi,
			threshold: OtsuThreshold::new(),
			filters: filters,
			frame_index: 0,
			lost: 0,
			samples: Vec::new(),
		}
	}

	pub fn roi(&self) -> Roi {
		self.roi
	}

	/// Frames consumed so far.
	pub fn frame_index(&self) -> usize {
		self.frame_index
	}

	pub fn lost_frames(&self) -> usize {
		self.lost
	}

	/// Otsu level picked for the last searched window.
	pub fn threshold_level(&self) -> Option<f64> {
		self.threshold.last_level()
	}

	pub fn samples(&self) -> &[TrackSample] {
		&self.samples
	}

	pub fn into_samples(self) -> Vec<TrackSample> {
		self.samples
	}

	/// Searches the current window and moves it onto the object. Leaves the
	/// window untouched when nothing is found.
	pub fn observe(&mut self, frame: &Mat) -> Result<Option<Observation>> {
		let (frame_width, frame_height) = (frame.cols(), frame.rows());
		let window = self.roi.clamped(frame_width, frame_height).ok_or_else(|| {
			TrackError::GeometricDegenerate(format!(
				"ROI {} does not overlap the {}x{} frame",
				self.roi, frame_width, frame_height
			))
		})?;
		self.roi = window;

		let crop = Mat::roi(frame, Rect::from(window))?.try_clone()?;
		let objects = self.threshold.run(&crop)?;
		let Some(obj) = filter::select_largest(objects, &mut self.filters) else {
			return Ok(None);
		};

		let (ox, oy) = (window.x, window.y);
		let mut rect = obj.rect;
		rect.center.x += ox as f32;
		rect.center.y += oy as f32;
		let center = (rect.center.x as f64, rect.center.y as f64);

		let contour = obj.cnt.iter().map(|p| Point::new(p.x + ox, p.y + oy)).collect::<Vector<Point>>();
		let bounding = PixelRect::new(
			obj.bounding.x + ox,
			obj.bounding.y + oy,
			obj.bounding.width,
			obj.bounding.height,
		);

		self.roi = window.recentered(center.0 as i32, center.1 as i32, frame_width, frame_height);

		Ok(Some(Observation {
			center: center,
			angle: canonical_angle(&obj.rect),
			rect: rect,
			bounding: bounding,
			contour: contour,
			window: window,
		}))
	}

	/// One full frame transition: observe, draw the overlay onto `frame` and
	/// record a sample stamped with `time`.
	pub fn step(&mut self, frame: &mut Mat, time: f64) -> Result<Option<TrackSample>> {
		let observation = self.observe(frame)?;
		self.frame_index += 1;

		match observation {
			Some(obs) => {
				annotate::draw_observation(frame, &obs)?;
				let sample = TrackSample {
					time: time,
					x: obs.center.0,
					y: obs.center.1,
					angle: obs.angle,
				};
				debug!(frame = self.frame_index - 1, x = sample.x, y = sample.y, angle = sample.angle, "tracked");
				self.samples.push(sample);
				Ok(Some(sample))
			}
			None => {
				self.lost += 1;
				annotate::draw_lost(frame, self.roi)?;
				debug!(frame = self.frame_index - 1, roi = %self.roi, "no contour in window");
				Ok(None)
			}
		}
	}
}

/// Rectangles picked on the first frame before tracking starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
	pub roi: Roi,
	pub reference: ReferenceBox,
}

#[derive(Debug, Clone)]
pub struct TrackReport {
	pub frames: usize,
	pub lost: usize,
	pub reference: ReferenceBox,
	pub final_roi: Roi,
	pub otsu_level: Option<f64>,
	pub samples: Vec<TrackSample>,
}

impl TrackReport {
	pub fn tracked(&self) -> usize {
		self.samples.len()
	}

	pub fn summary(&self) -> String {
		format!("{} of {} frames had no detected object", self.lost, self.frames)
	}

	pub fn summary_row(&self) -> TrackSummary {
		TrackSummary {
			frames: self.frames,
			tracked: self.tracked(),
			lost: self.lost,
			final_roi: self.final_roi.to_string(),
			otsu_level: self.otsu_level,
		}
	}
}

/// Fails when the source knows its length and the timestamp log disagrees.
pub fn check_frame_count<I: InputModule>(input: &I, timestamps: &TimestampLog) -> Result<()> {
	match input.frame_count() {
		Some(frames) if frames != timestamps.len() => Err(TrackError::FrameCountMismatch {
			path: timestamps.path().to_path_buf(),
			rows: timestamps.len(),
			frames: frames,
		}),
		_ => Ok(()),
	}
}

/// Tracks a whole recording.
///
/// `select` receives the first frame and returns the search window and the
/// reference box; the box is written to `reference_out` before any frame is
/// processed. Every frame, tracked or not, goes to `output` with its overlay.
/// A frame without a timestamp row aborts the run.
pub fn run<I, O, W, B, S>(
	input: &mut I,
	output: &mut O,
	positions: &mut PositionWriter<W>,
	reference_out: B,
	timestamps: &TimestampLog,
	settings: &TrackerSettings,
	select: S,
) -> Result<TrackReport>
where
	I: InputModule,
	O: OutputModule,
	W: Write,
	B: Write,
	S: FnOnce(&Mat) -> Result<Selection>,
{
	check_frame_count(input, timestamps)?;

	let first = input
		.run()?
		.ok_or_else(|| TrackError::unavailable("frame source", "yielded no frames"))?;

	let selection = select(&first)?;
	if selection.reference.is_empty() {
		return Err(TrackError::GeometricDegenerate(format!(
			"reference box {} has a zero pixel footprint",
			selection.reference
		)));
	}
	records::write_reference_box(reference_out, &selection.reference)?;
	info!(roi = %selection.roi, reference = %selection.reference, "tracking started");

	let mut tracker = ContourTracker::new(selection.roi, settings);
	let mut next = Some(first);

	while let Some(mut frame) = next {
		let time = timestamps.at(tracker.frame_index())?;
		if let Some(sample) = tracker.step(&mut frame, time)? {
			positions.record(&sample)?;
		}
		output.run(&frame)?;

		if tracker.frame_index() % 100 == 0 {
			debug!(frames = tracker.frame_index(), lost = tracker.lost_frames(), "tracking progress");
		}
		next = input.run()?;
	}
	output.finish()?;

	let report = TrackReport {
		frames: tracker.frame_index(),
		lost: tracker.lost_frames(),
		reference: selection.reference,
		final_roi: tracker.roi(),
		otsu_level: tracker.threshold_level(),
		samples: tracker.into_samples(),
	};

	if report.lost > 0 {
		warn!("{}", report.summary());
	}
	info!(frames = report.frames, tracked = report.tracked(), lost = report.lost, "tracking finished");

	Ok(report)
}
