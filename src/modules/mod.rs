pub mod input;
pub mod threshold;
pub mod filter;
pub mod output;

use opencv::core::*;

use crate::error::Result;

/// One external contour of the binarised search window, in window coordinates.
#[derive(Debug, Clone)]
pub struct TrackingData {
	pub cnt: Vector<Point>,
	pub area: f64,
	pub rect: RotatedRect,
	pub bounding: Rect,
}

/// Ordered, finite frame source.
pub trait InputModule {
	/// Next frame, or `None` once the source is exhausted.
	fn run(&mut self) -> Result<Option<Mat>>;
	/// Number of frames, when the container knows it.
	fn frame_count(&self) -> Option<usize>;
	fn fps(&self) -> f64;
}

pub trait ThresholdModule {
	fn run(&mut self, frame: &Mat) -> Result<Vec<TrackingData>>;
}

pub trait FilterModule {
	fn run(&mut self, object: &TrackingData) -> bool;
}

/// Sink for annotated frames. `finish` flushes and closes it.
pub trait OutputModule {
	fn run(&mut self, frame: &Mat) -> Result<()>;
	fn finish(&mut self) -> Result<()>;
}
