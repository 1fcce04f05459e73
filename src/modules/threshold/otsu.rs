use crate::modules::ThresholdModule;
use crate::modules::{TrackingData};

use opencv::prelude::*;
use opencv::imgproc;
use opencv::core::*;
use tracing::trace;

use crate::error::Result;

/// Inverted Otsu binarisation: dark objects on a bright background become
/// foreground, with the threshold picked per frame from the histogram.
#[derive(Debug, Default)]
pub struct OtsuThreshold {
	last_level: Option<f64>,
}

impl OtsuThreshold {
	pub fn new() -> Self {
		Self::default()
	}

	/// Threshold chosen for the most recent frame.
	pub fn last_level(&self) -> Option<f64> {
		self.last_level
	}

	pub fn binarize(&mut self, frame: &Mat) -> Result<Mat> {
		let gray = if frame.channels() == 1 {
			frame.try_clone()?
		} else {
			let mut gray = Mat::default();
			imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;
			gray
		};

		let mut mask = Mat::default();
		let flags = imgproc::THRESH_BINARY_INV | imgproc::THRESH_OTSU;
		let level = imgproc::threshold(&gray, &mut mask, 0., 255., flags)?;
		trace!(level, "otsu level");
		self.last_level = Some(level);

		Ok(mask)
	}
}

impl ThresholdModule for OtsuThreshold {
	fn run(&mut self, frame: &Mat) -> Result<Vec<TrackingData>> {
		let mask = self.binarize(frame)?;

		let mut cnts = Vector::<Vector<Point>>::new();
		imgproc::find_contours_def(&mask, &mut cnts, imgproc::RETR_EXTERNAL, imgproc::CHAIN_APPROX_SIMPLE)?;

		let mut tracked_objects = Vec::<TrackingData>::with_capacity(cnts.len());

		for cnt in cnts.iter() {
			let area = imgproc::contour_area(&cnt, false)?;
			let rect = imgproc::min_area_rect(&cnt)?;
			let bounding = imgproc::bounding_rect(&cnt)?;
			tracked_objects.push(TrackingData {
				cnt: cnt,
				area: area,
				rect: rect,
				bounding: bounding,
			});
		}

		Ok(tracked_objects)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn canvas(width: i32, height: i32, shade: f64) -> Mat {
		Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(shade)).unwrap()
	}

	fn fill(frame: &mut Mat, rect: Rect, shade: f64) {
		imgproc::rectangle(frame, rect, Scalar::all(shade), -1, imgproc::LINE_8, 0).unwrap();
	}

	#[test]
	fn dark_object_becomes_single_contour() {
		let mut frame = canvas(120, 100, 230.);
		fill(&mut frame, Rect::new(40, 30, 31, 21), 20.);

		let objects = OtsuThreshold::new().run(&frame).unwrap();
		assert_eq!(objects.len(), 1);

		let obj = &objects[0];
		assert_eq!(obj.bounding, Rect::new(40, 30, 31, 21));
		assert!((obj.rect.center.x - 55.).abs() < 0.51);
		assert!((obj.rect.center.y - 40.).abs() < 0.51);
		assert!(obj.area > 500.);
	}

	#[test]
	fn separate_blobs_are_separate_contours() {
		let mut frame = canvas(200, 100, 255.);
		fill(&mut frame, Rect::new(10, 10, 20, 20), 0.);
		fill(&mut frame, Rect::new(120, 40, 50, 40), 0.);

		let objects = OtsuThreshold::new().run(&frame).unwrap();
		assert_eq!(objects.len(), 2);
	}

	#[test]
	fn blank_window_has_no_contours() {
		let frame = canvas(64, 64, 255.);
		let mut threshold = OtsuThreshold::new();
		assert!(threshold.run(&frame).unwrap().is_empty());
		assert!(threshold.last_level().is_some());
	}
}
