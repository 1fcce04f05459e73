use std::path::Path;

use opencv::core::*;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::info;

use crate::error::{Result, TrackError};
use crate::modules::InputModule;

pub struct VideoFileInput {
	cap: VideoCapture,
	fps: f64,
	frame_count: Option<usize>,
}

impl VideoFileInput {
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let name = path.to_str().ok_or_else(|| TrackError::unavailable(path, "path is not valid UTF-8"))?;
		if !path.is_file() {
			return Err(TrackError::unavailable(path, "no such video file"));
		}

		let cap = VideoCapture::from_file(name, videoio::CAP_ANY)?;
		if !cap.is_opened()? {
			return Err(TrackError::unavailable(path, "cannot open the video file"));
		}

		let fps = cap.get(videoio::CAP_PROP_FPS)?;
		let count = cap.get(videoio::CAP_PROP_FRAME_COUNT)?;
		let size = Size::new(
			cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
			cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
		);
		// Some containers report 0 or -1 for an unknown length.
		let frame_count = if count >= 1.0 { Some(count as usize) } else { None };

		info!(
			path = %path.display(),
			fps,
			?frame_count,
			width = size.width,
			height = size.height,
			"opened video"
		);

		Ok(Self {
			cap: cap,
			fps: fps,
			frame_count: frame_count,
		})
	}
}

impl InputModule for VideoFileInput {
	fn run(&mut self) -> Result<Option<Mat>> {
		let mut frame = Mat::default();
		if !self.cap.read(&mut frame)? || frame.empty() {
			return Ok(None);
		}
		Ok(Some(frame))
	}

	fn frame_count(&self) -> Option<usize> {
		self.frame_count
	}

	fn fps(&self) -> f64 {
		self.fps
	}
}

impl Drop for VideoFileInput {
	fn drop(&mut self) {
		let _ = self.cap.release();
	}
}
