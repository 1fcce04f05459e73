use std::path::{Path, PathBuf};

use opencv::core::*;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use tracing::{info, warn};

use crate::error::{Result, TrackError};
use crate::modules::OutputModule;

const FALLBACK_FPS: f64 = 30.;

/// Annotated video file. The writer opens on the first frame so the output
/// always has the input's resolution.
pub struct VideoFileOutput {
	path: PathBuf,
	fourcc: i32,
	fps: f64,
	writer: Option<VideoWriter>,
	frames: usize,
}

impl VideoFileOutput {
	pub fn new<P: AsRef<Path>>(path: P, codec: &str, fps: f64) -> Result<Self> {
		let path = path.as_ref();
		let code = codec.chars().collect::<Vec<char>>();
		if code.len() != 4 {
			return Err(TrackError::unavailable(path, format!("codec {:?} is not a fourcc", codec)));
		}
		let fourcc = VideoWriter::fourcc(code[0], code[1], code[2], code[3])?;

		let fps = if fps.is_finite() && fps > 0. {
			fps
		} else {
			warn!(fps, "input reports no frame rate, writing at {} fps", FALLBACK_FPS);
			FALLBACK_FPS
		};

		Ok(Self {
			path: path.to_path_buf(),
			fourcc: fourcc,
			fps: fps,
			writer: None,
			frames: 0,
		})
	}

	fn open(&self, size: Size) -> Result<VideoWriter> {
		let name = self
			.path
			.to_str()
			.ok_or_else(|| TrackError::unavailable(&self.path, "path is not valid UTF-8"))?;
		let writer = VideoWriter::new(name, self.fourcc, self.fps, size, true)?;
		if !writer.is_opened()? {
			return Err(TrackError::unavailable(&self.path, "cannot open video writer"));
		}
		info!(
			path = %self.path.display(),
			width = size.width,
			height = size.height,
			fps = self.fps,
			"writing annotated video"
		);
		Ok(writer)
	}
}

impl OutputModule for VideoFileOutput {
	fn run(&mut self, frame: &Mat) -> Result<()> {
		if self.writer.is_none() {
			self.writer = Some(self.open(frame.size()?)?);
		}
		if let Some(writer) = self.writer.as_mut() {
			writer.write(frame)?;
			self.frames += 1;
		}
		Ok(())
	}

	fn finish(&mut self) -> Result<()> {
		if let Some(mut writer) = self.writer.take() {
			writer.release()?;
			info!(path = %self.path.display(), frames = self.frames, "annotated video closed");
		}
		Ok(())
	}
}

impl Drop for VideoFileOutput {
	fn drop(&mut self) {
		// Early exits still leave a playable file behind.
		if let Some(mut writer) = self.writer.take() {
			let _ = writer.release();
		}
	}
}
