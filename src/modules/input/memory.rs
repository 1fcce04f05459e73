use std::collections::VecDeque;

use opencv::core::*;

use crate::error::Result;
use crate::modules::InputModule;

/// Frames already decoded into memory, handed out in order.
pub struct MemoryInput {
	frames: VecDeque<Mat>,
	total: usize,
	fps: f64,
}

impl MemoryInput {
	pub fn new(frames: Vec<Mat>, fps: f64) -> Self {
		Self {
			total: frames.len(),
			frames: frames.into(),
			fps: fps,
		}
	}
}

impl InputModule for MemoryInput {
	fn run(&mut self) -> Result<Option<Mat>> {
		Ok(self.frames.pop_front())
	}

	fn frame_count(&self) -> Option<usize> {
		Some(self.total)
	}

	fn fps(&self) -> f64 {
		self.fps
	}
}
