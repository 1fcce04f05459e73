use std::fmt;
use std::str::FromStr;

use opencv::core::Rect;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle. Column names match the reference-box CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
	#[serde(rename = "X")]
	pub x: i32,
	#[serde(rename = "Y")]
	pub y: i32,
	#[serde(rename = "Width")]
	pub width: i32,
	#[serde(rename = "Height")]
	pub height: i32,
}

/// Search window of the contour tracker.
pub type Roi = PixelRect;

/// Footprint of the calibration object in the first frame.
pub type ReferenceBox = PixelRect;

impl PixelRect {
	pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
		Self {
			x: x,
			y: y,
			width: width,
			height: height,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.width <= 0 || self.height <= 0
	}

	/// Integer centre, rounded towards the origin like the ROI arithmetic.
	pub fn center(&self) -> (i32, i32) {
		(self.x + self.width / 2, self.y + self.height / 2)
	}

	pub fn fits_within(&self, frame_width: i32, frame_height: i32) -> bool {
		!self.is_empty()
			&& self.x >= 0
			&& self.y >= 0
			&& self.x + self.width <= frame_width
			&& self.y + self.height <= frame_height
	}

	/// Intersection with the frame. `None` when nothing of the rectangle (or of
	/// the frame) is left.
	pub fn clamped(&self, frame_width: i32, frame_height: i32) -> Option<PixelRect> {
		if self.is_empty() || frame_width <= 0 || frame_height <= 0 {
			return None;
		}
		let right = self.x.saturating_add(self.width);
		let bottom = self.y.saturating_add(self.height);
		if self.x >= frame_width || self.y >= frame_height || right <= 0 || bottom <= 0 {
			return None;
		}

		let x = self.x.max(0);
		let y = self.y.max(0);
		let width = right.min(frame_width) - x;
		let height = bottom.min(frame_height) - y;

		Some(PixelRect::new(x, y, width, height))
	}

	/// Same size, centred on `(cx, cy)`, pushed back inside the frame.
	pub fn recentered(&self, cx: i32, cy: i32, frame_width: i32, frame_height: i32) -> PixelRect {
		let width = self.width.min(frame_width);
		let height = self.height.min(frame_height);

		let x = (cx - width / 2).max(0).min(frame_width - width);
		let y = (cy - height / 2).max(0).min(frame_height - height);

		PixelRect::new(x, y, width, height)
	}
}

impl From<PixelRect> for Rect {
	fn from(r: PixelRect) -> Rect {
		Rect::new(r.x, r.y, r.width, r.height)
	}
}

impl From<Rect> for PixelRect {
	fn from(r: Rect) -> PixelRect {
		PixelRect::new(r.x, r.y, r.width, r.height)
	}
}

impl fmt::Display for PixelRect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
	}
}

impl FromStr for PixelRect {
	type Err = String;

	// "x,y,w,h"
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let parts = s
			.split(',')
			.map(|p| p.trim().parse::<i32>().map_err(|e| format!("bad rectangle component {:?}: {}", p, e)))
			.collect::<Result<Vec<i32>, String>>()?;

		match parts[..] {
			[x, y, w, h] if w > 0 && h > 0 => Ok(PixelRect::new(x, y, w, h)),
			[_, _, _, _] => Err(format!("rectangle {:?} must have positive width and height", s)),
			_ => Err(format!("expected x,y,width,height, got {:?}", s)),
		}
	}
}
