//! Pixel-to-millimetre scale and camera distance from the reference box.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{Result, TrackError};
use crate::geometry::ReferenceBox;
use crate::records;
use crate::settings::ReferenceObject;

/// Scale used when a dimension (or the whole box) is unknown.
pub const UNIT_SCALE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStatus {
	Calibrated,
	/// Running in pixel units for the stated reason.
	Degraded(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationScale {
	pub mm_per_pixel_x: f64,
	pub mm_per_pixel_y: f64,
	/// Camera to reference-plane distance in metres, when the real width is known.
	pub distance_m: Option<f64>,
	pub reference: Option<ReferenceBox>,
	pub status: CalibrationStatus,
}

impl CalibrationScale {
	/// Pixel-unit fallback.
	pub fn uncalibrated(reason: impl Into<String>) -> Self {
		let reason = reason.into();
		warn!(%reason, "calibration degraded, falling back to {} mm/pixel", UNIT_SCALE);
		Self {
			mm_per_pixel_x: UNIT_SCALE,
			mm_per_pixel_y: UNIT_SCALE,
			distance_m: None,
			reference: None,
			status: CalibrationStatus::Degraded(reason),
		}
	}

	pub fn is_degraded(&self) -> bool {
		matches!(self.status, CalibrationStatus::Degraded(_))
	}
}

pub fn camera_to_object_distance(real_mm: f64, pixels: f64, focal_length_px: f64) -> f64 {
	focal_length_px * (real_mm / 1000.0) / pixels
}

pub fn load_scale(
	reference: &ReferenceBox,
	real: &ReferenceObject,
	focal_length_px: f64,
) -> Result<CalibrationScale> {
	if reference.width <= 0 || reference.height <= 0 {
		return Err(TrackError::GeometricDegenerate(format!(
			"reference box {} has a zero pixel footprint",
			reference
		)));
	}
	if !(focal_length_px.is_finite() && focal_length_px > 0.0) {
		return Err(TrackError::GeometricDegenerate(format!(
			"focal length {} px is not positive",
			focal_length_px
		)));
	}
	let real_width = known_dimension("width", real.width_mm)?;
	let real_height = known_dimension("height", real.height_mm)?;

	let width_px = reference.width as f64;
	let height_px = reference.height as f64;

	let mm_per_pixel_x = real_width.map_or(UNIT_SCALE, |mm| mm / width_px);
	let mm_per_pixel_y = real_height.map_or(UNIT_SCALE, |mm| mm / height_px);
	let distance_m = real_width.map(|mm| camera_to_object_distance(mm, width_px, focal_length_px));

	let status = match (real_width, real_height) {
		(Some(_), Some(_)) => CalibrationStatus::Calibrated,
		(None, None) => CalibrationStatus::Degraded("reference dimensions unknown".to_string()),
		(None, _) => CalibrationStatus::Degraded("reference width unknown".to_string()),
		(_, None) => CalibrationStatus::Degraded("reference height unknown".to_string()),
	};

	match &status {
		CalibrationStatus::Calibrated => {
			info!(mm_per_pixel_x, mm_per_pixel_y, ?distance_m, "calibrated from reference box")
		}
		CalibrationStatus::Degraded(reason) => {
			warn!(%reason, mm_per_pixel_x, mm_per_pixel_y, ?distance_m, "partial calibration")
		}
	}

	Ok(CalibrationScale {
		mm_per_pixel_x: mm_per_pixel_x,
		mm_per_pixel_y: mm_per_pixel_y,
		distance_m: distance_m,
		reference: Some(*reference),
		status: status,
	})
}

/// Loads the reference box CSV and derives the scale. A missing file or row
/// degrades to pixel units instead of failing.
pub fn load_scale_from_file<P: AsRef<Path>>(
	path: P,
	real: &ReferenceObject,
	focal_length_px: f64,
) -> Result<CalibrationScale> {
	let path = path.as_ref();
	match records::load_reference_box(path)? {
		Some(reference) => load_scale(&reference, real, focal_length_px),
		None => Ok(CalibrationScale::uncalibrated(format!("reference box not found: {}", path.display()))),
	}
}

fn known_dimension(name: &str, value: Option<f64>) -> Result<Option<f64>> {
	match value {
		Some(mm) if !(mm.is_finite() && mm > 0.0) => Err(TrackError::GeometricDegenerate(format!(
			"reference {} must be positive, got {} mm",
			name, mm
		))),
		other => Ok(other),
	}
}
