use std::fs;
use std::path::Path;

use nalgebra::Matrix3;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, TrackError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub camera: CameraModel,
	#[serde(default)]
	pub reference: ReferenceObject,
	#[serde(default)]
	pub tracker: TrackerSettings,
	#[serde(default)]
	pub reconstruct: ReconstructSettings,
}

/// Pinhole intrinsics and OpenCV-ordered distortion `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraModel {
	#[serde(default = "default_fx")]
	pub fx: f64,
	#[serde(default = "default_fy")]
	pub fy: f64,
	#[serde(default = "default_cx")]
	pub cx: f64,
	#[serde(default = "default_cy")]
	pub cy: f64,
	#[serde(default = "default_distortion")]
	pub distortion: [f64; 5],
}

/// Physical size of the reference box. `None` means unknown; a `[reference]`
/// section that leaves a dimension out declares it unknown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceObject {
	#[serde(default)]
	pub width_mm: Option<f64>,
	#[serde(default)]
	pub height_mm: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSettings {
	/// Contours below this area (px^2) are ignored. 0 keeps everything.
	#[serde(default)]
	pub min_contour_area: f64,
	/// Fourcc of the annotated output video.
	#[serde(default = "default_codec")]
	pub codec: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconstructSettings {
	/// Moving-average window (samples) for the velocity profile.
	#[serde(default = "default_velocity_window")]
	pub velocity_window: usize,
}

// Bench camera, calibrated at 1920x1080.
fn default_fx() -> f64 {
	1397.9
}

fn default_fy() -> f64 {
	1403.0
}

fn default_cx() -> f64 {
	953.659
}

fn default_cy() -> f64 {
	555.1515
}

fn default_distortion() -> [f64; 5] {
	[0.1216, -0.1727, 0.0, 0.0, 0.0]
}

fn default_codec() -> String {
	"XVID".to_string()
}

fn default_velocity_window() -> usize {
	5
}

impl Default for CameraModel {
	fn default() -> Self {
		Self {
			fx: default_fx(),
			fy: default_fy(),
			cx: default_cx(),
			cy: default_cy(),
			distortion: default_distortion(),
		}
	}
}

impl Default for ReferenceObject {
	fn default() -> Self {
		Self {
			width_mm: Some(108.0),
			height_mm: Some(56.0),
		}
	}
}

impl Default for TrackerSettings {
	fn default() -> Self {
		Self {
			min_contour_area: 0.0,
			codec: default_codec(),
		}
	}
}

impl Default for ReconstructSettings {
	fn default() -> Self {
		Self {
			velocity_window: default_velocity_window(),
		}
	}
}

impl CameraModel {
	/// Distortion-free camera, mostly for synthetic footage.
	pub fn ideal(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
		Self {
			fx: fx,
			fy: fy,
			cx: cx,
			cy: cy,
			distortion: [0.0; 5],
		}
	}

	pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
		Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
	}

	pub fn has_distortion(&self) -> bool {
		self.distortion.iter().any(|&k| k != 0.0)
	}

	pub fn validate(&self) -> Result<()> {
		let finite = [self.fx, self.fy, self.cx, self.cy]
			.iter()
			.chain(self.distortion.iter())
			.all(|v| v.is_finite());
		if !finite || self.fx <= 0.0 || self.fy <= 0.0 {
			return Err(TrackError::GeometricDegenerate(format!(
				"camera intrinsics must be finite with positive focal lengths (fx={}, fy={})",
				self.fx, self.fy
			)));
		}
		Ok(())
	}
}

impl Settings {
	pub fn from_toml(content: &str) -> Result<Self> {
		let settings: Settings = toml::from_str(content)?;
		settings.camera.validate()?;
		Ok(settings)
	}

	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|e| TrackError::unavailable(path, e.to_string()))?;
		let settings = Self::from_toml(&content)?;
		info!(path = %path.display(), "loaded settings");
		Ok(settings)
	}

	/// Like [`Settings::load`], but a missing file yields the built-in defaults.
	pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		if path.exists() {
			Self::load(path)
		} else {
			warn!(path = %path.display(), "settings file not found, using built-in defaults");
			Ok(Self::default())
		}
	}
}
