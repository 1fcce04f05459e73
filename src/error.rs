use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackError>;

// Fatal conditions only. Lost frames and degraded calibration are reported, not raised.
#[derive(Debug, Error)]
pub enum TrackError {
	#[error("input unavailable: {}: {reason}", path.display())]
	InputUnavailable {
		path: PathBuf,
		reason: String,
	},

	#[error("no timestamp for frame {frame} (timestamp log has {available} rows)")]
	TimestampMismatch {
		frame: usize,
		available: usize,
	},

	#[error("timestamp log {} has {rows} rows but the video has {frames} frames", path.display())]
	FrameCountMismatch {
		path: PathBuf,
		rows: usize,
		frames: usize,
	},

	#[error("timestamp log {}: {reason} at row {row}", path.display())]
	BadTimestamp {
		path: PathBuf,
		row: usize,
		reason: String,
	},

	#[error("geometric degenerate input: {0}")]
	GeometricDegenerate(String),

	#[error("opencv: {0}")]
	OpenCv(#[from] opencv::Error),

	#[error("csv: {0}")]
	Csv(#[from] csv::Error),

	#[error("io: {0}")]
	Io(#[from] std::io::Error),

	#[error("settings: {0}")]
	Settings(#[from] toml::de::Error),
}

impl TrackError {
	pub fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		TrackError::InputUnavailable {
			path: path.into(),
			reason: reason.into(),
		}
	}
}
