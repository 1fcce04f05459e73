use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Writer};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrackError};
use crate::geometry::ReferenceBox;

/// One tracked observation in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
	#[serde(rename = "Time (seconds)")]
	pub time: f64,
	#[serde(rename = "X")]
	pub x: f64,
	#[serde(rename = "Y")]
	pub y: f64,
	#[serde(rename = "angle (degrees)")]
	pub angle: f64,
}

/// One reconstructed position, millimetres relative to the first sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
	#[serde(rename = "Time")]
	pub time: f64,
	#[serde(rename = "X")]
	pub x: f64,
	#[serde(rename = "Y")]
	pub y: f64,
	#[serde(rename = "Z")]
	pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocitySample {
	#[serde(rename = "Time")]
	pub time: f64,
	#[serde(rename = "Speed")]
	pub speed: f64,
}

/// Quality annotation of one tracking run, one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
	#[serde(rename = "Frames")]
	pub frames: usize,
	#[serde(rename = "Tracked")]
	pub tracked: usize,
	#[serde(rename = "Lost")]
	pub lost: usize,
	#[serde(rename = "Final ROI")]
	pub final_roi: String,
	#[serde(rename = "Otsu level")]
	pub otsu_level: Option<f64>,
}

/// Calibration state and motion summary of one reconstruction, one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectorySummary {
	#[serde(rename = "Samples")]
	pub samples: usize,
	#[serde(rename = "Calibration")]
	pub calibration: String,
	#[serde(rename = "mm/px X")]
	pub mm_per_pixel_x: f64,
	#[serde(rename = "mm/px Y")]
	pub mm_per_pixel_y: f64,
	#[serde(rename = "Distance (m)")]
	pub distance_m: Option<f64>,
	#[serde(rename = "Duration (s)")]
	pub duration: f64,
	#[serde(rename = "Path length (mm)")]
	pub path_length: f64,
	#[serde(rename = "Mean speed (mm/s)")]
	pub mean_speed: f64,
	#[serde(rename = "Peak speed (mm/s)")]
	pub peak_speed: f64,
}

#[derive(Debug, Deserialize)]
struct TimestampRow {
	#[serde(rename = "Timestamp (s)")]
	seconds: f64,
}

/// Per-frame capture times written by the recorder, indexed by frame number.
#[derive(Debug, Clone)]
pub struct TimestampLog {
	path: PathBuf,
	seconds: Vec<f64>,
}

impl TimestampLog {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let file = File::open(path).map_err(|e| TrackError::unavailable(path, e.to_string()))?;
		let log = Self::from_reader(file, path)?;
		info!(rows = log.len(), path = %path.display(), "loaded timestamps");
		Ok(log)
	}

	pub fn from_reader<R: Read>(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
		let seconds = rdr
			.deserialize::<TimestampRow>()
			.map(|row| row.map(|r| r.seconds))
			.collect::<std::result::Result<Vec<f64>, csv::Error>>()?;
		Self::from_seconds(seconds, path)
	}

	pub fn from_seconds(seconds: Vec<f64>, path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();

		if let Some(row) = seconds.iter().position(|t| !t.is_finite()) {
			return Err(TrackError::BadTimestamp {
				path: path,
				row: row,
				reason: "non-finite value".to_string(),
			});
		}
		if let Some((row, _)) = seconds.iter().tuple_windows().enumerate().find(|(_, (a, b))| b <= a) {
			return Err(TrackError::BadTimestamp {
				path: path,
				row: row + 1,
				reason: "timestamps are not strictly increasing".to_string(),
			});
		}

		Ok(Self {
			path: path,
			seconds: seconds,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn len(&self) -> usize {
		self.seconds.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seconds.is_empty()
	}

	/// Time of `frame`. A missing row is fatal: timing is never invented.
	pub fn at(&self, frame: usize) -> Result<f64> {
		self.seconds.get(frame).copied().ok_or(TrackError::TimestampMismatch {
			frame: frame,
			available: self.seconds.len(),
		})
	}
}

/// Reads the single-row reference box. `Ok(None)` when the file or its row is
/// missing, which callers treat as uncalibrated.
pub fn load_reference_box<P: AsRef<Path>>(path: P) -> Result<Option<ReferenceBox>> {
	let path = path.as_ref();
	let file = match File::open(path) {
		Ok(file) => file,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(TrackError::unavailable(path, e.to_string())),
	};
	read_reference_box(file)
}

pub fn read_reference_box<R: Read>(reader: R) -> Result<Option<ReferenceBox>> {
	let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
	match rdr.deserialize::<ReferenceBox>().next() {
		Some(row) => Ok(Some(row?)),
		None => Ok(None),
	}
}

pub fn write_reference_box<W: Write>(writer: W, reference: &ReferenceBox) -> Result<()> {
	let mut wtr = Writer::from_writer(writer);
	wtr.serialize(reference)?;
	wtr.flush()?;
	Ok(())
}

pub fn load_track_samples<P: AsRef<Path>>(path: P) -> Result<Vec<TrackSample>> {
	let path = path.as_ref();
	let file = File::open(path).map_err(|e| TrackError::unavailable(path, e.to_string()))?;
	read_track_samples(file)
}

pub fn read_track_samples<R: Read>(reader: R) -> Result<Vec<TrackSample>> {
	let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
	let samples = rdr.deserialize().collect::<std::result::Result<Vec<TrackSample>, csv::Error>>()?;
	Ok(samples)
}

/// Append-only position log, one row per tracked frame.
pub struct PositionWriter<W: Write> {
	wtr: Writer<W>,
	rows: usize,
}

impl<W: Write> PositionWriter<W> {
	pub fn new(writer: W) -> Self {
		Self {
			wtr: Writer::from_writer(writer),
			rows: 0,
		}
	}

	pub fn record(&mut self, sample: &TrackSample) -> Result<()> {
		self.wtr.serialize(sample)?;
		self.rows += 1;
		Ok(())
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	/// Flush and hand back the underlying writer.
	pub fn finish(self) -> Result<W> {
		self.wtr.into_inner().map_err(|e| TrackError::Io(e.into_error()))
	}
}

pub fn write_trajectory<W: Write>(writer: W, samples: &[TrajectorySample]) -> Result<()> {
	write_rows(writer, samples)
}

pub fn write_velocity<W: Write>(writer: W, samples: &[VelocitySample]) -> Result<()> {
	write_rows(writer, samples)
}

pub fn write_summary<W: Write, T: Serialize>(writer: W, summary: &T) -> Result<()> {
	write_rows(writer, std::slice::from_ref(summary))
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
	let mut wtr = Writer::from_writer(writer);
	for row in rows {
		wtr.serialize(row)?;
	}
	wtr.flush()?;
	Ok(())
}

pub fn create_output<P: AsRef<Path>>(path: P) -> Result<File> {
	let path = path.as_ref();
	File::create(path).map_err(|e| TrackError::unavailable(path, format!("cannot create output: {}", e)))
}
