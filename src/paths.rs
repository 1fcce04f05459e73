use std::path::{Path, PathBuf};

/// File names produced around one recording. A recording `<stem>.avi` sits
/// next to its session files, where the session name is the stem without a
/// trailing `_camN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
	pub video: PathBuf,
	pub timestamps: PathBuf,
	pub reference_box: PathBuf,
	pub locations: PathBuf,
	pub tracking_video: PathBuf,
	pub track_summary: PathBuf,
	pub trajectory: PathBuf,
	pub velocity: PathBuf,
	pub summary: PathBuf,
}

impl RunPaths {
	pub fn for_video<P: AsRef<Path>>(video: P) -> Self {
		let video = video.as_ref();
		let dir = video.parent().map(Path::to_path_buf).unwrap_or_default();
		let stem = video.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
		let session = session_name(&stem);

		Self {
			video: video.to_path_buf(),
			timestamps: dir.join(format!("{}_timestamps.csv", session)),
			reference_box: dir.join(format!("{}_box.csv", stem)),
			locations: dir.join(format!("{}_locations.csv", stem)),
			tracking_video: dir.join(format!("{}_tracking.avi", stem)),
			track_summary: dir.join(format!("{}_tracking_summary.csv", stem)),
			trajectory: dir.join(format!("{}_Trajectory.csv", session)),
			velocity: dir.join(format!("{}_Velocity.csv", session)),
			summary: dir.join(format!("{}_Summary.csv", session)),
		}
	}

	/// Paths for reconstructing from an existing `<stem>_locations.csv`.
	pub fn for_locations<P: AsRef<Path>>(locations: P) -> Self {
		let locations = locations.as_ref();
		let name = locations.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
		let stem = name.strip_suffix("_locations.csv").unwrap_or(&name);
		let video = locations.with_file_name(format!("{}.avi", stem));

		Self {
			locations: locations.to_path_buf(),
			..Self::for_video(video)
		}
	}

	/// Moves the trajectory to `trajectory`, with the velocity and summary
	/// files following it into the same directory and name.
	pub fn with_trajectory<P: AsRef<Path>>(self, trajectory: P) -> Self {
		let trajectory = trajectory.as_ref();
		let stem = trajectory.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
		let base = stem.strip_suffix("_Trajectory").unwrap_or(&stem);

		Self {
			velocity: trajectory.with_file_name(format!("{}_Velocity.csv", base)),
			summary: trajectory.with_file_name(format!("{}_Summary.csv", base)),
			trajectory: trajectory.to_path_buf(),
			..self
		}
	}
}

fn session_name(stem: &str) -> &str {
	match stem.rfind("_cam") {
		Some(idx) => {
			let suffix = &stem[idx + 4..];
			if suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_digit()) {
				&stem[..idx]
			} else {
				stem
			}
		}
		None => stem,
	}
}
