//! Pixel track to millimetre trajectory, at a fixed depth with Z = 0.

use itertools::Itertools;
use nalgebra::Vector3;
use opencv::calib3d;
use opencv::core::*;
use opencv::prelude::*;
use tracing::{debug, info};

use crate::calibration::{CalibrationScale, CalibrationStatus};
use crate::error::{Result, TrackError};
use crate::records::{TrackSample, TrajectorySample, TrajectorySummary, VelocitySample};
use crate::settings::CameraModel;

const MM_PER_M: f64 = 1000.0;

/// Removes lens distortion from pixel coordinates, keeping them in pixels.
pub fn undistort(points: &[(f64, f64)], camera: &CameraModel) -> Result<Vec<(f64, f64)>> {
	if !camera.has_distortion() || points.is_empty() {
		return Ok(points.to_vec());
	}

	let k = camera.intrinsic_matrix();
	let camera_matrix = Mat::from_slice_2d(&[
		[k[(0, 0)], k[(0, 1)], k[(0, 2)]],
		[k[(1, 0)], k[(1, 1)], k[(1, 2)]],
		[k[(2, 0)], k[(2, 1)], k[(2, 2)]],
	])?
	.try_clone()?;
	let dist_coeffs = Mat::from_slice(&camera.distortion)?.try_clone()?;

	let src = points.iter().map(|&(x, y)| Point2d::new(x, y)).collect::<Vector<Point2d>>();
	let mut dst = Vector::<Point2d>::new();
	// Passing K as the new projection keeps the output in pixel units.
	calib3d::undistort_points(
		&src,
		&mut dst,
		&camera_matrix,
		&dist_coeffs,
		&Mat::default(),
		&camera_matrix,
	)?;

	Ok(dst.iter().map(|p| (p.x, p.y)).collect())
}

pub fn reconstruct(
	samples: &[TrackSample],
	camera: &CameraModel,
	scale: &CalibrationScale,
) -> Result<Vec<TrajectorySample>> {
	validate(samples)?;
	camera.validate()?;

	let pixels = samples.iter().map(|s| (s.x, s.y)).collect::<Vec<_>>();
	let corrected = undistort(&pixels, camera)?;

	let positions = match scale.distance_m {
		Some(depth) => {
			if !(depth.is_finite() && depth > 0.0) {
				return Err(TrackError::GeometricDegenerate(format!("camera distance {} m is not positive", depth)));
			}
			corrected
				.iter()
				.map(|&(u, v)| {
					Vector3::new((u - camera.cx) * depth / camera.fx, (v - camera.cy) * depth / camera.fy, 0.0)
				})
				.collect::<Vec<_>>()
		}
		None => {
			// No depth: pixel displacement at the fallback mm/pixel scale, already in mm.
			corrected
				.iter()
				.map(|&(u, v)| {
					Vector3::new(u * scale.mm_per_pixel_x / MM_PER_M, v * scale.mm_per_pixel_y / MM_PER_M, 0.0)
				})
				.collect::<Vec<_>>()
		}
	};

	let origin = positions[0];
	let trajectory = samples
		.iter()
		.zip(positions.iter())
		.map(|(sample, p)| {
			let mm = (p - origin) * MM_PER_M;
			TrajectorySample {
				time: sample.time,
				x: mm.x,
				y: mm.y,
				z: mm.z,
			}
		})
		.collect::<Vec<_>>();

	let finite = |s: &TrajectorySample| s.x.is_finite() && s.y.is_finite() && s.z.is_finite();
	if let Some((idx, _)) = trajectory.iter().find_position(|s| !finite(s)) {
		return Err(TrackError::GeometricDegenerate(format!(
			"sample {} reconstructs to a non-finite position",
			idx
		)));
	}

	debug!(samples = trajectory.len(), degraded = scale.is_degraded(), "reconstructed trajectory");
	Ok(trajectory)
}

fn validate(samples: &[TrackSample]) -> Result<()> {
	if samples.is_empty() {
		return Err(TrackError::GeometricDegenerate("track has no samples".to_string()));
	}
	if let Some((idx, _)) = samples
		.iter()
		.find_position(|s| !(s.time.is_finite() && s.x.is_finite() && s.y.is_finite()))
	{
		return Err(TrackError::GeometricDegenerate(format!(
			"sample {} has a non-finite time or position",
			idx
		)));
	}
	if let Some((idx, _)) = samples.iter().tuple_windows().find_position(|(a, b)| b.time <= a.time) {
		return Err(TrackError::GeometricDegenerate(format!(
			"sample {} is not later than the one before it",
			idx + 1
		)));
	}
	Ok(())
}

fn distance(a: &TrajectorySample, b: &TrajectorySample) -> f64 {
	Vector3::new(b.x - a.x, b.y - a.y, b.z - a.z).norm()
}

/// Speed over each interval (mm/s, stamped at the interval end), smoothed by a
/// centred moving average of `window` samples. A window of 0 or 1 leaves it raw.
pub fn velocity_profile(trajectory: &[TrajectorySample], window: usize) -> Vec<VelocitySample> {
	let raw = trajectory
		.iter()
		.tuple_windows()
		.map(|(a, b)| VelocitySample {
			time: b.time,
			speed: distance(a, b) / (b.time - a.time),
		})
		.collect::<Vec<_>>();

	let half = window / 2;
	(0..raw.len())
		.map(|i| {
			let lo = i.saturating_sub(half);
			let hi = (i + half).min(raw.len() - 1);
			let span = &raw[lo..=hi];
			VelocitySample {
				time: raw[i].time,
				speed: span.iter().map(|v| v.speed).sum::<f64>() / span.len() as f64,
			}
		})
		.collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryStats {
	pub duration: f64,
	pub path_length: f64,
	pub mean_speed: f64,
	pub peak_speed: f64,
}

impl TrajectoryStats {
	pub fn new(trajectory: &[TrajectorySample], velocity: &[VelocitySample]) -> Self {
		let duration = match (trajectory.first(), trajectory.last()) {
			(Some(first), Some(last)) => last.time - first.time,
			_ => 0.0,
		};
		let path_length = trajectory.iter().tuple_windows().map(|(a, b)| distance(a, b)).sum::<f64>();
		let mean_speed = if duration > 0.0 { path_length / duration } else { 0.0 };
		let peak_speed = velocity.iter().map(|v| v.speed).fold(0.0, f64::max);

		Self {
			duration: duration,
			path_length: path_length,
			mean_speed: mean_speed,
			peak_speed: peak_speed,
		}
	}

	/// Row for the summary sidecar, carrying the calibration state alongside.
	pub fn summary_row(&self, samples: usize, scale: &CalibrationScale) -> TrajectorySummary {
		let calibration = match &scale.status {
			CalibrationStatus::Calibrated => "calibrated".to_string(),
			CalibrationStatus::Degraded(reason) => format!("degraded: {}", reason),
		};

		TrajectorySummary {
			samples: samples,
			calibration: calibration,
			mm_per_pixel_x: scale.mm_per_pixel_x,
			mm_per_pixel_y: scale.mm_per_pixel_y,
			distance_m: scale.distance_m,
			duration: self.duration,
			path_length: self.path_length,
			mean_speed: self.mean_speed,
			peak_speed: self.peak_speed,
		}
	}

	pub fn log(&self) {
		info!(
			duration_s = self.duration,
			path_length_mm = self.path_length,
			mean_speed_mm_s = self.mean_speed,
			peak_speed_mm_s = self.peak_speed,
			"trajectory summary"
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::calibration::{CalibrationStatus, UNIT_SCALE};
	use crate::records;
	use approx::assert_relative_eq;

	fn sample(time: f64, x: f64, y: f64) -> TrackSample {
		TrackSample {
			time: time,
			x: x,
			y: y,
			angle: 0.0,
		}
	}

	fn half_metre() -> CalibrationScale {
		CalibrationScale {
			mm_per_pixel_x: 0.5,
			mm_per_pixel_y: 0.5,
			distance_m: Some(0.5),
			reference: None,
			status: CalibrationStatus::Calibrated,
		}
	}

	fn bench() -> CameraModel {
		CameraModel::ideal(1400.0, 1400.0, 960.0, 540.0)
	}

	#[test]
	fn fifty_pixels_at_half_a_metre() {
		let samples = [sample(0.0, 960.0, 540.0), sample(0.1, 1010.0, 540.0)];
		let trajectory = reconstruct(&samples, &bench(), &half_metre()).unwrap();

		assert_eq!(trajectory.len(), 2);
		assert_eq!(trajectory[0], TrajectorySample { time: 0.0, x: 0.0, y: 0.0, z: 0.0 });
		assert_relative_eq!(trajectory[1].time, 0.1);
		assert_relative_eq!(trajectory[1].x, 50.0 * 0.5 / 1400.0 * 1000.0, epsilon = 1e-9);
		assert_relative_eq!(trajectory[1].x, 17.857, epsilon = 1e-3);
		assert_eq!(trajectory[1].y, 0.0);
		assert_eq!(trajectory[1].z, 0.0);
	}

	#[test]
	fn first_sample_is_origin_wherever_it_starts() {
		let samples = [sample(1.0, 13.25, 1071.5), sample(1.5, 400.0, 12.0), sample(2.0, 7.0, 7.0)];
		let trajectory = reconstruct(&samples, &bench(), &half_metre()).unwrap();
		assert_eq!((trajectory[0].x, trajectory[0].y, trajectory[0].z), (0.0, 0.0, 0.0));
		assert_eq!(trajectory.len(), samples.len());
	}

	#[test]
	fn same_input_gives_identical_csv() {
		let samples = [sample(0.0, 900.0, 500.0), sample(0.04, 911.5, 498.25), sample(0.08, 925.0, 497.0)];
		let camera = CameraModel::default();

		let mut first = Vec::new();
		records::write_trajectory(&mut first, &reconstruct(&samples, &camera, &half_metre()).unwrap()).unwrap();
		let mut second = Vec::new();
		records::write_trajectory(&mut second, &reconstruct(&samples, &camera, &half_metre()).unwrap()).unwrap();

		assert_eq!(first, second);
		assert!(String::from_utf8(first).unwrap().starts_with("Time,X,Y,Z\n"));
	}

	#[test]
	fn barrel_distortion_shrinks_off_axis_offsets() {
		let camera = CameraModel::default();
		let points = [(camera.cx, camera.cy), (camera.cx + 100.0, camera.cy)];
		let corrected = undistort(&points, &camera).unwrap();

		assert_relative_eq!(corrected[0].0, camera.cx, epsilon = 1e-6);
		assert_relative_eq!(corrected[0].1, camera.cy, epsilon = 1e-6);
		let offset = corrected[1].0 - camera.cx;
		assert!(offset < 100.0 && offset > 99.0, "offset {}", offset);
	}

	#[test]
	fn ideal_lens_passes_points_through() {
		let points = [(12.5, 800.0), (1900.0, 3.0)];
		assert_eq!(undistort(&points, &bench()).unwrap(), points.to_vec());
	}

	#[test]
	fn empty_track_is_rejected() {
		let err = reconstruct(&[], &bench(), &half_metre()).unwrap_err();
		assert!(matches!(err, TrackError::GeometricDegenerate(_)));
	}

	#[test]
	fn nan_pixel_is_rejected_with_its_index() {
		let samples = [sample(0.0, 1.0, 1.0), sample(0.1, f64::NAN, 1.0)];
		match reconstruct(&samples, &bench(), &half_metre()) {
			Err(TrackError::GeometricDegenerate(msg)) => assert!(msg.contains("sample 1"), "{}", msg),
			other => panic!("expected GeometricDegenerate, got {:?}", other),
		}
	}

	#[test]
	fn repeated_time_is_rejected() {
		let samples = [sample(0.0, 1.0, 1.0), sample(0.0, 2.0, 1.0)];
		assert!(reconstruct(&samples, &bench(), &half_metre()).is_err());
	}

	#[test]
	fn degraded_scale_reports_pixel_displacement() {
		let samples = [sample(0.0, 100.0, 200.0), sample(1.0, 130.0, 160.0)];
		let scale = CalibrationScale::uncalibrated("no box");
		let trajectory = reconstruct(&samples, &bench(), &scale).unwrap();

		assert_relative_eq!(trajectory[1].x, 30.0 * UNIT_SCALE, epsilon = 1e-9);
		assert_relative_eq!(trajectory[1].y, -40.0 * UNIT_SCALE, epsilon = 1e-9);
		assert_eq!(trajectory[1].z, 0.0);
	}

	#[test]
	fn velocity_from_constant_motion() {
		let trajectory = (0..6)
			.map(|i| TrajectorySample {
				time: i as f64 * 0.5,
				x: i as f64 * 3.0,
				y: i as f64 * 4.0,
				z: 0.0,
			})
			.collect::<Vec<_>>();

		let velocity = velocity_profile(&trajectory, 3);
		assert_eq!(velocity.len(), 5);
		for v in &velocity {
			assert_relative_eq!(v.speed, 10.0, epsilon = 1e-9);
		}
		assert_relative_eq!(velocity[0].time, 0.5);

		let stats = TrajectoryStats::new(&trajectory, &velocity);
		assert_relative_eq!(stats.duration, 2.5);
		assert_relative_eq!(stats.path_length, 25.0, epsilon = 1e-9);
		assert_relative_eq!(stats.mean_speed, 10.0, epsilon = 1e-9);
		assert_relative_eq!(stats.peak_speed, 10.0, epsilon = 1e-9);
	}

	#[test]
	fn moving_average_smooths_a_spike() {
		let points = [0.0, 1.0, 2.0, 12.0, 13.0, 14.0];
		let trajectory = points
			.iter()
			.enumerate()
			.map(|(i, &x)| TrajectorySample { time: i as f64, x: x, y: 0.0, z: 0.0 })
			.collect::<Vec<_>>();

		let raw = velocity_profile(&trajectory, 1);
		assert_eq!(raw.iter().map(|v| v.speed).collect::<Vec<_>>(), vec![1.0, 1.0, 10.0, 1.0, 1.0]);

		let smooth = velocity_profile(&trajectory, 3);
		assert_relative_eq!(smooth[2].speed, 4.0, epsilon = 1e-9);
		assert_relative_eq!(smooth[0].speed, 1.0, epsilon = 1e-9);
	}

	#[test]
	fn summary_flags_a_degraded_scale() {
		let samples = [sample(0.0, 100.0, 200.0), sample(1.0, 130.0, 160.0)];
		let scale = CalibrationScale::uncalibrated("no box");
		let trajectory = reconstruct(&samples, &bench(), &scale).unwrap();
		let velocity = velocity_profile(&trajectory, 1);

		let row = TrajectoryStats::new(&trajectory, &velocity).summary_row(trajectory.len(), &scale);
		assert_eq!(row.calibration, "degraded: no box");
		assert_eq!(row.samples, 2);
		assert_eq!(row.distance_m, None);
		assert_relative_eq!(row.path_length, 50.0, epsilon = 1e-9);

		let row = TrajectoryStats::new(&trajectory, &velocity).summary_row(2, &half_metre());
		assert_eq!(row.calibration, "calibrated");
		assert_eq!(row.distance_m, Some(0.5));
	}

	#[test]
	fn single_sample_has_no_velocity() {
		let trajectory = [TrajectorySample { time: 0.0, x: 0.0, y: 0.0, z: 0.0 }];
		assert!(velocity_profile(&trajectory, 5).is_empty());
		assert_eq!(TrajectoryStats::new(&trajectory, &[]).mean_speed, 0.0);
	}
}
