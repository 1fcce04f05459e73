pub mod calibration;
pub mod error;
pub mod geometry;
pub mod modules;
pub mod paths;
pub mod reconstruct;
pub mod records;
pub mod settings;
pub mod tracker;

pub use crate::calibration::{load_scale, load_scale_from_file, CalibrationScale, CalibrationStatus};
pub use crate::error::{Result, TrackError};
pub use crate::geometry::{PixelRect, ReferenceBox, Roi};
pub use crate::reconstruct::{reconstruct, velocity_profile, TrajectoryStats};
pub use crate::records::{TrackSample, TrajectorySample, VelocitySample};
pub use crate::settings::{CameraModel, Settings};
pub use crate::tracker::{ContourTracker, Selection, TrackReport};
