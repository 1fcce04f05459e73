mod contourarea;

pub use contourarea::ContourArea;

use std::cmp::Ordering;

use itertools::Itertools;

use crate::modules::{FilterModule, TrackingData};

/// Runs every filter, then keeps the contour with the largest enclosed area.
pub fn select_largest(
	mut objects: Vec<TrackingData>,
	filters: &mut [Box<dyn FilterModule>],
) -> Option<TrackingData> {
	for module in filters.iter_mut() {
		objects.retain(|obj| module.run(obj));
	}

	let idx = objects
		.iter()
		.position_max_by(|a, b| a.area.partial_cmp(&b.area).unwrap_or(Ordering::Equal))?;
	Some(objects.swap_remove(idx))
}
