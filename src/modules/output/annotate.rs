use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::Result;
use crate::geometry::Roi;
use crate::tracker::Observation;

fn red() -> Scalar {
	Scalar::new(0., 0., 255., 0.)
}

fn blue() -> Scalar {
	Scalar::new(255., 0., 0., 0.)
}

fn green() -> Scalar {
	Scalar::new(0., 255., 0., 0.)
}

fn yellow() -> Scalar {
	Scalar::new(0., 255., 255., 0.)
}

pub fn draw_observation(frame: &mut Mat, obs: &Observation) -> Result<()> {
	imgproc::rectangle(frame, Rect::from(obs.window), green(), 1, imgproc::LINE_8, 0)?;

	let mut cnt_draw = Vector::<Vector<Point>>::new();
	cnt_draw.push(obs.contour.clone());
	imgproc::draw_contours(
		frame,
		&cnt_draw,
		-1,
		blue(),
		1,
		imgproc::LINE_8,
		&Mat::default(),
		i32::MAX,
		Point::new(0, 0),
	)?;

	let mut corners = Mat::default();
	imgproc::box_points(obs.rect, &mut corners)?;
	let mut outline = Vector::<Point>::with_capacity(4);
	for i in 0..corners.rows() {
		let x = *corners.at_2d::<f32>(i, 0)?;
		let y = *corners.at_2d::<f32>(i, 1)?;
		outline.push(Point::new(x.round() as i32, y.round() as i32));
	}
	imgproc::polylines(frame, &outline, true, red(), 2, imgproc::LINE_8, 0)?;

	let center = Point::new(obs.center.0 as i32, obs.center.1 as i32);
	imgproc::circle(frame, center, 5, red(), -1, imgproc::LINE_8, 0)?;

	imgproc::put_text(
		frame,
		&format!("Orientation: {:.2} deg", obs.angle),
		Point::new(obs.window.x, obs.window.y - 10),
		imgproc::FONT_HERSHEY_SIMPLEX,
		0.7,
		red(),
		2,
		imgproc::LINE_8,
		false,
	)?;

	Ok(())
}

pub fn draw_lost(frame: &mut Mat, roi: Roi) -> Result<()> {
	imgproc::rectangle(frame, Rect::from(roi), yellow(), 1, imgproc::LINE_8, 0)?;
	imgproc::put_text(
		frame,
		"No object",
		Point::new(roi.x, roi.y - 10),
		imgproc::FONT_HERSHEY_SIMPLEX,
		0.7,
		yellow(),
		2,
		imgproc::LINE_8,
		false,
	)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::geometry::PixelRect;

	#[test]
	fn centre_dot_is_red() {
		let mut frame = Mat::new_rows_cols_with_default(200, 200, CV_8UC3, Scalar::all(255.)).unwrap();
		let rect = RotatedRect::new(Point2f::new(100., 100.), Size2f::new(40., 20.), 0.).unwrap();
		let obs = Observation {
			center: (100., 100.),
			angle: 0.,
			rect: rect,
			bounding: PixelRect::new(80, 90, 40, 20),
			contour: Vector::from_iter([Point::new(80, 90), Point::new(119, 90), Point::new(119, 109), Point::new(80, 109)]),
			window: PixelRect::new(60, 60, 80, 80),
		};

		draw_observation(&mut frame, &obs).unwrap();

		assert_eq!(frame.at_2d::<Vec3b>(100, 100).unwrap().0, [0, 0, 255]);
		// Window outline in green.
		assert_eq!(frame.at_2d::<Vec3b>(100, 60).unwrap().0, [0, 255, 0]);
		// Untouched background.
		assert_eq!(frame.at_2d::<Vec3b>(190, 190).unwrap().0, [255, 255, 255]);
	}
}
