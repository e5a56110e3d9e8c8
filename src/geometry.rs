use imageproc::point::Point;
use imageproc::rect::Rect;

/// The four corners of a detected sheet boundary in drawing order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Corners {
    /// Orders four arbitrary vertices into top-left, top-right,
    /// bottom-right, bottom-left. The top-left corner minimizes x + y, the
    /// bottom-right maximizes it, and the y - x difference separates the
    /// remaining two.
    pub fn order(points: &[Point<f32>; 4]) -> Self {
        let sum = |p: &Point<f32>| p.x + p.y;
        let diff = |p: &Point<f32>| p.y - p.x;

        let top_left = *points
            .iter()
            .min_by(|a, b| sum(a).total_cmp(&sum(b)))
            .expect("four points");
        let bottom_right = *points
            .iter()
            .max_by(|a, b| sum(a).total_cmp(&sum(b)))
            .expect("four points");
        let top_right = *points
            .iter()
            .min_by(|a, b| diff(a).total_cmp(&diff(b)))
            .expect("four points");
        let bottom_left = *points
            .iter()
            .max_by(|a, b| diff(a).total_cmp(&diff(b)))
            .expect("four points");

        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Resolves a five-vertex boundary, where a corner fold or printed
    /// registration artifact split the bottom-left corner in two. The two
    /// bottom-left candidates collapse to one corner, leveled with the
    /// bottom-right so the bottom edge stays horizontal.
    pub fn from_five(points: &[Point<f32>; 5]) -> Self {
        let mut sorted = *points;
        sorted.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

        let (top, bottom) = sorted.split_at(2);
        let (top_left, top_right) = if top[0].x <= top[1].x {
            (top[0], top[1])
        } else {
            (top[1], top[0])
        };

        let mut bottom = [bottom[0], bottom[1], bottom[2]];
        bottom.sort_by(|a, b| a.x.total_cmp(&b.x));
        let bottom_right = bottom[2];
        let bottom_left = Point::new(bottom[0].x, bottom_right.y);

        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Output dimensions for rectification: the longer of each pair of
    /// opposing edges.
    pub fn rectified_size(&self) -> (u32, u32) {
        let width = distance_from_point_to_point(&self.bottom_right, &self.bottom_left)
            .max(distance_from_point_to_point(&self.top_right, &self.top_left));
        let height = distance_from_point_to_point(&self.top_right, &self.bottom_right)
            .max(distance_from_point_to_point(&self.top_left, &self.bottom_left));
        ((width.round() as u32).max(1), (height.round() as u32).max(1))
    }
}

/// A circle guaranteed to contain a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnclosingCircle {
    pub center: Point<f32>,
    pub radius: f32,
}

/// Ritter's two-pass bounding circle: seed from a far-apart pair, then grow
/// toward any point left outside. Never under-covers, over-covers by a few
/// percent at worst.
pub fn enclosing_circle(points: &[Point<i32>]) -> EnclosingCircle {
    let mut circle = EnclosingCircle {
        center: Point::new(0.0, 0.0),
        radius: 0.0,
    };
    let Some(first) = points.first() else {
        return circle;
    };

    let first = point_to_f32(first);
    let a = farthest_from(points, &first);
    let b = farthest_from(points, &a);
    circle.center = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    circle.radius = distance_from_point_to_point(&a, &b) / 2.0;

    for point in points {
        let point = point_to_f32(point);
        let d = distance_from_point_to_point(&circle.center, &point);
        if d > circle.radius {
            let grown = (circle.radius + d) / 2.0;
            let shift = (d - grown) / d;
            circle.center = Point::new(
                circle.center.x + (point.x - circle.center.x) * shift,
                circle.center.y + (point.y - circle.center.y) * shift,
            );
            circle.radius = grown;
        }
    }
    circle
}

fn farthest_from(points: &[Point<i32>], origin: &Point<f32>) -> Point<f32> {
    points
        .iter()
        .map(point_to_f32)
        .max_by(|a, b| {
            distance_from_point_to_point(origin, a)
                .total_cmp(&distance_from_point_to_point(origin, b))
        })
        .unwrap_or(*origin)
}

pub fn point_to_f32(point: &Point<i32>) -> Point<f32> {
    Point::new(point.x as f32, point.y as f32)
}

pub fn distance_from_point_to_point(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}

pub fn center_of_rect(rect: &Rect) -> Point<f32> {
    Point::new(
        rect.left() as f32 + rect.width() as f32 / 2.0,
        rect.top() as f32 + rect.height() as f32 / 2.0,
    )
}

/// Signed shoelace area, returned as an absolute value.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled: i64 = 0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        doubled += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    doubled.unsigned_abs() as f64 / 2.0
}

/// Axis-aligned bounding rectangle of a contour.
pub fn contour_bounding_rect(points: &[Point<i32>]) -> Rect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    if points.is_empty() {
        return Rect::at(0, 0).of_size(1, 1);
    }
    Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}
