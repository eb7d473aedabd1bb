use std::f64::consts::PI;

/// Gap left between a node border and an edge end
pub const ANCHOR_INSET: f64 = 2.0;
pub const ARROW_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Axis-aligned rectangle, y pointing down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn expanded(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Smallest rectangle holding every point, `None` for no points
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in iter {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Rect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Cubic Bézier segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    pub start: Point,
    pub c1: Point,
    pub c2: Point,
    pub end: Point,
}

impl Cubic {
    pub fn point_at(&self, t: f64) -> Point {
        let u = 1.0 - t;
        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        Point::new(
            a * self.start.x + b * self.c1.x + c * self.c2.x + d * self.end.x,
            a * self.start.y + b * self.c1.y + c * self.c2.y + d * self.end.y,
        )
    }

    /// `steps + 1` points along the curve, both ends included
    pub fn sample(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.point_at(i as f64 / steps as f64))
            .collect()
    }

    pub fn bounds(&self) -> Rect {
        // sample() never returns an empty list
        Rect::bounding(self.sample(32)).unwrap_or(Rect {
            x: self.start.x,
            y: self.start.y,
            width: 0.0,
            height: 0.0,
        })
    }
}

/// Where the segment from `center` towards `other` leaves a box of the given
/// half extents, pulled back by [`ANCHOR_INSET`]
pub fn anchor_towards(center: Point, half_width: f64, half_height: f64, other: Point) -> Point {
    let dx = other.x - center.x;
    let dy = other.y - center.y;
    if dx == 0.0 && dy == 0.0 {
        return center;
    }

    let angle = dy.atan2(dx);
    let (sin, cos) = angle.sin_cos();
    let tx = if cos != 0.0 {
        half_width / cos.abs()
    } else {
        f64::INFINITY
    };
    let ty = if sin != 0.0 {
        half_height / sin.abs()
    } else {
        f64::INFINITY
    };
    let t = tx.min(ty) - ANCHOR_INSET;
    Point::new(center.x + cos * t, center.y + sin * t)
}

/// Triangle `[tip, left, right]` at the end of the curve, aligned with its
/// last control segment
pub fn arrowhead(curve: &Cubic) -> [Point; 3] {
    let tip = curve.end;
    let angle = (tip.y - curve.c2.y).atan2(tip.x - curve.c2.x);
    let side = |a: f64| Point::new(tip.x - ARROW_SIZE * a.cos(), tip.y - ARROW_SIZE * a.sin());
    [tip, side(angle - PI / 6.0), side(angle + PI / 6.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn anchor_hits_the_vertical_side_for_horizontal_neighbours() {
        let p = anchor_towards(Point::new(0.0, 0.0), 40.0, 18.0, Point::new(200.0, 0.0));
        assert!(close(p, Point::new(38.0, 0.0)));
    }

    #[test]
    fn anchor_hits_the_horizontal_side_for_steep_neighbours() {
        let p = anchor_towards(Point::new(0.0, 0.0), 40.0, 18.0, Point::new(0.0, -100.0));
        assert!(close(p, Point::new(0.0, -16.0)));
    }

    #[test]
    fn coincident_centres_anchor_at_the_centre() {
        let c = Point::new(3.0, 4.0);
        assert_eq!(anchor_towards(c, 10.0, 10.0, c), c);
    }

    #[test]
    fn arrowhead_points_along_the_last_segment() {
        let curve = Cubic {
            start: Point::new(0.0, 0.0),
            c1: Point::new(10.0, 0.0),
            c2: Point::new(20.0, 0.0),
            end: Point::new(30.0, 0.0),
        };
        let [tip, left, right] = arrowhead(&curve);
        assert_eq!(tip, curve.end);
        assert!((tip.distance(left) - ARROW_SIZE).abs() < 1e-9);
        assert!((tip.distance(right) - ARROW_SIZE).abs() < 1e-9);
        assert!(left.x < tip.x && right.x < tip.x);
        assert!((left.y + right.y).abs() < 1e-9);
    }

    #[test]
    fn curve_endpoints_and_bounds() {
        let curve = Cubic {
            start: Point::new(0.0, 0.0),
            c1: Point::new(0.0, -40.0),
            c2: Point::new(100.0, -40.0),
            end: Point::new(100.0, 0.0),
        };
        assert!(close(curve.point_at(0.0), curve.start));
        assert!(close(curve.point_at(1.0), curve.end));
        let b = curve.bounds();
        assert!((b.y + 30.0).abs() < 1e-6);
        assert_eq!(b.width, 100.0);
    }
}
