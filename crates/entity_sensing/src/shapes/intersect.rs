//! Pairwise shape intersection
//!
//! Every unordered pair of shape kinds has exactly one function here, and
//! [`shapes_intersect`] routes both argument orders to it, so
//! `a.intersects(b) == b.intersects(a)` holds by construction. Same-kind
//! pairs whose test is not symmetric internally evaluate both directions.
//!
//! Cone tests rely on one fact: if a connected region `C` meets a region `S`,
//! then either `C` lies entirely inside `S` (so any point of `C` is in `S`)
//! or `C` crosses the boundary of `S`.

use crate::foundation::math::{utils, Vec2};
use super::cone::AngleWindow;
use super::{AxisAlignedRect, BoxShape, CircleShape, ConeShape, RayShape, Shape};

const EPSILON: f32 = 1e-6;

/// Route a pair of shapes to its intersection test
pub fn shapes_intersect(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => circle_circle(a, b),
        (Shape::Box(a), Shape::Box(b)) => box_box(a, b),
        (Shape::Cone(a), Shape::Cone(b)) => cone_cone(a, b),
        (Shape::Ray(a), Shape::Ray(b)) => ray_ray(a, b),

        (Shape::Box(bx), Shape::Circle(circle)) | (Shape::Circle(circle), Shape::Box(bx)) => {
            box_circle(bx, circle)
        }
        (Shape::Box(bx), Shape::Cone(cone)) | (Shape::Cone(cone), Shape::Box(bx)) => {
            box_cone(bx, cone)
        }
        (Shape::Box(bx), Shape::Ray(ray)) | (Shape::Ray(ray), Shape::Box(bx)) => {
            box_ray(bx, ray)
        }
        (Shape::Circle(circle), Shape::Cone(cone)) | (Shape::Cone(cone), Shape::Circle(circle)) => {
            circle_cone(circle, cone)
        }
        (Shape::Circle(circle), Shape::Ray(ray)) | (Shape::Ray(ray), Shape::Circle(circle)) => {
            circle_ray(circle, ray)
        }
        (Shape::Cone(cone), Shape::Ray(ray)) | (Shape::Ray(ray), Shape::Cone(cone)) => {
            cone_ray(cone, ray)
        }
    }
}

/// Two rings meet when their closest points are no farther apart than zero
pub fn circle_circle(a: &CircleShape, b: &CircleShape) -> bool {
    let distance = (a.position() - b.position()).magnitude();
    distance <= a.max_radius() + b.max_radius()
        && a.min_radius() <= distance + b.max_radius()
        && b.min_radius() <= distance + a.max_radius()
}

/// Overlap, or containment for each box using the containment policy
pub fn box_box(a: &BoxShape, b: &BoxShape) -> bool {
    let (rect_a, rect_b) = (a.bounding_rect(), b.bounding_rect());
    rect_a.intersects(&rect_b)
        && (a.use_intersects() || rect_a.contains_rect(&rect_b))
        && (b.use_intersects() || rect_b.contains_rect(&rect_a))
}

/// Box against ring
pub fn box_circle(bx: &BoxShape, circle: &CircleShape) -> bool {
    let rect = bx.bounding_rect();
    if !bx.use_intersects() {
        return rect.contains_rect(&circle.bounding_rect());
    }
    let center = circle.position();
    let nearest_sq = (rect.closest_point(center) - center).magnitude_squared();
    let farthest_sq = (rect.farthest_point(center) - center).magnitude_squared();
    nearest_sq <= circle.max_radius_sq() && farthest_sq >= circle.min_radius_sq()
}

/// Box against cone
pub fn box_cone(bx: &BoxShape, cone: &ConeShape) -> bool {
    let rect = bx.bounding_rect();
    if !rect.intersects(&cone.bounding_rect()) {
        return false;
    }
    if !bx.use_intersects() {
        return rect.contains_rect(&cone.bounding_rect());
    }
    rect.contains(cone.interior_point())
        || rect.edges().iter().any(|&(a, b)| segment_meets_cone(a, b, cone))
}

/// Box against segment
pub fn box_ray(bx: &BoxShape, ray: &RayShape) -> bool {
    let rect = bx.bounding_rect();
    if !bx.use_intersects() {
        return rect.contains(ray.start_position()) && rect.contains(ray.end_position());
    }
    segment_rect_entry(ray.start_position(), ray.end_position(), &rect).is_some()
}

/// Ring against cone
pub fn circle_cone(circle: &CircleShape, cone: &ConeShape) -> bool {
    if !circle.bounding_rect().intersects(&cone.bounding_rect()) {
        return false;
    }
    circle.contains_point(cone.interior_point())
        || ring_arcs(circle).into_iter().flatten().any(|arc| arc_meets_cone(&arc, cone))
}

/// Ring against segment: the distance from the ring center to the segment
/// sweeps a continuous range that must overlap `[min_radius, max_radius]`
pub fn circle_ray(circle: &CircleShape, ray: &RayShape) -> bool {
    let center = circle.position();
    let (start, end) = (ray.start_position(), ray.end_position());
    let nearest_sq = segment_distance_sq(center, start, end);
    let farthest_sq = (start - center)
        .magnitude_squared()
        .max((end - center).magnitude_squared());
    nearest_sq <= circle.max_radius_sq() && farthest_sq >= circle.min_radius_sq()
}

/// Cone against cone
pub fn cone_cone(a: &ConeShape, b: &ConeShape) -> bool {
    if !a.bounding_rect().intersects(&b.bounding_rect()) {
        return false;
    }
    cone_meets_cone(a, b) || cone_meets_cone(b, a)
}

/// Cone against segment
pub fn cone_ray(cone: &ConeShape, ray: &RayShape) -> bool {
    segment_meets_cone(ray.start_position(), ray.end_position(), cone)
}

/// Segment against segment
pub fn ray_ray(a: &RayShape, b: &RayShape) -> bool {
    segments_intersect(a.start_position(), a.end_position(), b.start_position(), b.end_position())
}

/// Whether `a` lies in `b` or crosses the boundary of `b`
fn cone_meets_cone(a: &ConeShape, b: &ConeShape) -> bool {
    if b.contains_point(a.interior_point()) {
        return true;
    }
    if let Some(edges) = b.radial_edges() {
        if edges.iter().any(|&(start, end)| segment_meets_cone(start, end, a)) {
            return true;
        }
    }
    cone_arcs(b).into_iter().flatten().any(|arc| arc_meets_cone(&arc, a))
}

/// Piece of a circle limited to a window of directions
#[derive(Debug, Clone, Copy)]
struct Arc {
    center: Vec2,
    radius: f32,
    window: AngleWindow,
}

impl Arc {
    fn endpoints(&self) -> [Vec2; 2] {
        [
            self.center + utils::direction(self.window.start()) * self.radius,
            self.center + utils::direction(self.window.end()) * self.radius,
        ]
    }

    /// For a point already known to be on the circle
    fn spans(&self, point: Vec2) -> bool {
        let offset = point - self.center;
        self.window.contains(offset.y.atan2(offset.x))
    }
}

fn ring_arcs(circle: &CircleShape) -> [Option<Arc>; 2] {
    let arc = |radius: f32| Arc {
        center: circle.position(),
        radius,
        window: AngleWindow::full(),
    };
    [
        Some(arc(circle.max_radius())),
        (circle.min_radius() > 0.0).then(|| arc(circle.min_radius())),
    ]
}

fn cone_arcs(cone: &ConeShape) -> [Option<Arc>; 2] {
    let circle = cone.circle();
    let arc = |radius: f32| Arc {
        center: circle.position(),
        radius,
        window: cone.window(),
    };
    [
        Some(arc(circle.max_radius())),
        (circle.min_radius() > 0.0).then(|| arc(circle.min_radius())),
    ]
}

fn segment_meets_cone(a: Vec2, b: Vec2, cone: &ConeShape) -> bool {
    if cone.contains_point(a) || cone.contains_point(b) {
        return true;
    }
    if let Some(edges) = cone.radial_edges() {
        if edges.iter().any(|&(start, end)| segments_intersect(a, b, start, end)) {
            return true;
        }
    }
    cone_arcs(cone).into_iter().flatten().any(|arc| {
        segment_circle_params(a, b, arc.center, arc.radius)
            .into_iter()
            .flatten()
            .any(|t| arc.spans(a + (b - a) * t))
    })
}

fn arc_meets_cone(arc: &Arc, cone: &ConeShape) -> bool {
    if arc.radius <= 0.0 {
        return cone.contains_point(arc.center);
    }
    if arc.endpoints().iter().any(|&p| cone.contains_point(p)) {
        return true;
    }
    if let Some(edges) = cone.radial_edges() {
        let crosses_edge = edges.iter().any(|&(start, end)| {
            segment_circle_params(start, end, arc.center, arc.radius)
                .into_iter()
                .flatten()
                .any(|t| arc.spans(start + (end - start) * t))
        });
        if crosses_edge {
            return true;
        }
    }
    cone_arcs(cone).into_iter().flatten().any(|cone_arc| {
        circle_crossings(cone_arc.center, cone_arc.radius, arc.center, arc.radius)
            .is_some_and(|points| points.iter().any(|&p| cone_arc.spans(p) && arc.spans(p)))
    })
}

/// Closest point of segment `a`-`b` to `point`
pub(crate) fn closest_point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let length_sq = ab.magnitude_squared();
    if length_sq < EPSILON * EPSILON {
        return a;
    }
    let t = ((point - a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Squared distance from `point` to segment `a`-`b`
pub(crate) fn segment_distance_sq(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    (closest_point_on_segment(point, a, b) - point).magnitude_squared()
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    utils::cross(b - a, c - a)
}

/// For `p` collinear with `a`-`b`: whether it lies between them
fn within_span(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether segments `a0`-`a1` and `b0`-`b1` share a point
pub(crate) fn segments_intersect(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> bool {
    let d1 = orientation(b0, b1, a0);
    let d2 = orientation(b0, b1, a1);
    let d3 = orientation(a0, a1, b0);
    let d4 = orientation(a0, a1, b1);

    let straddles = |p: f32, q: f32| (p > 0.0 && q < 0.0) || (p < 0.0 && q > 0.0);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }

    (d1 == 0.0 && within_span(b0, b1, a0))
        || (d2 == 0.0 && within_span(b0, b1, a1))
        || (d3 == 0.0 && within_span(a0, a1, b0))
        || (d4 == 0.0 && within_span(a0, a1, b1))
}

/// Parameter in `[0, 1]` at which segment `a`-`b` first touches `rect`
/// (Liang-Barsky clipping); `0.0` when `a` starts inside
pub(crate) fn segment_rect_entry(a: Vec2, b: Vec2, rect: &AxisAlignedRect) -> Option<f32> {
    let delta = b - a;
    let mut t_enter = 0.0_f32;
    let mut t_exit = 1.0_f32;
    let clips = [
        (-delta.x, a.x - rect.min.x),
        (delta.x, rect.max.x - a.x),
        (-delta.y, a.y - rect.min.y),
        (delta.y, rect.max.y - a.y),
    ];
    for (p, q) in clips {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t_exit {
                return None;
            }
            t_enter = t_enter.max(r);
        } else {
            if r < t_enter {
                return None;
            }
            t_exit = t_exit.min(r);
        }
    }
    Some(t_enter)
}

/// Parameters in `[0, 1]` where segment `a`-`b` crosses the circle
fn segment_circle_params(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> [Option<f32>; 2] {
    let d = b - a;
    let f = a - center;
    let qa = d.dot(&d);
    if qa < EPSILON * EPSILON {
        return [None, None];
    }
    let qb = 2.0 * f.dot(&d);
    let qc = f.dot(&f) - radius * radius;
    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 {
        return [None, None];
    }
    let root = discriminant.sqrt();
    let in_range = |t: f32| (-EPSILON..=1.0 + EPSILON).contains(&t).then(|| t.clamp(0.0, 1.0));
    [
        in_range((-qb - root) / (2.0 * qa)),
        in_range((-qb + root) / (2.0 * qa)),
    ]
}

/// Points where two circles cross; `None` when they do not touch or are
/// concentric
fn circle_crossings(c1: Vec2, r1: f32, c2: Vec2, r2: f32) -> Option<[Vec2; 2]> {
    let offset = c2 - c1;
    let distance = offset.magnitude();
    if distance < EPSILON {
        return None;
    }
    let slack = EPSILON * (1.0 + r1 + r2);
    if distance > r1 + r2 + slack || distance < (r1 - r2).abs() - slack {
        return None;
    }
    let along = (r1 * r1 - r2 * r2 + distance * distance) / (2.0 * distance);
    let height = (r1 * r1 - along * along).max(0.0).sqrt();
    let base = c1 + offset * (along / distance);
    let perpendicular = Vec2::new(-offset.y, offset.x) / distance;
    Some([base + perpendicular * height, base - perpendicular * height])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segments_cross_and_touch() {
        let o = Vec2::zeros();
        assert!(segments_intersect(o, Vec2::new(2.0, 2.0), Vec2::new(0.0, 2.0), Vec2::new(2.0, 0.0)));
        assert!(segments_intersect(o, Vec2::new(2.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(3.0, 1.0)));
        assert!(segments_intersect(o, Vec2::new(4.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)));
        assert!(!segments_intersect(o, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0)));
        assert!(!segments_intersect(o, Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0), Vec2::new(0.4, 0.6)));
    }

    #[test]
    fn test_segment_rect_entry() {
        let rect = AxisAlignedRect::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 1.0));
        let t = segment_rect_entry(Vec2::zeros(), Vec2::new(4.0, 0.0), &rect).unwrap();
        assert_relative_eq!(t, 0.5);
        assert_eq!(segment_rect_entry(Vec2::new(2.5, 0.0), Vec2::new(9.0, 0.0), &rect), Some(0.0));
        assert!(segment_rect_entry(Vec2::zeros(), Vec2::new(1.9, 0.0), &rect).is_none());
        assert!(segment_rect_entry(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0), &rect).is_none());
    }

    #[test]
    fn test_circle_crossings() {
        let points = circle_crossings(Vec2::zeros(), 1.0, Vec2::new(1.0, 0.0), 1.0).unwrap();
        for p in points {
            assert_relative_eq!(p.magnitude(), 1.0, epsilon = 1e-5);
            assert_relative_eq!((p - Vec2::new(1.0, 0.0)).magnitude(), 1.0, epsilon = 1e-5);
        }
        assert!(circle_crossings(Vec2::zeros(), 1.0, Vec2::new(3.0, 0.0), 1.0).is_none());
        assert!(circle_crossings(Vec2::zeros(), 3.0, Vec2::new(0.5, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_ring_hole_separates_inner_disc() {
        let mut ring = CircleShape::new(2.0, 3.0);
        ring.set_position(Vec2::zeros());
        let mut inner = CircleShape::disc(0.5);
        inner.set_position(Vec2::new(0.5, 0.0));
        assert!(!circle_circle(&ring, &inner));
        inner.set_position(Vec2::new(1.6, 0.0));
        assert!(circle_circle(&ring, &inner));
    }

    #[test]
    fn test_cone_against_box_edge_crossing() {
        // Box covers the far end of the cone; no box corner is inside the
        // cone and the apex is outside the box
        let cone = ConeShape::new(0.0, 5.0, 0.0, 0.2);
        let mut bx = BoxShape::new(2.0, 10.0, true);
        bx.set_position(Vec2::new(5.0, 0.0));
        assert!(box_cone(&bx, &cone));
        bx.set_position(Vec2::new(7.0, 0.0));
        assert!(!box_cone(&bx, &cone));
    }

    #[test]
    fn test_cone_against_cone_crossing_edges() {
        let a = ConeShape::new(0.0, 4.0, 0.0, 0.1);
        let mut b = ConeShape::new(0.0, 4.0, std::f32::consts::FRAC_PI_2, 0.1);
        b.set_position(Vec2::new(2.0, -2.0));
        assert!(cone_cone(&a, &b));
        assert!(cone_cone(&b, &a));
        b.set_position(Vec2::new(2.0, 1.0));
        assert!(!cone_cone(&a, &b));
    }

    #[test]
    fn test_ring_against_narrow_cone_passing_through_hole() {
        let mut ring = CircleShape::new(3.0, 3.5);
        ring.set_position(Vec2::zeros());
        let mut cone = ConeShape::new(0.0, 1.0, 0.0, 0.3);
        cone.set_position(Vec2::new(-0.5, 0.0));
        assert!(!circle_cone(&ring, &cone));
        cone.set_radii(0.0, 3.6);
        assert!(circle_cone(&ring, &cone));
    }
}
