//! Small polygon helpers used on traced contours.

use nalgebra::Point2;

/// Shoelace area, positive for clockwise order in image coordinates.
pub fn signed_area(pts: &[Point2<f32>]) -> f32 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (acc * 0.5) as f32
}

#[inline]
pub fn contour_area(pts: &[Point2<f32>]) -> f32 {
    signed_area(pts).abs()
}

pub fn arc_length(pts: &[Point2<f32>], closed: bool) -> f32 {
    let n = pts.len();
    if n < 2 {
        return 0.0;
    }
    let mut len: f32 = pts.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    if closed {
        len += (pts[0] - pts[n - 1]).norm();
    }
    len
}

pub fn centroid(pts: &[Point2<f32>]) -> Option<Point2<f32>> {
    if pts.is_empty() {
        return None;
    }
    let (sx, sy) = pts
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = pts.len() as f32;
    Some(Point2::new(sx / n, sy / n))
}

/// Douglas-Peucker simplification.
///
/// A closed curve is split at the vertex farthest from the first point and the
/// vertex farthest from that one; both halves are then simplified as open
/// chains. The output keeps the input's vertex order.
pub fn approx_polygon(pts: &[Point2<f32>], epsilon: f32, closed: bool) -> Vec<Point2<f32>> {
    let n = pts.len();
    if n < 3 {
        return pts.to_vec();
    }

    let mut keep = vec![false; n];
    if closed {
        let i1 = farthest_from(pts, 0);
        let i0 = farthest_from(pts, i1);
        if i0 == i1 {
            return vec![pts[i0]];
        }
        keep[i0] = true;
        keep[i1] = true;
        simplify_chain(pts, i0, i1, epsilon, &mut keep);
        simplify_chain(pts, i1, i0, epsilon, &mut keep);
    } else {
        keep[0] = true;
        keep[n - 1] = true;
        simplify_chain(pts, 0, n - 1, epsilon, &mut keep);
    }

    pts.iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn farthest_from(pts: &[Point2<f32>], from: usize) -> usize {
    let origin = pts[from];
    let mut best = from;
    let mut best_d = -1.0f32;
    for (i, p) in pts.iter().enumerate() {
        let d = (p - origin).norm_squared();
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Walks forward (wrapping) from `start` to `end`.
fn simplify_chain(pts: &[Point2<f32>], start: usize, end: usize, epsilon: f32, keep: &mut [bool]) {
    let n = pts.len();
    let mut stack = vec![(start, (end + n - start) % n)];

    while let Some((s, len)) = stack.pop() {
        if len < 2 {
            continue;
        }
        let e = (s + len) % n;
        let (a, b) = (pts[s], pts[e]);

        let mut best_k = 0;
        let mut best_d = -1.0f32;
        for k in 1..len {
            let d = line_distance(pts[(s + k) % n], a, b);
            if d > best_d {
                best_d = d;
                best_k = k;
            }
        }

        if best_d > epsilon {
            keep[(s + best_k) % n] = true;
            stack.push((s, best_k));
            stack.push(((s + best_k) % n, len - best_k));
        }
    }
}

fn line_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len <= f32::EPSILON {
        return (p - a).norm();
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dense_rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point2<f32>> {
        let mut pts = Vec::new();
        let mut x = x0;
        while x < x1 {
            pts.push(Point2::new(x, y0));
            x += 1.0;
        }
        let mut y = y0;
        while y < y1 {
            pts.push(Point2::new(x1, y));
            y += 1.0;
        }
        let mut x = x1;
        while x > x0 {
            pts.push(Point2::new(x, y1));
            x -= 1.0;
        }
        let mut y = y1;
        while y > y0 {
            pts.push(Point2::new(x0, y));
            y -= 1.0;
        }
        pts
    }

    #[test]
    fn area_and_length_of_rectangle() {
        let pts = dense_rect(0.0, 0.0, 40.0, 20.0);
        assert_relative_eq!(contour_area(&pts), 800.0, epsilon = 1e-3);
        assert_relative_eq!(arc_length(&pts, true), 120.0, epsilon = 1e-3);
    }

    #[test]
    fn closed_simplification_recovers_rectangle_corners() {
        let pts = dense_rect(10.0, 5.0, 90.0, 65.0);
        let eps = 0.1 * arc_length(&pts, true);
        let poly = approx_polygon(&pts, eps, true);
        assert_eq!(poly.len(), 4);
        for corner in [
            Point2::new(10.0, 5.0),
            Point2::new(90.0, 5.0),
            Point2::new(90.0, 65.0),
            Point2::new(10.0, 65.0),
        ] {
            assert!(poly.contains(&corner), "missing {corner:?} in {poly:?}");
        }
    }

    #[test]
    fn open_chain_keeps_endpoints() {
        let pts: Vec<_> = (0..10).map(|i| Point2::new(i as f32, 0.0)).collect();
        let poly = approx_polygon(&pts, 0.5, false);
        assert_eq!(poly, vec![pts[0], pts[9]]);
    }

    #[test]
    fn centroid_of_empty_is_none() {
        assert!(centroid(&[]).is_none());
    }
}
