//! Border following with full parent/child hierarchy (Suzuki & Abe, 1985).
//!
//! Foreground is 8-connected, background 4-connected. Every outer border and
//! every hole border becomes one [`Contour`]; the tree mirrors how regions nest.

use nalgebra::Point2;

use crate::threshold::BinaryImage;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BorderKind {
    /// Boundary between a foreground region and the background around it.
    Outer,
    /// Boundary between a foreground region and a hole inside it.
    Hole,
}

/// One traced border. Indices in `parent`/`first_child`/`next_sibling` point
/// into the vector returned by [`find_contours`].
#[derive(Clone, Debug)]
pub struct Contour {
    pub points: Vec<Point2<i32>>,
    pub kind: BorderKind,
    pub parent: Option<usize>,
    pub first_child: Option<usize>,
    pub next_sibling: Option<usize>,
}

impl Contour {
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    #[inline]
    pub fn has_child(&self) -> bool {
        self.first_child.is_some()
    }

    pub fn points_f32(&self) -> Vec<Point2<f32>> {
        self.points
            .iter()
            .map(|p| Point2::new(p.x as f32, p.y as f32))
            .collect()
    }
}

// Clockwise on screen (y grows downwards), starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn dir_index(dx: i32, dy: i32) -> usize {
    DIRS.iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(0)
}

/// Label grid padded by one background pixel on every side.
struct LabelGrid {
    stride: usize,
    cells: Vec<i32>,
}

impl LabelGrid {
    fn from_binary(bin: &BinaryImage) -> Self {
        let stride = bin.width + 2;
        let mut cells = vec![0i32; stride * (bin.height + 2)];
        for y in 0..bin.height {
            for x in 0..bin.width {
                if bin.is_set(x, y) {
                    cells[(y + 1) * stride + x + 1] = 1;
                }
            }
        }
        Self { stride, cells }
    }

    #[inline]
    fn at(&self, p: (i32, i32)) -> i32 {
        self.cells[p.1 as usize * self.stride + p.0 as usize]
    }

    #[inline]
    fn set(&mut self, p: (i32, i32), v: i32) {
        self.cells[p.1 as usize * self.stride + p.0 as usize] = v;
    }
}

/// Trace all borders of the foreground in `bin`.
pub fn find_contours(bin: &BinaryImage) -> Vec<Contour> {
    let mut grid = LabelGrid::from_binary(bin);
    let mut contours: Vec<Contour> = Vec::new();
    // border number 1 is the (hole-like) image frame
    let mut nbd: i32 = 1;

    for y in 1..=bin.height as i32 {
        let mut lnbd: i32 = 1;
        for x in 1..=bin.width as i32 {
            let v = grid.at((x, y));
            if v == 0 {
                continue;
            }

            let start = if v == 1 && grid.at((x - 1, y)) == 0 {
                Some((BorderKind::Outer, (x - 1, y)))
            } else if v >= 1 && grid.at((x + 1, y)) == 0 {
                if v > 1 {
                    lnbd = v;
                }
                Some((BorderKind::Hole, (x + 1, y)))
            } else {
                None
            };

            if let Some((kind, from)) = start {
                nbd += 1;
                let parent = parent_for(kind, lnbd, &contours);
                let points = follow_border(&mut grid, (x, y), from, nbd)
                    .into_iter()
                    .map(|(px, py)| Point2::new(px - 1, py - 1))
                    .collect();
                contours.push(Contour {
                    points,
                    kind,
                    parent,
                    first_child: None,
                    next_sibling: None,
                });
            }

            let v = grid.at((x, y));
            if v != 1 {
                lnbd = v.abs();
            }
        }
    }

    link_children(&mut contours);
    contours
}

fn parent_for(kind: BorderKind, lnbd: i32, contours: &[Contour]) -> Option<usize> {
    if lnbd < 2 {
        return None;
    }
    let idx = (lnbd - 2) as usize;
    let neighbour = contours.get(idx)?;
    if (kind == BorderKind::Outer) != (neighbour.kind == BorderKind::Outer) {
        Some(idx)
    } else {
        neighbour.parent
    }
}

fn follow_border(
    grid: &mut LabelGrid,
    start: (i32, i32),
    from: (i32, i32),
    nbd: i32,
) -> Vec<(i32, i32)> {
    let step = |p: (i32, i32), d: usize| (p.0 + DIRS[d].0, p.1 + DIRS[d].1);

    let d0 = dir_index(from.0 - start.0, from.1 - start.1);
    let first = (0..8)
        .map(|k| step(start, (d0 + k) % 8))
        .find(|&q| grid.at(q) != 0);
    let Some(p1) = first else {
        // isolated pixel
        grid.set(start, -nbd);
        return vec![start];
    };

    let mut points = Vec::new();
    let mut p2 = p1;
    let mut p3 = start;
    loop {
        points.push(p3);

        let d2 = dir_index(p2.0 - p3.0, p2.1 - p3.1);
        let mut east_examined_zero = false;
        let mut p4 = p2;
        for k in 1..=8 {
            let d = (d2 + 8 - k) % 8;
            let q = step(p3, d);
            if grid.at(q) != 0 {
                p4 = q;
                break;
            }
            if d == 0 {
                east_examined_zero = true;
            }
        }

        if east_examined_zero {
            grid.set(p3, -nbd);
        } else if grid.at(p3) == 1 {
            grid.set(p3, nbd);
        }

        if p4 == start && p3 == p1 {
            break;
        }
        p2 = p3;
        p3 = p4;
    }
    points
}

fn link_children(contours: &mut [Contour]) {
    let mut last_child: Vec<Option<usize>> = vec![None; contours.len()];
    for i in 0..contours.len() {
        let Some(p) = contours[i].parent else {
            continue;
        };
        match last_child[p] {
            None => contours[p].first_child = Some(i),
            Some(prev) => contours[prev].next_sibling = Some(i),
        }
        last_child[p] = Some(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(width: usize, height: usize, set: impl Fn(usize, usize) -> bool) -> BinaryImage {
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                data[y * width + x] = set(x, y) as u8;
            }
        }
        BinaryImage {
            width,
            height,
            data,
        }
    }

    #[test]
    fn filled_square_has_single_outer_border() {
        let bin = binary(10, 10, |x, y| (2..7).contains(&x) && (2..7).contains(&y));
        let contours = find_contours(&bin);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.kind, BorderKind::Outer);
        assert!(!c.has_parent());
        assert!(!c.has_child());
        // 5x5 square: 16 boundary pixels
        assert_eq!(c.points.len(), 16);
        assert_eq!(c.points[0], Point2::new(2, 2));
    }

    #[test]
    fn nested_regions_build_tree() {
        // square ring with a 2x2 dot inside its hole
        let bin = binary(10, 10, |x, y| {
            let ring = (1..=8).contains(&x)
                && (1..=8).contains(&y)
                && !((3..=6).contains(&x) && (3..=6).contains(&y));
            let dot = (4..=5).contains(&x) && (4..=5).contains(&y);
            ring || dot
        });
        let contours = find_contours(&bin);
        assert_eq!(contours.len(), 3);

        assert_eq!(contours[0].kind, BorderKind::Outer);
        assert_eq!(contours[0].parent, None);
        assert_eq!(contours[0].first_child, Some(1));

        assert_eq!(contours[1].kind, BorderKind::Hole);
        assert_eq!(contours[1].parent, Some(0));
        assert_eq!(contours[1].first_child, Some(2));

        assert_eq!(contours[2].kind, BorderKind::Outer);
        assert_eq!(contours[2].parent, Some(1));
        assert!(!contours[2].has_child());
    }

    #[test]
    fn siblings_are_chained() {
        let bin = binary(12, 6, |x, y| (1..3).contains(&y) && (x == 1 || x == 5 || x == 9));
        let contours = find_contours(&bin);
        assert_eq!(contours.len(), 3);
        assert!(contours.iter().all(|c| c.parent.is_none()));
        assert!(contours.iter().all(|c| c.next_sibling.is_none()));
    }

    #[test]
    fn foreground_touching_image_edge_is_traced() {
        let bin = binary(4, 4, |_, _| true);
        let contours = find_contours(&bin);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points.len(), 12);
    }

    #[test]
    fn isolated_pixel_is_a_single_point_contour() {
        let bin = binary(5, 5, |x, y| x == 2 && y == 2);
        let contours = find_contours(&bin);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![Point2::new(2, 2)]);
    }
}
