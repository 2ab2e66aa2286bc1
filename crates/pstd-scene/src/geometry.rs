//! Rectangular domain bounds and shared-edge detection.

use pstd_core::{GridPoint, Shape, Side};
use serde::{Deserialize, Serialize};

/// The grid footprint of a domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    /// Top-left cell in global grid coordinates.
    pub origin: GridPoint,
    /// Extent in cells.
    pub shape: Shape,
}

/// Where two domains touch: the side of the owning domain and the
/// overlapping segment along that side, in global coordinates.
///
/// This is a topology descriptor only; it never grants access to the
/// neighbour's fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedBoundary {
    /// Side of the owning domain the neighbour touches.
    pub side: Side,
    /// First shared coordinate along the edge (z for left/right, x for top/bottom).
    pub start: i64,
    /// Number of shared cells along the edge.
    pub length: usize,
}

impl Bounds {
    /// Create bounds from an origin and shape.
    pub fn new(origin: GridPoint, shape: Shape) -> Self {
        Self { origin, shape }
    }

    /// One past the last column.
    pub fn x_end(&self) -> i64 {
        self.origin.x + self.shape.cols as i64
    }

    /// One past the last row.
    pub fn z_end(&self) -> i64 {
        self.origin.z + self.shape.rows as i64
    }

    /// Returns `true` if the cell lies inside these bounds.
    pub fn contains_cell(&self, cell: GridPoint) -> bool {
        cell.x >= self.origin.x
            && cell.x < self.x_end()
            && cell.z >= self.origin.z
            && cell.z < self.z_end()
    }

    /// Returns `true` if the two footprints share at least one cell.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.origin.x < other.x_end()
            && other.origin.x < self.x_end()
            && self.origin.z < other.z_end()
            && other.origin.z < self.z_end()
    }

    /// The edge `self` shares with `other`, if they touch along a segment
    /// of positive length. Corner contact does not count.
    pub fn shared_edge(&self, other: &Bounds) -> Option<SharedBoundary> {
        let z_overlap = span_overlap(self.origin.z, self.z_end(), other.origin.z, other.z_end());
        let x_overlap = span_overlap(self.origin.x, self.x_end(), other.origin.x, other.x_end());

        if self.x_end() == other.origin.x {
            return z_overlap.map(|(start, length)| SharedBoundary {
                side: Side::Right,
                start,
                length,
            });
        }
        if other.x_end() == self.origin.x {
            return z_overlap.map(|(start, length)| SharedBoundary {
                side: Side::Left,
                start,
                length,
            });
        }
        if self.z_end() == other.origin.z {
            return x_overlap.map(|(start, length)| SharedBoundary {
                side: Side::Bottom,
                start,
                length,
            });
        }
        if other.z_end() == self.origin.z {
            return x_overlap.map(|(start, length)| SharedBoundary {
                side: Side::Top,
                start,
                length,
            });
        }
        None
    }

    /// Extent along the edge on `side`: rows for left and right, columns
    /// for top and bottom, as a half-open `(start, end)` span.
    pub fn span_along(&self, side: Side) -> (i64, i64) {
        match side {
            Side::Left | Side::Right => (self.origin.z, self.z_end()),
            Side::Top | Side::Bottom => (self.origin.x, self.x_end()),
        }
    }

    /// Bounds of a strip `cells` thick placed against one side.
    pub fn strip_beyond(&self, side: Side, cells: usize) -> Bounds {
        self.strip_along(side, cells, self.span_along(side))
    }

    /// Bounds of a strip `cells` thick against the `(start, end)` segment
    /// of one side.
    pub fn strip_along(&self, side: Side, cells: usize, (start, end): (i64, i64)) -> Bounds {
        let n = cells as i64;
        let length = (end - start).max(0) as usize;
        match side {
            Side::Left => Bounds::new(
                GridPoint::new(self.origin.x - n, start),
                Shape::new(length, cells),
            ),
            Side::Right => Bounds::new(
                GridPoint::new(self.x_end(), start),
                Shape::new(length, cells),
            ),
            Side::Top => Bounds::new(
                GridPoint::new(start, self.origin.z - n),
                Shape::new(cells, length),
            ),
            Side::Bottom => Bounds::new(
                GridPoint::new(start, self.z_end()),
                Shape::new(cells, length),
            ),
        }
    }
}

/// Remove `[cut.0, cut.1)` from each half-open span, splitting where
/// the cut falls inside.
pub(crate) fn subtract_span(spans: &[(i64, i64)], cut: (i64, i64)) -> Vec<(i64, i64)> {
    let mut out = Vec::with_capacity(spans.len() + 1);
    for &(start, end) in spans {
        if cut.1 <= start || cut.0 >= end {
            out.push((start, end));
            continue;
        }
        if cut.0 > start {
            out.push((start, cut.0));
        }
        if cut.1 < end {
            out.push((cut.1, end));
        }
    }
    out
}

/// Overlap of `[a0, a1)` and `[b0, b1)` as `(start, length)`, if non-empty.
fn span_overlap(a0: i64, a1: i64, b0: i64, b1: i64) -> Option<(i64, usize)> {
    let start = a0.max(b0);
    let end = a1.min(b1);
    (end > start).then(|| (start, (end - start) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x: i64, z: i64, rows: usize, cols: usize) -> Bounds {
        Bounds::new(GridPoint::new(x, z), Shape::new(rows, cols))
    }

    #[test]
    fn side_by_side_domains_share_an_edge() {
        let a = b(0, 0, 4, 4);
        let c = b(4, 2, 4, 4);
        let edge = a.shared_edge(&c).unwrap();
        assert_eq!(edge.side, Side::Right);
        assert_eq!(edge.start, 2);
        assert_eq!(edge.length, 2);
        let back = c.shared_edge(&a).unwrap();
        assert_eq!(back.side, Side::Left);
        assert_eq!(back.length, 2);
    }

    #[test]
    fn stacked_domains_share_an_edge() {
        let top = b(0, 0, 3, 5);
        let bottom = b(1, 3, 2, 2);
        assert_eq!(top.shared_edge(&bottom).unwrap().side, Side::Bottom);
        assert_eq!(bottom.shared_edge(&top).unwrap().side, Side::Top);
    }

    #[test]
    fn corner_contact_is_not_an_edge() {
        let a = b(0, 0, 2, 2);
        let c = b(2, 2, 2, 2);
        assert!(a.shared_edge(&c).is_none());
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn overlap_detection() {
        assert!(b(0, 0, 4, 4).overlaps(&b(3, 3, 4, 4)));
        assert!(!b(0, 0, 4, 4).overlaps(&b(4, 0, 4, 4)));
    }

    #[test]
    fn strips_touch_the_side_they_extend() {
        let a = b(10, 10, 3, 5);
        for side in Side::ALL {
            let strip = a.strip_beyond(side, 2);
            assert!(!strip.overlaps(&a));
            let edge = a.shared_edge(&strip).unwrap();
            assert_eq!(edge.side, side);
            let along = match side {
                Side::Left | Side::Right => a.shape.rows,
                Side::Top | Side::Bottom => a.shape.cols,
            };
            assert_eq!(edge.length, along);
        }
    }

    #[test]
    fn segment_strips_sit_against_their_segment() {
        let a = b(0, 0, 8, 8);
        let strip = a.strip_along(Side::Right, 3, (2, 5));
        assert_eq!(strip, b(8, 2, 3, 3));
        let edge = a.shared_edge(&strip).unwrap();
        assert_eq!((edge.side, edge.start, edge.length), (Side::Right, 2, 3));
        assert_eq!(a.strip_along(Side::Top, 2, (1, 4)), b(1, -2, 2, 3));
    }

    #[test]
    fn subtracting_spans() {
        assert_eq!(subtract_span(&[(0, 8)], (3, 5)), vec![(0, 3), (5, 8)]);
        assert_eq!(subtract_span(&[(0, 8)], (-2, 4)), vec![(4, 8)]);
        assert!(subtract_span(&[(0, 8)], (0, 8)).is_empty());
        assert_eq!(subtract_span(&[(0, 2), (6, 9)], (2, 6)), vec![(0, 2), (6, 9)]);
    }
}
