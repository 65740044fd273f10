use glam::DVec2;
use rayon::prelude::*;

const EPS: f64 = 1e-9;

/// Axis-aligned clipping rectangle in planar (projected) coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min: DVec2::new(x0.min(x1), y0.min(y1)),
            max: DVec2::new(x0.max(x1), y0.max(y1)),
        }
    }

    /// `[0, 0, width, height]`
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    fn corners(&self) -> Vec<DVec2> {
        vec![
            self.min,
            DVec2::new(self.max.x, self.min.y),
            self.max,
            DVec2::new(self.min.x, self.max.y),
        ]
    }
}

/// Convex region nearer to its site than to any other, clipped to the bounds.
/// An empty polygon marks a degenerate cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoronoiCell {
    pub polygon: Vec<DVec2>,
}

impl VoronoiCell {
    pub fn is_empty(&self) -> bool {
        self.polygon.len() < 3
    }

    /// Shoelace area
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let n = self.polygon.len();
        let twice: f64 = (0..n)
            .map(|i| self.polygon[i].perp_dot(self.polygon[(i + 1) % n]))
            .sum();
        twice.abs() * 0.5
    }

    /// Point-in-convex-polygon, boundary inclusive
    pub fn contains(&self, p: DVec2) -> bool {
        if self.is_empty() {
            return false;
        }
        let n = self.polygon.len();
        let (mut pos, mut neg) = (false, false);
        for i in 0..n {
            let a = self.polygon[i];
            let b = self.polygon[(i + 1) % n];
            let cross = (b - a).perp_dot(p - a);
            if cross > EPS {
                pos = true;
            } else if cross < -EPS {
                neg = true;
            }
            if pos && neg {
                return false;
            }
        }
        true
    }
}

/// One cell per point, index-aligned. Each cell is the bounds clipped by the
/// bisector half-plane against every other distinct site.
///
/// Coincident sites: the first keeps the cell, later copies get an empty one.
/// Non-finite sites get an empty cell and do not clip anyone. Sites outside
/// `bounds` still clip their neighbours.
pub fn partition(points: &[DVec2], bounds: Rect) -> Vec<VoronoiCell> {
    points
        .par_iter()
        .enumerate()
        .map(|(i, &site)| cell_for(i, site, points, bounds))
        .collect()
}

fn cell_for(i: usize, site: DVec2, points: &[DVec2], bounds: Rect) -> VoronoiCell {
    if !site.is_finite() || points[..i].contains(&site) {
        return VoronoiCell::default();
    }
    let mut polygon = bounds.corners();
    for (j, &other) in points.iter().enumerate() {
        if j == i || other == site || !other.is_finite() {
            continue;
        }
        polygon = clip_half_plane(&polygon, site, other);
        if polygon.len() < 3 {
            return VoronoiCell::default();
        }
    }
    VoronoiCell { polygon }
}

/// Sutherland–Hodgman against the half-plane of points nearer `site` than `other`
fn clip_half_plane(polygon: &[DVec2], site: DVec2, other: DVec2) -> Vec<DVec2> {
    let normal = other - site;
    let mid = (site + other) * 0.5;
    let side = |p: DVec2| (p - mid).dot(normal);

    let mut out = Vec::with_capacity(polygon.len() + 1);
    let n = polygon.len();
    for k in 0..n {
        let a = polygon[k];
        let b = polygon[(k + 1) % n];
        let (da, db) = (side(a), side(b));
        if da <= 0.0 {
            out.push(a);
        }
        if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
            let t = da / (da - db);
            out.push(a + (b - a) * t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Rect {
        Rect::sized(100.0, 60.0)
    }

    #[test]
    fn test_empty_and_single() {
        assert!(partition(&[], bounds()).is_empty());
        let cells = partition(&[DVec2::new(10.0, 10.0)], bounds());
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].area(), 6000.0);
    }

    #[test]
    fn test_two_points_split_at_bisector() {
        let cells = partition(&[DVec2::new(25.0, 30.0), DVec2::new(75.0, 30.0)], bounds());
        assert!((cells[0].area() - 3000.0).abs() < 1e-6);
        assert!((cells[1].area() - 3000.0).abs() < 1e-6);
        assert!(cells[0].contains(DVec2::new(49.0, 5.0)));
        assert!(!cells[0].contains(DVec2::new(51.0, 5.0)));
    }

    #[test]
    fn test_every_site_lies_in_its_own_cell() {
        let points: Vec<DVec2> = (0..40)
            .map(|i| {
                let t = i as f64;
                DVec2::new((t * 37.0) % 97.0 + 1.0, (t * 17.0) % 57.0 + 1.5)
            })
            .collect();
        let cells = partition(&points, bounds());
        assert_eq!(cells.len(), points.len());
        let mut total = 0.0;
        for (p, cell) in points.iter().zip(&cells) {
            if !cell.is_empty() {
                assert!(cell.contains(*p), "{p:?} outside its cell");
            }
            total += cell.area();
        }
        // Cells tile the bounds
        assert!((total - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn test_duplicates_do_not_crash() {
        let p = DVec2::new(30.0, 30.0);
        let cells = partition(&[p, DVec2::new(70.0, 30.0), p], bounds());
        assert_eq!(cells.len(), 3);
        assert!(cells[0].contains(p));
        assert!(cells[2].is_empty());
        assert!((cells[0].area() + cells[1].area() - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn test_outside_points_still_clip() {
        let cells = partition(&[DVec2::new(50.0, 30.0), DVec2::new(150.0, 30.0)], bounds());
        assert!(cells[1].is_empty());
        assert!((cells[0].area() - 6000.0).abs() < 1e-6);

        let cells = partition(&[DVec2::new(20.0, 30.0), DVec2::new(110.0, 30.0)], bounds());
        // Bisector at x = 65
        assert!((cells[0].area() - 65.0 * 60.0).abs() < 1e-6);
        assert!((cells[1].area() - 35.0 * 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_points_get_empty_cells() {
        let cells = partition(&[DVec2::new(f64::NAN, 1.0), DVec2::new(10.0, 10.0)], bounds());
        assert!(cells[0].is_empty());
        assert!((cells[1].area() - 6000.0).abs() < 1e-6);
    }
}
