use std::collections::HashMap;

/// Spatial index for geographic features using conservative approximation.
/// Each feature's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the exact point-in-polygon test).
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Build from `(feature index, bbox)` pairs. Features without a bbox are
    /// simply absent.
    pub fn build(bboxes: impl Iterator<Item = (usize, (f64, f64, f64, f64))>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (idx, (min_lon, min_lat, max_lon, max_lat)) in bboxes {
            let min_cell = grid.to_cell(min_lon, min_lat);
            let max_cell = grid.to_cell(max_lon, max_lat);
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    grid.cells.entry((x, y)).or_default().push(idx);
                }
            }
        }
        grid
    }

    /// Candidate feature indices whose bbox may contain the point
    pub fn query_point(&self, lon: f64, lat: f64) -> &[usize] {
        self.cells
            .get(&self.to_cell(lon, lat))
            .map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_query_is_conservative() {
        let grid = FeatureGrid::build(
            [(0, (-10.0, -10.0, 10.0, 10.0)), (3, (5.0, 5.0, 25.0, 25.0))].into_iter(),
            10.0,
        );
        assert_eq!(grid.query_point(-5.0, -5.0), &[0]);
        assert_eq!(grid.query_point(7.0, 7.0), &[0, 3]);
        assert_eq!(grid.query_point(21.0, 21.0), &[3]);
        assert!(grid.query_point(-100.0, 40.0).is_empty());
    }
}
