use glam::DVec2;
use std::f64::consts::PI;

/// Unit Web Mercator: lon/lat degrees to [0, 1] x [0, 1] (y grows southward)
#[inline(always)]
fn mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat.clamp(-85.0511, 85.0511) * PI / 180.0;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Viewport representing the visible map area and zoom level
#[derive(Clone)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-90 to 90)
    pub center_lat: f64,
    /// Zoom level (higher = more zoomed in)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Whole-world choropleth view
    pub fn world(width: usize, height: usize) -> Self {
        Self::new(0.0, 20.0, 1.0, width, height)
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = 360.0 / (self.zoom * self.width.max(1) as f64);
        self.center_lon += dx as f64 * scale;
        self.center_lat -= dy as f64 * scale * 0.5; // Mercator distortion

        if self.center_lon > 180.0 {
            self.center_lon -= 360.0;
        } else if self.center_lon < -180.0 {
            self.center_lon += 360.0;
        }

        self.center_lat = self.center_lat.clamp(-85.0, 85.0);
    }

    /// The map zooms between 1x and 8x
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 2.0).min(8.0);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 2.0).max(1.0);
    }

    fn center(&self) -> (f64, f64) {
        mercator(self.center_lon, self.center_lat)
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let scale = self.zoom * self.width.max(1) as f64;
        let (center_x, center_y) = self.center();

        let x = (px as f64 - self.width as f64 / 2.0) / scale + center_x;
        let y = (py as f64 - self.height as f64 / 2.0) / scale + center_y;

        let lon = x * 360.0 - 180.0;
        let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
        (lon, lat_rad * 180.0 / PI)
    }

    /// Project a geographic coordinate (lon, lat) to sub-pixel coordinates
    pub fn project_f(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = mercator(lon, lat);
        let (center_x, center_y) = self.center();
        let scale = self.zoom * self.width as f64;
        (
            (x - center_x) * scale + self.width as f64 / 2.0,
            (y - center_y) * scale + self.height as f64 / 2.0,
        )
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let (x, y) = self.project_f(lon, lat);
        (x as i32, y as i32)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }
}

/// Mercator scaled and centered so a set of coordinates fills a rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitProjection {
    scale: f64,
    offset: DVec2,
}

impl FitProjection {
    /// Fit `coords` into `width` x `height`. `None` without coordinates.
    pub fn fit(width: f64, height: f64, coords: impl Iterator<Item = (f64, f64)>) -> Option<Self> {
        let (x0, y0, x1, y1) = crate::data::features::bbox_of(coords.map(|(lon, lat)| mercator(lon, lat)))?;
        let (dx, dy) = (x1 - x0, y1 - y0);
        let scale = match (dx > 0.0, dy > 0.0) {
            (true, true) => (width / dx).min(height / dy),
            (true, false) => width / dx,
            (false, true) => height / dy,
            (false, false) => 1.0,
        };
        let offset = DVec2::new(
            (width - scale * (x1 + x0)) / 2.0,
            (height - scale * (y1 + y0)) / 2.0,
        );
        Some(Self { scale, offset })
    }

    pub fn project(&self, lon: f64, lat: f64) -> DVec2 {
        let (x, y) = mercator(lon, lat);
        DVec2::new(x, y) * self.scale + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(0.0, 0.0, 1.0, 100, 100);
        let (x, y) = vp.project(0.0, 0.0);
        assert_eq!(x, 50);
        assert_eq!(y, 50);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let vp = Viewport::new(10.0, 40.0, 2.0, 400, 200);
        let (px, py) = vp.project_f(12.5, 45.0);
        let (lon, lat) = vp.unproject(px.round() as i32, py.round() as i32);
        assert!((lon - 12.5).abs() < 0.5);
        assert!((lat - 45.0).abs() < 0.5);
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut vp = Viewport::world(100, 100);
        for _ in 0..10 {
            vp.zoom_in();
        }
        assert_eq!(vp.zoom, 8.0);
        for _ in 0..10 {
            vp.zoom_out();
        }
        assert_eq!(vp.zoom, 1.0);
    }

    #[test]
    fn test_fit_fills_rect() {
        let coords = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let fit = FitProjection::fit(200.0, 100.0, coords.iter().copied()).unwrap();
        let corners: Vec<DVec2> = coords.iter().map(|&(lon, lat)| fit.project(lon, lat)).collect();
        for c in &corners {
            assert!(c.x >= -1e-9 && c.x <= 200.0 + 1e-9);
            assert!(c.y >= -1e-9 && c.y <= 100.0 + 1e-9);
        }
        // The taller extent is the binding one
        assert!(((corners[0].y - corners[2].y).abs() - 100.0).abs() < 1e-6);
        assert!(FitProjection::fit(10.0, 10.0, std::iter::empty()).is_none());
    }
}
