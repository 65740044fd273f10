use crate::braille::BrailleCanvas;
use crate::scale::Rgb;
use glam::DVec2;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Outline a ring, closing it if needed. Edges longer than `max_jump`
/// pixels are skipped (antimeridian wraps).
pub fn draw_ring(canvas: &mut BrailleCanvas, ring: &[DVec2], max_jump: f64) {
    let n = ring.len();
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if !a.is_finite() || !b.is_finite() || (b - a).abs().max_element() > max_jump {
            continue;
        }
        draw_line(canvas, a.x as i32, a.y as i32, b.x as i32, b.y as i32);
    }
}

/// Draw a filled circle (for city markers)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Even-odd point-in-polygon over pixel-space rings
pub fn point_in_rings(rings: &[Vec<DVec2>], p: DVec2) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            if (a.y > p.y) != (b.y > p.y) && p.x < a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x) {
                inside = !inside;
            }
        }
    }
    inside
}

/// Even-odd scanline fill of a set of rings in pixel space. Every covered
/// pixel is painted with `color`.
pub fn fill_polygon(canvas: &mut BrailleCanvas, rings: &[Vec<DVec2>], color: Rgb) {
    fill_polygon_where(canvas, rings, color, |_| true);
}

/// [`fill_polygon`], restricted to pixels whose center passes `keep`
pub fn fill_polygon_where(
    canvas: &mut BrailleCanvas,
    rings: &[Vec<DVec2>],
    color: Rgb,
    keep: impl Fn(DVec2) -> bool,
) {
    let (width, height) = canvas.pixel_size();
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for p in rings.iter().flatten().filter(|p| p.is_finite()) {
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }
    if y_min > y_max {
        return;
    }
    let row_start = y_min.floor().max(0.0) as usize;
    let row_end = (y_max.ceil().max(0.0) as usize).min(height);

    let mut crossings: Vec<f64> = Vec::new();
    for row in row_start..row_end {
        // Sample at pixel centers
        let y = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            let n = ring.len();
            for i in 0..n {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                if !a.is_finite() || !b.is_finite() {
                    continue;
                }
                if (a.y <= y && b.y > y) || (b.y <= y && a.y > y) {
                    crossings.push(a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let x0 = (span[0] - 0.5).ceil().max(0.0) as usize;
            let x1 = ((span[1] - 0.5).floor().max(-1.0) + 1.0) as usize;
            for x in x0..x1.min(width) {
                if keep(DVec2::new(x as f64 + 0.5, y)) {
                    canvas.paint(x as i32, row as i32, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert_eq!(canvas.row_to_string(0), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.row_to_string(0), "⡇");
        assert_eq!(canvas.row_to_string(1), "⡇");
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(x0, y0),
            DVec2::new(x1, y0),
            DVec2::new(x1, y1),
            DVec2::new(x0, y1),
        ]
    }

    #[test]
    fn test_fill_square_covers_cells() {
        let mut canvas = BrailleCanvas::new(4, 2);
        fill_polygon(&mut canvas, &[rect(0.0, 0.0, 4.0, 8.0)], (1, 2, 3));
        assert_eq!(canvas.cell(0, 0), Some(('⣿', Some((1, 2, 3)))));
        assert_eq!(canvas.cell(1, 1), Some(('⣿', Some((1, 2, 3)))));
        assert_eq!(canvas.cell(2, 0), Some(('⠀', None)));
    }

    #[test]
    fn test_fill_respects_holes() {
        let mut canvas = BrailleCanvas::new(6, 3);
        let outer = rect(0.0, 0.0, 12.0, 12.0);
        let hole = rect(4.0, 4.0, 8.0, 8.0);
        fill_polygon(&mut canvas, &[outer, hole], (9, 9, 9));
        assert_eq!(canvas.cell(0, 0).map(|c| c.0), Some('⣿'));
        // Char (2, 1) covers pixels x 4..6, y 4..8: entirely inside the hole
        assert_eq!(canvas.cell(2, 1), Some(('⠀', None)));
    }

    #[test]
    fn test_fill_where_masks_pixels() {
        let mut canvas = BrailleCanvas::new(4, 1);
        let clip = vec![rect(0.0, 0.0, 4.0, 4.0)];
        fill_polygon_where(&mut canvas, &[rect(0.0, 0.0, 8.0, 4.0)], (5, 5, 5), |p| point_in_rings(&clip, p));
        assert_eq!(canvas.row_to_string(0), "⣿⣿⠀⠀");
        assert!(point_in_rings(&clip, DVec2::new(1.0, 1.0)));
        assert!(!point_in_rings(&clip, DVec2::new(5.0, 1.0)));
    }

    #[test]
    fn test_fill_clips_to_canvas() {
        let mut canvas = BrailleCanvas::new(2, 1);
        fill_polygon(&mut canvas, &[rect(-50.0, -50.0, 50.0, 50.0)], (0, 0, 0));
        assert_eq!(canvas.row_to_string(0), "⣿⣿");
    }
}
