use crate::data::Metric;
use crate::join::JoinedCountryFrame;

/// 8-bit RGB triple
pub type Rgb = (u8, u8, u8);

/// Light-to-dark quantized ramp, lowest bucket first
pub const PALETTE: [&str; 9] = [
    "#ffedea", "#ffcec5", "#ffad9f", "#ff8a75", "#ff5533", "#e2492d", "#be3d26", "#9a311f", "#782618",
];

/// Neutral fill for countries or cells without data; never part of the ramp
pub const NO_DATA_COLOR: &str = "#cccccc";

/// Domain used before the first real computation
pub const PLACEHOLDER_DOMAIN: (f64, f64) = (0.0, 100_000_000.0);

/// Equal-width quantized color scale over `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    min: f64,
    max: f64,
}

/// One legend swatch covering `[lo, hi)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendEntry {
    pub color: &'static str,
    pub lo: f64,
    pub hi: f64,
}

impl ColorScale {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_DOMAIN.0, PLACEHOLDER_DOMAIN.1)
    }

    /// True min/max over the finite values. `None` when none remain.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .map(|(lo, hi)| Self::new(lo, hi))
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// A single distinct value: every record shares one color
    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }

    /// Bucket index for a value, `None` for `NaN`. Out-of-domain values clamp.
    #[inline]
    pub fn bucket(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        if self.is_degenerate() {
            return Some(0);
        }
        let t = (value - self.min) / (self.max - self.min);
        let idx = (t * PALETTE.len() as f64).floor();
        Some(idx.clamp(0.0, (PALETTE.len() - 1) as f64) as usize)
    }

    pub fn color(&self, value: f64) -> Option<&'static str> {
        self.bucket(value).map(|idx| PALETTE[idx])
    }

    /// Swatches in ramp order. A degenerate domain has exactly one.
    pub fn legend(&self) -> Vec<LegendEntry> {
        if self.is_degenerate() {
            return vec![LegendEntry {
                color: PALETTE[0],
                lo: self.min,
                hi: self.max,
            }];
        }
        let step = (self.max - self.min) / PALETTE.len() as f64;
        PALETTE
            .iter()
            .enumerate()
            .map(|(i, &color)| LegendEntry {
                color,
                lo: self.min + step * i as f64,
                hi: if i + 1 == PALETTE.len() {
                    self.max
                } else {
                    self.min + step * (i + 1) as f64
                },
            })
            .collect()
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Scale for one year's frames; falls back to the placeholder when no
/// country has a number for `metric`
pub fn compute_scale(frames: &[JoinedCountryFrame], metric: Metric) -> ColorScale {
    ColorScale::from_values(frames.iter().map(|f| f.value(metric))).unwrap_or_else(ColorScale::placeholder)
}

/// `#rrggbb` to RGB
pub fn hex_rgb(hex: &str) -> Option<Rgb> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// HSL (degrees, 0-1, 0-1) to RGB
pub fn hsl_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgb {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}

/// Compact K/M/B rendering for legends and tooltips
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "N/A".to_string();
    }
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_ignores_nan() {
        let scale = ColorScale::from_values([f64::NAN, 3.0, -1.0, f64::NAN, 8.0]).unwrap();
        assert_eq!(scale.domain(), (-1.0, 8.0));
        assert!(ColorScale::from_values([f64::NAN]).is_none());
    }

    #[test]
    fn test_domain_ignores_infinities() {
        let scale = ColorScale::from_values([10.0, 500.0, f64::INFINITY, f64::NEG_INFINITY]).unwrap();
        assert_eq!(scale.domain(), (10.0, 500.0));
        assert_eq!(scale.bucket(500.0), Some(PALETTE.len() - 1));
        assert!(ColorScale::from_values([f64::INFINITY]).is_none());
    }

    #[test]
    fn test_population_extremes() {
        let scale = ColorScale::from_values([10.0, 1_000_000_000.0]).unwrap();
        assert_eq!(scale.domain(), (10.0, 1e9));
        assert_eq!(scale.bucket(1e9), Some(PALETTE.len() - 1));
        assert_eq!(scale.bucket(10.0), Some(0));
    }

    #[test]
    fn test_degenerate_domain_uses_one_color() {
        let scale = ColorScale::from_values([5.0, 5.0, 5.0]).unwrap();
        assert!(scale.is_degenerate());
        assert_eq!(scale.color(5.0), Some(PALETTE[0]));
        assert_eq!(scale.legend().len(), 1);
    }

    #[test]
    fn test_nan_never_gets_a_bucket() {
        let scale = ColorScale::placeholder();
        assert_eq!(scale.bucket(f64::NAN), None);
        assert_eq!(scale.bucket(0.0), Some(0));
        assert!(!PALETTE.contains(&NO_DATA_COLOR));
    }

    #[test]
    fn test_buckets_are_equal_width() {
        let scale = ColorScale::new(0.0, 90.0);
        assert_eq!(scale.bucket(9.99), Some(0));
        assert_eq!(scale.bucket(10.5), Some(1));
        assert_eq!(scale.bucket(45.0), Some(4));
        assert_eq!(scale.bucket(-5.0), Some(0));
        assert_eq!(scale.bucket(500.0), Some(8));
    }

    #[test]
    fn test_legend_tiles_domain() {
        let legend = ColorScale::new(0.0, 90.0).legend();
        assert_eq!(legend.len(), 9);
        assert_eq!(legend[0].lo, 0.0);
        assert_eq!(legend[8].hi, 90.0);
        for pair in legend.windows(2) {
            assert_eq!(pair[0].hi, pair[1].lo);
        }
    }

    #[test]
    fn test_colors() {
        assert_eq!(hex_rgb("#782618"), Some((0x78, 0x26, 0x18)));
        assert_eq!(hex_rgb("782618"), None);
        assert_eq!(hsl_rgb(0.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl_rgb(240.0, 1.0, 0.5), (0, 0, 255));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1_500_000_000.0), "1.5B");
        assert_eq!(format_number(2_340_000.0), "2.3M");
        assert_eq!(format_number(1_200.0), "1.2K");
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(f64::NAN), "N/A");
    }
}
