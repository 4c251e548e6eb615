use std::f64::consts::PI;

/// Zoom showing a city of roughly 20 km across.
pub const CITY_ZOOM: f64 = 1500.0;

const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 200_000.0;
const ZOOM_STEP: f64 = 1.5;

/// Web Mercator viewport over a braille pixel canvas.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    /// World width in multiples of the canvas width.
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

/// Normalized Web Mercator x in [0, 1).
fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Normalized Web Mercator y, 0 at the north edge.
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-85.0511, 85.0511).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

impl Viewport {
    pub fn new(center_lat: f64, center_lon: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lat,
            center_lon,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    /// Viewport zoomed to fit every `(lat, lon)` point, centered on `center`.
    /// Falls back to [`CITY_ZOOM`] for zero or one point.
    pub fn fitting(center: (f64, f64), points: &[(f64, f64)], width: usize, height: usize) -> Self {
        let mut vp = Self::new(center.0, center.1, CITY_ZOOM, width, height);
        if points.len() < 2 || width == 0 || height == 0 {
            return vp;
        }

        let cx = mercator_x(center.1);
        let cy = mercator_y(center.0);
        let (mut half_w, mut half_h) = (0.0_f64, 0.0_f64);
        for &(lat, lon) in points {
            half_w = half_w.max((mercator_x(lon) - cx).abs());
            half_h = half_h.max((mercator_y(lat) - cy).abs());
        }

        // Leave a margin so edge markers are fully drawn
        let fit_x = if half_w > 0.0 { 0.45 / half_w } else { MAX_ZOOM };
        let fit_y = if half_h > 0.0 {
            0.45 * height as f64 / (half_h * width as f64)
        } else {
            MAX_ZOOM
        };
        vp.zoom = fit_x.min(fit_y).clamp(MIN_ZOOM, MAX_ZOOM);
        vp
    }

    fn scale(&self) -> f64 {
        self.zoom * self.width as f64
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let (px, py) = (self.width as i32 / 2 + dx, self.height as i32 / 2 + dy);
        let (lat, lon) = self.unproject(px, py);
        self.center_lat = lat.clamp(-85.0, 85.0);
        self.center_lon = lon;
        if self.center_lon > 180.0 {
            self.center_lon -= 360.0;
        } else if self.center_lon < -180.0 {
            self.center_lon += 360.0;
        }
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    /// Zoom in keeping the point under (px, py) fixed
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_STEP);
    }

    /// Zoom out keeping the point under (px, py) fixed
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / ZOOM_STEP);
    }

    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let (lat, lon) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        // Pan so the anchored point lands back under the cursor
        let (new_px, new_py) = self.project(lat, lon);
        self.pan(new_px - px, new_py - py);
    }

    /// Pixel coordinates back to `(lat, lon)`
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let scale = self.scale();
        let x = (px as f64 - self.width as f64 / 2.0) / scale + mercator_x(self.center_lon);
        let y = (py as f64 - self.height as f64 / 2.0) / scale + mercator_y(self.center_lat);

        let lon = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
        (lat, lon)
    }

    /// `(lat, lon)` to pixel coordinates
    pub fn project(&self, lat: f64, lon: f64) -> (i32, i32) {
        let scale = self.scale();
        let px = (mercator_x(lon) - mercator_x(self.center_lon)) * scale + self.width as f64 / 2.0;
        let py = (mercator_y(lat) - mercator_y(self.center_lat)) * scale + self.height as f64 / 2.0;
        (px.round() as i32, py.round() as i32)
    }

    /// Whether a point (with `margin` pixels of slack) is on the canvas
    pub fn is_visible(&self, px: i32, py: i32, margin: i32) -> bool {
        px >= -margin
            && px < self.width as i32 + margin
            && py >= -margin
            && py < self.height as i32 + margin
    }

    /// Rough bounding-box check for a segment
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        p1.0.max(p2.0) >= 0
            && p1.0.min(p2.0) < self.width as i32
            && p1.1.max(p2.1) >= 0
            && p1.1.min(p2.1) < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(-8.05, -34.88, CITY_ZOOM, 100, 80);
        assert_eq!(vp.project(-8.05, -34.88), (50, 40));
    }

    #[test]
    fn test_unproject_round_trip() {
        let vp = Viewport::new(-8.05, -34.88, CITY_ZOOM, 200, 160);
        let (lat, lon) = vp.unproject(50, 120);
        assert_eq!(vp.project(lat, lon), (50, 120));
    }

    #[test]
    fn test_north_is_up() {
        let vp = Viewport::new(0.0, 0.0, 1.0, 100, 100);
        let (_, north_y) = vp.project(10.0, 0.0);
        let (east_x, _) = vp.project(0.0, 10.0);
        assert!(north_y < 50);
        assert!(east_x > 50);
    }

    #[test]
    fn test_pan_moves_east() {
        let mut vp = Viewport::new(-8.0, -34.9, CITY_ZOOM, 100, 100);
        vp.pan(10, 0);
        assert!(vp.center_lon > -34.9);
        assert!((vp.center_lat + 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut vp = Viewport::new(-8.0, -34.9, CITY_ZOOM, 200, 200);
        let anchor = vp.unproject(30, 170);
        vp.zoom_in_at(30, 170);
        let (px, py) = vp.project(anchor.0, anchor.1);
        assert!((px - 30).abs() <= 1 && (py - 170).abs() <= 1);
    }

    #[test]
    fn test_fitting_contains_points() {
        let points = [(-8.00, -34.95), (-8.15, -34.85), (-8.07, -34.90)];
        let vp = Viewport::fitting((-8.075, -34.90), &points, 160, 120);
        for (lat, lon) in points {
            let (px, py) = vp.project(lat, lon);
            assert!(vp.is_visible(px, py, 0), "{lat},{lon} -> {px},{py}");
        }
    }

    #[test]
    fn test_fitting_single_point_uses_city_zoom() {
        let vp = Viewport::fitting((-8.0, -34.9), &[(-8.0, -34.9)], 160, 120);
        assert_eq!(vp.zoom, CITY_ZOOM);
    }
}
