use crate::braille::BrailleCanvas;
use crate::derive::{Marker, MarkerTier};
use crate::map::geometry::{draw_disc, draw_line, draw_ring};
use crate::map::projection::Viewport;

/// A geographic line as `(lon, lat)` pairs
pub type LineString = Vec<(f64, f64)>;

/// Screen pixels per braille dot, used to scale marker radii.
const PIXELS_PER_DOT: f64 = 4.0;

/// Draw order for marker tiers: busiest markers end up on top.
const TIER_ORDER: [MarkerTier; 5] = [
    MarkerTier::Neutral,
    MarkerTier::Low,
    MarkerTier::Caution,
    MarkerTier::High,
    MarkerTier::Critical,
];

/// Marker radius in braille dots.
pub fn dot_radius(radius: f64) -> i32 {
    (radius / PIXELS_PER_DOT).round().max(1.0) as i32
}

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_basemap: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_basemap: true,
            show_labels: true,
        }
    }
}

/// Rendered map, one canvas per color
pub struct MapLayers {
    pub basemap: BrailleCanvas,
    /// Marker canvases in draw order
    pub tiers: Vec<(MarkerTier, BrailleCanvas)>,
    pub highlight: BrailleCanvas,
    /// Text overlays as (column, row, text)
    pub labels: Vec<(u16, u16, String)>,
}

/// Draws boundary outlines and crime markers
pub struct MapRenderer {
    pub outlines: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            outlines: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    pub fn add_outline(&mut self, line: LineString) {
        if line.len() >= 2 {
            self.outlines.push(line);
        }
    }

    pub fn has_basemap(&self) -> bool {
        !self.outlines.is_empty()
    }

    pub fn toggle_basemap(&mut self) {
        self.settings.show_basemap = !self.settings.show_basemap;
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    /// Render into canvases of `width` x `height` characters.
    ///
    /// `labelled` names the bairros that get a text label next to their
    /// marker; `selected` gets a halo.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        viewport: &Viewport,
        markers: &[Marker<'_>],
        selected: Option<&str>,
        labelled: &[&str],
    ) -> MapLayers {
        let mut basemap = BrailleCanvas::new(width, height);
        if self.settings.show_basemap {
            for line in &self.outlines {
                self.draw_linestring(&mut basemap, line, viewport);
            }
        }

        let mut tiers: Vec<(MarkerTier, BrailleCanvas)> = TIER_ORDER
            .iter()
            .map(|&tier| (tier, BrailleCanvas::new(width, height)))
            .collect();
        let mut highlight = BrailleCanvas::new(width, height);
        let mut labels = Vec::new();

        for marker in markers {
            let (px, py) = viewport.project(marker.lat, marker.lon);
            let radius = dot_radius(marker.radius);
            if !viewport.is_visible(px, py, radius) {
                continue;
            }

            if let Some((_, canvas)) = tiers.iter_mut().find(|(tier, _)| *tier == marker.tier) {
                draw_disc(canvas, px, py, radius);
            }

            let name = marker.record.bairro.as_str();
            let is_selected = selected == Some(name);
            if is_selected {
                draw_ring(&mut highlight, px, py, radius + 2);
            }

            if (is_selected || (self.settings.show_labels && labelled.contains(&name))) && px >= 0 && py >= 0 {
                let char_x = ((px + radius) / 2) as u16;
                let char_y = (py / 4) as u16;
                if let Some(label_x) = char_x.checked_add(2) {
                    labels.push((label_x, char_y, name.to_string()));
                }
            }
        }

        MapLayers {
            basemap,
            tiers,
            highlight,
            labels,
        }
    }

    /// Draw a linestring with viewport culling
    fn draw_linestring(&self, canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
        let mut prev: Option<(i32, i32)> = None;
        for &(lon, lat) in line {
            let point = viewport.project(lat, lon);
            if let Some(last) = prev {
                if viewport.line_might_be_visible(last, point) {
                    draw_line(canvas, last.0, last.1, point.0, point.1);
                }
            }
            prev = Some(point);
        }
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bairro whose marker covers pixel (px, py). Later markers win, matching
/// draw order within a tier; busier tiers win over quieter ones.
pub fn marker_at<'a>(markers: &[Marker<'a>], viewport: &Viewport, px: i32, py: i32) -> Option<&'a str> {
    markers
        .iter()
        .filter(|m| {
            let (mx, my) = viewport.project(m.lat, m.lon);
            // Off-screen markers project far outside i32 range when zoomed in
            let r = i64::from(dot_radius(m.radius) + 1);
            let (dx, dy) = (i64::from(mx) - i64::from(px), i64::from(my) - i64::from(py));
            dx.abs() <= r && dy.abs() <= r && dx * dx + dy * dy <= r * r
        })
        .max_by_key(|m| TIER_ORDER.iter().position(|&t| t == m.tier))
        .map(|m| m.record.bairro.as_str())
}
