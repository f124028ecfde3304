use serde::Serialize;

use crate::core::{Category, Location, Report, Severity};

/// Metres per degree of latitude, used to size density circles on a
/// degree-based canvas.
pub const METERS_PER_DEGREE: f64 = 111_320.0;
pub const DENSITY_BASE_RADIUS_M: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub icon: &'static str,
    pub color: &'static str,
    /// Single-cell stand-in for the icon on a terminal canvas.
    pub glyph: char,
}

pub fn marker_style(category: &Category) -> MarkerStyle {
    match category {
        Category::Medical => MarkerStyle {
            icon: "heartbeat",
            color: "#dc2626",
            glyph: '+',
        },
        Category::Shelter => MarkerStyle {
            icon: "home",
            color: "#2563eb",
            glyph: 'H',
        },
        Category::Food => MarkerStyle {
            icon: "utensils",
            color: "#059669",
            glyph: 'F',
        },
        Category::Sos => MarkerStyle {
            icon: "exclamation-triangle",
            color: "#d97706",
            glyph: '!',
        },
        Category::Other(_) => MarkerStyle {
            icon: "circle",
            color: "#6b7280",
            glyph: 'o',
        },
    }
}

pub fn severity_weight(severity: &Severity) -> f64 {
    match severity {
        Severity::Critical => 1.0,
        Severity::High => 0.8,
        Severity::Medium => 0.6,
        Severity::Low => 0.4,
        Severity::Other(_) => 0.5,
    }
}

pub fn heat_color(weight: f64) -> &'static str {
    if weight >= 0.8 {
        "#dc2626"
    } else if weight >= 0.6 {
        "#d97706"
    } else if weight >= 0.4 {
        "#059669"
    } else {
        "#3b82f6"
    }
}

/// `#rrggbb` to its components; `None` for anything else.
pub fn hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    Some((r, g, b))
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker<'a> {
    #[serde(rename = "reportId")]
    pub report_id: &'a str,
    pub title: &'a str,
    pub location: Location,
    #[serde(flatten)]
    pub style: MarkerStyle,
}

/// One marker per active report that has a location, in list order.
pub fn markers(reports: &[Report]) -> Vec<Marker<'_>> {
    reports
        .iter()
        .filter(|r| r.is_active())
        .filter_map(|r| {
            Some(Marker {
                report_id: &r.id,
                title: &r.title,
                location: r.location?,
                style: marker_style(&r.category),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DensityPoint<'a> {
    #[serde(rename = "reportId")]
    pub report_id: &'a str,
    pub location: Location,
    pub weight: f64,
    #[serde(rename = "radiusMeters")]
    pub radius_m: f64,
    pub color: &'static str,
}

impl DensityPoint<'_> {
    pub fn radius_degrees(&self) -> f64 {
        self.radius_m / METERS_PER_DEGREE
    }
}

pub fn density_points(reports: &[Report]) -> Vec<DensityPoint<'_>> {
    reports
        .iter()
        .filter(|r| r.is_active())
        .filter_map(|r| {
            let weight = severity_weight(&r.severity);
            Some(DensityPoint {
                report_id: &r.id,
                location: r.location?,
                weight,
                radius_m: DENSITY_BASE_RADIUS_M * weight,
                color: heat_color(weight),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapLayer {
    #[default]
    Markers,
    Density,
}

impl MapLayer {
    pub fn toggled(self) -> Self {
        match self {
            MapLayer::Markers => MapLayer::Density,
            MapLayer::Density => MapLayer::Markers,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Idle,
    Selecting,
}

/// Picking a report location on the map.
///
/// `begin_selection` arms the selector; the next `click` records the point,
/// places the draggable marker and disarms it. Dragging that marker later
/// moves the selection without re-arming.
#[derive(Debug, Clone, Default)]
pub struct LocationSelector {
    mode: SelectionMode,
    selected: Option<Location>,
}

impl LocationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_selecting(&self) -> bool {
        self.mode == SelectionMode::Selecting
    }

    pub fn selected(&self) -> Option<Location> {
        self.selected
    }

    pub fn begin_selection(&mut self) {
        self.mode = SelectionMode::Selecting;
    }

    /// Returns whether the click was consumed. Idle clicks are ignored.
    pub fn click(&mut self, at: Location) -> bool {
        if self.mode != SelectionMode::Selecting {
            return false;
        }
        self.selected = Some(at);
        self.mode = SelectionMode::Idle;
        true
    }

    /// Moves the placed marker. Without a placed marker there is nothing to
    /// drag.
    pub fn drag(&mut self, to: Location) -> bool {
        if self.selected.is_none() {
            return false;
        }
        self.selected = Some(to);
        true
    }

    pub fn cancel(&mut self) {
        self.mode = SelectionMode::Idle;
    }

    /// Called when a fresh report form opens.
    pub fn reset(&mut self) {
        self.mode = SelectionMode::Idle;
        self.selected = None;
    }
}
