use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Address fallback used when reverse geocoding is unavailable.
    pub fn short_label(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// Accepts `lat,lng`, `lat lng` and `lat, lng`.
impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("invalid coordinates: {s:?} (expected `lat,lng`)"));
        };
        let lat = lat
            .parse::<f64>()
            .map_err(|_| format!("invalid latitude: {lat}"))?;
        let lng = lng
            .parse::<f64>()
            .map_err(|_| format!("invalid longitude: {lng}"))?;
        let loc = Location::new(lat, lng);
        if !loc.is_valid() {
            return Err(format!("coordinates out of range: {lat}, {lng}"));
        }
        Ok(loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_and_space_separated_pairs() {
        assert_eq!("40.0,-74.0".parse(), Ok(Location::new(40.0, -74.0)));
        assert_eq!("40.0 -74.0".parse(), Ok(Location::new(40.0, -74.0)));
        assert_eq!(" 40.0, -74.0\n".parse(), Ok(Location::new(40.0, -74.0)));
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!("40.0".parse::<Location>().is_err());
        assert!("a,b".parse::<Location>().is_err());
        assert!("91,0".parse::<Location>().is_err());
        assert!("1,2,3".parse::<Location>().is_err());
    }

    #[test]
    fn short_label_rounds_to_four_places() {
        assert_eq!(Location::new(40.71284, -74.00601).short_label(), "40.7128, -74.0060");
    }
}
