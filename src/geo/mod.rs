use std::sync::atomic::AtomicBool;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{GeocodingConfig, LocationConfig};
use crate::core::Location;
use crate::error::{RescueError, Result};
use crate::platform;

pub trait ReverseGeocoder {
    /// Human-readable address for `location`.
    fn reverse(&self, location: Location) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

/// Reverse geocoding against a Nominatim `/reverse` endpoint.
pub struct NominatimClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(cfg: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| RescueError::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: cfg.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl ReverseGeocoder for NominatimClient {
    fn reverse(&self, location: Location) -> Result<String> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", location.lat.to_string()),
                ("lon", location.lng.to_string()),
            ])
            .send()
            .map_err(|e| RescueError::network(format!("reverse geocoding failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RescueError::network(format!(
                "reverse geocoding returned HTTP {}",
                response.status()
            )));
        }

        let body: NominatimReverse = response
            .json()
            .map_err(|e| RescueError::network(format!("unexpected geocoding response: {e}")))?;

        body.display_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RescueError::network("no address found for this location"))
    }
}

/// Address for a new report. Geocoding is best-effort: on failure (or when
/// disabled) the coordinate label is used and the error handed back for
/// display.
pub fn resolve_address(
    geocoder: Option<&dyn ReverseGeocoder>,
    location: Location,
) -> (String, Option<RescueError>) {
    let Some(geocoder) = geocoder else {
        return (location.short_label(), None);
    };
    match geocoder.reverse(location) {
        Ok(address) => (address, None),
        Err(err) => (location.short_label(), Some(err)),
    }
}

pub trait LocationProvider {
    fn locate(&self, cancel: Option<&AtomicBool>) -> Result<Location>;
}

/// Device position from an external command (for example `CoreLocationCLI`
/// or a `gpspipe` wrapper) printing `lat,lng` or `lat lng`.
#[derive(Debug, Clone)]
pub struct CommandLocator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandLocator {
    pub fn from_config(cfg: &LocationConfig) -> Result<Self> {
        let Some(command) = cfg.command.as_deref() else {
            return Err(RescueError::network(
                "device location is not available (set [location] command in the config)",
            ));
        };
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            return Err(RescueError::network("[location] command is empty"));
        };
        Ok(Self {
            program,
            args: parts.collect(),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        })
    }
}

impl LocationProvider for CommandLocator {
    fn locate(&self, cancel: Option<&AtomicBool>) -> Result<Location> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let out = platform::run_command_cancellable(&self.program, &args, self.timeout, cancel)
            .map_err(|e| RescueError::network(format!("unable to get your location: {e:#}")))?;
        if out.exit_code != 0 {
            return Err(RescueError::network(format!(
                "unable to get your location: {} exited with {} ({})",
                self.program,
                out.exit_code,
                out.stderr.trim()
            )));
        }
        parse_location_output(&out.stdout)
    }
}

/// First non-empty line of the locator's output, as coordinates.
pub fn parse_location_output(stdout: &str) -> Result<Location> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| RescueError::network("location command printed nothing"))?;
    line.parse::<Location>()
        .map_err(|e| RescueError::network(format!("unreadable location output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Fixed(Result<String>);

    impl ReverseGeocoder for Fixed {
        fn reverse(&self, _location: Location) -> Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(RescueError::network("offline")),
            }
        }
    }

    #[test]
    fn resolve_address_falls_back_to_coordinates() {
        let loc = Location::new(40.7128, -74.006);

        let (addr, err) = resolve_address(None, loc);
        assert_eq!(addr, "40.7128, -74.0060");
        assert!(err.is_none());

        let ok = Fixed(Ok("Central Park, New York".to_string()));
        let (addr, err) = resolve_address(Some(&ok), loc);
        assert_eq!(addr, "Central Park, New York");
        assert!(err.is_none());

        let failing = Fixed(Err(RescueError::network("offline")));
        let (addr, err) = resolve_address(Some(&failing), loc);
        assert_eq!(addr, "40.7128, -74.0060");
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Network));
    }

    #[test]
    fn locator_output_parsing() {
        assert_eq!(
            parse_location_output("\n  51.5074 -0.1278\n").unwrap(),
            Location::new(51.5074, -0.1278)
        );
        assert_eq!(
            parse_location_output("").unwrap_err().kind(),
            ErrorKind::Network
        );
        assert!(parse_location_output("kCLErrorDomain error 1").is_err());
    }

    #[test]
    fn missing_command_is_a_network_error() {
        let cfg = LocationConfig {
            command: None,
            timeout_secs: 10,
        };
        let err = CommandLocator::from_config(&cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[cfg(unix)]
    #[test]
    fn command_locator_reads_coordinates() {
        let cfg = LocationConfig {
            command: Some("echo 35.6762,139.6503".to_string()),
            timeout_secs: 5,
        };
        let locator = CommandLocator::from_config(&cfg).unwrap();
        assert_eq!(
            locator.locate(None).unwrap(),
            Location::new(35.6762, 139.6503)
        );
    }
}
