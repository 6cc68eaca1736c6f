use chrono::{DateTime, Utc};
use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// A single location sample as delivered by a geolocation source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters, if the source reports one.
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// x is longitude, y is latitude.
impl From<&Position> for Coord {
    fn from(position: &Position) -> Self {
        Coord { x: position.longitude, y: position.latitude }
    }
}

/// Polyline of a route, in the order the points were accepted.
pub fn route_line(route: &[Position]) -> LineString {
    route.iter().map(Coord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_line_keeps_order() {
        let t = DateTime::from_timestamp(0, 0).unwrap();
        let route = vec![Position::new(1.0, 2.0, t), Position::new(3.0, 4.0, t)];
        let line = route_line(&route);
        let coords: Vec<Coord> = line.coords().copied().collect();
        assert_eq!(coords, vec![Coord { x: 2.0, y: 1.0 }, Coord { x: 4.0, y: 3.0 }]);
    }
}
