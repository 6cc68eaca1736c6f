use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{position::Position, stats::WalkStats};

pub type WalkId = i64;
pub type PetId = i64;

/// Body of `POST /walks/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWalkRequest {
    pub pet_id: PetId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWalkResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub walk: Walk,
}

/// A walk as the backend reports it. Only `id` is required by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walk {
    pub id: WalkId,
    #[serde(default)]
    pub pet_id: Option<PetId>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
}

/// Route point on the wire, `{"lat": .., "lng": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<&Position> for RoutePoint {
    fn from(position: &Position) -> Self {
        Self {
            lat: position.latitude,
            lng: position.longitude,
        }
    }
}

/// Body of `PUT /walks/finish/{walk_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishWalkRequest {
    pub route_data: Vec<RoutePoint>,
    /// Meters.
    pub distance: u64,
    /// Seconds.
    pub duration: u64,
    pub calories: u64,
}

impl FinishWalkRequest {
    pub fn new(route: &[Position], stats: &WalkStats) -> Self {
        Self {
            route_data: route.iter().map(RoutePoint::from).collect(),
            distance: stats.distance_meters,
            duration: stats.duration_seconds,
            calories: stats.calories,
        }
    }
}

/// Error body the backend sends alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// What a successfully finished walk leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkSummary {
    pub walk_id: WalkId,
    pub pet_id: PetId,
    pub stats: WalkStats,
    pub route: Vec<Position>,
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[test]
    fn start_response_parses_backend_walk() {
        let body = r#"{
            "message": "Passeio iniciado com sucesso",
            "walk": {
                "id": 42,
                "start_time": "2024-05-01T10:15:30.123456",
                "end_time": null,
                "duration": null,
                "distance": null,
                "route_data": null,
                "user_id": 3,
                "pet_id": 7
            }
        }"#;

        let response: StartWalkResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.walk.id, 42);
        assert_eq!(response.walk.pet_id, Some(7));
        assert!(response.walk.start_time.is_some());
        assert!(response.walk.end_time.is_none());
    }

    #[test]
    fn finish_request_uses_backend_field_names() {
        let t = DateTime::from_timestamp(0, 0).unwrap();
        let route = vec![Position::new(56.1, 10.2, t).with_accuracy(4.0)];
        let stats = WalkStats { duration_seconds: 640, distance_meters: 1000, calories: 50 };

        let json = serde_json::to_value(FinishWalkRequest::new(&route, &stats)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "route_data": [{ "lat": 56.1, "lng": 10.2 }],
                "distance": 1000,
                "duration": 640,
                "calories": 50
            })
        );
    }
}
