use serde::{Deserialize, Serialize};

/// Live readout of a walk. Everything here is derived, never stored on the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub duration_seconds: u64,
    pub distance_meters: u64,
    pub calories: u64,
}

impl WalkStats {
    /// `MM:SS`, or `HH:MM:SS` once the walk passes an hour.
    pub fn format_duration(&self) -> String {
        let hours = self.duration_seconds / 3600;
        let minutes = (self.duration_seconds % 3600) / 60;
        let seconds = self.duration_seconds % 60;

        if hours > 0 {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }
}

/// Fixed linear estimate: `floor(km * kcal_per_km)`.
pub fn estimate_calories(distance_meters: u64, kcal_per_km: f64) -> u64 {
    ((distance_meters as f64 / 1000.0) * kcal_per_km).floor().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calories_at_fifty_per_km() {
        assert_eq!(estimate_calories(0, 50.0), 0);
        assert_eq!(estimate_calories(999, 50.0), 49);
        assert_eq!(estimate_calories(1000, 50.0), 50);
        assert_eq!(estimate_calories(2500, 50.0), 125);
    }

    #[test]
    fn duration_formatting() {
        let stats = |duration_seconds| WalkStats { duration_seconds, ..Default::default() };
        assert_eq!(stats(0).format_duration(), "00:00");
        assert_eq!(stats(640).format_duration(), "10:40");
        assert_eq!(stats(3599).format_duration(), "59:59");
        assert_eq!(stats(3661).format_duration(), "01:01:01");
    }
}
