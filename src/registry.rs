use serde::{Deserialize, Serialize};

/// A named city with fixed coordinates, used as the query key into the forecast API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Name used in file names: spaces become underscores.
    pub fn safe_name(&self) -> String {
        crate::utils::safe_name(&self.name)
    }
}

pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("Karachi", 24.8607, 67.0011),
        Location::new("Lahore", 31.5204, 74.3587),
        Location::new("Islamabad", 33.6844, 73.0479),
        Location::new("Multan", 30.1575, 71.5249),
        Location::new("Quetta", 30.1798, 66.9750),
    ]
}

/// Hourly variables requested from the API, in output column order.
pub fn default_hourly_variables() -> Vec<String> {
    [
        "temperature_2m",
        "relativehumidity_2m",
        "precipitation",
        "weathercode",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let locations = default_locations();
        assert_eq!(locations.len(), 5);
        assert_eq!(locations[0].name, "Karachi");
        assert_eq!(locations[1], Location::new("Lahore", 31.5204, 74.3587));
    }

    #[test]
    fn test_safe_name_replaces_spaces() {
        let location = Location::new("Dera Ghazi Khan", 30.05, 70.63);
        assert_eq!(location.safe_name(), "Dera_Ghazi_Khan");
    }

    #[test]
    fn test_default_variables_order() {
        assert_eq!(
            default_hourly_variables(),
            vec![
                "temperature_2m",
                "relativehumidity_2m",
                "precipitation",
                "weathercode"
            ]
        );
    }
}
