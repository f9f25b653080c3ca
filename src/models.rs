use serde::Serialize;

/// One decoded sensor reading, in the units the backend expects.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub temp_fahrenheit: f32,
    pub humidity_percentage: f32,
}

impl Measurement {
    pub fn from_celsius(celsius: f32, humidity_percentage: f32) -> Self {
        Self {
            temp_fahrenheit: celsius * 1.8 + 32.0,
            humidity_percentage,
        }
    }

    pub fn temp_celsius(&self) -> f32 {
        (self.temp_fahrenheit - 32.0) / 1.8
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_backend_field_names() {
        let m = Measurement {
            temp_fahrenheit: 71.5,
            humidity_percentage: 40.25,
        };
        let json: serde_json::Value = serde_json::from_slice(&m.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tempFahrenheit": 71.5, "humidityPercentage": 40.25})
        );
    }

    #[test]
    fn celsius_is_converted_to_fahrenheit() {
        let m = Measurement::from_celsius(100.0, 0.0);
        assert!((m.temp_fahrenheit - 212.0).abs() < 1e-3);
        assert!((m.temp_celsius() - 100.0).abs() < 1e-3);
    }
}
