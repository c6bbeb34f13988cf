//! Soil and crop recommendation
//!
//! The rule is a fixed placeholder: every location with weather and water
//! level data gets the same answer. Inputs are still checked so the caller
//! sees the same availability errors a real rule would raise.

use crate::error::RecommendationError;
use crate::stats::Metric;
use crate::weather::WeatherLookup;
use serde::Serialize;
use tracing::info;

pub const PLACEHOLDER_SOIL: &str = "Click Generate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub soil_type: String,
    pub crops: String,
}

impl Recommendation {
    /// State before anything has been generated
    pub fn placeholder() -> Self {
        Recommendation {
            soil_type: PLACEHOLDER_SOIL.to_string(),
            crops: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.crops.is_empty() && self.soil_type == PLACEHOLDER_SOIL
    }
}

impl Default for Recommendation {
    fn default() -> Self {
        Recommendation::placeholder()
    }
}

fn rule_based(_state: &str, _temperature_c: f64, _avg_dtwl: f64) -> Recommendation {
    Recommendation {
        soil_type: "Alluvial Soil".to_string(),
        crops: "Rice, Wheat, Sugarcane".to_string(),
    }
}

/// Generate a recommendation; needs current weather and a defined mean DTWL
pub fn recommend(
    state: &str,
    weather: &WeatherLookup,
    overall_dtwl: Metric,
) -> Result<Recommendation, RecommendationError> {
    match (weather, overall_dtwl.value()) {
        (WeatherLookup::Available(data), Some(avg)) => {
            let recommendation = rule_based(state, data.temperature_c, avg);
            info!(
                "Recommended {} on {} for {:?}",
                recommendation.crops, recommendation.soil_type, state
            );
            Ok(recommendation)
        }
        _ => Err(RecommendationError::InputsUnavailable),
    }
}
