use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::interpret::Interpretation;
use crate::taxonomy::{DiseaseCategory, DiseaseTaxonomy};

/// JSON body variant of `/predict`.
#[derive(Deserialize)]
pub struct Base64PredictRequest {
    pub image_base64: String,
}

#[derive(Serialize)]
pub struct PredictionDetail {
    pub disease: String,
    pub disease_type: String,
    pub confidence: f32,
    pub confidence_level: String,
    pub reliability: String,
    pub treatment: String,
    pub is_valid_input: bool,
}

#[derive(Serialize)]
pub struct TopPrediction {
    pub disease: String,
    pub confidence: f32,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: PredictionDetail,
    pub top_predictions: Vec<TopPrediction>,
    /// Keyed by class name, in taxonomy order (serde_json preserves
    /// insertion order here) so responses diff cleanly across requests.
    pub all_predictions: Map<String, Value>,
    /// Always serialized; demo-mode responses must never lose the marker.
    pub demo_mode: bool,
    pub timestamp: String,
}

impl PredictResponse {
    pub fn build(
        interpretation: &Interpretation,
        taxonomy: &DiseaseTaxonomy,
        demo_mode: bool,
    ) -> Self {
        let top = &taxonomy.entries()[interpretation.top_index];

        let reliability = if demo_mode {
            "Demo Mode".to_string()
        } else {
            interpretation.bucket.reliability().to_string()
        };

        let top_predictions = interpretation
            .top_k
            .iter()
            .map(|&(index, confidence)| TopPrediction {
                disease: taxonomy.entries()[index].name.clone(),
                confidence,
            })
            .collect();

        let mut all_predictions = Map::new();
        for (entry, &score) in taxonomy.entries().iter().zip(&interpretation.scores) {
            all_predictions.insert(entry.name.clone(), Value::from(score));
        }

        Self {
            success: true,
            prediction: PredictionDetail {
                disease: top.name.clone(),
                disease_type: top.category.as_str().to_string(),
                confidence: interpretation.confidence,
                confidence_level: interpretation.bucket.level().to_string(),
                reliability,
                treatment: top.treatment.clone(),
                is_valid_input: top.category != DiseaseCategory::NotApplicable,
            },
            top_predictions,
            all_predictions,
            demo_mode,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub lifecycle: String,
    pub num_classes: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DiseaseInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    pub treatment: String,
}

#[derive(Serialize)]
pub struct DiseasesResponse {
    pub diseases: Vec<DiseaseInfo>,
}

#[derive(Serialize)]
pub struct ModelInfo {
    pub architecture: String,
    pub input_size: [u32; 2],
    pub num_classes: usize,
    pub classes: Vec<String>,
    pub parameters: Option<i64>,
    pub loaded_at: String,
}

#[derive(Serialize)]
pub struct ModelInfoResponse {
    pub model_info: ModelInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::interpret;

    #[test]
    fn all_predictions_serialize_in_taxonomy_order() {
        let taxonomy = DiseaseTaxonomy::default();
        let scores = vec![0.01, 0.02, 0.8, 0.03, 0.04, 0.02, 0.02, 0.03, 0.03];
        let interpretation = interpret(scores, &taxonomy).unwrap();
        let response = PredictResponse::build(&interpretation, &taxonomy, false);

        let keys: Vec<&String> = response.all_predictions.keys().collect();
        let expected: Vec<String> = taxonomy.class_names();
        assert_eq!(keys, expected.iter().collect::<Vec<_>>());

        let json = serde_json::to_string(&response).unwrap();
        // Taxonomy order survives serialization too.
        assert!(
            json.find("Bacterial Leaf Blight").unwrap() < json.find("Sheath Blight").unwrap()
        );
    }

    #[test]
    fn off_domain_top_class_flags_invalid_input() {
        let taxonomy = DiseaseTaxonomy::default();
        let mut scores = vec![0.0; 9];
        scores[6] = 0.9; // "Not a Rice Leaf"
        let interpretation = interpret(scores, &taxonomy).unwrap();
        let response = PredictResponse::build(&interpretation, &taxonomy, false);
        assert!(!response.prediction.is_valid_input);
        assert_eq!(response.prediction.disease_type, "not_applicable");
    }

    #[test]
    fn demo_response_carries_marker_and_phrase() {
        let taxonomy = DiseaseTaxonomy::default();
        let mut scores = vec![0.0; 9];
        scores[1] = 0.92;
        let interpretation = interpret(scores, &taxonomy).unwrap();
        let response = PredictResponse::build(&interpretation, &taxonomy, true);
        assert!(response.demo_mode);
        assert_eq!(response.prediction.reliability, "Demo Mode");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["demo_mode"], serde_json::Value::Bool(true));
    }

    #[test]
    fn real_response_still_serializes_the_marker() {
        let taxonomy = DiseaseTaxonomy::default();
        let mut scores = vec![0.0; 9];
        scores[0] = 0.95;
        let interpretation = interpret(scores, &taxonomy).unwrap();
        let response = PredictResponse::build(&interpretation, &taxonomy, false);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["demo_mode"], serde_json::Value::Bool(false));
        assert_eq!(json["prediction"]["confidence_level"], "Very High");
        assert_eq!(json["prediction"]["reliability"], "Very Reliable");
    }
}
