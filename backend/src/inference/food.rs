use image::DynamicImage;
use shared::FoodIdentification;
use std::sync::Arc;

use super::InferenceError;
use super::model::{ScoreModel, argmax};
use super::preprocess::PreprocessSpec;
use crate::catalog::labels::LabelCatalog;
use crate::catalog::nutrition::NutritionStore;

/// Single-label food recogniser joined with the nutrition store.
pub struct FoodIdentifier {
    model: Arc<dyn ScoreModel>,
    labels: LabelCatalog,
    nutrition: Arc<NutritionStore>,
    preprocess: PreprocessSpec,
}

impl FoodIdentifier {
    pub fn new(
        model: Arc<dyn ScoreModel>,
        labels: LabelCatalog,
        nutrition: Arc<NutritionStore>,
        preprocess: PreprocessSpec,
    ) -> Self {
        Self {
            model,
            labels,
            nutrition,
            preprocess,
        }
    }

    pub fn identify(&self, image: &DynamicImage) -> Result<FoodIdentification, InferenceError> {
        let input = self.preprocess.apply(image);
        let scores = self.model.forward(&input)?;
        let label = self.label_for(&scores)?;
        let record = self.nutrition.record_or_placeholder(label);
        Ok(FoodIdentification(label.to_string(), record))
    }

    fn label_for(&self, scores: &[f32]) -> Result<&str, InferenceError> {
        if scores.len() != self.labels.len() {
            return Err(InferenceError::OutputShape {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }
        argmax(scores)
            .and_then(|index| self.labels.label(index))
            .ok_or(InferenceError::NoUsableScore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Normalization;
    use crate::inference::model::tests::FixedScores;
    use image::RgbImage;
    use serde_json::json;

    fn identifier(scores: Vec<f32>, nutrition: NutritionStore) -> FoodIdentifier {
        FoodIdentifier::new(
            Arc::new(FixedScores(scores)),
            LabelCatalog::new(["pizza", "sushi", "waffles"]).unwrap(),
            Arc::new(nutrition),
            PreprocessSpec {
                input_size: 8,
                normalization: Normalization::None,
                rescale: 1.0 / 255.0,
            },
        )
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(16, 16))
    }

    #[test]
    fn known_label_carries_its_record() {
        let store = NutritionStore::from_json(r#"[{"name": "sushi", "calories": 150}]"#).unwrap();
        let result = identifier(vec![0.1, 0.8, 0.1], store)
            .identify(&image())
            .unwrap();
        assert_eq!(
            result,
            FoodIdentification("sushi".into(), json!({"name": "sushi", "calories": 150}))
        );
    }

    #[test]
    fn unknown_label_carries_placeholder() {
        let result = identifier(vec![0.1, 0.1, 0.8], NutritionStore::default())
            .identify(&image())
            .unwrap();
        assert_eq!(
            result,
            FoodIdentification("waffles".into(), json!("Details not found."))
        );
    }

    #[test]
    fn ties_resolve_to_first_label() {
        let result = identifier(vec![0.4, 0.4, 0.2], NutritionStore::default())
            .identify(&image())
            .unwrap();
        assert_eq!(result.0, "pizza");
    }

    #[test]
    fn wrong_output_length_is_rejected() {
        let err = identifier(vec![0.5, 0.5], NutritionStore::default())
            .identify(&image())
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputShape {
                expected: 3,
                actual: 2
            }
        ));
    }
}
