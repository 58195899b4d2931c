use image::DynamicImage;
use std::sync::Arc;

use super::InferenceError;
use super::model::ScoreModel;
use super::preprocess::PreprocessSpec;
use super::topk::TopKSelector;
use crate::catalog::labels::LabelCatalog;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPrediction {
    /// One to three category names, best first.
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
    /// False when no score beat the initial rank-1 slot.
    pub rank_one_filled: bool,
}

/// Multi-label food category classifier: one to three category names per image.
pub struct FoodCategoryClassifier {
    model: Arc<dyn ScoreModel>,
    labels: LabelCatalog,
    selector: TopKSelector,
    preprocess: PreprocessSpec,
}

impl FoodCategoryClassifier {
    pub fn new(
        model: Arc<dyn ScoreModel>,
        labels: LabelCatalog,
        selector: TopKSelector,
        preprocess: PreprocessSpec,
    ) -> Self {
        Self {
            model,
            labels,
            selector,
            preprocess,
        }
    }

    pub fn classify(&self, image: &DynamicImage) -> Result<CategoryPrediction, InferenceError> {
        let input = self.preprocess.apply(image);
        let scores = self.model.forward(&input)?;
        self.predict(scores)
    }

    fn predict(&self, scores: Vec<f32>) -> Result<CategoryPrediction, InferenceError> {
        if scores.len() != self.labels.len() {
            return Err(InferenceError::OutputShape {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }
        let ranked = self.selector.select(&scores);
        let rank_one_filled = ranked.first().is_some_and(|r| r.assigned);
        let labels = ranked
            .iter()
            .map(|r| {
                self.labels
                    .label(r.index)
                    .map(str::to_string)
                    .ok_or(InferenceError::OutputShape {
                        expected: self.labels.len(),
                        actual: r.index + 1,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CategoryPrediction {
            labels,
            scores,
            rank_one_filled,
        })
    }
}
