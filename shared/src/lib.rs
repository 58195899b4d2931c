use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString};

/// Sent in place of a nutrition record when the identified food has none.
pub const NUTRITION_PLACEHOLDER: &str = "Details not found.";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ImageRequest {
    #[serde(rename = "baseString", default)]
    pub base_string: Option<String>,
}

/// `[label, nutrition]`, where `nutrition` is the stored record or
/// [`NUTRITION_PLACEHOLDER`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FoodIdentification(pub String, pub serde_json::Value);

/// `[[label, nutrition], [category, ...]]`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InferenceResponse(pub FoodIdentification, pub Vec<String>);

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    EnumCount,
)]
pub enum FoodCategory {
    Bread,
    #[serde(rename = "Dairy product")]
    #[strum(serialize = "Dairy product")]
    DairyProduct,
    Dessert,
    Egg,
    #[serde(rename = "Fried food")]
    #[strum(serialize = "Fried food")]
    FriedFood,
    Meat,
    #[serde(rename = "Noodles-Pasta")]
    #[strum(serialize = "Noodles-Pasta")]
    NoodlesPasta,
    Rice,
    Seafood,
    Soup,
    #[serde(rename = "Vegetable-Fruit")]
    #[strum(serialize = "Vegetable-Fruit")]
    VegetableFruit,
}
