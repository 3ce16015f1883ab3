use serde::{Deserialize, Serialize};

/// Per-token prices of a model, as decimal strings in US dollars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per prompt token.
    #[serde(default)]
    pub prompt: String,

    /// Price per completion token.
    #[serde(default)]
    pub completion: String,
}

impl ModelPricing {
    /// Convert a per-token price string into dollars per million tokens.
    pub fn per_million(price: &str) -> Option<f64> {
        price.parse::<f64>().ok().map(|p| p * 1_000_000.0)
    }
}

/// One entry of the model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier to pass in requests, e.g. `anthropic/claude-sonnet-4`.
    pub id: String,

    /// A human-readable name for the model.
    #[serde(default)]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Context window in tokens.
    #[serde(default)]
    pub context_length: Option<u64>,

    /// Prices.
    #[serde(default)]
    pub pricing: ModelPricing,
}

/// Body of `GET /models`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// The catalog entries.
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_catalog_ignoring_unknown_fields() {
        let body = r#"{"data": [{
            "id": "openai/gpt-4o",
            "name": "OpenAI: GPT-4o",
            "created": 1715558400,
            "description": "GPT-4o is OpenAI's flagship model.",
            "context_length": 128000,
            "architecture": {"modality": "text+image->text"},
            "pricing": {"prompt": "0.0000025", "completion": "0.00001", "image": "0.003613"}
        }]}"#;
        let list: ModelList = serde_json::from_str(body).unwrap();
        assert_eq!(list.data.len(), 1);
        let model = &list.data[0];
        assert_eq!(model.id, "openai/gpt-4o");
        assert_eq!(model.context_length, Some(128000));
        let prompt = ModelPricing::per_million(&model.pricing.prompt).unwrap();
        assert!((prompt - 2.5).abs() < 1e-9);
    }

    #[test]
    fn sparse_entries_parse() {
        let model: ModelInfo = serde_json::from_str(r#"{"id": "x/y"}"#).unwrap();
        assert_eq!(model.id, "x/y");
        assert!(model.name.is_empty());
        assert_eq!(model.context_length, None);
        assert_eq!(ModelPricing::per_million(&model.pricing.prompt), None);
    }
}
