use super::registry::{ModelRegistry, VideoModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: VideoModel,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Never fails: unknown or absent hints fall back to the registry default.
    pub fn select(&self, requested: Option<&str>) -> ModelSelection {
        let requested = requested
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(requested_value) = requested else {
            return ModelSelection {
                model: self.registry.default_model(),
                requested: None,
                fallback_reason: None,
            };
        };

        if let Some(spec) = self.registry.get(requested_value) {
            return ModelSelection {
                model: spec.model,
                requested: Some(requested_value.to_string()),
                fallback_reason: None,
            };
        }

        let model = self.registry.default_model();
        ModelSelection {
            model,
            requested: Some(requested_value.to_string()),
            fallback_reason: Some(format!(
                "Unknown video model '{requested_value}'; using {}.",
                model.id()
            )),
        }
    }
}

/// Maps a free-form model hint to a canonical video model.
pub fn normalize_model(hint: Option<&str>) -> VideoModel {
    ModelSelector::default().select(hint).model
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{normalize_model, ModelSelector};
    use crate::models::{ModelRegistry, ModelSpec, VideoModel};

    #[test]
    fn model_synonyms_map_to_canonical_ids() {
        let cases = [
            ("standard", "veo-3.0-generate-001"),
            ("fast", "veo-3.0-fast-generate-001"),
            ("dialogue", "veo-3.1-generate-preview"),
            ("dialogue-fast", "veo-3.1-fast-generate-preview"),
            ("veo-3.1-fast-generate-preview", "veo-3.1-fast-generate-preview"),
            ("Veo-3.1", "veo-3.1-generate-preview"),
        ];
        for (hint, expected) in cases {
            assert_eq!(normalize_model(Some(hint)).id(), expected, "hint {hint}");
        }
    }

    #[test]
    fn absent_or_unknown_model_uses_standard() {
        assert_eq!(normalize_model(None), VideoModel::Standard);
        assert_eq!(normalize_model(Some("   ")), VideoModel::Standard);
        assert_eq!(normalize_model(Some("sora-2")), VideoModel::Standard);
    }

    #[test]
    fn selector_explains_fallbacks() {
        let selector = ModelSelector::default();

        let unknown = selector.select(Some("sora-2"));
        assert_eq!(unknown.requested.as_deref(), Some("sora-2"));
        assert_eq!(
            unknown.fallback_reason.as_deref(),
            Some("Unknown video model 'sora-2'; using veo-3.0-generate-001.")
        );

        let absent = selector.select(None);
        assert_eq!(absent.model, VideoModel::Standard);
        assert!(absent.requested.is_none());
        assert!(absent.fallback_reason.is_none());

        let blank = selector.select(Some("  "));
        assert!(blank.fallback_reason.is_none());

        let known = selector.select(Some(" fast "));
        assert_eq!(known.model, VideoModel::Fast);
        assert_eq!(known.requested.as_deref(), Some("fast"));
        assert!(known.fallback_reason.is_none());
    }

    #[test]
    fn selector_respects_custom_registry_order() {
        let mut models = IndexMap::new();
        models.insert(
            VideoModel::Fast,
            ModelSpec {
                model: VideoModel::Fast,
                aliases: vec!["cheap".to_string()],
            },
        );
        let selector = ModelSelector::new(Some(ModelRegistry::new(Some(models))));
        assert_eq!(selector.select(None).model, VideoModel::Fast);
        assert_eq!(selector.select(Some("dialogue")).model, VideoModel::Fast);
    }
}
