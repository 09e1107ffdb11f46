use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The Veo variants the video tool can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoModel {
    #[default]
    Standard,
    Fast,
    Dialogue,
    DialogueFast,
}

impl VideoModel {
    pub const ALL: [VideoModel; 4] = [
        VideoModel::Standard,
        VideoModel::Fast,
        VideoModel::Dialogue,
        VideoModel::DialogueFast,
    ];

    /// API model identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Standard => "veo-3.0-generate-001",
            Self::Fast => "veo-3.0-fast-generate-001",
            Self::Dialogue => "veo-3.1-generate-preview",
            Self::DialogueFast => "veo-3.1-fast-generate-preview",
        }
    }

    pub fn supports_dialogue(&self) -> bool {
        matches!(self, Self::Dialogue | Self::DialogueFast)
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast | Self::DialogueFast)
    }

    /// Rough list price, used only for the cost estimate in events.
    pub fn cost_per_second_usd(&self) -> f64 {
        if self.is_fast() {
            0.15
        } else {
            0.40
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model: VideoModel,
    pub aliases: Vec<String>,
}

impl ModelSpec {
    pub fn name(&self) -> &'static str {
        self.model.id()
    }

    pub fn answers_to(&self, key: &str) -> bool {
        self.name() == key || self.aliases.iter().any(|alias| alias == key)
    }
}

/// Lookup table from lower-cased names and aliases to video models.
/// Insertion order is preserved; the first entry is the default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<VideoModel, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<VideoModel, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        let key = lookup_key(name);
        if key.is_empty() {
            return None;
        }
        self.models.values().find(|spec| spec.answers_to(&key))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn default_model(&self) -> VideoModel {
        self.models
            .keys()
            .next()
            .copied()
            .unwrap_or_default()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

pub(crate) fn lookup_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn default_models() -> IndexMap<VideoModel, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |model: VideoModel, aliases: &[&str]| {
        map.insert(
            model,
            ModelSpec {
                model,
                aliases: aliases.iter().map(|alias| (*alias).to_string()).collect(),
            },
        );
    };

    insert(
        VideoModel::Standard,
        &[
            "standard",
            "default",
            "quality",
            "veo",
            "veo3",
            "veo-3",
            "veo-3.0",
            "veo-3.0-generate-preview",
        ],
    );
    insert(
        VideoModel::Fast,
        &[
            "fast",
            "quick",
            "cheap",
            "veo3-fast",
            "veo-3-fast",
            "veo-3.0-fast",
            "veo-3.0-fast-generate-preview",
        ],
    );
    insert(
        VideoModel::Dialogue,
        &[
            "dialogue",
            "audio",
            "speech",
            "sound",
            "veo3.1",
            "veo-3.1",
            "veo-3.1-generate-001",
        ],
    );
    insert(
        VideoModel::DialogueFast,
        &[
            "dialogue-fast",
            "dialogue fast",
            "fast-dialogue",
            "fast dialogue",
            "audio-fast",
            "veo3.1-fast",
            "veo-3.1-fast",
            "veo-3.1-fast-generate-001",
        ],
    );

    map
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, VideoModel};

    #[test]
    fn canonical_ids_resolve_to_themselves() {
        let registry = ModelRegistry::default();
        for model in VideoModel::ALL {
            let spec = registry.get(model.id()).map(|spec| spec.model);
            assert_eq!(spec, Some(model), "{}", model.id());
        }
    }

    #[test]
    fn aliases_are_case_and_space_insensitive() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.get("  FAST ").map(|spec| spec.model),
            Some(VideoModel::Fast)
        );
        assert_eq!(
            registry.get("Dialogue   Fast").map(|spec| spec.model),
            Some(VideoModel::DialogueFast)
        );
        assert!(registry.get("").is_none());
        assert!(registry.get("sora").is_none());
    }

    #[test]
    fn every_alias_belongs_to_exactly_one_model() {
        let registry = ModelRegistry::default();
        for spec in registry.list() {
            for alias in &spec.aliases {
                let owners = registry
                    .list()
                    .filter(|other| other.answers_to(alias))
                    .count();
                assert_eq!(owners, 1, "alias {alias} is ambiguous");
            }
        }
    }

    #[test]
    fn standard_is_the_default() {
        assert_eq!(ModelRegistry::default().default_model(), VideoModel::Standard);
        assert_eq!(VideoModel::default(), VideoModel::Standard);
    }

    #[test]
    fn capability_flags_match_variants() {
        assert!(!VideoModel::Standard.supports_dialogue());
        assert!(VideoModel::DialogueFast.supports_dialogue());
        assert!(VideoModel::DialogueFast.is_fast());
        assert_eq!(VideoModel::Fast.cost_per_second_usd(), 0.15);
        assert_eq!(VideoModel::Dialogue.cost_per_second_usd(), 0.40);
    }
}
