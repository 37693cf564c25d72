//! Local zero-shot classification.
//!
//! A [`ZeroShotModel`] scores a fixed set of candidate labels for a piece of text and
//! returns them best first. [`LocalClassifier`] offers it the three urgency labels
//! and takes the winner. The bundled [`KeywordModel`] scores labels by lexicon hits,
//! which is enough for field deployments without network access.

use anyhow::{anyhow, Result};
use log::info;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::{parse_label, ClassifyError};
use crate::message::Urgency;

/// A label and its score from a zero-shot model.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Anything that can rank candidate labels for a text.
pub trait ZeroShotModel: Send + Sync {
    /// Return `candidate_labels` ranked best first.
    fn rank(&self, text: &str, candidate_labels: &[&str]) -> Result<Vec<LabelScore>>;
}

pub struct LocalClassifier {
    model: Box<dyn ZeroShotModel>,
}

impl LocalClassifier {
    pub fn new(model: Box<dyn ZeroShotModel>) -> Self {
        Self { model }
    }

    pub fn try_classify(&self, text: &str) -> Result<Urgency, ClassifyError> {
        let ranked = self
            .model
            .rank(text, &Urgency::LABELS)
            .map_err(|e| ClassifyError::Model(e.to_string()))?;
        let top = ranked
            .first()
            .ok_or_else(|| ClassifyError::Model("model returned no labels".into()))?;
        parse_label(&top.label)
    }
}

/// Lexicon file layout: label -> list of keywords.
#[derive(Debug, Deserialize)]
struct Lexicon(HashMap<String, Vec<String>>);

/// Keyword-count model. Ties resolve in favour of the label listed last among the
/// candidates (LOW for the urgency labels), so text with no signal stays LOW.
#[derive(Debug, Clone)]
pub struct KeywordModel {
    keywords: HashMap<String, HashSet<String>>,
}

const BUILTIN_HIGH: &[&str] = &[
    "sos", "emergency", "urgent", "trapped", "injured", "injury", "bleeding", "unconscious",
    "dying", "dead", "fire", "collapsed", "collapse", "drowning", "critical", "heart",
    "attack", "stroke", "rescue", "buried", "explosion", "gas", "leak",
];
const BUILTIN_MEDIUM: &[&str] = &[
    "need", "needs", "water", "food", "shelter", "medicine", "medical", "supplies",
    "stranded", "flood", "flooding", "evacuate", "evacuation", "power", "blocked",
    "missing", "sick", "fever", "help", "insulin", "baby",
];
const BUILTIN_LOW: &[&str] = &[
    "ok", "okay", "safe", "fine", "update", "status", "test", "info", "thanks",
    "received", "arrived", "checking",
];

impl KeywordModel {
    pub fn builtin() -> Self {
        let mut keywords = HashMap::new();
        for (label, words) in [
            ("HIGH", BUILTIN_HIGH),
            ("MEDIUM", BUILTIN_MEDIUM),
            ("LOW", BUILTIN_LOW),
        ] {
            keywords.insert(
                label.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            );
        }
        Self { keywords }
    }

    /// Load a JSON lexicon of the form `{"HIGH": ["trapped", ...], "MEDIUM": [...], "LOW": [...]}`.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read lexicon {}: {}", path, e))?;
        let model = Self::from_json(&raw).map_err(|e| anyhow!("Invalid lexicon {}: {}", path, e))?;
        info!(
            "Loaded keyword lexicon from {} ({} labels)",
            path,
            model.keywords.len()
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let Lexicon(map) = serde_json::from_str(raw)?;
        if map.is_empty() {
            return Err(anyhow!("lexicon defines no labels"));
        }
        let keywords = map
            .into_iter()
            .map(|(label, words)| {
                (
                    label.trim().to_ascii_uppercase(),
                    words.into_iter().map(|w| w.trim().to_lowercase()).collect(),
                )
            })
            .collect();
        Ok(Self { keywords })
    }
}

impl ZeroShotModel for KeywordModel {
    fn rank(&self, text: &str, candidate_labels: &[&str]) -> Result<Vec<LabelScore>> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut scored: Vec<(usize, LabelScore)> = candidate_labels
            .iter()
            .enumerate()
            .map(|(pos, label)| {
                let hits = self
                    .keywords
                    .get(&label.to_ascii_uppercase())
                    .map(|words| tokens.iter().filter(|t| words.contains(*t)).count())
                    .unwrap_or(0);
                (
                    pos,
                    LabelScore {
                        label: label.to_string(),
                        score: hits as f32,
                    },
                )
            })
            .collect();

        let total: f32 = scored.iter().map(|(_, s)| s.score).sum();
        if total > 0.0 {
            for (_, s) in scored.iter_mut() {
                s.score /= total;
            }
        }
        scored.sort_by(|(pa, a), (pb, b)| b.score.total_cmp(&a.score).then(pb.cmp(pa)));
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;
    impl ZeroShotModel for Broken {
        fn rank(&self, _: &str, _: &[&str]) -> Result<Vec<LabelScore>> {
            Err(anyhow!("model offline"))
        }
    }

    struct Answers(&'static str);
    impl ZeroShotModel for Answers {
        fn rank(&self, _: &str, _: &[&str]) -> Result<Vec<LabelScore>> {
            Ok(vec![LabelScore {
                label: self.0.to_string(),
                score: 1.0,
            }])
        }
    }

    #[test]
    fn keyword_model_ranks_by_hits() {
        let ranked = KeywordModel::builtin()
            .rank("Need water and food for 20 people", &Urgency::LABELS)
            .unwrap();
        assert_eq!(ranked[0].label, "MEDIUM");
        assert!((ranked[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn no_signal_ranks_low_first() {
        let ranked = KeywordModel::builtin()
            .rank("zzz qqq", &Urgency::LABELS)
            .unwrap();
        assert_eq!(ranked[0].label, "LOW");
    }

    #[test]
    fn custom_lexicon_normalizes_case() {
        let model = KeywordModel::from_json(r#"{"high": ["Tsunami"], "low": []}"#).unwrap();
        let ranked = model.rank("TSUNAMI warning", &Urgency::LABELS).unwrap();
        assert_eq!(ranked[0].label, "HIGH");
    }

    #[test]
    fn empty_lexicon_is_rejected() {
        assert!(KeywordModel::from_json("{}").is_err());
        assert!(KeywordModel::from_json("[1,2]").is_err());
    }

    #[test]
    fn model_errors_and_unknown_labels_surface_as_classify_errors() {
        let broken = LocalClassifier::new(Box::new(Broken));
        assert!(matches!(
            broken.try_classify("x"),
            Err(ClassifyError::Model(_))
        ));
        let odd = LocalClassifier::new(Box::new(Answers("SEVERE")));
        assert!(matches!(
            odd.try_classify("x"),
            Err(ClassifyError::InvalidLabel(_))
        ));
    }
}
