//! # Urgency classification
//!
//! Every new message is labelled HIGH, MEDIUM or LOW before it is stored. Three
//! strategies exist and exactly one is active per deployment:
//!
//! - [`RemoteClassifier`] asks a generative-text API for a single label.
//! - [`LocalClassifier`] ranks the labels with a local [`ZeroShotModel`].
//! - [`StaticClassifier`] trusts the urgency carried in the frame, if any.
//!
//! Classification cannot fail from the pipeline's point of view: every error
//! resolves to [`Urgency::Low`] and is reported in [`Classification::fallback`].

pub mod local;
pub mod remote;

use anyhow::Result;
use log::warn;

use crate::config::{ClassifierConfig, ClassifierStrategy};
use crate::logutil::{preview, MESSAGE_PREVIEW};
use crate::message::Urgency;

pub use local::{KeywordModel, LabelScore, LocalClassifier, ZeroShotModel};
pub use remote::RemoteClassifier;

/// Urgency used whenever a classifier cannot produce a valid label.
pub const FALLBACK_URGENCY: Urgency = Urgency::Low;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier timed out after {0}s")]
    Timeout(u64),

    #[error("classifier request failed: {0}")]
    Http(String),

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier answered with invalid label '{0}'")]
    InvalidLabel(String),

    #[error("local model error: {0}")]
    Model(String),
}

/// Result of one classification, including why a fallback was used.
#[derive(Debug)]
pub struct Classification {
    pub urgency: Urgency,
    pub fallback: Option<ClassifyError>,
}

impl Classification {
    fn resolved(result: Result<Urgency, ClassifyError>) -> Self {
        match result {
            Ok(urgency) => Self {
                urgency,
                fallback: None,
            },
            Err(e) => Self {
                urgency: FALLBACK_URGENCY,
                fallback: Some(e),
            },
        }
    }
}

/// Offline strategy: use the label the sender embedded in the frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticClassifier;

impl StaticClassifier {
    pub fn classify(&self, embedded: Option<Urgency>) -> Urgency {
        embedded.unwrap_or(FALLBACK_URGENCY)
    }
}

/// The active classification strategy.
pub enum Classifier {
    Remote(RemoteClassifier),
    Local(LocalClassifier),
    Static(StaticClassifier),
}

impl Classifier {
    /// Build the configured strategy. Loading a local model that cannot be read is
    /// fatal here, never per message.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        Ok(match cfg.strategy {
            ClassifierStrategy::Static => Classifier::Static(StaticClassifier),
            ClassifierStrategy::Local => {
                let model = match &cfg.lexicon_file {
                    Some(path) => KeywordModel::load(path)?,
                    None => KeywordModel::builtin(),
                };
                Classifier::Local(LocalClassifier::new(Box::new(model)))
            }
            ClassifierStrategy::Remote => Classifier::Remote(RemoteClassifier::new(cfg)?),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Classifier::Remote(_) => "remote",
            Classifier::Local(_) => "local",
            Classifier::Static(_) => "static",
        }
    }

    /// Classify `text`; `embedded` is the urgency carried by the frame, if any.
    pub async fn assess(&self, text: &str, embedded: Option<Urgency>) -> Classification {
        let classification = match self {
            Classifier::Remote(c) => Classification::resolved(c.try_classify(text).await),
            Classifier::Local(c) => Classification::resolved(c.try_classify(text)),
            Classifier::Static(c) => Classification {
                urgency: c.classify(embedded),
                fallback: None,
            },
        };
        if let Some(ref e) = classification.fallback {
            warn!(
                "{} classifier fell back to {} for '{}': {}",
                self.name(),
                FALLBACK_URGENCY,
                preview(text, MESSAGE_PREVIEW),
                e
            );
        }
        classification
    }

    pub async fn classify(&self, text: &str, embedded: Option<Urgency>) -> Urgency {
        self.assess(text, embedded).await.urgency
    }
}

impl From<StaticClassifier> for Classifier {
    fn from(c: StaticClassifier) -> Self {
        Classifier::Static(c)
    }
}

impl From<LocalClassifier> for Classifier {
    fn from(c: LocalClassifier) -> Self {
        Classifier::Local(c)
    }
}

impl From<RemoteClassifier> for Classifier {
    fn from(c: RemoteClassifier) -> Self {
        Classifier::Remote(c)
    }
}

/// Normalize a model answer to a label: trim, strip surrounding punctuation, upper-case.
pub(crate) fn parse_label(answer: &str) -> Result<Urgency, ClassifyError> {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_uppercase();
    cleaned
        .parse::<Urgency>()
        .map_err(|_| ClassifyError::InvalidLabel(answer.trim().to_string()))
}
