//! Domain types shared by the state store, the controller and the CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::{ElementPayload, RawPrediction};

/// Contract violations in input handed to pagination or labeling functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("page size must be positive, got {0}")]
    InvalidPageSize(usize),

    #[error("unknown label value: {0:?} (expected pos, neg or none)")]
    UnknownLabel(String),

    #[error("model score {0} is outside the range [0-1]")]
    ScoreOutOfRange(f64),

    #[error("no category selected")]
    MissingCategory,

    #[error("no document at index {index} (workspace has {count})")]
    NoSuchDocument { index: usize, count: usize },
}

/// User-assigned label of an element, scoped to the current category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    None,
    Pos,
    Neg,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::None => "none",
            Label::Pos => "pos",
            Label::Neg => "neg",
        }
    }

    /// Map a backend `user_labels` value onto a label.
    ///
    /// The backend stores labels as `"true"` / `"false"` strings; anything else
    /// (including a missing entry) means the element is unlabeled.
    pub fn from_backend_value(value: Option<&str>) -> Self {
        match value {
            Some("true") => Label::Pos,
            Some("false") => Label::Neg,
            _ => Label::None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pos" => Ok(Label::Pos),
            "neg" => Ok(Label::Neg),
            "none" => Ok(Label::None),
            other => Err(ValidationError::UnknownLabel(other.to_string())),
        }
    }
}

/// Model prediction for a single element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: bool,
    /// Confidence in `[0, 1]`, when the backend reports one.
    pub score: Option<f64>,
}

impl Prediction {
    pub fn new(label: bool, score: Option<f64>) -> Result<Self, ValidationError> {
        if let Some(score) = score {
            if !(0.0..=1.0).contains(&score) {
                return Err(ValidationError::ScoreOutOfRange(score));
            }
        }
        Ok(Self { label, score })
    }

    fn from_raw(raw: &RawPrediction) -> Result<Self, ValidationError> {
        match raw {
            RawPrediction::Flag(flag) => Self::new(flag == "true", None),
            RawPrediction::Scored { label, score } => Self::new(*label, Some(*score)),
        }
    }
}

/// A unit of text within a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: String,
    pub doc_id: String,
    pub begin: u64,
    pub end: u64,
    pub text: String,
    pub user_label: Label,
    pub prediction: Option<Prediction>,
}

impl Element {
    /// Project a backend payload onto `category`.
    pub fn from_payload(payload: ElementPayload, category: &str) -> Result<Self, ValidationError> {
        let user_label =
            Label::from_backend_value(payload.user_labels.get(category).map(String::as_str));
        let prediction = payload
            .model_predictions
            .get(category)
            .map(Prediction::from_raw)
            .transpose()?;

        Ok(Self {
            id: payload.id,
            doc_id: payload.docid,
            begin: payload.begin,
            end: payload.end,
            text: payload.text,
            user_label,
            prediction,
        })
    }
}

/// Parse a list of payloads for `category`, failing on the first invalid one.
pub fn parse_elements(
    payloads: Vec<ElementPayload>,
    category: &str,
) -> Result<Vec<Element>, ValidationError> {
    payloads
        .into_iter()
        .map(|p| Element::from_payload(p, category))
        .collect()
}

/// Entry of the workspace document list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
}

/// A loaded document: its ordered elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub id: String,
    pub elements: Vec<Element>,
}

impl Document {
    pub fn name(&self) -> &str {
        &self.id
    }

    pub fn position_of(&self, element_id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.id == element_id)
    }
}

/// Signed change to a [`LabelCount`] caused by a single label transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelDelta {
    pub pos: i64,
    pub neg: i64,
}

impl LabelDelta {
    pub const ZERO: LabelDelta = LabelDelta { pos: 0, neg: 0 };

    /// Delta for an element moving from `previous` to `new`.
    pub fn between(previous: Label, new: Label) -> Self {
        let weight = |label: Label| match label {
            Label::Pos => (1, 0),
            Label::Neg => (0, 1),
            Label::None => (0, 0),
        };
        let (old_pos, old_neg) = weight(previous);
        let (new_pos, new_neg) = weight(new);
        Self {
            pos: new_pos - old_pos,
            neg: new_neg - old_neg,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Positive/negative label counters, kept per document and per workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub pos: u64,
    pub neg: u64,
}

impl LabelCount {
    /// Count labels over a freshly loaded document.
    pub fn from_elements(elements: &[Element]) -> Self {
        elements.iter().fold(Self::default(), |mut count, e| {
            match e.user_label {
                Label::Pos => count.pos += 1,
                Label::Neg => count.neg += 1,
                Label::None => {}
            }
            count
        })
    }

    pub fn apply(&mut self, delta: LabelDelta) {
        self.pos = self.pos.saturating_add_signed(delta.pos);
        self.neg = self.neg.saturating_add_signed(delta.neg);
    }
}
