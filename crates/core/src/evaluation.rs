//! Evaluation result types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independent axis a report is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Completeness,
    FactualAccuracy,
    Neutrality,
}

impl Aspect {
    /// Evaluation order. Later aspects see earlier ones in the transcript.
    pub const ALL: [Aspect; 3] = [
        Aspect::Completeness,
        Aspect::FactualAccuracy,
        Aspect::Neutrality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::FactualAccuracy => "factual_accuracy",
            Self::Neutrality => "neutrality",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completeness => "Completeness",
            Self::FactualAccuracy => "Factual Accuracy",
            Self::Neutrality => "Neutrality",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectEvaluation {
    pub aspect: Aspect,

    /// Always within 1..=10
    pub score: u8,

    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Excellent,
    Good,
    Satisfactory,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Inadequate,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::NeedsImprovement => "Needs Improvement",
            Self::Inadequate => "Inadequate",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    /// Within 1.0..=10.0; a mean of aspect scores when the model gave none
    pub score: f64,
    pub verdict: Verdict,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub aspects: Vec<AspectEvaluation>,
    pub overall: OverallAssessment,
}

impl Evaluation {
    pub fn aspect(&self, aspect: Aspect) -> Option<&AspectEvaluation> {
        self.aspects.iter().find(|a| a.aspect == aspect)
    }
}
