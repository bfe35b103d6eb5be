//! Question schema, structural validation, and the generated-set payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Number of options a multiple-choice question must carry.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;

/// Assessment item kinds produced by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Four labeled options with exactly one correct label.
    #[serde(alias = "mcq")]
    MultipleChoice,
    /// Free-text answer completing a blanked statement.
    FillInBlank,
    /// Statement judged "True" or "False".
    TrueFalse,
}

/// Difficulty tag assigned by the model to each question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Recall-level question.
    Easy,
    /// Comprehension-level question.
    Medium,
    /// Analysis-level question.
    Hard,
}

/// One labeled answer option for a multiple-choice question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Option label referenced by `correct_answer` (typically "A".."D").
    pub label: String,
    /// Option body text.
    pub text: String,
}

/// A generated, schema-validated assessment item prior to review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionDraft {
    /// Question kind; drives which structural constraints apply.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Question body shown to the test taker.
    #[serde(alias = "question")]
    pub prompt_text: String,
    /// Labeled options; present only for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,
    /// Correct answer: an option label, "True"/"False", or free text by type.
    pub correct_answer: String,
    /// Explanation of why the answer is correct.
    pub explanation: String,
    /// Difficulty tag.
    pub difficulty: Difficulty,
    /// Topic or subject covered by the question.
    pub topic: String,
    /// Identifier of the job whose source text produced this draft.
    #[serde(default)]
    pub source_job_id: String,
    /// Creation timestamp, stamped at normalization time when the model omits it.
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
}

/// Structural constraint violations detected during validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionSchemaError {
    /// Question body was empty after trimming.
    #[error("question text is empty")]
    EmptyPrompt,
    /// Multiple-choice question did not carry exactly four options.
    #[error("multiple_choice requires exactly {MULTIPLE_CHOICE_OPTIONS} options, found {0}")]
    WrongOptionCount(usize),
    /// Two options shared the same label.
    #[error("duplicate option label '{0}'")]
    DuplicateOptionLabel(String),
    /// `correct_answer` did not match any option label.
    #[error("correct answer '{0}' does not match any option label")]
    AnswerNotAnOption(String),
    /// True/false answer was something other than "True" or "False".
    #[error("true_false answer must be \"True\" or \"False\", found '{0}'")]
    InvalidTrueFalseAnswer(String),
    /// Answer text was empty after trimming.
    #[error("correct answer is empty")]
    EmptyAnswer,
}

impl QuestionDraft {
    /// Check the draft against its type's structural constraints.
    pub fn validate(&self) -> Result<(), QuestionSchemaError> {
        if self.prompt_text.trim().is_empty() {
            return Err(QuestionSchemaError::EmptyPrompt);
        }

        match self.question_type {
            QuestionType::MultipleChoice => {
                let options = self.options.as_deref().unwrap_or(&[]);
                if options.len() != MULTIPLE_CHOICE_OPTIONS {
                    return Err(QuestionSchemaError::WrongOptionCount(options.len()));
                }
                let mut seen = std::collections::BTreeSet::new();
                for option in options {
                    if !seen.insert(option.label.as_str()) {
                        return Err(QuestionSchemaError::DuplicateOptionLabel(
                            option.label.clone(),
                        ));
                    }
                }
                if !options
                    .iter()
                    .any(|option| option.label == self.correct_answer)
                {
                    return Err(QuestionSchemaError::AnswerNotAnOption(
                        self.correct_answer.clone(),
                    ));
                }
            }
            QuestionType::TrueFalse => {
                let normalized = self.correct_answer.trim().to_lowercase();
                if normalized != "true" && normalized != "false" {
                    return Err(QuestionSchemaError::InvalidTrueFalseAnswer(
                        self.correct_answer.clone(),
                    ));
                }
            }
            QuestionType::FillInBlank => {
                if self.correct_answer.trim().is_empty() {
                    return Err(QuestionSchemaError::EmptyAnswer);
                }
            }
        }

        Ok(())
    }

    /// Canonicalize lenient-but-valid values, currently the true/false answer casing.
    pub fn canonicalize(&mut self) {
        if self.question_type == QuestionType::TrueFalse {
            let normalized = self.correct_answer.trim().to_lowercase();
            if normalized == "true" {
                self.correct_answer = "True".to_string();
            } else if normalized == "false" {
                self.correct_answer = "False".to_string();
            }
        }
    }
}

/// Ordered question set produced by one job, persisted once at completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedSet {
    /// Identifier of the producing job; carried by the storage key, not the payload.
    #[serde(skip)]
    pub job_id: String,
    /// Validated drafts in chunk order.
    pub questions: Vec<QuestionDraft>,
}
