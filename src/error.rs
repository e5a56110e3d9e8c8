use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the grading pipeline.
///
/// The two detection variants carry the remediation text that is surfaced
/// verbatim to whoever submitted the photo; everything else is a caller or
/// input error and fails immediately.
#[derive(Debug, Error)]
pub enum OmrError {
    #[error(
        "could not isolate an answer sheet in the photo: {reason}. Retake the \
         picture with the sheet filling most of the frame, against a consistent \
         background and with even lighting"
    )]
    DocumentExtractionFailed { reason: String },

    #[error(
        "answer marks could not be resolved: {reason}. This usually means the \
         lighting or background is uneven, or the submission does not use the \
         declared question/choice template"
    )]
    MarkIdentificationFailed { reason: String },

    #[error("no sheet template supports {questions} questions with {choices} choices")]
    UnsupportedTemplate { questions: u32, choices: u32 },

    #[error("failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to decode or encode image data: {0}")]
    ImageCodec(#[from] image::ImageError),

    #[error("answer key has no entry for question {question}")]
    IncompleteKey { question: u32 },

    #[error("key label {label:?} for question {question} is outside A..={max}")]
    InvalidKeyLabel { question: u32, label: char, max: char },

    #[error(
        "master sheet leaves question {question} unanswered; fill exactly one \
         bubble per question and rescan it"
    )]
    KeyIncomplete { question: u32 },

    #[error("failed to load score font {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },
}

impl OmrError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::DocumentExtractionFailed {
            reason: reason.into(),
        }
    }

    pub fn identification(reason: impl Into<String>) -> Self {
        Self::MarkIdentificationFailed {
            reason: reason.into(),
        }
    }
}
