//! Optical mark recognition for photographed multiple-choice answer sheets.
//!
//! Given a photo taken under uncontrolled conditions, the pipeline locates
//! and rectifies the sheet, detects candidate answer marks, organizes them
//! into a question-by-choice grid, resolves each question's filled bubble by
//! ink coverage, and grades the result against an answer key. The same
//! pipeline run over a hand-marked master sheet produces the key itself.

pub mod answer_sheet;
pub mod debug;
pub mod error;
pub mod geometry;
pub mod grade;
pub mod grid;
pub mod image_utils;
pub mod interpret;
pub mod isolate;
pub mod marks;
pub mod types;

pub use error::OmrError;
pub use interpret::{
    batch_average, generate_key, grade_batch, grade_sheet, GradedSheet, Options, ResolvedSheet,
};
pub use types::{AnswerKey, GradedResult, ImageSource};
