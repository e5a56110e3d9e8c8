use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OmrError;

/// Where the pixels of a submission come from. Resolved into an in-memory
/// image exactly once, at the pipeline boundary.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// The canonical correct-choice mapping for a test, keyed by 1-based
/// question number. Shared read-only across every submission graded
/// against the same test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(BTreeMap<u32, char>);

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question: u32, label: char) {
        self.0.insert(question, label);
    }

    pub fn choice(&self, question: u32) -> Option<char> {
        self.0.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, char)> + '_ {
        self.0.iter().map(|(&question, &label)| (question, label))
    }

    /// Checks that the key covers every question and stays within the
    /// labels the declared choice count allows.
    pub fn validate(&self, num_questions: u32, num_choices: u32) -> Result<(), OmrError> {
        let max = (b'A' + num_choices as u8 - 1) as char;
        for question in 1..=num_questions {
            match self.choice(question) {
                None => return Err(OmrError::IncompleteKey { question }),
                Some(label) if !('A'..=max).contains(&label) => {
                    return Err(OmrError::InvalidKeyLabel {
                        question,
                        label,
                        max,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<(u32, char)> for AnswerKey {
    fn from_iter<I: IntoIterator<Item = (u32, char)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The outcome of grading one submission. `choices` records `None` for
/// questions where no bubble was confidently filled; those still count
/// against the score but are reported as unanswered, not guessed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedResult {
    pub score: f64,
    pub graded: BTreeMap<u32, bool>,
    pub choices: BTreeMap<u32, Option<char>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_json() {
        let key: AnswerKey = [(1, 'A'), (2, 'B'), (3, 'E')].into_iter().collect();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"1":"A","2":"B","3":"E"}"#);
        let back: AnswerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn validate_rejects_missing_questions() {
        let key: AnswerKey = [(1, 'A'), (3, 'B')].into_iter().collect();
        assert!(matches!(
            key.validate(3, 4),
            Err(OmrError::IncompleteKey { question: 2 })
        ));
    }

    #[test]
    fn validate_rejects_labels_beyond_choice_count() {
        let key: AnswerKey = [(1, 'E')].into_iter().collect();
        assert!(matches!(
            key.validate(1, 4),
            Err(OmrError::InvalidKeyLabel {
                question: 1,
                label: 'E',
                max: 'D'
            })
        ));
        assert!(key.validate(1, 5).is_ok());
    }
}
