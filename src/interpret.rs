use std::path::PathBuf;

use image::RgbImage;
use logging_timer::time;
use rayon::prelude::*;
use rusttype::Font;

use crate::answer_sheet::{sheet_template, MarkFilter};
use crate::debug::ImageDebugWriter;
use crate::error::OmrError;
use crate::grade::{annotate_sheet, grade_choices, load_score_font, round2};
use crate::grid::organize;
use crate::image_utils::decode_source;
use crate::isolate::isolate_sheet;
use crate::marks::{find_answer_marks, resolve_question, ResolvedChoice};
use crate::types::{AnswerKey, GradedResult, ImageSource};

/// Everything one grading invocation is parameterized by. No state is
/// carried between invocations; a fresh `Options` is cheap to clone per
/// submission.
#[derive(Debug, Clone)]
pub struct Options {
    pub num_questions: u32,
    pub num_choices: u32,
    /// Skip boundary isolation for born-digital sheets that are already
    /// flat, upright scans.
    pub prerectified: bool,
    /// Vertical pixel band for clustering marks into rows.
    pub row_tolerance: i32,
    /// A winning bubble must cover at least this fraction of its own
    /// contour area, or the question counts as unanswered.
    pub blank_fill_ratio: f64,
    /// Overrides the template's geometric mark filter, e.g. for sheets
    /// answered with hand-shaded rectangles.
    pub mark_filter: Option<MarkFilter>,
    /// TTF font for the score overlay; without one the annotated sheet
    /// carries outlines only.
    pub font_path: Option<PathBuf>,
    /// Write per-stage debug images next to the input file.
    pub debug: bool,
}

impl Options {
    pub fn new(num_questions: u32, num_choices: u32) -> Self {
        Self {
            num_questions,
            num_choices,
            prerectified: false,
            row_tolerance: 25,
            blank_fill_ratio: 0.35,
            mark_filter: None,
            font_path: None,
            debug: false,
        }
    }
}

/// A submission taken through isolation, detection and choice resolution,
/// but not yet graded. Key generation stops here; grading carries on.
pub struct ResolvedSheet {
    pub sheet: RgbImage,
    pub choices: Vec<ResolvedChoice>,
}

/// Runs the shared detection pipeline over one image. This is the single
/// path both grading and key generation go through.
#[time]
pub fn resolve_sheet(source: &ImageSource, options: &Options) -> Result<ResolvedSheet, OmrError> {
    let debug = debug_writer_for(source, options);
    let mut template = sheet_template(options.num_questions, options.num_choices)?;
    if let Some(filter) = options.mark_filter {
        template.mark_filter = filter;
    }

    let image = decode_source(source)?;
    let sheet = if options.prerectified {
        image
    } else {
        isolate_sheet(&image, &template, &debug)?
    };

    let (marks, thresh) = find_answer_marks(&sheet, &template, &debug);
    let rows = organize(
        marks,
        options.num_questions,
        options.num_choices,
        &template,
        options.row_tolerance,
    )?;
    debug.write_with("question_rows", &sheet, |canvas| {
        crate::debug::draw_question_rows_mut(canvas, &rows);
    });

    let choices: Vec<ResolvedChoice> = rows
        .iter()
        .map(|row| resolve_question(row, &thresh, options.blank_fill_ratio))
        .collect();
    debug.write_with("resolved_choices", &sheet, |canvas| {
        crate::debug::draw_resolved_choices_mut(canvas, &choices);
    });

    Ok(ResolvedSheet { sheet, choices })
}

/// A graded submission: the numeric outcome plus the annotated copy of the
/// rectified sheet.
pub struct GradedSheet {
    pub result: GradedResult,
    pub annotated: RgbImage,
}

/// Grades one submission against a key.
#[time]
pub fn grade_sheet(
    source: &ImageSource,
    key: &AnswerKey,
    options: &Options,
) -> Result<GradedSheet, OmrError> {
    let font = options
        .font_path
        .as_deref()
        .map(load_score_font)
        .transpose()?;
    grade_resolved(source, key, options, font.as_ref())
}

fn grade_resolved(
    source: &ImageSource,
    key: &AnswerKey,
    options: &Options,
    font: Option<&Font>,
) -> Result<GradedSheet, OmrError> {
    let resolved = resolve_sheet(source, options)?;
    let result = grade_choices(&resolved.choices, key, options.num_questions)?;
    let annotated = annotate_sheet(&resolved.sheet, &resolved.choices, &result, font);
    debug_writer_for(source, options).write_rgb("graded", &annotated);
    Ok(GradedSheet { result, annotated })
}

/// Resolves a hand-marked master sheet into the answer key for a test. The
/// master must answer every question; a blank or ambiguous row cannot
/// produce a trustworthy key.
#[time]
pub fn generate_key(source: &ImageSource, options: &Options) -> Result<AnswerKey, OmrError> {
    let resolved = resolve_sheet(source, options)?;
    resolved
        .choices
        .iter()
        .map(|choice| match &choice.selection {
            Some(selection) => Ok((choice.question, selection.label)),
            None => Err(OmrError::KeyIncomplete {
                question: choice.question,
            }),
        })
        .collect()
}

/// Grades a batch of submissions for one test in parallel. Each sheet is
/// an independent computation over its own buffers; the key is the only
/// shared input and is read-only.
#[time]
pub fn grade_batch(
    paths: &[PathBuf],
    key: &AnswerKey,
    options: &Options,
) -> Vec<(PathBuf, Result<GradedSheet, OmrError>)> {
    paths
        .par_iter()
        .map(|path| {
            let source = ImageSource::Path(path.clone());
            (path.clone(), grade_sheet(&source, key, options))
        })
        .collect()
}

/// Class average over the successfully graded sheets of a batch.
pub fn batch_average(results: &[(PathBuf, Result<GradedSheet, OmrError>)]) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter_map(|(_, outcome)| outcome.as_ref().ok().map(|graded| graded.result.score))
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
}

fn debug_writer_for(source: &ImageSource, options: &Options) -> ImageDebugWriter {
    match (options.debug, source) {
        (true, ImageSource::Path(path)) => ImageDebugWriter::new(path.clone()),
        _ => ImageDebugWriter::disabled(),
    }
}
