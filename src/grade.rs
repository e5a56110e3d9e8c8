use std::collections::BTreeMap;
use std::path::Path;

use image::RgbImage;
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::debug;
use logging_timer::time;
use rusttype::{Font, Scale};

use crate::error::OmrError;
use crate::image_utils::{GREEN, RED, YELLOW};
use crate::marks::{Mark, ResolvedChoice};
use crate::types::{AnswerKey, GradedResult};

/// Compares resolved choices against the key.
///
/// The numeric result is computed here, before and independent of any
/// annotation. Unanswered questions count against the score but stay
/// visible as `None` in the choice map.
#[time]
pub fn grade_choices(
    resolved: &[ResolvedChoice],
    key: &AnswerKey,
    num_questions: u32,
) -> Result<GradedResult, OmrError> {
    let mut graded = BTreeMap::new();
    let mut choices = BTreeMap::new();
    let mut correct = 0u32;

    for choice in resolved {
        let expected = key
            .choice(choice.question)
            .ok_or(OmrError::IncompleteKey {
                question: choice.question,
            })?;
        let selected = choice.selection.as_ref().map(|s| s.label);
        let is_correct = selected == Some(expected);
        if is_correct {
            correct += 1;
        }
        graded.insert(choice.question, is_correct);
        choices.insert(choice.question, selected);
    }

    let score = round2(100.0 * f64::from(correct) / f64::from(num_questions));
    debug!("{} of {} correct, score {}", correct, num_questions, score);
    Ok(GradedResult {
        score,
        graded,
        choices,
    })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Loads a TTF font for the score overlay.
pub fn load_score_font(path: &Path) -> Result<Font<'static>, OmrError> {
    let bytes = std::fs::read(path).map_err(|e| OmrError::FontLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Font::try_from_vec(bytes).ok_or_else(|| OmrError::FontLoad {
        path: path.to_path_buf(),
        reason: "not a usable TTF font".into(),
    })
}

/// Draws the graded outcome onto a private copy of the rectified sheet:
/// green outlines around correct selections, red around incorrect ones,
/// and the score in the top-right corner when a font is available.
pub fn annotate_sheet(
    sheet: &RgbImage,
    resolved: &[ResolvedChoice],
    result: &GradedResult,
    font: Option<&Font>,
) -> RgbImage {
    let mut canvas = sheet.clone();

    for choice in resolved {
        let Some(selection) = &choice.selection else {
            continue;
        };
        let correct = result
            .graded
            .get(&choice.question)
            .copied()
            .unwrap_or(false);
        let color = if correct { GREEN } else { RED };
        draw_mark_outline_mut(&mut canvas, &selection.mark, color);
    }

    if let Some(font) = font {
        draw_score_mut(&mut canvas, result.score, font);
    }
    canvas
}

fn draw_mark_outline_mut(canvas: &mut RgbImage, mark: &Mark, color: image::Rgb<u8>) {
    for pair in mark.points.windows(2) {
        draw_line_segment_mut(
            canvas,
            (pair[0].x as f32, pair[0].y as f32),
            (pair[1].x as f32, pair[1].y as f32),
            color,
        );
    }
    if let (Some(first), Some(last)) = (mark.points.first(), mark.points.last()) {
        draw_line_segment_mut(
            canvas,
            (last.x as f32, last.y as f32),
            (first.x as f32, first.y as f32),
            color,
        );
    }
    // a surrounding box reads better than the contour alone at phone resolutions
    let bounds = mark.bounds;
    draw_hollow_rect_mut(canvas, bounds, color);
    draw_hollow_rect_mut(
        canvas,
        Rect::at(bounds.left() - 1, bounds.top() - 1)
            .of_size(bounds.width() + 2, bounds.height() + 2),
        color,
    );
}

fn draw_score_mut(canvas: &mut RgbImage, score: f64, font: &Font) {
    let text = format!("{score:.2}%");
    let scale = Scale::uniform((canvas.height() as f32 / 18.0).max(16.0));
    let color = if score < 70.0 {
        RED
    } else if score < 85.0 {
        YELLOW
    } else {
        GREEN
    };
    let (text_width, _) = text_size(scale, font, &text);
    let x = (canvas.width() as i32 - text_width - 10).max(0);
    draw_text_mut(canvas, color, x, 10, scale, font, &text);
}
