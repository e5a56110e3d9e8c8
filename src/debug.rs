use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use log::warn;

use crate::geometry::center_of_rect;
use crate::grid::QuestionRow;
use crate::image_utils::{CYAN, RAINBOW, WHITE_RGB};
use crate::marks::{Mark, ResolvedChoice};

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_str().unwrap_or(""),
        label
    ));
    result
}

/// Writes intermediate pipeline images next to the input file when
/// debugging is enabled; otherwise every call is a no-op.
pub struct ImageDebugWriter {
    input_path: Option<PathBuf>,
}

impl ImageDebugWriter {
    pub fn new(input_path: PathBuf) -> Self {
        Self {
            input_path: Some(input_path),
        }
    }

    pub fn disabled() -> Self {
        Self { input_path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.input_path.is_some()
    }

    pub fn write_gray(&self, label: &str, image: &GrayImage) {
        if let Some(base) = &self.input_path {
            let path = debug_image_path(base, label);
            if let Err(e) = image.save(&path) {
                warn!("could not write debug image {}: {}", path.display(), e);
            }
        }
    }

    pub fn write_rgb(&self, label: &str, image: &RgbImage) {
        if let Some(base) = &self.input_path {
            let path = debug_image_path(base, label);
            if let Err(e) = image.save(&path) {
                warn!("could not write debug image {}: {}", path.display(), e);
            }
        }
    }

    /// Clones the base image, lets the caller draw on it, and saves it.
    pub fn write_with(&self, label: &str, base_image: &RgbImage, draw: impl FnOnce(&mut RgbImage)) {
        if let Some(base) = &self.input_path {
            let mut canvas = base_image.clone();
            draw(&mut canvas);
            let path = debug_image_path(base, label);
            if let Err(e) = canvas.save(&path) {
                warn!("could not write debug image {}: {}", path.display(), e);
            }
        }
    }
}

/// Outlines every candidate mark, cycling colors so neighbours stay
/// distinguishable.
pub fn draw_candidate_marks_mut(canvas: &mut RgbImage, marks: &[Mark]) {
    for (i, mark) in marks.iter().enumerate() {
        draw_hollow_rect_mut(canvas, mark.bounds, RAINBOW[i % RAINBOW.len()]);
    }
}

/// Colors each question row, wrapping the rainbow per row index.
pub fn draw_question_rows_mut(canvas: &mut RgbImage, rows: &[QuestionRow]) {
    for row in rows {
        let color = RAINBOW[(row.question as usize - 1) % RAINBOW.len()];
        for mark in &row.marks {
            draw_hollow_rect_mut(canvas, mark.bounds, color);
        }
    }
}

/// Marks each resolved selection with a cross; unanswered questions get no
/// cross, which makes them easy to spot in a grid of answered ones.
pub fn draw_resolved_choices_mut(canvas: &mut RgbImage, resolved: &[ResolvedChoice]) {
    for choice in resolved {
        if let Some(selection) = &choice.selection {
            let center = center_of_rect(&selection.mark.bounds);
            draw_hollow_rect_mut(canvas, selection.mark.bounds, CYAN);
            draw_cross_mut(
                canvas,
                WHITE_RGB,
                center.x.round() as i32,
                center.y.round() as i32,
            );
        }
    }
}
