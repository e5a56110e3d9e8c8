use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours_with_threshold, BorderType, Contour};
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::debug;
use logging_timer::time;

use crate::answer_sheet::{MarkFilter, SheetTemplate};
use crate::debug::ImageDebugWriter;
use crate::geometry::{contour_bounding_rect, enclosing_circle, polygon_area};
use crate::grid::QuestionRow;
use crate::image_utils::{binarize_inverted, crop_fraction, prepare, WHITE};

/// A candidate answer mark: the traced contour plus the scalar features the
/// geometric filters run on.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub points: Vec<Point<i32>>,
    pub bounds: Rect,
    pub area: f64,
    pub aspect_ratio: f32,
    pub circularity: f64,
}

impl Mark {
    pub fn from_contour(mut points: Vec<Point<i32>>) -> Option<Self> {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return None;
        }
        let bounds = contour_bounding_rect(&points);
        let area = polygon_area(&points);
        let circle = enclosing_circle(&points);
        let circle_area = std::f64::consts::PI * (circle.radius as f64).powi(2);
        let circularity = if circle_area > 0.0 {
            area / circle_area
        } else {
            0.0
        };
        Some(Self {
            points,
            bounds,
            area,
            aspect_ratio: bounds.width() as f32 / bounds.height() as f32,
            circularity,
        })
    }
}

/// Whether a mark's geometry fits the template's filter.
///
/// Circular marks must additionally keep enough vertices under a coarse
/// polygon approximation; rectangles collapse to four and drop out.
pub fn mark_matches_filter(mark: &Mark, filter: &MarkFilter) -> bool {
    match *filter {
        MarkFilter::Circular {
            min_diameter,
            min_circularity,
        } => {
            if mark.bounds.width() < min_diameter || mark.bounds.height() < min_diameter {
                return false;
            }
            let perimeter = arc_length(&mark.points, true);
            let approx = approximate_polygon_dp(&mark.points, 0.01 * perimeter, true);
            approx.len() >= 8 && mark.circularity > min_circularity
        }
        MarkFilter::Rectangular {
            min_area,
            max_area,
            min_aspect,
            max_aspect,
        } => {
            mark.area > min_area
                && mark.area < max_area
                && mark.aspect_ratio > min_aspect
                && mark.aspect_ratio < max_aspect
        }
    }
}

/// Finds candidate answer marks on a rectified sheet.
///
/// Returns the surviving marks sorted top-to-bottom together with the
/// inverted binary image, which choice resolution reuses for ink coverage.
#[time]
pub fn find_answer_marks(
    sheet: &RgbImage,
    template: &SheetTemplate,
    debug: &ImageDebugWriter,
) -> (Vec<Mark>, GrayImage) {
    let blurred = prepare(sheet);
    let thresh = binarize_inverted(&blurred);
    debug.write_gray("thresholded", &thresh);

    let (search, offset_x, offset_y) = match &template.answer_region {
        Some(region) => crop_fraction(&thresh, region),
        None => (thresh.clone(), 0, 0),
    };

    let contours: Vec<Contour<i32>> = find_contours_with_threshold(&search, 0);
    let mut marks: Vec<Mark> = contours
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let points = contour
                .points
                .into_iter()
                .map(|p| Point::new(p.x + offset_x, p.y + offset_y))
                .collect();
            Mark::from_contour(points)
        })
        .filter(|mark| mark_matches_filter(mark, &template.mark_filter))
        .collect();

    marks.sort_by_key(|mark| (mark.bounds.top(), mark.bounds.left()));
    debug!("kept {} candidate answer marks", marks.len());
    debug.write_with("candidate_marks", sheet, |canvas| {
        crate::debug::draw_candidate_marks_mut(canvas, &marks);
    });

    (marks, thresh)
}

/// One selected bubble with its winning ink count.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedMark {
    pub label: char,
    pub ink: u32,
    pub mark: Mark,
}

/// The resolved state of one question. `selection` is `None` when nothing
/// on the row was confidently filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChoice {
    pub question: u32,
    pub selection: Option<SelectedMark>,
}

/// Picks the filled bubble of one question row by ink coverage.
///
/// The row's marks are already left-to-right, so ordinal position maps to
/// the choice letter. The winner must cover at least `blank_fill_ratio` of
/// its own contour area; below that the question is unanswered. An exact
/// coverage tie is treated as unanswered rather than credited to the
/// leftmost bubble.
pub fn resolve_question(
    row: &QuestionRow,
    thresh: &GrayImage,
    blank_fill_ratio: f64,
) -> ResolvedChoice {
    let coverage: Vec<u32> = row
        .marks
        .iter()
        .map(|mark| ink_coverage(mark, thresh))
        .collect();

    let Some((winner, &ink)) = coverage
        .iter()
        .enumerate()
        .max_by_key(|(index, &ink)| (ink, std::cmp::Reverse(*index)))
    else {
        return ResolvedChoice {
            question: row.question,
            selection: None,
        };
    };

    let floor = (blank_fill_ratio * row.marks[winner].area).round() as u32;
    if ink == 0 || ink < floor {
        debug!(
            "question {}: best coverage {} is below the blank floor {}",
            row.question, ink, floor
        );
        return ResolvedChoice {
            question: row.question,
            selection: None,
        };
    }

    if coverage.iter().filter(|&&c| c == ink).count() > 1 {
        debug!(
            "question {}: multiple bubbles share coverage {}, leaving it unanswered",
            row.question, ink
        );
        return ResolvedChoice {
            question: row.question,
            selection: None,
        };
    }

    ResolvedChoice {
        question: row.question,
        selection: Some(SelectedMark {
            label: (b'A' + winner as u8) as char,
            ink,
            mark: row.marks[winner].clone(),
        }),
    }
}

/// Counts foreground pixels of the binary image inside the mark's contour.
fn ink_coverage(mark: &Mark, thresh: &GrayImage) -> u32 {
    if mark.points.len() < 3 {
        return 0;
    }
    let left = mark.bounds.left();
    let top = mark.bounds.top();
    let mut mask = GrayImage::new(mark.bounds.width(), mark.bounds.height());
    let local: Vec<Point<i32>> = mark
        .points
        .iter()
        .map(|p| Point::new(p.x - left, p.y - top))
        .collect();
    draw_polygon_mut(&mut mask, &local, WHITE);

    let mut ink = 0;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let sx = left + x as i32;
        let sy = top + y as i32;
        if sx >= 0
            && sy >= 0
            && (sx as u32) < thresh.width()
            && (sy as u32) < thresh.height()
            && thresh.get_pixel(sx as u32, sy as u32).0[0] > 0
        {
            ink += 1;
        }
    }
    ink
}
