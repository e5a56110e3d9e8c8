use image::{Rgb, RgbImage};
use imageproc::contours::{find_contours_with_threshold, BorderType, Contour};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use log::debug;
use logging_timer::time;

use crate::answer_sheet::SheetTemplate;
use crate::debug::ImageDebugWriter;
use crate::error::OmrError;
use crate::geometry::{point_to_f32, polygon_area, Corners};
use crate::image_utils::{binarize_inverted, prepare};

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
// Matches a 5x5 kernel dilated twice.
const EDGE_DILATION_RADIUS: u8 = 4;
// Corners are traced on the outside of the dilated edge mask; pull them
// back in so the crop carries no background fringe.
const BOUNDARY_INSET: f32 = EDGE_DILATION_RADIUS as f32 + 2.0;

// Polygon simplification is swept across a small tolerance range instead of
// trusting one fixed epsilon; lighting and background variation move the
// point where a boundary collapses to four vertices.
const APPROX_EPSILON_START: f64 = 0.006;
const APPROX_EPSILON_STEP: f64 = 0.001;
const APPROX_EPSILON_STEPS: u32 = 7;

const CANDIDATE_CONTOURS: usize = 3;

/// How the photo is reduced to boundary edges before contour tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeStrategy {
    /// Inverted Otsu threshold first, then edges. Best on busy backgrounds.
    ThresholdedEdges,
    /// Edges straight from the blurred grayscale. Best on low-contrast shots.
    PlainEdges,
}

/// Locates the sheet boundary in an arbitrary photo and returns an upright,
/// cropped, perspective-corrected image of just the sheet.
#[time]
pub fn isolate_sheet(
    image: &RgbImage,
    template: &SheetTemplate,
    debug: &ImageDebugWriter,
) -> Result<RgbImage, OmrError> {
    for strategy in [EdgeStrategy::ThresholdedEdges, EdgeStrategy::PlainEdges] {
        let edges = boundary_edges(image, strategy);
        let label = match strategy {
            EdgeStrategy::ThresholdedEdges => "edges_thresholded",
            EdgeStrategy::PlainEdges => "edges_plain",
        };
        debug.write_gray(label, &edges);

        if let Some(rectified) = rectify_largest_quad(image, &edges, template) {
            debug.write_rgb("rectified", &rectified);
            return Ok(rectified);
        }
        debug!("{:?} produced no sheet-shaped boundary", strategy);
    }

    Err(OmrError::extraction(
        "no boundary with a plausible sheet shape was found",
    ))
}

fn boundary_edges(image: &RgbImage, strategy: EdgeStrategy) -> image::GrayImage {
    let blurred = prepare(image);
    let edges = match strategy {
        EdgeStrategy::ThresholdedEdges => canny(&binarize_inverted(&blurred), CANNY_LOW, CANNY_HIGH),
        EdgeStrategy::PlainEdges => canny(&blurred, CANNY_LOW, CANNY_HIGH),
    };
    dilate(&edges, Norm::LInf, EDGE_DILATION_RADIUS)
}

/// Tries the largest external contours, sweeping the simplification
/// tolerance until one reduces to a four or five vertex boundary that
/// rectifies into the template's aspect band.
fn rectify_largest_quad(
    image: &RgbImage,
    edges: &image::GrayImage,
    template: &SheetTemplate,
) -> Option<RgbImage> {
    let contours: Vec<Contour<i32>> = find_contours_with_threshold(edges, 0);
    let mut candidates: Vec<Vec<Point<i32>>> = contours
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| contour.points)
        .collect();
    candidates.sort_by(|a, b| polygon_area(b).total_cmp(&polygon_area(a)));
    candidates.truncate(CANDIDATE_CONTOURS);

    for points in &candidates {
        let perimeter = arc_length(points, true);
        if perimeter <= 0.0 {
            continue;
        }
        for step in 0..APPROX_EPSILON_STEPS {
            let epsilon = APPROX_EPSILON_START + f64::from(step) * APPROX_EPSILON_STEP;
            let approx = approximate_polygon_dp(points, epsilon * perimeter, true);
            let corners = match approx.len() {
                4 => {
                    let vertices: Vec<Point<f32>> = approx.iter().map(point_to_f32).collect();
                    Corners::order(&[vertices[0], vertices[1], vertices[2], vertices[3]])
                }
                5 => {
                    let vertices: Vec<Point<f32>> = approx.iter().map(point_to_f32).collect();
                    Corners::from_five(&[
                        vertices[0],
                        vertices[1],
                        vertices[2],
                        vertices[3],
                        vertices[4],
                    ])
                }
                _ => continue,
            };
            debug!(
                "boundary candidate simplified to {} vertices at epsilon {:.4}",
                approx.len(),
                epsilon
            );
            if let Some(rectified) = rectify(image, &corners, template) {
                return Some(rectified);
            }
        }
    }
    None
}

/// Maps the quad onto an axis-aligned rectangle sized from the longer of
/// each pair of opposing edges. The result only counts if it lands in the
/// template's aspect band; anything else is a misdetected boundary.
fn rectify(image: &RgbImage, corners: &Corners, template: &SheetTemplate) -> Option<RgbImage> {
    let corners = &inset_toward_center(corners, BOUNDARY_INSET);
    let (width, height) = corners.rectified_size();
    if !template.aspect_accepts(width, height) {
        debug!("rejecting {}x{} rectification candidate", width, height);
        return None;
    }

    // A degenerate quad (three corners in a line) has no projective mapping.
    let projection = Projection::from_control_points(
        [
            (corners.top_left.x, corners.top_left.y),
            (corners.top_right.x, corners.top_right.y),
            (corners.bottom_right.x, corners.bottom_right.y),
            (corners.bottom_left.x, corners.bottom_left.y),
        ],
        [
            (0.0, 0.0),
            ((width - 1) as f32, 0.0),
            ((width - 1) as f32, (height - 1) as f32),
            (0.0, (height - 1) as f32),
        ],
    )?;

    let mut rectified = RgbImage::new(width, height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
        &mut rectified,
    );
    Some(rectified)
}

fn inset_toward_center(corners: &Corners, amount: f32) -> Corners {
    let cx = (corners.top_left.x + corners.top_right.x + corners.bottom_right.x
        + corners.bottom_left.x)
        / 4.0;
    let cy = (corners.top_left.y + corners.top_right.y + corners.bottom_right.y
        + corners.bottom_left.y)
        / 4.0;
    let pull = |p: &Point<f32>| {
        let dx = cx - p.x;
        let dy = cy - p.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= amount {
            return Point::new(cx, cy);
        }
        Point::new(p.x + dx / len * amount, p.y + dy / len * amount)
    };
    Corners {
        top_left: pull(&corners.top_left),
        top_right: pull(&corners.top_right),
        bottom_right: pull(&corners.bottom_right),
        bottom_left: pull(&corners.bottom_left),
    }
}
