use crate::error::OmrError;

/// Question capacities the sheet generator can lay out. A declared question
/// count is served by the smallest capacity that fits it.
pub const TEMPLATE_CAPACITIES: [u32; 9] = [10, 20, 30, 40, 50, 75, 100, 150, 200];

pub const MIN_CHOICES: u32 = 2;
pub const MAX_CHOICES: u32 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

/// Geometric filter applied to candidate contours. Printed bubbles and
/// hand-drawn scantron rectangles are the same detector under different
/// bounds, not different detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkFilter {
    Circular {
        min_diameter: u32,
        min_circularity: f64,
    },
    Rectangular {
        min_area: f64,
        max_area: f64,
        min_aspect: f32,
        max_aspect: f32,
    },
}

/// Fractions of page width/height bounding the answer block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFraction {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Layout contract shared with the sheet generator: both sides must agree
/// on these constants or detection drifts from what was printed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetTemplate {
    pub capacity: u32,
    /// Question columns x rows as printed; columns * rows == capacity.
    pub grid: Size<u32>,
    /// Accepted height/width band for a rectified sheet.
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub answer_region: Option<RegionFraction>,
    pub mark_filter: MarkFilter,
}

/// Bounds for the printed circular bubbles on generated sheets.
pub const BUBBLE_FILTER: MarkFilter = MarkFilter::Circular {
    min_diameter: 20,
    min_circularity: 0.83,
};

/// Bounds for hand-shaded rectangles on 882E-style column forms.
pub const SHADED_RECT_FILTER: MarkFilter = MarkFilter::Rectangular {
    min_area: 650.0,
    max_area: 5000.0,
    min_aspect: 1.1,
    max_aspect: 7.0,
};

// Letter paper, portrait: 11 / 8.5 with slack for imperfect corners.
const LETTER_MIN_ASPECT: f32 = 1.1;
const LETTER_MAX_ASPECT: f32 = 1.5;

/// Looks up the template serving the declared question and choice counts.
pub fn sheet_template(num_questions: u32, num_choices: u32) -> Result<SheetTemplate, OmrError> {
    if num_questions == 0 || !(MIN_CHOICES..=MAX_CHOICES).contains(&num_choices) {
        return Err(OmrError::UnsupportedTemplate {
            questions: num_questions,
            choices: num_choices,
        });
    }
    let capacity = TEMPLATE_CAPACITIES
        .iter()
        .copied()
        .find(|&capacity| num_questions <= capacity)
        .ok_or(OmrError::UnsupportedTemplate {
            questions: num_questions,
            choices: num_choices,
        })?;

    Ok(SheetTemplate {
        capacity,
        grid: grid_for_capacity(capacity),
        min_aspect: LETTER_MIN_ASPECT,
        max_aspect: LETTER_MAX_ASPECT,
        answer_region: None,
        mark_filter: BUBBLE_FILTER,
    })
}

fn grid_for_capacity(capacity: u32) -> Size<u32> {
    let (width, height) = match capacity {
        10 => (1, 10),
        20 => (1, 20),
        30 => (1, 30),
        40 => (2, 20),
        50 => (2, 25),
        75 => (3, 25),
        100 => (4, 25),
        150 => (5, 30),
        _ => (5, 40),
    };
    Size { width, height }
}

impl SheetTemplate {
    /// Total marks the printed sheet carries.
    pub fn expected_marks(&self, num_choices: u32) -> usize {
        (self.capacity * num_choices) as usize
    }

    pub fn aspect_accepts(&self, width: u32, height: u32) -> bool {
        if width == 0 {
            return false;
        }
        let aspect = height as f32 / width as f32;
        aspect >= self.min_aspect && aspect <= self.max_aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smallest_fitting_capacity_is_chosen() {
        assert_eq!(sheet_template(38, 6).unwrap().capacity, 40);
        assert_eq!(sheet_template(40, 6).unwrap().capacity, 40);
        assert_eq!(sheet_template(41, 6).unwrap().capacity, 50);
        assert_eq!(sheet_template(200, 2).unwrap().capacity, 200);
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        assert!(matches!(
            sheet_template(0, 4),
            Err(OmrError::UnsupportedTemplate { .. })
        ));
        assert!(matches!(
            sheet_template(201, 4),
            Err(OmrError::UnsupportedTemplate { .. })
        ));
        assert!(matches!(
            sheet_template(10, 1),
            Err(OmrError::UnsupportedTemplate { .. })
        ));
        assert!(matches!(
            sheet_template(10, 8),
            Err(OmrError::UnsupportedTemplate { .. })
        ));
    }

    #[test]
    fn grids_multiply_out_to_capacity() {
        for capacity in TEMPLATE_CAPACITIES {
            let grid = grid_for_capacity(capacity);
            assert_eq!(grid.width * grid.height, capacity);
        }
    }

    #[test]
    fn letter_portrait_fits_the_aspect_band() {
        let template = sheet_template(10, 4).unwrap();
        assert!(template.aspect_accepts(850, 1100));
        assert!(!template.aspect_accepts(1100, 850));
        assert!(!template.aspect_accepts(850, 4400));
    }
}
