use log::debug;
use logging_timer::time;

use crate::answer_sheet::SheetTemplate;
use crate::error::OmrError;
use crate::marks::Mark;

/// The marks belonging to one question, ordered left-to-right so ordinal
/// position maps to the choice letter.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRow {
    pub question: u32,
    pub marks: Vec<Mark>,
}

/// Buckets detected marks into per-question rows.
///
/// Marks cluster into physical rows by vertical position, a possible
/// header row is discarded, and rows are then walked column-block by
/// column-block: question numbering advances down the rows of one column
/// before moving `num_choices` marks to the right.
#[time]
pub fn organize(
    marks: Vec<Mark>,
    num_questions: u32,
    num_choices: u32,
    template: &SheetTemplate,
    row_tolerance: i32,
) -> Result<Vec<QuestionRow>, OmrError> {
    if marks.is_empty() {
        return Err(OmrError::identification(
            "no answer marks were detected on the sheet",
        ));
    }

    let detected = marks.len();
    let mut rows = group_marks_into_rows(marks, row_tolerance);
    let expected = template.expected_marks(num_choices);
    if detected > expected && rows.len() > 1 {
        debug!(
            "detected {} marks but the template prints {}; discarding the first row as a header artifact",
            detected, expected
        );
        rows.remove(0);
    }
    let expected_rows = (num_questions + template.grid.width - 1) / template.grid.width;
    if rows.len() as u32 != expected_rows {
        debug!(
            "clustered {} rows where the layout suggests {}",
            rows.len(),
            expected_rows
        );
    }

    map_rows_to_questions(&rows, num_questions, num_choices)
}

/// Single-linkage clustering over the y axis: a mark joins the current row
/// while its top edge stays within a fixed pixel band of the row anchor.
/// The band is absolute, not row-relative, which keeps small print skew
/// from splitting rows.
pub fn group_marks_into_rows(mut marks: Vec<Mark>, row_tolerance: i32) -> Vec<Vec<Mark>> {
    marks.sort_by_key(|mark| (mark.bounds.top(), mark.bounds.left()));

    let mut rows: Vec<Vec<Mark>> = Vec::new();
    let mut current: Vec<Mark> = Vec::new();
    let mut anchor_y = match marks.first() {
        Some(mark) => mark.bounds.top(),
        None => return rows,
    };

    for mark in marks {
        if (mark.bounds.top() - anchor_y).abs() < row_tolerance {
            current.push(mark);
        } else {
            close_row(&mut rows, current);
            anchor_y = mark.bounds.top();
            current = vec![mark];
        }
    }
    close_row(&mut rows, current);
    rows
}

fn close_row(rows: &mut Vec<Vec<Mark>>, mut row: Vec<Mark>) {
    if !row.is_empty() {
        row.sort_by_key(|mark| mark.bounds.left());
        rows.push(row);
    }
}

fn map_rows_to_questions(
    rows: &[Vec<Mark>],
    num_questions: u32,
    num_choices: u32,
) -> Result<Vec<QuestionRow>, OmrError> {
    let mut questions = Vec::with_capacity(num_questions as usize);
    let mut column_offset = 0usize;
    for i in 0..num_questions as usize {
        let row = &rows[i % rows.len()];
        let marks = row
            .get(column_offset..column_offset + num_choices as usize)
            .ok_or_else(|| {
                OmrError::identification(format!(
                    "question {} needs marks {}..{} of its row but only {} were detected there",
                    i + 1,
                    column_offset,
                    column_offset + num_choices as usize,
                    row.len()
                ))
            })?;
        questions.push(QuestionRow {
            question: (i + 1) as u32,
            marks: marks.to_vec(),
        });
        if (i + 1) % rows.len() == 0 {
            column_offset += num_choices as usize;
        }
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer_sheet::sheet_template;
    use imageproc::point::Point;

    fn mark_at(x: i32, y: i32) -> Mark {
        Mark::from_contour(vec![
            Point::new(x, y),
            Point::new(x + 30, y),
            Point::new(x + 30, y + 30),
            Point::new(x, y + 30),
        ])
        .unwrap()
    }

    fn grid_of_marks(rows: usize, cols: usize, y0: i32) -> Vec<Mark> {
        let mut marks = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                marks.push(mark_at(100 + c as i32 * 80, y0 + r as i32 * 70));
            }
        }
        marks
    }

    #[test]
    fn exact_grid_maps_one_row_per_question() {
        let template = sheet_template(10, 4).unwrap();
        let rows = organize(grid_of_marks(10, 4, 120), 10, 4, &template, 25).unwrap();
        assert_eq!(rows.len(), 10);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.question, i as u32 + 1);
            assert_eq!(row.marks.len(), 4);
            assert_eq!(row.marks[0].bounds.top(), 120 + i as i32 * 70);
            assert!(row.marks.windows(2).all(|w| w[0].bounds.left() < w[1].bounds.left()));
        }
    }

    #[test]
    fn row_clustering_tolerates_jitter() {
        let mut marks = grid_of_marks(3, 4, 100);
        // nudge one mark inside the band and one row fully outside it
        marks[1] = mark_at(180, 110);
        let rows = group_marks_into_rows(marks, 25);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 4);
    }

    #[test]
    fn surplus_marks_discard_the_header_row() {
        let template = sheet_template(10, 4).unwrap();
        let mut marks = grid_of_marks(10, 4, 120);
        marks.extend((0..4).map(|c| mark_at(100 + c * 80, 20)));
        let rows = organize(marks, 10, 4, &template, 25).unwrap();
        assert_eq!(rows.len(), 10);
        // the header row at y=20 is gone; question 1 starts at the grid
        assert_eq!(rows[0].marks[0].bounds.top(), 120);
    }

    #[test]
    fn multi_column_layouts_wrap_down_then_right() {
        let template = sheet_template(40, 4).unwrap();
        let rows = organize(grid_of_marks(20, 8, 60), 40, 4, &template, 25).unwrap();
        assert_eq!(rows.len(), 40);
        // question 21 restarts at the top row, second block of choices
        assert_eq!(rows[20].question, 21);
        assert_eq!(rows[20].marks[0].bounds.top(), 60);
        assert_eq!(rows[20].marks[0].bounds.left(), 100 + 4 * 80);
        // question 40 sits at the bottom right
        assert_eq!(rows[39].marks[3].bounds.left(), 100 + 7 * 80);
    }

    #[test]
    fn missing_marks_fail_identification() {
        let template = sheet_template(10, 4).unwrap();
        let mut marks = grid_of_marks(10, 4, 120);
        marks.truncate(37);
        let result = organize(marks, 10, 4, &template, 25);
        assert!(matches!(
            result,
            Err(OmrError::MarkIdentificationFailed { .. })
        ));
    }

    #[test]
    fn zero_marks_fail_identification() {
        let template = sheet_template(10, 4).unwrap();
        assert!(matches!(
            organize(Vec::new(), 10, 4, &template, 25),
            Err(OmrError::MarkIdentificationFailed { .. })
        ));
    }
}
