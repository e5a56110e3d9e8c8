//! End-to-end tests over synthetically drawn bubble sheets.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

use omr_grader::interpret::{grade_sheet, resolve_sheet};
use omr_grader::{generate_key, AnswerKey, ImageSource, OmrError, Options};

const INK: Rgb<u8> = Rgb([10, 10, 10]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const BACKDROP: Rgb<u8> = Rgb([90, 90, 90]);

fn draw_bubble(canvas: &mut RgbImage, cx: i32, cy: i32, radius: i32, filled: bool) {
    if filled {
        draw_filled_circle_mut(canvas, (cx, cy), radius, INK);
    } else {
        for r in [radius, radius - 1, radius - 2] {
            draw_hollow_circle_mut(canvas, (cx, cy), r, INK);
        }
    }
}

/// One-column sheet for the 10-question template: 4 choices per row.
/// `answers[i]` is the filled choice index of question i+1, or None.
fn single_column_sheet(answers: &[Option<usize>; 10]) -> RgbImage {
    let mut sheet = RgbImage::from_pixel(850, 1100, PAPER);
    for (i, answer) in answers.iter().enumerate() {
        for j in 0..4 {
            let cx = 150 + j as i32 * 110;
            let cy = 140 + i as i32 * 90;
            draw_bubble(&mut sheet, cx, cy, 25, *answer == Some(j));
        }
    }
    sheet
}

/// Two-question-column sheet for the 40-question template: 20 physical
/// rows of 2 x 4 bubbles.
fn two_column_sheet(choice_of: impl Fn(u32) -> usize) -> RgbImage {
    let mut sheet = RgbImage::from_pixel(850, 1100, PAPER);
    for question in 1..=40u32 {
        let row = (question - 1) % 20;
        let block = (question - 1) / 20;
        for j in 0..4u32 {
            let cx = 110 + (block * 4 + j) as i32 * 80;
            let cy = 80 + row as i32 * 50;
            draw_bubble(&mut sheet, cx, cy, 18, choice_of(question) == j as usize);
        }
    }
    sheet
}

fn bytes_source(sheet: &RgbImage) -> ImageSource {
    ImageSource::Bytes(omr_grader::image_utils::encode_png(sheet).unwrap())
}

fn rectified_options(num_questions: u32, num_choices: u32) -> Options {
    let mut options = Options::new(num_questions, num_choices);
    options.prerectified = true;
    options
}

#[test]
fn grades_a_rectified_sheet_with_a_wrong_and_a_blank_answer() {
    // questions answer A,B,C,D cyclically; question 5 is left blank
    let mut answers = [None; 10];
    for i in 0..10 {
        answers[i] = if i == 4 { None } else { Some(i % 4) };
    }
    let sheet = single_column_sheet(&answers);

    // the key disagrees on question 3 and expects A for the blank question 5
    let key: AnswerKey = (1..=10u32)
        .map(|q| {
            let label = match q {
                3 => 'D',
                5 => 'A',
                _ => (b'A' + ((q as u8 - 1) % 4)) as char,
            };
            (q, label)
        })
        .collect();

    let graded = grade_sheet(&bytes_source(&sheet), &key, &rectified_options(10, 4)).unwrap();
    assert_eq!(graded.result.score, 80.0);
    assert_eq!(graded.result.graded[&1], true);
    assert_eq!(graded.result.graded[&3], false);
    assert_eq!(graded.result.graded[&5], false);
    assert_eq!(graded.result.choices[&1], Some('A'));
    assert_eq!(graded.result.choices[&3], Some('C'));
    assert_eq!(graded.result.choices[&5], None);

    // annotation drew outlines on a copy of the sheet
    assert_eq!(
        (graded.annotated.width(), graded.annotated.height()),
        (sheet.width(), sheet.height())
    );
    assert_ne!(graded.annotated.as_raw(), sheet.as_raw());
}

#[test]
fn grading_is_idempotent() {
    let answers = [Some(0), Some(1), Some(2), Some(3), Some(0), Some(1), Some(2), Some(3), Some(0), Some(1)];
    let sheet = single_column_sheet(&answers);
    let key: AnswerKey = (1..=10u32)
        .map(|q| (q, (b'A' + ((q as u8 - 1) % 4)) as char))
        .collect();
    let options = rectified_options(10, 4);

    let first = grade_sheet(&bytes_source(&sheet), &key, &options).unwrap();
    let second = grade_sheet(&bytes_source(&sheet), &key, &options).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.annotated.as_raw(), second.annotated.as_raw());
}

#[test]
fn key_generation_round_trips_a_uniform_master() {
    // bubble C filled for every question
    let sheet = single_column_sheet(&[Some(2); 10]);
    let key = generate_key(&bytes_source(&sheet), &rectified_options(10, 4)).unwrap();
    assert_eq!(key.len(), 10);
    for question in 1..=10 {
        assert_eq!(key.choice(question), Some('C'));
    }
}

#[test]
fn key_generation_rejects_a_master_with_a_blank_question() {
    let mut answers = [Some(1); 10];
    answers[6] = None;
    let sheet = single_column_sheet(&answers);
    let result = generate_key(&bytes_source(&sheet), &rectified_options(10, 4));
    assert!(matches!(result, Err(OmrError::KeyIncomplete { question: 7 })));
}

#[test]
fn a_header_row_of_artifacts_is_discarded() {
    let mut sheet = single_column_sheet(&[Some(3); 10]);
    // a printed course-name line that detects as one extra bubble row
    for j in 0..4 {
        draw_bubble(&mut sheet, 150 + j * 110, 50, 25, false);
    }
    let key: AnswerKey = (1..=10u32).map(|q| (q, 'D')).collect();
    let graded = grade_sheet(&bytes_source(&sheet), &key, &rectified_options(10, 4)).unwrap();
    assert_eq!(graded.result.score, 100.0);
}

#[test]
fn multi_column_layouts_resolve_down_then_right() {
    let choice_of = |question: u32| ((question * 3 + 1) % 4) as usize;
    let sheet = two_column_sheet(choice_of);
    let key = generate_key(&bytes_source(&sheet), &rectified_options(40, 4)).unwrap();
    assert_eq!(key.len(), 40);
    for question in 1..=40 {
        let expected = (b'A' + choice_of(question) as u8) as char;
        assert_eq!(key.choice(question), Some(expected), "question {question}");
    }
}

#[test]
fn a_blank_crop_fails_mark_identification() {
    let sheet = RgbImage::from_pixel(850, 1100, PAPER);
    let key: AnswerKey = (1..=10u32).map(|q| (q, 'A')).collect();
    let result = grade_sheet(&bytes_source(&sheet), &key, &rectified_options(10, 4));
    assert!(matches!(
        result,
        Err(OmrError::MarkIdentificationFailed { .. })
    ));
}

#[test]
fn a_featureless_photo_fails_document_extraction() {
    let photo = RgbImage::from_pixel(1150, 1400, BACKDROP);
    let key: AnswerKey = (1..=10u32).map(|q| (q, 'A')).collect();
    let result = grade_sheet(&bytes_source(&photo), &key, &Options::new(10, 4));
    assert!(matches!(
        result,
        Err(OmrError::DocumentExtractionFailed { .. })
    ));
}

#[test]
fn a_photographed_sheet_is_isolated_and_graded() {
    let answers = [Some(1); 10];
    let sheet = single_column_sheet(&answers);
    let mut photo = RgbImage::from_pixel(1150, 1400, BACKDROP);
    // paste the sheet onto the backdrop with a margin all round
    draw_filled_rect_mut(&mut photo, Rect::at(150, 150).of_size(850, 1100), PAPER);
    for (x, y, pixel) in sheet.enumerate_pixels() {
        if *pixel != PAPER {
            photo.put_pixel(x + 150, y + 150, *pixel);
        }
    }

    let key: AnswerKey = (1..=10u32).map(|q| (q, 'B')).collect();
    let graded = grade_sheet(&bytes_source(&photo), &key, &Options::new(10, 4)).unwrap();
    assert_eq!(graded.result.score, 100.0);

    // the rectified crop is close to the physical sheet size
    let (width, height) = (graded.annotated.width(), graded.annotated.height());
    assert!((820..=880).contains(&width), "width {width}");
    assert!((1060..=1130).contains(&height), "height {height}");
}

#[test]
fn resolve_sheet_reports_every_question() {
    let sheet = single_column_sheet(&[Some(0); 10]);
    let resolved = resolve_sheet(&bytes_source(&sheet), &rectified_options(10, 4)).unwrap();
    assert_eq!(resolved.choices.len(), 10);
    assert!(resolved
        .choices
        .iter()
        .all(|choice| choice.selection.as_ref().map(|s| s.label) == Some('A')));
}
