use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg, command, value_parser, ArgMatches, Command};

use omr_grader::{batch_average, generate_key, grade_batch, AnswerKey, ImageSource, Options};

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("grade", sub)) => run_grade(sub),
        Some(("make-key", sub)) => run_make_key(sub),
        _ => unreachable!("a subcommand is required"),
    }
}

fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .subcommand(
            Command::new("grade")
                .about("Grade submission photos against an answer key")
                .arg(arg!(-k --key <PATH> "Path to the answer key JSON").required(true))
                .arg(
                    arg!(-q --questions <COUNT> "Number of questions on the sheet")
                        .required(true)
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    arg!(-c --choices <COUNT> "Number of choices per question")
                        .required(true)
                        .value_parser(value_parser!(u32)),
                )
                .arg(arg!(--rectified "Inputs are flat scans; skip sheet isolation"))
                .arg(arg!(-d --debug "Write per-stage debug images next to each input"))
                .arg(arg!(-o --outdir <DIR> "Directory for annotated output images"))
                .arg(arg!(--font <PATH> "TTF font used for the score overlay"))
                .arg(arg!(sheets: <SHEET_IMAGE> ... "Paths to submission images").required(true)),
        )
        .subcommand(
            Command::new("make-key")
                .about("Resolve a hand-marked master sheet into an answer key JSON")
                .arg(
                    arg!(-q --questions <COUNT> "Number of questions on the sheet")
                        .required(true)
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    arg!(-c --choices <COUNT> "Number of choices per question")
                        .required(true)
                        .value_parser(value_parser!(u32)),
                )
                .arg(arg!(--rectified "Input is a flat scan; skip sheet isolation"))
                .arg(arg!(-d --debug "Write per-stage debug images next to the input"))
                .arg(arg!(-o --out <PATH> "Write the key JSON here instead of stdout"))
                .arg(arg!(master: <MASTER_IMAGE> "Path to the marked master sheet").required(true)),
        )
}

fn build_options(matches: &ArgMatches) -> Options {
    let questions = *matches
        .get_one::<u32>("questions")
        .expect("question count is required");
    let choices = *matches
        .get_one::<u32>("choices")
        .expect("choice count is required");
    let mut options = Options::new(questions, choices);
    options.prerectified = matches.get_flag("rectified");
    options.debug = matches.get_flag("debug");
    if let Some(font) = matches.try_get_one::<String>("font").ok().flatten() {
        options.font_path = Some(PathBuf::from(font));
    }
    options
}

fn run_grade(matches: &ArgMatches) {
    let key_path = matches
        .get_one::<String>("key")
        .expect("key path is required");
    let key_json = match std::fs::read_to_string(key_path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error reading answer key: {}", e);
            exit(1);
        }
    };
    let key: AnswerKey = match serde_json::from_str(&key_json) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error parsing answer key: {}", e);
            exit(1);
        }
    };

    let options = build_options(matches);
    if let Err(e) = key.validate(options.num_questions, options.num_choices) {
        eprintln!("Error: {}", e);
        exit(1);
    }

    let sheets: Vec<PathBuf> = matches
        .get_many::<String>("sheets")
        .expect("at least one sheet image is required")
        .map(PathBuf::from)
        .collect();
    let outdir = matches.get_one::<String>("outdir").map(PathBuf::from);

    let results = grade_batch(&sheets, &key, &options);
    let mut failures = 0;
    for (path, outcome) in &results {
        match outcome {
            Ok(graded) => {
                let out_path = annotated_path(path, outdir.as_deref());
                if let Err(e) = graded.annotated.save(&out_path) {
                    eprintln!("Error saving {}: {}", out_path.display(), e);
                }
                let json =
                    serde_json::to_string(&graded.result).expect("graded result serializes");
                println!("{}: {}", path.display(), json);
            }
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }
    if let Some(average) = batch_average(&results) {
        println!("average: {:.2}", average);
    }
    if failures == results.len() {
        exit(1);
    }
}

fn run_make_key(matches: &ArgMatches) {
    let master = matches
        .get_one::<String>("master")
        .expect("master image path is required");
    let options = build_options(matches);

    let key = match generate_key(&ImageSource::Path(PathBuf::from(master)), &options) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let json = serde_json::to_string_pretty(&key).expect("answer key serializes");
    match matches.get_one::<String>("out") {
        Some(out) => {
            if let Err(e) = std::fs::write(out, json) {
                eprintln!("Error writing key to {}: {}", out, e);
                exit(1);
            }
        }
        None => println!("{}", json),
    }
}

fn annotated_path(input: &Path, outdir: Option<&Path>) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let file_name = format!("{}-graded.png", stem);
    match outdir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
