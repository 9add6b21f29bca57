use question_template::random::RngSource;
use question_template::{ConfigError, ParameterBag, RenderOptions, RenderOutput, render_question_with_rng};
use std::env;
use std::fs;
use std::process;

fn usage() -> ! {
    eprintln!("Usage: question-render <question.html> <bag.json> [options.json|options.yaml] [--seed N]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  question-render question.html variant.json");
    eprintln!("  question-render question.html variant.json render.yaml --seed 7");
    process::exit(2);
}

fn main() {
    let mut seed = None;
    let mut paths = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--seed" {
            match args.next().and_then(|s| s.parse::<u64>().ok()) {
                Some(s) => seed = Some(s),
                None => usage(),
            }
        } else {
            paths.push(arg);
        }
    }
    if !(2..=3).contains(&paths.len()) {
        usage();
    }

    let output = match run(&paths, seed) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("✗ {e}");
            process::exit(1);
        }
    };

    match output.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("✗ could not serialize output: {e}");
            process::exit(1);
        }
    }

    #[cfg(feature = "terminal")]
    eprintln!("{}", output.to_terminal());

    if output.has_errors() {
        process::exit(1);
    }
}

fn read(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))
}

fn run(paths: &[String], seed: Option<u64>) -> Result<RenderOutput, String> {
    let template = read(&paths[0])?;
    let bag = ParameterBag::from_json(&read(&paths[1])?).map_err(|e| format!("{}: {e}", paths[1]))?;
    let options = match paths.get(2) {
        Some(path) => load_options(path)?,
        None => RenderOptions::default(),
    };

    let output = match seed {
        Some(seed) => render_question_with_rng(&template, &bag, &options, &mut RngSource::seeded(seed)),
        None => render_question_with_rng(&template, &bag, &options, &mut RngSource::thread()),
    };
    Ok(output)
}

fn load_options(path: &str) -> Result<RenderOptions, String> {
    let content = read(path)?;
    let parsed: Result<RenderOptions, ConfigError> = if path.ends_with(".yaml") || path.ends_with(".yml") {
        RenderOptions::from_yaml(&content)
    } else {
        RenderOptions::from_json(&content)
    };
    parsed.map_err(|e| format!("{path}: {e}"))
}
