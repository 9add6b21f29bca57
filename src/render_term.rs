//! ANSI-colored summary of a render, for command-line use.

use colored::Colorize;

use crate::error::{Diagnostic, Severity};
use crate::types::{CorrectAnswers, RenderOutput};

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".cyan(),
    }
}

/// One diagnostic as a colored line.
pub fn diagnostic_line(diagnostic: &Diagnostic) -> String {
    format!(
        "{}[{}]: {}",
        severity_label(diagnostic.severity),
        diagnostic.code.dimmed(),
        diagnostic.message
    )
}

/// Answer key, hint levels and diagnostics of a render.
pub fn to_terminal(output: &RenderOutput) -> String {
    let mut lines = Vec::new();

    if !output.answers.is_empty() {
        lines.push(format!("{}", "Answers".bold()));
        for answer in &output.answers {
            let key = match &answer.correct_answers {
                CorrectAnswers::Scalar(s) => s.to_string(),
                CorrectAnswers::Choices(ids) => ids.join(", "),
                CorrectAnswers::Structured(v) => v.to_string(),
            };
            lines.push(format!("  {} = {}", answer.name.cyan(), key.green()));
        }
    }

    if !output.solutions.is_empty() {
        lines.push(format!("{}", "Hints".bold()));
        for (level, html) in output.solutions.iter() {
            lines.push(format!("  {} {}", format!("[{level}]").cyan(), html.dimmed()));
        }
    }

    if output.diagnostics.is_empty() {
        lines.push(format!("{} no diagnostics", "✓".green().bold()));
    } else {
        for diagnostic in &output.diagnostics {
            lines.push(diagnostic_line(diagnostic));
        }
    }

    lines.join("\n")
}
