//! `question-template`: renderer for adaptive question templates.
//!
//! A question template is HTML with `[[path]]` / `{{path}}` placeholders and
//! custom `pl-*` widget tags. Rendering it against a generated
//! [`ParameterBag`] substitutes the placeholders, expands every widget into
//! plain HTML, draws random subsets and orderings, and collects the answer
//! key and hint texts needed to grade the response.
//!
//! # Quick start
//!
//! ```
//! use question_template::{ParameterBag, RenderOptions, render_question_with_rng};
//! use question_template::random::RngSource;
//!
//! let bag = ParameterBag::from_json(
//!     r#"{"params": {"load": 13000}, "correct_answers": {"stress": 4.7}}"#,
//! ).unwrap();
//! let template = r#"<p>Load: [[params.load]] N</p>
//! <pl-number-input answers-name="stress" comparison="sigfig" digits="2"></pl-number-input>"#;
//!
//! let output = render_question_with_rng(
//!     template,
//!     &bag,
//!     &RenderOptions::default(),
//!     &mut RngSource::seeded(1),
//! );
//! assert!(output.html.starts_with("<p>Load: 13000 N</p>"));
//! assert_eq!(output.answers[0].name, "stress");
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod flatten;
pub mod markup;
pub mod random;
#[cfg(feature = "terminal")]
pub mod render_term;
pub mod rewrite;
pub mod tags;
pub mod template;
pub mod types;
pub mod widgets;

pub use builder::ParameterBagBuilder;
pub use config::{ArrayMode, MissingPolicy, RenderOptions};
pub use error::*;
pub use random::{RandomSource, RngSource};
pub use tags::Tag;
pub use types::*;

/// Render a template with a fresh thread-local random source.
pub fn render_question(template: &str, bag: &ParameterBag, options: &RenderOptions) -> RenderOutput {
    render_question_with_rng(template, bag, options, &mut RngSource::thread())
}

/// Render a template with a caller-supplied random source, for reproducible
/// variants.
pub fn render_question_with_rng(
    template: &str,
    bag: &ParameterBag,
    options: &RenderOptions,
    rng: &mut dyn RandomSource,
) -> RenderOutput {
    rewrite::render(template, bag, options, rng)
}

impl RenderOutput {
    /// Colored summary of answers, hints and diagnostics.
    #[cfg(feature = "terminal")]
    pub fn to_terminal(&self) -> String {
        render_term::to_terminal(self)
    }

    /// Serialize as the JSON object consumed by the grading frontend.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
