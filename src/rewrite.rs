//! Tree rewriting pipeline.
//!
//! A render substitutes placeholders, parses the result, and runs the node
//! list through [`Pass::PIPELINE`]. Each pass consumes the tree and returns a
//! new one. The order is load-bearing: question panels are unwrapped after
//! every widget inside them has been materialized, and hints are captured
//! after panel unwrapping so hints nested in panels are still found.

use crate::config::RenderOptions;
use crate::error::{Diagnostic, RenderError};
use crate::flatten::{FlattenOptions, flatten_bag};
use crate::markup::{self, Element, Node, to_html};
use crate::random::{RandomSource, selection_mask};
use crate::tags::{HintProps, Tag};
use crate::template::substitute_with_diagnostics;
use crate::types::{AnswerRecord, HintLevel, ParameterBag, Precision, RenderOutput, SolutionMap};
use crate::widgets::{self, RenderResult};

/// Per-render state. Created fresh for every render and consumed by it.
pub struct RenderContext<'a> {
    pub bag: &'a ParameterBag,
    pub options: &'a RenderOptions,
    /// Precision used for flattening, applied to bag-sourced answers too.
    pub precision: Option<Precision>,
    rng: &'a mut dyn RandomSource,
    answers: Vec<AnswerRecord>,
    solutions: SolutionMap,
    diagnostics: Vec<Diagnostic>,
    generated_names: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        bag: &'a ParameterBag,
        options: &'a RenderOptions,
        precision: Option<Precision>,
        rng: &'a mut dyn RandomSource,
    ) -> Self {
        Self {
            bag,
            options,
            precision,
            rng,
            answers: Vec::new(),
            solutions: SolutionMap::new(),
            diagnostics: Vec::new(),
            generated_names: 0,
        }
    }

    pub fn rng(&mut self) -> &mut dyn RandomSource {
        &mut *self.rng
    }

    pub fn warn(&mut self, code: &'static str, message: String) {
        tracing::warn!(code, "{message}");
        self.diagnostics.push(Diagnostic::warning(code, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn solutions(&self) -> &SolutionMap {
        &self.solutions
    }

    /// The declared `answers-name`, or a generated `<kind>-<n>` default.
    pub fn answer_name(&mut self, declared: Option<String>, tag: Tag) -> String {
        if let Some(name) = declared {
            return name;
        }
        self.generated_names += 1;
        let name = format!(
            "{}-{}",
            tag.name().trim_start_matches("pl-"),
            self.generated_names
        );
        self.warn(
            "missing-answers-name",
            format!("<{}> has no answers-name; using '{name}'", tag.name()),
        );
        name
    }

    fn finish(self, html: String) -> RenderOutput {
        RenderOutput {
            html,
            answers: self.answers,
            solutions: self.solutions,
            diagnostics: self.diagnostics,
        }
    }
}

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    MatrixInputs,
    NumberInputs,
    SymbolicInputs,
    QuestSelection,
    AdaptiveChoices,
    QuestPrompts,
    QuestionPanels,
    Hints,
    StaticText,
    Figures,
    Checkboxes,
    MultipleChoices,
}

impl Pass {
    pub const PIPELINE: [Pass; 12] = [
        Pass::MatrixInputs,
        Pass::NumberInputs,
        Pass::SymbolicInputs,
        Pass::QuestSelection,
        Pass::AdaptiveChoices,
        Pass::QuestPrompts,
        Pass::QuestionPanels,
        Pass::Hints,
        Pass::StaticText,
        Pass::Figures,
        Pass::Checkboxes,
        Pass::MultipleChoices,
    ];

    /// Tags resolved by this pass.
    pub fn tags(self) -> &'static [Tag] {
        match self {
            Pass::MatrixInputs => &[Tag::MatrixInput, Tag::MatrixLatex],
            Pass::NumberInputs => &[Tag::ComputedNumberInput, Tag::NumberInput],
            Pass::SymbolicInputs => &[Tag::SymbolicInput],
            Pass::QuestSelection => &[Tag::Quest],
            Pass::AdaptiveChoices => &[Tag::AdaptiveMultipleChoice, Tag::AdaptiveCheckbox],
            Pass::QuestPrompts => &[Tag::QuestPrompt],
            Pass::QuestionPanels => &[Tag::QuestionPanel],
            Pass::Hints => &[Tag::Hint, Tag::SolutionHint],
            Pass::StaticText => &[Tag::Text],
            Pass::Figures => &[Tag::Figure],
            Pass::Checkboxes => &[Tag::Checkbox],
            Pass::MultipleChoices => &[Tag::MultipleChoice],
        }
    }
}

/// Render a template against a parameter bag.
pub fn render(
    template: &str,
    bag: &ParameterBag,
    options: &RenderOptions,
    rng: &mut dyn RandomSource,
) -> RenderOutput {
    let flatten_options = FlattenOptions::for_bag(bag, options);
    let mut flat = flatten_bag(bag, &flatten_options);
    let mut diagnostics = flat.take_diagnostics();
    let substituted = substitute_with_diagnostics(template, &flat, options.missing, &mut diagnostics);

    let parsed = markup::parse(&substituted);
    diagnostics.extend(parsed.diagnostics);

    let mut ctx = RenderContext::new(bag, options, flatten_options.precision, rng);
    ctx.diagnostics = diagnostics;
    let nodes = transform(parsed.nodes, &mut ctx);
    ctx.finish(to_html(&nodes))
}

/// Run every pass of the pipeline in order.
pub fn transform(nodes: Vec<Node>, ctx: &mut RenderContext) -> Vec<Node> {
    Pass::PIPELINE
        .iter()
        .fold(nodes, |nodes, &pass| run_pass(pass, nodes, ctx))
}

/// Run a single pass over a node list.
pub fn run_pass(pass: Pass, nodes: Vec<Node>, ctx: &mut RenderContext) -> Vec<Node> {
    tracing::debug!(?pass, "running pass");
    match pass {
        Pass::QuestSelection => select_quests(nodes, ctx),
        _ => rewrite(nodes, pass.tags(), ctx),
    }
}

/// Replace every element whose tag is in `tags`, children first.
fn rewrite(nodes: Vec<Node>, tags: &[Tag], ctx: &mut RenderContext) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Element(mut el) = node else {
            out.push(node);
            continue;
        };
        el.children = rewrite(std::mem::take(&mut el.children), tags, ctx);
        let tag = Tag::of(&el);
        if !tags.contains(&tag) {
            out.push(Node::Element(el));
            continue;
        }
        match render_tag(tag, el, ctx) {
            Ok(result) => {
                match result.answer {
                    Some(answer) => ctx.answers.push(answer),
                    None if tag.is_graded() => ctx.diagnostics.push(Diagnostic::info(
                        "ungraded-widget",
                        format!("<{}> has no correct answer to record", tag.name()),
                    )),
                    None => {}
                }
                out.extend(result.nodes);
            }
            Err(err) => {
                let message = format!("<{}> failed to render: {err}", tag.name());
                tracing::warn!("{message}");
                ctx.diagnostics.push(Diagnostic::error("render-error", message));
                out.push(widgets::error_marker(tag.name(), &err));
            }
        }
    }
    out
}

fn render_tag(tag: Tag, el: Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    match tag {
        Tag::MatrixInput => widgets::render_matrix_input(&el, ctx),
        Tag::MatrixLatex => widgets::render_matrix_latex(&el, ctx),
        Tag::ComputedNumberInput => widgets::render_computed_number_input(&el, ctx),
        Tag::NumberInput => widgets::render_number_input(&el, ctx),
        Tag::SymbolicInput => widgets::render_symbolic_input(&el, ctx),
        Tag::AdaptiveMultipleChoice => widgets::render_adaptive(el, Tag::MultipleChoice, ctx),
        Tag::AdaptiveCheckbox => widgets::render_adaptive(el, Tag::Checkbox, ctx),
        Tag::Quest | Tag::QuestPrompt => Ok(widgets::unwrap(el)),
        Tag::QuestionPanel => Ok(widgets::render_question_panel(el)),
        Tag::Hint | Tag::SolutionHint => Ok(capture_hint(tag, el, ctx)),
        Tag::Text => Ok(widgets::render_text(el)),
        Tag::Figure => widgets::render_figure(&el, ctx),
        Tag::Checkbox | Tag::MultipleChoice => widgets::render_choice_group(el, ctx),
        Tag::Answer | Tag::Passthrough => Ok(RenderResult::nodes(vec![Node::Element(el)])),
    }
}

// ------------------------------------------------------------------
// Hints
// ------------------------------------------------------------------

/// Move a hint's content into the solution map. The content goes through the
/// static-text and figure passes first so the captured HTML is displayable.
fn capture_hint(tag: Tag, el: Element, ctx: &mut RenderContext) -> RenderResult {
    let props = HintProps::from_element(&el);
    let level = props.level.unwrap_or_else(|| match tag {
        Tag::SolutionHint => HintLevel::Named("solution".to_string()),
        _ => HintLevel::Number(ctx.solutions.max_numeric_level().map_or(1, |n| n + 1)),
    });
    let content = [Pass::StaticText, Pass::Figures]
        .into_iter()
        .fold(el.children, |nodes, pass| run_pass(pass, nodes, ctx));
    ctx.solutions.insert(level, to_html(&content).trim().to_string());
    RenderResult::default()
}

// ------------------------------------------------------------------
// Random-subset selection
// ------------------------------------------------------------------

fn count_quests(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter_map(Node::as_element)
        .map(|el| usize::from(Tag::of(el) == Tag::Quest) + count_quests(&el.children))
        .sum()
}

/// Keep a random subset of the document's `pl-quest` blocks, unwrapping the
/// kept ones and deleting the rest with their content.
fn select_quests(nodes: Vec<Node>, ctx: &mut RenderContext) -> Vec<Node> {
    let total = count_quests(&nodes);
    if total == 0 {
        return nodes;
    }
    let (frac_min, frac_max) = ctx.options.selection_range();
    let mask = selection_mask(ctx.rng(), total, frac_min, frac_max);
    tracing::debug!(
        total,
        kept = mask.iter().filter(|keep| **keep).count(),
        "selected quest blocks"
    );
    let mut index = 0;
    apply_mask(nodes, &mask, &mut index)
}

/// Walk quests in document order; `index` is the position in the mask.
fn apply_mask(nodes: Vec<Node>, mask: &[bool], index: &mut usize) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Element(mut el) = node else {
            out.push(node);
            continue;
        };
        if Tag::of(&el) == Tag::Quest {
            let keep = mask.get(*index).copied().unwrap_or(false);
            *index += 1;
            if keep {
                out.extend(apply_mask(el.children, mask, index));
            } else {
                *index += count_quests(&el.children);
            }
        } else {
            el.children = apply_mask(std::mem::take(&mut el.children), mask, index);
            out.push(Node::Element(el));
        }
    }
    out
}
