//! Widget renderers.
//!
//! Each renderer consumes one custom element (its attributes already
//! substituted) and returns replacement nodes, plus an answer record for
//! graded widgets. Renderers never touch the rest of the document; a failure
//! is returned as a [`RenderError`] and the pipeline isolates it.

use serde_json::Value;

use crate::error::RenderError;
use crate::flatten::{round_decimals, round_scalar};
use crate::markup::{Element, Node, to_html};
use crate::random::permutation;
use crate::rewrite::RenderContext;
use crate::tags::{
    AnswerProps, ChoiceGroupProps, FigureProps, MatrixInputProps, MatrixLatexProps,
    NumberInputProps, SymbolicInputProps, Tag, TextProps,
};
use crate::types::{AnswerRecord, CorrectAnswers, Precision, Scalar};

/// Output of one renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderResult {
    pub nodes: Vec<Node>,
    pub answer: Option<AnswerRecord>,
}

impl RenderResult {
    pub fn nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            answer: None,
        }
    }

    pub fn html(&self) -> String {
        to_html(&self.nodes)
    }
}

/// Visible inline marker replacing a node that failed to render.
pub fn error_marker(tag: &str, error: &RenderError) -> Node {
    Element::new("span")
        .with_attr("class", "pl-render-error")
        .with_attr("data-tag", tag)
        .with_child(Node::text(&format!("[{tag}: {error}]")))
        .into_node()
}

fn label_node(for_id: &str, label: &str) -> Node {
    Element::new("label")
        .with_attr("for", for_id)
        .with_child(Node::text(label))
        .into_node()
}

fn parse_scalar(raw: &str) -> Scalar {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        Scalar::Int(i)
    } else if let Ok(f) = trimmed.parse::<f64>() {
        Scalar::Float(f)
    } else {
        Scalar::Text(trimmed.to_string())
    }
}

// ------------------------------------------------------------------
// Matrices
// ------------------------------------------------------------------

/// Largest row or column count a matrix input grid may have.
pub const MAX_MATRIX_DIM: u32 = 50;

fn matrix_shape(value: &Value) -> Option<(u32, u32)> {
    let rows = value.as_array()?;
    let cols = rows.first()?.as_array()?.len();
    Some((u32::try_from(rows.len()).ok()?, u32::try_from(cols).ok()?))
}

pub fn render_matrix_input(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = MatrixInputProps::from_element(el)?;
    let name = ctx.answer_name(props.answers_name, Tag::MatrixInput);
    let correct = ctx.bag.correct_answer(&name).cloned();
    let shape = correct.as_ref().and_then(matrix_shape);

    let rows = props
        .rows
        .or(shape.map(|s| s.0))
        .ok_or(RenderError::MissingAttribute { attribute: "rows" })?;
    let cols = props
        .cols
        .or(shape.map(|s| s.1))
        .ok_or(RenderError::MissingAttribute { attribute: "cols" })?;
    check_dimension("rows", rows)?;
    check_dimension("cols", cols)?;

    let mut body = Element::new("tbody");
    for r in 0..rows {
        let mut row = Element::new("tr");
        for c in 0..cols {
            let input = Element::new("input")
                .with_attr("type", "text")
                .with_attr("name", format!("{name}_{r}_{c}"))
                .with_attr("size", "4")
                .with_attr("aria-label", format!("{name} row {} column {}", r + 1, c + 1));
            row = row.with_child(Element::new("td").with_child(input.into_node()).into_node());
        }
        body = body.with_child(row.into_node());
    }

    let id = format!("pl-matrix-input-{name}");
    let mut wrapper = Element::new("span")
        .with_attr("class", "pl-matrix-input")
        .with_attr("data-answers-name", name.clone());
    if let Some(label) = &props.label {
        wrapper = wrapper.with_child(label_node(&id, label));
    }
    let table = Element::new("table")
        .with_attr("class", "pl-matrix-input-grid")
        .with_attr("id", id)
        .with_child(body.into_node());
    wrapper = wrapper.with_child(table.into_node());

    Ok(RenderResult {
        nodes: vec![wrapper.into_node()],
        answer: correct.map(|value| AnswerRecord {
            name,
            correct_answers: CorrectAnswers::Structured(value),
            item_order: None,
            sigfigs: None,
        }),
    })
}

fn check_dimension(attribute: &'static str, value: u32) -> Result<(), RenderError> {
    if (1..=MAX_MATRIX_DIM).contains(&value) {
        return Ok(());
    }
    Err(RenderError::InvalidAttribute {
        attribute,
        value: value.to_string(),
        reason: format!("must be between 1 and {MAX_MATRIX_DIM}"),
    })
}

/// Static LaTeX matrix from a 2-D array under `params`. Numbers are rounded
/// to two decimals for display.
pub fn render_matrix_latex(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = MatrixLatexProps::from_element(el)?;
    let path = format!("params.{}", props.params_name);
    let value = ctx
        .bag
        .get(&path)
        .ok_or_else(|| RenderError::MissingParameter { path: path.clone() })?;
    let not_a_matrix = |reason: &str| RenderError::NotAMatrix {
        path: path.clone(),
        reason: reason.to_string(),
    };

    let rows = value.as_array().ok_or_else(|| not_a_matrix("expected an array of rows"))?;
    let mut latex_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row.as_array().ok_or_else(|| not_a_matrix("each row must be an array"))?;
        let mut latex_cells = Vec::with_capacity(cells.len());
        for cell in cells {
            let scalar = Scalar::from_json(cell).ok_or_else(|| not_a_matrix("cells must be scalars"))?;
            let display = match scalar.as_f64() {
                Some(f) if !matches!(scalar, Scalar::Text(_)) => Scalar::Float(round_decimals(f, 2)),
                _ => scalar,
            };
            latex_cells.push(display.to_string());
        }
        latex_rows.push(latex_cells.join(" & "));
    }

    let env = props.brackets.environment();
    let latex = format!("$\\begin{{{env}}} {} \\end{{{env}}}$", latex_rows.join(" \\\\ "));
    let span = Element::new("span")
        .with_attr("class", "pl-matrix-latex")
        .with_child(Node::text(&latex));
    Ok(RenderResult::nodes(vec![span.into_node()]))
}

// ------------------------------------------------------------------
// Text inputs
// ------------------------------------------------------------------

fn number_input_nodes(name: &str, props: &NumberInputProps, precision: Option<Precision>) -> Vec<Node> {
    let id = format!("pl-number-input-{name}");
    let mut input = Element::new("input")
        .with_attr("type", "number")
        .with_attr("step", "any")
        .with_attr("id", id.clone())
        .with_attr("name", name);
    if let Some(size) = props.size {
        input = input.with_attr("size", size.to_string());
    }
    match precision {
        Some(Precision::Sigfigs(n)) => {
            input = input
                .with_attr("data-comparison", "sigfig")
                .with_attr("data-digits", n.to_string());
        }
        Some(Precision::Decimals(n)) => {
            input = input
                .with_attr("data-comparison", "decdig")
                .with_attr("data-digits", n.to_string());
        }
        None => {}
    }

    let mut wrapper = Element::new("span")
        .with_attr("class", "pl-number-input")
        .with_attr("data-answers-name", name);
    if let Some(label) = &props.label {
        wrapper = wrapper.with_child(label_node(&id, label));
    }
    wrapper = wrapper.with_child(input.into_node());
    if let Some(suffix) = &props.suffix {
        wrapper = wrapper.with_child(
            Element::new("span")
                .with_attr("class", "pl-number-input-suffix")
                .with_child(Node::text(suffix))
                .into_node(),
        );
    }
    vec![wrapper.into_node()]
}

fn number_answer(name: String, correct: Scalar, precision: Option<Precision>) -> AnswerRecord {
    AnswerRecord {
        name,
        correct_answers: CorrectAnswers::Scalar(correct),
        item_order: None,
        sigfigs: match precision {
            Some(Precision::Sigfigs(n)) => Some(n),
            _ => None,
        },
    }
}

/// Number input whose correct answer is declared on the tag (falling back to
/// `correct_answers.<name>` in the bag).
pub fn render_number_input(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = NumberInputProps::from_element(el)?;
    let name = ctx.answer_name(props.answers_name.clone(), Tag::NumberInput);
    let precision = props.precision().or(ctx.precision);

    let correct = match &props.correct_answer {
        Some(raw) => parse_scalar(raw),
        None => bag_scalar(ctx, &name, precision)?,
    };

    Ok(RenderResult {
        nodes: number_input_nodes(&name, &props, precision),
        answer: Some(number_answer(name, correct, precision)),
    })
}

/// Number input whose correct answer is computed by the generator and read
/// from `correct_answers.<name>`.
pub fn render_computed_number_input(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = NumberInputProps::from_element(el)?;
    let name = ctx.answer_name(props.answers_name.clone(), Tag::ComputedNumberInput);
    let precision = props.precision().or(ctx.precision);
    let correct = bag_scalar(ctx, &name, precision)?;

    Ok(RenderResult {
        nodes: number_input_nodes(&name, &props, precision),
        answer: Some(number_answer(name, correct, precision)),
    })
}

fn bag_scalar(ctx: &RenderContext, name: &str, precision: Option<Precision>) -> Result<Scalar, RenderError> {
    ctx.bag
        .correct_answer(name)
        .and_then(Scalar::from_json)
        .filter(|s| *s != Scalar::Null)
        .map(|s| round_scalar(s, precision))
        .ok_or_else(|| RenderError::MissingCorrectAnswer {
            name: name.to_string(),
        })
}

pub fn render_symbolic_input(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = SymbolicInputProps::from_element(el)?;
    let name = ctx.answer_name(props.answers_name.clone(), Tag::SymbolicInput);
    let id = format!("pl-symbolic-input-{name}");

    let mut input = Element::new("input")
        .with_attr("type", "text")
        .with_attr("id", id.clone())
        .with_attr("name", name.clone())
        .with_attr("autocomplete", "off")
        .with_attr("spellcheck", "false");
    if !props.variables.is_empty() {
        input = input.with_attr("data-variables", props.variables.join(","));
    }
    if let Some(size) = props.size {
        input = input.with_attr("size", size.to_string());
    }

    let mut wrapper = Element::new("span")
        .with_attr("class", "pl-symbolic-input")
        .with_attr("data-answers-name", name);
    if let Some(label) = &props.label {
        wrapper = wrapper.with_child(label_node(&id, label));
    }
    wrapper = wrapper.with_child(input.into_node());
    Ok(RenderResult::nodes(vec![wrapper.into_node()]))
}

// ------------------------------------------------------------------
// Adaptive choice wrappers
// ------------------------------------------------------------------

/// Stamp `data-correct` on every option from
/// `correct_answers[group][choice]`, then unwrap the adaptive tag. The table
/// replaces any static `correct` attribute. Bare
/// `pl-answer` children are gathered into an inner group of `inner` kind.
pub fn render_adaptive(el: Element, inner: Tag, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let outer = Tag::of(&el);
    let props = ChoiceGroupProps::from_element(&el);
    let inner_name = el
        .child_elements()
        .find(|c| Tag::of(c) == inner)
        .and_then(|c| ChoiceGroupProps::from_element(c).answers_name);
    let group = ctx.answer_name(props.answers_name.or(inner_name), outer);

    let table = ctx.bag.correct_answer(&group).cloned();
    if table.is_none() {
        ctx.warn(
            "missing-correct-answers",
            format!("no correct_answers.{group} table for <{}>", outer.name()),
        );
    }

    let mut nodes = Vec::with_capacity(el.children.len());
    let mut bare_answers: Vec<Node> = Vec::new();
    let mut bare_slot = None;
    for child in el.children {
        match child {
            Node::Element(mut child) if Tag::of(&child) == inner => {
                if !child.has_attr("answers-name") {
                    child.set_attr("answers-name", group.clone());
                }
                child.children = stamp_options(child.children, &group, table.as_ref(), ctx);
                nodes.push(child.into_node());
            }
            Node::Element(child) if Tag::of(&child) == Tag::Answer => {
                bare_slot.get_or_insert(nodes.len());
                bare_answers.push(child.into_node());
            }
            other => nodes.push(other),
        }
    }

    if let Some(slot) = bare_slot {
        let stamped = stamp_options(bare_answers, &group, table.as_ref(), ctx);
        let group_el = Element::new(inner.name())
            .with_attr("answers-name", group.clone())
            .with_children(stamped);
        nodes.insert(slot, group_el.into_node());
    }

    Ok(RenderResult::nodes(nodes))
}

fn stamp_options(children: Vec<Node>, group: &str, table: Option<&Value>, ctx: &mut RenderContext) -> Vec<Node> {
    children
        .into_iter()
        .map(|node| match node {
            Node::Element(mut option) if Tag::of(&option) == Tag::Answer => {
                let correct = match AnswerProps::from_element(&option).name {
                    Some(choice) => table
                        .and_then(|t| t.get(&choice))
                        .and_then(Scalar::from_json)
                        .is_some_and(|s| s.is_truthy()),
                    None => {
                        ctx.warn(
                            "unnamed-choice",
                            format!("an option of adaptive group '{group}' has no name"),
                        );
                        false
                    }
                };
                option.remove_attr("correct");
                option.set_attr("data-correct", if correct { "true" } else { "false" });
                option.into_node()
            }
            other => other,
        })
        .collect()
}

// ------------------------------------------------------------------
// Choice groups
// ------------------------------------------------------------------

/// Shuffled checkbox (`multiple == true`) or radio group. Options get ids
/// `child{index}` by their original position.
pub fn render_choice_group(el: Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let tag = Tag::of(&el);
    let multiple = tag != Tag::MultipleChoice;
    let props = ChoiceGroupProps::from_element(&el);
    let name = ctx.answer_name(props.answers_name.clone(), tag);

    let mut preamble = Vec::new();
    let mut options: Vec<(String, bool, Vec<Node>)> = Vec::new();
    for child in el.children {
        match child {
            Node::Element(option) if Tag::of(&option) == Tag::Answer => {
                let correct = AnswerProps::from_element(&option).correct;
                options.push((format!("child{}", options.len()), correct, option.children));
            }
            node if node.is_whitespace() => {}
            node => preamble.push(node),
        }
    }
    if options.is_empty() {
        return Err(RenderError::NoOptions {
            tag: tag.name().to_string(),
        });
    }

    let order: Vec<usize> = if props.fixed_order {
        (0..options.len()).collect()
    } else {
        permutation(ctx.rng(), options.len())
    };

    let correct_ids: Vec<String> = options
        .iter()
        .filter(|(_, correct, _)| *correct)
        .map(|(id, _, _)| id.clone())
        .collect();
    if !multiple && correct_ids.len() != 1 {
        ctx.warn(
            "correct-count",
            format!(
                "multiple-choice '{name}' has {} correct options, expected 1",
                correct_ids.len()
            ),
        );
    }
    let item_order: Vec<String> = order.iter().map(|&i| options[i].0.clone()).collect();

    let class = if multiple { "pl-checkbox" } else { "pl-multiple-choice" };
    let input_type = if multiple { "checkbox" } else { "radio" };
    let mut slots: Vec<Option<(String, bool, Vec<Node>)>> = options.into_iter().map(Some).collect();
    let mut group = Element::new("div")
        .with_attr("class", class)
        .with_attr("data-answers-name", name.clone())
        .with_children(preamble);
    for &i in &order {
        let Some((id, _, content)) = slots[i].take() else {
            continue;
        };
        let input_id = format!("{name}-{id}");
        let input = Element::new("input")
            .with_attr("type", input_type)
            .with_attr("name", name.clone())
            .with_attr("value", id)
            .with_attr("id", input_id.clone());
        let label = Element::new("label")
            .with_attr("for", input_id)
            .with_children(content);
        let option = Element::new("div")
            .with_attr("class", format!("{class}-option"))
            .with_child(input.into_node())
            .with_child(label.into_node());
        group = group.with_child(option.into_node());
    }

    Ok(RenderResult {
        nodes: vec![group.into_node()],
        answer: Some(AnswerRecord {
            name,
            correct_answers: CorrectAnswers::Choices(correct_ids),
            item_order: Some(item_order),
            sigfigs: None,
        }),
    })
}

// ------------------------------------------------------------------
// Structural tags
// ------------------------------------------------------------------

/// Hoist the children of a wrapper tag.
pub fn unwrap(el: Element) -> RenderResult {
    RenderResult::nodes(el.children)
}

/// Unwrap a question panel, including a lone attribute-less `div`/`span`
/// wrapping all of its content.
pub fn render_question_panel(el: Element) -> RenderResult {
    let mut significant = el.children.iter().filter(|n| !n.is_whitespace());
    let lone_wrapper = match (significant.next(), significant.next()) {
        (Some(Node::Element(inner)), None) => {
            matches!(inner.name.as_str(), "div" | "span") && inner.attrs.is_empty()
        }
        _ => false,
    };
    if !lone_wrapper {
        return unwrap(el);
    }
    let nodes = el
        .children
        .into_iter()
        .filter(|n| !n.is_whitespace())
        .flat_map(|n| match n {
            Node::Element(inner) => inner.children,
            other => vec![other],
        })
        .collect();
    RenderResult::nodes(nodes)
}

/// `pl-text` keeps only its `name` as a marker span; unnamed text unwraps.
pub fn render_text(el: Element) -> RenderResult {
    let props = TextProps::from_element(&el);
    match props.name {
        Some(name) => RenderResult::nodes(vec![
            Element::new("span")
                .with_attr("name", name)
                .with_children(el.children)
                .into_node(),
        ]),
        None => unwrap(el),
    }
}

fn is_absolute_url(file: &str) -> bool {
    file.starts_with('/')
        || file.starts_with("http://")
        || file.starts_with("https://")
        || file.starts_with("data:")
}

pub fn render_figure(el: &Element, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
    let props = FigureProps::from_element(el)?;
    let src = if is_absolute_url(&props.file_name) {
        props.file_name.clone()
    } else {
        let base = ctx
            .options
            .asset_base_url
            .as_deref()
            .unwrap_or("clientFilesQuestion")
            .trim_end_matches('/');
        format!("{base}/{}", props.file_name.trim_start_matches("./"))
    };
    let mut img = Element::new("img")
        .with_attr("class", "pl-figure")
        .with_attr("src", src)
        .with_attr("alt", props.alt.unwrap_or_default());
    if let Some(width) = props.width {
        img = img.with_attr("width", width);
    }
    Ok(RenderResult::nodes(vec![img.into_node()]))
}
