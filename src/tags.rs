//! The closed set of custom tags and their attribute transforms.
//!
//! [`Tag::from_name`] resolves an element name to a known tag; anything else
//! is [`Tag::Passthrough`] and is left in the document untouched. Each tag
//! with attributes has a typed property record built by `from_element`.

use crate::error::RenderError;
use crate::markup::Element;
use crate::types::{HintLevel, Precision};

/// Every custom tag the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    MatrixInput,
    MatrixLatex,
    ComputedNumberInput,
    NumberInput,
    SymbolicInput,
    Quest,
    QuestPrompt,
    AdaptiveMultipleChoice,
    AdaptiveCheckbox,
    QuestionPanel,
    Hint,
    SolutionHint,
    Text,
    Figure,
    Checkbox,
    MultipleChoice,
    /// Option inside a checkbox or multiple-choice group.
    Answer,
    Passthrough,
}

impl Tag {
    /// All known tags, excluding [`Tag::Passthrough`].
    pub const KNOWN: [Tag; 17] = [
        Tag::MatrixInput,
        Tag::MatrixLatex,
        Tag::ComputedNumberInput,
        Tag::NumberInput,
        Tag::SymbolicInput,
        Tag::Quest,
        Tag::QuestPrompt,
        Tag::AdaptiveMultipleChoice,
        Tag::AdaptiveCheckbox,
        Tag::QuestionPanel,
        Tag::Hint,
        Tag::SolutionHint,
        Tag::Text,
        Tag::Figure,
        Tag::Checkbox,
        Tag::MultipleChoice,
        Tag::Answer,
    ];

    /// Resolve an element name. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Tag {
        match name.to_ascii_lowercase().as_str() {
            "pl-matrix-input" => Tag::MatrixInput,
            "pl-matrix-latex" => Tag::MatrixLatex,
            "pl-computed-number-input" => Tag::ComputedNumberInput,
            "pl-number-input" => Tag::NumberInput,
            "pl-symbolic-input" => Tag::SymbolicInput,
            "pl-quest" => Tag::Quest,
            "pl-quest-prompt" => Tag::QuestPrompt,
            "pl-adaptive-multiple-choice" => Tag::AdaptiveMultipleChoice,
            "pl-adaptive-checkbox" => Tag::AdaptiveCheckbox,
            "pl-question-panel" => Tag::QuestionPanel,
            "pl-hint" => Tag::Hint,
            "pl-solution-hint" => Tag::SolutionHint,
            "pl-text" => Tag::Text,
            "pl-figure" => Tag::Figure,
            "pl-checkbox" => Tag::Checkbox,
            "pl-multiple-choice" => Tag::MultipleChoice,
            "pl-answer" => Tag::Answer,
            _ => Tag::Passthrough,
        }
    }

    /// Element name of the tag; empty for [`Tag::Passthrough`].
    pub fn name(self) -> &'static str {
        match self {
            Tag::MatrixInput => "pl-matrix-input",
            Tag::MatrixLatex => "pl-matrix-latex",
            Tag::ComputedNumberInput => "pl-computed-number-input",
            Tag::NumberInput => "pl-number-input",
            Tag::SymbolicInput => "pl-symbolic-input",
            Tag::Quest => "pl-quest",
            Tag::QuestPrompt => "pl-quest-prompt",
            Tag::AdaptiveMultipleChoice => "pl-adaptive-multiple-choice",
            Tag::AdaptiveCheckbox => "pl-adaptive-checkbox",
            Tag::QuestionPanel => "pl-question-panel",
            Tag::Hint => "pl-hint",
            Tag::SolutionHint => "pl-solution-hint",
            Tag::Text => "pl-text",
            Tag::Figure => "pl-figure",
            Tag::Checkbox => "pl-checkbox",
            Tag::MultipleChoice => "pl-multiple-choice",
            Tag::Answer => "pl-answer",
            Tag::Passthrough => "",
        }
    }

    pub fn of(element: &Element) -> Tag {
        Tag::from_name(&element.name)
    }

    /// Tags whose rendering contributes an answer record.
    pub fn is_graded(self) -> bool {
        matches!(
            self,
            Tag::NumberInput
                | Tag::ComputedNumberInput
                | Tag::MatrixInput
                | Tag::Checkbox
                | Tag::MultipleChoice
        )
    }
}

// ------------------------------------------------------------------
// Attribute extraction helpers
// ------------------------------------------------------------------

fn attr_string(el: &Element, key: &str) -> Option<String> {
    el.attr(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `true`, `1`, `yes`, or a bare attribute.
fn attr_bool(el: &Element, key: &str) -> bool {
    el.attr(key).is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "" | "true" | "1" | "yes"
        )
    })
}

fn attr_u32(el: &Element, key: &'static str) -> Result<Option<u32>, RenderError> {
    match attr_string(el, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| RenderError::InvalidAttribute {
                attribute: key,
                value: raw,
                reason: "expected a non-negative integer".into(),
            }),
    }
}

fn answers_name(el: &Element) -> Option<String> {
    attr_string(el, "answers-name")
}

// ------------------------------------------------------------------
// Property records
// ------------------------------------------------------------------

/// How a number input is compared against its correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Sigfig,
    Decdig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberInputProps {
    pub answers_name: Option<String>,
    /// Literal correct answer; only fixed inputs carry one.
    pub correct_answer: Option<String>,
    pub comparison: Comparison,
    pub digits: Option<u32>,
    pub label: Option<String>,
    pub suffix: Option<String>,
    pub size: Option<u32>,
}

impl NumberInputProps {
    pub fn from_element(el: &Element) -> Result<Self, RenderError> {
        let comparison = match attr_string(el, "comparison").as_deref() {
            None | Some("sigfig") => Comparison::Sigfig,
            Some("decdig") => Comparison::Decdig,
            Some(other) => {
                return Err(RenderError::InvalidAttribute {
                    attribute: "comparison",
                    value: other.to_string(),
                    reason: "expected 'sigfig' or 'decdig'".into(),
                });
            }
        };
        Ok(Self {
            answers_name: answers_name(el),
            correct_answer: attr_string(el, "correct-answer"),
            comparison,
            digits: attr_u32(el, "digits")?,
            label: attr_string(el, "label"),
            suffix: attr_string(el, "suffix"),
            size: attr_u32(el, "size")?,
        })
    }

    /// Comparison precision declared on the tag, if any.
    pub fn precision(&self) -> Option<Precision> {
        self.digits.map(|d| match self.comparison {
            Comparison::Sigfig => Precision::Sigfigs(d),
            Comparison::Decdig => Precision::Decimals(d),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicInputProps {
    pub answers_name: Option<String>,
    pub label: Option<String>,
    pub variables: Vec<String>,
    pub size: Option<u32>,
}

impl SymbolicInputProps {
    pub fn from_element(el: &Element) -> Result<Self, RenderError> {
        let variables = attr_string(el, "variables")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            answers_name: answers_name(el),
            label: attr_string(el, "label"),
            variables,
            size: attr_u32(el, "size")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixInputProps {
    pub answers_name: Option<String>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub label: Option<String>,
}

impl MatrixInputProps {
    pub fn from_element(el: &Element) -> Result<Self, RenderError> {
        Ok(Self {
            answers_name: answers_name(el),
            rows: attr_u32(el, "rows")?,
            cols: attr_u32(el, "cols")?,
            label: attr_string(el, "label"),
        })
    }
}

/// LaTeX matrix environment used by `pl-matrix-latex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brackets {
    Square,
    Round,
    Bars,
}

impl Brackets {
    pub fn environment(self) -> &'static str {
        match self {
            Brackets::Square => "bmatrix",
            Brackets::Round => "pmatrix",
            Brackets::Bars => "vmatrix",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixLatexProps {
    /// Path under `params`.
    pub params_name: String,
    pub brackets: Brackets,
}

impl MatrixLatexProps {
    pub fn from_element(el: &Element) -> Result<Self, RenderError> {
        let params_name = attr_string(el, "params-name").ok_or(RenderError::MissingAttribute {
            attribute: "params-name",
        })?;
        let brackets = match attr_string(el, "brackets").as_deref() {
            None | Some("b") => Brackets::Square,
            Some("p") => Brackets::Round,
            Some("v") => Brackets::Bars,
            Some(other) => {
                return Err(RenderError::InvalidAttribute {
                    attribute: "brackets",
                    value: other.to_string(),
                    reason: "expected 'b', 'p' or 'v'".into(),
                });
            }
        };
        Ok(Self {
            params_name,
            brackets,
        })
    }
}

/// Shared by checkbox, multiple-choice and their adaptive wrappers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceGroupProps {
    pub answers_name: Option<String>,
    pub fixed_order: bool,
}

impl ChoiceGroupProps {
    pub fn from_element(el: &Element) -> Self {
        Self {
            answers_name: answers_name(el),
            fixed_order: attr_bool(el, "fixed-order"),
        }
    }
}

/// One `pl-answer` option.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerProps {
    pub name: Option<String>,
    /// Declared by `correct="true"` or stamped as `data-correct` by an
    /// adaptive wrapper.
    pub correct: bool,
}

impl AnswerProps {
    pub fn from_element(el: &Element) -> Self {
        Self {
            name: attr_string(el, "name"),
            correct: attr_bool(el, "correct") || attr_bool(el, "data-correct"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FigureProps {
    pub file_name: String,
    pub alt: Option<String>,
    pub width: Option<String>,
}

impl FigureProps {
    pub fn from_element(el: &Element) -> Result<Self, RenderError> {
        let file_name = attr_string(el, "file-name").ok_or(RenderError::MissingAttribute {
            attribute: "file-name",
        })?;
        Ok(Self {
            file_name,
            alt: attr_string(el, "alt"),
            width: attr_string(el, "width"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HintProps {
    pub level: Option<HintLevel>,
}

impl HintProps {
    pub fn from_element(el: &Element) -> Self {
        Self {
            level: attr_string(el, "level").map(|l| HintLevel::parse(&l)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextProps {
    pub name: Option<String>,
}

impl TextProps {
    pub fn from_element(el: &Element) -> Self {
        Self {
            name: attr_string(el, "name"),
        }
    }
}
