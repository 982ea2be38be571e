//! Line-oriented section extraction over a decoded advisory body.
//!
//! Each vendor describes its layout with a [`SectionMarkers`] value; a single
//! [`LineExtractor`] walks the body with an explicit [`ExtractionState`] and a pure
//! transition function, so every vendor shares the same engine.

pub mod affected_products;

use crate::error::PipelineError;
use crate::vendor::patterns::{Field, Fields};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    ScanningHeaders,
    /// `in_block` is set once a block-opening marker (e.g. `Package :`) was seen
    /// and the extractor waits for the blank line that closes it.
    AwaitingSectionStart { in_block: bool },
    CollectingShortDesc { collected: usize },
    CollectingFullText,
    Done,
}

impl ExtractionState {
    /// True once the advisory content proper has been located.
    pub fn reached_content(&self) -> bool {
        matches!(
            self,
            ExtractionState::CollectingShortDesc { .. }
                | ExtractionState::CollectingFullText
                | ExtractionState::Done
        )
    }
}

/// Which accumulators receive the line that caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Effect {
    pub full_text: bool,
    pub short_desc: bool,
}

impl Effect {
    const NONE: Effect = Effect {
        full_text: false,
        short_desc: false,
    };
    const FULL: Effect = Effect {
        full_text: true,
        short_desc: false,
    };
    const BOTH: Effect = Effect {
        full_text: true,
        short_desc: true,
    };
}

/// How the extractor leaves `ScanningHeaders`.
#[derive(Debug, Clone)]
pub enum ContentStart {
    /// The body has no header block; start directly in `AwaitingSectionStart`.
    Immediate,
    /// First blank line ends a raw header block.
    BlankLine,
    /// A marker line (itself skipped), e.g. the PGP `Hash:` line of a signed body.
    Marker(Regex),
}

/// Whether lines seen while awaiting the section start belong to the full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullTextFrom {
    ContentStart,
    SectionStart,
}

#[derive(Debug, Clone)]
pub enum ShortDescStart {
    /// Marker line (kept in the full text, not in the description).
    Marker(Regex),
    /// A block-opening line; collection starts at the first blank line after the block.
    AfterBlock(Regex),
    /// The first non-blank line is itself the first description line.
    FirstNonBlank,
}

/// Copies a value from a body line into the record fields.
#[derive(Debug, Clone)]
pub struct FieldCapture {
    pub pattern: Regex,
    pub field: Field,
    pub prefix: &'static str,
    /// Only fill the field while it is still empty.
    pub only_if_empty: bool,
}

impl FieldCapture {
    pub fn apply(&self, line: &str, fields: &mut Fields) {
        if self.only_if_empty && fields.get(&self.field).is_some_and(|v| !v.is_empty()) {
            return;
        }
        if let Some(value) = self.pattern.captures(line).and_then(|caps| caps.get(1)) {
            let value = value.as_str().replace('\r', "");
            fields.insert(self.field, format!("{}{}", self.prefix, value.trim()));
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionMarkers {
    /// Human name of the section, used in `SectionNotFound`.
    pub section_name: &'static str,
    pub content_start: ContentStart,
    pub full_text_from: FullTextFrom,
    pub short_desc_start: ShortDescStart,
    /// Ends description collection early (the line stays in the full text).
    pub short_desc_end: Option<Regex>,
    /// Ends the advisory once the full text is being collected (line excluded).
    pub end_marker: Option<Regex>,
    pub short_desc_limit: usize,
    pub captures: Vec<FieldCapture>,
}

/// Result of running an extractor over a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub short_desc_lines: Vec<String>,
    pub full_text: String,
    pub fields: Fields,
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

pub struct LineExtractor<'a> {
    markers: &'a SectionMarkers,
}

impl<'a> LineExtractor<'a> {
    pub fn new(markers: &'a SectionMarkers) -> Self {
        Self { markers }
    }

    pub fn initial_state(&self) -> ExtractionState {
        match self.markers.content_start {
            ContentStart::Immediate => ExtractionState::AwaitingSectionStart { in_block: false },
            _ => ExtractionState::ScanningHeaders,
        }
    }

    /// Pure transition: `(state, line) -> (next state, effects)`.
    pub fn step(&self, state: ExtractionState, line: &str) -> (ExtractionState, Effect) {
        let m = self.markers;
        match state {
            ExtractionState::ScanningHeaders => {
                let leaves = match &m.content_start {
                    ContentStart::Immediate => true,
                    ContentStart::BlankLine => is_blank(line),
                    ContentStart::Marker(re) => re.is_match(line),
                };
                if leaves {
                    (
                        ExtractionState::AwaitingSectionStart { in_block: false },
                        Effect::NONE,
                    )
                } else {
                    (state, Effect::NONE)
                }
            }
            ExtractionState::AwaitingSectionStart { in_block } => {
                let waiting = if m.full_text_from == FullTextFrom::ContentStart {
                    Effect::FULL
                } else {
                    Effect::NONE
                };
                match &m.short_desc_start {
                    ShortDescStart::Marker(re) if re.is_match(line) => (
                        ExtractionState::CollectingShortDesc { collected: 0 },
                        Effect::FULL,
                    ),
                    ShortDescStart::Marker(_) => (state, waiting),
                    ShortDescStart::AfterBlock(re) => {
                        if !in_block && re.is_match(line) {
                            (
                                ExtractionState::AwaitingSectionStart { in_block: true },
                                waiting,
                            )
                        } else if in_block && is_blank(line) {
                            (
                                ExtractionState::CollectingShortDesc { collected: 0 },
                                Effect::FULL,
                            )
                        } else {
                            (state, waiting)
                        }
                    }
                    ShortDescStart::FirstNonBlank if !is_blank(line) => self.collect(0),
                    ShortDescStart::FirstNonBlank => (state, waiting),
                }
            }
            ExtractionState::CollectingShortDesc { collected } => {
                if m.short_desc_end.as_ref().is_some_and(|re| re.is_match(line)) {
                    (ExtractionState::CollectingFullText, Effect::FULL)
                } else if is_blank(line) {
                    (state, Effect::FULL)
                } else {
                    self.collect(collected)
                }
            }
            ExtractionState::CollectingFullText => {
                if m.end_marker.as_ref().is_some_and(|re| re.is_match(line)) {
                    (ExtractionState::Done, Effect::NONE)
                } else {
                    (state, Effect::FULL)
                }
            }
            ExtractionState::Done => (state, Effect::NONE),
        }
    }

    fn collect(&self, collected: usize) -> (ExtractionState, Effect) {
        let collected = collected + 1;
        if collected >= self.markers.short_desc_limit {
            (ExtractionState::CollectingFullText, Effect::BOTH)
        } else {
            (ExtractionState::CollectingShortDesc { collected }, Effect::BOTH)
        }
    }

    pub fn extract(&self, body: &str) -> Result<Sections, PipelineError> {
        let mut state = self.initial_state();
        let mut sections = Sections::default();

        for line in body.lines() {
            let (next, effect) = self.step(state, line);
            if effect.full_text {
                sections.full_text.push_str(line);
                sections.full_text.push('\n');
                for capture in &self.markers.captures {
                    capture.apply(line, &mut sections.fields);
                }
            }
            if effect.short_desc {
                sections.short_desc_lines.push(line.trim().to_string());
            }
            state = next;
            if state == ExtractionState::Done {
                break;
            }
        }

        if !state.reached_content() {
            log::debug!(
                "Extractor finished in {:?} without finding the {} section",
                state,
                self.markers.section_name
            );
            return Err(PipelineError::SectionNotFound {
                section: self.markers.section_name.to_string(),
            });
        }

        log::debug!(
            "Extracted {} description lines and {} bytes of advisory text",
            sections.short_desc_lines.len(),
            sections.full_text.len()
        );
        Ok(sections)
    }
}
