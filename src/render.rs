//! Frame to styled text.
//!
//! Rendering is pure: it reads a storyboard frame and produces [`Line`]s
//! tagged with a [`Tone`]. The CLI prints them plainly; the player maps
//! tones to terminal colors.

use crate::code_view::Listing;
use crate::schema::{ArrayElement, Frame, Storyboard, VariablesElement, VisualElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Title,
    Heading,
    Narration,
    Muted,
    Highlight,
    Changed,
    Key,
    Value,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self::default().push(text, tone)
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn push(mut self, text: impl Into<String>, tone: Tone) -> Self {
        self.spans.push(Span {
            text: text.into(),
            tone,
        });
        self
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

pub const NO_FRAME: &str = "No animation frame to display. Generate an animation first.";
pub const NOTHING_TO_SHOW: &str = "No visual elements or code for this step.";
pub const EMPTY_ARRAY: &str = "Array is empty";
pub const NO_VARIABLES: &str = "No variables to display for this step.";

/// "Frame: i / n" with a 1-based position.
pub fn frame_counter(position: usize, total: usize) -> String {
    format!("Frame: {position} / {total}")
}

/// The stage for one frame: narration, code listing, then each visual
/// element in order.
pub fn render_frame(storyboard: &Storyboard, frame: Option<&Frame>, show_comments: bool) -> Vec<Line> {
    let Some(frame) = frame else {
        return vec![Line::new(NO_FRAME, Tone::Muted)];
    };

    let mut lines = Vec::new();
    if !frame.narration.trim().is_empty() {
        lines.push(Line::new(frame.narration.trim(), Tone::Narration));
        lines.push(Line::blank());
    }

    let code = storyboard.code_for(frame);
    if code.is_some() {
        render_code(&mut lines, code, &frame.highlight_code_lines, show_comments);
    }

    for element in &frame.visual_elements {
        if !lines.is_empty() && lines.last() != Some(&Line::blank()) {
            lines.push(Line::blank());
        }
        match element {
            VisualElement::Array(array) => render_array(&mut lines, array),
            VisualElement::Variables(variables) => render_variables(&mut lines, variables),
            VisualElement::Unknown => {
                lines.push(Line::new("(unsupported visual element)", Tone::Muted));
            }
        }
    }

    if code.is_none() && frame.visual_elements.is_empty() {
        lines.push(Line::new(NOTHING_TO_SHOW, Tone::Muted));
    }
    lines
}

pub fn render_code(lines: &mut Vec<Line>, code: Option<&str>, highlights: &[u32], show_comments: bool) {
    let header = if show_comments {
        "Code Context:"
    } else {
        "Code Context (comments hidden):"
    };
    lines.push(Line::new(header, Tone::Heading));

    let listing = Listing::build(code, highlights, show_comments);
    if let Some(placeholder) = listing.placeholder() {
        lines.push(Line::new(format!("{:>4}  ", ""), Tone::Muted).push(placeholder, Tone::Muted));
        return;
    }
    if let Listing::Lines(code_lines) = listing {
        for code_line in code_lines {
            let (marker, tone) = if code_line.highlighted {
                ('>', Tone::Highlight)
            } else {
                (' ', Tone::Plain)
            };
            lines.push(
                Line::new(format!("{:>4}{marker} ", code_line.number), Tone::Muted)
                    .push(code_line.text, tone),
            );
        }
    }
}

/// Array snapshot as three rows: values, indices and markers (`^`
/// highlighted, `*` changed). The marker row is omitted when unused.
pub fn render_array(lines: &mut Vec<Line>, array: &ArrayElement) {
    lines.push(Line::new(format!("{}:", array.name), Tone::Heading));
    if array.values.is_empty() {
        lines.push(Line::new(format!("  {EMPTY_ARRAY}"), Tone::Muted));
        return;
    }

    let cells: Vec<String> = array.values.iter().map(ToString::to_string).collect();
    let width = cells
        .iter()
        .enumerate()
        .map(|(index, cell)| cell.chars().count().max(index.to_string().len()))
        .max()
        .unwrap_or(1);

    let mut values = Line::new("  ", Tone::Plain);
    let mut indices = Line::new("  ", Tone::Plain);
    let mut markers = Line::new("  ", Tone::Plain);
    let mut any_marker = false;

    for (index, cell) in cells.iter().enumerate() {
        let highlighted = array.is_highlighted(index);
        let changed = array.is_changed(index);
        let tone = match (highlighted, changed) {
            (true, _) => Tone::Highlight,
            (false, true) => Tone::Changed,
            _ => Tone::Value,
        };
        let marker = match (highlighted, changed) {
            (true, true) => "^*",
            (true, false) => "^",
            (false, true) => "*",
            (false, false) => "",
        };
        any_marker |= !marker.is_empty();

        values = values.push(format!("[{cell:^width$}] "), tone);
        indices = indices.push(format!(" {index:^width$}  "), Tone::Muted);
        markers = markers.push(format!(" {marker:^width$}  "), tone);
    }

    lines.push(values);
    lines.push(indices);
    if any_marker {
        lines.push(markers);
    }
}

pub fn render_variables(lines: &mut Vec<Line>, variables: &VariablesElement) {
    lines.push(Line::new("Variables:", Tone::Heading));
    if variables.data.is_empty() {
        lines.push(Line::new(format!("  {NO_VARIABLES}"), Tone::Muted));
        return;
    }
    for (name, value) in &variables.data {
        lines.push(
            Line::new(format!("  {name}: "), Tone::Key).push(value.to_string(), Tone::Value),
        );
    }
}

/// One frame as plain text under a `== Frame: i / n ==` header.
pub fn render_frame_text(storyboard: &Storyboard, index: usize, show_comments: bool) -> String {
    let mut out = format!(
        "== {} ==\n",
        frame_counter(index + 1, storyboard.frame_count())
    );
    for line in render_frame(storyboard, storyboard.frame(index), show_comments) {
        out.push_str(line.text().trim_end());
        out.push('\n');
    }
    out
}

/// Every frame of `storyboard` as plain text, for non-interactive output.
pub fn render_storyboard_text(storyboard: &Storyboard, show_comments: bool) -> String {
    let mut out = format!("{}\n", storyboard.display_title());
    if storyboard.frames.is_empty() {
        out.push_str("(storyboard has no frames)\n");
        return out;
    }
    for index in 0..storyboard.frame_count() {
        out.push('\n');
        out.push_str(&render_frame_text(storyboard, index, show_comments));
    }
    out
}
