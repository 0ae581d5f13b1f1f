/// One source line with its original 1-based number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    pub number: u32,
    pub text: String,
    pub highlighted: bool,
}

/// What the code panel shows for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Lines(Vec<CodeLine>),
    /// Comment hiding removed every line.
    AllHidden,
    Empty,
}

impl Listing {
    /// Builds the listing from raw code text. Lines are recomputed from the
    /// text on every call; hidden comment lines keep their numbering gap.
    pub fn build(code: Option<&str>, highlights: &[u32], show_comments: bool) -> Self {
        let lines = split_lines(code.unwrap_or_default());
        if lines.is_empty() {
            return Self::Empty;
        }

        let visible: Vec<CodeLine> = lines
            .into_iter()
            .filter(|line| show_comments || !is_comment(&line.text))
            .map(|mut line| {
                line.highlighted = highlights.contains(&line.number);
                line
            })
            .collect();

        if visible.is_empty() {
            Self::AllHidden
        } else {
            Self::Lines(visible)
        }
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Lines(_) => None,
            Self::AllHidden => Some("(All lines are hidden comments)"),
            Self::Empty => Some("(No code to display)"),
        }
    }
}

/// Splits code into numbered lines. Models often send literal `\n`
/// sequences, so those become line breaks too. Empty text has no lines.
pub fn split_lines(code: &str) -> Vec<CodeLine> {
    if code.is_empty() {
        return Vec::new();
    }
    let normalized = code.replace("\\n", "\n");
    normalized
        .split('\n')
        .enumerate()
        .map(|(index, text)| CodeLine {
            number: index as u32 + 1,
            text: text.trim_end_matches('\r').to_owned(),
            highlighted: false,
        })
        .collect()
}

/// Single-line comments (`//`, `#`) and self-contained `/* ... */` lines.
pub fn is_comment(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || (trimmed.starts_with("/*") && trimmed.ends_with("*/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "fn main() {\\n    // setup\\n    let x = 1; /* inline */\\n    /* block */\\n    # not rust\\n}";

    fn numbers(listing: &Listing) -> Vec<u32> {
        match listing {
            Listing::Lines(lines) => lines.iter().map(|line| line.number).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn escaped_newlines_become_lines() {
        let lines = split_lines(CODE);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].text, "fn main() {");
        assert_eq!(lines[5].number, 6);
    }

    #[test]
    fn hiding_comments_keeps_original_numbers() {
        let listing = Listing::build(Some(CODE), &[3], false);
        assert_eq!(numbers(&listing), vec![1, 3, 6]);
        let Listing::Lines(lines) = listing else {
            panic!("expected lines");
        };
        assert!(lines[1].highlighted);
        assert!(!lines[0].highlighted);
    }

    #[test]
    fn toggling_twice_restores_the_listing() {
        let shown = Listing::build(Some(CODE), &[2], true);
        let hidden = Listing::build(Some(CODE), &[2], false);
        assert_ne!(shown, hidden);
        assert_eq!(Listing::build(Some(CODE), &[2], true), shown);
        assert_eq!(numbers(&shown), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn comment_detection_follows_trimmed_text() {
        assert!(is_comment("   // note"));
        assert!(is_comment("#include <stdio.h>"));
        assert!(is_comment("/* whole */"));
        assert!(!is_comment("/* opens only"));
        assert!(!is_comment("x = 1 // trailing"));
        assert!(!is_comment("*/"));
    }

    #[test]
    fn placeholders_for_hidden_and_missing_code() {
        let hidden = Listing::build(Some("// a\\n# b"), &[], false);
        assert_eq!(hidden.placeholder(), Some("(All lines are hidden comments)"));
        assert_eq!(Listing::build(None, &[], true).placeholder(), Some("(No code to display)"));
        assert_eq!(Listing::build(Some(""), &[], false), Listing::Empty);
    }

    #[test]
    fn highlight_for_missing_line_is_ignored() {
        let listing = Listing::build(Some("a\nb"), &[7], true);
        let Listing::Lines(lines) = listing else {
            panic!("expected lines");
        };
        assert!(lines.iter().all(|line| !line.highlighted));
    }
}
