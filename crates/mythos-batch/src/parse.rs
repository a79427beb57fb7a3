//! Batch text parsing.

use mythos_shared::constants::{HEADER_CULTURE_LABELS, HEADER_PROMPT_LABELS};

/// One prompt line, with the culture prefix split off when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// `None` means the batch default culture applies.
    pub culture: Option<String>,
    pub prompt: String,
}

/// Split a multi-line submission into prompt lines.
///
/// Blank lines are dropped, and the first line is dropped when it is a
/// `culture;prompt` header in any supported language.
pub fn parse_batch(text: &str) -> Vec<ParsedLine> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    if lines.peek().is_some_and(|first| is_header(first)) {
        lines.next();
    }

    lines.map(parse_line).collect()
}

/// Parse `culture;prompt` (or `culture<TAB>prompt`). Without a separator,
/// or when either side is empty, the whole line is the prompt.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if let Some((culture, prompt)) = split_once_separator(line) {
        let (culture, prompt) = (culture.trim(), prompt.trim());
        if !culture.is_empty() && !prompt.is_empty() {
            return ParsedLine {
                culture: Some(culture.to_string()),
                prompt: prompt.to_string(),
            };
        }
    }
    ParsedLine {
        culture: None,
        prompt: line.to_string(),
    }
}

fn split_once_separator(line: &str) -> Option<(&str, &str)> {
    let at = line.find([';', '\t'])?;
    Some((&line[..at], &line[at + 1..]))
}

fn is_header(line: &str) -> bool {
    let Some((left, right)) = split_once_separator(line) else {
        return false;
    };
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    HEADER_CULTURE_LABELS.contains(&left.as_str()) && HEADER_PROMPT_LABELS.contains(&right.as_str())
}
