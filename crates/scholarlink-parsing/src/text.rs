//! Paragraph and sentence helpers shared by the citation and equation scanners.
//!
//! Offsets handed out to callers are measured in characters; byte offsets
//! stay internal.

use once_cell::sync::Lazy;
use regex::Regex;

/// One or more blank lines.
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").unwrap());

/// End of a sentence: terminal punctuation followed by whitespace.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

/// A blank-line-delimited block of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paragraph<'a> {
    /// 0-based index among non-empty paragraphs.
    pub index: usize,
    /// Byte offset of the paragraph in the full text.
    pub start: usize,
    pub text: &'a str,
}

impl Paragraph<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn contains(&self, byte: usize) -> bool {
        byte >= self.start && byte < self.end()
    }
}

/// Split `text` into paragraphs. Runs of blank lines count as a single
/// separator; whitespace-only blocks are not paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<Paragraph<'_>> {
    fn push<'a>(paragraphs: &mut Vec<Paragraph<'a>>, text: &'a str, start: usize, end: usize) {
        let block = &text[start..end];
        if !block.trim().is_empty() {
            paragraphs.push(Paragraph {
                index: paragraphs.len(),
                start,
                text: block,
            });
        }
    }

    let mut paragraphs = Vec::new();
    let mut cursor = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        push(&mut paragraphs, text, cursor, m.start());
        cursor = m.end();
    }
    push(&mut paragraphs, text, cursor, text.len());
    paragraphs
}

/// Index of the paragraph containing byte offset `byte`, if any.
pub fn paragraph_at(paragraphs: &[Paragraph<'_>], byte: usize) -> Option<usize> {
    paragraphs.iter().position(|p| p.contains(byte))
}

/// Number of characters in `text[..byte]`.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// The last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &text[i..],
        None => text,
    }
}

/// The first `n` characters of `text`.
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// `window` characters on each side of `text[start..end]`, clipped to `text`.
///
/// The result is a verbatim slice: partial words at either edge are kept.
pub fn context_window(text: &str, start: usize, end: usize, window: usize) -> &str {
    let before = tail_chars(&text[..start], window);
    let after = head_chars(&text[end..], window);
    let from = start - before.len();
    let to = end + after.len();
    &text[from..to]
}

/// Byte ranges of the sentences in `text`, trailing whitespace excluded.
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        if !text[cursor..end].trim().is_empty() {
            spans.push((cursor, end));
        }
        cursor = m.end();
    }
    if !text[cursor..].trim().is_empty() {
        spans.push((cursor, text.trim_end().len()));
    }
    spans
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_paragraphs() {
        let text = "First para\nstill first.\n\n\n  \nSecond.\n\nThird.";
        let paras = split_paragraphs(text);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].text, "First para\nstill first.");
        assert_eq!(paras[1].text, "Second.");
        assert_eq!(paras[1].index, 1);
        assert_eq!(&text[paras[2].start..paras[2].end()], "Third.");
    }

    #[test]
    fn test_leading_blank_lines_are_not_paragraphs() {
        let paras = split_paragraphs("\n\nOnly one.\n\n");
        assert_eq!(paras.len(), 1);
        assert_eq!(paras[0].index, 0);
        assert_eq!(paras[0].text, "Only one.");
    }

    #[test]
    fn test_crlf_paragraphs() {
        let paras = split_paragraphs("One.\r\n\r\nTwo.");
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[1].text, "Two.");
    }

    #[test]
    fn test_paragraph_at() {
        let text = "aaa\n\nbbb";
        let paras = split_paragraphs(text);
        assert_eq!(paragraph_at(&paras, 1), Some(0));
        assert_eq!(paragraph_at(&paras, 6), Some(1));
        assert_eq!(paragraph_at(&paras, 4), None);
    }

    #[test]
    fn test_char_helpers_are_utf8_safe() {
        let text = "naïve café";
        assert_eq!(tail_chars(text, 4), "café");
        assert_eq!(head_chars(text, 3), "naï");
        assert_eq!(tail_chars(text, 100), text);
        assert_eq!(head_chars(text, 0), "");
        assert_eq!(char_offset(text, text.find('c').unwrap()), 6);
    }

    #[test]
    fn test_context_window_is_verbatim() {
        let text = "alpha beta [1] gamma delta";
        let start = text.find('[').unwrap();
        let end = start + 3;
        assert_eq!(context_window(text, start, end, 4), "eta [1] gam");
        assert_eq!(context_window(text, start, end, 100), text);
    }

    #[test]
    fn test_sentence_spans() {
        let text = "One here. Two there!  Three?";
        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(sentences, vec!["One here.", "Two there!", "Three?"]);
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n b\t c "), "a b c");
    }
}
