//! Display rendering for message bodies.
//!
//! The pipeline is fixed: escape HTML, turn newlines into `<br />`, then wrap
//! at [`WRAP_WIDTH`] columns and terminate every wrapped line with `<br />`.
//! Wrapping runs on the already-escaped text, so entities and the inserted
//! `<br />` markers count towards the width and may be split across lines.

use std::borrow::Cow;

/// Column width used when wrapping rendered content
pub const WRAP_WIDTH: usize = 65;

/// Line-break marker used in rendered output
pub const LINE_BREAK: &str = "<br />";

const TAB_SIZE: usize = 8;

/// Run the full rendering pipeline over assembled body text.
pub fn render_body(text: &str) -> String {
    let escaped = escape_html(text);
    let with_breaks = newlines_to_breaks(&escaped);

    let mut output = String::with_capacity(with_breaks.len() + with_breaks.len() / WRAP_WIDTH * 8);
    for line in wrap(&with_breaks, WRAP_WIDTH) {
        output.push_str(&line);
        output.push_str(LINE_BREAK);
    }
    output
}

/// Escape the characters that are significant in HTML.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Replace `\r\n` and `\n` line endings with `<br />`.
pub fn newlines_to_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', LINE_BREAK)
}

/// Greedy word wrap.
///
/// Lines break between whitespace runs and after the hyphens that
/// [`split_chunks`] treats as break points. Every ASCII whitespace character
/// counts as a single space after tab expansion. Words longer than `width` are
/// split, filling the remainder of the current line first and cutting just
/// after the last hyphen that fits, if any. Whitespace is dropped at the start of every
/// line except the first, and a trailing whitespace chunk is dropped from each
/// line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let normalized: Vec<char> = normalize_whitespace(text).chars().collect();

    // Chunks are kept reversed so the next one is always at the end.
    let mut chunks = split_chunks(&normalized);
    chunks.reverse();

    let mut lines: Vec<String> = Vec::new();
    while !chunks.is_empty() {
        let mut current: Vec<Vec<char>> = Vec::new();
        let mut current_len = 0;

        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.last() {
            if current_len + chunk.len() > width {
                break;
            }
            current_len += chunk.len();
            if let Some(chunk) = chunks.pop() {
                current.push(chunk);
            }
        }

        if let Some(chunk) = chunks.last_mut() {
            if chunk.len() > width {
                let end = long_word_cut(chunk, width - current_len);
                let rest = chunk.split_off(end);
                current.push(std::mem::replace(chunk, rest));
            }
        }

        // A cut at zero leaves an empty piece here; only that piece is dropped.
        if current.last().is_some_and(|c| is_blank(c)) {
            current.pop();
        }

        if !current.is_empty() {
            lines.push(current.into_iter().flatten().collect());
        }
    }

    lines
}

/// Where to cut an over-long chunk given `space_left` columns: just after the
/// last hyphen that fits, unless only hyphens precede it.
fn long_word_cut(chunk: &[char], space_left: usize) -> usize {
    let fits = &chunk[..space_left.min(chunk.len())];
    match fits.iter().rposition(|c| *c == '-') {
        Some(hyphen) if hyphen > 0 && chunk[..hyphen].iter().any(|c| *c != '-') => hyphen + 1,
        _ => space_left,
    }
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|c| c.is_whitespace())
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_letter(c: char) -> bool {
    is_word(c) && !c.is_numeric()
}

fn is_word_punct(c: char) -> bool {
    is_word(c) || matches!(c, '!' | '"' | '\'' | '&' | '.' | ',' | '?')
}

/// Expand tabs and map the other ASCII whitespace characters to a space.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            '\x0b' | '\x0c' => {
                out.push(' ');
                column += 1;
            }
            c => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Split into the units the wrapper places whole.
///
/// A chunk is one of:
/// - a run of spaces
/// - an em-dash (two or more hyphens between a word and a word character)
/// - a word, ending at a space, before an em-dash, or just after a hyphen
///   joining two letters to a letter (`well-known` gives `well-`, `known`)
fn split_chunks(text: &[char]) -> Vec<Vec<char>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let end = chunk_end(text, start);
        chunks.push(text[start..end].to_vec());
        start = end;
    }
    chunks
}

fn chunk_end(text: &[char], start: usize) -> usize {
    if text[start] == ' ' {
        return start + run_len(text, start, ' ');
    }
    if em_dash_at(text, start) {
        return start + run_len(text, start, '-');
    }

    let mut end = start + 1;
    loop {
        match text.get(end).copied() {
            None | Some(' ') => return end,
            Some('-') if hyphen_breaks(text, end) => return end + 1,
            _ if em_dash_at(text, end) => return end,
            _ => end += 1,
        }
    }
}

fn run_len(text: &[char], start: usize, ch: char) -> usize {
    text[start..].iter().take_while(|c| **c == ch).count()
}

fn em_dash_at(text: &[char], at: usize) -> bool {
    if at == 0 || !is_word_punct(text[at - 1]) {
        return false;
    }
    let run = run_len(text, at, '-');
    run >= 2 && text.get(at + run).is_some_and(|c| is_word(*c))
}

/// Whether the hyphen at `at` ends a chunk: it follows two letters (or a
/// single letter after another such hyphen) and precedes a letter pair.
fn hyphen_breaks(text: &[char], at: usize) -> bool {
    let letter = |i: usize| text.get(i).is_some_and(|c| is_letter(*c));
    let behind = (at >= 2 && letter(at - 1) && letter(at - 2))
        || (at >= 3 && letter(at - 1) && text[at - 2] == '-' && letter(at - 3));
    let ahead = letter(at + 1)
        && (letter(at + 2) || (text.get(at + 2) == Some(&'-') && letter(at + 3)));
    behind && ahead
}
