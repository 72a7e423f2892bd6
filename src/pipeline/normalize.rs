//! Text normalisation: noisy OCR text → ordered numeric tokens.
//!
//! Tesseract reads the result page line by line. Besides the numbers we
//! want, its output carries the app's title bar, field labels, units
//! ("kg", "%", "kcal"), stray punctuation and the occasional misread
//! separator. This module strips all of that with seven deterministic rules
//! and leaves one token per printed value, in printed order.
//!
//! ## Rule Order
//!
//! The rules are order-dependent. Header lines must go before the
//! numeric-line filter, because the title can contain digits (clock, page
//! numbers). The `1b` artifact must go before the digit filter, otherwise
//! its `1` would survive and fuse with the neighbouring number.
//!
//! No length check happens here: a short or long token list is the field
//! mapper's problem.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered numeric-string tokens extracted from one screenshot.
pub type TokenSequence = Vec<String>;

/// Misrecognition codes removed before digit filtering.
pub const ARTIFACT_CODES: &[&str] = &["1b"];

/// Number of title/subtitle lines at the top of the OCR text.
pub const HEADER_LINES: usize = 2;

/// Apply all normalisation rules to raw OCR text.
///
/// Rules (applied in order):
/// 1. Drop the two header lines
/// 2. Drop lines without a digit; terminate survivors with CRLF
/// 3. Replace OCR artifact codes (`1b`) with a space
/// 4. Replace every character other than `0-9` and `.` with a space
/// 5. Collapse whitespace runs to a single space
/// 6. Split on whitespace
/// 7. Strip one trailing period from each token
pub fn normalize(raw: &str) -> TokenSequence {
    tokenize(&drop_header_lines(raw))
}

/// Rules 2–7: everything after the header drop.
///
/// Applying this to the space-joined output of [`normalize`] returns the
/// same tokens.
pub fn tokenize(body: &str) -> TokenSequence {
    let s = drop_non_numeric_lines(body);
    let s = strip_artifact_codes(&s);
    let s = keep_digits_and_dots(&s);
    let s = collapse_whitespace(&s);
    split_tokens(&s)
        .into_iter()
        .map(|t| strip_trailing_period(&t).to_string())
        .collect()
}

// ── Line splitting ───────────────────────────────────────────────────────────

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{1C}'
            | '\u{1D}'
            | '\u{1E}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split into lines, each keeping its terminator.
///
/// `\r\n` counts as one terminator. The form feed tesseract appends after
/// each page is a terminator too, so it closes a line of its own.
fn split_lines_inclusive(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                end = j + 1;
                chars.next();
            }
        }
        lines.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn trim_line_break(line: &str) -> &str {
    line.trim_end_matches(is_line_break)
}

// ── Rule 1: Drop header lines ────────────────────────────────────────────────

/// Remove the title and subtitle lines. Two or fewer lines → empty string.
pub fn drop_header_lines(text: &str) -> String {
    let lines = split_lines_inclusive(text);
    if lines.len() > HEADER_LINES {
        lines[HEADER_LINES..].concat()
    } else {
        String::new()
    }
}

// ── Rule 2: Drop non-numeric lines ───────────────────────────────────────────

static RE_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

/// Keep only lines containing a digit, each terminated with `\r\n`.
pub fn drop_non_numeric_lines(text: &str) -> String {
    split_lines_inclusive(text)
        .into_iter()
        .map(trim_line_break)
        .filter(|line| RE_DIGIT.is_match(line))
        .fold(String::with_capacity(text.len()), |mut acc, line| {
            acc.push_str(line);
            acc.push_str("\r\n");
            acc
        })
}

// ── Rule 3: Strip OCR artifact codes ─────────────────────────────────────────

pub fn strip_artifact_codes(text: &str) -> String {
    ARTIFACT_CODES
        .iter()
        .fold(text.to_string(), |acc, code| acc.replace(code, " "))
}

// ── Rule 4: Keep digits and dots ─────────────────────────────────────────────

static RE_NOT_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").unwrap());

pub fn keep_digits_and_dots(text: &str) -> String {
    RE_NOT_NUMERIC.replace_all(text, " ").into_owned()
}

// ── Rule 5: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").into_owned()
}

// ── Rule 6: Tokenize ─────────────────────────────────────────────────────────

pub fn split_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

// ── Rule 7: Strip trailing period ────────────────────────────────────────────

/// OCR sometimes attaches a stray decimal point to the last value on a line.
pub fn strip_trailing_period(token: &str) -> &str {
    token.strip_suffix('.').unwrap_or(token)
}

// ── Tests ────────────────────────────────────────────────────────────────────
