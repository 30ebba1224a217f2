//! Text helpers: entity decoding, speech-safe normalisation, labels and
//! caption wrapping.

use unicode_normalization::UnicodeNormalization;

/// Approximate advance of one glyph relative to the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.55;

/// Decode HTML entities as delivered by the trivia API (`&quot;`, `&#039;`, ...).
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Reduce text to ASCII for the TTS engine.
///
/// Applies NFKD so accented letters decompose into base letter plus
/// combining mark, then drops everything outside ASCII.
pub fn normalize_text(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

/// Short display label for a category: the first word, letters only.
///
/// "Entertainment: Video Games" becomes "Entertainment". Returns `None`
/// when nothing alphabetic is left.
pub fn category_label(category: &str) -> Option<String> {
    let first_word = category.split_whitespace().next()?;
    let label: String = first_word.chars().filter(|c| c.is_alphabetic()).collect();
    if label.is_empty() { None } else { Some(label) }
}

/// Maximum characters per caption line for a frame of `frame_width` pixels.
pub fn chars_per_line(font_size: u32, frame_width: u32) -> usize {
    let glyph = (font_size.max(1) as f32) * GLYPH_WIDTH_RATIO;
    ((frame_width as f32 / glyph) as usize).max(1)
}

/// Wrap a caption into centred lines. Explicit newlines are kept, so
/// blank lines between paragraphs survive.
pub fn wrap_caption(text: &str, font_size: u32, frame_width: u32) -> Vec<String> {
    let width = chars_per_line(font_size, frame_width);
    text.split('\n')
        .flat_map(|paragraph| {
            if paragraph.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap(paragraph, width)
            }
        })
        .collect()
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn textwrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let current_len = current.chars().count();
        if current_len > 0 && current_len + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}
