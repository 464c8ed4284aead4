//! Full-width to half-width narrowing for user input.

/// Ideographic (full-width) space, U+3000.
pub const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Map full-width digits (U+FF10..=U+FF19) to ASCII digits and the ideographic
/// space to an ASCII space. Everything else passes through untouched.
pub fn normalize(text: &str) -> String {
    text.chars().map(narrow_char).collect()
}

fn narrow_char(c: char) -> char {
    match c {
        '\u{FF10}'..='\u{FF19}' => {
            let offset = c as u32 - 0xFF10;
            char::from_digit(offset, 10).unwrap_or(c)
        }
        IDEOGRAPHIC_SPACE => ' ',
        other => other,
    }
}
