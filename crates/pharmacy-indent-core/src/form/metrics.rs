//! Helvetica text metrics for layout.
//!
//! Advance widths are the standard base-14 AFM values in 1/1000 em. The
//! oblique face shares the regular widths.

/// Millimetres per PDF point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.15;

/// Ascender height in 1/1000 em.
const ASCENT: f64 = 718.0;

/// Width used for characters outside the table.
const DEFAULT_WIDTH: u16 = 556;

/// Base-14 faces used on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Oblique,
}

impl Font {
    pub const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Oblique];

    /// PostScript name.
    pub fn base_font(&self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Oblique => "Helvetica-Oblique",
        }
    }

    /// Resource name inside the page.
    pub fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Oblique => "F3",
        }
    }
}

/// Advance width of `c` in 1/1000 em.
pub fn char_width(font: Font, c: char) -> u16 {
    if font == Font::Bold {
        if let Some(w) = bold_override(c) {
            return w;
        }
    }
    regular_width(c)
}

fn regular_width(c: char) -> u16 {
    match c {
        ' ' | '!' | ',' | '.' | '/' | ':' | ';' | '[' | '\\' | ']' | 'I' | 'f' | 't' => 278,
        '"' => 355,
        '#' | '$' | '0'..='9' | '?' | '_' => 556,
        '%' => 889,
        '&' | 'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
        '\'' => 191,
        '(' | ')' | '-' | '`' | 'r' => 333,
        '*' => 389,
        '+' | '<' | '=' | '>' | '~' => 584,
        '@' => 1015,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
        'F' | 'T' | 'Z' => 611,
        'G' | 'O' | 'Q' => 778,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 500,
        'L' => 556,
        'M' | 'm' => 833,
        'W' => 944,
        '^' => 469,
        'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 556,
        'i' | 'j' | 'l' => 222,
        'w' => 722,
        '{' | '}' => 334,
        '|' => 260,
        _ => DEFAULT_WIDTH,
    }
}

fn bold_override(c: char) -> Option<u16> {
    let w = match c {
        '!' | ':' | ';' | '[' | ']' | 'f' | 't' => 333,
        '"' => 474,
        '&' | 'A' | 'B' | 'C' | 'D' | 'K' => 722,
        '\'' => 238,
        '?' | 'L' | 'b' | 'd' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 611,
        '@' => 975,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' => 556,
        '^' => 584,
        'i' | 'j' | 'l' => 278,
        'm' => 889,
        'r' | '{' | '}' => 389,
        'w' => 778,
        '|' => 280,
        _ => return None,
    };
    Some(w)
}

/// Width of `text` in millimetres.
pub fn text_width(text: &str, font: Font, size_pt: f64) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(font, c) as u32).sum();
    units as f64 / 1000.0 * size_pt * MM_PER_PT
}

/// Distance between baselines in millimetres.
pub fn line_height(size_pt: f64) -> f64 {
    size_pt * LINE_HEIGHT_FACTOR * MM_PER_PT
}

/// Ascender height in millimetres.
pub fn ascent(size_pt: f64) -> f64 {
    ASCENT / 1000.0 * size_pt * MM_PER_PT
}

/// Greedy word wrap to `max_width` millimetres.
///
/// Words wider than a full line are split between characters. Always
/// returns at least one line.
pub fn wrap(text: &str, font: Font, size_pt: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font, size_pt) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width(word, font, size_pt) <= max_width {
            current = word.to_string();
            continue;
        }

        for c in word.chars() {
            current.push(c);
            if text_width(&current, font, size_pt) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(char_width(Font::Regular, 'A'), 667);
        assert_eq!(char_width(Font::Bold, 'A'), 722);
        assert_eq!(char_width(Font::Oblique, 'i'), 222);
        assert_eq!(char_width(Font::Bold, 'i'), 278);
        assert_eq!(char_width(Font::Bold, 'e'), 556);
        assert_eq!(char_width(Font::Regular, 'é'), DEFAULT_WIDTH);
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let w8 = text_width("KEW.PS-8", Font::Regular, 8.0);
        let w16 = text_width("KEW.PS-8", Font::Regular, 16.0);
        assert!((w16 - 2.0 * w8).abs() < 1e-9);
        // 1000 units at 72pt is exactly one inch
        assert!((text_width("M", Font::Regular, 72.0) - 0.833 * 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_words() {
        let lines = wrap("Paracetamol 500mg Tablet | PKU-001", Font::Regular, 8.0, 30.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, 8.0) <= 30.0);
        }
        assert_eq!(lines.join(" "), "Paracetamol 500mg Tablet | PKU-001");
    }

    #[test]
    fn test_wrap_splits_long_word() {
        let word = "X".repeat(60);
        let lines = wrap(&word, Font::Regular, 8.0, 20.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn test_wrap_empty_is_one_line() {
        assert_eq!(wrap("", Font::Regular, 8.0, 20.0), vec![String::new()]);
    }
}
