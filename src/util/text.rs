use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Terminal columns occupied by `s` (CJK and emoji count as two).
///
/// ```
/// use catalog_admin::util::display_width;
///
/// assert_eq!(display_width("Shoes"), 5);
/// assert_eq!(display_width("靴"), 2);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cut `s` to at most `max_width` columns, ending in `...` when something was
/// dropped. Widths of three or less get no ellipsis.
///
/// ```
/// use catalog_admin::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Outdoor Equipment", 10), "Outdoor...");
/// assert_eq!(truncate_to_width("Hats", 10), "Hats");
/// assert_eq!(truncate_to_width("Hats", 2), "Ha");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..end].to_owned())
    } else {
        Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
    }
}

/// Truncate or right-pad `s` so it occupies exactly `width` columns.
///
/// Used for the fixed-width tables the CLI prints.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let cut = truncate_to_width(s, width);
    let fill = width.saturating_sub(display_width(&cut));
    let mut out = String::with_capacity(cut.len() + fill);
    out.push_str(&cut);
    out.extend(std::iter::repeat(' ').take(fill));
    out
}

fn is_stripped_control(c: char) -> bool {
    c == '\u{7f}' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Remove terminal control characters and ANSI escape sequences.
///
/// Names and server messages come from the API and are printed straight to the
/// terminal. CSI (`ESC [` .. final byte) and OSC (`ESC ]` .. BEL or `ESC \`)
/// sequences are dropped whole; tab, newline and carriage return are kept.
/// Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\u{07}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            c if is_stripped_control(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncation() {
        assert_eq!(truncate_to_width("Kitchen Appliances", 10), "Kitchen...");
        assert_eq!(truncate_to_width("Kitchen", 7), "Kitchen");
        assert_eq!(truncate_to_width("Kitchen", 0), "");
        assert_eq!(truncate_to_width("Kitchen", 3), "Kit");
    }

    #[test]
    fn test_wide_chars_truncation() {
        // four 2-column chars = 8 columns; budget 7 - 3 = 4 columns
        assert_eq!(truncate_to_width("家庭用品", 7), "家庭...");
        assert_eq!(truncate_to_width("家庭用品", 3), "家");
    }

    #[test]
    fn test_pad_to_width() {
        assert_eq!(pad_to_width("Hats", 6), "Hats  ");
        assert_eq!(pad_to_width("Kitchen Appliances", 10), "Kitchen...");
        assert_eq!(display_width(&pad_to_width("家庭", 5)), 5);
    }

    #[test]
    fn test_strip_clean_text_is_borrowed() {
        let input = "Shoes & Boots\twith\nnewlines\r\n";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_controls_and_del() {
        assert_eq!(strip_control_chars("Sh\x00o\x07e\x7fs"), "Shoes");
    }

    #[test]
    fn test_strip_csi_and_osc() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07Hats"), "Hats");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\Hats"), "Hats");
        assert_eq!(strip_control_chars("a\x1bb"), "ab");
    }

    #[test]
    fn test_strip_keeps_unicode() {
        assert_eq!(strip_control_chars("靴 \x1b[1m赤\x1b[0m"), "靴 赤");
    }
}
