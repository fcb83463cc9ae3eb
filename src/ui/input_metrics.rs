use unicode_width::UnicodeWidthChar;

/// Soft-wrap `input` to `width` display columns. Explicit newlines always
/// start a new row; the result has at least one row.
pub fn wrap_input_lines(input: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut line_widths = vec![0usize];
    for ch in input.chars() {
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            lines.push(String::new());
            line_widths.push(0);
            continue;
        }
        let ch_width = char_display_width(ch);
        let current_width = *line_widths.last().unwrap_or(&0);
        if current_width + ch_width > width && current_width > 0 {
            lines.push(String::new());
            line_widths.push(0);
        }
        if let Some(line) = lines.last_mut() {
            line.push(ch);
        }
        if let Some(line_width) = line_widths.last_mut() {
            *line_width += ch_width;
        }
    }
    lines
}

/// Wrap every logical line and flatten into display rows.
pub fn wrap_history_rows(lines: &[String], width: usize) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| wrap_input_lines(line, width))
        .collect()
}

pub fn cursor_row_col(input: &str, cursor_byte: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let mut row = 0usize;
    let mut col = 0usize;
    let cursor_byte = clamp_to_char_boundary_left(input, cursor_byte);

    for (idx, ch) in input.char_indices() {
        if idx >= cursor_byte {
            break;
        }
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            row += 1;
            col = 0;
            continue;
        }
        let ch_width = char_display_width(ch);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }

    if col >= width {
        row += 1;
        col = 0;
    }

    (row, col)
}

pub fn truncate_to_display_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width && used > 0 {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out
}

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn clamp_to_char_boundary_left(input: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(input.len());
    while cursor > 0 && !input.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_counts_wide_characters() {
        let rows = wrap_input_lines("पढ़ाई 学习", 4);
        assert!(rows.len() > 1);
        assert!(rows.iter().all(|row| row.chars().map(char_display_width).sum::<usize>() <= 4));
    }

    #[test]
    fn test_wrap_history_rows_keeps_blank_separators() {
        let lines = vec!["You:".to_string(), String::new(), "abcdef".to_string()];
        let rows = wrap_history_rows(&lines, 3);
        assert_eq!(rows, vec!["You", ":", "", "abc", "def"]);
    }

    #[test]
    fn test_cursor_wraps_to_next_row_at_width() {
        assert_eq!(cursor_row_col("abcd", 4, 4), (1, 0));
        assert_eq!(cursor_row_col("ab\ncd", 4, 10), (1, 1));
        assert_eq!(cursor_row_col("é", 1, 10), (0, 0));
    }

    #[test]
    fn test_truncate_respects_display_width() {
        assert_eq!(truncate_to_display_width("Study Assistant", 5), "Study");
    }
}
