use crate::state::Role;
use crate::ui::input_metrics::{
    char_display_width, cursor_row_col, truncate_to_display_width, wrap_history_rows,
    wrap_input_lines,
};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::Paragraph,
    Frame,
};

const INPUT_PLACEHOLDER: &str = "Ask a question about your study material...";

pub fn input_visual_rows(input: &str, width: usize) -> usize {
    wrap_input_lines(input, width).len().max(1)
}

/// Number of display rows the transcript needs at `width`.
pub fn history_row_count(lines: &[String], width: usize) -> usize {
    wrap_history_rows(lines, width).len()
}

pub fn render_input(
    frame: &mut Frame<'_>,
    area: Rect,
    input: &str,
    cursor_byte: usize,
    locked: bool,
) {
    if area.height == 0 || area.width <= 2 {
        return;
    }

    let input_width = area.width.saturating_sub(2).max(1) as usize;
    let lines = wrap_input_lines(input, input_width);
    let (cursor_row, cursor_col) = cursor_row_col(input, cursor_byte, input_width);
    let visible_rows = area.height as usize;
    let window_start = cursor_row.saturating_add(1).saturating_sub(visible_rows);

    let mut rendered = Vec::with_capacity(visible_rows);
    for offset in 0..visible_rows {
        let row_index = window_start + offset;
        let prefix = if row_index == 0 { "> " } else { "  " };
        let line = if input.is_empty() && row_index == 0 {
            INPUT_PLACEHOLDER.to_string()
        } else {
            lines.get(row_index).cloned().unwrap_or_default()
        };
        rendered.push(Line::from(format!("{prefix}{line}")));
    }

    let mut style = Style::default().fg(Color::Gray).bg(Color::Rgb(24, 24, 24));
    if locked || input.is_empty() {
        style = style.add_modifier(Modifier::DIM);
    }
    frame.render_widget(Paragraph::new(rendered).style(style), area);

    let cursor_y = area
        .y
        .saturating_add(cursor_row.saturating_sub(window_start) as u16);
    let cursor_x = area
        .x
        .saturating_add(2 + cursor_col as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(1)));
    frame.set_cursor_position((cursor_x, cursor_y));
}

/// Render pre-built history lines starting at display row `top`.
pub fn render_transcript(frame: &mut Frame<'_>, area: Rect, lines: &[String], top: usize) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let rows: Vec<Line> = wrap_history_rows(lines, area.width as usize)
        .into_iter()
        .skip(top)
        .take(area.height as usize)
        .map(styled_history_row)
        .collect();

    frame.render_widget(
        Paragraph::new(rows).style(Style::default().fg(Color::White)),
        area,
    );
}

pub fn render_header(frame: &mut Frame<'_>, area: Rect, header: &str) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let text = truncate_line(header, area.width as usize);
    frame.render_widget(
        Paragraph::new(text).style(
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        area,
    );
}

/// Role of a `"<label>:"` header row, if `row` is one.
fn label_role(row: &str) -> Option<Role> {
    let label = row.strip_suffix(':')?;
    [Role::User, Role::Assistant]
        .into_iter()
        .find(|role| role.label() == label)
}

fn styled_history_row(row: String) -> Line<'static> {
    let style = match label_role(&row) {
        Some(Role::User) => Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
        Some(Role::Assistant) => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        None => Style::default().fg(Color::Gray),
    };
    Line::styled(row, style)
}

fn truncate_line(input: &str, width: usize) -> String {
    let width = width.max(1);
    let mut out = String::new();
    let mut used = 0usize;
    let mut truncated = false;

    for ch in input.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > width {
            truncated = true;
            break;
        }
        out.push(ch);
        used += ch_width;
    }

    if truncated && width >= 4 {
        out = truncate_to_display_width(&out, width - 3);
        out.push_str("...");
    }
    out
}
