use assistant_core::{Message, Role, VisibleSuggestions};
use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{group_by_period, App, Focus, GREETING};

const TRIGGER_LABEL: &str = " Ассистент ";
const SIDEBAR_WIDTH: u16 = 32;
const PRODUCT_NAME: &str = "csp-load-agent";

pub fn draw(f: &mut Frame, app: &App) {
    if !app.open {
        draw_trigger(f, f.size());
        return;
    }

    let area = dialog_rect(f.size());
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(inner);

    draw_sidebar(f, app, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Messages
            Constraint::Length(1), // Suggestions
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(columns[1]);

    draw_header(f, app, rows[0]);
    draw_messages(f, app, rows[1]);
    draw_suggestions(f, app, rows[2]);
    draw_input(f, app, rows[3]);
    draw_status_bar(f, app, rows[4]);
}

/// 95% x 90% of the screen, centred
fn dialog_rect(area: Rect) -> Rect {
    let width = (u32::from(area.width) * 95 / 100) as u16;
    let height = (u32::from(area.height) * 90 / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_trigger(f: &mut Frame, area: Rect) {
    let hint = Paragraph::new(Line::from(vec![Span::styled(
        "Ctrl+O: открыть ассистента, q: выход",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )]))
    .alignment(Alignment::Center);
    f.render_widget(hint, Rect { height: 1, ..area });

    let width = (TRIGGER_LABEL.width() as u16 + 2).min(area.width);
    let height = 3.min(area.height);
    let button_area = Rect {
        x: area.x + area.width.saturating_sub(width + 2),
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    };

    let button = Paragraph::new(Span::styled(
        TRIGGER_LABEL,
        Style::default().add_modifier(Modifier::BOLD).fg(Color::White),
    ))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(button, button_area);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Sidebar;
    let active = app.store.active_chat_id();
    let label_width = area.width.saturating_sub(4) as usize;

    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {}", PRODUCT_NAME),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let cursor_style = |index: usize| {
        if focused && app.sidebar_cursor == index {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        }
    };

    lines.push(Line::from(Span::styled(" + Новый чат", cursor_style(0))));

    let mut index = 1;
    for (period, chats) in group_by_period(app.store.chats(), Local::now()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", period.label()),
            Style::default().fg(Color::DarkGray),
        )));
        for chat in chats {
            let marker = if active.as_deref() == Some(chat.id.as_str()) {
                "●"
            } else {
                " "
            };
            let title = truncate(&chat.title, label_width);
            lines.push(Line::from(Span::styled(
                format!(" {} {}", marker, title),
                cursor_style(index),
            )));
            index += 1;
        }
    }

    let sidebar = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::RIGHT)
            .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::Blue })),
    );
    f.render_widget(sidebar, area);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" {}", app.header_title()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if app.is_submitting() {
        spans.push(Span::styled("  ◐ ...", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(header, area);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(2) as usize;
    let messages = app.active_messages();

    let lines: Vec<Line> = if messages.is_empty() {
        message_lines(&Message::assistant(0, GREETING), width)
    } else {
        messages.iter().flat_map(|m| message_lines(m, width)).collect()
    };

    let height = area.height as usize;
    let max_offset = lines.len().saturating_sub(height);
    let offset = app.scroll_offset.min(max_offset);
    let top = (max_offset - offset) as u16;

    let panel = Paragraph::new(lines).scroll((top, 0));
    f.render_widget(panel, Rect {
        x: area.x + 1,
        width: area.width.saturating_sub(2),
        ..area
    });
}

fn message_lines(msg: &Message, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let (style, right) = match msg.role {
        Role::User => (Style::default().fg(Color::Cyan), true),
        Role::Assistant => (Style::default().fg(Color::Green), false),
    };

    // User messages sit on the right edge
    let mut lines: Vec<Line> = wrap_text(&msg.content, width)
        .into_iter()
        .map(|text| {
            let text = if right {
                format!("{}{}", " ".repeat(width.saturating_sub(text.width())), text)
            } else {
                text
            };
            Line::from(Span::styled(text, style))
        })
        .collect();
    lines.push(Line::from(""));
    lines
}

fn draw_suggestions(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    match app.composer.visible_suggestions() {
        VisibleSuggestions::Hidden => {}
        VisibleSuggestions::Categories(labels) => {
            spans.push(Span::styled(
                " [Ctrl+T] Провалидировать ",
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ));
            for (i, label) in labels.iter().enumerate() {
                spans.push(Span::raw(format!("  [Alt+{}] {}", i + 1, label)));
            }
        }
        VisibleSuggestions::Items { highlight, items } => {
            for (i, item) in items.into_iter().enumerate() {
                spans.push(Span::raw(format!(" [Alt+{}] ", i + 1)));
                match item.strip_prefix(highlight) {
                    Some(rest) => {
                        spans.push(Span::styled(
                            highlight,
                            Style::default().add_modifier(Modifier::BOLD),
                        ));
                        spans.push(Span::raw(rest));
                    }
                    None => spans.push(Span::raw(item)),
                }
            }
        }
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Prompt;

    let input_text = if app.is_submitting() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Yellow)),
            Span::styled(
                "Ожидание ответа...",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else if app.composer.text().is_empty() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                "Задать вопрос",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        let visible = tail(app.composer.text(), area.width.saturating_sub(5) as usize);
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(visible, Style::default().fg(Color::White)),
            Span::styled(if focused { "▌" } else { "" }, Style::default().fg(Color::Green)),
        ])
    };

    let input = Paragraph::new(input_text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::Blue })),
    );
    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.notice {
        Some(notice) => format!(" {} ", notice),
        None => format!(
            " {} | [Enter] Send  [Tab] Focus  [Ctrl+N] New chat  [Esc] Close  [Ctrl+C] Quit",
            app.backend_label
        ),
    };

    let style = if app.notice.is_some() {
        Style::default().fg(Color::Red).add_modifier(Modifier::REVERSED)
    } else {
        Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED)
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}

/// Greedy wrap by display width; long words are split
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current = String::new();
        let mut current_width = 0;

        for word in raw_line.split(' ') {
            let word_width = word.width();
            let sep = usize::from(!current.is_empty());

            if current_width + sep + word_width <= width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += sep + word_width;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }

            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if current_width + w > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(c);
                current_width += w;
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Cut to `width` columns with an ellipsis
fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Last `width` columns of the input, so the cursor stays visible
fn tail(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut chars: Vec<char> = Vec::new();
    for c in text.chars().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        chars.push(c);
        used += w;
    }
    chars.into_iter().rev().collect()
}
