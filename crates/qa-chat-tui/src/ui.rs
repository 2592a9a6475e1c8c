use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use qa_chat_core::{SessionView, Speaker};
use crate::app::App;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    // Store chat area for mouse hit-testing and its inner size for scrolling
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" AI Agent Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("{} ", app.base_url), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn transcript_text(view: &SessionView<'_>, animation_frame: u8) -> Text<'static> {
    if view.entries.is_empty() && !view.responding {
        return Text::from(Span::styled(
            "Ask the agent a question...",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let user_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let agent_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for entry in &view.entries {
        let is_user = entry.role == Speaker::User;
        let style = if is_user { user_style } else { agent_style };
        lines.push(Line::from(Span::styled(format!("{}:", entry.speaker), style)));
        for line in entry.content.lines() {
            if is_user {
                lines.push(Line::from(line.to_string()));
            } else {
                lines.push(parse_markdown_line(line));
            }
        }
        lines.push(Line::default());
    }

    if view.responding {
        lines.push(Line::from(Span::styled(
            format!("{}:", Speaker::Agent.label()),
            agent_style,
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(lines)
}

fn render_chat(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.session.view();
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let chat = Paragraph::new(transcript_text(&view, app.animation_frame))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_color = if app.session.is_awaiting_response() {
        Color::DarkGray
    } else {
        Color::Yellow
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_color))
        .title(" Ask (Enter to send) ");

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input_text = app.session.pending_input();
    let input = if input_text.is_empty() {
        Paragraph::new(Span::styled(
            "Type your question...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = input_text
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);

    let cursor_x = (cursor_pos - scroll_offset).min(inner_width) as u16;
    frame.set_cursor_position((
        area.x.saturating_add(cursor_x).saturating_add(1),
        area.y.saturating_add(1),
    ));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.session.is_awaiting_response() {
        Span::styled(" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        Span::styled(" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let hints = Span::styled(
        " Enter send | Up/Down/PgUp/PgDn scroll | Esc quit",
        Style::default().fg(Color::DarkGray),
    );

    frame.render_widget(Paragraph::new(Line::from(vec![status, hints])), area);
}
