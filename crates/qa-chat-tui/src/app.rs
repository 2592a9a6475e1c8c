use ratatui::layout::Rect;
use qa_chat_core::{ChatSession, SendOutcome, SessionEvent};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession,
    pub base_url: String,

    // Input state
    pub input_cursor: usize, // cursor position (in chars) in the pending input

    // Transcript view state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(session: ChatSession, base_url: &str) -> Self {
        Self {
            should_quit: false,
            session,
            base_url: base_url.to_string(),
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            chat_area: None,
        }
    }

    /// Send whatever is in the input box
    pub fn submit(&mut self) -> SendOutcome {
        let outcome = self.session.send_message();
        if outcome == SendOutcome::Sent {
            self.input_cursor = 0;
            self.animation_frame = 0;
        }
        outcome
    }

    /// React to a state change announced by the session
    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::UserMessageAppended | SessionEvent::ResponseApplied { .. } => {
                self.scroll_chat_to_bottom();
            }
            SessionEvent::RequestIssued => {}
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let input = self.session.pending_input_mut();
        let byte_pos = char_to_byte_index(input, self.input_cursor);
        input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let input = self.session.pending_input_mut();
            let byte_pos = char_to_byte_index(input, self.input_cursor);
            input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        let cursor = self.input_cursor;
        let input = self.session.pending_input_mut();
        if cursor < input.chars().count() {
            let byte_pos = char_to_byte_index(input, cursor);
            input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.session.pending_input().chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.session.pending_input().chars().count();
    }

    // Transcript scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_up(self.chat_height.max(1));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_down(self.chat_height.max(1));
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_awaiting_response() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.total_chat_lines().saturating_sub(visible_height)
    }

    /// Estimate how many rows the rendered transcript takes after wrapping
    pub(crate) fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for message in self.session.transcript() {
            total_lines = total_lines.saturating_add(1); // Speaker line ("You:" or "AI:")
            for line in message.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let rows = if char_count == 0 { 1 } else { char_count.div_ceil(wrap_width) };
                total_lines = total_lines.saturating_add(rows as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.session.is_awaiting_response() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        total_lines
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use qa_chat_core::{Message, QaService, RequestFailed};
    use std::sync::Arc;

    /// Answers every question by echoing it back
    pub(crate) struct EchoService;

    #[async_trait]
    impl QaService for EchoService {
        async fn ask(&self, question: &str, _history: &[Message]) -> Result<Option<String>, RequestFailed> {
            Ok(Some(format!("echo: {}", question)))
        }
    }

    pub(crate) fn test_app() -> App {
        App::new(ChatSession::new(Arc::new(EchoService)), "http://localhost:8000")
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut app = test_app();
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.session.pending_input(), "héllo");
        assert_eq!(app.input_cursor, 5);

        app.cursor_left();
        app.cursor_left();
        app.cursor_left();
        app.delete_before_cursor(); // removes 'é'
        assert_eq!(app.session.pending_input(), "hllo");
        assert_eq!(app.input_cursor, 1);

        app.delete_at_cursor(); // removes first 'l'
        assert_eq!(app.session.pending_input(), "hlo");

        app.cursor_home();
        app.insert_char('¡');
        assert_eq!(app.session.pending_input(), "¡hlo");

        app.cursor_end();
        app.delete_at_cursor();
        assert_eq!(app.session.pending_input(), "¡hlo");
        app.cursor_right();
        assert_eq!(app.input_cursor, 4);
    }

    #[tokio::test]
    async fn test_submit_resets_cursor_and_scrolls() {
        let mut app = test_app();
        app.chat_height = 2;
        app.chat_width = 40;
        let mut events = app.session.subscribe();

        for c in "hello".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.submit(), SendOutcome::Sent);
        assert_eq!(app.input_cursor, 0);

        while let Ok(event) = events.try_recv() {
            app.on_session_event(event);
        }
        // "You:", "hello", blank, "AI:", "Thinking..." in a 2-row view
        assert_eq!(app.chat_scroll, 3);

        app.session.wait_for_response().await;
        while let Ok(event) = events.try_recv() {
            app.on_session_event(event);
        }
        // Two messages of three rows each
        assert_eq!(app.chat_scroll, 4);
    }

    #[test]
    fn test_blank_submit_keeps_cursor() {
        let mut app = test_app();
        app.insert_char(' ');
        assert_eq!(app.submit(), SendOutcome::EmptyInput);
        assert_eq!(app.input_cursor, 1);
        assert!(app.session.transcript().is_empty());
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = test_app();
        app.scroll_up(5);
        assert_eq!(app.chat_scroll, 0);
        app.scroll_down(5);
        assert_eq!(app.chat_scroll, 0);
    }
}
