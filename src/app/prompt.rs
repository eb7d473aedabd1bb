use crate::navigation::{NoticeLevel, Prompter};
use crate::types::Record;
use crate::ui::{render_modal, Modal};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{backend::Backend, buffer::Buffer, Terminal};
use tracing::warn;

enum Input {
    Key(KeyEvent),
    Redraw,
    Closed,
}

/// Asks its questions in modal dialogs, each running its own event loop
/// until answered
pub struct TerminalPrompter<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    background: &'a Buffer,
    pub notices: Vec<(NoticeLevel, String)>,
}

impl<'a, B: Backend> TerminalPrompter<'a, B> {
    pub fn new(terminal: &'a mut Terminal<B>, background: &'a Buffer) -> Self {
        Self {
            terminal,
            background,
            notices: Vec::new(),
        }
    }

    fn show(&mut self, modal: &Modal) -> bool {
        let background = self.background;
        let drawn = self.terminal.draw(|frame| {
            frame.buffer_mut().merge(background);
            render_modal(frame, frame.size(), modal);
        });
        match drawn {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "failed to draw prompt");
                false
            }
        }
    }

    fn next_input(&mut self) -> Input {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Input::Key(key),
            Ok(_) => Input::Redraw,
            Err(e) => {
                warn!(error = %e, "failed to read terminal input");
                Input::Closed
            }
        }
    }

    /// Draw `modal` and wait for one key press, `None` when the terminal is gone
    fn ask(&mut self, modal: &Modal) -> Option<KeyEvent> {
        loop {
            if !self.show(modal) {
                return None;
            }
            match self.next_input() {
                Input::Key(key) => return Some(key),
                Input::Redraw => continue,
                Input::Closed => return None,
            }
        }
    }
}

impl<B: Backend> Prompter for TerminalPrompter<'_, B> {
    fn confirm_changes(&mut self, title: &str, lines: &[String]) -> bool {
        let mut scroll = 0;
        loop {
            let modal = Modal::Confirm { title, lines, scroll };
            let Some(key) = self.ask(&modal) else {
                return false;
            };
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => return true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return false,
                KeyCode::Up => scroll = scroll.saturating_sub(1),
                KeyCode::Down => scroll = (scroll + 1).min(lines.len().saturating_sub(1)),
                _ => {}
            }
        }
    }

    fn ask_yes_no(&mut self, title: &str, question: &str) -> bool {
        loop {
            let Some(key) = self.ask(&Modal::YesNo { title, question }) else {
                return false;
            };
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => return true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return false,
                _ => {}
            }
        }
    }

    fn choose(&mut self, title: &str, prompt: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            return None;
        }
        let mut selected = 0;
        loop {
            let modal = Modal::Choice {
                title,
                prompt,
                options,
                selected,
            };
            let key = self.ask(&modal)?;
            match key.code {
                KeyCode::Enter => return Some(selected),
                KeyCode::Esc => return None,
                KeyCode::Up => selected = (selected + options.len() - 1) % options.len(),
                KeyCode::Down => selected = (selected + 1) % options.len(),
                KeyCode::Char(c) => {
                    if let Some(n) = c.to_digit(10) {
                        let n = n as usize;
                        if n >= 1 && n <= options.len() {
                            return Some(n - 1);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn open_record_form(&mut self, layer_name: &str, record: &Record) {
        let rows: Vec<(String, String)> = record
            .fields
            .iter()
            .cloned()
            .zip(record.values.iter().map(|v| v.preview()))
            .collect();
        let mut scroll = 0;
        loop {
            let modal = Modal::Record {
                title: format!("New row in {} (id {})", layer_name, record.id),
                rows: rows.clone(),
                scroll,
            };
            let Some(key) = self.ask(&modal) else {
                return;
            };
            match key.code {
                KeyCode::Enter | KeyCode::Esc => return,
                KeyCode::Up => scroll = scroll.saturating_sub(1),
                KeyCode::Down => scroll = (scroll + 1).min(rows.len().saturating_sub(1)),
                _ => {}
            }
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}
