use std::time::Duration;
use tracing::trace;

use crate::domain::{DeckConfig, DeckError, Message};
use crate::model::Model;
use crate::schema::Field;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DeckConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DeckError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.map_key(model.raw_keyevents(), key));
        }
        Ok(None)
    }

    /// While the command line is open every key goes to it unmapped.
    fn map_key(&self, raw: bool, key: KeyEvent) -> Option<Message> {
        if raw {
            return Some(Message::RawKey(key));
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Message::Quit),
                _ => None,
            };
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PreviousPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('s') => Some(Message::ToggleSort),
            KeyCode::Char('S') => Some(Message::ClearSort),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('f') => Some(Message::FilterColumn),
            KeyCode::Char('i') => Some(Message::Import),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Char('0') => Some(Message::ShowAllColumns),
            KeyCode::Char(c @ '1'..='7') => {
                let idx = c as usize - '1' as usize;
                Some(Message::ToggleColumn(Field::ALL[idx]))
            }
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
