use std::path::PathBuf;

use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace};

use crate::domain::{CMDMode, DeckConfig, DeckError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::render::CellRenderers;
use crate::schema::Field;
use crate::table::TableState;
use crate::transfer::{self, Notification};
use crate::visibility::{ColumnVisibility, KeyValueStore, VisibilityPersistence};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
    CmdInput,
}

pub struct Model {
    config: DeckConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: TableState,
    persistence: VisibilityPersistence,
    renderers: CellRenderers,
    source_name: String,
    selected_column: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    popup_message: Option<String>,
    notification: Option<Notification>,
    status_message: String,
}

impl Model {
    pub fn init(config: &DeckConfig, store: Box<dyn KeyValueStore>) -> Self {
        let persistence = VisibilityPersistence::new(store);
        let visibility = persistence.load().unwrap_or_else(|| {
            debug!("Using default column visibility");
            ColumnVisibility::default()
        });

        let renderers = CellRenderers::default();
        debug!("Cell renderers {renderers:?}");

        Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            table: TableState::new(Vec::new(), visibility),
            persistence,
            renderers,
            source_name: String::new(),
            selected_column: 0,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            popup_message: None,
            notification: None,
            status_message: "Started datadeck! Press ? for help, i to import a CSV file.".to_string(),
        }
    }

    // -------------------- Accessors for the ui ---------------------- //

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn renderers(&self) -> &CellRenderers {
        &self.renderers
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Index into the visible columns.
    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    pub fn selected_field(&self) -> Option<Field> {
        self.table.visible_fields().get(self.selected_column).copied()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn popup_message(&self) -> Option<&str> {
        self.popup_message.as_deref()
    }

    pub fn cmd_input(&self) -> Option<(CMDMode, &InputResult)> {
        match (self.active_cmdinput, self.cmd_mode) {
            (true, Some(mode)) => Some((mode, &self.last_input)),
            _ => None,
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    // -------------------- Message handling ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DeckError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!(
            "Update: Modus {:?}, Message {:?}, table r{}",
            self.modus,
            msg,
            self.table.revision()
        );

        match self.modus {
            Modus::Table => match msg {
                Message::Quit => self.quit(),
                Message::Exit => self.dismiss_notification(),
                Message::Help => self.show_help(),
                Message::NextPage => self.table.next_page(),
                Message::PreviousPage => self.table.previous_page(),
                Message::FirstPage => self.table.first_page(),
                Message::LastPage => self.table.last_page(),
                Message::MoveLeft => self.move_column_selection(-1),
                Message::MoveRight => self.move_column_selection(1),
                Message::ToggleSort => self.toggle_sort_selected(),
                Message::ClearSort => {
                    self.table.set_sort(None);
                    self.set_status_message("Sort cleared");
                }
                Message::ToggleColumn(field) => self.toggle_column(field),
                Message::ShowAllColumns => self.show_all_columns(),
                Message::Search => self.enter_cmd_mode(CMDMode::GlobalFilter),
                Message::FilterColumn => {
                    if let Some(field) = self.selected_field() {
                        self.enter_cmd_mode(CMDMode::ColumnFilter(field));
                    }
                }
                Message::Import => self.enter_cmd_mode(CMDMode::Import),
                Message::Export => self.export(),
                Message::RawKey(_) => (),
            },
            Modus::Popup => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.close_popup(),
                _ => (),
            },
            Modus::CmdInput => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    /// Replace the dataset from a CSV file. The previous dataset survives
    /// any failure.
    pub fn import(&mut self, path: PathBuf) {
        let note = transfer::import_file(&mut self.table, &path);
        if !note.is_error() {
            self.source_name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("???")
                .to_string();
            self.clamp_column_selection();
        }
        self.notify(note);
    }

    pub fn export(&mut self) {
        let note = transfer::export_file(&self.table, &self.config.export_dir);
        self.notify(note);
    }

    pub fn toggle_column(&mut self, field: Field) {
        self.table.toggle_column(field);
        self.persistence.save(self.table.visibility());
        self.clamp_column_selection();
        let state = if self.table.visibility().is_visible(field) {
            "shown"
        } else {
            "hidden"
        };
        self.set_status_message(format!("Column {} {state}", field.name()));
    }

    fn show_all_columns(&mut self) {
        self.table.set_visibility(ColumnVisibility::all_visible());
        self.persistence.save(self.table.visibility());
        self.set_status_message("All columns shown");
    }

    fn toggle_sort_selected(&mut self) {
        if let Some(field) = self.selected_field() {
            self.table.toggle_sort(field);
            if let Some(sort) = self.table.sort() {
                self.set_status_message(format!(
                    "Sorted by {} {:?}",
                    sort.field.name(),
                    sort.direction
                ));
            }
        }
    }

    fn move_column_selection(&mut self, step: isize) {
        let count = self.table.visible_fields().len();
        if count == 0 {
            self.selected_column = 0;
            return;
        }
        self.selected_column = self
            .selected_column
            .saturating_add_signed(step)
            .min(count - 1);
    }

    fn clamp_column_selection(&mut self) {
        let count = self.table.visible_fields().len();
        self.selected_column = self.selected_column.min(count.saturating_sub(1));
    }

    fn notify(&mut self, note: Notification) {
        self.set_status_message(format!("{}: {}", note.title, note.message));
        self.notification = Some(note);
    }

    fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.popup_message = Some(HELP_TEXT.to_string());
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Popup;
        self.popup_message = None;
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        self.input.clear();
        // Editing an active filter starts from its current query.
        match mode {
            CMDMode::GlobalFilter => self.input.set(&self.table.filter().global),
            CMDMode::ColumnFilter(field) => {
                if let Some(q) = self.table.filter().columns.get(&field) {
                    self.input.set(q);
                }
            }
            CMDMode::Import => {}
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;
        let mode = self.cmd_mode.take();

        if self.last_input.canceled {
            return;
        }

        let cmd_input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::GlobalFilter) => {
                self.table.set_global_filter(cmd_input);
                let matches = self.table.projection().filtered_count();
                self.set_status_message(format!("Found {matches} matching rows"));
            }
            Some(CMDMode::ColumnFilter(field)) => {
                self.table.set_column_filter(field, Some(cmd_input));
                let matches = self.table.projection().filtered_count();
                self.set_status_message(format!(
                    "Filter on {}: {matches} matching rows",
                    field.name()
                ));
            }
            Some(CMDMode::Import) => match expand_path(&cmd_input) {
                Ok(path) => self.import(path),
                Err(e) => self.notify(Notification::error(e.to_string())),
            },
            None => {
                info!("Cmd mode is none!")
            }
        }
    }
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, DeckError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DeckError::InvalidPath("empty path".to_string()));
    }
    shellexpand::full(trimmed)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DeckError::InvalidPath(e.to_string()))
}
