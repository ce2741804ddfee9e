use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        Event, KeyCode, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time;
use tui_textarea::TextArea;

mod config;
mod db;
mod logger;
mod notes;

use crate::db::Repo;
use crate::notes::{tint, Note, NoteBook};

const TOAST_LIFETIME: Duration = Duration::from_secs(3);

#[derive(PartialEq, Debug)]
enum ActivePane {
    List,
    Form,
    DeleteConfirm,
    Search,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum FormField {
    Title,
    Description,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum ToastKind {
    Success,
    Error,
}

/// Transient feedback line. Carries a structured kind instead of encoding
/// severity in the message text, and a deadline instead of a one-shot
/// timer: setting a new toast re-arms the deadline, so an earlier toast's
/// expiry can never clear a later one.
#[derive(Debug)]
struct Toast {
    kind: ToastKind,
    message: String,
    until: Instant,
}

#[derive(Debug)]
enum Message {
    Key(event::KeyEvent),
    Resize(u16, u16),
    Paste(String),
    Tick,
}

const NOTEWALL_LOGO: &str = r###"   NOTEWALL
███╗   ██╗ ██████╗ ████████╗███████╗██╗    ██╗ █████╗ ██╗     ██╗
████╗  ██║██╔═══██╗╚══██╔══╝██╔════╝██║    ██║██╔══██╗██║     ██║
██╔██╗ ██║██║   ██║   ██║   █████╗  ██║ █╗ ██║███████║██║     ██║
██║╚██╗██║██║   ██║   ██║   ██╔══╝  ██║███╗██║██╔══██║██║     ██║
██║ ╚████║╚██████╔╝   ██║   ███████╗╚███╔███╔╝██║  ██║███████╗███████╗
╚═╝  ╚═══╝ ╚═════╝    ╚═╝   ╚══════╝ ╚══╝╚══╝ ╚═╝  ╚═╝╚══════╝╚══════╝"###;

struct Model<'a> {
    repo: Repo,
    book: NoteBook,
    filtered: Vec<Note>,
    list_state: ListState,
    title_input: TextArea<'a>,
    description_input: TextArea<'a>,
    search_input: TextArea<'a>,
    active_pane: ActivePane,
    form_field: FormField,
    edit_target: Option<i64>,
    note_to_delete: Option<Note>,
    toast: Option<Toast>,
    config: config::AppConfig,
}

impl<'a> Model<'a> {
    async fn new(repo: Repo, config: config::AppConfig) -> Result<Self> {
        let stored = repo.load_notes().await?;
        let book = NoteBook::from_stored(stored.as_deref());
        logger::log(&format!("Loaded {} notes from storage", book.len()));

        let mut search_input = TextArea::default();
        search_input.set_placeholder_text("Search notes by title...");

        let mut model = Self {
            repo,
            book,
            filtered: Vec::new(),
            list_state: ListState::default(),
            title_input: TextArea::default(),
            description_input: TextArea::default(),
            search_input,
            active_pane: ActivePane::List,
            form_field: FormField::Title,
            edit_target: None,
            note_to_delete: None,
            toast: None,
            config,
        };
        model.setup_search_block();
        model.refresh_filter();
        Ok(model)
    }

    fn setup_search_block(&mut self) {
        let theme = &self.config.theme;
        self.search_input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search ")
                .border_style(Style::default().fg(theme.search_border)),
        );
    }

    fn setup_form_blocks(&mut self) {
        let theme = &self.config.theme;
        let (title_border, desc_border) = match self.form_field {
            FormField::Title => (theme.border_active, theme.border_inactive),
            FormField::Description => (theme.border_inactive, theme.border_active),
        };
        self.title_input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Title ")
                .border_style(Style::default().fg(title_border)),
        );
        self.description_input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Description ")
                .border_style(Style::default().fg(desc_border)),
        );

        let active_cursor = Style::default().add_modifier(Modifier::REVERSED);
        match self.form_field {
            FormField::Title => {
                self.title_input.set_cursor_style(active_cursor);
                self.description_input.set_cursor_style(Style::default());
            }
            FormField::Description => {
                self.title_input.set_cursor_style(Style::default());
                self.description_input.set_cursor_style(active_cursor);
            }
        }
    }

    fn query(&self) -> String {
        self.search_input.lines()[0].clone()
    }

    /// Recomputes the visible list from the book and the live query, then
    /// clamps the selection.
    fn refresh_filter(&mut self) {
        let query = self.query();
        self.filtered = self.book.filtered(&query).into_iter().cloned().collect();

        if self.filtered.is_empty() {
            self.list_state.select(None);
        } else if self
            .list_state
            .selected()
            .map_or(true, |i| i >= self.filtered.len())
        {
            self.list_state.select(Some(0));
        }
    }

    fn selected_note(&self) -> Option<&Note> {
        self.list_state
            .selected()
            .and_then(|i| self.filtered.get(i))
    }

    fn set_toast(&mut self, kind: ToastKind, message: &str) {
        self.toast = Some(Toast {
            kind,
            message: message.to_string(),
            until: Instant::now() + TOAST_LIFETIME,
        });
    }

    /// Writes the full collection to storage. Called right after every
    /// mutation; a failure keeps the in-memory state and surfaces as an
    /// error toast plus a log line.
    async fn persist(&mut self) {
        let result = match self.book.to_json() {
            Ok(json) => self.repo.save_notes(&json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            logger::log(&format!("Failed to persist notes: {}", e));
            self.set_toast(ToastKind::Error, "Failed to save notes");
        }
    }

    fn open_form(&mut self, target: Option<&Note>) {
        match target {
            Some(note) => {
                self.edit_target = Some(note.id);
                self.title_input = TextArea::from([note.title.clone()]);
                self.description_input = TextArea::from(note.description.lines());
            }
            None => {
                self.edit_target = None;
                self.title_input = TextArea::default();
                self.description_input = TextArea::default();
            }
        }
        self.title_input.set_placeholder_text("Write title...");
        self.description_input
            .set_placeholder_text("Write your note here...");
        self.form_field = FormField::Title;
        self.active_pane = ActivePane::Form;
    }

    fn close_form(&mut self) {
        self.edit_target = None;
        self.title_input = TextArea::default();
        self.description_input = TextArea::default();
        self.active_pane = ActivePane::List;
    }

    /// Create or update, decided by the edit target. A blank title or
    /// description is a silent no-op and the form stays open.
    async fn submit_form(&mut self) {
        let title = self.title_input.lines().join(" ");
        let description = self.description_input.lines().join("\n");

        match self.edit_target {
            Some(id) => {
                if !self.book.update(id, &title, &description) {
                    return;
                }
                self.set_toast(ToastKind::Success, "Note edited successfully");
            }
            None => {
                if self.book.create(&title, &description).is_none() {
                    return;
                }
                self.set_toast(ToastKind::Success, "Note added successfully");
            }
        }

        self.persist().await;
        self.close_form();
        self.refresh_filter();
    }

    async fn confirm_delete(&mut self) {
        if let Some(note) = self.note_to_delete.take() {
            if self.book.delete(note.id) {
                self.set_toast(ToastKind::Error, "Note deleted successfully");
                self.persist().await;
                self.refresh_filter();
            }
        }
        self.active_pane = ActivePane::List;
    }

    async fn recolor_selected(&mut self) {
        let Some(id) = self.selected_note().map(|n| n.id) else {
            return;
        };
        if self.book.recolor(id) {
            self.persist().await;
            self.refresh_filter();
        }
    }

    async fn handle_key_event(&mut self, key: event::KeyEvent) -> Result<bool> {
        match self.active_pane {
            ActivePane::List => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Esc => {
                    if !self.search_input.lines()[0].is_empty() {
                        self.search_input = TextArea::default();
                        self.search_input
                            .set_placeholder_text("Search notes by title...");
                        self.setup_search_block();
                        self.refresh_filter();
                    }
                }
                KeyCode::Char('j') | KeyCode::Down => self.move_list_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.move_list_selection(-1),
                KeyCode::Char('n') | KeyCode::Char('a') => {
                    self.open_form(None);
                }
                KeyCode::Char('e') | KeyCode::Enter => {
                    if let Some(note) = self.selected_note().cloned() {
                        self.open_form(Some(&note));
                    }
                }
                KeyCode::Char('c') => {
                    self.recolor_selected().await;
                }
                KeyCode::Char('d') => {
                    if let Some(note) = self.selected_note().cloned() {
                        self.note_to_delete = Some(note);
                        self.active_pane = ActivePane::DeleteConfirm;
                    }
                }
                KeyCode::Char('/') => {
                    self.active_pane = ActivePane::Search;
                    self.setup_search_block();
                }
                _ => {}
            },
            ActivePane::Search => match key.code {
                KeyCode::Esc | KeyCode::Enter => {
                    self.active_pane = ActivePane::List;
                }
                _ => {
                    if self.search_input.input(key) {
                        self.refresh_filter();
                    }
                }
            },
            ActivePane::DeleteConfirm => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.confirm_delete().await;
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.active_pane = ActivePane::List;
                    self.note_to_delete = None;
                }
                _ => {}
            },
            ActivePane::Form => match key.code {
                KeyCode::Esc => self.close_form(),
                KeyCode::Tab => {
                    self.form_field = match self.form_field {
                        FormField::Title => FormField::Description,
                        FormField::Description => FormField::Title,
                    };
                }
                KeyCode::Char('s') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                    self.submit_form().await;
                }
                KeyCode::Enter => match self.form_field {
                    // The title is a single line; Enter advances instead.
                    FormField::Title => self.form_field = FormField::Description,
                    FormField::Description => {
                        self.description_input.input(key);
                    }
                },
                _ => match self.form_field {
                    FormField::Title => {
                        self.title_input.input(key);
                    }
                    FormField::Description => {
                        self.description_input.input(key);
                    }
                },
            },
        }
        Ok(false)
    }

    async fn update(&mut self, msg: Message) -> Result<bool> {
        match msg {
            Message::Key(key) => {
                if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    return self.handle_key_event(key).await;
                }
            }
            Message::Resize(_w, _h) => {}
            Message::Paste(text) => {
                let text = text.replace('\r', "");
                match self.active_pane {
                    ActivePane::Form => {
                        match self.form_field {
                            FormField::Title => self.title_input.insert_str(&text),
                            FormField::Description => self.description_input.insert_str(&text),
                        };
                    }
                    ActivePane::Search => {
                        self.search_input.insert_str(&text);
                        self.refresh_filter();
                    }
                    _ => {}
                }
            }
            Message::Tick => {
                if let Some(toast) = &self.toast {
                    if Instant::now() >= toast.until {
                        self.toast = None;
                    }
                }
            }
        }
        Ok(false)
    }

    async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut tick_interval = time::interval(Duration::from_millis(250));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _input_handle = std::thread::spawn(move || {
            while let Ok(evt) = event::read() {
                if tx.send(evt).is_err() {
                    break;
                }
            }
        });

        let mut should_render = true;

        loop {
            if should_render {
                terminal.draw(|f| self.ui(f))?;
                should_render = false;
            }

            let mut messages = Vec::new();
            tokio::select! {
                Some(event) = rx.recv() => {
                    let process_event = |e| match e {
                        Event::Key(key) => Some(Message::Key(key)),
                        Event::Resize(w, h) => Some(Message::Resize(w, h)),
                        Event::Paste(text) => Some(Message::Paste(text)),
                        _ => None,
                    };
                    if let Some(m) = process_event(event) {
                        messages.push(m);
                    }
                    while let Ok(e) = rx.try_recv() {
                        if let Some(m) = process_event(e) {
                            messages.push(m);
                        }
                    }
                }
                _ = tick_interval.tick() => messages.push(Message::Tick),
            }

            for msg in messages {
                if self.update(msg).await? {
                    return Ok(());
                }
                should_render = true;
            }
        }
    }

    fn move_list_selection(&mut self, delta: i32) {
        if self.filtered.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                let next = i as i32 + delta;
                if next < 0 {
                    0
                } else if next >= self.filtered.len() as i32 {
                    self.filtered.len() - 1
                } else {
                    next as usize
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn ui(&mut self, f: &mut Frame) {
        let theme = self.config.theme.clone();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8),
                Constraint::Min(1),
                Constraint::Length(2),
            ])
            .split(f.area());

        let count_text = match self.book.len() {
            1 => "1 note stored locally".to_string(),
            n => format!("{} notes stored locally", n),
        };
        let header_content = format!(
            "{}\n {} • {}",
            NOTEWALL_LOGO,
            config::APP_VERSION,
            count_text
        );
        let header = Paragraph::new(header_content)
            .alignment(ratatui::layout::Alignment::Center)
            .style(Style::default().fg(theme.logo).add_modifier(Modifier::BOLD));
        f.render_widget(header, chunks[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[1]);

        let selected_index = self.list_state.selected();
        let items: Vec<ListItem> = self
            .filtered
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let is_selected = Some(i) == selected_index;
                let title_line = Line::from(Span::styled(
                    format!("  {}", sanitize_line(&n.title)),
                    Style::default()
                        .fg(tint(&n.background_color))
                        .add_modifier(Modifier::BOLD),
                ));
                let body = n.description.lines().next().unwrap_or("");
                let body_line = if is_selected {
                    Line::from(format!("    {}", sanitize_line(body)))
                } else {
                    Line::from(Span::styled(
                        format!("    {}", sanitize_line(body)),
                        Style::default().fg(Color::DarkGray),
                    ))
                };
                ListItem::new(vec![title_line, body_line])
            })
            .collect();

        let query = self.query();
        let list_title = if query.is_empty() {
            " Notes ".to_string()
        } else {
            let display_query: String = if query.chars().count() > 15 {
                format!("{}..", query.chars().take(12).collect::<String>())
            } else {
                query.clone()
            };
            format!(" Notes (Filter: \"{}\") ", display_query)
        };

        let border_color = if self.active_pane == ActivePane::List {
            theme.border_active
        } else {
            theme.border_inactive
        };
        let list_block = Block::default()
            .borders(Borders::ALL)
            .title(list_title)
            .border_style(Style::default().fg(border_color));

        if self.filtered.is_empty() {
            let msg = if self.book.is_empty() {
                "No notes yet! Add a note now!"
            } else {
                "No matching notes found"
            };
            let p = Paragraph::new(format!("\n  {}", msg))
                .style(Style::default().fg(theme.empty_state))
                .block(list_block);
            f.render_widget(p, main_chunks[0]);
        } else {
            let list = List::new(items)
                .block(list_block)
                .highlight_style(
                    Style::default()
                        .bg(theme.selection_bg)
                        .fg(theme.selection_fg)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol(">>");
            f.render_stateful_widget(list, main_chunks[0], &mut self.list_state);
        }

        let detail = self
            .selected_note()
            .map(|n| (n.title.clone(), n.description.clone(), n.background_color.clone()));
        match detail {
            Some((title, description, tag)) => {
                let block = Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", sanitize_line(&title)));
                let card = Paragraph::new(description)
                    .block(block)
                    .style(Style::default().bg(tint(&tag)).fg(theme.note_text))
                    .wrap(Wrap { trim: false });
                f.render_widget(card, main_chunks[1]);
            }
            None => {
                let block = Block::default()
                    .borders(Borders::ALL)
                    .title(" Note ")
                    .border_style(Style::default().fg(theme.border_inactive));
                f.render_widget(block, main_chunks[1]);
            }
        }

        if self.active_pane == ActivePane::Form {
            self.render_form(f);
        } else if self.active_pane == ActivePane::DeleteConfirm {
            self.render_delete_confirm(f, chunks[1]);
        } else if self.active_pane == ActivePane::Search {
            let area = centered_rect(60, 20, f.area());
            let area = ratatui::layout::Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: 3,
            };
            f.render_widget(Clear, area);
            f.render_widget(&self.search_input, area);
        }

        let help_text = match self.active_pane {
            ActivePane::List => {
                if query.is_empty() {
                    " j/k: Move  •  n: New  •  Enter/e: Edit  •  c: Recolor  •  d: Delete  •  /: Search  •  q: Quit "
                } else {
                    " j/k: Move  •  Enter/e: Edit  •  /: Filter  •  Esc: Clear Filter  •  q: Quit "
                }
            }
            ActivePane::Form => " Tab: Switch Field  •  Ctrl+S: Save  •  Esc: Cancel ",
            ActivePane::DeleteConfirm => " y: Confirm  •  n: Cancel ",
            ActivePane::Search => " Type to Filter  •  Enter/Esc: Close ",
        };

        let footer_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(1)])
            .split(chunks[2]);

        let (toast_text, toast_color) = match &self.toast {
            Some(toast) => {
                let color = match toast.kind {
                    ToastKind::Success => theme.toast_success,
                    ToastKind::Error => theme.toast_error,
                };
                (format!(" {} ", toast.message), color)
            }
            None => (String::new(), theme.help),
        };
        f.render_widget(
            Paragraph::new(toast_text)
                .style(Style::default().fg(toast_color).add_modifier(Modifier::BOLD)),
            footer_chunks[0],
        );
        f.render_widget(
            Paragraph::new(help_text)
                .style(Style::default().fg(theme.help))
                .wrap(Wrap { trim: true }),
            footer_chunks[1],
        );
    }

    fn render_form(&mut self, f: &mut Frame) {
        self.setup_form_blocks();
        let theme = &self.config.theme;

        let title = if self.edit_target.is_some() {
            " Edit Note "
        } else {
            " New Note "
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(theme.border_active));

        let area = centered_rect(60, 60, f.area());
        f.render_widget(Clear, area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .margin(2)
            .split(area);

        f.render_widget(&self.title_input, chunks[0]);
        f.render_widget(&self.description_input, chunks[1]);

        let hint = Paragraph::new("Tab: Switch Field  •  Ctrl+S: Save  •  Esc: Cancel")
            .alignment(ratatui::layout::Alignment::Center)
            .style(Style::default().fg(theme.help));
        f.render_widget(hint, chunks[2]);
    }

    fn render_delete_confirm(&self, f: &mut Frame, area: ratatui::layout::Rect) {
        let theme = &self.config.theme;
        let note_title = self
            .note_to_delete
            .as_ref()
            .map(|n| n.title.as_str())
            .unwrap_or("");

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Delete Note? ")
            .border_style(Style::default().fg(theme.toast_error));

        let text = format!(
            "\n  Are you sure you want to delete this note?\n\n  \"{}\"\n\n  (y/n)",
            sanitize_line(note_title)
        );
        let p = Paragraph::new(text)
            .block(block)
            .alignment(ratatui::layout::Alignment::Center);

        let confirm_area = centered_rect(40, 30, area);
        f.render_widget(Clear, confirm_area);
        f.render_widget(p, confirm_area);
    }
}

fn sanitize_line(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    sanitized.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn centered_rect(
    percent_x: u16,
    percent_y: u16,
    r: ratatui::layout::Rect,
) -> ratatui::layout::Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    Ok(())
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI application (default)
    Tui,
    /// Delete every stored note
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));

    logger::init();
    let repo = Repo::new()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Reset) => {
            repo.clear().await?;
            println!("Stored notes cleared.");
            return Ok(());
        }
        None | Some(Commands::Tui) => {
            // Proceed to TUI
        }
    }

    let app_config = config::load_config();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut model = Model::new(repo, app_config).await?;
    let model_result = model.run(&mut terminal).await;

    let _ = restore_terminal();
    if let Err(err) = model_result {
        eprintln!("Error: {:?}", err);
    }
    Ok(())
}
