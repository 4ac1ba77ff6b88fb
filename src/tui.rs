use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{event, execute};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tokio::runtime::Handle;

use crate::cli::ExitError;
use crate::domain::{LoanType, MortgageDraft, MortgageId, MortgageInput, PropertyType};
use crate::state::{AppState, OpStatus, Severity, Store};
use crate::view;

pub async fn cmd_tui(store: Store, api_base_url: String) -> Result<(), ExitError> {
    let mut terminal = setup_terminal().map_err(|e| {
        restore_terminal();
        ExitError::new(2, format!("terminal: {e}"))
    })?;

    let handle = Handle::current();
    execute_intent(&store, &handle, Intent::Refresh);

    let mut app = App::new(api_base_url);
    tokio::task::block_in_place(|| run_loop(&mut terminal, &mut app, &store, &handle));

    restore_terminal();
    Ok(())
}

fn setup_terminal() -> io::Result<Terminal<ratatui::backend::CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))
}

/// Best effort; safe to call when setup only partly succeeded.
fn restore_terminal() {
    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
}

fn run_loop(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    app: &mut App,
    store: &Store,
    handle: &Handle,
) {
    loop {
        let state = store.state();
        terminal.draw(|f| ui(f, app, &state)).ok();

        if !event::poll(Duration::from_millis(200)).unwrap_or(false) {
            continue;
        }

        let Ok(Event::Key(key)) = event::read() else {
            continue;
        };
        match app.handle_key(key, &state) {
            Some(Action::Quit) => return,
            Some(Action::Dispatch(intent)) => execute_intent(store, handle, intent),
            None => {}
        }
    }
}

/// Store operation requested by a key press.
#[derive(Debug, Clone, PartialEq)]
enum Intent {
    Refresh,
    Create(MortgageInput),
    Update(MortgageId, MortgageInput),
    Delete(MortgageId),
    Rate(MortgageId),
    FetchRating(MortgageId),
    DismissNotification,
}

#[derive(Debug, PartialEq)]
enum Action {
    Quit,
    Dispatch(Intent),
}

/// Mutations are followed by a list refetch so the table mirrors the backend.
fn execute_intent(store: &Store, handle: &Handle, intent: Intent) {
    let store = store.clone();
    match intent {
        Intent::DismissNotification => store.dismiss_notification(),
        Intent::Refresh => {
            handle.spawn(async move {
                let _ = store.fetch_mortgages().await;
            });
        }
        Intent::Create(input) => {
            handle.spawn(async move {
                if store.create_mortgage(input).await.is_ok() {
                    let _ = store.fetch_mortgages().await;
                }
            });
        }
        Intent::Update(id, input) => {
            handle.spawn(async move {
                if store.update_mortgage(id, input).await.is_ok() {
                    let _ = store.fetch_mortgages().await;
                }
            });
        }
        Intent::Delete(id) => {
            handle.spawn(async move {
                if store.delete_mortgage(id).await.is_ok() {
                    let _ = store.fetch_mortgages().await;
                }
            });
        }
        Intent::Rate(id) => {
            handle.spawn(async move {
                let _ = store.calculate_rating(id).await;
            });
        }
        Intent::FetchRating(id) => {
            handle.spawn(async move {
                let _ = store.refresh_rating(id).await;
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Form {
    editing: Option<MortgageId>,
    draft: MortgageDraft,
    focus: usize,
    error: Option<String>,
}

impl Form {
    /// Fields plus the trailing submit row.
    const ROWS: usize = MortgageDraft::FIELDS.len() + 1;

    fn focused_field(&self) -> Option<&'static str> {
        MortgageDraft::FIELDS.get(self.focus).copied()
    }

    fn cycle_choice(&mut self, forward: bool) {
        let Some(field) = self.focused_field() else {
            return;
        };
        let choices: Vec<&'static str> = match field {
            "loan_type" => LoanType::ALL.iter().map(|v| v.as_str()).collect(),
            "property_type" => PropertyType::ALL.iter().map(|v| v.as_str()).collect(),
            _ => return,
        };
        let Some(value) = self.draft.field_mut(field) else {
            return;
        };
        let next = match choices.iter().position(|c| *c == value.as_str()) {
            Some(i) if forward => (i + 1) % choices.len(),
            Some(i) => (i + choices.len() - 1) % choices.len(),
            None => 0,
        };
        *value = choices[next].to_string();
    }

    fn submit(&mut self) -> Option<Intent> {
        match self.draft.into_input() {
            Ok(input) => Some(match self.editing.clone() {
                Some(id) => Intent::Update(id, input),
                None => Intent::Create(input),
            }),
            Err(e) => {
                self.error = Some(e.to_string());
                if let Some(i) = MortgageDraft::FIELDS.iter().position(|f| *f == e.field()) {
                    self.focus = i;
                }
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    List,
    Form(Form),
    ConfirmDelete(MortgageId),
}

struct App {
    api_base_url: String,
    list_state: ListState,
    screen: Screen,
}

impl App {
    fn new(api_base_url: String) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            api_base_url,
            list_state,
            screen: Screen::List,
        }
    }

    fn selected_id(&self, state: &AppState) -> Option<MortgageId> {
        let i = self.list_state.selected()?;
        state.mortgages.get(i).map(|m| m.id.clone())
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        if self.screen == Screen::List {
            return self.handle_list_key(key, state);
        }
        match &mut self.screen {
            Screen::List => None,
            Screen::ConfirmDelete(id) => {
                let id = id.clone();
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.screen = Screen::List;
                        Some(Action::Dispatch(Intent::Delete(id)))
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.screen = Screen::List;
                        None
                    }
                    _ => None,
                }
            }
            Screen::Form(form) => {
                let action = handle_form_key(form, key)?;
                self.screen = Screen::List;
                match action {
                    FormAction::Cancel => None,
                    FormAction::Submit(intent) => Some(Action::Dispatch(intent)),
                }
            }
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent, state: &AppState) -> Option<Action> {
        let len = state.mortgages.len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Down | KeyCode::Char('j') => {
                let i = self.list_state.selected().map_or(0, |i| i + 1);
                self.list_state.select(Some(i.min(len.saturating_sub(1))));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let i = self.list_state.selected().unwrap_or(0);
                self.list_state.select(Some(i.saturating_sub(1)));
            }
            KeyCode::Char('r') => return Some(Action::Dispatch(Intent::Refresh)),
            KeyCode::Char('x') => return Some(Action::Dispatch(Intent::DismissNotification)),
            KeyCode::Char('n') => {
                self.screen = Screen::Form(Form {
                    editing: None,
                    draft: MortgageDraft::default(),
                    focus: 0,
                    error: None,
                });
            }
            KeyCode::Char('e') => {
                let id = self.selected_id(state)?;
                let record = state.find(&id)?;
                self.screen = Screen::Form(Form {
                    editing: Some(id),
                    draft: MortgageDraft::from(record),
                    focus: 0,
                    error: None,
                });
            }
            KeyCode::Char('d') => {
                self.screen = Screen::ConfirmDelete(self.selected_id(state)?);
            }
            KeyCode::Char('c') => {
                return Some(Action::Dispatch(Intent::Rate(self.selected_id(state)?)));
            }
            KeyCode::Char('g') => {
                let id = self.selected_id(state)?;
                return Some(Action::Dispatch(Intent::FetchRating(id)));
            }
            _ => {}
        }
        None
    }
}

enum FormAction {
    Cancel,
    Submit(Intent),
}

fn handle_form_key(form: &mut Form, key: KeyEvent) -> Option<FormAction> {
    match key.code {
        KeyCode::Esc => return Some(FormAction::Cancel),
        KeyCode::Tab | KeyCode::Down => form.focus = (form.focus + 1).min(Form::ROWS - 1),
        KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.saturating_sub(1),
        KeyCode::Left => form.cycle_choice(false),
        KeyCode::Right => form.cycle_choice(true),
        KeyCode::Enter => {
            if form.focus == Form::ROWS - 1 {
                return form.submit().map(FormAction::Submit);
            }
            form.focus += 1;
        }
        KeyCode::Backspace => {
            if let Some(value) = form.focused_field().and_then(|f| form.draft.field_mut(f)) {
                value.pop();
            }
        }
        KeyCode::Char(' ') if matches!(form.focused_field(), Some("loan_type" | "property_type")) => {
            form.cycle_choice(true);
        }
        KeyCode::Char(c) => {
            if let Some(value) = form.focused_field().and_then(|f| form.draft.field_mut(f)) {
                value.push(c);
            }
        }
        _ => {}
    }
    None
}

fn ui(f: &mut Frame, app: &mut App, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let mut title = format!("Mortgage Applications · {}", app.api_base_url);
    if state.loading {
        title.push_str(" · loading…");
    }
    let header =
        Paragraph::new(title).block(Block::default().borders(Borders::ALL).title("Overview"));
    f.render_widget(header, chunks[0]);

    match &app.screen {
        Screen::List => render_list(f, chunks[1], &mut app.list_state, state),
        Screen::Form(form) => render_form(f, chunks[1], form),
        Screen::ConfirmDelete(id) => {
            let p = Paragraph::new(format!(
                "Delete mortgage application {id}? This cannot be undone. (y/n)"
            ))
            .block(Block::default().borders(Borders::ALL).title("Confirm Delete"));
            f.render_widget(p, chunks[1]);
        }
    }

    let footer = if state.notification.visible {
        let color = match state.notification.severity {
            Severity::Success => Color::Green,
            Severity::Info => Color::Cyan,
            Severity::Warning => Color::Yellow,
            Severity::Error => Color::Red,
        };
        Paragraph::new(state.notification.message.clone())
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).title("Notice · x: dismiss"))
    } else {
        let help = match app.screen {
            Screen::List => {
                "↑/↓: select · n: new · e: edit · d: delete · c: rate · g: stored rating · r: refresh · q: quit"
            }
            Screen::Form(_) => {
                "Tab/↑/↓: field · ←/→: choose · Type: edit · Enter on SUBMIT: save · Esc: cancel"
            }
            Screen::ConfirmDelete(_) => "y: delete · n/Esc: cancel",
        };
        Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Help"))
    };
    f.render_widget(footer, chunks[2]);
}

fn render_list(f: &mut Frame, area: Rect, list_state: &mut ListState, state: &AppState) {
    if let OpStatus::Err { message, .. } = &state.ops.fetch {
        let banner = Paragraph::new(message.clone())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("Error · r: retry"));
        f.render_widget(banner, area);
        return;
    }

    if state.mortgages.is_empty() {
        let empty = Paragraph::new("No mortgage applications yet. Press n to add one.")
            .block(Block::default().borders(Borders::ALL).title("Applications"));
        f.render_widget(empty, area);
        return;
    }

    if list_state.selected().is_none_or(|i| i >= state.mortgages.len()) {
        list_state.select(Some(state.mortgages.len() - 1));
    }

    let items: Vec<ListItem<'static>> = state
        .mortgages
        .iter()
        .map(|m| {
            let cells = view::row(m);
            let rating_color = match cells[8].as_str() {
                "AAA" => Color::Green,
                "BBB" => Color::Yellow,
                "C" => Color::Red,
                _ => Color::DarkGray,
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("#{:<5} {:<24} ", cells[0], cells[1])),
                Span::raw(format!(
                    "income {:>12} · loan {:>12} · value {:>12} · score {} · {} · {} ",
                    cells[2], cells[3], cells[4], cells[5], cells[6], cells[7]
                )),
                Span::styled(cells[8].clone(), Style::default().fg(rating_color)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Applications"))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol(">");
    f.render_stateful_widget(list, area, list_state);
}

fn render_form(f: &mut Frame, area: Rect, form: &Form) {
    let title = if form.editing.is_some() {
        "Edit Mortgage Application"
    } else {
        "New Mortgage Application"
    };

    let mut items: Vec<ListItem<'static>> = MortgageDraft::FIELDS
        .iter()
        .map(|field| item(field_label(field), form.draft.field(field).unwrap_or("")))
        .collect();
    items.push(item("SUBMIT", "press Enter"));

    let mut block = Block::default().borders(Borders::ALL).title(title);
    if let Some(err) = &form.error {
        block = block.title_bottom(Line::from(err.clone()).style(Style::default().fg(Color::Red)));
    }

    let mut list_state = ListState::default();
    list_state.select(Some(form.focus));
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol(">");
    f.render_stateful_widget(list, area, &mut list_state);
}

fn field_label(field: &str) -> &'static str {
    match field {
        "applicant_name" => "Applicant Name",
        "income" => "Annual Income",
        "debt_amount" => "Existing Debt",
        "credit_score" => "Credit Score",
        "loan_amount" => "Loan Amount",
        "property_value" => "Property Value",
        "loan_type" => "Loan Type (←/→)",
        "property_type" => "Property Type (←/→)",
        _ => "",
    }
}

fn item(label: &str, value: &str) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::Yellow)),
        Span::raw(value.to_string()),
    ]))
}
