use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use crate::api::{ApiError, HttpMortgageService};
use crate::config::{Cli, Command, IdArgs, MortgageFields, UpdateArgs};
use crate::domain::{MortgageDraft, MortgageId, RatingResult};
use crate::state::{Severity, Store};
use crate::{tui, view};

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiError> for ExitError {
    fn from(e: ApiError) -> Self {
        let message = e.message().unwrap_or_else(|| e.to_string());
        match e {
            ApiError::Transport(_) => Self::new(3, format!("network_error: {message}")),
            ApiError::Http { .. } | ApiError::Decode(_) => {
                Self::new(4, format!("request_failed: {message}"))
            }
        }
    }
}

pub async fn run() -> i32 {
    let cli = Cli::parse();

    let service = match HttpMortgageService::try_new(&cli.config.api_base_url) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("invalid_args: {e:#}");
            return 2;
        }
    };
    let store = Store::new(Arc::new(service), cli.config.store_options());
    let json = cli.json;

    let res: Result<(), ExitError> = match cli.command {
        Some(Command::List) => cmd_list(&store, json).await,
        Some(Command::Create(fields)) => cmd_create(&store, fields, json).await,
        Some(Command::Update(args)) => cmd_update(&store, args, json).await,
        Some(Command::Delete(args)) => cmd_delete(&store, args).await,
        Some(Command::Rate(args)) => cmd_rate(&store, args, json).await,
        Some(Command::Rating(args)) => cmd_rating(&store, args, json).await,
        Some(Command::Tui) | None => tui::cmd_tui(store, cli.config.api_base_url).await,
    };

    match res {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e.message);
            e.code
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ExitError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| ExitError::new(4, format!("serialize: {e}")))?;
    println!("{out}");
    Ok(())
}

/// Echoes a success notification on stderr. Failures surface as the exit message.
fn report_notification(store: &Store) {
    let state = store.state();
    if state.notification.visible && state.notification.severity == Severity::Success {
        eprintln!("{}", state.notification.message);
    }
}

fn draft_input(draft: &MortgageDraft) -> Result<crate::domain::MortgageInput, ExitError> {
    draft
        .into_input()
        .map_err(|e| ExitError::new(2, format!("invalid_args: {e}")))
}

async fn cmd_list(store: &Store, json: bool) -> Result<(), ExitError> {
    store.fetch_mortgages().await?;
    let state = store.state();
    if json {
        return print_json(&state.mortgages);
    }
    print!("{}", view::render_table(&state.mortgages));
    Ok(())
}

async fn cmd_create(store: &Store, fields: MortgageFields, json: bool) -> Result<(), ExitError> {
    let input = draft_input(&fields.to_draft())?;
    let res = store.create_mortgage(input).await;
    report_notification(store);
    let created = res?;
    if json {
        return print_json(&created);
    }
    print!("{}", view::render_record(&created));
    Ok(())
}

async fn cmd_update(store: &Store, args: UpdateArgs, json: bool) -> Result<(), ExitError> {
    let id = MortgageId::new(args.id);
    let draft = if args.fields.is_complete() {
        args.fields.to_draft()
    } else {
        // Partial updates start from the backend's current record.
        store.fetch_mortgages().await?;
        let state = store.state();
        let current = state
            .find(&id)
            .ok_or_else(|| ExitError::new(4, format!("not_found: mortgage application {id}")))?;
        let mut draft = MortgageDraft::from(current);
        args.fields.overlay(&mut draft);
        draft
    };
    let input = draft_input(&draft)?;

    let res = store.update_mortgage(id, input).await;
    report_notification(store);
    let updated = res?;
    if json {
        return print_json(&updated);
    }
    print!("{}", view::render_record(&updated));
    Ok(())
}

async fn cmd_delete(store: &Store, args: IdArgs) -> Result<(), ExitError> {
    let res = store.delete_mortgage(MortgageId::new(args.id)).await;
    report_notification(store);
    res?;
    Ok(())
}

fn print_rating(result: &RatingResult, json: bool) -> Result<(), ExitError> {
    if json {
        return print_json(result);
    }
    println!("{}: {}", result.mortgage_id, result.rating);
    Ok(())
}

async fn cmd_rate(store: &Store, args: IdArgs, json: bool) -> Result<(), ExitError> {
    let result = store.calculate_rating(MortgageId::new(args.id)).await?;
    print_rating(&result, json)
}

async fn cmd_rating(store: &Store, args: IdArgs, json: bool) -> Result<(), ExitError> {
    let result = store.refresh_rating(MortgageId::new(args.id)).await?;
    print_rating(&result, json)
}
