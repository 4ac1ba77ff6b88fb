use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::{
    domain::MortgageDraft,
    state::{StalePolicy, StoreOptions},
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mortgage-client",
    about = "Mortgage application client",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive terminal UI (default).
    Tui,

    /// List mortgage applications.
    List,

    /// Submit a new mortgage application.
    Create(MortgageFields),

    /// Replace a mortgage application. Omitted fields keep their current value.
    Update(UpdateArgs),

    /// Delete a mortgage application.
    Delete(IdArgs),

    /// Ask the backend to recompute the credit rating.
    Rate(IdArgs),

    /// Show the stored credit rating.
    Rating(IdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub fields: MortgageFields,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MortgageFields {
    #[arg(long, value_name = "NAME")]
    pub applicant_name: Option<String>,

    #[arg(long, value_name = "AMOUNT")]
    pub income: Option<String>,

    #[arg(long, value_name = "AMOUNT")]
    pub debt_amount: Option<String>,

    #[arg(long, value_name = "300-850")]
    pub credit_score: Option<String>,

    #[arg(long, value_name = "AMOUNT")]
    pub loan_amount: Option<String>,

    #[arg(long, value_name = "AMOUNT")]
    pub property_value: Option<String>,

    #[arg(long, value_name = "fixed|adjustable")]
    pub loan_type: Option<String>,

    #[arg(long, value_name = "single_family|condo")]
    pub property_type: Option<String>,
}

impl MortgageFields {
    pub fn is_complete(&self) -> bool {
        self.applicant_name.is_some()
            && self.income.is_some()
            && self.debt_amount.is_some()
            && self.credit_score.is_some()
            && self.loan_amount.is_some()
            && self.property_value.is_some()
            && self.loan_type.is_some()
            && self.property_type.is_some()
    }

    /// Writes every provided flag over `draft`, leaving the rest untouched.
    pub fn overlay(&self, draft: &mut MortgageDraft) {
        let pairs = [
            (&self.applicant_name, &mut draft.applicant_name),
            (&self.income, &mut draft.income),
            (&self.debt_amount, &mut draft.debt_amount),
            (&self.credit_score, &mut draft.credit_score),
            (&self.loan_amount, &mut draft.loan_amount),
            (&self.property_value, &mut draft.property_value),
            (&self.loan_type, &mut draft.loan_type),
            (&self.property_type, &mut draft.property_type),
        ];
        for (src, dst) in pairs {
            if let Some(v) = src {
                *dst = v.clone();
            }
        }
    }

    pub fn to_draft(&self) -> MortgageDraft {
        let mut draft = MortgageDraft::default();
        self.overlay(&mut draft);
        draft
    }
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "MORTGAGE_API_BASE_URL",
        value_name = "ORIGIN",
        default_value = "http://localhost:8000"
    )]
    pub api_base_url: String,

    #[arg(
        long = "notification-timeout-ms",
        global = true,
        env = "MORTGAGE_NOTIFICATION_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = 6000,
        value_parser = clap::value_parser!(u64).range(0..=60000)
    )]
    pub notification_timeout_ms: u64,

    #[arg(
        long = "discard-stale-responses",
        global = true,
        env = "MORTGAGE_DISCARD_STALE_RESPONSES",
        value_name = "BOOL",
        default_value_t = false,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub discard_stale_responses: bool,
}

impl Config {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            stale_policy: if self.discard_stale_responses {
                StalePolicy::DiscardStale
            } else {
                StalePolicy::Apply
            },
            notification_timeout: match self.notification_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}
