use crate::infra::{parse_date, parse_role, TerminalShell};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use loan_console::config::{AppConfig, BackendConfig};
use loan_console::error::AppError;
use loan_console::telemetry;
use loan_console::workflows::loan::service::summarize;
use loan_console::workflows::loan::{
    compute_terms, ActingUser, BookingDetails, ConsoleShell, HttpLoanGateway, LoanApplicationId,
    LoanGateway, ModalKind, Role, TermsChange, TermsQuote, TriggerOutcome, UserSession,
    ViewError, WorkflowSummary, WorkflowView,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReviewAction {
    /// Run the status-specific primary action (approve, accept, resubmit, or book)
    Primary,
    /// Decline the application
    Cancel,
    /// Return the application to the previous stage
    Return,
}

#[derive(Args, Debug)]
pub(crate) struct ReviewArgs {
    /// Loan application identifier
    #[arg(long)]
    pub(crate) loan_id: String,
    /// Identifier of the signed-in user
    #[arg(long)]
    pub(crate) user_id: String,
    /// Role of the signed-in user, e.g. FIRST_REVIEWER
    #[arg(long, value_parser = parse_role)]
    pub(crate) role: Role,
    /// Act on behalf of another user
    #[arg(long, requires = "as_role")]
    pub(crate) as_user: Option<String>,
    /// Role of the impersonated user
    #[arg(long, value_parser = parse_role, requires = "as_user")]
    pub(crate) as_role: Option<Role>,
    /// Decision to submit; without it the application is only displayed
    #[arg(long, value_enum)]
    pub(crate) action: Option<ReviewAction>,
    /// Comment recorded with approve, cancel, and return decisions
    #[arg(long)]
    pub(crate) comment: Option<String>,
    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y')]
    pub(crate) yes: bool,
    /// Override LOAN_API_BASE_URL
    #[arg(long)]
    pub(crate) backend_url: Option<String>,
    #[command(flatten)]
    pub(crate) terms: TermsOverrides,
    #[command(flatten)]
    pub(crate) booking: BookingArgs,
}

/// Reviewer adjustments applied to the approval terms before approving.
#[derive(Args, Debug, Default, Clone, Copy)]
pub(crate) struct TermsOverrides {
    /// Approved loan amount
    #[arg(long)]
    pub(crate) amount: Option<f64>,
    /// Approved monthly rate, in percent
    #[arg(long)]
    pub(crate) rate: Option<f64>,
    /// Approved tenor, in months
    #[arg(long)]
    pub(crate) tenor: Option<u32>,
    /// Approved debt-service ratio, in percent
    #[arg(long)]
    pub(crate) dsr: Option<f64>,
}

impl TermsOverrides {
    pub(crate) fn changes(&self) -> Vec<TermsChange> {
        [
            self.amount.map(TermsChange::LoanAmount),
            self.rate.map(TermsChange::MonthlyRate),
            self.tenor.map(TermsChange::TenorMonths),
            self.dsr.map(TermsChange::DsrRate),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct BookingArgs {
    /// Loan product to book against
    #[arg(long)]
    pub(crate) product: Option<String>,
    /// Management fee charged at booking
    #[arg(long, default_value_t = 0.0)]
    pub(crate) management_fee: f64,
    /// First repayment date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) first_repayment: Option<NaiveDate>,
}

impl BookingArgs {
    pub(crate) fn details(&self) -> Result<BookingDetails, AppError> {
        let loan_product_id = self
            .product
            .clone()
            .ok_or_else(|| missing_booking("--product is required to book"))?;
        let first_repayment_date = self
            .first_repayment
            .ok_or_else(|| missing_booking("--first-repayment is required to book"))?;
        Ok(BookingDetails {
            loan_product_id,
            management_fee: self.management_fee,
            first_repayment_date,
        })
    }
}

fn missing_booking(message: &str) -> AppError {
    AppError::View(ViewError::InvalidBooking(message.to_string()))
}

#[derive(Args, Debug)]
pub(crate) struct TermsArgs {
    /// Loan amount
    #[arg(long)]
    pub(crate) amount: f64,
    /// Monthly rate, in percent
    #[arg(long)]
    pub(crate) rate: f64,
    /// Tenor, in months
    #[arg(long)]
    pub(crate) tenor: u32,
    /// Debt-service ratio, in percent
    #[arg(long)]
    pub(crate) dsr: f64,
    /// Net monthly income of the applicant
    #[arg(long)]
    pub(crate) income: f64,
}

pub(crate) fn run_terms(args: TermsArgs) -> Result<(), AppError> {
    let quote = compute_terms(args.amount, args.rate, args.tenor, args.dsr, args.income)
        .map_err(ViewError::from)?;
    println!("{}", render_quote(&quote));
    Ok(())
}

pub(crate) async fn run_review(args: ReviewArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(url) = &args.backend_url {
        config.backend.base_url = BackendConfig::normalize_base_url(url)?;
    }
    telemetry::init(&config.telemetry)?;

    let gateway = Arc::new(HttpLoanGateway::new(&config.backend)?);
    let shell = Arc::new(TerminalShell::new(args.yes));
    let view = WorkflowView::new(gateway, shell, acting_user(&args));

    view.load(&LoanApplicationId(args.loan_id.clone())).await?;
    execute(&view, &args).await
}

pub(crate) fn acting_user(args: &ReviewArgs) -> ActingUser {
    let user = ActingUser::new(args.user_id.clone(), args.role);
    let session = match (&args.as_user, args.as_role) {
        (Some(id), Some(role)) => {
            UserSession::new(user).impersonating(ActingUser::new(id.clone(), role))
        }
        _ => UserSession::new(user),
    };
    session.effective().clone()
}

/// Prints the loaded application, then runs the requested action to completion.
pub(crate) async fn execute<G, S>(
    view: &WorkflowView<G, S>,
    args: &ReviewArgs,
) -> Result<(), AppError>
where
    G: LoanGateway + 'static,
    S: ConsoleShell + 'static,
{
    let snapshot = view.snapshot();
    let loan = snapshot.loan.ok_or(ViewError::NotLoaded)?;
    let status = loan.application_status;
    println!("{}", render_summary(&summarize(loan, view.user())));

    let Some(action) = args.action else {
        return Ok(());
    };
    if !view.can_act() {
        return Err(AppError::Rejected(format!(
            "{} has no actions on a {} application",
            view.user().role,
            status.label().to_lowercase()
        )));
    }

    info!(loan_id = %args.loan_id, ?action, "running review action");
    let outcome = run_action(view, args, action).await;
    if !matches!(outcome, Ok(TriggerOutcome::Completed { .. })) {
        // The command exits here; no form stays open behind it.
        view.close_modal();
    }
    finish(outcome?)
}

async fn run_action<G, S>(
    view: &WorkflowView<G, S>,
    args: &ReviewArgs,
    action: ReviewAction,
) -> Result<TriggerOutcome, AppError>
where
    G: LoanGateway + 'static,
    S: ConsoleShell + 'static,
{
    Ok(match action {
        ReviewAction::Primary => match view.trigger_primary().await? {
            TriggerOutcome::ModalOpened(ModalKind::Progress) => submit_progress(view, args).await?,
            TriggerOutcome::ModalOpened(ModalKind::Book) => {
                view.submit_booking(args.booking.details()?).await?
            }
            other => other,
        },
        ReviewAction::Cancel => {
            view.trigger_cancel().await?;
            submit_progress(view, args).await?
        }
        ReviewAction::Return => {
            view.trigger_return().await?;
            submit_progress(view, args).await?
        }
    })
}

async fn submit_progress<G, S>(
    view: &WorkflowView<G, S>,
    args: &ReviewArgs,
) -> Result<TriggerOutcome, AppError>
where
    G: LoanGateway + 'static,
    S: ConsoleShell + 'static,
{
    let changes = args.terms.changes();
    if !changes.is_empty() {
        for change in changes {
            view.commit_terms(change)?;
        }
        println!("Revised {}", render_quote(&view.recompute_terms()?));
    }

    let comment = args.comment.as_deref().unwrap_or_default();
    Ok(view.submit_progress(comment).await?)
}

pub(crate) fn finish(outcome: TriggerOutcome) -> Result<(), AppError> {
    match outcome {
        TriggerOutcome::Failed { message } => Err(AppError::Rejected(message)),
        TriggerOutcome::Dismissed => {
            println!("Nothing submitted.");
            Ok(())
        }
        TriggerOutcome::Completed { .. }
        | TriggerOutcome::Ignored
        | TriggerOutcome::ModalOpened(_) => Ok(()),
    }
}

pub(crate) fn render_quote(quote: &TermsQuote) -> String {
    format!(
        "quote: repayment {:.2}/month, maximum loan {:.2}",
        quote.monthly_repayment, quote.maximum_loan_amount
    )
}

pub(crate) fn render_summary(summary: &WorkflowSummary) -> String {
    let loan = &summary.loan;
    let terms = &summary.terms;
    let mut lines = vec![
        format!(
            "Loan application {} ({})",
            loan.id,
            loan.application_status.label()
        ),
        format!(
            "  Requested: {:.2} over {} months, net monthly income {:.2}",
            loan.loan_amount, loan.loan_tenor_mths, loan.net_mthly_income
        ),
        format!(
            "  {}: {:.2} at {:.2}%/month over {} months, DSR {:.2}%",
            if summary.terms_approved {
                "Approved terms"
            } else {
                "Proposed terms"
            },
            terms.approved_loan_amount,
            terms.approved_mthly_rate,
            terms.approved_tenor_mths,
            terms.approved_dsr_rate
        ),
    ];
    if let Some(quote) = &summary.quote {
        lines.push(format!("  {}", render_quote(quote)));
    }

    let user = &summary.acting_user;
    if summary.can_act {
        let transitions: Vec<&str> = summary.transitions.iter().map(|flag| flag.code()).collect();
        lines.push(format!(
            "  Acting as {} ({}): {} [{}]",
            user.id,
            user.role,
            summary.action_label,
            transitions.join(", ")
        ));
    } else {
        lines.push(format!(
            "  Acting as {} ({}): no actions available",
            user.id, user.role
        ));
    }

    if !summary.trail.is_empty() {
        lines.push("Approval trail (newest first):".to_string());
        for entry in &summary.trail {
            let date = entry
                .date_completed
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "pending".to_string());
            lines.push(format!(
                "  {date} {} {} {}",
                entry.processor,
                entry.decision_flag,
                entry.comment.as_deref().unwrap_or("")
            ));
        }
    }

    lines.join("\n")
}
