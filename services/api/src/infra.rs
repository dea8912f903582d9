use async_trait::async_trait;
use chrono::NaiveDate;
use loan_console::workflows::loan::{ConfirmPrompt, ConsoleShell, Notice, Role};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Console shell for the `review` command: prompts on the terminal, prints toasts.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalShell {
    assume_yes: bool,
}

impl TerminalShell {
    pub(crate) fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    async fn ask(&self, title: &str) -> std::io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{title} [y/N] ").as_bytes()).await?;
        stdout.flush().await?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;
        Ok(answer)
    }
}

#[async_trait]
impl ConsoleShell for TerminalShell {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            println!("{} (confirmed with --yes)", prompt.title);
            return true;
        }
        match self.ask(&prompt.title).await {
            Ok(answer) => is_affirmative(&answer),
            Err(err) => {
                warn!(error = %err, "unable to read confirmation; treating as declined");
                false
            }
        }
    }

    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::Success(message) => println!("[ok] {message}"),
            Notice::Error(message) => eprintln!("[error] {message}"),
        }
    }

    fn navigate(&self, route: &str) {
        println!("Returning to {route}");
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yeah"));
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(
            parse_date("2024-08-28"),
            Ok(NaiveDate::from_ymd_opt(2024, 8, 28).expect("valid"))
        );
        let err = parse_date("28/08/2024").expect_err("rejects day-first");
        assert!(err.contains("YYYY-MM-DD"));
    }

    #[test]
    fn parses_role_codes() {
        assert_eq!(parse_role("booking_operations"), Ok(Role::BookingOperations));
        assert_eq!(parse_role("FIRST-REVIEWER"), Ok(Role::FirstReviewer));
        assert_eq!(
            parse_role("auditor"),
            Err("unknown role 'auditor'".to_string())
        );
    }

    #[tokio::test]
    async fn assume_yes_skips_the_terminal() {
        let shell = TerminalShell::new(true);
        let prompt = ConfirmPrompt {
            title: "Accept this loan application?".to_string(),
            comment: "Accepted",
        };
        assert!(shell.confirm(&prompt).await);
    }
}
