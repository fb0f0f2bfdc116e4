//! Interactive stdin prompt renderer for the confirmation engine.

use async_trait::async_trait;
use owo_colors::OwoColorize;
use std::io::Write;

use squall_core::{Error, Result, RiskCategory};
use squall_guard::{ConfirmationResponse, PendingConfirmation, PromptRenderer};

/// Renders confirmation prompts on stderr and reads the answer from stdin.
///
/// Answers: `y` allow once, `t` allow and trust for the session, `n` deny
/// once, `b` deny and block for the session. Anything else denies.
#[derive(Debug, Default)]
pub struct StdinPrompt;

pub fn paint_category(category: RiskCategory) -> String {
    match category {
        RiskCategory::Safe => category.to_string().green().to_string(),
        RiskCategory::Low => category.to_string().cyan().to_string(),
        RiskCategory::Medium => category.to_string().yellow().to_string(),
        RiskCategory::High => category.to_string().red().to_string(),
        RiskCategory::Critical => category.to_string().bright_red().bold().to_string(),
    }
}

fn render(pending: &PendingConfirmation) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err);
    let _ = writeln!(
        err,
        "{} {} [{}]",
        "confirm:".bold(),
        pending.command,
        paint_category(pending.assessment.category)
    );
    for factor in &pending.assessment.risk_factors {
        let _ = writeln!(err, "  - {}", factor);
    }
    for suggestion in &pending.assessment.context.mitigation_suggestions {
        let _ = writeln!(err, "  {} {}", "hint:".dimmed(), suggestion);
    }
    let _ = write!(
        err,
        "  [y] allow once  [t] trust for session  [n] deny  [b] block for session > "
    );
    let _ = err.flush();
}

#[async_trait]
impl PromptRenderer for StdinPrompt {
    async fn show(&self, pending: &PendingConfirmation) -> Result<ConfirmationResponse> {
        render(pending);

        let line = tokio::task::spawn_blocking(|| {
            let mut buffer = String::new();
            std::io::stdin().read_line(&mut buffer).map(|_| buffer)
        })
        .await
        .map_err(|e| Error::Unknown(format!("prompt task failed: {}", e)))?
        .map_err(|e| Error::Unknown(format!("failed to read stdin: {}", e)))?;

        let response = match line.trim().to_lowercase().as_str() {
            "y" | "yes" => ConfirmationResponse::allow(),
            "t" | "trust" => ConfirmationResponse::trust(),
            "b" | "block" => ConfirmationResponse::block(),
            _ => ConfirmationResponse::deny(),
        };

        Ok(response)
    }

    fn name(&self) -> &str {
        "stdin"
    }
}
