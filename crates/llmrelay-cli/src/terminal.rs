//! Host collaborators for a terminal session.

use std::io::Write;

use llmrelay_core::{BoxFuture, Notifier, NotifyError};

/// Prints prompts to stderr. A one-shot CLI has nobody to click a button,
/// so every prompt resolves as dismissed.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    fn render(message: &str, choices: &[&str]) -> String {
        if choices.is_empty() {
            format!("warning: {message}")
        } else {
            format!("warning: {message} [{}]", choices.join(" | "))
        }
    }
}

impl Notifier for TerminalNotifier {
    fn show_warning<'a>(
        &'a self,
        message: &'a str,
        choices: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Option<String>, NotifyError>> {
        Box::pin(async move {
            writeln!(std::io::stderr(), "{}", Self::render(message, choices))
                .map_err(|e| NotifyError(e.to_string()))?;
            Ok(None)
        })
    }

    fn open_configuration_surface(&self) {
        eprintln!("hint: update the [credentials] section of your llmrelay config");
    }

    fn open_external(&self, url: &str) {
        eprintln!("see: {url}");
    }
}
