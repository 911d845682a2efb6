//! Dialers the CLI can drive: an external program per call, or a dry run.

use autodial_core::config::DialerConfig;
use autodial_core::{DialError, Dialer};
use std::process::Stdio;
use std::sync::Arc;

/// Runs the configured program for each call, with `{number}` substituted
/// into its arguments. The program is spawned and left running; the
/// scheduler does not wait for the call to end.
pub struct CommandDialer {
    program: String,
    args: Vec<String>,
}

impl CommandDialer {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }

    fn args_for(&self, number: &str) -> Vec<String> {
        self.args.iter().map(|a| a.replace("{number}", number)).collect()
    }
}

impl Dialer for CommandDialer {
    fn place_call(&self, number: &str) -> Result<(), DialError> {
        let args = self.args_for(number);
        tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    DialError::Unavailable(format!("{}: {e}", self.program))
                }
                _ => DialError::Failed(format!("{}: {e}", self.program)),
            })?;
        tracing::debug!("📞 {} {}", self.program, args.join(" "));
        Ok(())
    }
}

/// Logs each call instead of placing it.
pub struct LogDialer;

impl Dialer for LogDialer {
    fn place_call(&self, number: &str) -> Result<(), DialError> {
        tracing::info!("📞 [dry-run] would dial {number}");
        Ok(())
    }
}

/// Pick the dialer for a run.
pub fn from_config(config: &DialerConfig, dry_run: bool) -> Arc<dyn Dialer> {
    match (&config.command, dry_run) {
        (Some(program), false) if !program.trim().is_empty() => {
            Arc::new(CommandDialer::new(program, &config.args))
        }
        _ => {
            tracing::info!("🧪 No dialer command configured (or --dry-run): calls are logged only");
            Arc::new(LogDialer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_substitution() {
        let dialer = CommandDialer::new(
            "adb",
            &["shell".into(), "am start -d tel:{number}".into()],
        );
        assert_eq!(
            dialer.args_for("+84901"),
            vec!["shell".to_string(), "am start -d tel:+84901".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let dialer = CommandDialer::new("autodial-no-such-program", &["{number}".into()]);
        assert!(matches!(
            dialer.place_call("111"),
            Err(DialError::Unavailable(_))
        ));
    }

    #[test]
    fn test_dry_run_wins() {
        let config = DialerConfig {
            command: Some("true".into()),
            args: vec![],
        };
        assert!(from_config(&config, true).place_call("1").is_ok());
    }
}
