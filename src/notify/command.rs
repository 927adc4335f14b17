use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{NotificationIntent, Notifier};
use crate::error::PulseError;

/// Shows notifications by running an external program such as
/// `notify-send` or `terminal-notifier`.
///
/// Every argument may contain `{title}`, `{body}` and `{id}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    argv: Vec<String>,
}

impl CommandNotifier {
    pub fn new(argv: Vec<String>) -> Result<Self, PulseError> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(PulseError::ConfigError(
                "notify_command must name a program".to_string(),
            ));
        }
        Ok(Self { argv })
    }

    pub fn render(&self, intent: &NotificationIntent) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{title}", &intent.title)
                    .replace("{body}", &intent.body)
                    .replace("{id}", &intent.id)
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
        let argv = self.render(intent);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PulseError::delivery(&intent.id, "empty notify command"))?;

        debug!("Running {} for notification {}", program, intent.id);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PulseError::delivery(&intent.id, format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PulseError::delivery(
                &intent.id,
                format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> NotificationIntent {
        NotificationIntent {
            id: "comment-org:widgets-1-10".to_string(),
            title: "widgets #1".to_string(),
            body: "New comment by alice: hi".to_string(),
        }
    }

    #[test]
    fn test_rejects_empty_command() {
        assert!(CommandNotifier::new(vec![]).is_err());
        assert!(CommandNotifier::new(vec!["  ".to_string()]).is_err());
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let notifier = CommandNotifier::new(vec![
            "notify-send".to_string(),
            "--app-name=pr-pulse".to_string(),
            "{title}".to_string(),
            "{body} ({id})".to_string(),
        ])
        .unwrap();

        assert_eq!(
            notifier.render(&intent()),
            vec![
                "notify-send",
                "--app-name=pr-pulse",
                "widgets #1",
                "New comment by alice: hi (comment-org:widgets-1-10)",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deliver_passes_rendered_arguments() {
        let notifier = CommandNotifier::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "test \"$0\" = 'widgets #1'".to_string(),
            "{title}".to_string(),
        ])
        .unwrap();
        notifier.deliver(&intent()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_a_delivery_error() {
        let notifier = CommandNotifier::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ])
        .unwrap();
        let err = notifier.deliver(&intent()).await.unwrap_err();
        match err {
            PulseError::DeliveryError(message) => assert!(message.contains("boom")),
            other => panic!("Expected DeliveryError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_a_delivery_error() {
        let notifier = CommandNotifier::new(vec!["pr-pulse-no-such-program".to_string()]).unwrap();
        let err = notifier.deliver(&intent()).await.unwrap_err();
        assert!(matches!(err, PulseError::DeliveryError(_)));
    }
}
