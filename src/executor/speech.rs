// Text-to-speech through the platform's command-line synthesiser.
use tokio::process::Command;

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechCommand {
    program: String,
    args: Vec<String>,
}

impl SpeechCommand {
    /// `configured` is split on whitespace; the message is appended as the last argument.
    pub fn from_config(configured: Option<&str>) -> Self {
        if let Some(cmd) = configured {
            let mut parts = cmd.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                return Self {
                    program,
                    args: parts.collect(),
                };
            }
        }
        Self::platform_default()
    }

    fn platform_default() -> Self {
        #[cfg(target_os = "macos")]
        let (program, args) = ("say", vec![]);

        #[cfg(target_os = "windows")]
        let (program, args) = (
            "powershell",
            vec!["-NoProfile".to_string(), "-Command".to_string()],
        );

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let (program, args) = ("espeak", vec![]);

        Self {
            program: program.to_string(),
            args,
        }
    }

    fn message_arg(&self, message: &str) -> String {
        if self.program.eq_ignore_ascii_case("powershell") && self.args.iter().any(|a| a == "-Command") {
            let escaped = message.replace('\'', "''");
            return format!(
                "Add-Type -AssemblyName System.Speech; \
                 (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{escaped}')"
            );
        }
        message.to_string()
    }

    pub async fn speak(&self, message: &str) -> AgentResult<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(self.message_arg(message))
            .status()
            .await?;
        if !status.success() {
            return Err(AgentError::Actuator(format!(
                "speech command '{}' exited with {status}",
                self.program
            )));
        }
        Ok(())
    }
}
