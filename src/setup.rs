//! Interactive startup. Asks only for what neither the command line nor
//! `config.toml` already decided.
use std::io::{BufRead, Write};

use crate::agent_engine::persona::{self, Persona, CUSTOM_PERSONA_ID};
use crate::agent_engine::state::RunMode;
use crate::config::{AppConfig, BackendKind};
use crate::errors::{AgentError, AgentResult};

/// Persona used when the operator just presses Enter.
pub const DEFAULT_PERSONA: &str = "treasure_hunter";

/// Fills `config.backend.kind`, the remote URL, `config.agent.persona` and
/// `config.agent.mode` from the operator, then resolves the persona.
pub fn complete<R: BufRead, W: Write>(
    config: &mut AppConfig,
    input: &mut R,
    out: &mut W,
) -> AgentResult<Persona> {
    complete_backend(config, input, out)?;

    let persona = match config.agent.persona.clone() {
        Some(selector) => {
            let goal = match (&config.agent.custom_goal, is_custom(&selector)) {
                (None, true) => Some(ask(input, out, "Describe the goal: ")?),
                (goal, _) => goal.clone(),
            };
            persona::select(&selector, goal.as_deref())?
        }
        None => choose_persona(input, out)?,
    };
    config.agent.persona = Some(persona.id.clone());
    if persona.id == CUSTOM_PERSONA_ID {
        config.agent.custom_goal = Some(persona.goal.clone());
    }

    if config.agent.mode.is_none() {
        let answer = ask(
            input,
            out,
            "Debug mode? Describe the scene instead of playing [y/N]: ",
        )?;
        let mode = if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
            RunMode::Describe
        } else {
            RunMode::Action
        };
        config.agent.mode = Some(mode);
    }

    tracing::info!(
        backend = ?config.backend.kind,
        persona = %persona.id,
        mode = ?config.agent.mode,
        "setup complete"
    );
    Ok(persona)
}

/// Only the backend half of [`complete`]: the kind and, for the remote
/// backend, its URL.
pub fn complete_backend<R: BufRead, W: Write>(
    config: &mut AppConfig,
    input: &mut R,
    out: &mut W,
) -> AgentResult<()> {
    if config.backend.kind.is_none() {
        config.backend.kind = Some(choose_backend(input, out)?);
    }

    let needs_url = config
        .backend
        .remote
        .url
        .as_deref()
        .map_or(true, |u| u.trim().is_empty());
    if config.backend.kind == Some(BackendKind::Remote) && needs_url {
        let url = ask(
            input,
            out,
            "Enter server URL (e.g. http://123.45.67.89:8000): ",
        )?;
        if url.is_empty() {
            return Err(AgentError::Setup("remote backend needs a server URL".into()));
        }
        config.backend.remote.url = Some(url);
    }
    Ok(())
}

fn choose_backend<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> AgentResult<BackendKind> {
    writeln!(out, "Select backend:")?;
    writeln!(out, "1. Dummy (test the loop)")?;
    writeln!(out, "2. OpenAI-compatible endpoint")?;
    writeln!(out, "3. Remote inference server")?;
    let choice = ask(input, out, "Enter choice (1/2/3): ")?;
    Ok(match choice.to_ascii_lowercase().as_str() {
        "1" | "dummy" => BackendKind::Dummy,
        "2" | "openai" => BackendKind::Openai,
        "3" | "remote" => BackendKind::Remote,
        _ => {
            writeln!(out, "Invalid choice, defaulting to dummy.")?;
            BackendKind::Dummy
        }
    })
}

fn choose_persona<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> AgentResult<Persona> {
    let catalog = persona::catalog();
    writeln!(out, "Select persona:")?;
    for (i, p) in catalog.iter().enumerate() {
        writeln!(out, "{}. {} - {}", i + 1, p.display_name, p.goal)?;
    }
    writeln!(out, "{}. Custom goal", catalog.len() + 1)?;

    loop {
        let answer = ask(input, out, &format!("Persona [{DEFAULT_PERSONA}]: "))?;
        let selector = match answer.as_str() {
            "" => DEFAULT_PERSONA.to_string(),
            n if n == (catalog.len() + 1).to_string() => CUSTOM_PERSONA_ID.to_string(),
            other => other.to_string(),
        };
        let goal = if is_custom(&selector) {
            Some(ask(input, out, "Describe the goal: ")?)
        } else {
            None
        };
        match persona::select(&selector, goal.as_deref()) {
            Ok(p) => return Ok(p),
            Err(e) => writeln!(out, "{e}")?,
        }
    }
}

fn is_custom(selector: &str) -> bool {
    selector.trim().eq_ignore_ascii_case(CUSTOM_PERSONA_ID)
}

/// Prints `prompt` and reads one trimmed line. End of input is an error.
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> AgentResult<String> {
    write!(out, "{prompt}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(AgentError::Setup("input closed before setup finished".into()));
    }
    Ok(line.trim().to_string())
}
