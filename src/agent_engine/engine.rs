use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::parser::{try_parse, ResponseParser};
use crate::agent_engine::persona::Prompt;
use crate::agent_engine::state::{
    ActionDescriptor, LoopConfig, LoopState, LoopStatus, ParseFallback, RunMode, StopReason,
};
use crate::errors::AgentResult;
use crate::executor::dispatcher::Dispatcher;
use crate::executor::input::Actuator;
use crate::perception::traits::FrameSource;
use crate::vlm::provider::VisionModel;

pub const DEFAULT_DESCRIBE_INTERVAL: Duration = Duration::from_secs(5);

/// The perceive → reason → act loop.
///
/// One frame, one model call and at most one device action per iteration,
/// strictly in that order. The engine owns its [`LoopState`]; the outside
/// world can only ask it to stop through the cancellation token.
pub struct AgentEngine {
    frames: Arc<dyn FrameSource>,
    model: Arc<dyn VisionModel>,
    dispatcher: Dispatcher,
    parser: ResponseParser,
    prompt: Prompt,
    state: LoopState,
    loop_ctrl: LoopController,
    history: Option<SessionHistory>,
    describe_interval: Duration,
}

impl AgentEngine {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        model: Arc<dyn VisionModel>,
        actuator: Arc<dyn Actuator>,
        prompt: Prompt,
    ) -> Self {
        Self {
            frames,
            model,
            dispatcher: Dispatcher::new(actuator),
            parser: ResponseParser::default(),
            state: LoopState::new(),
            prompt,
            loop_ctrl: LoopController::new(LoopConfig::default()),
            history: None,
            describe_interval: DEFAULT_DESCRIBE_INTERVAL,
        }
    }

    pub fn with_parse_fallback(mut self, fallback: ParseFallback) -> Self {
        self.parser = ResponseParser::new(fallback);
        self
    }

    pub fn with_loop_config(mut self, config: LoopConfig) -> Self {
        self.loop_ctrl = LoopController::new(config);
        self
    }

    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_describe_interval(mut self, interval: Duration) -> Self {
        self.describe_interval = interval;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Runs until cancelled, a loop limit is hit, or an iteration fails.
    ///
    /// `cancel` and the limits are only looked at between iterations, so an
    /// in-flight model call or key hold always completes.
    pub async fn run_loop(&mut self, cancel: &CancellationToken) -> StopReason {
        tracing::info!(
            mode = ?self.prompt.mode,
            goal = %self.prompt.goal,
            backend = self.model.name(),
            "agent loop started"
        );

        while self.state.is_running() {
            if cancel.is_cancelled() {
                tracing::info!("stop requested");
                self.state.stop(StopReason::Cancelled);
                break;
            }
            if self.loop_ctrl.should_stop(self.state.iterations) {
                tracing::info!(iterations = self.state.iterations, "loop limit reached");
                self.state.stop(StopReason::LimitReached);
                break;
            }

            if let Err(e) = self.step().await {
                tracing::error!(iteration = self.state.iterations + 1, "agent loop failed: {e}");
                self.state.stop(StopReason::Fatal(e.to_string()));
                break;
            }

            self.state.iterations += 1;
        }

        let reason = match &self.state.status {
            LoopStatus::Stopped(reason) => reason.clone(),
            LoopStatus::Running => StopReason::Cancelled,
        };
        tracing::info!(iterations = self.state.iterations, ?reason, "agent loop stopped");
        reason
    }

    async fn step(&mut self) -> AgentResult<()> {
        let iteration = self.state.iterations + 1;

        let frame = self.frames.capture().await?;
        tracing::debug!(
            iteration,
            width = frame.meta.width,
            height = frame.meta.height,
            "frame captured"
        );

        let response = self.model.predict(&frame, &self.prompt.text).await?;
        tracing::debug!(iteration, response = %response, "model responded");

        match self.prompt.mode {
            RunMode::Action => {
                let action = self.parser.parse(&response);
                self.record(iteration, &response, Some(&action));
                self.dispatcher.execute(&action).await?;
            }
            RunMode::Describe => match try_parse(&response) {
                Some(say) if is_spoken(&say) => {
                    self.record(iteration, &response, Some(&say));
                    self.dispatcher.execute(&say).await?;
                }
                _ => {
                    tracing::info!(description = %response.trim(), "scene");
                    self.record(iteration, &response, None);
                    tokio::time::sleep(self.describe_interval).await;
                }
            },
        }
        Ok(())
    }

    fn record(&self, iteration: u64, response: &str, action: Option<&ActionDescriptor>) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record(iteration, self.prompt.mode, response, action) {
                tracing::warn!("history write failed: {e}");
            }
        }
    }
}

/// A describe-mode reply only counts as speech when it has something to say.
fn is_spoken(action: &ActionDescriptor) -> bool {
    matches!(action, ActionDescriptor::Say { message } if !message.trim().is_empty())
}
