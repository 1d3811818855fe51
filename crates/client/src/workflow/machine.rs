//! Setup state machine
//!
//! Pure transition core: inputs go in, actions come out, no I/O. The happy
//! path is `register → waitForInfra → healthcheck → determineHealth →
//! waitForGoodHealth → initialize → waitForSync → activate → complete`; the
//! failure track records the stage that was active when failure occurred.
//!
//! Correlation rules for realtime inputs:
//! - an event whose dispatch id differs from the one in context is ignored,
//!   whatever its kind or outcome;
//! - a retry notice (`success: false, retrying: true`) is logged and the
//!   machine stays put, awaiting the next event;
//! - a terminal failure moves to `failure`, a success advances.
//!
//! Undefined state/input combinations are a loud
//! [`WorkflowError::NonExhaustiveState`]: an incomplete transition table is
//! a bug, not something to swallow. Late deliveries (realtime frames, timer
//! echoes, subscription errors arriving after their wait state was left) are
//! the defined exception and are dropped.

use printfleet_shared::channel::Channel;
use printfleet_shared::events::Event;
use printfleet_shared::ids::DispatchId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// States of the setup flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupState {
    /// Wizard ground state; nothing dispatched yet.
    Idle,
    Register,
    WaitForInfra,
    Healthcheck,
    DetermineHealth,
    WaitForGoodHealth,
    Initialize,
    WaitForSync,
    Activate,
    Complete,
    Failure,
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupState::Idle => "idle",
            SetupState::Register => "register",
            SetupState::WaitForInfra => "waitForInfra",
            SetupState::Healthcheck => "healthcheck",
            SetupState::DetermineHealth => "determineHealth",
            SetupState::WaitForGoodHealth => "waitForGoodHealth",
            SetupState::Initialize => "initialize",
            SetupState::WaitForSync => "waitForSync",
            SetupState::Activate => "activate",
            SetupState::Complete => "complete",
            SetupState::Failure => "failure",
        };
        write!(f, "{}", name)
    }
}

/// The stage that was active when failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureStage {
    Register,
    WaitForInfra,
    Healthcheck,
    DetermineHealth,
    WaitForGoodHealth,
    Initialize,
    WaitForSync,
    Activate,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Register => "register",
            FailureStage::WaitForInfra => "waitForInfra",
            FailureStage::Healthcheck => "healthcheck",
            FailureStage::DetermineHealth => "determineHealth",
            FailureStage::WaitForGoodHealth => "waitForGoodHealth",
            FailureStage::Initialize => "initialize",
            FailureStage::WaitForSync => "waitForSync",
            FailureStage::Activate => "activate",
        };
        write!(f, "{}", name)
    }
}

/// Inputs fed to the machine by the runner (or a test harness).
#[derive(Debug, Clone)]
pub enum SetupInput {
    /// User submitted the wizard; start the flow.
    Begin,
    Registered { dispatch_id: DispatchId },
    RegisterFailed { message: String },
    /// A correlated event delivered on the live subscription.
    Realtime(Event),
    /// The live subscription reported an error (or closed underneath us).
    SubscriptionFailed { message: String },
    HealthcheckResult { healthy: bool },
    HealthcheckFailed { message: String },
    HealthEvaluated { healthy: bool },
    HealthRetryElapsed,
    Initialized { dispatch_id: DispatchId },
    InitializeFailed { message: String },
    Activated,
    ActivateFailed { message: String },
    /// User asked to leave the failure screen and retry the flow.
    Back,
}

/// Effects for the runner to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupAction {
    Register,
    OpenSubscription { channel: Channel },
    CloseSubscription,
    RunHealthcheck,
    EvaluateHealth { healthy: bool },
    ScheduleHealthRetry { delay: Duration },
    DispatchSync,
    Activate,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The transition table has no entry for this combination. Loud on
    /// purpose: it means the table is incomplete.
    #[error("No transition defined for input {input} in state {state}")]
    NonExhaustiveState { state: SetupState, input: String },

    /// The machine is waiting but nothing can feed it an input.
    #[error("Workflow stalled in state {state}: no input source")]
    Stalled { state: SetupState },
}

/// Machine tuning.
#[derive(Debug, Clone)]
pub struct SetupMachineConfig {
    /// Delay between readiness probes while the backend reports unhealthy.
    pub health_retry_delay: Duration,
}

impl Default for SetupMachineConfig {
    fn default() -> Self {
        Self {
            health_retry_delay: Duration::from_secs(3),
        }
    }
}

/// Context carried across the flow.
#[derive(Debug, Clone, Default)]
pub struct SetupContext {
    pub dispatch_id: Option<DispatchId>,
    pub sync_dispatch_id: Option<DispatchId>,
    pub failure: Option<FailureStage>,
    /// Channel of the currently open subscription, if any. At most one is
    /// live at a time; the machine closes it before leaving the state that
    /// opened it.
    pub live_subscription: Option<Channel>,
}

pub struct SetupMachine {
    state: SetupState,
    context: SetupContext,
    config: SetupMachineConfig,
}

impl Default for SetupMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupMachine {
    pub fn new() -> Self {
        Self::with_config(SetupMachineConfig::default())
    }

    pub fn with_config(config: SetupMachineConfig) -> Self {
        Self {
            state: SetupState::Idle,
            context: SetupContext::default(),
            config,
        }
    }

    pub fn state(&self) -> &SetupState {
        &self.state
    }

    pub fn context(&self) -> &SetupContext {
        &self.context
    }

    pub fn failure_status(&self) -> Option<FailureStage> {
        self.context.failure
    }

    /// Applies one input, returning the effects to execute.
    pub fn handle(&mut self, input: SetupInput) -> Result<Vec<SetupAction>, WorkflowError> {
        match (self.state.clone(), input) {
            (SetupState::Idle, SetupInput::Begin) => {
                self.transition(SetupState::Register);
                Ok(vec![SetupAction::Register])
            }

            (SetupState::Register, SetupInput::Registered { dispatch_id }) => {
                self.context.dispatch_id = Some(dispatch_id.clone());
                self.transition(SetupState::WaitForInfra);
                Ok(vec![self.open_subscription(&dispatch_id)])
            }
            (SetupState::Register, SetupInput::RegisterFailed { message }) => {
                Ok(self.fail(FailureStage::Register, &message))
            }

            (SetupState::WaitForInfra, SetupInput::Realtime(event)) => {
                match self.correlate(&event, Expected::Infra) {
                    Correlation::Success => {
                        let mut actions = self.close_subscription();
                        self.transition(SetupState::Healthcheck);
                        actions.push(SetupAction::RunHealthcheck);
                        Ok(actions)
                    }
                    Correlation::RetryNotice => Ok(Vec::new()),
                    Correlation::TerminalFailure(message) => {
                        Ok(self.fail(FailureStage::WaitForInfra, &message))
                    }
                    Correlation::Unrelated => Ok(Vec::new()),
                }
            }
            (SetupState::WaitForInfra, SetupInput::SubscriptionFailed { message }) => {
                Ok(self.fail(FailureStage::WaitForInfra, &message))
            }

            (SetupState::Healthcheck, SetupInput::HealthcheckResult { healthy }) => {
                self.transition(SetupState::DetermineHealth);
                Ok(vec![SetupAction::EvaluateHealth { healthy }])
            }
            (SetupState::Healthcheck, SetupInput::HealthcheckFailed { message }) => {
                Ok(self.fail(FailureStage::Healthcheck, &message))
            }

            (SetupState::DetermineHealth, SetupInput::HealthEvaluated { healthy: true }) => {
                self.transition(SetupState::Initialize);
                Ok(vec![SetupAction::DispatchSync])
            }
            (SetupState::DetermineHealth, SetupInput::HealthEvaluated { healthy: false }) => {
                self.transition(SetupState::WaitForGoodHealth);
                Ok(vec![SetupAction::ScheduleHealthRetry {
                    delay: self.config.health_retry_delay,
                }])
            }

            (SetupState::WaitForGoodHealth, SetupInput::HealthRetryElapsed) => {
                self.transition(SetupState::Healthcheck);
                Ok(vec![SetupAction::RunHealthcheck])
            }

            (SetupState::Initialize, SetupInput::Initialized { dispatch_id }) => {
                self.context.sync_dispatch_id = Some(dispatch_id.clone());
                self.transition(SetupState::WaitForSync);
                Ok(vec![self.open_subscription(&dispatch_id)])
            }
            (SetupState::Initialize, SetupInput::InitializeFailed { message }) => {
                Ok(self.fail(FailureStage::Initialize, &message))
            }

            (SetupState::WaitForSync, SetupInput::Realtime(event)) => {
                match self.correlate(&event, Expected::Sync) {
                    Correlation::Success => {
                        let mut actions = self.close_subscription();
                        self.transition(SetupState::Activate);
                        actions.push(SetupAction::Activate);
                        Ok(actions)
                    }
                    Correlation::RetryNotice => Ok(Vec::new()),
                    Correlation::TerminalFailure(message) => {
                        Ok(self.fail(FailureStage::WaitForSync, &message))
                    }
                    Correlation::Unrelated => Ok(Vec::new()),
                }
            }
            (SetupState::WaitForSync, SetupInput::SubscriptionFailed { message }) => {
                Ok(self.fail(FailureStage::WaitForSync, &message))
            }

            (SetupState::Activate, SetupInput::Activated) => {
                self.transition(SetupState::Complete);
                Ok(Vec::new())
            }
            (SetupState::Activate, SetupInput::ActivateFailed { message }) => {
                Ok(self.fail(FailureStage::Activate, &message))
            }

            (SetupState::Failure, SetupInput::Back) => {
                // Fresh flow on retry: the original dispatch ids are gone.
                self.context = SetupContext::default();
                self.transition(SetupState::Idle);
                Ok(Vec::new())
            }

            // Late deliveries after the wait state was left: expected, dropped.
            (state, SetupInput::Realtime(event)) => {
                debug!(state = %state, event = ?event, "Dropping late realtime event");
                Ok(Vec::new())
            }
            (state, SetupInput::SubscriptionFailed { message }) => {
                debug!(state = %state, message = %message, "Dropping late subscription error");
                Ok(Vec::new())
            }
            (state, SetupInput::HealthRetryElapsed) => {
                debug!(state = %state, "Dropping stale health-retry timer");
                Ok(Vec::new())
            }

            (state, input) => Err(WorkflowError::NonExhaustiveState {
                state,
                input: format!("{:?}", input),
            }),
        }
    }

    fn transition(&mut self, next: SetupState) {
        debug!(from = %self.state, to = %next, "Setup transition");
        self.state = next;
    }

    fn open_subscription(&mut self, dispatch_id: &DispatchId) -> SetupAction {
        let channel = Channel::events(dispatch_id);
        debug_assert!(
            self.context.live_subscription.is_none(),
            "a subscription is already live"
        );
        self.context.live_subscription = Some(channel.clone());
        SetupAction::OpenSubscription { channel }
    }

    fn close_subscription(&mut self) -> Vec<SetupAction> {
        match self.context.live_subscription.take() {
            Some(_) => vec![SetupAction::CloseSubscription],
            None => Vec::new(),
        }
    }

    fn fail(&mut self, stage: FailureStage, message: &str) -> Vec<SetupAction> {
        warn!(stage = %stage, message = %message, "Setup stage failed");
        let actions = self.close_subscription();
        self.context.failure = Some(stage);
        self.transition(SetupState::Failure);
        actions
    }

    fn correlate(&self, event: &Event, expected: Expected) -> Correlation {
        let expected_id = match expected {
            Expected::Infra => self.context.dispatch_id.as_ref(),
            Expected::Sync => self.context.sync_dispatch_id.as_ref(),
        };

        let (dispatch_id, success, error) = match (expected, event) {
            (
                Expected::Infra,
                Event::InfraProvisionResult {
                    dispatch_id,
                    success,
                    error,
                    ..
                },
            ) => (dispatch_id, *success, error),
            (
                Expected::Sync,
                Event::PapercutSyncResult {
                    dispatch_id,
                    success,
                    error,
                    ..
                },
            ) => (dispatch_id, *success, error),
            // Wrong kind for this wait state, or a poke: not ours.
            _ => return Correlation::Unrelated,
        };

        if Some(dispatch_id) != expected_id {
            debug!(
                got = %dispatch_id,
                "Ignoring event for a different dispatch"
            );
            return Correlation::Unrelated;
        }

        if success {
            return Correlation::Success;
        }
        if event.is_retry_notice() {
            info!(dispatch_id = %dispatch_id, "Attempt failed, awaiting redelivery");
            return Correlation::RetryNotice;
        }
        Correlation::TerminalFailure(
            error
                .clone()
                .unwrap_or_else(|| "dispatch failed".to_string()),
        )
    }
}

#[derive(Clone, Copy)]
enum Expected {
    Infra,
    Sync,
}

enum Correlation {
    Success,
    RetryNotice,
    TerminalFailure(String),
    Unrelated,
}
