//! Setup workflow runner
//!
//! Executes the machine's actions against the backend and the realtime
//! transport, and pumps subscription events back in as inputs, until the
//! flow completes or fails. Retrying from the failure screen is an
//! interactive concern (`SetupInput::Back`) and happens outside this loop.

use crate::realtime::transport::{RealtimeTransport, SubscriptionEvent};
use crate::workflow::backend::SetupBackend;
use crate::workflow::machine::{
    FailureStage, SetupAction, SetupInput, SetupMachine, SetupState, WorkflowError,
};
use printfleet_shared::events::Event;
use printfleet_shared::ids::SubscriptionId;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Complete,
    Failed { stage: FailureStage },
}

pub struct SetupRunner {
    machine: SetupMachine,
    backend: Arc<dyn SetupBackend>,
    transport: Arc<RealtimeTransport>,
}

impl SetupRunner {
    pub fn new(
        machine: SetupMachine,
        backend: Arc<dyn SetupBackend>,
        transport: Arc<RealtimeTransport>,
    ) -> Self {
        Self {
            machine,
            backend,
            transport,
        }
    }

    /// Drives the flow from `Begin` to `Complete` or `Failure`.
    pub async fn run(mut self) -> Result<SetupOutcome, WorkflowError> {
        let mut pending: VecDeque<SetupInput> = VecDeque::from([SetupInput::Begin]);
        let mut subscription: Option<(SubscriptionId, mpsc::Receiver<SubscriptionEvent>)> = None;

        loop {
            while let Some(input) = pending.pop_front() {
                let actions = self.machine.handle(input)?;
                for action in actions {
                    self.execute(action, &mut pending, &mut subscription).await;
                }
            }

            match self.machine.state() {
                SetupState::Complete => {
                    info!("✅ Setup complete");
                    return Ok(SetupOutcome::Complete);
                }
                SetupState::Failure => {
                    let stage = self
                        .machine
                        .failure_status()
                        .unwrap_or(FailureStage::Register);
                    return Ok(SetupOutcome::Failed { stage });
                }
                _ => {}
            }

            // Out of queued inputs: the machine must be waiting on its live
            // subscription. Anything else is a liveness bug.
            let Some((_, event_rx)) = subscription.as_mut() else {
                return Err(WorkflowError::Stalled {
                    state: self.machine.state().clone(),
                });
            };

            match event_rx.recv().await {
                Some(SubscriptionEvent::Data(value)) => match Event::from_wire(&value) {
                    Ok(event) => pending.push_back(SetupInput::Realtime(event)),
                    Err(parse_error) => {
                        // Liberal receiver: a payload this client cannot read
                        // is skipped, not fatal.
                        warn!(error = %parse_error, "Ignoring unreadable event payload");
                    }
                },
                Some(SubscriptionEvent::Error(errors)) => {
                    let message = errors
                        .iter()
                        .map(|detail| format!("{}: {}", detail.error_type, detail.message))
                        .collect::<Vec<_>>()
                        .join("; ");
                    pending.push_back(SetupInput::SubscriptionFailed { message });
                }
                None => {
                    pending.push_back(SetupInput::SubscriptionFailed {
                        message: "subscription closed".to_string(),
                    });
                }
            }
        }
    }

    async fn execute(
        &self,
        action: SetupAction,
        pending: &mut VecDeque<SetupInput>,
        subscription: &mut Option<(SubscriptionId, mpsc::Receiver<SubscriptionEvent>)>,
    ) {
        match action {
            SetupAction::Register => match self.backend.register().await {
                Ok(dispatch_id) => pending.push_back(SetupInput::Registered { dispatch_id }),
                Err(backend_error) => pending.push_back(SetupInput::RegisterFailed {
                    message: backend_error.to_string(),
                }),
            },

            SetupAction::DispatchSync => match self.backend.dispatch_sync().await {
                Ok(dispatch_id) => pending.push_back(SetupInput::Initialized { dispatch_id }),
                Err(backend_error) => pending.push_back(SetupInput::InitializeFailed {
                    message: backend_error.to_string(),
                }),
            },

            SetupAction::RunHealthcheck => match self.backend.healthcheck().await {
                Ok(healthy) => pending.push_back(SetupInput::HealthcheckResult { healthy }),
                Err(backend_error) => pending.push_back(SetupInput::HealthcheckFailed {
                    message: backend_error.to_string(),
                }),
            },

            SetupAction::EvaluateHealth { healthy } => {
                pending.push_back(SetupInput::HealthEvaluated { healthy });
            }

            SetupAction::ScheduleHealthRetry { delay } => {
                // No subscription is live during the health phase, so an
                // inline sleep cannot starve event processing.
                tokio::time::sleep(delay).await;
                pending.push_back(SetupInput::HealthRetryElapsed);
            }

            SetupAction::Activate => match self.backend.activate().await {
                Ok(()) => pending.push_back(SetupInput::Activated),
                Err(backend_error) => pending.push_back(SetupInput::ActivateFailed {
                    message: backend_error.to_string(),
                }),
            },

            SetupAction::OpenSubscription { channel } => {
                match self.transport.subscribe(&channel).await {
                    Ok(opened) => *subscription = Some(opened),
                    Err(transport_error) => {
                        pending.push_back(SetupInput::SubscriptionFailed {
                            message: transport_error.to_string(),
                        });
                    }
                }
            }

            SetupAction::CloseSubscription => {
                if let Some((id, _event_rx)) = subscription.take() {
                    if let Err(transport_error) = self.transport.unsubscribe(&id).await {
                        warn!(
                            subscription_id = %id,
                            error = %transport_error,
                            "Unsubscribe failed during teardown"
                        );
                    }
                }
            }
        }
    }
}
