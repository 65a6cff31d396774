use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::backoff::{reconnect_delay, ReconnectionState};
use crate::domain::state_machine::transition;
use crate::domain::types::{BotState, ConnectionEvent, ConnectionState, EngineError};
use crate::ledger::{HeightSubscription, LedgerPort};
use crate::responder::Responder;
use crate::scanner;
use crate::storage::state::StateStore;

/// Owns the connection lifecycle: reconcile-then-follow under a
/// {Disconnected, Connecting, Active, Backoff} machine with bounded
/// exponential retry delays. The supervisor is the only component allowed to
/// create or release a height subscription, and it holds at most one.
pub struct ReconnectionSupervisor {
    ledger: Arc<dyn LedgerPort>,
    responder: Responder,
    store: StateStore,
    batch_width: u64,
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectionSupervisor {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        responder: Responder,
        store: StateStore,
        batch_width: u64,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            responder,
            store,
            batch_width,
            base_delay,
            max_delay,
        }
    }

    /// Runs until the process is shut down; there is no terminal state.
    pub async fn run(self) {
        let mut state = self.store.load();
        info!(
            cursor = state.cursor_height,
            sequence_number = state.sequence_number,
            "state_loaded"
        );

        let mut connection = ConnectionState::Disconnected;
        let mut reconnection = ReconnectionState::new();
        let mut subscription: Option<HeightSubscription> = None;

        loop {
            connection = match connection {
                ConnectionState::Disconnected => advance(connection, &ConnectionEvent::Start),
                ConnectionState::Connecting => match self.establish(&mut state).await {
                    Ok(live) => {
                        subscription = Some(live);
                        reconnection.record_success();
                        info!(cursor = state.cursor_height, "connected");
                        advance(connection, &ConnectionEvent::Connected)
                    }
                    Err(failure) => {
                        warn!(%failure, "connect_failed");
                        advance(
                            connection,
                            &ConnectionEvent::ConnectionLost {
                                reason: failure.to_string(),
                            },
                        )
                    }
                },
                ConnectionState::Active => {
                    let failure = match subscription.take() {
                        // `follow` consumes the handle, so the subscription is
                        // released before we ever enter Backoff.
                        Some(live) => self.follow(&mut state, live).await,
                        None => EngineError::Connectivity("subscription missing".to_string()),
                    };
                    warn!(%failure, "pipeline_failed");
                    advance(
                        connection,
                        &ConnectionEvent::ConnectionLost {
                            reason: failure.to_string(),
                        },
                    )
                }
                ConnectionState::Backoff => {
                    let attempt = reconnection.record_failure();
                    let delay = reconnect_delay(self.base_delay, self.max_delay, attempt);
                    info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect_backoff");
                    tokio::time::sleep(delay).await;
                    advance(connection, &ConnectionEvent::RetryElapsed)
                }
            };
        }
    }

    /// Connecting phase: drain the backlog between the persisted cursor and
    /// the current head, then open the live subscription.
    async fn establish(&self, state: &mut BotState) -> Result<HeightSubscription, EngineError> {
        let head = self
            .ledger
            .current_height()
            .await
            .map_err(EngineError::Connectivity)?;
        info!(cursor = state.cursor_height, head, "reconcile_start");
        self.reconcile(state, head).await?;
        Ok(self.ledger.subscribe_heights())
    }

    /// Scans `(cursor, target]` and responds to every occurrence found, in
    /// order, before persisting `cursor = target`. Shared by the startup
    /// backfill and every live height notification.
    pub async fn reconcile(
        &self,
        state: &mut BotState,
        target_height: u64,
    ) -> Result<(), EngineError> {
        if target_height <= state.cursor_height {
            return Ok(());
        }
        let from = state.cursor_height.saturating_add(1);

        let occurrences =
            scanner::backfill(self.ledger.as_ref(), from, target_height, self.batch_width).await?;
        if !occurrences.is_empty() {
            info!(from, to = target_height, count = occurrences.len(), "pings_detected");
        }

        for occurrence in &occurrences {
            self.responder.respond(state, occurrence).await?;
        }

        state.cursor_height = target_height;
        self.store.save(state)?;
        debug!(cursor = state.cursor_height, "cursor_advanced");
        Ok(())
    }

    /// Active phase: process height notifications strictly sequentially; a
    /// notification arriving mid-response queues in the subscription channel.
    async fn follow(&self, state: &mut BotState, mut subscription: HeightSubscription) -> EngineError {
        loop {
            let Some(height) = subscription.next_height().await else {
                return EngineError::Connectivity("height subscription ended".to_string());
            };
            debug!(height, "height_notification");
            if let Err(failure) = self.reconcile(state, height).await {
                return failure;
            }
        }
    }
}

fn advance(current: ConnectionState, event: &ConnectionEvent) -> ConnectionState {
    match transition(&current, event) {
        Ok(next) => {
            debug!(from = ?current, to = ?next, event = ?event, "connection_transition");
            next
        }
        Err(invalid) => {
            error!(
                from = ?invalid.from,
                event = %invalid.event,
                "invalid_connection_transition"
            );
            current
        }
    }
}
