use crate::domain::types::{ConnectionEvent, ConnectionState, TransitionError};

pub fn transition(
    current: &ConnectionState,
    event: &ConnectionEvent,
) -> Result<ConnectionState, TransitionError> {
    match (current, event) {
        (ConnectionState::Disconnected, ConnectionEvent::Start) => Ok(ConnectionState::Connecting),
        (ConnectionState::Connecting, ConnectionEvent::Connected) => Ok(ConnectionState::Active),
        (ConnectionState::Connecting, ConnectionEvent::ConnectionLost { .. }) => {
            Ok(ConnectionState::Backoff)
        }
        (ConnectionState::Active, ConnectionEvent::ConnectionLost { .. }) => {
            Ok(ConnectionState::Backoff)
        }
        (ConnectionState::Backoff, ConnectionEvent::RetryElapsed) => Ok(ConnectionState::Connecting),
        _ => Err(TransitionError {
            from: *current,
            event: format!("{event:?}"),
            reason: "invalid transition".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_path_reaches_active_through_connecting() {
        let connecting = transition(&ConnectionState::Disconnected, &ConnectionEvent::Start)
            .expect("start should leave Disconnected");
        assert_eq!(connecting, ConnectionState::Connecting);

        let active = transition(&connecting, &ConnectionEvent::Connected)
            .expect("successful connect should activate");
        assert_eq!(active, ConnectionState::Active);
    }

    #[test]
    fn any_connection_loss_enters_backoff_and_retry_reconnects() {
        for from in [ConnectionState::Connecting, ConnectionState::Active] {
            let lost = ConnectionEvent::ConnectionLost {
                reason: "subscription dropped".to_string(),
            };
            let backoff = transition(&from, &lost).expect("loss should enter Backoff");
            assert_eq!(backoff, ConnectionState::Backoff);

            let retried = transition(&backoff, &ConnectionEvent::RetryElapsed)
                .expect("elapsed retry delay should reconnect");
            assert_eq!(retried, ConnectionState::Connecting);
        }
    }

    #[test]
    fn invalid_pairs_are_rejected() {
        let error = transition(&ConnectionState::Active, &ConnectionEvent::Start)
            .expect_err("Active cannot restart");
        assert_eq!(error.from, ConnectionState::Active);

        assert!(transition(&ConnectionState::Disconnected, &ConnectionEvent::RetryElapsed).is_err());
        assert!(transition(&ConnectionState::Backoff, &ConnectionEvent::Connected).is_err());
    }
}
