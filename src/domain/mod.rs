pub mod backoff;
pub mod state_machine;
pub mod types;
