use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pongbot::{
    BotConfig, HttpLedgerClient, LocalKeySigner, Responder, ReconnectionSupervisor, SignerPort,
    StateStore,
};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(error) => fatal(&format!("configuration error: {error}")),
    };

    let signer = match LocalKeySigner::from_hex(&config.private_key) {
        Ok(signer) => Arc::new(signer),
        Err(error) => fatal(&format!("signing credential error: {error}")),
    };

    let ledger = match HttpLedgerClient::new(
        config.rpc_url.clone(),
        config.contract_address,
        config.poll_interval,
    ) {
        Ok(client) => Arc::new(client),
        Err(error) => fatal(&format!("ledger client error: {error}")),
    };

    info!(
        contract = %config.contract_address,
        responder = %signer.address(),
        chain_id = config.chain_id,
        start_height = config.start_height,
        "listening for Ping events"
    );

    let store = StateStore::new(config.state_path.clone(), config.start_height);
    let responder = Responder::new(
        ledger.clone(),
        signer,
        store.clone(),
        config.chain_id,
        config.contract_address,
        config.confirmation_timeout,
    );
    let supervisor = ReconnectionSupervisor::new(
        ledger,
        responder,
        store,
        config.batch_width,
        config.backoff_base,
        config.backoff_max,
    );

    tokio::select! {
        () = supervisor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown_signal_received");
        }
    }
}

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}
