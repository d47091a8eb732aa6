use bankdice::prelude::*;
use tracing_subscriber::EnvFilter;

/// Listen address used when `BANKDICE_BIND` is unset.
const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), BankdiceError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("BANKDICE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    tracing::info!(%bind, version = PROTOCOL_VERSION, "bankdice server starting");

    let server = BankdiceServer::builder()
        .bind(&bind)
        .room_config(RoomConfig::default())
        .build()
        .await?;
    server.run().await
}
