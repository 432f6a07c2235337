use contest_admin::configuration::get_configuration;
use contest_admin::startup::{build_gate, run};
use contest_admin::telemetry::init_telemetry;
use std::net::TcpListener;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting contest admin service");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    // Secret and seeded accounts are checked before anything binds
    let gate = build_gate(&configuration).map_err(|e| {
        tracing::error!("Failed to initialise admin auth: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Admin auth setup error")
    })?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, gate)?.await
}
