use account_service::configuration::get_configuration;
use account_service::media::HttpMediaHost;
use account_service::session::SessionController;
use account_service::startup::run;
use account_service::store::PgCredentialStore;
use account_service::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_telemetry("info") {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!("Starting application");

    let configuration = get_configuration()
        .map_err(|e| {
            tracing::error!("Failed to read configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    configuration.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    let media = HttpMediaHost::from_settings(&configuration.media).map_err(|e| {
        tracing::error!("Failed to build media host client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Media host error")
    })?;

    let jwt_config = configuration.jwt.clone();
    let controller = SessionController::new(
        Arc::new(PgCredentialStore::new(pool)),
        Arc::new(media),
        jwt_config.clone(),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, controller, jwt_config)?.await
}
