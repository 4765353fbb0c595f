use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use teamdues::database::{PgStore, connection};
use teamdues::routes::api::scoped_config;
use teamdues::services::push::WebPushClient;
use teamdues::services::stripe::StripeClient;
use teamdues::{AppState, Settings};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let settings = Settings::load().context("loading configuration")?;

    let pool = connection::connect(&settings.database)
        .await
        .context("connecting to database")?;
    connection::migrate(&pool).await.context("running migrations")?;

    let processor = StripeClient::new(&settings.stripe).context("building Stripe client")?;
    let push_sender = WebPushClient::new(&settings.push).context("building push client")?;

    let bind = (settings.server.host.clone(), settings.server.port);
    let workers = settings.server.workers;
    let state = AppState::new(
        settings,
        Arc::new(PgStore::new(pool)),
        Arc::new(processor),
        Arc::new(push_sender),
    );

    info!("Starting server on {}:{}", bind.0, bind.1);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(scoped_config)
    })
    .bind(bind)?;
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
