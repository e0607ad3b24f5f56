use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;

use motico_auth::{Hs256JwtIssuer, Hs256JwtValidator, PrincipalId};
use motico_core::TenantId;
use motico_infra::{AppConfig, InMemoryDatabase, InventoryServices, PgDatabase, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `motico-api issue-token <tenant-id> [email]` prints a bearer token and exits.
    let args: Vec<String> = std::env::args().skip(1).collect();
    let issuing = args.first().map(String::as_str) == Some("issue-token");

    let config = AppConfig::load().context("failed to load configuration")?;
    if issuing {
        return issue_token(&config, &args[1..]);
    }

    motico_observability::tracing::init(&config.logging);

    let services = if config.use_persistent_stores {
        let options = db::connect_options(&config.database)?;
        let pool = db::create_pool(&config.database, options)
            .await
            .context("failed to connect to postgres")?;
        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;
        tracing::info!(host = %config.database.host, db = %config.database.name, "using postgres stores");
        InventoryServices::from_config(Arc::new(PgDatabase::new(pool)), &config)
    } else {
        tracing::warn!("USE_PERSISTENT_STORES=false; data lives in memory only");
        InventoryServices::from_config(Arc::new(InMemoryDatabase::new()), &config)
    };

    let secret = config
        .jwt
        .secret
        .as_ref()
        .context("JWT_SECRET_KEY is required")?;
    let jwt = Arc::new(Hs256JwtValidator::new(secret.expose_secret().as_bytes()));

    let app = motico_api::app::build_app(Arc::new(services), jwt, &config.server);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn issue_token(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    let tenant_id: TenantId = args
        .first()
        .context("usage: motico-api issue-token <tenant-id> [email]")?
        .parse()
        .context("tenant id must be a UUID")?;
    let secret = config
        .jwt
        .secret
        .as_ref()
        .context("JWT_SECRET_KEY is required")?;

    let issuer = Hs256JwtIssuer::new(
        secret.expose_secret().as_bytes(),
        chrono::Duration::seconds(config.jwt.expiration_secs),
    );
    let token = issuer.issue(
        PrincipalId::new(),
        tenant_id,
        args.get(1).cloned(),
        chrono::Utc::now(),
    )?;
    println!("{token}");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}
