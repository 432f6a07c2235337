use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{
    AdminAuthGate, Clock, ExpiringRevocationStore, InMemoryRevocationStore, RevocationStore,
    SystemClock,
};
use crate::configuration::{RevocationStrategy, Settings};
use crate::directory::{DirectoryError, InMemoryUserDirectory, Principal};
use crate::error::{AppError, ConfigError};
use crate::logger::LoggerMiddleware;
use crate::middleware::AdminGuard;
use crate::routes::{
    health_check, login, logout, profile, refresh_token, revoke_token, verify_token,
};

/// Wire the gate from settings: seeded directory, configured revocation
/// store, wall clock
pub fn build_gate(settings: &Settings) -> Result<AdminAuthGate, AppError> {
    settings.validate()?;

    let directory = InMemoryUserDirectory::new();
    for admin in &settings.admins {
        let principal = Principal {
            id: admin.id,
            email: admin.email.trim().to_string(),
            is_staff: admin.is_staff,
            is_superuser: admin.is_superuser,
            is_active: admin.is_active,
        };
        let seeded = match (&admin.password_hash, &admin.password) {
            (Some(hash), _) => directory.insert_hashed(principal, hash.clone()),
            (None, Some(password)) => directory.register(principal, password),
            (None, None) => Err(DirectoryError::Rejected("no password configured".to_string())),
        };
        seeded.map_err(|e| ConfigError::InvalidValue(format!("admins[{}]: {}", admin.id, e)))?;
    }
    tracing::info!(accounts = directory.len(), "User directory seeded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn RevocationStore> = match settings.revocation.strategy {
        RevocationStrategy::Permanent => Arc::new(InMemoryRevocationStore::new()),
        RevocationStrategy::Expiring => Arc::new(ExpiringRevocationStore::new(clock.clone())),
    };
    tracing::info!(strategy = ?settings.revocation.strategy, "Revocation store ready");

    Ok(AdminAuthGate::new(
        &settings.jwt,
        Arc::new(directory),
        store,
        clock,
    ))
}

pub fn run(listener: TcpListener, gate: AdminAuthGate) -> Result<Server, std::io::Error> {
    let gate_data = web::Data::new(gate.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::new("%U %s %Dms"))
            .wrap(LoggerMiddleware)
            .app_data(gate_data.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/admin")
                    // Public: these mint or revoke tokens themselves
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh_token))
                    .route("/logout", web::post().to(logout))
                    // Guarded
                    .service(
                        web::resource("/verify-token")
                            .wrap(AdminGuard::new(gate.clone()))
                            .route(web::get().to(verify_token)),
                    )
                    .service(
                        web::resource("/profile")
                            .wrap(AdminGuard::new(gate.clone()))
                            .route(web::get().to(profile)),
                    )
                    .service(
                        web::resource("/revoke-token")
                            .wrap(AdminGuard::superuser(gate.clone()))
                            .route(web::post().to(revoke_token)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
