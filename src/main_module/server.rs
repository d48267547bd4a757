//! HTTP server initialization and routing

use axum::{extract::DefaultBodyLimit, http::HeaderValue, middleware, routing::get, Router};
use log::{error, info, warn};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{configure_auth_routes, configure_public_auth_routes};
use crate::certification::configure_certification_routes;
use crate::core::middleware::authentication_middleware;
use crate::core::shared::state::AppState;
use crate::settings::{configure_public_settings_routes, configure_settings_routes};

use super::{health_check, shutdown_signal};

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        info!("Creating CORS layer with development defaults (no origins configured)");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();
    info!("Creating CORS layer with {} configured origins", allowed.len());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Public routes plus everything behind the bearer-token middleware.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .merge(configure_public_auth_routes())
        .merge(configure_public_settings_routes());

    let protected = Router::new()
        .merge(configure_auth_routes())
        .merge(configure_certification_routes())
        .merge(configure_settings_routes())
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            authentication_middleware,
        ));

    let cors = create_cors_layer(&app_state.config.cors_origins);

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!(
        "{}:{}",
        app_state.config.server.host, app_state.config.server.port
    );
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::PgConnection;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::core::config::{AppConfig, AuthConfig, DriveConfig, SeedConfig, ServerConfig};
    use crate::drive::ObjectStore;

    async fn offline_state() -> Arc<AppState> {
        let drive_config = DriveConfig {
            server: "http://127.0.0.1:9".to_string(),
            access_key: "test".to_string(),
            secret_key: "test".to_string(),
            bucket: "evidencias".to_string(),
            region: "us-east-1".to_string(),
            strict_startup: false,
        };
        let config = AppConfig {
            database_url: "postgres://nobody@127.0.0.1:9/none".to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            auth: AuthConfig {
                jwt_secret: "router-test-secret".to_string(),
                token_ttl_minutes: 5,
            },
            drive: drive_config.clone(),
            seed: SeedConfig {
                admin_name: "Admin".to_string(),
                admin_email: "admin@local".to_string(),
                admin_password: "admin123".to_string(),
            },
            cors_origins: vec!["http://localhost:5173".to_string()],
        };
        let pool = Pool::builder()
            .connection_timeout(Duration::from_millis(200))
            .build_unchecked(ConnectionManager::<PgConnection>::new(&config.database_url));
        let drive = ObjectStore::connect(&drive_config).await;
        Arc::new(AppState::new(pool, drive, config))
    }

    #[tokio::test]
    async fn test_protected_routes_reject_missing_token() {
        let app = build_router(offline_state().await);
        for uri in ["/api/programs", "/api/evaluations", "/api/auth/me", "/api/settings"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_protected_routes_reject_forged_token() {
        let state = offline_state().await;
        let token = crate::security::issue_token(uuid::Uuid::new_v4(), "another-secret", 5)
            .expect("token");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/corrective-actions")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_degraded_without_database() {
        let app = build_router(offline_state().await);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_invalid_cors_origins_are_skipped() {
        let origins = vec!["http://localhost:5173".to_string(), "bad\norigin".to_string()];
        let _layer = create_cors_layer(&origins);
        let _permissive = create_cors_layer(&[]);
    }
}
