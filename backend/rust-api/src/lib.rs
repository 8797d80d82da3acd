use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use services::AppState;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(frontend_url = %frontend_url, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config.cors.frontend_url);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest("/api/v1/forms", protected(form_routes(), &app_state))
        .nest("/api/v1/dashboard", protected(dashboard_routes(), &app_state))
        .nest("/api/v1/drafts", protected(draft_routes(), &app_state))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(middlewares::trace::trace_context_middleware))
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

fn protected(router: Router<Arc<AppState>>, app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    router.route_layer(middleware::from_fn_with_state(
        app_state.clone(),
        middlewares::auth::auth_middleware,
    ))
}

fn form_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::forms::create_form))
        .route("/user", get(handlers::forms::list_user_forms))
        .route(
            "/{id}",
            get(handlers::forms::get_form)
                .put(handlers::forms::update_form)
                .delete(handlers::forms::delete_form),
        )
        .route("/{id}/public", get(handlers::forms::get_public_form))
        .route("/{id}/submit", post(handlers::forms::submit_form))
        .route("/{id}/hasvoted", get(handlers::forms::has_voted))
        .route("/{id}/voters", get(handlers::forms::list_voters))
}

fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::dashboard::get_dashboard))
        .route("/activities", get(handlers::dashboard::list_activities))
        .route(
            "/forms/{form_id}/status",
            get(handlers::dashboard::get_status).delete(handlers::dashboard::delete_status),
        )
        .route(
            "/forms/{form_id}/status/{status}",
            put(handlers::dashboard::set_status),
        )
}

fn draft_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::drafts::save_draft))
        .route(
            "/{form_id}",
            get(handlers::drafts::get_draft).delete(handlers::drafts::delete_draft),
        )
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout));

    let protected_routes = protected(
        Router::new().route("/me", get(handlers::auth::me)),
        &app_state,
    );

    public_routes.merge(protected_routes)
}
