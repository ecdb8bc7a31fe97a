use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

#[cfg(not(test))]
use {
    axum::extract::ConnectInfo,
    std::net::IpAddr,
    std::sync::Arc,
    tower_governor::{governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorLayer},
};

use crate::api::handlers::{self as api_handlers, AppState};
use crate::config::Settings;

/// Create the router with all endpoints
#[cfg_attr(test, allow(unused_variables))]
pub fn create_router(state: AppState, settings: &Settings) -> Router {
    #[cfg_attr(test, allow(unused_mut))]
    let mut api_routes = Router::new()
        // Imports
        .route(
            "/imports",
            post(api_handlers::create_import).get(api_handlers::list_imports),
        )
        .route("/imports/:id", get(api_handlers::get_import))
        // Search
        .route("/search", get(api_handlers::search_recipes))
        // Recipes
        .route("/recipes/:id", get(api_handlers::get_recipe))
        .route("/tags", get(api_handlers::list_tags))
        // Stats
        .route("/stats", get(api_handlers::get_stats))
        .with_state(state.clone());

    // Rate limiting is keyed on the peer IP and skipped in test builds, where
    // requests carry no connection info.
    #[cfg(not(test))]
    {
        #[derive(Clone, Copy, Debug)]
        struct FallbackIpKeyExtractor;

        impl KeyExtractor for FallbackIpKeyExtractor {
            type Key = IpAddr;

            fn extract<B>(
                &self,
                req: &axum::http::Request<B>,
            ) -> Result<Self::Key, tower_governor::GovernorError> {
                if let Some(ConnectInfo(addr)) = req
                    .extensions()
                    .get::<ConnectInfo<std::net::SocketAddr>>()
                {
                    return Ok(addr.ip());
                }

                Ok(IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)))
            }
        }

        match GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(settings.server.api_rate_limit)
            .burst_size(settings.server.api_rate_limit as u32 * 2)
            .finish()
        {
            Some(config) => {
                api_routes = api_routes.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => tracing::warn!(
                "Invalid API rate limit {}, rate limiting disabled",
                settings.server.api_rate_limit
            ),
        }
    }

    let api_routes = api_routes;

    let health_routes = Router::new()
        .route("/health", get(api_handlers::health_check))
        .route("/ready", get(api_handlers::readiness_check))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            // Request body size limit - prevent memory exhaustion from large payloads
            RequestBodyLimitLayer::new(settings.pagination.max_request_body_size),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_origin(tower_http::cors::Any)
                .max_age(Duration::from_secs(3600)),
        )
        .layer(
            // Security headers
            SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
