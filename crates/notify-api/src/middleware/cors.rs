//! CORS for the tray and preference frontends.

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use notify_core::config::CorsConfig;

/// Build the CORS layer.
///
/// Credentials are only honoured with an explicit origin list; a `*` entry
/// switches to a wildcard origin without credentials.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let wildcard = config.allowed_origins.iter().any(|o| o == "*");
    let origin = if wildcard {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(config.allow_credentials && !wildcard)
        .max_age(Duration::from_secs(config.max_age_seconds))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    async fn preflight(config: &CorsConfig, origin: &str) -> axum::http::HeaderMap {
        let app = Router::new()
            .route("/api/count", get(|| async { "ok" }))
            .layer(build_cors_layer(config));
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/count")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .body(Body::empty())
            .expect("request");
        app.oneshot(request).await.expect("response").headers().clone()
    }

    #[tokio::test]
    async fn test_explicit_origin_allows_credentials() {
        let config = CorsConfig {
            allowed_origins: vec!["https://apps.example.org".to_string()],
            allow_credentials: true,
            ..CorsConfig::default()
        };
        let headers = preflight(&config, "https://apps.example.org").await;
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://apps.example.org"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_wildcard_drops_credentials() {
        let config = CorsConfig {
            allow_credentials: true,
            ..CorsConfig::default()
        };
        let headers = preflight(&config, "https://elsewhere.example").await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }
}
