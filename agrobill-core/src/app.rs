use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::companies::handlers as companies;
use crate::config::Config;
use crate::ledger::handlers as ledger;
use crate::orders::handlers as orders;
use crate::parties::handlers as parties;
use crate::products::handlers as products;
use crate::purchases::handlers as purchases;
use crate::sales::handlers as sales;

/// Shared resources handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agrobill-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Verifies the database answers a trivial query.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/companies",
            post(companies::create_company_handler).get(companies::list_companies_handler),
        )
        .route(
            "/products",
            post(products::create_product_handler).get(products::list_products_handler),
        )
        .route("/products/:id", get(products::get_product_handler))
        .route(
            "/parties/:party_type",
            post(parties::create_party_handler).get(parties::list_parties_handler),
        )
        .route("/parties/:party_type/:id", get(parties::get_party_handler))
        .route(
            "/purchases",
            post(purchases::create_purchase_handler).get(purchases::list_purchases_handler),
        )
        .route(
            "/purchases/:id",
            get(purchases::get_purchase_handler).put(purchases::update_purchase_handler),
        )
        .route(
            "/sales",
            post(sales::create_sale_handler).get(sales::list_sales_handler),
        )
        .route("/sales/new-bill-no", get(sales::new_bill_no_handler))
        .route("/sales/payments", post(sales::record_payment_handler))
        .route(
            "/sales/party/:party_type/:id/previous-due",
            get(ledger::previous_due_handler),
        )
        .route(
            "/sales/:id",
            get(sales::get_sale_handler)
                .put(sales::update_sale_handler)
                .delete(sales::cancel_sale_handler),
        )
        .route(
            "/purchase-orders",
            post(orders::create_purchase_order_handler).get(orders::list_purchase_orders_handler),
        )
        .route(
            "/purchase-orders/:id",
            get(orders::get_purchase_order_handler)
                .put(orders::update_purchase_order_handler)
                .delete(orders::delete_purchase_order_handler),
        )
        .route(
            "/sales-orders",
            post(orders::create_sales_order_handler).get(orders::list_sales_orders_handler),
        )
        .route(
            "/sales-orders/:id",
            get(orders::get_sales_order_handler)
                .put(orders::update_sales_order_handler)
                .delete(orders::delete_sales_order_handler),
        )
        .route("/sales-orders/:id/invoice", get(orders::sales_order_invoice_handler))
}

/// Builds the HTTP router.
///
/// `/health` routes are public; everything under `/api` passes through the
/// bearer-token middleware.
pub fn create_router(state: AppState) -> Router {
    let api = api_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::jwt_middleware,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(jwt_secret: Option<&str>) -> AppState {
        let config = Config {
            database_url: "postgres://localhost/agrobill_unused".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            max_connections: 1,
            acquire_timeout: Duration::from_millis(100),
            statement_timeout: Duration::from_secs(1),
            jwt_secret: jwt_secret.map(str::to_string),
            run_migrations: false,
        };
        let pool = PgPoolOptions::new()
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        AppState::new(pool, config)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = create_router(state(None))
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "agrobill-core");
    }

    #[tokio::test]
    async fn test_tenant_route_without_company_code_is_bad_request() {
        let response = create_router(state(None))
            .oneshot(Request::get("/api/purchases").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_unusable_company_code_is_bad_request() {
        let request = Request::get("/api/sales")
            .header("x-company-code", "--!!--")
            .body(Body::empty())
            .expect("request");
        let response = create_router(state(None)).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_bad_request() {
        let request = Request::post("/api/purchase-orders")
            .header("content-type", "application/json")
            .body(Body::from("{\"po_no\": "))
            .expect("request");
        let response = create_router(state(None)).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_requires_token_when_secret_configured() {
        let router = create_router(state(Some("s3cret")));
        let response = router
            .clone()
            .oneshot(Request::get("/api/companies").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let health = router
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);
    }
}
