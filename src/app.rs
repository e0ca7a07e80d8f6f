//! Shared application state and the HTTP router.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use chrono::Duration as TokenTtl;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers,
    middleware::{
        auth::auth_middleware,
        rate_limit::{RateLimits, rate_limit},
    },
    services::{
        account_service::AccountService,
        auth_service::AuthService,
        catalog_service::CatalogService,
        retry::RetryPolicy,
        token::TokenSigner,
        transaction_service::TransactionService,
    },
    store::DynStore,
};

/// Everything a handler can reach, cloned cheaply into each request.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub tokens: TokenSigner,
    pub auth: AuthService,
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub transactions: TransactionService,
    pub limits: RateLimits,
    pub cors_origin: Option<HeaderValue>,
}

impl AppState {
    pub fn new(
        store: DynStore,
        tokens: TokenSigner,
        retry: RetryPolicy,
        allow_same_owner_transfers: bool,
        limits: RateLimits,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone(), tokens.clone()),
            accounts: AccountService::new(store.clone()),
            catalog: CatalogService::new(store.clone(), retry),
            transactions: TransactionService::new(
                store.clone(),
                retry,
                allow_same_owner_transfers,
            ),
            store,
            tokens,
            limits,
            cors_origin: None,
        }
    }

    /// Production wiring: secrets, retry policy and rate limits from `config`.
    pub fn from_config(store: DynStore, config: &Config) -> Self {
        let tokens = TokenSigner::new(
            &config.jwt_secret,
            TokenTtl::hours(config.token_ttl_hours),
        );
        let retry = RetryPolicy::new(
            config.max_retries,
            std::time::Duration::from_millis(config.retry_backoff_ms),
        );

        Self::new(
            store,
            tokens,
            retry,
            config.allow_same_owner_transfers,
            RateLimits::default(),
        )
    }

    pub fn with_cors_origin(mut self, origin: HeaderValue) -> Self {
        self.cors_origin = Some(origin);
        self
    }
}

/// Build the full HTTP router.
///
/// Public: health, registration, login and catalog reads. Everything else
/// sits behind the bearer token middleware. Register, login and purchase are
/// additionally rate limited per client.
pub fn router(state: AppState) -> Router {
    let auth_layer = axum_middleware::from_fn_with_state(state.tokens.clone(), auth_middleware);

    let register = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limits.register.clone(),
            rate_limit,
        ));

    let login = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limits.login.clone(),
            rate_limit,
        ));

    let purchase = Router::new()
        .route("/purchase", post(handlers::transactions::purchase))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limits.purchase.clone(),
            rate_limit,
        ));

    let authenticated_routes = Router::new()
        .route("/profile", get(handlers::users::profile))
        .route("/users", get(handlers::users::list_users))
        .route(
            "/accounts",
            post(handlers::accounts::create_account).get(handlers::accounts::list_accounts),
        )
        .route(
            "/accounts/{id}",
            get(handlers::accounts::list_accounts_by_user),
        )
        .route(
            "/accounts/{id}/transactions",
            get(handlers::transactions::account_statement),
        )
        .route("/deposit", post(handlers::transactions::deposit))
        .route("/transfer", post(handlers::transactions::transfer))
        .route(
            "/purchases",
            get(handlers::transactions::purchase_history),
        )
        .route("/products", post(handlers::products::create_product))
        .route("/products/{id}", put(handlers::products::update_product))
        .merge(purchase)
        // Token check runs before the purchase rate limit
        .route_layer(auth_layer);

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/products", get(handlers::products::list_products))
        .route("/products/{id}", get(handlers::products::get_product))
        .merge(register)
        .merge(login);

    let cors = cors_layer(state.cors_origin.clone());

    public_routes
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: Option<HeaderValue>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origin {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        None => layer.allow_origin(Any),
    }
}
