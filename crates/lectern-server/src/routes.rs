// File: src/routes.rs
// Purpose: Router assembly: open and protected route groups, shared layers, fallback

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware::{from_fn_with_state, map_response_with_state},
    routing::{get, post},
    Extension, Router,
};
use lectern::entity::{self, EntityConfig};
use lectern_sync::AnnotationKind;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, annotations, auth, books, changes, entities};
use crate::middleware::{expose_error_detail, panic_response, rate_limit, require_auth};
use crate::state::AppState;

/// The complete application, state applied
pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(&state))
        .merge(protected_routes().route_layer(from_fn_with_state(state.clone(), require_auth)));

    let prefix = state.config.api_prefix();
    let root = Router::new().route("/", get(handlers::welcome));
    let app = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(&prefix, api)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static("x-auth-token"),
        ]);

    app.fallback(handlers::route_not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(map_response_with_state(state.clone(), expose_error_detail))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Everything under /auth; only logout and me need a session
fn auth_routes(state: &AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/register", post(auth::register))
        .route("/register/verify-otp", post(auth::verify_registration))
        .route("/register/resend-otp", post(auth::resend_registration))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/forgot-password/verify-otp", post(auth::verify_reset))
        .route("/forgot-password/reset-password", post(auth::reset_password))
        .route("/google", post(auth::google))
        .route("/facebook", post(auth::facebook));

    let session = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    open.merge(session)
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/books", book_routes())
        .nest("/authors", entity_routes(&entity::AUTHOR))
        .nest("/categories", entity_routes(&entity::CATEGORY))
        .nest("/tags", entity_routes(&entity::TAG))
        .nest("/publishers", entity_routes(&entity::PUBLISHER))
        .nest("/translators", entity_routes(&entity::TRANSLATOR))
        .nest("/subscriptions", subscription_routes())
        .nest("/changes", change_routes())
}

/// validate-cache, paginated list, by id and books-of for one entity
fn entity_routes(cfg: &'static EntityConfig) -> Router<AppState> {
    Router::new()
        .route("/validate-cache", post(entities::validate_cache))
        .route("/", get(entities::list))
        .route("/:id", get(entities::get_one))
        .route("/:id/books", get(entities::books))
        .layer(Extension(cfg))
}

fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/validate-cache", post(entities::validate_cache))
        .route("/", get(entities::list_all))
        .route("/:id", get(entities::get_one))
        .route("/:id/books", get(entities::books))
        .layer(Extension(&entity::SUBSCRIPTION))
}

fn book_routes() -> Router<AppState> {
    let cache = Router::new()
        .route("/validate-cache", post(entities::validate_cache))
        .layer(Extension(&entity::BOOK));

    Router::new()
        .route(
            "/",
            get(entities::list)
                .layer(Extension(&entity::BOOK))
                .post(books::search),
        )
        .route("/filters", post(books::filter))
        .route("/:id", get(books::get_book).post(books::upload))
        .route("/:id/categories", get(books::categories))
        .route("/:id/tags", get(books::tags))
        .route("/:id/authors", get(books::authors))
        .route("/:id/translators", get(books::translators))
        .route("/:id/reviewers", get(books::reviewers))
        .route("/:id/rating", get(books::rating))
        .route("/:id/metadata", get(books::metadata))
        .route("/:id/tokens/:sequence", get(books::token))
        .route("/:id/download", get(books::download))
        .route("/:id/reading-progress", post(books::reading_progress))
        .nest("/:id/annotations", annotation_routes())
        .merge(cache)
}

fn annotation_routes() -> Router<AppState> {
    let mut router = Router::new().route("/", get(annotations::all));
    for kind in AnnotationKind::ALL {
        router = router
            .route(
                &format!("/{}", kind.plural()),
                get(annotations::of_kind).layer(Extension(kind)),
            )
            .route(
                &format!("/sync-{}", kind.plural()),
                post(annotations::sync).layer(Extension(kind)),
            );
    }
    router
}

fn change_routes() -> Router<AppState> {
    Router::new()
        .route("/general", get(changes::general))
        .route("/book-tables", get(changes::book_tables))
        .route("/user-tables", get(changes::user_tables))
        .route("/user-book-tables", get(changes::user_book_tables))
}
