use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use super::{account, catalog, households, invitations, list, recipes, stores};
use crate::config::ServerConfig;
use crate::db::Database;

pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: ServerConfig,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/register", post(account::register))
        .route("/auth/login", post(account::login))
        .route("/auth/logout", post(account::logout))
        .route("/auth/me", get(account::me))
        .route("/auth/me", patch(account::update_me))
        // Households
        .route("/households", get(households::list_households))
        .route("/households", post(households::create_household))
        .route("/households/{id}", get(households::get_household))
        .route("/households/{id}", patch(households::update_household))
        .route("/households/{id}", delete(households::delete_household))
        .route("/households/{id}/members", get(households::list_members))
        .route(
            "/households/{id}/members/{user_id}",
            put(households::set_member_role),
        )
        .route(
            "/households/{id}/members/{user_id}",
            delete(households::remove_member),
        )
        .route("/households/{id}/leave", post(households::leave_household))
        .route(
            "/households/{id}/invitations",
            get(households::list_invitations),
        )
        .route(
            "/households/{id}/invitations",
            post(households::create_invitation),
        )
        .route(
            "/households/{id}/invitations/{invitation_id}",
            delete(households::retract_invitation),
        )
        // Recipes (household-scoped collection, then by id)
        .route("/households/{id}/recipes", get(recipes::list_recipes))
        .route("/households/{id}/recipes", post(recipes::create_recipe))
        .route("/recipes/{id}", get(recipes::get_recipe))
        .route("/recipes/{id}", patch(recipes::update_recipe))
        .route("/recipes/{id}", delete(recipes::delete_recipe))
        .route("/recipes/{id}/add-to-list", post(recipes::add_to_list))
        // Invitations addressed to the calling user
        .route("/invitations", get(invitations::list_pending))
        .route(
            "/invitations/household/{token}/accept",
            post(invitations::accept_household),
        )
        .route(
            "/invitations/household/{token}/decline",
            post(invitations::decline_household),
        )
        .route(
            "/invitations/store/{token}/accept",
            post(invitations::accept_store),
        )
        .route(
            "/invitations/store/{token}/decline",
            post(invitations::decline_store),
        )
        .route("/notifications", get(invitations::notification_counts))
        // Stores
        .route("/stores", get(stores::list_stores))
        .route("/stores", post(stores::create_store))
        .route("/stores/{id}", get(stores::get_store))
        .route("/stores/{id}", patch(stores::update_store))
        .route("/stores/{id}", delete(stores::delete_store))
        .route(
            "/stores/{id}/collaborators",
            get(stores::list_collaborators),
        )
        .route(
            "/stores/{id}/collaborators/{user_id}",
            put(stores::set_collaborator_role),
        )
        .route(
            "/stores/{id}/collaborators/{user_id}",
            delete(stores::remove_collaborator),
        )
        .route("/stores/{id}/leave", post(stores::leave_store))
        .route("/stores/{id}/invitations", get(stores::list_invitations))
        .route("/stores/{id}/invitations", post(stores::create_invitation))
        .route(
            "/stores/{id}/invitations/{invitation_id}",
            delete(stores::retract_invitation),
        )
        // Store layout
        .route("/stores/{id}/aisles", get(catalog::list_aisles))
        .route("/stores/{id}/aisles", post(catalog::create_aisle))
        .route("/stores/{id}/aisles/reorder", put(catalog::reorder_aisles))
        .route("/aisles/{id}", patch(catalog::rename_aisle))
        .route("/aisles/{id}", delete(catalog::delete_aisle))
        .route("/aisles/{id}/sections", get(catalog::list_sections))
        .route("/aisles/{id}/sections", post(catalog::create_section))
        .route(
            "/stores/{id}/sections/reorder",
            put(catalog::reorder_sections),
        )
        .route("/sections/{id}", patch(catalog::rename_section))
        .route("/sections/{id}", delete(catalog::delete_section))
        // Catalog items
        .route("/stores/{id}/items", post(catalog::create_item))
        .route("/stores/{id}/items/search", get(catalog::search_items))
        .route("/items/{id}", patch(catalog::update_item))
        .route("/items/{id}", delete(catalog::delete_item))
        .route("/items/{id}/favorite", put(catalog::set_item_favorite))
        .route("/items/{id}/hidden", put(catalog::set_item_hidden))
        .route("/units", get(catalog::list_units))
        // Shopping list
        .route("/stores/{id}/list", get(list::list_entries))
        .route("/stores/{id}/list", post(list::add_entry))
        .route(
            "/stores/{id}/list/clear-checked",
            post(list::clear_checked),
        )
        .route("/list/{id}", patch(list::update_entry))
        .route("/list/{id}", delete(list::delete_entry))
        .route("/list/{id}/checked", put(list::set_checked))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
