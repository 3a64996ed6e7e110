use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::core::catalog;
use crate::server::AppState;
use crate::server::dto::{
    CreateItemRequest, NameRequest, ReorderRequest, SearchQuery, SetFavoriteRequest,
    SetHiddenRequest, UpdateItemRequest,
};
use crate::server::response::{ApiError, ApiResponse};

const DEFAULT_SEARCH_LIMIT: i64 = 20;

// Aisles

pub async fn list_aisles(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let aisles = catalog::list_aisles(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(aisles)))
}

pub async fn create_aisle(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NameRequest>,
) -> impl IntoResponse {
    let aisle = catalog::create_aisle(state.db.as_ref(), &id, &req.name, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(aisle)))
}

pub async fn rename_aisle(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NameRequest>,
) -> impl IntoResponse {
    let aisle = catalog::rename_aisle(state.db.as_ref(), &id, &req.name, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(aisle)))
}

pub async fn delete_aisle(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    catalog::delete_aisle(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn reorder_aisles(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> impl IntoResponse {
    let updates: Vec<(String, i64)> = req
        .updates
        .into_iter()
        .map(|u| (u.id, u.sort_order))
        .collect();
    catalog::reorder_aisles(state.db.as_ref(), &id, &updates, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Sections

pub async fn list_sections(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let sections = catalog::list_sections(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(sections)))
}

pub async fn create_section(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NameRequest>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    let aisle = db.get_aisle(&id)?.ok_or(crate::error::Error::NotFound)?;
    let section =
        catalog::create_section(db, &aisle.store_id, &id, &req.name, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(section)))
}

pub async fn rename_section(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NameRequest>,
) -> impl IntoResponse {
    let section = catalog::rename_section(state.db.as_ref(), &id, &req.name, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(section)))
}

pub async fn delete_section(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    catalog::delete_section(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn reorder_sections(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> impl IntoResponse {
    let updates: Vec<(String, i64)> = req
        .updates
        .into_iter()
        .map(|u| (u.id, u.sort_order))
        .collect();
    catalog::reorder_sections(state.db.as_ref(), &id, &updates, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Items

pub async fn create_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateItemRequest>,
) -> impl IntoResponse {
    let item = catalog::create_or_get_item(
        state.db.as_ref(),
        &id,
        &req.name,
        req.aisle_id.as_deref(),
        req.section_id.as_deref(),
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn search_items(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let items = catalog::search_items(
        state.db.as_ref(),
        &id,
        &query.q,
        query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(items)))
}

pub async fn update_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> impl IntoResponse {
    let item = catalog::update_item(
        state.db.as_ref(),
        &id,
        catalog::ItemUpdate {
            name: req.name,
            aisle_id: req.aisle_id,
            section_id: req.section_id,
            is_favorite: req.is_favorite,
            is_hidden: req.is_hidden,
        },
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn set_item_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetFavoriteRequest>,
) -> impl IntoResponse {
    let item =
        catalog::set_item_favorite(state.db.as_ref(), &id, req.is_favorite, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn set_item_hidden(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetHiddenRequest>,
) -> impl IntoResponse {
    let item = catalog::set_item_hidden(state.db.as_ref(), &id, req.is_hidden, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn delete_item(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    catalog::delete_item(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Units

pub async fn list_units(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let units = state.db.list_units()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(units)))
}
