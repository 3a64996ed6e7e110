use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::core::list::{self, CatalogRef, EntryInput, EntryUpdate};
use crate::server::AppState;
use crate::server::dto::{
    AddListEntryRequest, ClearCheckedResponse, SetCheckedRequest, UpdateListEntryRequest,
};
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_entries(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let entries = list::list_entries(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}

pub async fn add_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddListEntryRequest>,
) -> impl IntoResponse {
    let input = if req.is_idea {
        EntryInput::Idea {
            name: req.name.unwrap_or_default(),
            notes: req.notes,
        }
    } else {
        let item = match (req.store_item_id, req.name) {
            (Some(id), _) => CatalogRef::Id(id),
            (None, Some(name)) => CatalogRef::Name(name),
            (None, None) => {
                return Err(ApiError::bad_request(
                    "Either store_item_id or name is required",
                ));
            }
        };
        EntryInput::Catalog {
            item,
            qty: req.qty,
            unit_id: req.unit_id,
            notes: req.notes,
        }
    };

    let entry = list::add_entry(
        state.db.as_ref(),
        &id,
        input,
        req.is_unsure,
        req.is_sample,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn update_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateListEntryRequest>,
) -> impl IntoResponse {
    let entry = list::update_entry(
        state.db.as_ref(),
        &id,
        EntryUpdate {
            qty: req.qty,
            unit_id: req.unit_id,
            notes: req.notes,
            is_unsure: req.is_unsure,
            snoozed_until: req.snoozed_until,
        },
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn set_checked(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetCheckedRequest>,
) -> impl IntoResponse {
    let entry = list::set_checked(state.db.as_ref(), &id, req.is_checked, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn delete_entry(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    list::delete_entry(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn clear_checked(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let removed = list::clear_checked(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(ClearCheckedResponse { removed })))
}
