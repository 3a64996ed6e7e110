use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::core::{access, invites, membership};
use crate::server::AppState;
use crate::server::dto::{
    CreateInvitationRequest, CreateStoreRequest, MemberResponse, SetRoleRequest,
    UpdateStoreRequest,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_store_name;
use crate::types::{Role, Store, StoreCollaborator};

pub async fn create_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStoreRequest>,
) -> impl IntoResponse {
    let name = validate_store_name(&req.name)?;
    let db = state.db.as_ref();

    // Attaching a store to a household needs editor rights there.
    if let Some(household_id) = &req.household_id {
        access::require_household_role(db, &auth.user.id, household_id, Role::Editor)?;
    }

    let now = Utc::now();
    let store = Store {
        id: Uuid::new_v4().to_string(),
        name,
        household_id: req.household_id,
        is_hidden: false,
        created_by: auth.user.id.clone(),
        updated_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    let owner = StoreCollaborator {
        store_id: store.id.clone(),
        user_id: auth.user.id.clone(),
        role: Role::Owner,
        created_at: now,
    };
    db.create_store(&store, &owner)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(store)))
}

pub async fn list_stores(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let stores = state.db.list_stores_for_user(&auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(stores)))
}

pub async fn get_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (store, _) =
        access::require_store_role(state.db.as_ref(), &auth.user.id, &id, Role::Viewer)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(store)))
}

pub async fn update_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStoreRequest>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    let (mut store, _) = access::require_store_role(db, &auth.user.id, &id, Role::Editor)?;

    if let Some(name) = req.name {
        store.name = validate_store_name(&name)?;
    }
    if let Some(household_id) = req.household_id {
        if let Some(household_id) = &household_id {
            access::require_household_role(db, &auth.user.id, household_id, Role::Editor)?;
        }
        store.household_id = household_id;
    }
    if let Some(is_hidden) = req.is_hidden {
        store.is_hidden = is_hidden;
    }
    store.updated_by = auth.user.id.clone();
    db.update_store(&store)?;

    let store = db.get_store(&id)?.ok_or(crate::error::Error::NotFound)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(store)))
}

pub async fn delete_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    access::require_store_role(db, &auth.user.id, &id, Role::Owner)?;
    db.delete_store(&id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_collaborators(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    access::require_store_role(db, &auth.user.id, &id, Role::Viewer)?;

    let collaborators = db.list_store_collaborators(&id)?;
    let mut responses = Vec::with_capacity(collaborators.len());
    for collaborator in collaborators {
        if let Some(user) = db.get_user(&collaborator.user_id)? {
            responses.push(MemberResponse {
                user_id: user.id,
                name: user.name,
                email: user.email,
                role: collaborator.role,
                created_at: collaborator.created_at,
            });
        }
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(responses)))
}

#[derive(serde::Deserialize)]
pub struct CollaboratorPath {
    pub id: String,
    pub user_id: String,
}

pub async fn set_collaborator_role(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<CollaboratorPath>,
    Json(req): Json<SetRoleRequest>,
) -> impl IntoResponse {
    membership::set_store_role(
        state.db.as_ref(),
        &path.id,
        &path.user_id,
        req.role,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn remove_collaborator(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<CollaboratorPath>,
) -> impl IntoResponse {
    membership::remove_store_collaborator(
        state.db.as_ref(),
        &path.id,
        &path.user_id,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn leave_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    membership::leave_store(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn create_invitation(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateInvitationRequest>,
) -> impl IntoResponse {
    let invitation = invites::create_store_invitation(
        state.db.as_ref(),
        &id,
        &req.email,
        req.role,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(invitation)))
}

pub async fn list_invitations(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let invitations = invites::list_store_invitations(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(invitations)))
}

#[derive(serde::Deserialize)]
pub struct InvitationPath {
    pub id: String,
    pub invitation_id: String,
}

pub async fn retract_invitation(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<InvitationPath>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    if let Some(invitation) = db.get_store_invitation(&path.invitation_id)? {
        if invitation.store_id != path.id {
            return Err(ApiError::not_found("Not found"));
        }
    }
    invites::retract_store_invitation(db, &path.invitation_id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
