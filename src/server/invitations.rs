use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::core::{invites, notify};
use crate::server::AppState;
use crate::server::dto::{PendingInvitationResponse, PendingInvitationsResponse};
use crate::server::response::{ApiError, ApiResponse};

/// Lists the caller's pending invitations across both scopes, tokens
/// included: the token is the capability the invitee needs to respond.
pub async fn list_pending(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let db = state.db.as_ref();

    let mut household = Vec::new();
    for invitation in
        invites::list_pending_household_invitations_for_user(db, &auth.user.email)?
    {
        let scope_name = db
            .get_household(&invitation.household_id)?
            .map(|h| h.name)
            .unwrap_or_default();
        household.push(PendingInvitationResponse {
            id: invitation.id,
            scope_id: invitation.household_id,
            scope_name,
            invited_email: invitation.invited_email,
            role: invitation.role,
            token: invitation.token,
            created_at: invitation.created_at,
        });
    }

    let mut store = Vec::new();
    for invitation in invites::list_pending_store_invitations_for_user(db, &auth.user.email)? {
        let scope_name = db
            .get_store(&invitation.store_id)?
            .map(|s| s.name)
            .unwrap_or_default();
        store.push(PendingInvitationResponse {
            id: invitation.id,
            scope_id: invitation.store_id,
            scope_name,
            invited_email: invitation.invited_email,
            role: invitation.role,
            token: invitation.token,
            created_at: invitation.created_at,
        });
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(PendingInvitationsResponse {
        household,
        store,
    })))
}

pub async fn accept_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let member = invites::accept_household_invitation(
        state.db.as_ref(),
        &token,
        &auth.user.id,
        &auth.user.email,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(member)))
}

pub async fn decline_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    invites::decline_household_invitation(state.db.as_ref(), &token, &auth.user.email)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn accept_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let collaborator = invites::accept_store_invitation(
        state.db.as_ref(),
        &token,
        &auth.user.id,
        &auth.user.email,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(collaborator)))
}

pub async fn decline_store(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    invites::decline_store_invitation(state.db.as_ref(), &token, &auth.user.email)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Pending-invitation counts for the badge; clients poll this.
pub async fn notification_counts(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let counts = notify::notification_counts(state.db.as_ref(), &auth.user.email)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(counts)))
}
