use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Recipe, RecipeIngredient, Role, User};

/// Distinguishes "field absent" (outer None) from "field null" (Some(None))
/// for PATCH bodies. Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// Auth

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub invitation_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// Households

#[derive(Debug, Deserialize)]
pub struct CreateHouseholdRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHouseholdRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: Role,
}

/// Membership row joined with the user's public identity.
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Invitee-facing view of a pending invitation. Unlike the scope-facing
/// listing this carries the token, which is the accept/decline capability.
#[derive(Debug, Serialize)]
pub struct PendingInvitationResponse {
    pub id: String,
    pub scope_id: String,
    pub scope_name: String,
    pub invited_email: String,
    pub role: Role,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PendingInvitationsResponse {
    pub household: Vec<PendingInvitationResponse>,
    pub store: Vec<PendingInvitationResponse>,
}

// Stores

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    #[serde(default)]
    pub household_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub household_id: Option<Option<String>>,
    #[serde(default)]
    pub is_hidden: Option<bool>,
}

// Aisles and sections

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderEntry {
    pub id: String,
    pub sort_order: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub updates: Vec<ReorderEntry>,
}

// Catalog items

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub aisle_id: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub aisle_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub section_id: Option<Option<String>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_hidden: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetFavoriteRequest {
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetHiddenRequest {
    pub is_hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

// Shopping list

#[derive(Debug, Deserialize)]
pub struct AddListEntryRequest {
    #[serde(default)]
    pub is_idea: bool,
    /// Idea name, or a raw item name when no store_item_id is given.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub store_item_id: Option<String>,
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_unsure: bool,
    #[serde(default)]
    pub is_sample: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListEntryRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub qty: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub unit_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub is_unsure: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub snoozed_until: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct SetCheckedRequest {
    pub is_checked: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCheckedResponse {
    pub removed: usize,
}

// Recipes

#[derive(Debug, Deserialize)]
pub struct IngredientRequest {
    pub name: String,
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub unit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct AddRecipeToListRequest {
    pub store_id: String,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Serialize)]
pub struct AddedToListResponse {
    pub added: usize,
}
