use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::core::recipes::{self, IngredientInput};
use crate::server::AppState;
use crate::server::dto::{
    AddRecipeToListRequest, AddedToListResponse, CreateRecipeRequest, IngredientRequest,
    RecipeResponse, UpdateRecipeRequest,
};
use crate::server::response::{ApiError, ApiResponse};

fn to_inputs(requests: &[IngredientRequest]) -> Vec<IngredientInput> {
    requests
        .iter()
        .map(|r| IngredientInput {
            name: r.name.clone(),
            qty: r.qty,
            unit_id: r.unit_id.clone(),
        })
        .collect()
}

pub async fn list_recipes(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let recipes = recipes::list_recipes(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(recipes)))
}

pub async fn create_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateRecipeRequest>,
) -> impl IntoResponse {
    let recipe = recipes::create_recipe(
        state.db.as_ref(),
        &id,
        &req.name,
        req.description,
        &to_inputs(&req.ingredients),
        &auth.user.id,
    )?;
    let ingredients = state.db.list_recipe_ingredients(&recipe.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RecipeResponse {
        recipe,
        ingredients,
    })))
}

pub async fn get_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (recipe, ingredients) = recipes::get_recipe(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RecipeResponse {
        recipe,
        ingredients,
    })))
}

pub async fn update_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecipeRequest>,
) -> impl IntoResponse {
    let inputs = req.ingredients.as_deref().map(to_inputs);
    let recipe = recipes::update_recipe(
        state.db.as_ref(),
        &id,
        req.name,
        req.description,
        inputs.as_deref(),
        &auth.user.id,
    )?;
    let ingredients = state.db.list_recipe_ingredients(&recipe.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(RecipeResponse {
        recipe,
        ingredients,
    })))
}

pub async fn delete_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    recipes::delete_recipe(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn add_to_list(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddRecipeToListRequest>,
) -> impl IntoResponse {
    let added =
        recipes::add_recipe_to_list(state.db.as_ref(), &id, &req.store_id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(AddedToListResponse { added })))
}
