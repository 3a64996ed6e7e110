use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::*;

use super::access::{require_household_role, require_store_role};
use super::catalog::create_or_get_item_unchecked;
use super::list::{CatalogRef, EntryInput, add_entry};

#[derive(Debug, Clone)]
pub struct IngredientInput {
    pub name: String,
    pub qty: Option<f64>,
    pub unit_id: Option<String>,
}

fn build_ingredients(
    db: &dyn Database,
    recipe_id: &str,
    inputs: &[IngredientInput],
) -> Result<Vec<RecipeIngredient>> {
    let mut rows = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::validation("ingredient name cannot be empty"));
        }
        if let Some(unit_id) = &input.unit_id {
            if db.get_unit(unit_id)?.is_none() {
                return Err(Error::validation("unknown quantity unit"));
            }
        }
        rows.push(RecipeIngredient {
            id: Uuid::new_v4().to_string(),
            recipe_id: recipe_id.to_string(),
            name: name.to_string(),
            qty: input.qty,
            unit_id: input.unit_id.clone(),
            sort_order: index as i64,
        });
    }
    Ok(rows)
}

pub fn create_recipe(
    db: &dyn Database,
    household_id: &str,
    name: &str,
    description: Option<String>,
    ingredients: &[IngredientInput],
    actor_id: &str,
) -> Result<Recipe> {
    require_household_role(db, actor_id, household_id, Role::Editor)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("recipe name cannot be empty"));
    }

    let now = Utc::now();
    let recipe = Recipe {
        id: Uuid::new_v4().to_string(),
        household_id: household_id.to_string(),
        name: name.to_string(),
        description,
        created_by: actor_id.to_string(),
        updated_by: actor_id.to_string(),
        created_at: now,
        updated_at: now,
    };
    let rows = build_ingredients(db, &recipe.id, ingredients)?;
    db.create_recipe(&recipe, &rows)?;
    Ok(recipe)
}

pub fn get_recipe(
    db: &dyn Database,
    recipe_id: &str,
    actor_id: &str,
) -> Result<(Recipe, Vec<RecipeIngredient>)> {
    let recipe = db.get_recipe(recipe_id)?.ok_or(Error::NotFound)?;
    require_household_role(db, actor_id, &recipe.household_id, Role::Viewer)?;
    let ingredients = db.list_recipe_ingredients(recipe_id)?;
    Ok((recipe, ingredients))
}

pub fn list_recipes(
    db: &dyn Database,
    household_id: &str,
    actor_id: &str,
) -> Result<Vec<Recipe>> {
    require_household_role(db, actor_id, household_id, Role::Viewer)?;
    db.list_recipes(household_id)
}

pub fn update_recipe(
    db: &dyn Database,
    recipe_id: &str,
    name: Option<String>,
    description: Option<Option<String>>,
    ingredients: Option<&[IngredientInput]>,
    actor_id: &str,
) -> Result<Recipe> {
    let mut recipe = db.get_recipe(recipe_id)?.ok_or(Error::NotFound)?;
    require_household_role(db, actor_id, &recipe.household_id, Role::Editor)?;

    if let Some(name) = name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("recipe name cannot be empty"));
        }
        recipe.name = name.to_string();
    }
    if let Some(description) = description {
        recipe.description = description;
    }
    recipe.updated_by = actor_id.to_string();

    let rows = match ingredients {
        Some(inputs) => Some(build_ingredients(db, recipe_id, inputs)?),
        None => None,
    };
    db.update_recipe(&recipe, rows.as_deref())?;
    db.get_recipe(recipe_id)?.ok_or(Error::NotFound)
}

pub fn delete_recipe(db: &dyn Database, recipe_id: &str, actor_id: &str) -> Result<()> {
    let recipe = db.get_recipe(recipe_id)?.ok_or(Error::NotFound)?;
    require_household_role(db, actor_id, &recipe.household_id, Role::Editor)?;
    db.delete_recipe(recipe_id)?;
    Ok(())
}

/// Pushes a recipe's ingredients onto a store's shopping list.
///
/// Each ingredient resolves through the catalog upsert, so repeated pushes
/// reuse the same items and fold into existing unchecked entries instead of
/// duplicating rows. Returns the number of ingredients processed.
pub fn add_recipe_to_list(
    db: &dyn Database,
    recipe_id: &str,
    store_id: &str,
    actor_id: &str,
) -> Result<usize> {
    let recipe = db.get_recipe(recipe_id)?.ok_or(Error::NotFound)?;
    require_household_role(db, actor_id, &recipe.household_id, Role::Viewer)?;
    require_store_role(db, actor_id, store_id, Role::Editor)?;

    let ingredients = db.list_recipe_ingredients(recipe_id)?;
    for ingredient in &ingredients {
        let item = create_or_get_item_unchecked(db, store_id, &ingredient.name, None, None)?;
        add_entry(
            db,
            store_id,
            EntryInput::Catalog {
                item: CatalogRef::Id(item.id),
                qty: ingredient.qty,
                unit_id: ingredient.unit_id.clone(),
                notes: None,
            },
            false,
            false,
            actor_id,
        )?;
    }
    Ok(ingredients.len())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::db::SqliteDatabase;

    use super::*;

    fn setup() -> (TempDir, SqliteDatabase) {
        let temp = TempDir::new().unwrap();
        let db = SqliteDatabase::new(temp.path().join("test.db")).unwrap();
        db.initialize().unwrap();

        let now = Utc::now();
        db.create_user(&User {
            id: "alice".to_string(),
            email: "alice@example.com".to_string(),
            email_norm: "alice@example.com".to_string(),
            name: "alice".to_string(),
            password_hash: "x".to_string(),
            scopes: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        db.create_household(
            &Household {
                id: "hh-1".to_string(),
                name: "home".to_string(),
                created_by: "alice".to_string(),
                updated_by: "alice".to_string(),
                created_at: now,
                updated_at: now,
            },
            &HouseholdMember {
                household_id: "hh-1".to_string(),
                user_id: "alice".to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
        db.create_store(
            &Store {
                id: "store-1".to_string(),
                name: "corner shop".to_string(),
                household_id: Some("hh-1".to_string()),
                is_hidden: false,
                created_by: "alice".to_string(),
                updated_by: "alice".to_string(),
                created_at: now,
                updated_at: now,
            },
            &StoreCollaborator {
                store_id: "store-1".to_string(),
                user_id: "alice".to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
        (temp, db)
    }

    fn pancakes(db: &SqliteDatabase) -> Recipe {
        create_recipe(
            db,
            "hh-1",
            "Pancakes",
            None,
            &[
                IngredientInput {
                    name: "Flour".to_string(),
                    qty: Some(500.0),
                    unit_id: Some("unit-gram".to_string()),
                },
                IngredientInput {
                    name: "Milk".to_string(),
                    qty: Some(0.5),
                    unit_id: Some("unit-liter".to_string()),
                },
                IngredientInput {
                    name: "Eggs".to_string(),
                    qty: Some(3.0),
                    unit_id: Some("unit-piece".to_string()),
                },
            ],
            "alice",
        )
        .unwrap()
    }

    #[test]
    fn test_recipe_round_trip() {
        let (_temp, db) = setup();
        let recipe = pancakes(&db);

        let (fetched, ingredients) = get_recipe(&db, &recipe.id, "alice").unwrap();
        assert_eq!(fetched.name, "Pancakes");
        assert_eq!(ingredients.len(), 3);
        assert_eq!(ingredients[0].name, "Flour");
        assert_eq!(ingredients[0].sort_order, 0);
    }

    #[test]
    fn test_add_to_list_is_idempotent() {
        let (_temp, db) = setup();
        let recipe = pancakes(&db);

        let pushed = add_recipe_to_list(&db, &recipe.id, "store-1", "alice").unwrap();
        assert_eq!(pushed, 3);

        let rows = db.list_list_items("store-1").unwrap();
        assert_eq!(rows.len(), 3);

        // Pushing again folds into the existing unchecked rows.
        add_recipe_to_list(&db, &recipe.id, "store-1", "alice").unwrap();
        let rows = db.list_list_items("store-1").unwrap();
        assert_eq!(rows.len(), 3);

        // The catalog gained exactly one item per ingredient.
        let items = db.search_items("store-1", "", 50).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_update_replaces_ingredients() {
        let (_temp, db) = setup();
        let recipe = pancakes(&db);

        update_recipe(
            &db,
            &recipe.id,
            Some("Crepes".to_string()),
            Some(Some("thinner".to_string())),
            Some(&[IngredientInput {
                name: "Flour".to_string(),
                qty: Some(250.0),
                unit_id: Some("unit-gram".to_string()),
            }]),
            "alice",
        )
        .unwrap();

        let (fetched, ingredients) = get_recipe(&db, &recipe.id, "alice").unwrap();
        assert_eq!(fetched.name, "Crepes");
        assert_eq!(fetched.description.as_deref(), Some("thinner"));
        assert_eq!(ingredients.len(), 1);
    }

    #[test]
    fn test_recipe_gated_by_household_role() {
        let (_temp, db) = setup();
        let recipe = pancakes(&db);

        let now = Utc::now();
        db.create_user(&User {
            id: "mallory".to_string(),
            email: "mallory@example.com".to_string(),
            email_norm: "mallory@example.com".to_string(),
            name: "mallory".to_string(),
            password_hash: "x".to_string(),
            scopes: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        assert!(matches!(
            get_recipe(&db, &recipe.id, "mallory"),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            create_recipe(&db, "hh-1", "Toast", None, &[], "mallory"),
            Err(Error::NotFound)
        ));
    }
}
