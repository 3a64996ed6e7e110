use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::*;

use super::access::require_store_role;

pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Normalizes an item name for uniqueness: trim, collapse internal
/// whitespace, lowercase. Deterministic and pure.
#[must_use]
pub fn name_norm(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Escapes LIKE metacharacters so user input only ever matches literally.
#[must_use]
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns the catalog item for a raw name, creating it when absent.
///
/// If a row with the same normalized name already exists it is returned
/// unchanged; aisle/section hints are only applied to newly created items.
/// Concurrent identical inserts are resolved through the unique index:
/// a constraint violation is retried as a lookup of the winner's row.
pub fn create_or_get_item(
    db: &dyn Database,
    store_id: &str,
    raw_name: &str,
    aisle_id: Option<&str>,
    section_id: Option<&str>,
    actor_id: &str,
) -> Result<StoreItem> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    create_or_get_item_unchecked(db, store_id, raw_name, aisle_id, section_id)
}

/// Same as [`create_or_get_item`] without the access gate, for callers that
/// have already authorized the store mutation (list upsert, recipe push).
pub(crate) fn create_or_get_item_unchecked(
    db: &dyn Database,
    store_id: &str,
    raw_name: &str,
    aisle_id: Option<&str>,
    section_id: Option<&str>,
) -> Result<StoreItem> {
    let norm = name_norm(raw_name);
    if norm.is_empty() {
        return Err(Error::validation("item name cannot be empty"));
    }

    if let Some(existing) = db.get_item_by_norm(store_id, &norm)? {
        return Ok(existing);
    }

    if let Some(aisle_id) = aisle_id {
        require_aisle_in_store(db, store_id, aisle_id)?;
    }
    if let Some(section_id) = section_id {
        require_section_in_store(db, store_id, section_id)?;
    }

    let now = Utc::now();
    let item = StoreItem {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        name: raw_name.split_whitespace().collect::<Vec<_>>().join(" "),
        name_norm: norm.clone(),
        aisle_id: aisle_id.map(str::to_string),
        section_id: section_id.map(str::to_string),
        usage_count: 0,
        last_used_at: None,
        is_favorite: false,
        is_hidden: false,
        created_at: now,
        updated_at: now,
    };

    match db.create_item(&item) {
        Ok(()) => Ok(item),
        // Lost the insert race; the winner's row is the answer.
        Err(Error::AlreadyExists) => db
            .get_item_by_norm(store_id, &norm)?
            .ok_or(Error::NotFound),
        Err(e) => Err(e),
    }
}

/// Case-insensitive substring search over the catalog, hidden items
/// excluded. Ordering is usage_count desc, then name asc, then id asc.
pub fn search_items(
    db: &dyn Database,
    store_id: &str,
    query: &str,
    limit: i64,
    actor_id: &str,
) -> Result<Vec<StoreItem>> {
    require_store_role(db, actor_id, store_id, Role::Viewer)?;
    let norm = name_norm(query);
    db.search_items(store_id, &escape_like(&norm), limit.clamp(1, MAX_SEARCH_LIMIT))
}

#[derive(Debug, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    /// Outer None = leave unchanged, Some(None) = clear.
    pub aisle_id: Option<Option<String>>,
    pub section_id: Option<Option<String>>,
    pub is_favorite: Option<bool>,
    pub is_hidden: Option<bool>,
}

/// Applies a partial update to a catalog item. Renames re-enter the
/// uniqueness check; colliding with another item is a CONFLICT.
pub fn update_item(
    db: &dyn Database,
    item_id: &str,
    update: ItemUpdate,
    actor_id: &str,
) -> Result<StoreItem> {
    let mut item = db.get_item(item_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &item.store_id, Role::Editor)?;

    if let Some(name) = update.name {
        let norm = name_norm(&name);
        if norm.is_empty() {
            return Err(Error::validation("item name cannot be empty"));
        }
        item.name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        item.name_norm = norm;
    }
    if let Some(aisle_id) = update.aisle_id {
        if let Some(aisle_id) = &aisle_id {
            require_aisle_in_store(db, &item.store_id, aisle_id)?;
        }
        item.aisle_id = aisle_id;
    }
    if let Some(section_id) = update.section_id {
        if let Some(section_id) = &section_id {
            require_section_in_store(db, &item.store_id, section_id)?;
        }
        item.section_id = section_id;
    }
    if let Some(is_favorite) = update.is_favorite {
        item.is_favorite = is_favorite;
    }
    if let Some(is_hidden) = update.is_hidden {
        item.is_hidden = is_hidden;
    }

    match db.update_item(&item) {
        Ok(()) => db.get_item(item_id)?.ok_or(Error::NotFound),
        Err(Error::AlreadyExists) => {
            Err(Error::conflict("an item with this name already exists"))
        }
        Err(e) => Err(e),
    }
}

/// Idempotent flag flip: favorite on/off.
pub fn set_item_favorite(
    db: &dyn Database,
    item_id: &str,
    is_favorite: bool,
    actor_id: &str,
) -> Result<StoreItem> {
    update_item(
        db,
        item_id,
        ItemUpdate {
            is_favorite: Some(is_favorite),
            ..ItemUpdate::default()
        },
        actor_id,
    )
}

pub fn set_item_hidden(
    db: &dyn Database,
    item_id: &str,
    is_hidden: bool,
    actor_id: &str,
) -> Result<StoreItem> {
    update_item(
        db,
        item_id,
        ItemUpdate {
            is_hidden: Some(is_hidden),
            ..ItemUpdate::default()
        },
        actor_id,
    )
}

/// Deletes a catalog item and, through the cascade, its shopping-list rows.
pub fn delete_item(db: &dyn Database, item_id: &str, actor_id: &str) -> Result<()> {
    let item = db.get_item(item_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &item.store_id, Role::Editor)?;
    db.delete_item(item_id)?;
    Ok(())
}

// Aisles and sections

pub fn create_aisle(
    db: &dyn Database,
    store_id: &str,
    name: &str,
    actor_id: &str,
) -> Result<StoreAisle> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("aisle name cannot be empty"));
    }

    let aisle = StoreAisle {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        name: name.to_string(),
        sort_order: db.next_aisle_sort_order(store_id)?,
        created_at: Utc::now(),
    };
    db.create_aisle(&aisle)?;
    Ok(aisle)
}

pub fn rename_aisle(
    db: &dyn Database,
    aisle_id: &str,
    name: &str,
    actor_id: &str,
) -> Result<StoreAisle> {
    let mut aisle = db.get_aisle(aisle_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &aisle.store_id, Role::Editor)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("aisle name cannot be empty"));
    }
    aisle.name = name.to_string();
    db.update_aisle(&aisle)?;
    Ok(aisle)
}

pub fn delete_aisle(db: &dyn Database, aisle_id: &str, actor_id: &str) -> Result<()> {
    let aisle = db.get_aisle(aisle_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &aisle.store_id, Role::Editor)?;
    db.delete_aisle(aisle_id)?;
    Ok(())
}

pub fn list_aisles(db: &dyn Database, store_id: &str, actor_id: &str) -> Result<Vec<StoreAisle>> {
    require_store_role(db, actor_id, store_id, Role::Viewer)?;
    db.list_aisles(store_id)
}

/// Applies a (id, sort_order) batch to a store's aisles. Ids from another
/// store reject the whole batch before anything is written.
pub fn reorder_aisles(
    db: &dyn Database,
    store_id: &str,
    updates: &[(String, i64)],
    actor_id: &str,
) -> Result<()> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    if updates.is_empty() {
        return Ok(());
    }
    db.reorder_aisles(store_id, updates)
}

pub fn create_section(
    db: &dyn Database,
    store_id: &str,
    aisle_id: &str,
    name: &str,
    actor_id: &str,
) -> Result<StoreSection> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    require_aisle_in_store(db, store_id, aisle_id)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("section name cannot be empty"));
    }

    let section = StoreSection {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        aisle_id: aisle_id.to_string(),
        name: name.to_string(),
        sort_order: db.next_section_sort_order(aisle_id)?,
        created_at: Utc::now(),
    };
    db.create_section(&section)?;
    Ok(section)
}

pub fn rename_section(
    db: &dyn Database,
    section_id: &str,
    name: &str,
    actor_id: &str,
) -> Result<StoreSection> {
    let mut section = db.get_section(section_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &section.store_id, Role::Editor)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("section name cannot be empty"));
    }
    section.name = name.to_string();
    db.update_section(&section)?;
    Ok(section)
}

pub fn delete_section(db: &dyn Database, section_id: &str, actor_id: &str) -> Result<()> {
    let section = db.get_section(section_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &section.store_id, Role::Editor)?;
    db.delete_section(section_id)?;
    Ok(())
}

pub fn list_sections(
    db: &dyn Database,
    aisle_id: &str,
    actor_id: &str,
) -> Result<Vec<StoreSection>> {
    let aisle = db.get_aisle(aisle_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &aisle.store_id, Role::Viewer)?;
    db.list_sections(aisle_id)
}

pub fn reorder_sections(
    db: &dyn Database,
    store_id: &str,
    updates: &[(String, i64)],
    actor_id: &str,
) -> Result<()> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    if updates.is_empty() {
        return Ok(());
    }
    db.reorder_sections(store_id, updates)
}

fn require_aisle_in_store(db: &dyn Database, store_id: &str, aisle_id: &str) -> Result<()> {
    match db.get_aisle(aisle_id)? {
        Some(aisle) if aisle.store_id == store_id => Ok(()),
        _ => Err(Error::NotFound),
    }
}

fn require_section_in_store(db: &dyn Database, store_id: &str, section_id: &str) -> Result<()> {
    match db.get_section(section_id)? {
        Some(section) if section.store_id == store_id => Ok(()),
        _ => Err(Error::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::db::SqliteDatabase;

    use super::*;

    fn setup_store() -> (TempDir, SqliteDatabase) {
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
        db.create_store(
            &Store {
                id: "store-1".to_string(),
                name: "corner shop".to_string(),
                household_id: None,
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

    #[test]
    fn test_name_norm() {
        assert_eq!(name_norm("  Milk  "), "milk");
        assert_eq!(name_norm("Whole   Wheat\tBread"), "whole wheat bread");
        assert_eq!(name_norm("EGGS"), "eggs");
        assert_eq!(name_norm("   "), "");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50% off_sale\\"), "50\\% off\\_sale\\\\");
        assert_eq!(escape_like("milk"), "milk");
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let (_temp, db) = setup_store();

        let first = create_or_get_item(&db, "store-1", "Milk", None, None, "alice").unwrap();
        let second = create_or_get_item(&db, "store-1", "  milk  ", None, None, "alice").unwrap();
        let third = create_or_get_item(&db, "store-1", "MILK", None, None, "alice").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        assert_eq!(first.usage_count, 0);
    }

    #[test]
    fn test_create_or_get_does_not_move_existing_item() {
        let (_temp, db) = setup_store();

        let aisle = create_aisle(&db, "store-1", "Dairy", "alice").unwrap();
        let first = create_or_get_item(&db, "store-1", "Milk", None, None, "alice").unwrap();
        let second =
            create_or_get_item(&db, "store-1", "milk", Some(&aisle.id), None, "alice").unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.aisle_id.is_none());
    }

    #[test]
    fn test_display_name_keeps_first_casing() {
        let (_temp, db) = setup_store();

        let item =
            create_or_get_item(&db, "store-1", "  Whole  Wheat Bread ", None, None, "alice")
                .unwrap();
        assert_eq!(item.name, "Whole Wheat Bread");
        assert_eq!(item.name_norm, "whole wheat bread");
    }

    #[test]
    fn test_rename_collision_is_conflict() {
        let (_temp, db) = setup_store();

        create_or_get_item(&db, "store-1", "Milk", None, None, "alice").unwrap();
        let eggs = create_or_get_item(&db, "store-1", "Eggs", None, None, "alice").unwrap();

        let result = update_item(
            &db,
            &eggs.id,
            ItemUpdate {
                name: Some("milk".to_string()),
                ..ItemUpdate::default()
            },
            "alice",
        );
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_favorite_and_hidden_toggles_idempotent() {
        let (_temp, db) = setup_store();

        let item = create_or_get_item(&db, "store-1", "Milk", None, None, "alice").unwrap();

        let item = set_item_favorite(&db, &item.id, true, "alice").unwrap();
        assert!(item.is_favorite);
        let item = set_item_favorite(&db, &item.id, true, "alice").unwrap();
        assert!(item.is_favorite);

        let item = set_item_hidden(&db, &item.id, true, "alice").unwrap();
        assert!(item.is_hidden);

        // Hidden items drop out of search.
        assert!(
            search_items(&db, "store-1", "milk", 10, "alice")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_aisle_assignment_validated_against_store() {
        let (_temp, db) = setup_store();

        let now = Utc::now();
        db.create_store(
            &Store {
                id: "store-2".to_string(),
                name: "other shop".to_string(),
                household_id: None,
                is_hidden: false,
                created_by: "alice".to_string(),
                updated_by: "alice".to_string(),
                created_at: now,
                updated_at: now,
            },
            &StoreCollaborator {
                store_id: "store-2".to_string(),
                user_id: "alice".to_string(),
                role: Role::Owner,
                created_at: now,
            },
        )
        .unwrap();
        let foreign_aisle = create_aisle(&db, "store-2", "Dairy", "alice").unwrap();

        let item = create_or_get_item(&db, "store-1", "Milk", None, None, "alice").unwrap();
        let result = update_item(
            &db,
            &item.id,
            ItemUpdate {
                aisle_id: Some(Some(foreign_aisle.id)),
                ..ItemUpdate::default()
            },
            "alice",
        );
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_aisle_sort_orders_are_dense() {
        let (_temp, db) = setup_store();

        let a = create_aisle(&db, "store-1", "Produce", "alice").unwrap();
        let b = create_aisle(&db, "store-1", "Dairy", "alice").unwrap();
        let c = create_aisle(&db, "store-1", "Frozen", "alice").unwrap();
        assert_eq!((a.sort_order, b.sort_order, c.sort_order), (0, 1, 2));

        reorder_aisles(
            &db,
            "store-1",
            &[(c.id.clone(), 0), (a.id.clone(), 1), (b.id.clone(), 2)],
            "alice",
        )
        .unwrap();

        let aisles = list_aisles(&db, "store-1", "alice").unwrap();
        let ids: Vec<&str> = aisles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str(), b.id.as_str()]);
    }

    #[test]
    fn test_sections_scoped_to_aisle() {
        let (_temp, db) = setup_store();

        let aisle = create_aisle(&db, "store-1", "Dairy", "alice").unwrap();
        let s1 = create_section(&db, "store-1", &aisle.id, "Yogurt", "alice").unwrap();
        let s2 = create_section(&db, "store-1", &aisle.id, "Cheese", "alice").unwrap();
        assert_eq!((s1.sort_order, s2.sort_order), (0, 1));

        let sections = list_sections(&db, &aisle.id, "alice").unwrap();
        assert_eq!(sections.len(), 2);
    }
}
