use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::*;

use super::access::require_store_role;
use super::catalog::create_or_get_item_unchecked;

/// How a new catalog-linked entry names its item: an existing id, or a raw
/// name resolved through the catalog upsert.
#[derive(Debug, Clone)]
pub enum CatalogRef {
    Id(String),
    Name(String),
}

/// Input for adding a shopping-list entry; mirrors the `ListEntry` union.
#[derive(Debug, Clone)]
pub enum EntryInput {
    Idea {
        name: String,
        notes: Option<String>,
    },
    Catalog {
        item: CatalogRef,
        qty: Option<f64>,
        unit_id: Option<String>,
        notes: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct EntryUpdate {
    /// Outer None = leave unchanged, Some(None) = clear.
    pub qty: Option<Option<f64>>,
    pub unit_id: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub is_unsure: Option<bool>,
    pub snoozed_until: Option<Option<DateTime<Utc>>>,
}

/// Adds an entry to a store's shopping list.
///
/// Ideas always create a fresh row. Catalog entries are deduplicated
/// against the one allowed unchecked row per item: when that row already
/// exists the provided qty/unit/notes replace its values and no usage is
/// counted; only a genuinely new row bumps the linked item's usage_count.
pub fn add_entry(
    db: &dyn Database,
    store_id: &str,
    input: EntryInput,
    is_unsure: bool,
    is_sample: bool,
    actor_id: &str,
) -> Result<ShoppingListItem> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;

    let entry = match input {
        EntryInput::Idea { name, notes } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::validation("idea entries need a name"));
            }
            ListEntry::Idea { name, notes }
        }
        EntryInput::Catalog {
            item,
            qty,
            unit_id,
            notes,
        } => {
            let item = match item {
                CatalogRef::Id(id) => {
                    let item = db.get_item(&id)?.ok_or(Error::NotFound)?;
                    if item.store_id != store_id {
                        return Err(Error::NotFound);
                    }
                    item
                }
                CatalogRef::Name(raw) => {
                    create_or_get_item_unchecked(db, store_id, &raw, None, None)?
                }
            };
            if let Some(unit_id) = &unit_id {
                if db.get_unit(unit_id)?.is_none() {
                    return Err(Error::validation("unknown quantity unit"));
                }
            }
            ListEntry::Catalog {
                store_item_id: item.id,
                qty,
                unit_id,
                notes,
            }
        }
    };

    let now = Utc::now();
    let mut row = ShoppingListItem {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        store_item_id: None,
        idea_name: None,
        qty: None,
        unit_id: None,
        notes: None,
        is_idea: false,
        is_checked: false,
        checked_at: None,
        checked_by: None,
        is_unsure,
        is_sample,
        snoozed_until: None,
        created_at: now,
        updated_at: now,
    };
    entry.apply_to_row(&mut row);

    match db.insert_list_item(&row) {
        Ok(()) => Ok(row),
        Err(Error::AlreadyExists) => {
            // An unchecked row for this item is already on the list; fold
            // the new values into it instead of duplicating.
            let Some(item_id) = row.store_item_id.as_deref() else {
                return Err(Error::AlreadyExists);
            };
            let mut existing = db
                .get_active_list_item_for_catalog(store_id, item_id)?
                .ok_or_else(|| Error::conflict("list entry changed concurrently"))?;
            existing.qty = row.qty;
            existing.unit_id = row.unit_id.clone();
            existing.notes = row.notes.clone();
            existing.is_unsure = is_unsure;
            db.update_list_item(&existing)?;
            db.get_list_item(&existing.id)?.ok_or(Error::NotFound)
        }
        Err(e) => Err(e),
    }
}

/// Checks or unchecks an entry. Timestamps and the acting user are recorded
/// only on an actual transition; repeating the same state is a no-op.
pub fn set_checked(
    db: &dyn Database,
    entry_id: &str,
    checked: bool,
    actor_id: &str,
) -> Result<ShoppingListItem> {
    let row = db.get_list_item(entry_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &row.store_id, Role::Editor)?;
    db.set_list_item_checked(entry_id, checked, actor_id)
}

pub fn update_entry(
    db: &dyn Database,
    entry_id: &str,
    update: EntryUpdate,
    actor_id: &str,
) -> Result<ShoppingListItem> {
    let mut row = db.get_list_item(entry_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &row.store_id, Role::Editor)?;

    if let Some(qty) = update.qty {
        if row.is_idea && qty.is_some() {
            return Err(Error::validation("idea entries have no quantity"));
        }
        row.qty = qty;
    }
    if let Some(unit_id) = update.unit_id {
        if let Some(unit_id) = &unit_id {
            if db.get_unit(unit_id)?.is_none() {
                return Err(Error::validation("unknown quantity unit"));
            }
        }
        row.unit_id = unit_id;
    }
    if let Some(notes) = update.notes {
        row.notes = notes;
    }
    if let Some(is_unsure) = update.is_unsure {
        row.is_unsure = is_unsure;
    }
    if let Some(snoozed_until) = update.snoozed_until {
        row.snoozed_until = snoozed_until;
    }

    db.update_list_item(&row)?;
    db.get_list_item(entry_id)?.ok_or(Error::NotFound)
}

pub fn delete_entry(db: &dyn Database, entry_id: &str, actor_id: &str) -> Result<()> {
    let row = db.get_list_item(entry_id)?.ok_or(Error::NotFound)?;
    require_store_role(db, actor_id, &row.store_id, Role::Editor)?;
    db.delete_list_item(entry_id)?;
    Ok(())
}

/// Bulk-deletes every checked entry. Irreversible; there is no undo.
pub fn clear_checked(db: &dyn Database, store_id: &str, actor_id: &str) -> Result<usize> {
    require_store_role(db, actor_id, store_id, Role::Editor)?;
    db.clear_checked_list_items(store_id)
}

pub fn list_entries(
    db: &dyn Database,
    store_id: &str,
    actor_id: &str,
) -> Result<Vec<ShoppingListItem>> {
    require_store_role(db, actor_id, store_id, Role::Viewer)?;
    db.list_list_items(store_id)
}
