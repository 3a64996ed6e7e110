use crate::error::{Error, Result};

use super::ShoppingListItem;

/// In-memory form of a shopping-list entry.
///
/// Persistence flattens this into one nullable-heavy row; everything above
/// the database edge branches on this union instead of inspecting nullable
/// columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    /// Free-text entry with no catalog backing.
    Idea {
        name: String,
        notes: Option<String>,
    },
    /// Entry referencing a catalog item.
    Catalog {
        store_item_id: String,
        qty: Option<f64>,
        unit_id: Option<String>,
        notes: Option<String>,
    },
}

impl ListEntry {
    #[must_use]
    pub const fn is_idea(&self) -> bool {
        matches!(self, ListEntry::Idea { .. })
    }

    #[must_use]
    pub fn store_item_id(&self) -> Option<&str> {
        match self {
            ListEntry::Idea { .. } => None,
            ListEntry::Catalog { store_item_id, .. } => Some(store_item_id),
        }
    }

    /// Reconstructs the union from a stored row. Fails on rows that violate
    /// the idea/catalog shape (idea without a name, catalog without an item).
    pub fn from_row(row: &ShoppingListItem) -> Result<ListEntry> {
        if row.is_idea {
            let name = row
                .idea_name
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::validation("idea entry has no name"))?;
            Ok(ListEntry::Idea {
                name: name.to_string(),
                notes: row.notes.clone(),
            })
        } else {
            let store_item_id = row
                .store_item_id
                .as_deref()
                .ok_or_else(|| Error::validation("catalog entry has no item reference"))?;
            Ok(ListEntry::Catalog {
                store_item_id: store_item_id.to_string(),
                qty: row.qty,
                unit_id: row.unit_id.clone(),
                notes: row.notes.clone(),
            })
        }
    }

    /// Writes the union back into a row's variant columns, clearing the
    /// columns that belong to the other variant.
    pub fn apply_to_row(&self, row: &mut ShoppingListItem) {
        match self {
            ListEntry::Idea { name, notes } => {
                row.is_idea = true;
                row.idea_name = Some(name.clone());
                row.store_item_id = None;
                row.qty = None;
                row.unit_id = None;
                row.notes = notes.clone();
            }
            ListEntry::Catalog {
                store_item_id,
                qty,
                unit_id,
                notes,
            } => {
                row.is_idea = false;
                row.idea_name = None;
                row.store_item_id = Some(store_item_id.clone());
                row.qty = *qty;
                row.unit_id = unit_id.clone();
                row.notes = notes.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn blank_row() -> ShoppingListItem {
        ShoppingListItem {
            id: "sli-1".to_string(),
            store_id: "store-1".to_string(),
            store_item_id: None,
            idea_name: None,
            qty: None,
            unit_id: None,
            notes: None,
            is_idea: false,
            is_checked: false,
            checked_at: None,
            checked_by: None,
            is_unsure: false,
            is_sample: false,
            snoozed_until: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_idea_row_round_trip() {
        let mut row = blank_row();
        let entry = ListEntry::Idea {
            name: "surprise cake".to_string(),
            notes: Some("for Friday".to_string()),
        };
        entry.apply_to_row(&mut row);

        assert!(row.is_idea);
        assert!(row.store_item_id.is_none());
        assert_eq!(ListEntry::from_row(&row).unwrap(), entry);
    }

    #[test]
    fn test_catalog_row_round_trip() {
        let mut row = blank_row();
        let entry = ListEntry::Catalog {
            store_item_id: "item-1".to_string(),
            qty: Some(2.5),
            unit_id: Some("unit-kg".to_string()),
            notes: None,
        };
        entry.apply_to_row(&mut row);

        assert!(!row.is_idea);
        assert!(row.idea_name.is_none());
        assert_eq!(ListEntry::from_row(&row).unwrap(), entry);
    }

    #[test]
    fn test_switching_variant_clears_other_columns() {
        let mut row = blank_row();
        ListEntry::Catalog {
            store_item_id: "item-1".to_string(),
            qty: Some(1.0),
            unit_id: None,
            notes: None,
        }
        .apply_to_row(&mut row);

        ListEntry::Idea {
            name: "something nice".to_string(),
            notes: None,
        }
        .apply_to_row(&mut row);

        assert!(row.store_item_id.is_none());
        assert!(row.qty.is_none());
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let mut row = blank_row();
        row.is_idea = true;
        assert!(ListEntry::from_row(&row).is_err());

        let mut row = blank_row();
        row.is_idea = false;
        row.store_item_id = None;
        assert!(ListEntry::from_row(&row).is_err());
    }
}
