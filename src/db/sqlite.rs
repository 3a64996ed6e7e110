use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Database;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or_else(|| {
        tracing::error!("Invalid role in database: '{}'", s);
        Role::Viewer
    })
}

fn scopes_to_string(scopes: &[String]) -> String {
    scopes.join(" ")
}

fn scopes_from_string(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Maps a constraint violation on INSERT/UPDATE to `AlreadyExists` so
/// callers can retry-as-lookup instead of surfacing a database error.
fn map_constraint(result: rusqlite::Result<usize>) -> Result<usize> {
    match result {
        Ok(rows) => Ok(rows),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::AlreadyExists)
        }
        Err(e) => Err(Error::from(e)),
    }
}

// Row mappers; column order must match the SELECT lists below.

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        email_norm: row.get(2)?,
        name: row.get(3)?,
        password_hash: row.get(4)?,
        scopes: scopes_from_string(&row.get::<_, String>(5)?),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn map_session_token(row: &Row) -> rusqlite::Result<SessionToken> {
    Ok(SessionToken {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
    })
}

fn map_household(row: &Row) -> rusqlite::Result<Household> {
    Ok(Household {
        id: row.get(0)?,
        name: row.get(1)?,
        created_by: row.get(2)?,
        updated_by: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn map_household_member(row: &Row) -> rusqlite::Result<HouseholdMember> {
    Ok(HouseholdMember {
        household_id: row.get(0)?,
        user_id: row.get(1)?,
        role: parse_role(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn map_household_invitation(row: &Row) -> rusqlite::Result<HouseholdInvitation> {
    Ok(HouseholdInvitation {
        id: row.get(0)?,
        household_id: row.get(1)?,
        invited_email: row.get(2)?,
        email_norm: row.get(3)?,
        invited_by: row.get(4)?,
        role: parse_role(&row.get::<_, String>(5)?),
        token: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn map_store(row: &Row) -> rusqlite::Result<Store> {
    Ok(Store {
        id: row.get(0)?,
        name: row.get(1)?,
        household_id: row.get(2)?,
        is_hidden: row.get(3)?,
        created_by: row.get(4)?,
        updated_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn map_store_collaborator(row: &Row) -> rusqlite::Result<StoreCollaborator> {
    Ok(StoreCollaborator {
        store_id: row.get(0)?,
        user_id: row.get(1)?,
        role: parse_role(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn map_store_invitation(row: &Row) -> rusqlite::Result<StoreInvitation> {
    Ok(StoreInvitation {
        id: row.get(0)?,
        store_id: row.get(1)?,
        invited_email: row.get(2)?,
        email_norm: row.get(3)?,
        invited_by: row.get(4)?,
        role: parse_role(&row.get::<_, String>(5)?),
        token: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn map_aisle(row: &Row) -> rusqlite::Result<StoreAisle> {
    Ok(StoreAisle {
        id: row.get(0)?,
        store_id: row.get(1)?,
        name: row.get(2)?,
        sort_order: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn map_section(row: &Row) -> rusqlite::Result<StoreSection> {
    Ok(StoreSection {
        id: row.get(0)?,
        store_id: row.get(1)?,
        aisle_id: row.get(2)?,
        name: row.get(3)?,
        sort_order: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn map_item(row: &Row) -> rusqlite::Result<StoreItem> {
    Ok(StoreItem {
        id: row.get(0)?,
        store_id: row.get(1)?,
        name: row.get(2)?,
        name_norm: row.get(3)?,
        aisle_id: row.get(4)?,
        section_id: row.get(5)?,
        usage_count: row.get(6)?,
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
        is_favorite: row.get(8)?,
        is_hidden: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

fn map_list_item(row: &Row) -> rusqlite::Result<ShoppingListItem> {
    Ok(ShoppingListItem {
        id: row.get(0)?,
        store_id: row.get(1)?,
        store_item_id: row.get(2)?,
        idea_name: row.get(3)?,
        qty: row.get(4)?,
        unit_id: row.get(5)?,
        notes: row.get(6)?,
        is_idea: row.get(7)?,
        is_checked: row.get(8)?,
        checked_at: row.get::<_, Option<String>>(9)?.map(|s| parse_datetime(&s)),
        checked_by: row.get(10)?,
        is_unsure: row.get(11)?,
        is_sample: row.get(12)?,
        snoozed_until: row.get::<_, Option<String>>(13)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(14)?),
        updated_at: parse_datetime(&row.get::<_, String>(15)?),
    })
}

fn map_unit(row: &Row) -> rusqlite::Result<QuantityUnit> {
    Ok(QuantityUnit {
        id: row.get(0)?,
        name: row.get(1)?,
        abbreviation: row.get(2)?,
    })
}

fn map_recipe(row: &Row) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_by: row.get(4)?,
        updated_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn map_ingredient(row: &Row) -> rusqlite::Result<RecipeIngredient> {
    Ok(RecipeIngredient {
        id: row.get(0)?,
        recipe_id: row.get(1)?,
        name: row.get(2)?,
        qty: row.get(3)?,
        unit_id: row.get(4)?,
        sort_order: row.get(5)?,
    })
}

const USER_COLS: &str = "id, email, email_norm, name, password_hash, scopes, created_at, updated_at";
const TOKEN_COLS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";
const HOUSEHOLD_COLS: &str = "id, name, created_by, updated_by, created_at, updated_at";
const MEMBER_COLS: &str = "household_id, user_id, role, created_at";
const HH_INVITATION_COLS: &str =
    "id, household_id, invited_email, email_norm, invited_by, role, token, created_at";
const STORE_COLS: &str =
    "id, name, household_id, is_hidden, created_by, updated_by, created_at, updated_at";
const COLLABORATOR_COLS: &str = "store_id, user_id, role, created_at";
const STORE_INVITATION_COLS: &str =
    "id, store_id, invited_email, email_norm, invited_by, role, token, created_at";
const AISLE_COLS: &str = "id, store_id, name, sort_order, created_at";
const SECTION_COLS: &str = "id, store_id, aisle_id, name, sort_order, created_at";
const ITEM_COLS: &str = "id, store_id, name, name_norm, aisle_id, section_id, usage_count, \
     last_used_at, is_favorite, is_hidden, created_at, updated_at";
const LIST_COLS: &str = "id, store_id, store_item_id, idea_name, qty, unit_id, notes, is_idea, \
     is_checked, checked_at, checked_by, is_unsure, is_sample, snoozed_until, created_at, updated_at";
const RECIPE_COLS: &str =
    "id, household_id, name, description, created_by, updated_by, created_at, updated_at";
const INGREDIENT_COLS: &str = "id, recipe_id, name, qty, unit_id, sort_order";

impl Database for SqliteDatabase {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        map_constraint(self.conn().execute(
            "INSERT INTO users (id, email, email_norm, name, password_hash, scopes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.email_norm,
                user.name,
                user.password_hash,
                scopes_to_string(&user.scopes),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        ))?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
            params![id],
            map_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email_norm: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE email_norm = ?1"),
            params![email_norm],
            map_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = map_constraint(self.conn().execute(
            "UPDATE users SET email = ?1, email_norm = ?2, name = ?3, password_hash = ?4,
                    scopes = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                user.email,
                user.email_norm,
                user.name,
                user.password_hash,
                scopes_to_string(&user.scopes),
                format_datetime(&Utc::now()),
                user.id,
            ],
        ))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Session token operations

    fn create_session_token(&self, token: &SessionToken) -> Result<()> {
        map_constraint(self.conn().execute(
            "INSERT INTO session_tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        ))?;
        Ok(())
    }

    fn get_session_token_by_lookup(&self, lookup: &str) -> Result<Option<SessionToken>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLS} FROM session_tokens WHERE token_lookup = ?1"),
            params![lookup],
            map_session_token,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM session_tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_session_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE session_tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Household operations

    fn create_household(&self, household: &Household, owner: &HouseholdMember) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO households (id, name, created_by, updated_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                household.id,
                household.name,
                household.created_by,
                household.updated_by,
                format_datetime(&household.created_at),
                format_datetime(&household.updated_at),
            ],
        )?;

        tx.execute(
            "INSERT INTO household_members (household_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                owner.household_id,
                owner.user_id,
                owner.role.as_str(),
                format_datetime(&owner.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_household(&self, id: &str) -> Result<Option<Household>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {HOUSEHOLD_COLS} FROM households WHERE id = ?1"),
            params![id],
            map_household,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_households_for_user(&self, user_id: &str) -> Result<Vec<Household>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT h.{} FROM households h
             JOIN household_members m ON m.household_id = h.id
             WHERE m.user_id = ?1
             ORDER BY h.name",
            HOUSEHOLD_COLS.replace(", ", ", h.")
        ))?;

        let rows = stmt.query_map(params![user_id], map_household)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_household(&self, household: &Household) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE households SET name = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                household.name,
                household.updated_by,
                format_datetime(&Utc::now()),
                household.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_household(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM households WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Household member operations

    fn get_household_member(
        &self,
        household_id: &str,
        user_id: &str,
    ) -> Result<Option<HouseholdMember>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {MEMBER_COLS} FROM household_members
                 WHERE household_id = ?1 AND user_id = ?2"
            ),
            params![household_id, user_id],
            map_household_member,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_household_members(&self, household_id: &str) -> Result<Vec<HouseholdMember>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLS} FROM household_members
             WHERE household_id = ?1 ORDER BY created_at, user_id"
        ))?;

        let rows = stmt.query_map(params![household_id], map_household_member)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_household_owners(&self, household_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM household_members WHERE household_id = ?1 AND role = 'owner'",
            params![household_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn set_household_member_role(
        &self,
        household_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT role FROM household_members WHERE household_id = ?1 AND user_id = ?2",
                params![household_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = parse_role(&current.ok_or(Error::NotFound)?);

        // The owner count is checked in the same transaction as the update
        // so concurrent demotions cannot both pass.
        if current == Role::Owner && role != Role::Owner {
            let owners: i64 = tx.query_row(
                "SELECT COUNT(*) FROM household_members WHERE household_id = ?1 AND role = 'owner'",
                params![household_id],
                |row| row.get(0),
            )?;
            if owners <= 1 {
                return Err(Error::conflict("cannot remove last owner"));
            }
        }

        tx.execute(
            "UPDATE household_members SET role = ?1 WHERE household_id = ?2 AND user_id = ?3",
            params![role.as_str(), household_id, user_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn remove_household_member(&self, household_id: &str, user_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT role FROM household_members WHERE household_id = ?1 AND user_id = ?2",
                params![household_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = parse_role(&current.ok_or(Error::NotFound)?);

        if current == Role::Owner {
            let owners: i64 = tx.query_row(
                "SELECT COUNT(*) FROM household_members WHERE household_id = ?1 AND role = 'owner'",
                params![household_id],
                |row| row.get(0),
            )?;
            if owners <= 1 {
                return Err(Error::conflict("cannot remove last owner"));
            }
        }

        tx.execute(
            "DELETE FROM household_members WHERE household_id = ?1 AND user_id = ?2",
            params![household_id, user_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // Household invitation operations

    fn create_household_invitation(&self, invitation: &HouseholdInvitation) -> Result<()> {
        map_constraint(self.conn().execute(
            "INSERT INTO household_invitations
                 (id, household_id, invited_email, email_norm, invited_by, role, token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invitation.id,
                invitation.household_id,
                invitation.invited_email,
                invitation.email_norm,
                invitation.invited_by,
                invitation.role.as_str(),
                invitation.token,
                format_datetime(&invitation.created_at),
            ],
        ))?;
        Ok(())
    }

    fn get_household_invitation(&self, id: &str) -> Result<Option<HouseholdInvitation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {HH_INVITATION_COLS} FROM household_invitations WHERE id = ?1"),
            params![id],
            map_household_invitation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_household_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<HouseholdInvitation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {HH_INVITATION_COLS} FROM household_invitations WHERE token = ?1"),
            params![token],
            map_household_invitation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_household_invitations(&self, household_id: &str) -> Result<Vec<HouseholdInvitation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {HH_INVITATION_COLS} FROM household_invitations
             WHERE household_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![household_id], map_household_invitation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_household_invitations_for_email(
        &self,
        email_norm: &str,
    ) -> Result<Vec<HouseholdInvitation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {HH_INVITATION_COLS} FROM household_invitations
             WHERE email_norm = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![email_norm], map_household_invitation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_household_invitation(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM household_invitations WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    fn consume_household_invitation(
        &self,
        invitation_id: &str,
        member: &HouseholdMember,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM household_invitations WHERE id = ?1",
                params![invitation_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound);
        }

        map_constraint(tx.execute(
            "INSERT INTO household_members (household_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                member.household_id,
                member.user_id,
                member.role.as_str(),
                format_datetime(&member.created_at),
            ],
        ))?;

        tx.execute(
            "DELETE FROM household_invitations WHERE id = ?1",
            params![invitation_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn count_household_invitations_for_email(&self, email_norm: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM household_invitations WHERE email_norm = ?1",
            params![email_norm],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Store operations

    fn create_store(&self, store: &Store, owner: &StoreCollaborator) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO stores (id, name, household_id, is_hidden, created_by, updated_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                store.id,
                store.name,
                store.household_id,
                store.is_hidden,
                store.created_by,
                store.updated_by,
                format_datetime(&store.created_at),
                format_datetime(&store.updated_at),
            ],
        )?;

        tx.execute(
            "INSERT INTO store_collaborators (store_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                owner.store_id,
                owner.user_id,
                owner.role.as_str(),
                format_datetime(&owner.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_store(&self, id: &str) -> Result<Option<Store>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {STORE_COLS} FROM stores WHERE id = ?1"),
            params![id],
            map_store,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_stores_for_user(&self, user_id: &str) -> Result<Vec<Store>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT s.{} FROM stores s
             LEFT JOIN store_collaborators c ON c.store_id = s.id AND c.user_id = ?1
             LEFT JOIN household_members m ON m.household_id = s.household_id AND m.user_id = ?1
             WHERE c.user_id IS NOT NULL OR m.user_id IS NOT NULL
             ORDER BY s.name",
            STORE_COLS.replace(", ", ", s.")
        ))?;

        let rows = stmt.query_map(params![user_id], map_store)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_store(&self, store: &Store) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE stores SET name = ?1, household_id = ?2, is_hidden = ?3, updated_by = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                store.name,
                store.household_id,
                store.is_hidden,
                store.updated_by,
                format_datetime(&Utc::now()),
                store.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_store(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM stores WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Store collaborator operations

    fn get_store_collaborator(
        &self,
        store_id: &str,
        user_id: &str,
    ) -> Result<Option<StoreCollaborator>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {COLLABORATOR_COLS} FROM store_collaborators
                 WHERE store_id = ?1 AND user_id = ?2"
            ),
            params![store_id, user_id],
            map_store_collaborator,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_store_collaborators(&self, store_id: &str) -> Result<Vec<StoreCollaborator>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLABORATOR_COLS} FROM store_collaborators
             WHERE store_id = ?1 ORDER BY created_at, user_id"
        ))?;

        let rows = stmt.query_map(params![store_id], map_store_collaborator)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_store_owners(&self, store_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM store_collaborators WHERE store_id = ?1 AND role = 'owner'",
            params![store_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn set_store_collaborator_role(
        &self,
        store_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT role FROM store_collaborators WHERE store_id = ?1 AND user_id = ?2",
                params![store_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = parse_role(&current.ok_or(Error::NotFound)?);

        if current == Role::Owner && role != Role::Owner {
            let owners: i64 = tx.query_row(
                "SELECT COUNT(*) FROM store_collaborators WHERE store_id = ?1 AND role = 'owner'",
                params![store_id],
                |row| row.get(0),
            )?;
            if owners <= 1 {
                return Err(Error::conflict("cannot remove last owner"));
            }
        }

        tx.execute(
            "UPDATE store_collaborators SET role = ?1 WHERE store_id = ?2 AND user_id = ?3",
            params![role.as_str(), store_id, user_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn remove_store_collaborator(&self, store_id: &str, user_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT role FROM store_collaborators WHERE store_id = ?1 AND user_id = ?2",
                params![store_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = parse_role(&current.ok_or(Error::NotFound)?);

        if current == Role::Owner {
            let owners: i64 = tx.query_row(
                "SELECT COUNT(*) FROM store_collaborators WHERE store_id = ?1 AND role = 'owner'",
                params![store_id],
                |row| row.get(0),
            )?;
            if owners <= 1 {
                return Err(Error::conflict("cannot remove last owner"));
            }
        }

        tx.execute(
            "DELETE FROM store_collaborators WHERE store_id = ?1 AND user_id = ?2",
            params![store_id, user_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // Store invitation operations

    fn create_store_invitation(&self, invitation: &StoreInvitation) -> Result<()> {
        map_constraint(self.conn().execute(
            "INSERT INTO store_invitations
                 (id, store_id, invited_email, email_norm, invited_by, role, token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invitation.id,
                invitation.store_id,
                invitation.invited_email,
                invitation.email_norm,
                invitation.invited_by,
                invitation.role.as_str(),
                invitation.token,
                format_datetime(&invitation.created_at),
            ],
        ))?;
        Ok(())
    }

    fn get_store_invitation(&self, id: &str) -> Result<Option<StoreInvitation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {STORE_INVITATION_COLS} FROM store_invitations WHERE id = ?1"),
            params![id],
            map_store_invitation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_store_invitation_by_token(&self, token: &str) -> Result<Option<StoreInvitation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {STORE_INVITATION_COLS} FROM store_invitations WHERE token = ?1"),
            params![token],
            map_store_invitation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_store_invitations(&self, store_id: &str) -> Result<Vec<StoreInvitation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STORE_INVITATION_COLS} FROM store_invitations
             WHERE store_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![store_id], map_store_invitation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_store_invitations_for_email(&self, email_norm: &str) -> Result<Vec<StoreInvitation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STORE_INVITATION_COLS} FROM store_invitations
             WHERE email_norm = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![email_norm], map_store_invitation)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_store_invitation(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM store_invitations WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn consume_store_invitation(
        &self,
        invitation_id: &str,
        collaborator: &StoreCollaborator,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM store_invitations WHERE id = ?1",
                params![invitation_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound);
        }

        map_constraint(tx.execute(
            "INSERT INTO store_collaborators (store_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                collaborator.store_id,
                collaborator.user_id,
                collaborator.role.as_str(),
                format_datetime(&collaborator.created_at),
            ],
        ))?;

        tx.execute(
            "DELETE FROM store_invitations WHERE id = ?1",
            params![invitation_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn count_store_invitations_for_email(&self, email_norm: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM store_invitations WHERE email_norm = ?1",
            params![email_norm],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Aisle operations

    fn create_aisle(&self, aisle: &StoreAisle) -> Result<()> {
        self.conn().execute(
            "INSERT INTO store_aisles (id, store_id, name, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                aisle.id,
                aisle.store_id,
                aisle.name,
                aisle.sort_order,
                format_datetime(&aisle.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_aisle(&self, id: &str) -> Result<Option<StoreAisle>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {AISLE_COLS} FROM store_aisles WHERE id = ?1"),
            params![id],
            map_aisle,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_aisles(&self, store_id: &str) -> Result<Vec<StoreAisle>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AISLE_COLS} FROM store_aisles
             WHERE store_id = ?1 ORDER BY sort_order, created_at, id"
        ))?;

        let rows = stmt.query_map(params![store_id], map_aisle)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_aisle(&self, aisle: &StoreAisle) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE store_aisles SET name = ?1 WHERE id = ?2",
            params![aisle.name, aisle.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_aisle(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM store_aisles WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn next_aisle_sort_order(&self, store_id: &str) -> Result<i64> {
        let conn = self.conn();
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sort_order) FROM store_aisles WHERE store_id = ?1",
                params![store_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.map_or(0, |m| m + 1))
    }

    fn reorder_aisles(&self, store_id: &str, updates: &[(String, i64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // All ids are validated before any row is touched so a bad batch
        // leaves the ordering untouched.
        for (id, _) in updates {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT store_id FROM store_aisles WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match owner {
                Some(s) if s == store_id => {}
                _ => return Err(Error::NotFound),
            }
        }

        for (id, sort_order) in updates {
            tx.execute(
                "UPDATE store_aisles SET sort_order = ?1 WHERE id = ?2",
                params![sort_order, id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Section operations

    fn create_section(&self, section: &StoreSection) -> Result<()> {
        self.conn().execute(
            "INSERT INTO store_sections (id, store_id, aisle_id, name, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                section.id,
                section.store_id,
                section.aisle_id,
                section.name,
                section.sort_order,
                format_datetime(&section.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_section(&self, id: &str) -> Result<Option<StoreSection>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SECTION_COLS} FROM store_sections WHERE id = ?1"),
            params![id],
            map_section,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_sections(&self, aisle_id: &str) -> Result<Vec<StoreSection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SECTION_COLS} FROM store_sections
             WHERE aisle_id = ?1 ORDER BY sort_order, created_at, id"
        ))?;

        let rows = stmt.query_map(params![aisle_id], map_section)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_section(&self, section: &StoreSection) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE store_sections SET name = ?1, aisle_id = ?2 WHERE id = ?3",
            params![section.name, section.aisle_id, section.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_section(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM store_sections WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn next_section_sort_order(&self, aisle_id: &str) -> Result<i64> {
        let conn = self.conn();
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sort_order) FROM store_sections WHERE aisle_id = ?1",
                params![aisle_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.map_or(0, |m| m + 1))
    }

    fn reorder_sections(&self, store_id: &str, updates: &[(String, i64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for (id, _) in updates {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT store_id FROM store_sections WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match owner {
                Some(s) if s == store_id => {}
                _ => return Err(Error::NotFound),
            }
        }

        for (id, sort_order) in updates {
            tx.execute(
                "UPDATE store_sections SET sort_order = ?1 WHERE id = ?2",
                params![sort_order, id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Catalog item operations

    fn create_item(&self, item: &StoreItem) -> Result<()> {
        map_constraint(self.conn().execute(
            "INSERT INTO store_items
                 (id, store_id, name, name_norm, aisle_id, section_id, usage_count,
                  last_used_at, is_favorite, is_hidden, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                item.id,
                item.store_id,
                item.name,
                item.name_norm,
                item.aisle_id,
                item.section_id,
                item.usage_count,
                item.last_used_at.as_ref().map(format_datetime),
                item.is_favorite,
                item.is_hidden,
                format_datetime(&item.created_at),
                format_datetime(&item.updated_at),
            ],
        ))?;
        Ok(())
    }

    fn get_item(&self, id: &str) -> Result<Option<StoreItem>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ITEM_COLS} FROM store_items WHERE id = ?1"),
            params![id],
            map_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_item_by_norm(&self, store_id: &str, name_norm: &str) -> Result<Option<StoreItem>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ITEM_COLS} FROM store_items WHERE store_id = ?1 AND name_norm = ?2"),
            params![store_id, name_norm],
            map_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn search_items(
        &self,
        store_id: &str,
        query_norm: &str,
        limit: i64,
    ) -> Result<Vec<StoreItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLS} FROM store_items
             WHERE store_id = ?1 AND is_hidden = 0 AND name_norm LIKE ?2 ESCAPE '\\'
             ORDER BY usage_count DESC, name ASC, id ASC
             LIMIT ?3"
        ))?;

        let pattern = format!("%{query_norm}%");
        let rows = stmt.query_map(params![store_id, pattern, limit], map_item)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_item(&self, item: &StoreItem) -> Result<()> {
        let rows = map_constraint(self.conn().execute(
            "UPDATE store_items SET name = ?1, name_norm = ?2, aisle_id = ?3, section_id = ?4,
                    is_favorite = ?5, is_hidden = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                item.name,
                item.name_norm,
                item.aisle_id,
                item.section_id,
                item.is_favorite,
                item.is_hidden,
                format_datetime(&Utc::now()),
                item.id,
            ],
        ))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_item(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM store_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Shopping list operations

    fn insert_list_item(&self, row: &ShoppingListItem) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        map_constraint(tx.execute(
            "INSERT INTO shopping_list_items
                 (id, store_id, store_item_id, idea_name, qty, unit_id, notes, is_idea,
                  is_checked, checked_at, checked_by, is_unsure, is_sample, snoozed_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                row.id,
                row.store_id,
                row.store_item_id,
                row.idea_name,
                row.qty,
                row.unit_id,
                row.notes,
                row.is_idea,
                row.is_checked,
                row.checked_at.as_ref().map(format_datetime),
                row.checked_by,
                row.is_unsure,
                row.is_sample,
                row.snoozed_until.as_ref().map(format_datetime),
                format_datetime(&row.created_at),
                format_datetime(&row.updated_at),
            ],
        ))?;

        // Usage tracking rides the same transaction as the insert; a failed
        // insert never inflates the counter.
        if let Some(item_id) = &row.store_item_id {
            tx.execute(
                "UPDATE store_items SET usage_count = usage_count + 1, last_used_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![format_datetime(&Utc::now()), item_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_list_item(&self, id: &str) -> Result<Option<ShoppingListItem>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LIST_COLS} FROM shopping_list_items WHERE id = ?1"),
            params![id],
            map_list_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_active_list_item_for_catalog(
        &self,
        store_id: &str,
        store_item_id: &str,
    ) -> Result<Option<ShoppingListItem>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {LIST_COLS} FROM shopping_list_items
                 WHERE store_id = ?1 AND store_item_id = ?2 AND is_checked = 0"
            ),
            params![store_id, store_item_id],
            map_list_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_list_items(&self, store_id: &str) -> Result<Vec<ShoppingListItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LIST_COLS} FROM shopping_list_items
             WHERE store_id = ?1 ORDER BY is_checked, created_at, id"
        ))?;

        let rows = stmt.query_map(params![store_id], map_list_item)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_list_item(&self, row: &ShoppingListItem) -> Result<()> {
        let rows = map_constraint(self.conn().execute(
            "UPDATE shopping_list_items
             SET store_item_id = ?1, idea_name = ?2, qty = ?3, unit_id = ?4, notes = ?5,
                 is_idea = ?6, is_unsure = ?7, snoozed_until = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                row.store_item_id,
                row.idea_name,
                row.qty,
                row.unit_id,
                row.notes,
                row.is_idea,
                row.is_unsure,
                row.snoozed_until.as_ref().map(format_datetime),
                format_datetime(&Utc::now()),
                row.id,
            ],
        ))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_list_item(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM shopping_list_items WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    fn set_list_item_checked(
        &self,
        id: &str,
        checked: bool,
        checked_by: &str,
    ) -> Result<ShoppingListItem> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("SELECT {LIST_COLS} FROM shopping_list_items WHERE id = ?1"),
                params![id],
                map_list_item,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        // Timestamps move only on an actual transition.
        if current.is_checked == checked {
            return Ok(current);
        }

        let now = format_datetime(&Utc::now());
        if checked {
            tx.execute(
                "UPDATE shopping_list_items
                 SET is_checked = 1, checked_at = ?1, checked_by = ?2, updated_at = ?1
                 WHERE id = ?3",
                params![now, checked_by, id],
            )?;
        } else {
            tx.execute(
                "UPDATE shopping_list_items
                 SET is_checked = 0, checked_at = NULL, checked_by = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
        }

        let updated = tx.query_row(
            &format!("SELECT {LIST_COLS} FROM shopping_list_items WHERE id = ?1"),
            params![id],
            map_list_item,
        )?;

        tx.commit()?;
        Ok(updated)
    }

    fn clear_checked_list_items(&self, store_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM shopping_list_items WHERE store_id = ?1 AND is_checked = 1",
            params![store_id],
        )?;
        Ok(rows)
    }

    // Quantity unit operations

    fn get_unit(&self, id: &str) -> Result<Option<QuantityUnit>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, abbreviation FROM quantity_units WHERE id = ?1",
            params![id],
            map_unit,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_units(&self) -> Result<Vec<QuantityUnit>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, abbreviation FROM quantity_units ORDER BY name")?;

        let rows = stmt.query_map([], map_unit)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Recipe operations

    fn create_recipe(&self, recipe: &Recipe, ingredients: &[RecipeIngredient]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO recipes (id, household_id, name, description, created_by, updated_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                recipe.id,
                recipe.household_id,
                recipe.name,
                recipe.description,
                recipe.created_by,
                recipe.updated_by,
                format_datetime(&recipe.created_at),
                format_datetime(&recipe.updated_at),
            ],
        )?;

        for ingredient in ingredients {
            tx.execute(
                "INSERT INTO recipe_ingredients (id, recipe_id, name, qty, unit_id, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ingredient.id,
                    ingredient.recipe_id,
                    ingredient.name,
                    ingredient.qty,
                    ingredient.unit_id,
                    ingredient.sort_order,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RECIPE_COLS} FROM recipes WHERE id = ?1"),
            params![id],
            map_recipe,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_recipes(&self, household_id: &str) -> Result<Vec<Recipe>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECIPE_COLS} FROM recipes WHERE household_id = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![household_id], map_recipe)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_recipe(
        &self,
        recipe: &Recipe,
        ingredients: Option<&[RecipeIngredient]>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE recipes SET name = ?1, description = ?2, updated_by = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                recipe.name,
                recipe.description,
                recipe.updated_by,
                format_datetime(&Utc::now()),
                recipe.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        if let Some(ingredients) = ingredients {
            tx.execute(
                "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
                params![recipe.id],
            )?;
            for ingredient in ingredients {
                tx.execute(
                    "INSERT INTO recipe_ingredients (id, recipe_id, name, qty, unit_id, sort_order)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        ingredient.id,
                        ingredient.recipe_id,
                        ingredient.name,
                        ingredient.qty,
                        ingredient.unit_id,
                        ingredient.sort_order,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_recipe(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<RecipeIngredient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INGREDIENT_COLS} FROM recipe_ingredients
             WHERE recipe_id = ?1 ORDER BY sort_order, id"
        ))?;

        let rows = stmt.query_map(params![recipe_id], map_ingredient)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Notification counts

    fn count_pending_household_invitations(&self, email_norm: &str) -> Result<i64> {
        self.count_household_invitations_for_email(email_norm)
    }

    fn count_pending_store_invitations(&self, email_norm: &str) -> Result<i64> {
        self.count_store_invitations_for_email(email_norm)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_db(temp: &TempDir) -> SqliteDatabase {
        let db = SqliteDatabase::new(temp.path().join("test.db")).unwrap();
        db.initialize().unwrap();
        db
    }

    fn insert_user(db: &SqliteDatabase, id: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: id.to_string(),
            email: email.to_string(),
            email_norm: normalize_email(email),
            name: id.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            scopes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).unwrap();
        user
    }

    fn insert_household(db: &SqliteDatabase, id: &str, owner: &User) -> Household {
        let now = Utc::now();
        let household = Household {
            id: id.to_string(),
            name: format!("{id} household"),
            created_by: owner.id.clone(),
            updated_by: owner.id.clone(),
            created_at: now,
            updated_at: now,
        };
        let member = HouseholdMember {
            household_id: id.to_string(),
            user_id: owner.id.clone(),
            role: Role::Owner,
            created_at: now,
        };
        db.create_household(&household, &member).unwrap();
        household
    }

    fn insert_store(db: &SqliteDatabase, id: &str, owner: &User, household: Option<&str>) -> Store {
        let now = Utc::now();
        let store = Store {
            id: id.to_string(),
            name: format!("{id} store"),
            household_id: household.map(str::to_string),
            is_hidden: false,
            created_by: owner.id.clone(),
            updated_by: owner.id.clone(),
            created_at: now,
            updated_at: now,
        };
        let collaborator = StoreCollaborator {
            store_id: id.to_string(),
            user_id: owner.id.clone(),
            role: Role::Owner,
            created_at: now,
        };
        db.create_store(&store, &collaborator).unwrap();
        store
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"session_tokens".to_string()));
        assert!(tables.contains(&"households".to_string()));
        assert!(tables.contains(&"household_members".to_string()));
        assert!(tables.contains(&"household_invitations".to_string()));
        assert!(tables.contains(&"stores".to_string()));
        assert!(tables.contains(&"store_collaborators".to_string()));
        assert!(tables.contains(&"store_invitations".to_string()));
        assert!(tables.contains(&"store_aisles".to_string()));
        assert!(tables.contains(&"store_sections".to_string()));
        assert!(tables.contains(&"store_items".to_string()));
        assert!(tables.contains(&"quantity_units".to_string()));
        assert!(tables.contains(&"shopping_list_items".to_string()));
        assert!(tables.contains(&"recipes".to_string()));
        assert!(tables.contains(&"recipe_ingredients".to_string()));
    }

    #[test]
    fn test_user_email_unique_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        insert_user(&db, "user-1", "Alice@Example.com");

        let now = Utc::now();
        let dup = User {
            id: "user-2".to_string(),
            email: "alice@example.COM".to_string(),
            email_norm: normalize_email("alice@example.COM"),
            name: "other".to_string(),
            password_hash: "x".to_string(),
            scopes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(db.create_user(&dup), Err(Error::AlreadyExists)));

        let found = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(found.id, "user-1");
    }

    #[test]
    fn test_last_owner_guard_on_role_change() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_household(&db, "hh-1", &alice);

        let result = db.set_household_member_role("hh-1", "alice", Role::Editor);
        assert!(matches!(result, Err(Error::Conflict(_))));

        // A second owner unblocks the demotion.
        let bob = insert_user(&db, "bob", "bob@example.com");
        let member = HouseholdMember {
            household_id: "hh-1".to_string(),
            user_id: bob.id.clone(),
            role: Role::Owner,
            created_at: Utc::now(),
        };
        let invitation = HouseholdInvitation {
            id: "inv-1".to_string(),
            household_id: "hh-1".to_string(),
            invited_email: bob.email.clone(),
            email_norm: bob.email_norm.clone(),
            invited_by: alice.id.clone(),
            role: Role::Owner,
            token: "tok-1".to_string(),
            created_at: Utc::now(),
        };
        db.create_household_invitation(&invitation).unwrap();
        db.consume_household_invitation("inv-1", &member).unwrap();

        db.set_household_member_role("hh-1", "alice", Role::Editor)
            .unwrap();
        assert_eq!(db.count_household_owners("hh-1").unwrap(), 1);

        // Now bob is the last owner and cannot be removed.
        let result = db.remove_household_member("hh-1", "bob");
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_consume_invitation_removes_it() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        let bob = insert_user(&db, "bob", "bob@example.com");
        insert_household(&db, "hh-1", &alice);

        let invitation = HouseholdInvitation {
            id: "inv-1".to_string(),
            household_id: "hh-1".to_string(),
            invited_email: bob.email.clone(),
            email_norm: bob.email_norm.clone(),
            invited_by: alice.id.clone(),
            role: Role::Editor,
            token: "tok-1".to_string(),
            created_at: Utc::now(),
        };
        db.create_household_invitation(&invitation).unwrap();

        let member = HouseholdMember {
            household_id: "hh-1".to_string(),
            user_id: bob.id.clone(),
            role: Role::Editor,
            created_at: Utc::now(),
        };
        db.consume_household_invitation("inv-1", &member).unwrap();

        assert!(db.get_household_invitation("inv-1").unwrap().is_none());
        assert!(
            db.get_household_member("hh-1", "bob")
                .unwrap()
                .is_some_and(|m| m.role == Role::Editor)
        );

        // Consuming again is NotFound and must not insert anything.
        let result = db.consume_household_invitation("inv-1", &member);
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_duplicate_pending_invitation_rejected() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_household(&db, "hh-1", &alice);

        let invitation = HouseholdInvitation {
            id: "inv-1".to_string(),
            household_id: "hh-1".to_string(),
            invited_email: "Bob@Example.com".to_string(),
            email_norm: "bob@example.com".to_string(),
            invited_by: alice.id.clone(),
            role: Role::Editor,
            token: "tok-1".to_string(),
            created_at: Utc::now(),
        };
        db.create_household_invitation(&invitation).unwrap();

        let mut second = invitation.clone();
        second.id = "inv-2".to_string();
        second.token = "tok-2".to_string();
        assert!(matches!(
            db.create_household_invitation(&second),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn test_item_name_norm_unique_per_store() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_store(&db, "store-1", &alice, None);
        insert_store(&db, "store-2", &alice, None);

        let now = Utc::now();
        let item = StoreItem {
            id: "item-1".to_string(),
            store_id: "store-1".to_string(),
            name: "Milk".to_string(),
            name_norm: "milk".to_string(),
            aisle_id: None,
            section_id: None,
            usage_count: 0,
            last_used_at: None,
            is_favorite: false,
            is_hidden: false,
            created_at: now,
            updated_at: now,
        };
        db.create_item(&item).unwrap();

        let mut dup = item.clone();
        dup.id = "item-2".to_string();
        assert!(matches!(db.create_item(&dup), Err(Error::AlreadyExists)));

        // Same normalized name in another store is fine.
        let mut other = item.clone();
        other.id = "item-3".to_string();
        other.store_id = "store-2".to_string();
        db.create_item(&other).unwrap();
    }

    #[test]
    fn test_insert_list_item_bumps_usage_once() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_store(&db, "store-1", &alice, None);

        let now = Utc::now();
        let item = StoreItem {
            id: "item-1".to_string(),
            store_id: "store-1".to_string(),
            name: "Bread".to_string(),
            name_norm: "bread".to_string(),
            aisle_id: None,
            section_id: None,
            usage_count: 0,
            last_used_at: None,
            is_favorite: false,
            is_hidden: false,
            created_at: now,
            updated_at: now,
        };
        db.create_item(&item).unwrap();

        let row = ShoppingListItem {
            id: "sli-1".to_string(),
            store_id: "store-1".to_string(),
            store_item_id: Some("item-1".to_string()),
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
            created_at: now,
            updated_at: now,
        };
        db.insert_list_item(&row).unwrap();
        assert_eq!(db.get_item("item-1").unwrap().unwrap().usage_count, 1);

        // A second unchecked row for the same item hits the partial unique
        // index and must not bump the counter.
        let mut dup = row.clone();
        dup.id = "sli-2".to_string();
        assert!(matches!(db.insert_list_item(&dup), Err(Error::AlreadyExists)));
        assert_eq!(db.get_item("item-1").unwrap().unwrap().usage_count, 1);

        // Checking frees the slot for a fresh row.
        db.set_list_item_checked("sli-1", true, "alice").unwrap();
        db.insert_list_item(&dup).unwrap();
        assert_eq!(db.get_item("item-1").unwrap().unwrap().usage_count, 2);
    }

    #[test]
    fn test_checked_transition_timestamps() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_store(&db, "store-1", &alice, None);

        let now = Utc::now();
        let row = ShoppingListItem {
            id: "sli-1".to_string(),
            store_id: "store-1".to_string(),
            store_item_id: None,
            idea_name: Some("surprise cake".to_string()),
            qty: None,
            unit_id: None,
            notes: None,
            is_idea: true,
            is_checked: false,
            checked_at: None,
            checked_by: None,
            is_unsure: false,
            is_sample: false,
            snoozed_until: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_list_item(&row).unwrap();

        let checked = db.set_list_item_checked("sli-1", true, "alice").unwrap();
        assert!(checked.is_checked);
        assert!(checked.checked_at.is_some());
        assert_eq!(checked.checked_by.as_deref(), Some("alice"));

        // Re-checking is a no-op; the timestamp must not move.
        let again = db.set_list_item_checked("sli-1", true, "alice").unwrap();
        assert_eq!(again.checked_at, checked.checked_at);

        let unchecked = db.set_list_item_checked("sli-1", false, "alice").unwrap();
        assert!(!unchecked.is_checked);
        assert!(unchecked.checked_at.is_none());
        assert!(unchecked.checked_by.is_none());
    }

    #[test]
    fn test_reorder_aisles_rejects_foreign_id() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_store(&db, "store-1", &alice, None);
        insert_store(&db, "store-2", &alice, None);

        let now = Utc::now();
        for (id, store_id, sort) in [
            ("aisle-1", "store-1", 0),
            ("aisle-2", "store-1", 1),
            ("aisle-3", "store-2", 0),
        ] {
            db.create_aisle(&StoreAisle {
                id: id.to_string(),
                store_id: store_id.to_string(),
                name: id.to_string(),
                sort_order: sort,
                created_at: now,
            })
            .unwrap();
        }

        let updates = vec![
            ("aisle-1".to_string(), 1),
            ("aisle-2".to_string(), 0),
            ("aisle-3".to_string(), 2),
        ];
        assert!(matches!(
            db.reorder_aisles("store-1", &updates),
            Err(Error::NotFound)
        ));

        // Nothing was applied.
        let aisles = db.list_aisles("store-1").unwrap();
        assert_eq!(aisles[0].id, "aisle-1");
        assert_eq!(aisles[0].sort_order, 0);

        let valid = vec![("aisle-1".to_string(), 1), ("aisle-2".to_string(), 0)];
        db.reorder_aisles("store-1", &valid).unwrap();
        let aisles = db.list_aisles("store-1").unwrap();
        assert_eq!(aisles[0].id, "aisle-2");
    }

    #[test]
    fn test_list_stores_for_user_includes_household_stores() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        let bob = insert_user(&db, "bob", "bob@example.com");
        insert_household(&db, "hh-1", &alice);
        insert_store(&db, "store-1", &alice, Some("hh-1"));
        insert_store(&db, "store-2", &alice, None);

        // Bob joins the household but is no direct collaborator anywhere.
        let invitation = HouseholdInvitation {
            id: "inv-1".to_string(),
            household_id: "hh-1".to_string(),
            invited_email: bob.email.clone(),
            email_norm: bob.email_norm.clone(),
            invited_by: alice.id.clone(),
            role: Role::Viewer,
            token: "tok-1".to_string(),
            created_at: Utc::now(),
        };
        db.create_household_invitation(&invitation).unwrap();
        db.consume_household_invitation(
            "inv-1",
            &HouseholdMember {
                household_id: "hh-1".to_string(),
                user_id: bob.id.clone(),
                role: Role::Viewer,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let alice_stores = db.list_stores_for_user("alice").unwrap();
        assert_eq!(alice_stores.len(), 2);

        let bob_stores = db.list_stores_for_user("bob").unwrap();
        assert_eq!(bob_stores.len(), 1);
        assert_eq!(bob_stores[0].id, "store-1");
    }

    #[test]
    fn test_search_items_ordering() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let alice = insert_user(&db, "alice", "alice@example.com");
        insert_store(&db, "store-1", &alice, None);

        let now = Utc::now();
        for (id, name, norm, usage, hidden) in [
            ("item-1", "Milk", "milk", 5, false),
            ("item-2", "Milk chocolate", "milk chocolate", 9, false),
            ("item-3", "Buttermilk", "buttermilk", 9, false),
            ("item-4", "Milkshake mix", "milkshake mix", 1, true),
        ] {
            db.create_item(&StoreItem {
                id: id.to_string(),
                store_id: "store-1".to_string(),
                name: name.to_string(),
                name_norm: norm.to_string(),
                aisle_id: None,
                section_id: None,
                usage_count: usage,
                last_used_at: None,
                is_favorite: false,
                is_hidden: hidden,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        }

        let results = db.search_items("store-1", "milk", 10).unwrap();
        let ids: Vec<&str> = results.iter().map(|i| i.id.as_str()).collect();
        // usage desc, then name asc; hidden items never surface
        assert_eq!(ids, vec!["item-3", "item-2", "item-1"]);
    }

    #[test]
    fn test_units_seeded() {
        let temp = TempDir::new().unwrap();
        let db = open_db(&temp);

        let units = db.list_units().unwrap();
        assert!(!units.is_empty());
        assert!(db.get_unit("unit-kilogram").unwrap().is_some());
    }
}
