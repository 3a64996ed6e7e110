pub const SCHEMA: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    email_norm TEXT NOT NULL UNIQUE,   -- trimmed + lowercased
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    scopes TEXT NOT NULL DEFAULT '',   -- space-separated, e.g. 'admin'
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Session tokens are auth credentials; every token belongs to a user
CREATE TABLE IF NOT EXISTS session_tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- short prefix for fast lookup
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

-- Households group users sharing stores and recipes
CREATE TABLE IF NOT EXISTS households (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_by TEXT NOT NULL REFERENCES users(id),
    updated_by TEXT NOT NULL REFERENCES users(id),
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS household_members (
    household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL,                -- owner | editor | viewer
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (household_id, user_id)
);

-- Pending household invitations; consumed rows are deleted, not flagged
CREATE TABLE IF NOT EXISTS household_invitations (
    id TEXT PRIMARY KEY,
    household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
    invited_email TEXT NOT NULL,
    email_norm TEXT NOT NULL,
    invited_by TEXT NOT NULL REFERENCES users(id),
    role TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(household_id, email_norm)
);

-- Stores; household_id is NULL for private stores
CREATE TABLE IF NOT EXISTS stores (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    household_id TEXT REFERENCES households(id) ON DELETE SET NULL,
    is_hidden INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL REFERENCES users(id),
    updated_by TEXT NOT NULL REFERENCES users(id),
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS store_collaborators (
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL,                -- owner | editor (no viewer tier)
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (store_id, user_id)
);

CREATE TABLE IF NOT EXISTS store_invitations (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    invited_email TEXT NOT NULL,
    email_norm TEXT NOT NULL,
    invited_by TEXT NOT NULL REFERENCES users(id),
    role TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(store_id, email_norm)
);

-- Physical layout of a store
CREATE TABLE IF NOT EXISTS store_aisles (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS store_sections (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    aisle_id TEXT NOT NULL REFERENCES store_aisles(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Item catalog; name_norm carries the uniqueness guarantee
CREATE TABLE IF NOT EXISTS store_items (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    name_norm TEXT NOT NULL,
    aisle_id TEXT REFERENCES store_aisles(id) ON DELETE SET NULL,
    section_id TEXT REFERENCES store_sections(id) ON DELETE SET NULL,
    usage_count INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    is_hidden INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(store_id, name_norm)
);

CREATE TABLE IF NOT EXISTS quantity_units (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    abbreviation TEXT NOT NULL
);

-- Shopping-list entries; either catalog-linked or a free-text idea
CREATE TABLE IF NOT EXISTS shopping_list_items (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    store_item_id TEXT REFERENCES store_items(id) ON DELETE CASCADE,  -- NULL only for ideas
    idea_name TEXT,                    -- set only for ideas
    qty REAL,
    unit_id TEXT REFERENCES quantity_units(id),
    notes TEXT,
    is_idea INTEGER NOT NULL DEFAULT 0,
    is_checked INTEGER NOT NULL DEFAULT 0,
    checked_at TEXT,
    checked_by TEXT REFERENCES users(id),
    is_unsure INTEGER NOT NULL DEFAULT 0,
    is_sample INTEGER NOT NULL DEFAULT 0,
    snoozed_until TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- At most one unchecked entry per catalog item per store; the race guard
-- for the list upsert
CREATE UNIQUE INDEX IF NOT EXISTS idx_list_active_catalog
    ON shopping_list_items(store_id, store_item_id)
    WHERE is_checked = 0 AND store_item_id IS NOT NULL;

-- Recipes
CREATE TABLE IF NOT EXISTS recipes (
    id TEXT PRIMARY KEY,
    household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    created_by TEXT NOT NULL REFERENCES users(id),
    updated_by TEXT NOT NULL REFERENCES users(id),
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS recipe_ingredients (
    id TEXT PRIMARY KEY,
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    qty REAL,
    unit_id TEXT REFERENCES quantity_units(id),
    sort_order INTEGER NOT NULL
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_session_tokens_lookup ON session_tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_session_tokens_user ON session_tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_household_members_user ON household_members(user_id);
CREATE INDEX IF NOT EXISTS idx_household_invitations_email ON household_invitations(email_norm);
CREATE INDEX IF NOT EXISTS idx_stores_household ON stores(household_id);
CREATE INDEX IF NOT EXISTS idx_store_collaborators_user ON store_collaborators(user_id);
CREATE INDEX IF NOT EXISTS idx_store_invitations_email ON store_invitations(email_norm);
CREATE INDEX IF NOT EXISTS idx_store_aisles_store ON store_aisles(store_id);
CREATE INDEX IF NOT EXISTS idx_store_sections_aisle ON store_sections(aisle_id);
CREATE INDEX IF NOT EXISTS idx_store_items_store ON store_items(store_id);
CREATE INDEX IF NOT EXISTS idx_list_items_store ON shopping_list_items(store_id);
CREATE INDEX IF NOT EXISTS idx_recipes_household ON recipes(household_id);
CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);

-- Seed the unit catalog
INSERT OR IGNORE INTO quantity_units (id, name, abbreviation) VALUES
    ('unit-piece', 'piece', 'pc'),
    ('unit-gram', 'gram', 'g'),
    ('unit-kilogram', 'kilogram', 'kg'),
    ('unit-milliliter', 'milliliter', 'ml'),
    ('unit-liter', 'liter', 'l'),
    ('unit-pack', 'pack', 'pk'),
    ('unit-bunch', 'bunch', 'bn'),
    ('unit-can', 'can', 'cn'),
    ('unit-bottle', 'bottle', 'bt'),
    ('unit-loaf', 'loaf', 'lf');
"#;
