pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS version_clock (
    id    INTEGER PRIMARY KEY CHECK (id = 1),
    value INTEGER NOT NULL
);

INSERT OR IGNORE INTO version_clock (id, value) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    auth_provider TEXT NOT NULL DEFAULT 'token',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id                       TEXT PRIMARY KEY,
    user_id                  TEXT NOT NULL UNIQUE REFERENCES users(id),
    theme                    TEXT NOT NULL DEFAULT 'LIGHT' CHECK (theme IN ('LIGHT', 'DARK')),
    notification_preferences TEXT NOT NULL DEFAULT '{"emails":true,"push":true}',
    sync_options             TEXT NOT NULL DEFAULT '{"autoSync":true,"syncInterval":300}',
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id          TEXT PRIMARY KEY,
    user_id     TEXT REFERENCES users(id),
    name        TEXT NOT NULL,
    description TEXT,
    order_index INTEGER NOT NULL,
    UNIQUE(user_id, name)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_shared_name ON categories(name) WHERE user_id IS NULL;

CREATE TABLE IF NOT EXISTS transactions (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users(id),
    type            TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
    amount          TEXT NOT NULL,
    category_id     TEXT NOT NULL REFERENCES categories(id),
    sub_category_id TEXT,
    date            TEXT NOT NULL,
    notes           TEXT,
    attachment_url  TEXT,
    source          TEXT NOT NULL CHECK (source IN ('MANUAL', 'SMS_IMPORT')),
    sms_id          TEXT,
    version         INTEGER NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(user_id, date);
CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);
CREATE INDEX IF NOT EXISTS idx_transactions_version ON transactions(user_id, version);

CREATE TABLE IF NOT EXISTS budgets (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(id),
    category_id   TEXT NOT NULL REFERENCES categories(id),
    monthly_limit TEXT NOT NULL,
    start_date    TEXT NOT NULL,
    end_date      TEXT,
    version       INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id);
CREATE INDEX IF NOT EXISTS idx_budgets_version ON budgets(user_id, version);

CREATE TABLE IF NOT EXISTS sync_attempts (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(id),
    scope        TEXT NOT NULL,
    sequence     INTEGER NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('PENDING', 'SYNCED', 'CONFLICT')),
    last_attempt TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_attempts_user ON sync_attempts(user_id, last_attempt);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];

/// Shared categories visible to every user, in display order.
pub(crate) const DEFAULT_CATEGORIES: &[&str] = &[
    "Salary",
    "Freelance",
    "Interest",
    "Groceries",
    "Food & Dining",
    "Rent/Mortgage",
    "Utilities",
    "Transportation",
    "Health & Fitness",
    "Entertainment",
    "Shopping",
    "Travel",
    "Education",
    "Gifts & Donations",
    "Fees & Charges",
    "Uncategorized",
];
