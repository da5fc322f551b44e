pub const SCHEMA: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    avatar_url TEXT,
    avatar_public_id TEXT,

    -- Follow graph: two independently stored, ordered id sets (JSON arrays)
    followers TEXT NOT NULL DEFAULT '[]',
    followings TEXT NOT NULL DEFAULT '[]',

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Active sign-ins; the raw token is never stored
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_lookup TEXT NOT NULL,        -- first 8 chars of a UUID for fast lookup
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    created_at TEXT DEFAULT (datetime('now')),
    last_used_at TEXT
);

-- Email verification and password reset tokens, one per (owner, kind).
-- Rows older than one hour are treated as absent.
CREATE TABLE IF NOT EXISTS one_time_tokens (
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    token_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, kind)
);

-- Audio tracks. owner_id is not a foreign key: dangling owners are dropped at read time.
CREATE TABLE IF NOT EXISTS audios (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    about TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'Others',
    file_url TEXT NOT NULL,
    file_public_id TEXT NOT NULL,
    poster_url TEXT,
    poster_public_id TEXT,
    likes TEXT NOT NULL DEFAULT '[]',
    duration_seconds REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- User playlists, including the system-managed 'auto' ones
CREATE TABLE IF NOT EXISTS playlists (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    visibility TEXT NOT NULL DEFAULT 'public',
    items TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- System-curated playlists, title is a category tag
CREATE TABLE IF NOT EXISTS auto_playlists (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    items TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One favorites document per user, created lazily
CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL UNIQUE,
    items TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- One listening history document per user; entries are most-recent-first
CREATE TABLE IF NOT EXISTS histories (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL UNIQUE,
    last_entry TEXT NOT NULL,
    entries TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_audios_owner ON audios(owner_id);
CREATE INDEX IF NOT EXISTS idx_audios_created ON audios(created_at);
CREATE INDEX IF NOT EXISTS idx_playlists_owner ON playlists(owner_id);
"#;
