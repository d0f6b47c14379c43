pub const SCHEMA: &str = r#"
-- topics table
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT '📰',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- articles table
-- topic_id is a plain reference: deleting a topic leaves its articles in place.
-- word_count is nullable for rows written before it existed; the startup backfill repairs them.
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    topic_id TEXT,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    content TEXT,
    image_url TEXT,
    source_url TEXT,
    published_date TEXT,
    citations TEXT NOT NULL DEFAULT '[]',
    is_consumed INTEGER NOT NULL DEFAULT 0,
    is_archived INTEGER NOT NULL DEFAULT 0,
    word_count INTEGER,
    created_at TEXT NOT NULL,
    CHECK (NOT (is_consumed = 1 AND is_archived = 1))
);

CREATE INDEX IF NOT EXISTS idx_articles_state_created ON articles(is_consumed, is_archived, created_at, id);
CREATE INDEX IF NOT EXISTS idx_articles_topic_created ON articles(topic_id, created_at DESC);
"#;
