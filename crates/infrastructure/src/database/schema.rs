//! 建表语句，启动时幂等执行
//!
//! SQLite 中价格以规范化的两位小数文本保存，PostgreSQL 使用 NUMERIC。

pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        first_name TEXT,
        last_name TEXT,
        photo_link TEXT,
        is_blocked BOOLEAN NOT NULL DEFAULT 0,
        block_expired DATETIME
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS specialities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users_specialities (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        speciality_id INTEGER NOT NULL REFERENCES specialities(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, speciality_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS specialities_tags (
        speciality_id INTEGER NOT NULL REFERENCES specialities(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (speciality_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        customer_id INTEGER NOT NULL REFERENCES users(id),
        lead_id INTEGER REFERENCES users(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams_users (
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        joined_at INTEGER NOT NULL,
        PRIMARY KEY (team_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        customer_id INTEGER NOT NULL REFERENCES users(id),
        execution_type TEXT NOT NULL CHECK (execution_type IN ('single', 'team')),
        performer_id INTEGER REFERENCES users(id),
        performer_team_id INTEGER REFERENCES teams(id) ON DELETE SET NULL,
        price TEXT NOT NULL DEFAULT '0.00',
        is_blocked BOOLEAN NOT NULL DEFAULT 0,
        blocked_until DATETIME,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_tags (
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (order_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        image_link TEXT NOT NULL,
        is_main BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL,
        order_id INTEGER NOT NULL,
        change_type TEXT NOT NULL,
        old_price TEXT,
        new_price TEXT NOT NULL,
        price_change_percent INTEGER,
        order_name TEXT NOT NULL,
        order_tags TEXT NOT NULL DEFAULT '[]',
        created_at DATETIME NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_id ON orders(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_performer_id ON orders(performer_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_blocked_until ON orders(blocked_until)",
    "CREATE INDEX IF NOT EXISTS idx_orders_tags_tag_id ON orders_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_teams_users_user_id ON teams_users(user_id)",
];

pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        first_name TEXT,
        last_name TEXT,
        photo_link TEXT,
        is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
        block_expired TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS specialities (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users_specialities (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        speciality_id BIGINT NOT NULL REFERENCES specialities(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, speciality_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS specialities_tags (
        speciality_id BIGINT NOT NULL REFERENCES specialities(id) ON DELETE CASCADE,
        tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (speciality_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        customer_id BIGINT NOT NULL REFERENCES users(id),
        lead_id BIGINT REFERENCES users(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams_users (
        team_id BIGINT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        joined_at BIGSERIAL,
        PRIMARY KEY (team_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        customer_id BIGINT NOT NULL REFERENCES users(id),
        execution_type TEXT NOT NULL CHECK (execution_type IN ('single', 'team')),
        performer_id BIGINT REFERENCES users(id),
        performer_team_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
        price NUMERIC(14, 2) NOT NULL DEFAULT 0,
        is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
        blocked_until TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_tags (
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (order_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_images (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        image_link TEXT NOT NULL,
        is_main BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders_logs (
        id BIGSERIAL PRIMARY KEY,
        customer_id BIGINT NOT NULL,
        order_id BIGINT NOT NULL,
        change_type TEXT NOT NULL,
        old_price NUMERIC(14, 2),
        new_price NUMERIC(14, 2) NOT NULL,
        price_change_percent INTEGER,
        order_name TEXT NOT NULL,
        order_tags JSONB NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_id ON orders(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_performer_id ON orders(performer_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_blocked_until ON orders(blocked_until)",
    "CREATE INDEX IF NOT EXISTS idx_orders_tags_tag_id ON orders_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_teams_users_user_id ON teams_users(user_id)",
];
