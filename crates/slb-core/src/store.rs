//! Relational storage for lists, items, share edges and share codes.
//!
//! Query functions take a `&mut SqliteConnection` so callers decide the
//! transaction boundary; the engine runs every command in one transaction.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction,
};

use crate::{
    domain::{ListId, UserId},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct ShoppingList {
    pub id: ListId,
    pub user_id: UserId,
    pub number: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct ShoppingListItem {
    pub id: i64,
    pub shopping_list_id: ListId,
    pub number: i64,
    pub name: String,
}

/// Directed edge: `shopping_list_id` displays the items of `ref_shopping_list_id`.
#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct ShareInfo {
    pub id: i64,
    pub shopping_list_id: ListId,
    pub ref_shopping_list_id: ListId,
}

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct ShareCode {
    pub id: i64,
    pub code: String,
    pub shopping_list_id: ListId,
    /// Unix seconds, UTC.
    pub expires_at: i64,
}

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS shopping_lists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        number INTEGER NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, number)
    )",
    "CREATE TABLE IF NOT EXISTS shopping_list_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        shopping_list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
        number INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE (shopping_list_id, number)
    )",
    "CREATE TABLE IF NOT EXISTS shopping_list_share_infos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        shopping_list_id INTEGER NOT NULL UNIQUE REFERENCES shopping_lists(id) ON DELETE CASCADE,
        ref_shopping_list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_share_infos_ref
        ON shopping_list_share_infos(ref_shopping_list_id)",
    "CREATE TABLE IF NOT EXISTS shopping_list_share_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL,
        shopping_list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
        expires_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_share_codes_code ON shopping_list_share_codes(code)",
];

/// Connection pool plus schema setup.
#[derive(Clone, Debug)]
pub struct ListStore {
    pool: SqlitePool,
}

impl ListStore {
    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single never-recycled connection keeps
    /// the data alive for the lifetime of the store.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    async fn migrate(&self) -> Result<()> {
        for stmt in MIGRATIONS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

// ============== Lists ==============

const LIST_COLUMNS: &str = "id, user_id, number, name, is_active";

pub async fn get_list(conn: &mut SqliteConnection, id: ListId) -> Result<Option<ShoppingList>> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM shopping_lists WHERE id = ?");
    Ok(sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn lists_for_user(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Vec<ShoppingList>> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM shopping_lists WHERE user_id = ? ORDER BY number");
    Ok(sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(user)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn active_list(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<ShoppingList>> {
    let sql = format!(
        "SELECT {LIST_COLUMNS} FROM shopping_lists WHERE user_id = ? AND is_active = 1 \
         ORDER BY id LIMIT 1"
    );
    Ok(sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(user)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn list_by_number(
    conn: &mut SqliteConnection,
    user: &UserId,
    number: i64,
) -> Result<Option<ShoppingList>> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM shopping_lists WHERE user_id = ? AND number = ?");
    Ok(sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(user)
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn insert_list(
    conn: &mut SqliteConnection,
    user: &UserId,
    number: i64,
    is_active: bool,
) -> Result<ShoppingList> {
    let sql = format!(
        "INSERT INTO shopping_lists (user_id, number, name, is_active) VALUES (?, ?, '', ?) \
         RETURNING {LIST_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(user)
        .bind(number)
        .bind(is_active)
        .fetch_one(&mut *conn)
        .await?)
}

/// The user's active list, creating an active unnamed slot 1 if there is none.
///
/// If slot 1 already exists (inactive) it is activated instead of duplicated.
pub async fn active_list_or_create(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<ShoppingList> {
    if let Some(list) = active_list(conn, user).await? {
        return Ok(list);
    }
    if let Some(mut list) = list_by_number(conn, user, 1).await? {
        set_active(conn, list.id, true).await?;
        list.is_active = true;
        return Ok(list);
    }
    insert_list(conn, user, 1, true).await
}

/// The given slot, created inactive if it does not exist yet.
pub async fn list_by_number_or_create(
    conn: &mut SqliteConnection,
    user: &UserId,
    number: i64,
) -> Result<ShoppingList> {
    if let Some(list) = list_by_number(conn, user, number).await? {
        return Ok(list);
    }
    insert_list(conn, user, number, false).await
}

pub async fn set_active(conn: &mut SqliteConnection, id: ListId, active: bool) -> Result<()> {
    sqlx::query("UPDATE shopping_lists SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_name(conn: &mut SqliteConnection, id: ListId, name: &str) -> Result<()> {
    sqlx::query("UPDATE shopping_lists SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Clear the active flag on every list of `user`.
pub async fn deactivate_all(conn: &mut SqliteConnection, user: &UserId) -> Result<()> {
    sqlx::query("UPDATE shopping_lists SET is_active = 0 WHERE user_id = ? AND is_active = 1")
        .bind(user)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============== Items ==============

pub async fn items(conn: &mut SqliteConnection, list: ListId) -> Result<Vec<ShoppingListItem>> {
    Ok(sqlx::query_as::<_, ShoppingListItem>(
        "SELECT id, shopping_list_id, number, name FROM shopping_list_items \
         WHERE shopping_list_id = ? ORDER BY number",
    )
    .bind(list)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn item_by_number(
    conn: &mut SqliteConnection,
    list: ListId,
    number: i64,
) -> Result<Option<ShoppingListItem>> {
    Ok(sqlx::query_as::<_, ShoppingListItem>(
        "SELECT id, shopping_list_id, number, name FROM shopping_list_items \
         WHERE shopping_list_id = ? AND number = ?",
    )
    .bind(list)
    .bind(number)
    .fetch_optional(&mut *conn)
    .await?)
}

/// `max(number) + 1`, or 1 for an empty list.
pub async fn next_item_number(conn: &mut SqliteConnection, list: ListId) -> Result<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(number) FROM shopping_list_items WHERE shopping_list_id = ?")
            .bind(list)
            .fetch_one(&mut *conn)
            .await?;
    Ok(max.map_or(1, |n| n + 1))
}

pub async fn insert_item(
    conn: &mut SqliteConnection,
    list: ListId,
    name: &str,
) -> Result<ShoppingListItem> {
    let number = next_item_number(conn, list).await?;
    Ok(sqlx::query_as::<_, ShoppingListItem>(
        "INSERT INTO shopping_list_items (shopping_list_id, number, name) VALUES (?, ?, ?) \
         RETURNING id, shopping_list_id, number, name",
    )
    .bind(list)
    .bind(number)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete_item(conn: &mut SqliteConnection, item_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM shopping_list_items WHERE id = ?")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn clear_items(conn: &mut SqliteConnection, list: ListId) -> Result<u64> {
    let res = sqlx::query("DELETE FROM shopping_list_items WHERE shopping_list_id = ?")
        .bind(list)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

/// Compact item numbers to `1..=k`, keeping relative order.
///
/// Walking in ascending order only ever moves an item down into a number that
/// is already free, so the `(list, number)` uniqueness holds at every step.
pub async fn renumber_items(conn: &mut SqliteConnection, list: ListId) -> Result<()> {
    let rows = items(conn, list).await?;
    for (idx, item) in rows.iter().enumerate() {
        let number = idx as i64 + 1;
        if item.number == number {
            continue;
        }
        sqlx::query("UPDATE shopping_list_items SET number = ? WHERE id = ?")
            .bind(number)
            .bind(item.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

// ============== Share edges ==============

/// The edge this list mirrors through, if any.
pub async fn outgoing_share(
    conn: &mut SqliteConnection,
    list: ListId,
) -> Result<Option<ShareInfo>> {
    Ok(sqlx::query_as::<_, ShareInfo>(
        "SELECT id, shopping_list_id, ref_shopping_list_id FROM shopping_list_share_infos \
         WHERE shopping_list_id = ?",
    )
    .bind(list)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Edges of lists that mirror this one.
pub async fn incoming_shares(conn: &mut SqliteConnection, list: ListId) -> Result<Vec<ShareInfo>> {
    Ok(sqlx::query_as::<_, ShareInfo>(
        "SELECT id, shopping_list_id, ref_shopping_list_id FROM shopping_list_share_infos \
         WHERE ref_shopping_list_id = ? ORDER BY id",
    )
    .bind(list)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn insert_share(
    conn: &mut SqliteConnection,
    subject: ListId,
    referenced: ListId,
) -> Result<ShareInfo> {
    Ok(sqlx::query_as::<_, ShareInfo>(
        "INSERT INTO shopping_list_share_infos (shopping_list_id, ref_shopping_list_id) \
         VALUES (?, ?) RETURNING id, shopping_list_id, ref_shopping_list_id",
    )
    .bind(subject)
    .bind(referenced)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn delete_share(conn: &mut SqliteConnection, share_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM shopping_list_share_infos WHERE id = ?")
        .bind(share_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============== Share codes ==============

pub async fn insert_share_code(
    conn: &mut SqliteConnection,
    code: &str,
    list: ListId,
    expires_at: i64,
) -> Result<ShareCode> {
    Ok(sqlx::query_as::<_, ShareCode>(
        "INSERT INTO shopping_list_share_codes (code, shopping_list_id, expires_at) \
         VALUES (?, ?, ?) RETURNING id, code, shopping_list_id, expires_at",
    )
    .bind(code)
    .bind(list)
    .bind(expires_at)
    .fetch_one(&mut *conn)
    .await?)
}

/// Delete every code whose expiry is before `now` (unix seconds).
pub async fn purge_expired_codes(conn: &mut SqliteConnection, now: i64) -> Result<u64> {
    let res = sqlx::query("DELETE FROM shopping_list_share_codes WHERE expires_at < ?")
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn find_share_code(conn: &mut SqliteConnection, code: &str) -> Result<Option<ShareCode>> {
    Ok(sqlx::query_as::<_, ShareCode>(
        "SELECT id, code, shopping_list_id, expires_at FROM shopping_list_share_codes \
         WHERE code = ? ORDER BY id LIMIT 1",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?)
}

/// Whether an unexpired row already carries `code`.
pub async fn share_code_in_use(conn: &mut SqliteConnection, code: &str, now: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shopping_list_share_codes WHERE code = ? AND expires_at >= ?",
    )
    .bind(code)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

pub async fn delete_share_code(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM shopping_list_share_codes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
