//! The shopping list state machine.
//!
//! Each inbound message becomes one [`Command`], executed inside a single
//! store transaction. The result is an [`Outbox`]: replies to the sender plus
//! pushes to other users whose view of a shared list changed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::{
    command::Command,
    domain::{ListId, UserId},
    messages,
    messaging::types::Outbox,
    passcode,
    store::{self, ListStore, ShoppingList},
    Result,
};

/// Default validity of an issued share code.
pub const DEFAULT_SHARE_CODE_TTL: Duration = Duration::from_secs(30 * 60);

/// Attempts at drawing a share code that no unexpired row uses yet.
const SHARE_CODE_ATTEMPTS: usize = 5;

pub struct ShoppingListEngine {
    store: ListStore,
    share_code_ttl: Duration,
}

impl ShoppingListEngine {
    pub fn new(store: ListStore, share_code_ttl: Duration) -> Self {
        Self {
            store,
            share_code_ttl,
        }
    }

    pub fn store(&self) -> &ListStore {
        &self.store
    }

    pub async fn process(&self, user: &UserId, text: &str) -> Result<Outbox> {
        self.process_at(user, text, Utc::now()).await
    }

    pub async fn process_at(
        &self,
        user: &UserId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let command = Command::parse(text);
        debug!(user = %user, ?command, "parsed command");
        self.execute_at(user, command, now).await
    }

    /// Run one command atomically. On error the transaction rolls back and
    /// nothing is sent.
    pub async fn execute_at(
        &self,
        user: &UserId,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Outbox> {
        let mut tx = self.store.begin().await?;
        let mut out = Outbox::default();
        let conn: &mut SqliteConnection = &mut tx;

        match command {
            Command::ShowList => show_list(conn, user, &mut out).await?,
            Command::Help => out.reply(messages::HELP),
            Command::Clear => clear(conn, user, &mut out).await?,
            Command::Share => {
                let ttl = i64::try_from(self.share_code_ttl.as_secs()).unwrap_or(i64::MAX);
                let expires_at = now.timestamp().saturating_add(ttl);
                share(conn, user, now.timestamp(), expires_at, &mut out).await?
            }
            Command::Unshare => unshare(conn, user, &mut out).await?,
            Command::SelectList { number, name } => {
                select_list(conn, user, i64::from(number), name.as_deref(), &mut out).await?
            }
            Command::DeleteItems(numbers) => delete_items(conn, user, &numbers, &mut out).await?,
            Command::RedeemShareCode(code) => {
                redeem_share_code(conn, user, &code, now.timestamp(), &mut out).await?
            }
            Command::AddItem(text) => add_item(conn, user, &text, &mut out).await?,
        }

        tx.commit().await?;
        Ok(out)
    }
}

/// The list whose items `list` shows: its share target, or itself.
async fn effective_list(conn: &mut SqliteConnection, list: &ShoppingList) -> Result<ListId> {
    Ok(store::outgoing_share(conn, list.id)
        .await?
        .map_or(list.id, |edge| edge.ref_shopping_list_id))
}

async fn show_list(conn: &mut SqliteConnection, user: &UserId, out: &mut Outbox) -> Result<()> {
    let Some(active) = store::active_list(conn, user).await? else {
        out.reply(messages::LIST_EMPTY);
        return Ok(());
    };
    let target = effective_list(conn, &active).await?;
    let items = store::items(conn, target).await?;
    out.reply(messages::format_items(&items));
    Ok(())
}

async fn clear(conn: &mut SqliteConnection, user: &UserId, out: &mut Outbox) -> Result<()> {
    let Some(active) = store::active_list(conn, user).await? else {
        out.reply(messages::LIST_CLEARED);
        return Ok(());
    };
    if store::outgoing_share(conn, active.id).await?.is_some() {
        out.reply(messages::CANNOT_CLEAR_SHARED);
        return Ok(());
    }

    let removed = store::clear_items(conn, active.id).await?;
    debug!(list = %active.id, removed, "cleared list");
    out.reply(messages::LIST_CLEARED);
    notify_update(conn, &active, out).await
}

async fn share(
    conn: &mut SqliteConnection,
    user: &UserId,
    now: i64,
    expires_at: i64,
    out: &mut Outbox,
) -> Result<()> {
    let active = store::active_list_or_create(conn, user).await?;
    if store::outgoing_share(conn, active.id).await?.is_some() {
        out.reply(messages::CANNOT_SHARE_SHARED);
        return Ok(());
    }

    let mut code = passcode::generate();
    for _ in 1..SHARE_CODE_ATTEMPTS {
        if !store::share_code_in_use(conn, &code, now).await? {
            break;
        }
        code = passcode::generate();
    }

    store::insert_share_code(conn, &code, active.id, expires_at).await?;
    info!(user = %user, list = %active.id, "issued share code");
    out.reply(messages::share_code_issued(&code));
    Ok(())
}

async fn unshare(conn: &mut SqliteConnection, user: &UserId, out: &mut Outbox) -> Result<()> {
    let Some(active) = store::active_list(conn, user).await? else {
        out.reply(messages::NOT_SHARED);
        return Ok(());
    };

    if let Some(edge) = store::outgoing_share(conn, active.id).await? {
        if let Some(published) = store::get_list(conn, edge.ref_shopping_list_id).await? {
            out.push(
                &published.user_id,
                messages::published_list_unshared(published.number),
            );
        }
        store::delete_share(conn, edge.id).await?;
        info!(user = %user, list = %active.id, "stopped mirroring shared list");
        out.reply(messages::UNSHARED);
        return Ok(());
    }

    let incoming = store::incoming_shares(conn, active.id).await?;
    if incoming.is_empty() {
        out.reply(messages::NOT_SHARED);
        return Ok(());
    }

    for edge in &incoming {
        if let Some(mirror) = store::get_list(conn, edge.shopping_list_id).await? {
            out.push(
                &mirror.user_id,
                messages::referencing_list_unshared(mirror.number),
            );
        }
        store::delete_share(conn, edge.id).await?;
    }
    info!(user = %user, list = %active.id, mirrors = incoming.len(), "withdrew shared list");
    out.reply(messages::UNSHARED);
    Ok(())
}

async fn select_list(
    conn: &mut SqliteConnection,
    user: &UserId,
    number: i64,
    name: Option<&str>,
    out: &mut Outbox,
) -> Result<()> {
    store::deactivate_all(conn, user).await?;

    let mut list = store::list_by_number_or_create(conn, user, number).await?;
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        store::set_name(conn, list.id, name).await?;
        list.name = name.to_string();
    }
    store::set_active(conn, list.id, true).await?;

    out.reply(messages::list_switched(list.number, &list.name));
    show_list(conn, user, out).await
}

async fn delete_items(
    conn: &mut SqliteConnection,
    user: &UserId,
    numbers: &[i64],
    out: &mut Outbox,
) -> Result<()> {
    let Some(active) = store::active_list(conn, user).await? else {
        debug!(user = %user, "delete without an active list; ignoring");
        return Ok(());
    };
    let target = effective_list(conn, &active).await?;

    let mut lines = Vec::with_capacity(numbers.len());
    for &number in numbers {
        match store::item_by_number(conn, target, number).await? {
            Some(item) => {
                lines.push(messages::item_deleted(&item.name));
                store::delete_item(conn, item.id).await?;
            }
            None => lines.push(messages::item_not_found(number)),
        }
    }
    out.reply(lines.join("\n"));

    store::renumber_items(conn, target).await?;
    show_list(conn, user, out).await?;
    notify_update(conn, &active, out).await
}

async fn redeem_share_code(
    conn: &mut SqliteConnection,
    user: &UserId,
    code: &str,
    now: i64,
    out: &mut Outbox,
) -> Result<()> {
    let active = store::active_list_or_create(conn, user).await?;
    if store::outgoing_share(conn, active.id).await?.is_some() {
        out.reply(messages::REDEEM_WHILE_VIEWING);
        return Ok(());
    }
    if !store::incoming_shares(conn, active.id).await?.is_empty() {
        out.reply(messages::REDEEM_WHILE_PUBLISHED);
        return Ok(());
    }

    let purged = store::purge_expired_codes(conn, now).await?;
    if purged > 0 {
        debug!(purged, "purged expired share codes");
    }

    let Some(share_code) = store::find_share_code(conn, code).await? else {
        out.reply(messages::INVALID_CODE);
        return Ok(());
    };
    if share_code.shopping_list_id == active.id {
        out.reply(messages::INVALID_CODE);
        return Ok(());
    }
    if store::outgoing_share(conn, share_code.shopping_list_id)
        .await?
        .is_some()
    {
        out.reply(messages::CANNOT_SHARE_SHARED);
        return Ok(());
    }

    store::insert_share(conn, active.id, share_code.shopping_list_id).await?;
    store::delete_share_code(conn, share_code.id).await?;
    info!(
        user = %user,
        list = %active.id,
        referenced = %share_code.shopping_list_id,
        "share code redeemed"
    );

    out.reply(messages::SHARE_CONFIGURED);
    show_list(conn, user, out).await
}

async fn add_item(
    conn: &mut SqliteConnection,
    user: &UserId,
    text: &str,
    out: &mut Outbox,
) -> Result<()> {
    let active = store::active_list_or_create(conn, user).await?;
    let target = effective_list(conn, &active).await?;
    let item = store::insert_item(conn, target, text).await?;
    debug!(list = %target, number = item.number, "added item");

    out.reply(messages::item_added(text));
    notify_update(conn, &active, out).await
}

/// Tell the other side of a share that `list` changed.
///
/// Recipients whose list is not currently active are skipped; nothing is
/// queued for later.
async fn notify_update(
    conn: &mut SqliteConnection,
    list: &ShoppingList,
    out: &mut Outbox,
) -> Result<()> {
    if let Some(edge) = store::outgoing_share(conn, list.id).await? {
        let Some(published) = store::get_list(conn, edge.ref_shopping_list_id).await? else {
            return Ok(());
        };
        if published.is_active {
            let items = store::items(conn, published.id).await?;
            out.push(&published.user_id, messages::list_updated(&items));
        }
        return Ok(());
    }

    let incoming = store::incoming_shares(conn, list.id).await?;
    if incoming.is_empty() {
        return Ok(());
    }

    let text = messages::list_updated(&store::items(conn, list.id).await?);
    for edge in incoming {
        let Some(mirror) = store::get_list(conn, edge.shopping_list_id).await? else {
            continue;
        };
        if mirror.is_active {
            out.push(&mirror.user_id, text.clone());
        }
    }
    Ok(())
}
