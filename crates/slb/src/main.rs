use std::sync::Arc;

use slb_core::{
    bot::ShoppingListBot, config::Config, engine::ShoppingListEngine, store::ListStore,
};
use slb_line::LineMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    slb_core::logging::init("slb")?;

    let cfg = Arc::new(Config::load()?);

    let store = ListStore::open(&cfg.database_url, cfg.database_max_connections).await?;
    tracing::info!(database = %cfg.database_url, "store ready");

    let engine = ShoppingListEngine::new(store, cfg.share_code_ttl);
    let messenger = Arc::new(LineMessenger::from_config(&cfg));
    let bot = Arc::new(ShoppingListBot::new(engine, messenger));

    slb_line::router::serve(cfg, bot).await
}
