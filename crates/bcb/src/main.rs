use std::sync::Arc;

use bcb_core::{config::Config, metadata::BookSearch, store::MemStore};
use bcb_metadata::HttpBookSearch;

#[tokio::main]
async fn main() -> Result<(), bcb_core::Error> {
    bcb_core::logging::init("bcb")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(MemStore::new());

    let search: Option<Arc<dyn BookSearch>> = match &cfg.metadata_base_url {
        Some(url) => Some(Arc::new(HttpBookSearch::new(
            url.clone(),
            cfg.metadata_timeout,
        )?)),
        None => {
            tracing::info!("METADATA_BASE_URL not set, book search disabled");
            None
        }
    };

    bcb_telegram::router::run_polling(cfg, store, search)
        .await
        .map_err(|e| bcb_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
