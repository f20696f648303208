use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use webtrail::{
    cli::{self, Command},
    collector::Collector,
    locate, logging, report,
    store::HistoryStore,
};

fn main() -> Result<()> {
    logging::init_logging();

    let opts = cli::parse();
    let store = HistoryStore::new(&opts.db)?;

    match opts.command {
        Some(Command::View { limit, json }) => report::view(&store, limit, json),
        Some(Command::Report) => report::daily(&store),
        Some(Command::Top { days }) => report::top(&store, days),
        Some(Command::Search { term }) => report::search(&store, &term),
        Some(Command::Summary) => report::summary(&store),
        None => run_collection_loop(store, opts.interval_secs),
    }
}

fn run_collection_loop(store: HistoryStore, interval_secs: u64) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed))?;

    info!(
        "starting collection loop store={} interval={interval_secs}s",
        store.path().display()
    );

    let mut collector = Collector::new(store, locate::default_roots());
    collector.run_continuous(Duration::from_secs(interval_secs), &cancel);
    Ok(())
}
