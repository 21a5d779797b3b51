use clap::Parser;
use log::{info, warn};
use std::process;
use std::sync::Arc;
use tokio::join;
use tokio::sync::mpsc;

mod api;
mod blocklist;
mod channel;
mod cli;
mod config;
mod ledger;
mod logger;
mod metrics;
mod proxy;
mod runtime;
mod storage;
mod tap;

use blocklist::{BlocklistEngine, HttpFetch};
use channel::NativeChannel;
use config::Setting;
use ledger::Ledger;
use proxy::{CommandSwitch, ProxyController, ProxyStatus};
use runtime::RuntimeContext;
use storage::{FileStore, Storage, KEY_TOR_STATUS};

fn main() {
    let cli = cli::Cli::parse();

    // init logger
    logger::init(&cli);

    if !cli.test {
        info!("torwarden version: v{}", env!("CARGO_PKG_VERSION"));
    }

    let setting = match config::load(&cli) {
        Ok(s) => s,
        Err(e) => {
            log::error!("load config file failed, {:?}", e);
            process::exit(1);
        }
    };

    if cli.test {
        info!("config files passed");
        process::exit(0);
    }

    let cpu = num_cpus::get();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("torwarden")
        .worker_threads(cpu)
        .max_blocking_threads(cpu * 10)
        .thread_stack_size(1024 * 256)
        .build()
        .unwrap();

    rt.block_on(run(setting));
}

async fn run(setting: Setting) {
    let setting = Arc::new(setting);
    let store: Arc<dyn Storage> = Arc::new(FileStore::new(&setting.storage_path));

    if let Err(e) = store
        .set(KEY_TOR_STATUS, ProxyStatus::Initializing.as_str().to_string())
        .await
    {
        warn!("persist initial status failed: {:?}", e);
    }

    let controller = Arc::new(ProxyController::new(
        Box::new(CommandSwitch::new(&setting.proxy)),
        store.clone(),
    ));
    let channel = Arc::new(NativeChannel::new(&setting.host, controller));
    let blocklist = BlocklistEngine::new(
        Box::new(HttpFetch::new(&setting.blocklist_url)),
        store.clone(),
        setting.min_rules,
    );

    let (tap_tx, tap_rx) = mpsc::channel(1024);

    let runtime = Arc::new(RuntimeContext {
        setting,
        store,
        blocklist,
        ledger: Ledger::default(),
        channel: channel.clone(),
        tap_tx,
    });

    match runtime.blocklist.load_or_refresh().await {
        Ok(size) => info!("blocklist ready, {} rules", size),
        Err(e) => warn!("blocklist unavailable, serving seed set: {:?}", e),
    }

    // reach out to the host early so its state is mirrored from the start;
    // a missing host is already surfaced as Host Disconnected
    if channel.ensure_connected().await.is_ok() {
        if let Err(e) = channel.send(channel::Command::GetStatus).await {
            warn!("initial status query failed: {:?}", e);
        }
    }

    join!(
        api::serve(runtime.clone()),
        tap::serve(runtime.clone(), tap_rx),
        blocklist::auto_refresh(runtime.clone()),
    );
}
