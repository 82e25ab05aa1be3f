use log::{error, info};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use nrk_subtitle_translator::config::{self, SettingsStore};
use nrk_subtitle_translator::diag::DiagnosticSink;
use nrk_subtitle_translator::dom::Page;
use nrk_subtitle_translator::lifecycle::Controller;

// ─── Logging ─────────────────────────────────────────────────────────

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

fn rotate_file(path: &std::path::Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() >= MAX_LOG_SIZE {
            let old = path.with_extension("old");
            let _ = std::fs::rename(path, old);
        }
    }
}

fn setup_logging() {
    let log_path = config::config_dir().join("subtitles.log");
    rotate_file(&log_path);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(file) = log_file {
        dispatch = dispatch.chain(file);
    } else {
        eprintln!("Warning: could not open log file {}", log_path.display());
    }

    dispatch.apply().expect("Failed to initialize logger");
}

// ─── Main ────────────────────────────────────────────────────────────

/// Interactive harness: a scripted page with one caption container, fed
/// from stdin. Each line becomes the current caption text, a blank line
/// clears it, EOF shuts down. Diagnostic events stream to stdout as
/// JSON lines.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_logging();
    info!("NRK subtitle translator starting");

    let store = Arc::new(SettingsStore::open(config::config_dir().join("settings.toml")));

    let page = Arc::new(Mutex::new(Page::new()));
    let container = {
        let mut p = page.lock().unwrap_or_else(PoisonError::into_inner);
        let root = p.root();
        let c = p.create_element("span", &["demo-subtitle"]);
        p.append_child(root, c);
        c
    };

    let (diag, mut diag_rx) = DiagnosticSink::channel();
    let diag = diag.log_to_file(&config::config_dir().join("diagnostics.jsonl"));
    tokio::spawn(async move {
        while let Some(event) = diag_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("failed to serialize diagnostic event: {}", e),
            }
        }
    });

    let controller = Controller::new(store, page.clone(), diag);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = tokio::spawn(controller.run(shutdown_rx));

    eprintln!("Type caption lines (blank line clears the caption, Ctrl-D exits):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut p = page.lock().unwrap_or_else(PoisonError::into_inner);
        p.set_text(container, line.trim());
    }

    info!("stdin closed, shutting down");
    let _ = shutdown_tx.send(true);
    let _ = controller_handle.await;
}
