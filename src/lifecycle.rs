use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

use crate::config::SettingsStore;
use crate::diag::DiagnosticSink;
use crate::dom::Page;
use crate::processor::SubtitleProcessor;
use crate::translate::EngineRegistry;

// ─── Controller ──────────────────────────────────────────────────────

/// Supervises observation sessions. Owns the settings subscription and
/// the engine registry; every settings change stops the running session
/// and starts a fresh one (dispose-then-fresh-start, never in-place
/// mutation), so no stale subscription survives a configuration change.
pub struct Controller {
    store: Arc<SettingsStore>,
    registry: EngineRegistry,
    page: Arc<Mutex<Page>>,
    diag: DiagnosticSink,
}

impl Controller {
    pub fn new(store: Arc<SettingsStore>, page: Arc<Mutex<Page>>, diag: DiagnosticSink) -> Self {
        Self {
            store,
            registry: EngineRegistry::new(),
            page,
            diag,
        }
    }

    /// Engine instances live here, cached across reinitializations.
    pub fn registry_mut(&mut self) -> &mut EngineRegistry {
        &mut self.registry
    }

    /// Run until `shutdown` turns true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut changes = self.store.subscribe();

        loop {
            if *shutdown.borrow() {
                break;
            }
            let settings = self.store.get_all();

            if !settings.enabled {
                info!("translation disabled, waiting for settings change");
                tokio::select! {
                    _ = changes.changed() => {}
                    _ = shutdown.wait_for(|v| *v) => break,
                }
                continue;
            }

            let engine = match self
                .registry
                .engine_for(settings.translation_engine, &settings.deepl_api_key)
            {
                Ok(engine) => engine,
                Err(e) => {
                    error!("cannot create translation engine: {}", e);
                    tokio::select! {
                        _ = changes.changed() => {}
                        _ = shutdown.wait_for(|v| *v) => break,
                    }
                    continue;
                }
            };

            // One-time backend setup (model download, key probe) is opaque
            // here; failure is not fatal, translate() surfaces it per
            // subtitle as diagnostic events.
            if let Err(e) = engine
                .prepare(&settings.source_language, &settings.target_language)
                .await
            {
                warn!("engine preparation failed: {}", e);
            }

            let session = SubtitleProcessor::new(
                self.page.clone(),
                engine,
                settings,
                self.diag.clone(),
            );
            let (stop_tx, stop_rx) = oneshot::channel();
            let mut handle = tokio::spawn(session.run(stop_rx));

            tokio::select! {
                _ = &mut handle => {
                    // Sessions only return on their own when disabled.
                    tokio::select! {
                        _ = changes.changed() => {}
                        _ = shutdown.wait_for(|v| *v) => break,
                    }
                }
                _ = changes.changed() => {
                    info!("settings changed, reinitializing");
                    let _ = stop_tx.send(());
                    let _ = handle.await;
                }
                // Wrapped so the branch yields `()`: the `watch::Ref` a bare
                // `wait_for` yields would keep `shutdown` borrowed while the
                // completed-handle arm waits on it again.
                _ = async { let _ = shutdown.wait_for(|v| *v).await; } => {
                    let _ = stop_tx.send(());
                    let _ = handle.await;
                    break;
                }
            }
        }

        self.registry.clear();
        info!("controller stopped");
    }
}
