//! Refresh coordinator rebuilding the menu from configuration.

use std::sync::Arc;

use domain::{COFFEES_PROPERTY, Coffee, Menu, parse_coffees};
use store::CoffeeStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::source::PropertySource;
use crate::state::MenuState;
use crate::{MenuError, Result};

/// Events that cause the menu to be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// Startup finished; fires once.
    ApplicationReady,
    /// External configuration changed.
    ConfigRefreshed,
}

impl RefreshEvent {
    /// Stable snake_case name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshEvent::ApplicationReady => "application_ready",
            RefreshEvent::ConfigRefreshed => "config_refreshed",
        }
    }
}

impl std::fmt::Display for RefreshEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sending side of the refresh channel.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<RefreshEvent>,
}

impl RefreshHandle {
    /// Creates a handle and the receiver to pass to [`RefreshCoordinator::spawn`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RefreshEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queues `event` for the coordinator.
    pub async fn trigger(&self, event: RefreshEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| MenuError::CoordinatorStopped)
    }

    /// Whether the coordinator has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Rebuilds and publishes the menu whenever a [`RefreshEvent`] arrives.
///
/// Refreshes run one at a time. When a coffee store is attached, every
/// installed menu is also written to it in the background: all rows are
/// deleted, then the new coffees inserted. A later refresh waits for the
/// previous write to finish before starting its own.
pub struct RefreshCoordinator {
    menu: Arc<MenuState>,
    properties: Arc<dyn PropertySource>,
    coffee_store: Option<Arc<dyn CoffeeStore>>,
    persistence: Option<JoinHandle<()>>,
}

impl RefreshCoordinator {
    /// Creates a coordinator publishing into `menu`.
    pub fn new(menu: Arc<MenuState>, properties: Arc<dyn PropertySource>) -> Self {
        Self {
            menu,
            properties,
            coffee_store: None,
            persistence: None,
        }
    }

    /// Mirrors every installed menu into `store`.
    pub fn with_coffee_store(mut self, store: Arc<dyn CoffeeStore>) -> Self {
        self.coffee_store = Some(store);
        self
    }

    /// Rebuilds the menu from the current `cart.coffees` value and installs it.
    ///
    /// On failure the previously published menu stays in place.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self, event: RefreshEvent) -> Result<Arc<Menu>> {
        let menu = match self.load_menu() {
            Ok(menu) => menu,
            Err(err) => {
                let outcome = if err.is_config_missing() {
                    tracing::warn!(error = %err, "menu not refreshed, keeping current menu");
                    "missing"
                } else {
                    tracing::error!(error = %err, "menu refresh failed, keeping current menu");
                    "error"
                };
                metrics::counter!("cart_menu_refresh_total", "outcome" => outcome).increment(1);
                return Err(err);
            }
        };

        let installed = self.menu.install(menu);
        metrics::counter!("cart_menu_refresh_total", "outcome" => "installed").increment(1);
        tracing::info!(coffees = installed.len(), "menu installed");

        if let Some(store) = self.coffee_store.clone() {
            self.persist(store, &installed).await;
        }

        Ok(installed)
    }

    /// Waits for the pending store write, if any.
    pub async fn flush(&mut self) {
        if let Some(handle) = self.persistence.take()
            && let Err(err) = handle.await
        {
            tracing::error!(error = %err, "menu persistence task failed");
        }
    }

    /// Runs the coordinator until every [`RefreshHandle`] is dropped.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<RefreshEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // Failures are logged and counted inside refresh.
                let _ = self.refresh(event).await;
            }
            self.flush().await;
            tracing::info!("refresh coordinator stopped");
        })
    }

    fn load_menu(&self) -> Result<Menu> {
        let raw = self.properties.get(COFFEES_PROPERTY)?;
        tracing::debug!(source = self.properties.name(), value = ?raw, "read {COFFEES_PROPERTY}");
        Ok(parse_coffees(raw.as_deref())?)
    }

    async fn persist(&mut self, store: Arc<dyn CoffeeStore>, menu: &Menu) {
        self.flush().await;

        let coffees: Vec<Coffee> = menu.iter().cloned().collect();
        self.persistence = Some(tokio::spawn(async move {
            match store.delete_all().await {
                Ok(deleted) => tracing::debug!(deleted, "cleared stored menu"),
                Err(err) => {
                    tracing::error!(error = %err, "failed to clear stored menu");
                    return;
                }
            }
            match store.save_all(coffees).await {
                Ok(saved) => {
                    for coffee in &saved {
                        tracing::debug!(%coffee, "saved");
                    }
                    tracing::info!(coffees = saved.len(), "menu persisted");
                }
                Err(err) => tracing::error!(error = %err, "failed to persist menu"),
            }
        }));
    }
}
