use std::sync::{Arc, PoisonError, RwLock};

use domain::Menu;

/// The currently published coffee menu.
///
/// Readers take a snapshot and iterate it without holding any lock; a refresh
/// swaps in a whole new set, so no reader ever sees a partial menu.
#[derive(Debug, Default)]
pub struct MenuState {
    current: RwLock<Arc<Menu>>,
}

impl MenuState {
    /// Creates a state publishing an empty menu.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently published menu.
    pub fn snapshot(&self) -> Arc<Menu> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes `menu`, replacing the previous one.
    pub fn install(&self, menu: Menu) -> Arc<Menu> {
        let menu = Arc::new(menu);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = menu.clone();
        menu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::parse_coffees;

    #[test]
    fn starts_empty() {
        assert!(MenuState::new().snapshot().is_empty());
    }

    #[test]
    fn old_snapshot_survives_install() {
        let state = MenuState::new();
        state.install(parse_coffees(Some("latte;mocha")).unwrap());
        let before = state.snapshot();

        state.install(parse_coffees(Some("espresso")).unwrap());

        assert_eq!(before.len(), 2);
        let names: Vec<_> = state.snapshot().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["espresso"]);
    }
}
