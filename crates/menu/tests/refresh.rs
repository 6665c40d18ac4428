//! Menu refresh through the layered property sources.

use std::io::Write;
use std::sync::Arc;

use domain::{COFFEES_PROPERTY, parse_coffees};
use menu::{
    EnvPropertySource, JsonFilePropertySource, LayeredPropertySource, MapPropertySource,
    MenuState, RefreshCoordinator, RefreshEvent, RefreshHandle,
};
use tempfile::NamedTempFile;

fn properties_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn file_changes_are_picked_up_on_refresh() {
    let file = properties_file(r#"{"cart": {"coffees": "latte;mocha"}}"#);
    let properties = LayeredPropertySource::new()
        .with_layer(JsonFilePropertySource::new(file.path()))
        .with_layer(EnvPropertySource::new());
    let menu = Arc::new(MenuState::new());
    let mut coordinator = RefreshCoordinator::new(menu.clone(), Arc::new(properties));

    coordinator.refresh(RefreshEvent::ApplicationReady).await.unwrap();
    assert_eq!(menu.snapshot().len(), 2);

    std::fs::write(file.path(), r#"{"cart": {"coffees": "latte;mocha;cortado"}}"#).unwrap();
    coordinator.refresh(RefreshEvent::ConfigRefreshed).await.unwrap();

    let names: Vec<_> = menu.snapshot().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["cortado", "latte", "mocha"]);
}

#[tokio::test]
async fn file_layer_overrides_lower_layers() {
    let file = properties_file(r#"{"cart.coffees": "espresso"}"#);
    let fallback = MapPropertySource::new();
    fallback.set(COFFEES_PROPERTY, "latte");
    let properties = LayeredPropertySource::new()
        .with_layer(JsonFilePropertySource::new(file.path()))
        .with_layer(fallback);
    let menu = Arc::new(MenuState::new());
    let mut coordinator = RefreshCoordinator::new(menu.clone(), Arc::new(properties));

    coordinator.refresh(RefreshEvent::ApplicationReady).await.unwrap();
    let names: Vec<_> = menu.snapshot().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["espresso"]);

    file.close().unwrap();
    coordinator.refresh(RefreshEvent::ConfigRefreshed).await.unwrap();
    let names: Vec<_> = menu.snapshot().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["latte"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_partial_menus() {
    let small = parse_coffees(Some("a;b")).unwrap();
    let large = parse_coffees(Some("a;b;c;d;e;f;g;h")).unwrap();

    let properties = Arc::new(MapPropertySource::new());
    properties.set(COFFEES_PROPERTY, "a;b");
    let menu = Arc::new(MenuState::new());
    menu.install(small.clone());

    let (handle, rx) = RefreshHandle::channel(64);
    let coordinator =
        RefreshCoordinator::new(menu.clone(), properties.clone()).spawn(rx);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let menu = menu.clone();
            let (small, large) = (small.clone(), large.clone());
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    let snapshot = menu.snapshot();
                    assert!(*snapshot == small || *snapshot == large);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for i in 0..50 {
        let value = if i % 2 == 0 { "a;b;c;d;e;f;g;h" } else { "b;a" };
        properties.set(COFFEES_PROPERTY, value);
        handle.trigger(RefreshEvent::ConfigRefreshed).await.unwrap();
    }
    drop(handle);

    for reader in futures_util::future::join_all(readers).await {
        reader.unwrap();
    }
    coordinator.await.unwrap();
}
