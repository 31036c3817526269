//! Editor settings inspector
//!
//! Seeds an in-memory store from `key=value` arguments, loads the settings
//! and prints the resulting values as JSON. Useful for checking how stored
//! strings are coerced.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::rc::Rc;

    use editor_settings::{MemoryStorage, Settings, StorageAdapter, StorageMode};

    env_logger::init();

    let mut host_managed = false;
    let mut entries = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--host-managed" {
            host_managed = true;
            continue;
        }
        match arg.split_once('=') {
            Some((key, value)) => entries.push((key.to_string(), value.to_string())),
            None => {
                eprintln!("usage: editor-settings [--host-managed] [key=value ...]");
                std::process::exit(2);
            }
        }
    }
    log::info!("Seeding {} stored value(s)", entries.len());

    let mode = StorageMode::from_host_managed(host_managed);
    let storage = StorageAdapter::with_backend(mode, MemoryStorage::with_entries(entries));
    let settings = Settings::load(Rc::new(storage));

    match serde_json::to_string_pretty(&settings.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialize settings: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry points live in `editor_settings::web`
}
