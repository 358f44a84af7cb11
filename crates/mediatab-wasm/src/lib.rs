use mediatab_core::MediaUpdate;
use mediatab_detect::SiteDatabase;
use wasm_bindgen::prelude::*;

/// Classify the transition between two relay updates as seen at `now_ms`.
///
/// An empty or `null` `previous` means nothing was playing before.
/// Returns the change as JSON, or `null` when `next` is not a playing update.
#[wasm_bindgen]
pub fn classify_change(previous: &str, next: &str, now_ms: f64) -> String {
    let previous = match previous.trim() {
        "" | "null" => None,
        json => MediaUpdate::from_json(json)
            .ok()
            .and_then(|update| update.to_tab_state()),
    };
    let change = MediaUpdate::from_json(next)
        .ok()
        .and_then(|update| update.to_tab_state())
        .map(|state| state.determine_changes(previous.as_ref(), now_ms));
    serde_json::to_string(&change).unwrap_or_else(|_| "null".to_string())
}

/// The embedded site definition serving `host`, as JSON, or `null`.
#[wasm_bindgen]
pub fn site_for_host(host: &str) -> String {
    let db = SiteDatabase::embedded();
    let site = db.find_by_host(host).and_then(|i| db.site(i));
    serde_json::to_string(&site).unwrap_or_else(|_| "null".to_string())
}

#[wasm_bindgen]
pub fn reverse_domain(host: &str) -> String {
    mediatab_core::wire::reverse_domain(host)
}
