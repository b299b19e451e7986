use serde_json::Value;
use tracing::info;

/// JSON pointers to known product-list nodes, most specific first.
/// The search page serves different layouts depending on the routing
/// experiment the session lands in.
const ITEM_LIST_PATHS: &[&str] = &[
    "/props/pageProps/compositeProducts/list",
    "/props/pageProps/superSavingProducts",
];

/// Return the first non-empty product array in the document, or an empty
/// slice when none of the known paths hold one.
pub fn locate_items(doc: &Value) -> &[Value] {
    for path in ITEM_LIST_PATHS {
        if let Some(items) = doc.pointer(path).and_then(Value::as_array) {
            if !items.is_empty() {
                info!("Found {} raw items at {}", items.len(), path);
                return items;
            }
        }
    }
    &[]
}
