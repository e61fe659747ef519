use crate::error::StoreResult;

/// The raw durable substrate: an ordered map of string keys to string values.
///
/// All implementations must satisfy these invariants:
/// - Single-key operations are atomic; nothing else is.
/// - `keys()` returns keys in lexicographic order.
/// - The backend never interprets values.
/// - Removing a missing key is not an error.
pub trait KeyValueBackend: Send + Sync {
    /// Read the raw value at `key`. Returns `Ok(None)` if absent.
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write (create or overwrite) the raw value at `key`.
    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Returns `true` if it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// All keys, in lexicographic order.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Keys starting with `prefix`, in lexicographic order.
    ///
    /// Default implementation filters `keys()`. Backends may override.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}
