//! Cache entries with negative caching.

/// A cached lookup result.
///
/// An entry either holds a value or records that the looked-up entity
/// does not exist. The latter is a real, cacheable answer and is distinct
/// from a cache miss, which never surfaces as a `CacheEntry`.
///
/// # Example
///
/// ```
/// use twinguard_runtime::cache::CacheEntry;
///
/// let hit = CacheEntry::present(42);
/// let gone: CacheEntry<i32> = CacheEntry::nonexistent();
///
/// assert!(hit.exists());
/// assert_eq!(hit.value(), Some(&42));
/// assert!(!gone.exists());
/// assert_eq!(gone.value(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    value: Option<T>,
}

impl<T> CacheEntry<T> {
    /// An entry holding `value`.
    pub fn present(value: T) -> Self {
        Self { value: Some(value) }
    }

    /// An entry recording that nothing exists for the key.
    pub fn nonexistent() -> Self {
        Self { value: None }
    }

    /// Returns `true` if the entry holds a value.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Borrows the value, if present.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Takes the value, if present.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Maps the value, keeping absence.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            value: self.value.map(f),
        }
    }
}

impl<T> From<Option<T>> for CacheEntry<T> {
    fn from(value: Option<T>) -> Self {
        Self { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_absence() {
        let gone: CacheEntry<i32> = CacheEntry::nonexistent();
        assert!(!gone.map(|v| v + 1).exists());
        assert_eq!(CacheEntry::present(1).map(|v| v + 1).into_value(), Some(2));
    }

    #[test]
    fn from_option() {
        assert!(CacheEntry::from(Some("x")).exists());
        assert!(!CacheEntry::<&str>::from(None).exists());
    }
}
