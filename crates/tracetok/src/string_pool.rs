use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Identifier of an interned string. `StringId::NULL` is the empty string and
/// doubles as the "unknown symbol" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StringId(pub u32);

impl StringId {
    pub const NULL: StringId = StringId(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

#[derive(Debug)]
struct Inner {
    strings: Vec<Arc<str>>,
    ids: HashMap<Arc<str>, StringId>,
}

/// Session-wide string interner.
#[derive(Debug)]
pub struct StringPool {
    inner: Mutex<Inner>,
}

impl StringPool {
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut ids = HashMap::new();
        ids.insert(empty.clone(), StringId::NULL);
        StringPool {
            inner: Mutex::new(Inner {
                strings: vec![empty],
                ids,
            }),
        }
    }

    /// Interns `s`, returning the existing id when it was seen before.
    pub fn intern(&self, s: &str) -> StringId {
        let mut inner = self.lock();
        if let Some(id) = inner.ids.get(s) {
            return *id;
        }
        let id = StringId(inner.strings.len() as u32);
        let s: Arc<str> = Arc::from(s);
        inner.strings.push(s.clone());
        inner.ids.insert(s, id);
        id
    }

    /// Interns raw record bytes. Invalid UTF-8 is replaced.
    pub fn intern_bytes(&self, bytes: &[u8]) -> StringId {
        self.intern(&String::from_utf8_lossy(bytes))
    }

    /// Looks up an id. Unknown ids resolve to the empty string.
    pub fn get(&self, id: StringId) -> Arc<str> {
        let inner = self.lock();
        inner
            .strings
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| inner.strings[0].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        // The null string is always present.
        false
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned pool still holds consistent data: every mutation is a
        // push followed by an insert of the same value.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_empty_string() {
        let pool = StringPool::new();
        assert_eq!(&*pool.get(StringId::NULL), "");
        assert_eq!(pool.intern(""), StringId::NULL);
    }

    #[test]
    fn test_intern_is_stable() {
        let pool = StringPool::new();
        let a = pool.intern("cat");
        let b = pool.intern("evt");
        assert_ne!(a, b);
        assert_eq!(pool.intern("cat"), a);
        assert_eq!(&*pool.get(a), "cat");
        assert_eq!(&*pool.get(b), "evt");
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_unknown_id_resolves_to_empty() {
        let pool = StringPool::new();
        assert_eq!(&*pool.get(StringId(42)), "");
    }

    #[test]
    fn test_intern_bytes_lossy() {
        let pool = StringPool::new();
        let id = pool.intern_bytes(&[0xFF, b'a']);
        assert!(pool.get(id).contains('\u{FFFD}'));
    }
}
