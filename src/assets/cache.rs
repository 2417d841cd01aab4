use std::collections::HashMap;
use std::rc::Rc;

/// Joins the paths a resource was built from into its cache key.
pub fn composite_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("|")
}

/// String-keyed store of shared resources.
///
/// Each key is loaded at most once while it stays cached. Failed loads are
/// not remembered, so the next request retries.
pub struct ResourceCache<T> {
    entries: HashMap<String, Rc<T>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Rc<T>> {
        self.entries.get(key).cloned()
    }

    pub fn get_or_try_load<E>(
        &mut self,
        key: &str,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Rc<T>, E> {
        if let Some(existing) = self.entries.get(key) {
            return Ok(Rc::clone(existing));
        }
        let resource = Rc::new(load()?);
        self.entries.insert(key.to_owned(), Rc::clone(&resource));
        Ok(resource)
    }

    pub fn insert(&mut self, key: impl Into<String>, resource: T) -> Rc<T> {
        let resource = Rc::new(resource);
        self.entries.insert(key.into(), Rc::clone(&resource));
        resource
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Forgets `key`. Holders of the resource keep their reference.
    pub fn evict(&mut self, key: &str) -> Option<Rc<T>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_each_key_once() {
        let mut cache = ResourceCache::new();
        let mut loads = 0;

        let a = cache
            .get_or_try_load("a", || {
                loads += 1;
                Ok::<_, ()>(1)
            })
            .unwrap();
        let again = cache
            .get_or_try_load("a", || {
                loads += 1;
                Ok::<_, ()>(2)
            })
            .unwrap();

        assert_eq!(loads, 1);
        assert!(Rc::ptr_eq(&a, &again));
        assert_eq!(*again, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let mut cache: ResourceCache<u32> = ResourceCache::new();
        assert!(cache.get_or_try_load("a", || Err("boom")).is_err());
        assert!(!cache.contains("a"));
        assert_eq!(*cache.get_or_try_load("a", || Ok::<_, &str>(7)).unwrap(), 7);
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(composite_key(&["sky.hdr", "irradiance"]), "sky.hdr|irradiance");
        assert_eq!(composite_key::<&str>(&[]), "");
    }
}
