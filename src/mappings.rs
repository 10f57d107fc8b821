use hashbrown::HashMap;
use std::hash::Hash;

/// Used to create consecutive `usize` mappings for a given type.
#[derive(Debug, Clone, Derivative)]
#[derivative(Default(bound = ""))]
pub struct Mappings<K, V>
where
    K: Hash + Eq,
    V: Copy + From<usize>,
{
    counter: usize,
    mappings: HashMap<K, V>,
}

impl<K, V> Mappings<K, V>
where
    K: Hash + Eq,
    V: Copy + From<usize>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, allocating the next
    /// consecutive value if it has none yet.
    pub fn get_or_alloc(&mut self, key: K) -> V {
        if let Some(value) = self.mappings.get(&key) {
            *value
        } else {
            let value = V::from(self.counter);
            self.mappings.insert(key, value);
            self.counter += 1;
            value
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.mappings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[test]
    fn basic() {
        let mut mappings = Mappings::<TypeId, usize>::new();

        assert_eq!(mappings.get_or_alloc(TypeId::of::<usize>()), 0);
        assert_eq!(mappings.get_or_alloc(TypeId::of::<isize>()), 1);
        assert_eq!(mappings.get_or_alloc(TypeId::of::<usize>()), 0);
        assert_eq!(mappings.get(&TypeId::of::<u8>()), None);
        assert_eq!(mappings.len(), 2);
    }
}
