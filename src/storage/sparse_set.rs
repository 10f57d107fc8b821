use crate::storage::Entity;
use hashbrown::HashMap;

/// Component storage: components packed in a dense vector,
/// with a lookup from entity to slot.
///
/// Removal swaps the last component into the freed slot, so
/// iteration order is not stable across removals.
#[derive(Debug, Clone)]
pub struct SparseSet<C> {
    lookup: HashMap<Entity, usize>,
    dense: Vec<(Entity, C)>,
}

impl<C> Default for SparseSet<C> {
    fn default() -> Self {
        Self {
            lookup: HashMap::new(),
            dense: vec![],
        }
    }
}

impl<C> SparseSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the component for `entity`, returning the one
    /// it replaced, if any.
    pub fn insert(&mut self, entity: Entity, component: C) -> Option<C> {
        match self.lookup.get(&entity) {
            Some(&slot) => Some(std::mem::replace(&mut self.dense[slot].1, component)),
            None => {
                self.lookup.insert(entity, self.dense.len());
                self.dense.push((entity, component));
                None
            }
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let slot = self.lookup.remove(&entity)?;
        let (_, component) = self.dense.swap_remove(slot);

        // Fix up the lookup of the component moved into `slot`.
        if let Some((moved, _)) = self.dense.get(slot) {
            self.lookup.insert(*moved, slot);
        }

        Some(component)
    }

    pub fn get(&self, entity: Entity) -> Option<&C> {
        let slot = *self.lookup.get(&entity)?;
        Some(&self.dense[slot].1)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        let slot = *self.lookup.get(&entity)?;
        Some(&mut self.dense[slot].1)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.lookup.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        self.dense.iter().map(|(entity, component)| (*entity, component))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> + '_ {
        self.dense
            .iter_mut()
            .map(|(entity, component)| (*entity, component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_remove_keeps_lookup() {
        let mut set = SparseSet::new();
        for id in 0..4 {
            set.insert(Entity(id), id * 10);
        }

        assert_eq!(set.remove(Entity(1)), Some(10));
        assert_eq!(set.len(), 3);
        assert!(!set.contains(Entity(1)));

        // Entity 3 was moved into slot 1.
        assert_eq!(set.get(Entity(3)), Some(&30));
        *set.get_mut(Entity(3)).unwrap() += 1;
        assert_eq!(set.get(Entity(3)), Some(&31));

        assert_eq!(set.remove(Entity(3)), Some(31));
        assert_eq!(set.remove(Entity(3)), None);
        assert_eq!(set.get(Entity(2)), Some(&20));
    }

    #[test]
    fn insert_replaces() {
        let mut set = SparseSet::new();
        assert_eq!(set.insert(Entity(5), "a"), None);
        assert_eq!(set.insert(Entity(5), "b"), Some("a"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![(Entity(5), &"b")]);
    }

    #[test]
    fn remove_last() {
        let mut set = SparseSet::new();
        set.insert(Entity(0), 1u8);
        set.insert(Entity(1), 2u8);
        assert_eq!(set.remove(Entity(1)), Some(2));
        assert_eq!(set.get(Entity(0)), Some(&1));

        for (_, value) in set.iter_mut() {
            *value *= 3;
        }
        assert_eq!(set.get(Entity(0)), Some(&3));
    }
}
