//! In-flight operation records.
//!
//! Multi-stage operations park their state here between CPU runs and carry
//! only the `u32` slot id through the lock round-trip events.

pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(value);
                id
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    pub fn get(&self, id: u32) -> &T {
        self.slots[id as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("slot {id} is free"))
    }

    pub fn get_mut(&mut self, id: u32) -> &mut T {
        self.slots[id as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("slot {id} is free"))
    }

    pub fn remove(&mut self, id: u32) -> T {
        let value = self.slots[id as usize]
            .take()
            .unwrap_or_else(|| panic!("slot {id} is free"));
        self.free.push(id);
        value
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all live slots, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(id, _)| id as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_reuse() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(*arena.get(a), "a");
        assert_eq!(arena.remove(a), "a");
        assert_eq!(arena.len(), 1);
        let c = arena.insert("c");
        assert_eq!(c, a);
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "slot 0 is free")]
    fn test_double_remove_panics() {
        let mut arena = SlotArena::new();
        let a = arena.insert(1);
        arena.remove(a);
        arena.remove(a);
    }
}
