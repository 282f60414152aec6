//! Per-type pools of fixed-size header records.
//!
//! An arena is a list of entries. An entry is a boxed slice of slots plus a
//! LIFO stack of free indices. Entries are only ever appended, each one twice
//! the size of the previous, and a boxed slice never moves once allocated, so
//! a slot keeps its address for as long as it is allocated.

use std::fmt;
use std::marker::PhantomData;

use log::debug;

use crate::Error;

/// Back-reference to an allocated slot: owning entry and index within it
pub struct Slot<T> {
    entry: u32,
    index: u32,
    _type: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    fn new(entry: usize, index: usize) -> Slot<T> {
        Slot {
            entry: entry as u32,
            index: index as u32,
            _type: PhantomData,
        }
    }

    pub fn entry(&self) -> usize {
        self.entry as usize
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Slot<T> {
        *self
    }
}

impl<T> Copy for Slot<T> {}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Slot<T>) -> bool {
        self.entry == other.entry && self.index == other.index
    }
}

impl<T> Eq for Slot<T> {}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Slot({}:{})", self.entry, self.index)
    }
}

struct Entry<T> {
    slots: Box<[T]>,
    free: Vec<u32>,
}

impl<T: Default> Entry<T> {
    fn with_capacity(capacity: usize) -> Result<Entry<T>, Error> {
        let oom = |_| Error::OutOfMemory {
            requested: capacity,
        };

        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(oom)?;
        slots.resize_with(capacity, T::default);

        // popped from the back, so index 0 is handed out first
        let mut free = Vec::new();
        free.try_reserve_exact(capacity).map_err(oom)?;
        free.extend((0..capacity as u32).rev());

        Ok(Entry {
            slots: slots.into_boxed_slice(),
            free,
        })
    }
}

pub struct HeaderArena<T> {
    name: &'static str,
    seed: usize,
    entries: Vec<Entry<T>>,
    current: usize,
}

impl<T: Default> HeaderArena<T> {
    /// Creates an empty arena; the first entry holding `seed` slots is only
    /// allocated on first use.
    pub fn new(name: &'static str, seed: usize) -> HeaderArena<T> {
        HeaderArena {
            name,
            seed: seed.max(1),
            entries: Vec::new(),
            current: 0,
        }
    }

    /// Hands out a slot reset to `T::default()`.
    ///
    /// Fails only when the host can't provide memory for a new entry.
    pub fn allocate(&mut self) -> Result<Slot<T>, Error> {
        loop {
            if let Some(entry) = self.entries.get_mut(self.current) {
                if let Some(index) = entry.free.pop() {
                    return Ok(Slot::new(self.current, index as usize));
                }
            }
            self.current = match self.entries.iter().position(|e| !e.free.is_empty()) {
                Some(entry) => entry,
                None => self.grow()?,
            };
        }
    }

    fn grow(&mut self) -> Result<usize, Error> {
        let capacity = match self.entries.last() {
            Some(entry) => entry.slots.len().saturating_mul(2),
            None => self.seed,
        };
        debug!("growing {} arena by {} slots", self.name, capacity);

        self.entries
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory {
                requested: capacity,
            })?;
        self.entries.push(Entry::with_capacity(capacity)?);
        Ok(self.entries.len() - 1)
    }

    /// Returns a slot for reuse. It is the next one `allocate` hands out.
    ///
    /// Releasing a slot twice is a caller bug and is not detected.
    pub fn release(&mut self, slot: Slot<T>) {
        let entry = &mut self.entries[slot.entry()];
        entry.slots[slot.index()] = T::default();
        entry.free.push(slot.index);
        self.current = slot.entry();
    }
}

impl<T> HeaderArena<T> {
    pub fn get(&self, slot: Slot<T>) -> &T {
        &self.entries[slot.entry()].slots[slot.index()]
    }

    pub fn get_mut(&mut self, slot: Slot<T>) -> &mut T {
        &mut self.entries[slot.entry()].slots[slot.index()]
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.entries.iter().map(|e| e.slots.len()).sum()
    }

    pub fn available(&self) -> usize {
        self.entries.iter().map(|e| e.free.len()).sum()
    }

    pub fn outstanding(&self) -> usize {
        self.capacity() - self.available()
    }
}

impl<T> fmt::Debug for HeaderArena<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("HeaderArena")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}
