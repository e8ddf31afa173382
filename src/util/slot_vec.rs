use std::fmt;

/// Number of slots a value occupies when stored in a [`SlotVec`]
pub trait Width {
    fn width(&self) -> usize;
}

/// Slot number in a [`SlotVec`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

/// Append-only vector whose entries are addressed by slot rather than by position
///
/// Every entry claims as many consecutive slots as its [`Width`]. For a constant pool, numbering
/// starts at slot 1 and `long`/`double` entries claim two slots, leaving the second unusable.
#[derive(Clone)]
pub struct SlotVec<T> {
    entries: Vec<T>,

    /// For each slot past `first`, the position in `entries` of the entry starting there (or
    /// `None` for the trailing slots of wide entries)
    owners: Vec<Option<usize>>,

    first: Offset,
}

/// Why a slot could not be used
#[derive(Debug, PartialEq, Eq)]
pub enum SlotError {
    /// Slot is before the first slot or past the last one
    OutOfRange(Offset),

    /// Slot is the trailing part of a wider entry
    Continuation(Offset),

    /// Replacement claims a different number of slots than the entry it replaces
    WidthMismatch { replacement: usize, existing: usize },
}

impl<T: Width> SlotVec<T> {
    pub fn new() -> SlotVec<T> {
        SlotVec::new_starting_at(Offset(0))
    }

    pub fn new_starting_at(first: Offset) -> SlotVec<T> {
        SlotVec {
            entries: vec![],
            owners: vec![],
            first,
        }
    }

    /// Number of entries (wide entries count once)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn initial_offset(&self) -> Offset {
        self.first
    }

    /// Slot the next pushed entry will start at
    pub fn offset_len(&self) -> Offset {
        Offset(self.first.0 + self.owners.len())
    }

    /// Add an entry to the back, returning the slot it starts at
    pub fn push(&mut self, value: T) -> Offset {
        let offset = self.offset_len();
        self.owners.push(Some(self.entries.len()));
        for _ in 1..value.width() {
            self.owners.push(None);
        }
        self.entries.push(value);
        offset
    }

    fn position(&self, offset: Offset) -> Result<usize, SlotError> {
        let slot = offset
            .0
            .checked_sub(self.first.0)
            .ok_or(SlotError::OutOfRange(offset))?;
        match self.owners.get(slot) {
            Some(Some(position)) => Ok(*position),
            Some(None) => Err(SlotError::Continuation(offset)),
            None => Err(SlotError::OutOfRange(offset)),
        }
    }

    /// Entry starting exactly at a slot
    pub fn lookup(&self, offset: Offset) -> Result<&T, SlotError> {
        let position = self.position(offset)?;
        Ok(&self.entries[position])
    }

    pub fn get(&self, offset: Offset) -> Option<&T> {
        self.lookup(offset).ok()
    }

    /// Swap out the entry starting at a slot, returning the old entry
    ///
    /// The replacement must be exactly as wide as the entry it replaces.
    pub fn replace(&mut self, offset: Offset, value: T) -> Result<T, SlotError> {
        let position = self.position(offset)?;
        let existing = &mut self.entries[position];
        if existing.width() != value.width() {
            return Err(SlotError::WidthMismatch {
                replacement: value.width(),
                existing: existing.width(),
            });
        }
        Ok(std::mem::replace(existing, value))
    }

    /// Entries along with the slot each one starts at
    pub fn iter(&self) -> SlotVecIter<'_, T> {
        SlotVecIter {
            owners: self.owners.iter().enumerate(),
            entries: &self.entries,
            first: self.first,
        }
    }
}

/// Iterator over a borrowed [`SlotVec`], skipping the trailing slots of wide entries
pub struct SlotVecIter<'a, T> {
    owners: std::iter::Enumerate<std::slice::Iter<'a, Option<usize>>>,
    entries: &'a [T],
    first: Offset,
}

impl<'a, T> Iterator for SlotVecIter<'a, T> {
    type Item = (Offset, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries;
        let first = self.first.0;
        self.owners.find_map(move |(slot, owner)| {
            owner.map(move |position| (Offset(first + slot), &entries[position]))
        })
    }
}

impl<'a, T: Width> IntoIterator for &'a SlotVec<T> {
    type Item = (Offset, &'a T);
    type IntoIter = SlotVecIter<'a, T>;

    fn into_iter(self) -> SlotVecIter<'a, T> {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for SlotVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.entries == other.entries
    }
}

impl<T: Width> Default for SlotVec<T> {
    fn default() -> Self {
        SlotVec::new()
    }
}

impl<T: Width> Extend<T> for SlotVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        for value in values {
            self.push(value);
        }
    }
}

impl<T: Width> FromIterator<T> for SlotVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut slots = SlotVec::new();
        slots.extend(values);
        slots
    }
}

impl<T: fmt::Debug + Width> fmt::Debug for SlotVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter().map(|(offset, value)| (offset.0, value))).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Entry {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Entry {
        fn width(&self) -> usize {
            match self {
                Entry::Narrow(_) => 1,
                Entry::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn wide_entries_claim_two_slots() {
        let mut slots: SlotVec<Entry> = SlotVec::new_starting_at(Offset(1));
        assert_eq!(slots.push(Entry::Narrow(1)), Offset(1));
        assert_eq!(slots.push(Entry::Wide(2)), Offset(2));
        assert_eq!(slots.push(Entry::Narrow(3)), Offset(4));
        assert_eq!(slots.offset_len(), Offset(5));
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots.iter().collect::<Vec<_>>(),
            vec![
                (Offset(1), &Entry::Narrow(1)),
                (Offset(2), &Entry::Wide(2)),
                (Offset(4), &Entry::Narrow(3)),
            ]
        );
    }

    #[test]
    fn borrowed_loops_skip_continuation_slots() {
        let mut slots: SlotVec<Entry> = SlotVec::new_starting_at(Offset(1));
        slots.extend(vec![Entry::Wide(1), Entry::Wide(2), Entry::Narrow(3)]);

        let mut seen = vec![];
        for (offset, entry) in &slots {
            seen.push((offset.0, *entry));
        }
        assert_eq!(
            seen,
            vec![(1, Entry::Wide(1)), (3, Entry::Wide(2)), (5, Entry::Narrow(3))]
        );
    }

    #[test]
    fn unusable_slots() {
        let slots: SlotVec<Entry> = vec![Entry::Wide(1), Entry::Narrow(2)].into_iter().collect();
        assert_eq!(slots.get(Offset(0)), Some(&Entry::Wide(1)));
        assert_eq!(slots.get(Offset(2)), Some(&Entry::Narrow(2)));
        assert_eq!(slots.lookup(Offset(1)), Err(SlotError::Continuation(Offset(1))));
        assert_eq!(slots.lookup(Offset(3)), Err(SlotError::OutOfRange(Offset(3))));

        let shifted: SlotVec<Entry> = SlotVec::new_starting_at(Offset(1));
        assert_eq!(shifted.lookup(Offset(0)), Err(SlotError::OutOfRange(Offset(0))));
    }

    #[test]
    fn replacements_keep_their_width() {
        let mut slots: SlotVec<Entry> = vec![Entry::Narrow(1), Entry::Wide(2)].into_iter().collect();
        assert_eq!(slots.replace(Offset(0), Entry::Narrow(7)), Ok(Entry::Narrow(1)));
        assert_eq!(
            slots.replace(Offset(1), Entry::Narrow(8)),
            Err(SlotError::WidthMismatch {
                replacement: 1,
                existing: 2
            })
        );
        assert_eq!(slots.get(Offset(0)), Some(&Entry::Narrow(7)));
    }
}
