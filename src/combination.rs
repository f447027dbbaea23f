//! Ordered on/off associations used by divisionals and generals.
//!
//! In ODF an association is stored as a signed 1-based position: `Stop003=-5`
//! means "the fifth stop, off". In memory it is a handle plus a flag.

use crate::ids::IsId;
use crate::odf_io::{OdfReader, OdfWriter, format_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association<I> {
    pub id: I,
    pub is_on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationList<I> {
    entries: Vec<Association<I>>,
}

impl<I> Default for CombinationList<I> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<I: IsId> CombinationList<I> {
    /// Appends unconditionally; callers check [CombinationList::has] first.
    pub fn add(&mut self, id: I, is_on: bool) {
        self.entries.push(Association { id, is_on });
    }

    pub fn has(&self, id: I) -> bool {
        self.entries.iter().any(|a| a.id == id)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Association<I>> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Removes every entry for `id`.
    pub fn remove(&mut self, id: I) {
        self.entries.retain(|a| a.id != id);
    }

    pub fn pair_at(&self, index: usize) -> Option<&Association<I>> {
        self.entries.get(index)
    }

    pub fn pair_at_mut(&mut self, index: usize) -> Option<&mut Association<I>> {
        self.entries.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Association<I>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub(crate) fn signed_number(number: usize, is_on: bool) -> i64 {
    if is_on { number as i64 } else { -(number as i64) }
}

/// Writes `count_key=N` followed by `{prefix}NNN=±number` lines.
pub(crate) fn write_signed_entries(w: &mut OdfWriter, count_key: &str, prefix: &str, entries: &[(usize, bool)]) {
    w.add_key(count_key, entries.len());
    for (i, (number, is_on)) in entries.iter().enumerate() {
        w.add_key(&format!("{}{}", prefix, format_index(i + 1)), signed_number(*number, *is_on));
    }
}

/// Reads the declared count, accepting it only when it does not exceed
/// `limit`.
pub(crate) fn read_count(reader: &OdfReader, section: &str, count_key: &str, limit: usize) -> usize {
    match reader.read_int_opt(section, count_key, 0..=999) {
        Some(count) if count as usize <= limit => count as usize,
        Some(count) => {
            log::warn!(
                "[{}] {}={} exceeds the {} available element(s), ignored",
                section,
                count_key,
                count,
                limit
            );
            0
        }
        None => 0,
    }
}

/// Reads a signed entry and returns the zero-based position and the on flag,
/// or `None` when the value is missing, zero or beyond `limit`.
pub(crate) fn read_signed_entry(reader: &OdfReader, section: &str, key: &str, limit: usize) -> Option<(usize, bool)> {
    let limit = limit as i32;
    let value = reader.read_int_opt(section, key, -limit..=limit)?;
    if value == 0 {
        return None;
    }
    Some((value.unsigned_abs() as usize - 1, value > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StopId;

    #[test]
    fn remove_drops_all_duplicates() {
        let mut list = CombinationList::default();
        list.add(StopId(1), true);
        list.add(StopId(2), false);
        list.add(StopId(1), false);
        list.remove(StopId(1));
        assert_eq!(list.len(), 1);
        assert!(!list.has(StopId(1)));
    }

    #[test]
    fn pairs_can_be_flipped_in_place() {
        let mut list = CombinationList::default();
        list.add(StopId(4), true);
        list.pair_at_mut(0).unwrap().is_on = false;
        assert!(!list.pair_at(0).unwrap().is_on);
        assert!(list.pair_at_mut(3).is_none());
        assert_eq!(list.remove_at(0).map(|a| a.id), Some(StopId(4)));
        assert!(list.is_empty());
    }

    #[test]
    fn signed_entries_encode_state() {
        let mut w = OdfWriter::new();
        write_signed_entries(&mut w, "NumberOfStops", "Stop", &[(5, false), (2, true)]);
        assert_eq!(w.lines(), ["NumberOfStops=2", "Stop001=-5", "Stop002=2"]);

        let reader = OdfReader::from_str(&format!("[D]\n{}", w.to_text())).unwrap();
        assert_eq!(read_signed_entry(&reader, "D", "Stop001", 5), Some((4, false)));
        assert_eq!(read_signed_entry(&reader, "D", "Stop001", 4), None);
        assert_eq!(read_count(&reader, "D", "NumberOfStops", 1), 0);
        assert_eq!(read_count(&reader, "D", "NumberOfStops", 2), 2);
    }
}
