//! Ordered set of user-defined OCR regions.

use crate::geometry::Rect;

/// Insertion-ordered list of regions. Order is display order (1-based labels)
/// and the order in which recognition results are reported. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSet {
    regions: Vec<Rect>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rect: Rect) {
        self.regions.push(rect);
    }

    /// Remove the region at `index`; out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<Rect> {
        if index < self.regions.len() {
            Some(self.regions.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rect> {
        self.regions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rect> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Rect] {
        &self.regions
    }

    /// `"1: (l, t, r, b)"` lines for list widgets.
    pub fn labels(&self) -> Vec<String> {
        self.regions
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}: {}", i + 1, r))
            .collect()
    }
}

impl FromIterator<Rect> for RegionSet {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Rect;
    type IntoIter = std::slice::Iter<'a, Rect>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
