use types::{Hash256, Slot};

/// Filter criteria for block queries.
///
/// Each criterion narrows the result: the query returns the intersection of
/// the candidate sets selected by every criterion present. An empty filter
/// selects every block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFilter {
    parent_root: Option<Hash256>,
    start_slot: Option<Slot>,
    end_slot: Option<Slot>,
}

impl BlockFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select only children of the block with this root.
    pub fn with_parent_root(mut self, parent_root: Hash256) -> Self {
        self.parent_root = Some(parent_root);
        self
    }

    /// Select only blocks with `slot >= start_slot`.
    pub fn with_start_slot(mut self, start_slot: Slot) -> Self {
        self.start_slot = Some(start_slot);
        self
    }

    /// Select only blocks with `slot <= end_slot`.
    pub fn with_end_slot(mut self, end_slot: Slot) -> Self {
        self.end_slot = Some(end_slot);
        self
    }

    pub fn parent_root(&self) -> Option<Hash256> {
        self.parent_root
    }

    pub fn start_slot(&self) -> Option<Slot> {
        self.start_slot
    }

    pub fn end_slot(&self) -> Option<Slot> {
        self.end_slot
    }

    /// `true` if the filter has a slot-range criterion.
    pub fn has_slot_range(&self) -> bool {
        self.start_slot.is_some() || self.end_slot.is_some()
    }

    /// `true` if no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.parent_root.is_none() && !self.has_slot_range()
    }
}
