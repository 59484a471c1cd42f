use crate::SheetIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecencyViolation {
    #[error("recency list walk exceeded {len} nodes")]
    Cycle { len: usize },
    #[error("sheet {index} back link does not point at its predecessor")]
    BrokenBackLink { index: SheetIndex },
    #[error("recency list tail is {recorded:?} but the walk ends at {walked:?}")]
    TailMismatch {
        recorded: Option<SheetIndex>,
        walked: Option<SheetIndex>,
    },
    #[error("recency list holds {walked} nodes but records {recorded}")]
    LengthMismatch { walked: usize, recorded: usize },
    #[error("resident bytes are {recorded} but listed sheets add up to {listed}")]
    ResidentBytesMismatch { listed: u64, recorded: u64 },
    #[error("sheet {index} residency disagrees with its list membership")]
    ResidencyMismatch { index: SheetIndex },
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<SheetIndex>,
    next: Option<SheetIndex>,
    linked: bool,
}

/// Doubly linked most-to-least recently used order of resident sheets.
///
/// Nodes live in an arena addressed by sheet index; links are indices, so a
/// stale link can at worst name the wrong sheet, never dangle.
#[derive(Debug)]
pub(crate) struct RecencyList {
    links: Box<[Links]>,
    head: Option<SheetIndex>,
    tail: Option<SheetIndex>,
    len: usize,
}

impl RecencyList {
    pub(crate) fn new(sheet_count: usize) -> Self {
        Self {
            links: vec![Links::default(); sheet_count].into_boxed_slice(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn head(&self) -> Option<SheetIndex> {
        self.head
    }

    #[cfg(test)]
    pub(crate) fn tail(&self) -> Option<SheetIndex> {
        self.tail
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn contains(&self, index: SheetIndex) -> bool {
        self.links[index.slot()].linked
    }

    /// Moves `index` to the head, linking it first if it is not in the list.
    pub(crate) fn promote(&mut self, index: SheetIndex) {
        if self.head == Some(index) {
            return;
        }
        if self.contains(index) {
            self.unlink(index);
        }
        self.push_front(index);

        if self.tail.is_none() {
            self.tail = self.walk_to_tail();
        }
    }

    /// Detaches the least recently used sheet.
    pub(crate) fn pop_tail(&mut self) -> Option<SheetIndex> {
        let tail = self.tail?;
        self.unlink(tail);
        Some(tail)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = SheetIndex> + '_ {
        let mut cursor = self.head;
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let current = cursor?;
            remaining -= 1;
            cursor = self.links[current.slot()].next;
            Some(current)
        })
    }

    pub(crate) fn validate(&self) -> Result<(), RecencyViolation> {
        let mut walked = 0usize;
        let mut previous: Option<SheetIndex> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            walked += 1;
            if walked > self.len {
                return Err(RecencyViolation::Cycle { len: self.len });
            }
            let links = self.links[current.slot()];
            if !links.linked || links.prev != previous {
                return Err(RecencyViolation::BrokenBackLink { index: current });
            }
            previous = Some(current);
            cursor = links.next;
        }
        if previous != self.tail {
            return Err(RecencyViolation::TailMismatch {
                recorded: self.tail,
                walked: previous,
            });
        }
        let linked = self.links.iter().filter(|links| links.linked).count();
        if walked != self.len || linked != self.len {
            return Err(RecencyViolation::LengthMismatch {
                walked: walked.max(linked),
                recorded: self.len,
            });
        }
        Ok(())
    }

    fn push_front(&mut self, index: SheetIndex) {
        let old_head = self.head;
        self.links[index.slot()] = Links {
            prev: None,
            next: old_head,
            linked: true,
        };
        if let Some(old_head) = old_head {
            self.links[old_head.slot()].prev = Some(index);
        }
        self.head = Some(index);
        self.len += 1;
    }

    fn unlink(&mut self, index: SheetIndex) {
        let Links { prev, next, linked } = self.links[index.slot()];
        if !linked {
            panic!("cannot unlink sheet {index} that is not in the recency list");
        }
        match prev {
            Some(prev) => self.links[prev.slot()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next.slot()].prev = prev,
            None => self.tail = prev,
        }
        self.links[index.slot()] = Links::default();
        self.len -= 1;
    }

    fn walk_to_tail(&self) -> Option<SheetIndex> {
        let mut cursor = self.head?;
        for _ in 0..self.len {
            match self.links[cursor.slot()].next {
                Some(next) => cursor = next,
                None => return Some(cursor),
            }
        }
        panic!("recency list has no tail within {} nodes", self.len);
    }
}
