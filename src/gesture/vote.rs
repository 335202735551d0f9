use std::collections::VecDeque;

use crate::types::GestureLabel;

/// Fixed-size FIFO of raw per-frame labels with majority lookup.
#[derive(Debug, Clone)]
pub struct VoteBuffer {
    labels: VecDeque<GestureLabel>,
    capacity: usize,
}

impl VoteBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, label: GestureLabel) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    /// Most frequent label and its count; ties go to the label seen first.
    pub fn majority(&self) -> Option<(&GestureLabel, usize)> {
        let mut best: Option<(&GestureLabel, usize)> = None;
        for (i, label) in self.labels.iter().enumerate() {
            if self.labels.iter().take(i).any(|earlier| earlier == label) {
                continue;
            }
            let count = self.labels.iter().filter(|other| *other == label).count();
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((label, count));
            }
        }
        best
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_sequence_keeps_dominant_label() {
        let mut buffer = VoteBuffer::new(5);
        for label in [
            GestureLabel::OpenPalm,
            GestureLabel::OpenPalm,
            GestureLabel::ThumbsUp,
            GestureLabel::OpenPalm,
            GestureLabel::OpenPalm,
        ] {
            buffer.push(label);
        }
        assert_eq!(buffer.majority(), Some((&GestureLabel::OpenPalm, 4)));
    }

    #[test]
    fn ties_resolve_to_earliest() {
        let mut buffer = VoteBuffer::new(4);
        buffer.push(GestureLabel::Fist);
        buffer.push(GestureLabel::VSign);
        buffer.push(GestureLabel::VSign);
        buffer.push(GestureLabel::Fist);
        assert_eq!(buffer.majority(), Some((&GestureLabel::Fist, 2)));
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let mut buffer = VoteBuffer::new(3);
        buffer.push(GestureLabel::Fist);
        buffer.push(GestureLabel::Fist);
        buffer.push(GestureLabel::VSign);
        buffer.push(GestureLabel::VSign);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.majority(), Some((&GestureLabel::VSign, 2)));
    }

    #[test]
    fn empty_buffer_has_no_majority() {
        let mut buffer = VoteBuffer::new(5);
        assert_eq!(buffer.majority(), None);
        buffer.push(GestureLabel::Unknown);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
