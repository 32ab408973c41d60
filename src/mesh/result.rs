//! Aggregated outcome of an acknowledged mesh command

use std::collections::HashMap;

/// Per-node acknowledgments plus the gateway's final verdict.
///
/// Every requested stone starts out `false`. The final verdict is kept apart
/// from the per-node map: the gateway may call a command successful while some
/// nodes never answered, or the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshResult {
    /// Requested stone ids, in request order, without duplicates
    order: Vec<u8>,
    acks: HashMap<u8, bool>,
    /// `None` when no final acknowledgment arrived
    final_ack: Option<bool>,
}

impl MeshResult {
    pub fn new(stone_ids: &[u8]) -> Self {
        let mut result = Self::default();
        for &id in stone_ids {
            result.add_target(id);
        }
        result
    }

    fn add_target(&mut self, id: u8) {
        if self.acks.insert(id, false).is_none() {
            self.order.push(id);
        }
    }

    /// Record one node's acknowledgment; ignored (returns `false`) for stones that were not requested.
    pub(crate) fn set_ack(&mut self, id: u8, success: bool) -> bool {
        match self.acks.get_mut(&id) {
            Some(entry) => {
                *entry = success;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_final(&mut self, success: Option<bool>) {
        self.final_ack = success;
    }

    /// The gateway's final verdict; `false` if it never arrived.
    pub fn success(&self) -> bool {
        self.final_ack.unwrap_or(false)
    }

    /// The final verdict, or `None` if it timed out.
    pub fn final_ack(&self) -> Option<bool> {
        self.final_ack
    }

    /// Acknowledgment for one stone, `None` if it was never requested.
    pub fn ack(&self, id: u8) -> Option<bool> {
        self.acks.get(&id).copied()
    }

    /// All `(stone id, acknowledged)` pairs in request order.
    pub fn acks(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.order.iter().map(move |id| (*id, self.acks[id]))
    }

    pub fn requested_ids(&self) -> &[u8] {
        &self.order
    }

    /// Stones that acknowledged, in request order.
    pub fn successful_ids(&self) -> Vec<u8> {
        self.acks().filter(|(_, ok)| *ok).map(|(id, _)| id).collect()
    }

    pub fn failed_ids(&self) -> Vec<u8> {
        self.acks().filter(|(_, ok)| !*ok).map(|(id, _)| id).collect()
    }

    /// Fold a later result into this one.
    ///
    /// Acknowledgments from `later` overwrite ours stone by stone; stones only
    /// we know keep their value. The final verdict is replaced only if `later`
    /// carries one.
    pub fn merge(&mut self, later: MeshResult) {
        for (id, success) in later.acks() {
            self.add_target(id);
            self.acks.insert(id, success);
        }
        if later.final_ack.is_some() {
            self.final_ack = later.final_ack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(acks: &[(u8, bool)], final_ack: Option<bool>) -> MeshResult {
        let ids: Vec<u8> = acks.iter().map(|(id, _)| *id).collect();
        let mut result = MeshResult::new(&ids);
        for &(id, ok) in acks {
            result.set_ack(id, ok);
        }
        result.set_final(final_ack);
        result
    }

    #[test]
    fn test_new_marks_every_target_false() {
        let result = MeshResult::new(&[1, 2, 3]);
        assert_eq!(result.acks().collect::<Vec<_>>(), vec![(1, false), (2, false), (3, false)]);
        assert!(!result.success());
        assert_eq!(result.final_ack(), None);
    }

    #[test]
    fn test_duplicate_targets_collapse() {
        let result = MeshResult::new(&[4, 4, 2]);
        assert_eq!(result.requested_ids(), &[4, 2]);
    }

    #[test]
    fn test_untargeted_ack_is_ignored() {
        let mut result = MeshResult::new(&[1]);
        assert!(!result.set_ack(9, true));
        assert_eq!(result.ack(9), None);
        assert!(result.set_ack(1, true));
        assert_eq!(result.ack(1), Some(true));
    }

    #[test]
    fn test_successful_ids_keep_request_order() {
        let result = result(&[(2, false), (5, true), (9, true)], Some(true));
        assert_eq!(result.successful_ids(), vec![5, 9]);
        assert_eq!(result.failed_ids(), vec![2]);
    }

    #[test]
    fn test_success_is_independent_of_acks() {
        let all_acked = result(&[(1, true), (2, true)], Some(false));
        assert!(!all_acked.success());

        let none_acked = result(&[(1, false)], Some(true));
        assert!(none_acked.success());
    }

    #[test]
    fn test_merge_is_right_biased() {
        let mut merged = result(&[(1, true)], Some(true));
        merged.merge(result(&[(1, false), (2, true)], Some(false)));

        assert_eq!(merged.acks().collect::<Vec<_>>(), vec![(1, false), (2, true)]);
        assert!(!merged.success());
    }

    #[test]
    fn test_merge_keeps_verdict_without_final_signal() {
        let mut merged = result(&[(1, true), (3, false)], Some(true));
        merged.merge(result(&[(1, true)], None));

        assert!(merged.success());
        assert_eq!(merged.ack(3), Some(false));
    }
}
