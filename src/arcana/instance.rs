use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CardId;
use crate::exception::ActionError;

/// A drawn copy of a catalog card. The instance id is unique per draw and is
/// never reissued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInstance {
    pub instance_id: Uuid,
    pub card: CardId,
    pub drawn_at_ply: u32,
}

impl CardInstance {
    pub fn new(card: CardId, drawn_at_ply: u32) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            card,
            drawn_at_ply,
        }
    }
}

/// Per-participant card holdings. Instances move from `in_hand` to `used`
/// exactly once and are looked up by instance id only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hand {
    in_hand: Vec<CardInstance>,
    used: Vec<CardInstance>,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[CardInstance] {
        &self.in_hand
    }

    pub fn used(&self) -> &[CardInstance] {
        &self.used
    }

    pub fn len(&self) -> usize {
        self.in_hand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_hand.is_empty()
    }

    pub fn add(&mut self, instance: CardInstance) {
        self.in_hand.push(instance);
    }

    pub fn is_used(&self, instance_id: Uuid) -> bool {
        self.used.iter().any(|c| c.instance_id == instance_id)
    }

    /// Resolves an instance that is still playable.
    pub fn find(&self, instance_id: Uuid) -> Result<&CardInstance, ActionError> {
        if self.is_used(instance_id) {
            return Err(ActionError::CardAlreadyUsed(instance_id));
        }
        self.in_hand
            .iter()
            .find(|c| c.instance_id == instance_id)
            .ok_or(ActionError::CardNotInHand(instance_id))
    }

    /// Moves the instance to the used set.
    pub fn mark_used(&mut self, instance_id: Uuid) -> Result<CardInstance, ActionError> {
        self.find(instance_id)?;
        let index = self
            .in_hand
            .iter()
            .position(|c| c.instance_id == instance_id)
            .ok_or(ActionError::CardNotInHand(instance_id))?;
        let instance = self.in_hand.remove(index);
        self.used.push(instance.clone());
        Ok(instance)
    }

    /// Drops an unused instance from the hand without playing it.
    pub fn discard(&mut self, instance_id: Uuid) -> Option<CardInstance> {
        let index = self
            .in_hand
            .iter()
            .position(|c| c.instance_id == instance_id)?;
        Some(self.in_hand.remove(index))
    }

    pub fn clear(&mut self) {
        self.in_hand.clear();
        self.used.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_instance_is_never_matched_again() {
        let mut hand = Hand::new();
        let card = CardInstance::new(CardId::Fortune, 0);
        let id = card.instance_id;
        hand.add(card);

        assert!(hand.mark_used(id).is_ok());
        assert_eq!(hand.find(id), Err(ActionError::CardAlreadyUsed(id)));
        assert_eq!(
            hand.mark_used(id).unwrap_err(),
            ActionError::CardAlreadyUsed(id)
        );
        assert!(hand.is_empty());
        assert_eq!(hand.used().len(), 1);
    }

    #[test]
    fn unknown_instance_is_not_in_hand() {
        let hand = Hand::new();
        let id = Uuid::new_v4();
        assert_eq!(hand.find(id), Err(ActionError::CardNotInHand(id)));
    }

    #[test]
    fn duplicate_catalog_cards_are_distinct_instances() {
        let mut hand = Hand::new();
        let a = CardInstance::new(CardId::Vision, 1);
        let b = CardInstance::new(CardId::Vision, 1);
        let a_id = a.instance_id;
        let b_id = b.instance_id;
        hand.add(a);
        hand.add(b);

        hand.mark_used(a_id).unwrap();
        assert!(hand.find(b_id).is_ok());
    }
}
