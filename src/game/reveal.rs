use serde::Serialize;
use uuid::Uuid;

use crate::{arcana::CardId, oracle::Color};

/// Deferred end-of-action work waiting for the owner's reveal animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReveal {
    pub owner: Uuid,
    pub owner_color: Color,
    pub turn_should_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealTrigger {
    Acknowledged,
    TimedOut,
    /// The owner is an AI and never animates.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealResolution {
    pub owner: Uuid,
    pub trigger: RevealTrigger,
    pub turn_passed: bool,
    pub next_to_move: Color,
}
