use actix::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ai::AiDifficulty,
    exception::{ActionError, GameError, StateError},
    game::{intent::ActionRequest, visibility::ViewerState, ActionReport, Participant},
    oracle::Color,
};

use super::{match_actor::MatchActor, protocol::ServerMessage};

// --- MatchActor ---

#[derive(Message)]
#[rtype(result = "Result<(), StateError>")]
pub struct Connect {
    pub player_id: Uuid,
    pub addr: Recipient<ServerMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub player_id: Uuid,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<ActionReport, ActionError>")]
pub struct SubmitAction {
    pub player_id: Uuid,
    pub request: ActionRequest,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RevealComplete {
    pub player_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Result<bool, ActionError>")]
pub struct VoteRematch {
    pub player_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Result<(), ActionError>")]
pub struct Resign {
    pub player_id: Uuid,
}

/// Resends the viewer's state to its connection and returns it.
#[derive(Message)]
#[rtype(result = "ViewerState")]
pub struct SyncState {
    pub player_id: Uuid,
}

// --- MatchRegistry ---

/// Who sits across from the human creating the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opponent {
    Human,
    Ai {
        #[serde(default)]
        difficulty: Option<AiDifficulty>,
    },
}

#[derive(Message, Debug, Clone, Deserialize)]
#[rtype(result = "Result<MatchCreated, GameError>")]
pub struct CreateMatch {
    pub opponent: Opponent,
    /// Color of the creating player. White when omitted.
    #[serde(default)]
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCreated {
    pub match_id: Uuid,
    pub participants: Vec<Participant>,
}

#[derive(Message)]
#[rtype(result = "Result<Addr<MatchActor>, StateError>")]
pub struct FindMatch {
    pub match_id: Uuid,
    pub player_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct MatchClosed {
    pub match_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct ActiveMatches;
