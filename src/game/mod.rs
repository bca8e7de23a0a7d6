//! Match 집합체.
//!
//! 한 판의 모든 상태(보드, 효과 레지스트리, 손패, 기록, 중복 방지 캐시)를
//! 하나의 값으로 소유한다. 상태 변경은 `engine` 의 진입점을 통해서만 일어난다.

pub mod engine;
pub mod history;
pub mod idempotency;
pub mod intent;
pub mod reveal;
pub mod visibility;

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ai::AiDifficulty,
    arcana::{CardId, CardInstance, Hand},
    effect::{CapturedPool, ColorMap, EffectRegistry},
    env::{AscensionTrigger, GameSettings},
    oracle::{Color, MoveResult, Position},
};

use history::MoveHistory;
use idempotency::IdempotencyCache;
use reveal::PendingReveal;

pub use engine::ActionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "difficulty", rename_all = "snake_case")]
pub enum ParticipantKind {
    Human,
    Ai(AiDifficulty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub color: Color,
    pub kind: ParticipantKind,
}

impl Participant {
    pub fn human(color: Color) -> Self {
        Self {
            id: Uuid::new_v4(),
            color,
            kind: ParticipantKind::Human,
        }
    }

    pub fn ai(color: Color, difficulty: AiDifficulty) -> Self {
        Self {
            id: Uuid::new_v4(),
            color,
            kind: ParticipantKind::Ai(difficulty),
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.kind, ParticipantKind::Ai(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Ongoing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchOutcome {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    KingDestroyed { winner: Color },
    Resigned { winner: Color },
    Disconnected { winner: Color },
}

impl MatchOutcome {
    pub fn winner(&self) -> Option<Color> {
        match *self {
            MatchOutcome::Checkmate { winner }
            | MatchOutcome::KingDestroyed { winner }
            | MatchOutcome::Resigned { winner }
            | MatchOutcome::Disconnected { winner } => Some(winner),
            MatchOutcome::Stalemate | MatchOutcome::InsufficientMaterial => None,
        }
    }
}

/// Cards revealed by divination, waiting for their owner to keep one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSelection {
    pub owner: Uuid,
    pub options: Vec<CardId>,
}

/// 한 판의 상태. `MatchActor` 하나만이 이 값을 소유하고 변경한다.
#[derive(Debug, Clone)]
pub struct Match {
    id: Uuid,
    participants: [Participant; 2],
    position: Position,
    status: MatchStatus,
    outcome: Option<MatchOutcome>,
    ascended: bool,
    hands: HashMap<Uuid, Hand>,
    registry: EffectRegistry,
    history: MoveHistory,
    last_draw_ply: HashMap<Uuid, u32>,
    card_used: ColorMap<bool>,
    captured: CapturedPool,
    pending_selection: Option<PendingSelection>,
    pending_reveal: Option<PendingReveal>,
    last_move: Option<MoveResult>,
    ply: u32,
    busy: bool,
    idempotency: IdempotencyCache,
    rematch_votes: HashSet<Uuid>,
    rng: StdRng,
    settings: GameSettings,
}

impl Match {
    /// Seats both participants on the opening position. Participants must
    /// hold opposite colors.
    pub fn new(id: Uuid, participants: [Participant; 2], settings: GameSettings) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut game = Self {
            id,
            participants,
            position: Position::standard(),
            status: MatchStatus::Ongoing,
            outcome: None,
            ascended: false,
            hands: participants.iter().map(|p| (p.id, Hand::new())).collect(),
            registry: EffectRegistry::new(),
            history: MoveHistory::new(settings.history_capacity),
            last_draw_ply: HashMap::new(),
            card_used: ColorMap::default(),
            captured: CapturedPool::default(),
            pending_selection: None,
            pending_reveal: None,
            last_move: None,
            ply: 0,
            busy: false,
            idempotency: IdempotencyCache::new(
                Duration::from_millis(settings.idempotency_ttl_ms),
                settings.idempotency_capacity,
            ),
            rematch_votes: HashSet::new(),
            rng,
            settings,
        };
        if game.settings.ascension_trigger == AscensionTrigger::Immediate {
            game.ascend();
        }
        game
    }

    /// Replaces the board, for tests and tooling that start from a
    /// hand-written position. The move history starts empty.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self.history.clear();
        self
    }

    /// Deals the given cards to the participant playing `color`.
    pub fn with_hand(mut self, color: Color, cards: &[CardId]) -> Self {
        let owner = self.participant_by_color(color).id;
        let ply = self.ply;
        if let Some(hand) = self.hands.get_mut(&owner) {
            for card in cards {
                hand.add(CardInstance::new(*card, ply));
            }
        }
        self
    }

    /// Makes arcana usable regardless of the configured trigger.
    pub fn ascended_now(mut self) -> Self {
        self.ascend();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }

    pub fn participant(&self, player_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == player_id)
    }

    pub fn participant_by_color(&self, color: Color) -> &Participant {
        if self.participants[0].color == color {
            &self.participants[0]
        } else {
            &self.participants[1]
        }
    }

    /// The participant whose turn it currently is.
    pub fn to_move(&self) -> &Participant {
        self.participant_by_color(self.position.side_to_move())
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn ascended(&self) -> bool {
        self.ascended
    }

    pub fn hand(&self, player_id: Uuid) -> Option<&Hand> {
        self.hands.get(&player_id)
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn captured(&self) -> &CapturedPool {
        &self.captured
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    pub fn last_move(&self) -> Option<MoveResult> {
        self.last_move
    }

    pub fn ply(&self) -> u32 {
        self.ply
    }

    pub fn pending_reveal(&self) -> Option<PendingReveal> {
        self.pending_reveal
    }

    pub fn pending_selection(&self) -> Option<&PendingSelection> {
        self.pending_selection.as_ref()
    }

    pub fn card_used_this_turn(&self, color: Color) -> bool {
        self.card_used[color]
    }

    /// First ply at which `player_id` may draw again, if a cooldown applies.
    pub fn draw_available_at(&self, player_id: Uuid) -> Option<u32> {
        self.last_draw_ply
            .get(&player_id)
            .map(|last| last + self.settings.draw_cooldown_plies)
            .filter(|&at| at > self.ply)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn rematch_votes(&self) -> usize {
        self.rematch_votes.len()
    }

    /// A fresh seed for work done off the match, such as AI search.
    pub fn fork_seed(&mut self) -> u64 {
        use rand::Rng;
        self.rng.gen()
    }

    /// Resets for a rematch: opening position, empty registry and hands,
    /// colors swapped.
    fn reset_for_rematch(&mut self) {
        for participant in self.participants.iter_mut() {
            participant.color = participant.color.opposite();
        }
        self.position = Position::standard();
        self.status = MatchStatus::Ongoing;
        self.outcome = None;
        self.ascended = false;
        for hand in self.hands.values_mut() {
            hand.clear();
        }
        self.registry = EffectRegistry::new();
        self.history.clear();
        self.last_draw_ply.clear();
        self.card_used = ColorMap::default();
        self.captured = CapturedPool::default();
        self.pending_selection = None;
        self.pending_reveal = None;
        self.last_move = None;
        self.ply = 0;
        self.busy = false;
        self.idempotency.clear();
        self.rematch_votes.clear();
        if self.settings.ascension_trigger == AscensionTrigger::Immediate {
            self.ascend();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pvp() -> Match {
        Match::new(
            Uuid::new_v4(),
            [Participant::human(Color::White), Participant::human(Color::Black)],
            GameSettings {
                rng_seed: Some(1),
                ..GameSettings::default()
            },
        )
    }

    #[test]
    fn new_match_starts_dormant_on_the_opening_position() {
        let game = pvp();
        assert_eq!(game.position().fen(), Position::standard().fen());
        assert!(!game.ascended());
        assert_eq!(game.to_move().color, Color::White);
        for p in game.participants() {
            assert!(game.hand(p.id).unwrap().is_empty());
        }
    }

    #[test]
    fn immediate_ascension_deals_one_card_each() {
        let game = Match::new(
            Uuid::new_v4(),
            [Participant::human(Color::White), Participant::human(Color::Black)],
            GameSettings {
                ascension_trigger: AscensionTrigger::Immediate,
                rng_seed: Some(3),
                ..GameSettings::default()
            },
        );
        assert!(game.ascended());
        for p in game.participants() {
            assert_eq!(game.hand(p.id).unwrap().len(), 1);
        }
    }

    #[test]
    fn outcome_winner() {
        assert_eq!(
            MatchOutcome::Resigned {
                winner: Color::Black
            }
            .winner(),
            Some(Color::Black)
        );
        assert_eq!(MatchOutcome::Stalemate.winner(), None);
    }
}
