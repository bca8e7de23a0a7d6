//! Effect Applicator.
//!
//! One handler per [`CardId`], looked up from a table built once. A handler
//! either mutates the board/registry and reports observable parameters, or
//! returns `None` without having changed anything the caller keeps: the turn
//! engine snapshots state before every activation and restores it on `None`.

mod board_edit;
mod information;
mod meta;
mod movement;
mod offensive;
mod protective;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    arcana::{CardId, CardInstance},
    effect::{CapturedPool, EffectRegistry},
    env::GameSettings,
    game::{history::MoveHistory, intent::TargetParams},
    oracle::{Color, MoveResult, Piece, PieceKind, Position, Square},
};

pub use offensive::{on_capture, CaptureTriggers};

/// Everything a handler may read or touch while resolving one card.
pub struct EffectContext<'a> {
    pub position: &'a mut Position,
    pub registry: &'a mut EffectRegistry,
    pub captured: &'a mut CapturedPool,
    pub history: &'a mut MoveHistory,
    pub requester: Uuid,
    pub color: Color,
    pub prior_move: Option<MoveResult>,
    pub target: &'a TargetParams,
    /// The requester's other playable cards.
    pub hand: &'a [CardInstance],
    pub rng: &'a mut StdRng,
    pub settings: &'a GameSettings,
}

impl EffectContext<'_> {
    pub fn opponent(&self) -> Color {
        self.color.opposite()
    }

    fn target_square(&self) -> Option<Square> {
        self.target.square
    }

    /// Requester's piece on the target square, if its kind is acceptable.
    fn own_target(&self, kinds: &[PieceKind]) -> Option<(Square, Piece)> {
        let square = self.target_square()?;
        let piece = self.position.piece_at(square)?;
        (piece.color == self.color && kinds.contains(&piece.kind)).then_some((square, piece))
    }

    fn enemy_target(&self, kinds: &[PieceKind]) -> Option<(Square, Piece)> {
        let square = self.target_square()?;
        let piece = self.position.piece_at(square)?;
        (piece.color != self.color && kinds.contains(&piece.kind)).then_some((square, piece))
    }

    /// Removes a piece from the board as an effect kill: it enters the
    /// captured pool and its piece-bound registry entries go with it.
    fn destroy(&mut self, square: Square) -> Option<Piece> {
        let piece = self.position.piece_at(square)?;
        if piece.kind == PieceKind::King {
            return None;
        }
        self.position.edit(|editor| editor.remove(square))?;
        self.captured.push(piece);
        self.registry.forget(square);
        Some(piece)
    }
}

const NON_KING: [PieceKind; 5] = [
    PieceKind::Pawn,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
];

/// Hand or turn consequences the engine applies after a successful handler.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUp {
    Draw(u32),
    Discard(Uuid),
    Reveal(Vec<CardId>),
    Rewound { last_move: Option<MoveResult> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectOutcome {
    pub params: Value,
    pub follow_ups: Vec<FollowUp>,
}

impl EffectOutcome {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            follow_ups: Vec::new(),
        }
    }

    pub fn with(mut self, follow_up: FollowUp) -> Self {
        self.follow_ups.push(follow_up);
        self
    }
}

pub type Handler = fn(&mut EffectContext<'_>) -> Option<EffectOutcome>;

static HANDLERS: Lazy<HashMap<CardId, Handler>> = Lazy::new(|| {
    let mut table: HashMap<CardId, Handler> = HashMap::new();
    protective::register(&mut table);
    offensive::register(&mut table);
    movement::register(&mut table);
    board_edit::register(&mut table);
    information::register(&mut table);
    meta::register(&mut table);
    table
});

pub fn handler_for(card: CardId) -> Option<Handler> {
    HANDLERS.get(&card).copied()
}

/// Resolves `card`. `None` means the card had no effect and must not be
/// consumed.
pub fn apply(card: CardId, ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let handler = handler_for(card)?;
    handler(ctx)
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::SeedableRng;

    use super::*;

    /// Owned state a handler test borrows an [`EffectContext`] from.
    pub struct Bench {
        pub position: Position,
        pub registry: EffectRegistry,
        pub captured: CapturedPool,
        pub history: MoveHistory,
        pub rng: StdRng,
        pub settings: GameSettings,
        pub hand: Vec<CardInstance>,
        pub prior_move: Option<MoveResult>,
    }

    impl Bench {
        pub fn new(fen: &str) -> Self {
            Self {
                position: Position::from_fen(fen).unwrap(),
                registry: EffectRegistry::new(),
                captured: CapturedPool::default(),
                history: MoveHistory::new(16),
                rng: StdRng::seed_from_u64(42),
                settings: GameSettings::default(),
                hand: Vec::new(),
                prior_move: None,
            }
        }

        pub fn apply(&mut self, card: CardId, color: Color, target: TargetParams) -> Option<EffectOutcome> {
            let mut ctx = EffectContext {
                position: &mut self.position,
                registry: &mut self.registry,
                captured: &mut self.captured,
                history: &mut self.history,
                requester: Uuid::nil(),
                color,
                prior_move: self.prior_move,
                target: &target,
                hand: &self.hand,
                rng: &mut self.rng,
                settings: &self.settings,
            };
            apply(card, &mut ctx)
        }
    }

    pub fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }
}
