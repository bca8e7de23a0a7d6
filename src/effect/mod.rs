//! Effect Registry: everything arcana leave behind on a match between turns.
//!
//! Entries come in three shapes. One-turn flags are wiped by every decay pass.
//! Duration-counted collections tick down once per decay pass and apply their
//! terminal consequence on removal. Singletons (echo pattern, extra-move
//! grant, freeze, fog, divine ward) are set by one card and cleared by
//! consumption or decay.

pub mod decay;
pub mod types;

use serde::{Deserialize, Serialize};

use crate::oracle::{Color, LegalMove, Piece, PieceKind, Position, Square};

pub use decay::{run_decay_pass, DecayReport};
pub use types::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRegistry {
    pub flags: ColorMap<TurnFlags>,
    /// Keyed by the owner. A new shield replaces the previous one.
    pub shields: ColorMap<Option<Shield>>,
    pub sanctuaries: Vec<TimedSquare>,
    pub cursed_squares: Vec<TimedSquare>,
    pub poisons: Vec<Poison>,
    pub mirrors: Vec<Mirror>,
    pub fortresses: Vec<Fortress>,
    pub blessings: Vec<Blessing>,
    pub mind_controls: Vec<MindControl>,
    pub echo: Option<EchoPattern>,
    pub extra_moves: ColorMap<Option<ExtraMoveGrant>>,
    /// While set, the color's granted move must capture away from this square.
    pub follow_up_capture: ColorMap<Option<Square>>,
    /// Remaining decay passes during which the color may not castle.
    pub castling_locks: ColorMap<u32>,
    pub frozen: ColorMap<bool>,
    /// Keyed by the caster. Both colors may hide their moves at once.
    pub fog: ColorMap<bool>,
    pub divine: ColorMap<Option<DivineWard>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_shield(&mut self, owner: Color, shield: Shield) {
        self.shields[owner] = Some(shield);
    }

    /// Why capturing `piece` on `square` is currently forbidden, if it is.
    pub fn protection_reason(&self, square: Square, piece: Piece) -> Option<&'static str> {
        if self.sanctuaries.iter().any(|s| s.square == square) {
            return Some("in a sanctuary");
        }
        if let Some(shield) = &self.shields[piece.color] {
            if shield.guarded_square(piece.color) == Some(square) {
                return Some("shielded");
            }
        }
        if piece.kind == PieceKind::Pawn
            && self.fortresses.iter().any(|f| f.owner == piece.color)
        {
            return Some("fortified");
        }
        if self
            .blessings
            .iter()
            .any(|b| b.owner == piece.color && b.squares.contains(&square))
        {
            return Some("blessed");
        }
        None
    }

    pub fn is_sanctuary(&self, square: Square) -> bool {
        self.sanctuaries.iter().any(|s| s.square == square)
    }

    /// A capture is barred when the victim stands in a sanctuary or the
    /// capturing piece would land in one. The two differ only for en passant.
    pub fn capture_blocked_by_sanctuary(&self, mv: &LegalMove) -> bool {
        match mv.capture_square {
            Some(victim) => self.is_sanctuary(victim) || self.is_sanctuary(mv.to),
            None => false,
        }
    }

    pub fn castling_locked(&self, color: Color) -> bool {
        self.castling_locks[color] > 0
    }

    pub fn has_poison(&self, square: Square) -> bool {
        self.poisons.iter().any(|p| p.square == square)
    }

    /// Re-keys piece-bound entries after the piece on `from` moved to `to`.
    /// Square-bound entries (sanctuary, curse, blessing, exact-square shield)
    /// stay where they are.
    pub fn relocate(&mut self, from: Square, to: Square) {
        for poison in self.poisons.iter_mut().filter(|p| p.square == from) {
            poison.square = to;
        }
        for mirror in self.mirrors.iter_mut().filter(|m| m.square == from) {
            mirror.square = to;
        }
        for control in self.mind_controls.iter_mut().filter(|c| c.square == from) {
            control.square = to;
        }
        for shield in [&mut self.shields.white, &mut self.shields.black]
            .into_iter()
            .flatten()
        {
            if shield.coverage == ShieldCoverage::BehindPawn(from) {
                shield.coverage = ShieldCoverage::BehindPawn(to);
            }
        }
    }

    /// Exchanges piece-bound entries between two squares whose pieces traded
    /// places.
    pub fn swap(&mut self, a: Square, b: Square) {
        let flip = |sq: &mut Square| {
            if *sq == a {
                *sq = b;
            } else if *sq == b {
                *sq = a;
            }
        };
        self.poisons.iter_mut().for_each(|p| flip(&mut p.square));
        self.mirrors.iter_mut().for_each(|m| flip(&mut m.square));
        self.mind_controls.iter_mut().for_each(|c| flip(&mut c.square));
        for shield in [&mut self.shields.white, &mut self.shields.black]
            .into_iter()
            .flatten()
        {
            if let ShieldCoverage::BehindPawn(pawn) = &mut shield.coverage {
                flip(pawn);
            }
        }
    }

    /// Drops piece-bound entries that no longer describe the board, after the
    /// position was replaced wholesale.
    pub fn prune_stale(&mut self, position: &Position) {
        self.poisons
            .retain(|p| matches!(position.piece_at(p.square), Some(piece) if piece.kind != PieceKind::King));
        self.mirrors
            .retain(|m| position.piece_at(m.square) == Some(m.piece));
        self.mind_controls
            .retain(|c| matches!(position.piece_at(c.square), Some(piece) if piece.color != c.original));
        for owner in Color::BOTH {
            if let Some(Shield {
                coverage: ShieldCoverage::BehindPawn(pawn),
                ..
            }) = self.shields[owner]
            {
                let pawn_present = position.piece_at(pawn) == Some(Piece::new(PieceKind::Pawn, owner));
                if !pawn_present {
                    self.shields[owner] = None;
                }
            }
        }
    }

    /// Drops piece-bound entries for a piece that left the board.
    pub fn forget(&mut self, square: Square) {
        self.poisons.retain(|p| p.square != square);
        self.mirrors.retain(|m| m.square != square);
        self.mind_controls.retain(|c| c.square != square);
        for owner in Color::BOTH {
            if matches!(self.shields[owner], Some(s) if s.coverage == ShieldCoverage::BehindPawn(square))
            {
                self.shields[owner] = None;
            }
        }
    }

    /// The curse that destroys `color`'s piece ending a move on `square`.
    pub fn curse_against(&self, square: Square, color: Color) -> Option<&TimedSquare> {
        self.cursed_squares
            .iter()
            .find(|c| c.square == square && c.owner != color)
    }

    pub fn take_extra_move(&mut self, color: Color) -> Option<ExtraMoveGrant> {
        self.extra_moves[color].take()
    }

    /// Whether the piece on `square` was mind-controlled into `color`'s army.
    pub fn is_controlled(&self, square: Square) -> bool {
        self.mind_controls.iter().any(|c| c.square == square)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcana::CardId;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn new_shield_replaces_previous() {
        let mut registry = EffectRegistry::new();
        registry.set_shield(
            Color::White,
            Shield {
                source: CardId::ShieldPawn,
                coverage: ShieldCoverage::Square(sq("e4")),
            },
        );
        registry.set_shield(
            Color::White,
            Shield {
                source: CardId::ShieldPawn,
                coverage: ShieldCoverage::Square(sq("d4")),
            },
        );
        let pawn = Piece::new(PieceKind::Pawn, Color::White);
        assert_eq!(registry.protection_reason(sq("e4"), pawn), None);
        assert_eq!(registry.protection_reason(sq("d4"), pawn), Some("shielded"));
    }

    #[test]
    fn pawn_guard_follows_the_pawn() {
        let mut registry = EffectRegistry::new();
        registry.set_shield(
            Color::White,
            Shield {
                source: CardId::PawnGuard,
                coverage: ShieldCoverage::BehindPawn(sq("e3")),
            },
        );
        let knight = Piece::new(PieceKind::Knight, Color::White);
        assert_eq!(registry.protection_reason(sq("e2"), knight), Some("shielded"));

        registry.relocate(sq("e3"), sq("e4"));
        assert_eq!(registry.protection_reason(sq("e2"), knight), None);
        assert_eq!(registry.protection_reason(sq("e3"), knight), Some("shielded"));
    }

    #[test]
    fn poison_follows_and_is_forgotten_with_its_piece() {
        let mut registry = EffectRegistry::new();
        registry.poisons.push(Poison {
            square: sq("c6"),
            applied_by: Color::White,
            turns_remaining: 3,
        });
        registry.relocate(sq("c6"), sq("d4"));
        assert!(registry.has_poison(sq("d4")));
        registry.forget(sq("d4"));
        assert!(registry.poisons.is_empty());
    }

    #[test]
    fn fortress_only_covers_owner_pawns() {
        let mut registry = EffectRegistry::new();
        registry.fortresses.push(Fortress {
            owner: Color::Black,
            turns_remaining: 2,
        });
        let black_pawn = Piece::new(PieceKind::Pawn, Color::Black);
        let black_rook = Piece::new(PieceKind::Rook, Color::Black);
        let white_pawn = Piece::new(PieceKind::Pawn, Color::White);
        assert_eq!(
            registry.protection_reason(sq("d5"), black_pawn),
            Some("fortified")
        );
        assert_eq!(registry.protection_reason(sq("a8"), black_rook), None);
        assert_eq!(registry.protection_reason(sq("d4"), white_pawn), None);
    }
}
