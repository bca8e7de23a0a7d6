//! Move Validator for arcana-licensed movement.
//!
//! Each movement rule is an independent predicate, consulted only when the
//! mover holds the matching one-turn flag. A predicate returns a synthetic
//! [`LegalMove`] shaped exactly like one from the oracle's own generator.

use serde::{Deserialize, Serialize};

use crate::{
    effect::EffectRegistry,
    oracle::{Color, LegalMove, Piece, PieceKind, Position, SpecialFlag, Square, KNIGHT_STEPS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcanaRule {
    PhantomStep,
    SpectralMarch,
    PawnRush,
    Sharpshooter,
    TemporalEcho,
    EnPassantMaster,
}

impl ArcanaRule {
    const ORDER: [ArcanaRule; 6] = [
        ArcanaRule::PawnRush,
        ArcanaRule::EnPassantMaster,
        ArcanaRule::Sharpshooter,
        ArcanaRule::SpectralMarch,
        ArcanaRule::PhantomStep,
        ArcanaRule::TemporalEcho,
    ];

    fn enabled(self, registry: &EffectRegistry, mover: Color) -> bool {
        let flags = &registry.flags[mover];
        match self {
            ArcanaRule::PhantomStep => flags.phantom_step,
            ArcanaRule::SpectralMarch => flags.spectral_march,
            ArcanaRule::PawnRush => flags.pawn_rush,
            ArcanaRule::Sharpshooter => flags.sharpshooter,
            ArcanaRule::TemporalEcho => {
                flags.temporal_echo && matches!(registry.echo, Some(e) if e.owner == mover)
            }
            ArcanaRule::EnPassantMaster => flags.en_passant_master,
        }
    }

    fn check(self, candidate: &Candidate<'_>, registry: &EffectRegistry) -> Option<LegalMove> {
        match self {
            ArcanaRule::PhantomStep => knight_pattern(candidate),
            ArcanaRule::SpectralMarch => slide_through_friend(candidate),
            ArcanaRule::PawnRush => pawn_rush(candidate),
            ArcanaRule::Sharpshooter => diagonal_snipe(candidate),
            ArcanaRule::TemporalEcho => registry
                .echo
                .and_then(|e| echo_delta(candidate, e.file_delta, e.rank_delta)),
            ArcanaRule::EnPassantMaster => extended_en_passant(candidate),
        }
    }
}

struct Candidate<'a> {
    position: &'a Position,
    from: Square,
    to: Square,
    piece: Piece,
    target: Option<Piece>,
    delta: (i8, i8),
    promotion: Option<PieceKind>,
}

impl Candidate<'_> {
    fn target_is_capturable(&self) -> bool {
        match self.target {
            None => true,
            Some(p) => p.color != self.piece.color && p.kind != PieceKind::King,
        }
    }

    fn path_is_clear(&self) -> bool {
        self.from
            .between(self.to)
            .iter()
            .all(|&sq| self.position.piece_at(sq).is_none())
    }

    fn synthesize(&self, capture_square: Option<Square>, special: Option<SpecialFlag>) -> LegalMove {
        let captured = capture_square
            .and_then(|sq| self.position.piece_at(sq))
            .map(|p| p.kind);
        let promotes = self.piece.kind == PieceKind::Pawn
            && self.to.rank() == self.piece.color.promotion_rank();
        let promotion = promotes.then(|| self.promotion.unwrap_or(PieceKind::Queen));
        LegalMove {
            from: self.from,
            to: self.to,
            piece: self.piece.kind,
            captured,
            capture_square,
            promotion,
            special: if promotes {
                Some(SpecialFlag::Promotion)
            } else {
                special
            },
        }
    }

    fn plain(&self) -> LegalMove {
        self.synthesize(self.target.map(|_| self.to), None)
    }
}

/// Returns the synthetic move licensed by the first enabled arcana rule
/// together with that rule, or `None` when no rule allows the request.
pub fn validate(
    position: &Position,
    request: &MoveRequest,
    registry: &EffectRegistry,
    mover: Color,
) -> Option<(LegalMove, ArcanaRule)> {
    if request.from == request.to {
        return None;
    }
    let piece = position.piece_at(request.from)?;
    if piece.color != mover {
        return None;
    }
    let candidate = Candidate {
        position,
        from: request.from,
        to: request.to,
        piece,
        target: position.piece_at(request.to),
        delta: request.from.delta_to(request.to),
        promotion: request.promotion,
    };
    if !candidate.target_is_capturable() {
        return None;
    }

    ArcanaRule::ORDER
        .iter()
        .filter(|rule| rule.enabled(registry, mover))
        .find_map(|&rule| rule.check(&candidate, registry).map(|mv| (mv, rule)))
        .filter(|(mv, _)| !registry.capture_blocked_by_sanctuary(mv))
}

fn knight_pattern(c: &Candidate<'_>) -> Option<LegalMove> {
    if c.piece.kind == PieceKind::King || !KNIGHT_STEPS.contains(&c.delta) {
        return None;
    }
    Some(c.plain())
}

fn slide_through_friend(c: &Candidate<'_>) -> Option<LegalMove> {
    if !matches!(c.piece.kind, PieceKind::Rook | PieceKind::Queen) {
        return None;
    }
    let (df, dr) = c.delta;
    if df != 0 && dr != 0 {
        return None;
    }
    let blockers: Vec<Piece> = c
        .from
        .between(c.to)
        .iter()
        .filter_map(|&sq| c.position.piece_at(sq))
        .collect();
    match blockers.as_slice() {
        [only] if only.color == c.piece.color => Some(c.plain()),
        _ => None,
    }
}

fn pawn_rush(c: &Candidate<'_>) -> Option<LegalMove> {
    let forward = c.piece.color.forward();
    if c.piece.kind != PieceKind::Pawn || c.delta != (0, 2 * forward) {
        return None;
    }
    if c.target.is_some() || !c.path_is_clear() {
        return None;
    }
    Some(c.synthesize(None, Some(SpecialFlag::DoublePush)))
}

fn diagonal_snipe(c: &Candidate<'_>) -> Option<LegalMove> {
    if !matches!(c.piece.kind, PieceKind::Bishop | PieceKind::Queen) {
        return None;
    }
    let (df, dr) = c.delta;
    if df.abs() != dr.abs() || c.target.is_none() {
        return None;
    }
    Some(c.plain())
}

/// Sliding deltas (rank, file or diagonal lines) need a clear path; leaping
/// deltas ignore occupancy.
fn echo_delta(c: &Candidate<'_>, file_delta: i8, rank_delta: i8) -> Option<LegalMove> {
    if c.piece.kind == PieceKind::King || c.delta != (file_delta, rank_delta) {
        return None;
    }
    let sliding = file_delta == 0 || rank_delta == 0 || file_delta.abs() == rank_delta.abs();
    if sliding && !c.path_is_clear() {
        return None;
    }
    Some(c.plain())
}

fn extended_en_passant(c: &Candidate<'_>) -> Option<LegalMove> {
    let forward = c.piece.color.forward();
    let (df, dr) = c.delta;
    if c.piece.kind != PieceKind::Pawn || df.abs() != 1 || dr != forward || c.target.is_some() {
        return None;
    }
    let victim_square = Square::new(c.to.file(), c.from.rank())?;
    let victim = c.position.piece_at(victim_square)?;
    if victim.kind != PieceKind::Pawn || victim.color == c.piece.color {
        return None;
    }
    Some(c.synthesize(Some(victim_square), Some(SpecialFlag::EnPassant)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EchoPattern, TimedSquare};

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn request(from: &str, to: &str) -> MoveRequest {
        MoveRequest {
            from: sq(from),
            to: sq(to),
            promotion: None,
        }
    }

    #[test]
    fn rules_are_inert_without_flags() {
        let position = Position::standard();
        let registry = EffectRegistry::new();
        assert!(validate(&position, &request("c1", "d3"), &registry, Color::White).is_none());
    }

    #[test]
    fn phantom_step_moves_bishop_like_a_knight() {
        let position = Position::standard();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].phantom_step = true;

        let (mv, rule) =
            validate(&position, &request("c1", "d3"), &registry, Color::White).unwrap();
        assert_eq!(rule, ArcanaRule::PhantomStep);
        assert_eq!(mv.piece, PieceKind::Bishop);
        assert!(mv.captured.is_none());
        assert!(validate(&position, &request("e1", "f3"), &registry, Color::White).is_none());
    }

    #[test]
    fn spectral_march_needs_exactly_one_friendly_blocker() {
        let position = Position::from_fen("4k3/8/8/8/P7/8/P7/R3K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].spectral_march = true;

        assert!(validate(&position, &request("a1", "a3"), &registry, Color::White).is_some());
        assert!(validate(&position, &request("a1", "a6"), &registry, Color::White).is_none());
    }

    #[test]
    fn pawn_rush_from_any_rank() {
        let position = Position::from_fen("4k3/8/8/8/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].pawn_rush = true;

        let (mv, _) = validate(&position, &request("e4", "e6"), &registry, Color::White).unwrap();
        assert_eq!(mv.special, Some(SpecialFlag::DoublePush));
    }

    #[test]
    fn sharpshooter_fires_through_pieces() {
        let position = Position::from_fen("4k3/8/5p2/8/3P4/8/1B6/4K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].sharpshooter = true;

        let (mv, _) = validate(&position, &request("b2", "f6"), &registry, Color::White).unwrap();
        assert_eq!(mv.captured, Some(PieceKind::Pawn));
        assert_eq!(mv.capture_square, Some(sq("f6")));
    }

    #[test]
    fn extended_en_passant_takes_adjacent_pawn() {
        let position = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].en_passant_master = true;

        let (mv, _) = validate(&position, &request("e5", "d6"), &registry, Color::White).unwrap();
        assert_eq!(mv.capture_square, Some(sq("d5")));
        assert_eq!(mv.special, Some(SpecialFlag::EnPassant));
    }

    #[test]
    fn echo_slide_is_blocked_but_leap_is_not() {
        let position = Position::standard();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].temporal_echo = true;
        registry.echo = Some(EchoPattern {
            owner: Color::White,
            file_delta: 0,
            rank_delta: 2,
        });
        assert!(validate(&position, &request("a1", "a3"), &registry, Color::White).is_none());

        registry.echo = Some(EchoPattern {
            owner: Color::White,
            file_delta: 1,
            rank_delta: 2,
        });
        let (mv, rule) =
            validate(&position, &request("c1", "d3"), &registry, Color::White).unwrap();
        assert_eq!(rule, ArcanaRule::TemporalEcho);
        assert_eq!(mv.piece, PieceKind::Bishop);
    }

    #[test]
    fn sanctuary_blocks_arcana_capture() {
        let position = Position::from_fen("4k3/8/5p2/8/3P4/8/1B6/4K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].sharpshooter = true;
        registry.sanctuaries.push(TimedSquare {
            square: sq("f6"),
            owner: Color::Black,
            turns_remaining: 2,
        });
        assert!(validate(&position, &request("b2", "f6"), &registry, Color::White).is_none());
    }

    #[test]
    fn never_captures_a_king() {
        let position = Position::from_fen("8/8/8/8/8/2k5/1N6/B3K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].sharpshooter = true;
        assert!(validate(&position, &request("a1", "c3"), &registry, Color::White).is_none());
    }

    #[test]
    fn sanctuary_on_the_landing_square_blocks_en_passant() {
        let position = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - - 0 1").unwrap();
        let mut registry = EffectRegistry::new();
        registry.flags[Color::White].en_passant_master = true;
        registry.sanctuaries.push(TimedSquare {
            square: sq("d6"),
            owner: Color::Black,
            turns_remaining: 2,
        });
        assert!(validate(&position, &request("e5", "d6"), &registry, Color::White).is_none());

        // 잡히는 폰이 선 칸도 마찬가지
        registry.sanctuaries[0].square = sq("d5");
        assert!(validate(&position, &request("e5", "d6"), &registry, Color::White).is_none());
    }
}
