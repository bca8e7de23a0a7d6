use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde_json::json;
use tracing::debug;

use super::{EffectContext, EffectOutcome, Handler, NON_KING};
use crate::{
    arcana::CardId,
    effect::{MindControl, Mirror},
    oracle::{Color, Piece, PieceKind, Position, Square},
};

// 시전 턴을 닫는 감쇠도 한 번으로 센다. 3 이면 상대 응수 뒤 시전자의 다음 턴까지 유지.
const MIRROR_TURNS: u32 = 3;
const MIND_CONTROL_TURNS: u32 = 3;
const CASTLE_LOCK_TURNS: u32 = 3;
const CHAOS_PIECES_PER_SIDE: usize = 3;
const CHAOS_ATTEMPTS: usize = 20;

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::Execution, execution);
    table.insert(CardId::PromotionRitual, promotion_ritual);
    table.insert(CardId::Metamorphosis, metamorphosis);
    table.insert(CardId::MirrorImage, mirror_image);
    table.insert(CardId::Necromancy, necromancy);
    table.insert(CardId::RoyalSwap, royal_swap);
    table.insert(CardId::ChaosTheory, chaos_theory);
    table.insert(CardId::MindControl, mind_control);
    table.insert(CardId::CastleBreaker, castle_breaker);
    table.insert(CardId::TimeFreeze, time_freeze);
}

/// Removes an enemy piece outright. Capture protections do not apply.
fn execution(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, _) = ctx.enemy_target(&NON_KING)?;
    let piece = ctx.destroy(square)?;
    Some(EffectOutcome::new(
        json!({ "square": square, "piece": piece.kind }),
    ))
}

fn promotion_ritual(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, _) = ctx.own_target(&[PieceKind::Pawn])?;
    let color = ctx.color;
    ctx.position.edit(|editor| {
        editor.put(square, Piece::new(PieceKind::Queen, color));
        Some(())
    })?;
    Some(EffectOutcome::new(
        json!({ "square": square, "promotedTo": PieceKind::Queen }),
    ))
}

fn metamorphosis(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, piece) = ctx.own_target(&NON_KING)?;
    let into = ctx.target.piece_type?;
    if into == PieceKind::King || into == piece.kind {
        return None;
    }
    let color = ctx.color;
    ctx.position.edit(|editor| {
        editor.put(square, Piece::new(into, color));
        Some(())
    })?;
    // a mirror copy that changed shape is no longer the copy decay expects
    ctx.registry.mirrors.retain(|m| m.square != square);
    Some(EffectOutcome::new(
        json!({ "square": square, "from": piece.kind, "to": into }),
    ))
}

fn mirror_image(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (source, piece) = ctx.own_target(&NON_KING)?;
    let destination = ctx.target.destination?;
    if !source.is_adjacent(destination) || ctx.position.piece_at(destination).is_some() {
        return None;
    }
    ctx.position.edit(|editor| {
        editor.put(destination, piece);
        Some(())
    })?;
    ctx.registry.mirrors.push(Mirror {
        square: destination,
        piece,
        turns_remaining: MIRROR_TURNS,
    });
    Some(EffectOutcome::new(json!({
        "source": source,
        "copy": destination,
        "piece": piece.kind,
        "turns": MIRROR_TURNS,
    })))
}

fn necromancy(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let square = ctx.target_square()?;
    let kind = ctx.target.piece_type?;
    let color = ctx.color;
    if kind == PieceKind::King
        || !color.owns_rank(square.rank())
        || ctx.position.piece_at(square).is_some()
        || !ctx.captured.lost(color).contains(&kind)
    {
        return None;
    }
    ctx.position.edit(|editor| {
        editor.put(square, Piece::new(kind, color));
        Some(())
    })?;
    ctx.captured.take(color, kind);
    Some(EffectOutcome::new(
        json!({ "square": square, "piece": kind }),
    ))
}

fn royal_swap(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (pawn, pawn_piece) = ctx.own_target(&[PieceKind::Pawn])?;
    let king = ctx.position.king_square(ctx.color)?;
    let king_piece = Piece::new(PieceKind::King, ctx.color);
    ctx.position.edit(|editor| {
        editor.put(king, pawn_piece);
        editor.put(pawn, king_piece);
        Some(())
    })?;
    ctx.registry.swap(pawn, king);
    Some(EffectOutcome::new(json!({ "king": pawn, "pawn": king })))
}

/// Scatters up to three non-king pieces per side onto squares that were empty
/// before the shuffle. Placements the oracle rejects, or that would leave the
/// caster unable to hand over the turn, are redrawn a bounded number of times.
fn chaos_theory(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let mut movers: Vec<Square> = Vec::new();
    for color in Color::BOTH {
        let candidates: Vec<Square> = ctx
            .position
            .pieces(color)
            .into_iter()
            .filter(|(_, p)| p.kind != PieceKind::King)
            .map(|(sq, _)| sq)
            .collect();
        movers.extend(
            candidates
                .choose_multiple(ctx.rng, CHAOS_PIECES_PER_SIDE)
                .copied(),
        );
    }
    if movers.is_empty() {
        return None;
    }
    let empty: Vec<Square> = Square::all()
        .filter(|&sq| ctx.position.piece_at(sq).is_none())
        .collect();
    if empty.len() < movers.len() {
        return None;
    }

    let opponent = ctx.opponent();
    for attempt in 1..=CHAOS_ATTEMPTS {
        let mut pool = empty.clone();
        pool.shuffle(ctx.rng);
        let Some(plan) = assign(&*ctx.position, &movers, pool) else {
            continue;
        };

        let mut trial = *ctx.position;
        let placed = trial.edit(|editor| {
            for &(from, to) in &plan {
                editor.relocate(from, to)?;
            }
            Some(())
        });
        if placed.is_none() {
            continue;
        }
        let mut handover = trial;
        if handover.set_side_to_move(opponent).is_err() {
            continue;
        }

        *ctx.position = trial;
        for &(from, to) in &plan {
            ctx.registry.relocate(from, to);
        }
        debug!("chaos theory settled after {} attempt(s)", attempt);
        let moved: Vec<_> = plan
            .iter()
            .map(|(from, to)| json!({ "from": from, "to": to }))
            .collect();
        return Some(EffectOutcome::new(json!({ "moved": moved })));
    }
    None
}

/// Pairs each mover with the first remaining square it may stand on. Pawns
/// never land on a back rank.
fn assign(
    position: &Position,
    movers: &[Square],
    mut pool: Vec<Square>,
) -> Option<Vec<(Square, Square)>> {
    let mut plan = Vec::with_capacity(movers.len());
    for &from in movers {
        let is_pawn = matches!(position.piece_at(from), Some(p) if p.kind == PieceKind::Pawn);
        let slot = pool
            .iter()
            .position(|sq| !is_pawn || (1..=6).contains(&sq.rank()))?;
        plan.push((from, pool.remove(slot)));
    }
    Some(plan)
}

fn mind_control(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, piece) = ctx.enemy_target(&[
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
    ])?;
    if ctx.registry.is_controlled(square) {
        return None;
    }
    let color = ctx.color;
    ctx.position.edit(|editor| {
        editor.put(square, Piece::new(piece.kind, color));
        Some(())
    })?;
    ctx.registry.mind_controls.push(MindControl {
        square,
        original: piece.color,
        turns_remaining: MIND_CONTROL_TURNS,
    });
    Some(EffectOutcome::new(json!({
        "square": square,
        "piece": piece.kind,
        "turns": MIND_CONTROL_TURNS,
    })))
}

fn castle_breaker(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let opponent = ctx.opponent();
    if ctx.registry.castling_locks[opponent] >= CASTLE_LOCK_TURNS {
        return None;
    }
    ctx.registry.castling_locks[opponent] = CASTLE_LOCK_TURNS;
    Some(EffectOutcome::new(
        json!({ "locked": opponent, "turns": CASTLE_LOCK_TURNS }),
    ))
}

fn time_freeze(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let opponent = ctx.opponent();
    if ctx.registry.frozen[opponent] {
        return None;
    }
    ctx.registry.frozen[opponent] = true;
    Some(EffectOutcome::new(json!({ "frozen": opponent })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{sq, Bench};
    use crate::{
        arcana::CardId,
        effect::Poison,
        game::intent::TargetParams,
        oracle::{Color, Piece, PieceKind},
    };

    #[test]
    fn execution_ignores_protection_but_spares_kings() {
        let mut bench = Bench::new("4k3/8/2n5/8/8/8/8/4K3 w - - 0 1");
        bench.registry.sanctuaries.push(crate::effect::TimedSquare {
            square: sq("c6"),
            owner: Color::Black,
            turns_remaining: 2,
        });
        assert!(bench
            .apply(CardId::Execution, Color::White, TargetParams::square(sq("e8")))
            .is_none());
        bench
            .apply(CardId::Execution, Color::White, TargetParams::square(sq("c6")))
            .unwrap();
        assert!(bench.position.piece_at(sq("c6")).is_none());
        assert_eq!(bench.captured.lost(Color::Black), &[PieceKind::Knight]);
    }

    #[test]
    fn promotion_that_gives_check_is_rejected() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/4P3/K7 w - - 0 1");
        assert!(bench
            .apply(CardId::PromotionRitual, Color::White, TargetParams::square(sq("e2")))
            .is_none());

        let mut bench = Bench::new("k7/8/8/8/8/7P/8/K7 w - - 0 1");
        bench
            .apply(CardId::PromotionRitual, Color::White, TargetParams::square(sq("h3")))
            .unwrap();
        assert_eq!(
            bench.position.piece_at(sq("h3")),
            Some(Piece::new(PieceKind::Queen, Color::White))
        );
    }

    #[test]
    fn metamorphosis_refuses_kings_and_same_kind() {
        let mut bench = Bench::new("k7/8/8/8/8/8/8/K1N5 w - - 0 1");
        let mut target = TargetParams::square(sq("c1"));
        target.piece_type = Some(PieceKind::King);
        assert!(bench
            .apply(CardId::Metamorphosis, Color::White, target.clone())
            .is_none());
        target.piece_type = Some(PieceKind::Knight);
        assert!(bench
            .apply(CardId::Metamorphosis, Color::White, target.clone())
            .is_none());
        target.piece_type = Some(PieceKind::Pawn);
        assert!(bench
            .apply(CardId::Metamorphosis, Color::White, target.clone())
            .is_none());
        target.piece_type = Some(PieceKind::Bishop);
        bench
            .apply(CardId::Metamorphosis, Color::White, target)
            .unwrap();
        assert_eq!(
            bench.position.piece_at(sq("c1")),
            Some(Piece::new(PieceKind::Bishop, Color::White))
        );
    }

    #[test]
    fn mirror_copy_lands_on_an_adjacent_empty_square() {
        let mut bench = Bench::new("k7/8/8/8/3N4/8/8/K7 w - - 0 1");
        let mut target = TargetParams::square(sq("d4"));
        target.destination = Some(sq("f4"));
        assert!(bench
            .apply(CardId::MirrorImage, Color::White, target.clone())
            .is_none());
        target.destination = Some(sq("e4"));
        bench
            .apply(CardId::MirrorImage, Color::White, target)
            .unwrap();
        assert_eq!(bench.registry.mirrors[0].square, sq("e4"));
        assert_eq!(bench.registry.mirrors[0].turns_remaining, 3);
    }

    #[test]
    fn necromancy_needs_a_lost_piece_and_own_half() {
        let mut bench = Bench::new("k7/8/8/8/8/8/8/K7 w - - 0 1");
        let mut target = TargetParams::square(sq("d2"));
        target.piece_type = Some(PieceKind::Rook);
        assert!(bench
            .apply(CardId::Necromancy, Color::White, target.clone())
            .is_none());

        bench.captured.push(Piece::new(PieceKind::Rook, Color::White));
        let mut enemy_half = target.clone();
        enemy_half.square = Some(sq("d6"));
        assert!(bench
            .apply(CardId::Necromancy, Color::White, enemy_half)
            .is_none());

        bench
            .apply(CardId::Necromancy, Color::White, target)
            .unwrap();
        assert!(bench.captured.lost(Color::White).is_empty());
    }

    #[test]
    fn royal_swap_carries_piece_bound_effects() {
        let mut bench = Bench::new("k7/8/8/8/8/4K3/2P5/8 w - - 0 1");
        bench.registry.poisons.push(Poison {
            square: sq("c2"),
            applied_by: Color::Black,
            turns_remaining: 2,
        });
        bench
            .apply(CardId::RoyalSwap, Color::White, TargetParams::square(sq("c2")))
            .unwrap();
        assert_eq!(bench.position.king_square(Color::White), Some(sq("c2")));
        assert!(bench.registry.has_poison(sq("e3")));
    }

    #[test]
    fn chaos_theory_keeps_kings_and_piece_count() {
        let mut bench = Bench::new("4k3/1pp5/8/8/8/8/1PP5/4K3 w - - 0 1");
        let before: usize = [Color::White, Color::Black]
            .iter()
            .map(|&c| bench.position.pieces(c).len())
            .sum();
        bench
            .apply(CardId::ChaosTheory, Color::White, TargetParams::default())
            .unwrap();
        let after: usize = [Color::White, Color::Black]
            .iter()
            .map(|&c| bench.position.pieces(c).len())
            .sum();
        assert_eq!(before, after);
        assert_eq!(bench.position.king_square(Color::White), Some(sq("e1")));
        assert_eq!(bench.position.king_square(Color::Black), Some(sq("e8")));
    }

    #[test]
    fn mind_control_skips_queens() {
        let mut bench = Bench::new("k7/8/8/3q4/8/5n2/8/K7 w - - 0 1");
        assert!(bench
            .apply(CardId::MindControl, Color::White, TargetParams::square(sq("d5")))
            .is_none());
        bench
            .apply(CardId::MindControl, Color::White, TargetParams::square(sq("f3")))
            .unwrap();
        assert_eq!(
            bench.position.piece_at(sq("f3")),
            Some(Piece::new(PieceKind::Knight, Color::White))
        );
        assert_eq!(bench.registry.mind_controls[0].original, Color::Black);
    }

    #[test]
    fn time_freeze_targets_the_opponent_once() {
        let mut bench = Bench::new("k7/8/8/8/8/8/8/K7 w - - 0 1");
        bench
            .apply(CardId::TimeFreeze, Color::White, TargetParams::default())
            .unwrap();
        assert!(bench.registry.frozen[Color::Black]);
        assert!(bench
            .apply(CardId::TimeFreeze, Color::White, TargetParams::default())
            .is_none());
    }
}
