use std::collections::HashMap;

use serde_json::json;

use super::{EffectContext, EffectOutcome, Handler};
use crate::{
    arcana::CardId,
    effect::{EchoPattern, ExtraMoveGrant, TurnFlags},
    oracle::PieceKind,
};

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::PhantomStep, phantom_step);
    table.insert(CardId::SpectralMarch, spectral_march);
    table.insert(CardId::PawnRush, pawn_rush);
    table.insert(CardId::Sharpshooter, sharpshooter);
    table.insert(CardId::TemporalEcho, temporal_echo);
    table.insert(CardId::EnPassantMaster, en_passant_master);
    table.insert(CardId::FirstStrike, first_strike);
    table.insert(CardId::QueensGambit, queens_gambit);
}

fn enable(
    ctx: &mut EffectContext<'_>,
    card: CardId,
    flag: fn(&mut TurnFlags) -> &mut bool,
) -> Option<EffectOutcome> {
    let slot = flag(&mut ctx.registry.flags[ctx.color]);
    if *slot {
        return None;
    }
    *slot = true;
    Some(EffectOutcome::new(json!({ "enabled": card })))
}

fn phantom_step(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    enable(ctx, CardId::PhantomStep, |f| &mut f.phantom_step)
}

fn spectral_march(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    enable(ctx, CardId::SpectralMarch, |f| &mut f.spectral_march)
}

fn pawn_rush(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    enable(ctx, CardId::PawnRush, |f| &mut f.pawn_rush)
}

fn sharpshooter(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    enable(ctx, CardId::Sharpshooter, |f| &mut f.sharpshooter)
}

fn en_passant_master(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    enable(ctx, CardId::EnPassantMaster, |f| &mut f.en_passant_master)
}

/// Captures the delta of the most recent move so any of the caster's pieces
/// may replay it this turn.
fn temporal_echo(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let prior = ctx.prior_move?;
    let (file_delta, rank_delta) = prior.delta();
    ctx.registry.echo = Some(EchoPattern {
        owner: ctx.color,
        file_delta,
        rank_delta,
    });
    ctx.registry.flags[ctx.color].temporal_echo = true;
    Some(EffectOutcome::new(json!({
        "fileDelta": file_delta,
        "rankDelta": rank_delta,
    })))
}

fn first_strike(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    if ctx.registry.extra_moves[ctx.color].is_some() {
        return None;
    }
    ctx.registry.extra_moves[ctx.color] = Some(ExtraMoveGrant {
        source: CardId::FirstStrike,
        capture_away_from: None,
    });
    Some(EffectOutcome::new(json!({ "extraMove": true })))
}

fn queens_gambit(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    if ctx.registry.extra_moves[ctx.color].is_some() {
        return None;
    }
    let queen = match ctx.own_target(&[PieceKind::Queen]) {
        Some((square, _)) => square,
        None => ctx
            .position
            .pieces(ctx.color)
            .into_iter()
            .find(|(_, p)| p.kind == PieceKind::Queen)
            .map(|(sq, _)| sq)?,
    };
    ctx.destroy(queen)?;
    ctx.registry.extra_moves[ctx.color] = Some(ExtraMoveGrant {
        source: CardId::QueensGambit,
        capture_away_from: None,
    });
    Some(EffectOutcome::new(
        json!({ "sacrificed": queen, "extraMove": true }),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{sq, Bench};
    use crate::{
        arcana::CardId,
        game::intent::TargetParams,
        oracle::{Color, MoveResult, PieceKind},
    };

    #[test]
    fn echo_needs_a_prior_move() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::TemporalEcho, Color::White, TargetParams::default())
            .is_none());

        bench.prior_move = Some(MoveResult {
            color: Color::Black,
            from: sq("g8"),
            to: sq("f6"),
            piece: PieceKind::Knight,
            captured: None,
            capture_square: None,
            promotion: None,
            special: None,
        });
        let outcome = bench
            .apply(CardId::TemporalEcho, Color::White, TargetParams::default())
            .unwrap();
        assert_eq!(outcome.params["fileDelta"], -1);
        assert_eq!(outcome.params["rankDelta"], -2);
        assert_eq!(bench.registry.echo.unwrap().owner, Color::White);
    }

    #[test]
    fn queens_gambit_spends_the_queen() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        bench
            .apply(CardId::QueensGambit, Color::White, TargetParams::default())
            .unwrap();
        assert!(bench.position.piece_at(sq("d1")).is_none());
        assert_eq!(bench.captured.lost(Color::White), &[PieceKind::Queen]);
        assert!(bench.registry.extra_moves[Color::White].is_some());
    }

    #[test]
    fn queens_gambit_without_a_queen_does_nothing() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::QueensGambit, Color::White, TargetParams::default())
            .is_none());
        assert!(bench.registry.extra_moves[Color::White].is_none());
    }

    #[test]
    fn first_strike_does_not_stack_grants() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::FirstStrike, Color::White, TargetParams::default())
            .is_some());
        assert!(bench
            .apply(CardId::FirstStrike, Color::White, TargetParams::default())
            .is_none());
    }
}
