use std::collections::HashMap;

use serde_json::json;

use super::{EffectContext, EffectOutcome, Handler};
use crate::{arcana::CardId, oracle::LegalMove};

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::Vision, vision);
    table.insert(CardId::LineOfSight, line_of_sight);
    table.insert(CardId::Prophecy, prophecy);
    table.insert(CardId::FogOfWar, fog_of_war);
}

// 정보 카드는 보드를 바꾸지 않는다. 결과는 사용자에게만 전달된다.

fn opponent_moves(ctx: &EffectContext<'_>) -> Vec<LegalMove> {
    ctx.position.legal_moves_for(ctx.opponent())
}

fn vision(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let moves = opponent_moves(ctx);
    Some(EffectOutcome::new(json!({ "moves": moves })))
}

fn line_of_sight(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let threatened: Vec<_> = ctx
        .position
        .threatened_pieces(ctx.color)
        .into_iter()
        .map(|(square, piece)| json!({ "square": square, "piece": piece.kind }))
        .collect();
    Some(EffectOutcome::new(json!({ "threatened": threatened })))
}

fn prophecy(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let captures: Vec<LegalMove> = opponent_moves(ctx)
        .into_iter()
        .filter(LegalMove::is_capture)
        .collect();
    Some(EffectOutcome::new(json!({ "captures": captures })))
}

fn fog_of_war(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    if ctx.registry.fog[ctx.color] {
        return None;
    }
    ctx.registry.fog[ctx.color] = true;
    Some(EffectOutcome::new(json!({ "hidden": ctx.color })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Bench;
    use crate::{arcana::CardId, game::intent::TargetParams, oracle::Color};

    #[test]
    fn vision_lists_the_opponents_moves_without_changing_the_turn() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        let outcome = bench
            .apply(CardId::Vision, Color::White, TargetParams::default())
            .unwrap();
        assert_eq!(outcome.params["moves"].as_array().unwrap().len(), 5);
        assert_eq!(bench.position.side_to_move(), Color::White);
    }

    #[test]
    fn prophecy_keeps_only_captures() {
        let mut bench = Bench::new("4k3/8/8/8/8/2p5/1P6/4K3 w - - 0 1");
        let outcome = bench
            .apply(CardId::Prophecy, Color::White, TargetParams::default())
            .unwrap();
        let captures = outcome.params["captures"].as_array().unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0]["to"], "b2");
    }

    #[test]
    fn line_of_sight_reports_attacked_pieces() {
        let mut bench = Bench::new("4k3/8/8/8/8/2p5/1P6/4K3 w - - 0 1");
        let outcome = bench
            .apply(CardId::LineOfSight, Color::White, TargetParams::default())
            .unwrap();
        assert_eq!(outcome.params["threatened"][0]["square"], "b2");
    }

    #[test]
    fn fog_cannot_be_recast_while_active() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::FogOfWar, Color::White, TargetParams::default())
            .is_some());
        assert!(bench
            .apply(CardId::FogOfWar, Color::White, TargetParams::default())
            .is_none());
        assert!(bench.registry.fog[Color::White]);
        assert!(!bench.registry.fog[Color::Black]);
    }

    #[test]
    fn both_sides_can_hold_fog_at_once() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        bench
            .apply(CardId::FogOfWar, Color::White, TargetParams::default())
            .unwrap();
        bench
            .apply(CardId::FogOfWar, Color::Black, TargetParams::default())
            .unwrap();
        assert!(bench.registry.fog[Color::White]);
        assert!(bench.registry.fog[Color::Black]);
    }
}
