use std::{cmp::Reverse, collections::HashMap};

use serde::Serialize;
use serde_json::json;

use super::{EffectContext, EffectOutcome, Handler, NON_KING};
use crate::{
    arcana::CardId,
    effect::{CapturedPool, EffectRegistry, ExtraMoveGrant, Poison, TimedSquare, TurnFlags},
    oracle::{Color, Piece, PieceKind, Position, Square},
};

const POISON_TURNS: u32 = 3;
const CURSE_TURNS: u32 = 3;

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::PoisonTouch, poison_touch);
    table.insert(CardId::ChainLightning, chain_lightning);
    table.insert(CardId::FocusFire, focus_fire);
    table.insert(CardId::DoubleStrike, double_strike);
    table.insert(CardId::BerserkerRage, berserker_rage);
    table.insert(CardId::CursedSquare, cursed_square);
    table.insert(CardId::Plague, plague);
}

/// Arms a next-capture trigger. Arming one that is already armed is a no-op.
fn arm(
    ctx: &mut EffectContext<'_>,
    card: CardId,
    flag: fn(&mut TurnFlags) -> &mut bool,
) -> Option<EffectOutcome> {
    let slot = flag(&mut ctx.registry.flags[ctx.color]);
    if *slot {
        return None;
    }
    *slot = true;
    Some(EffectOutcome::new(json!({ "armed": card })))
}

fn poison_touch(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    arm(ctx, CardId::PoisonTouch, |f| &mut f.poison_touch)
}

fn chain_lightning(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    arm(ctx, CardId::ChainLightning, |f| &mut f.chain_lightning)
}

fn focus_fire(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    arm(ctx, CardId::FocusFire, |f| &mut f.focus_fire)
}

fn double_strike(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    arm(ctx, CardId::DoubleStrike, |f| &mut f.double_strike)
}

fn berserker_rage(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    arm(ctx, CardId::BerserkerRage, |f| &mut f.berserker_rage)
}

fn cursed_square(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let square = ctx.target_square()?;
    if ctx.position.piece_at(square).is_some()
        || ctx.registry.cursed_squares.iter().any(|c| c.square == square)
    {
        return None;
    }
    ctx.registry.cursed_squares.push(TimedSquare {
        square,
        owner: ctx.color,
        turns_remaining: CURSE_TURNS,
    });
    Some(EffectOutcome::new(
        json!({ "square": square, "turns": CURSE_TURNS }),
    ))
}

fn plague(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, piece) = ctx.enemy_target(&NON_KING)?;
    if ctx.registry.has_poison(square) {
        return None;
    }
    ctx.registry.poisons.push(Poison {
        square,
        applied_by: ctx.color,
        turns_remaining: POISON_TURNS,
    });
    Some(EffectOutcome::new(json!({
        "square": square,
        "piece": piece.kind,
        "turns": POISON_TURNS,
    })))
}

/// Secondary effects fired by a capture while next-capture triggers are armed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureTriggers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poisoned: Option<Square>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightning: Option<Square>,
    pub bonus_draws: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_move: Option<CardId>,
}

impl CaptureTriggers {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fires and disarms `color`'s next-capture triggers after a capture on
/// `capture_square` by the piece now standing on `landing`.
pub fn on_capture(
    position: &mut Position,
    registry: &mut EffectRegistry,
    captured: &mut CapturedPool,
    color: Color,
    capture_square: Square,
    landing: Square,
) -> CaptureTriggers {
    let mut fired = CaptureTriggers::default();
    let armed = std::mem::take(&mut registry.flags[color]);
    // movement flags stay for the rest of the turn
    registry.flags[color] = TurnFlags {
        phantom_step: armed.phantom_step,
        spectral_march: armed.spectral_march,
        pawn_rush: armed.pawn_rush,
        sharpshooter: armed.sharpshooter,
        temporal_echo: armed.temporal_echo,
        en_passant_master: armed.en_passant_master,
        ..TurnFlags::default()
    };

    let neighbors = |position: &Position| -> Vec<(Square, Piece)> {
        landing
            .neighbors()
            .filter_map(|sq| position.piece_at(sq).map(|p| (sq, p)))
            .filter(|(_, p)| p.color != color && p.kind != PieceKind::King)
            .collect()
    };

    if armed.poison_touch {
        let victim = neighbors(position)
            .into_iter()
            .find(|(sq, _)| !registry.has_poison(*sq));
        if let Some((square, _)) = victim {
            registry.poisons.push(Poison {
                square,
                applied_by: color,
                turns_remaining: POISON_TURNS,
            });
            fired.poisoned = Some(square);
        }
    }

    if armed.chain_lightning {
        let mut victims: Vec<(Square, Piece)> = neighbors(position)
            .into_iter()
            .filter(|(sq, p)| registry.protection_reason(*sq, *p).is_none())
            .collect();
        victims.sort_by_key(|(sq, p)| (Reverse(p.kind.value()), *sq));
        for (square, piece) in victims {
            if position.edit(|editor| editor.remove(square)).is_some() {
                captured.push(piece);
                registry.forget(square);
                fired.lightning = Some(square);
                break;
            }
        }
    }

    if armed.focus_fire {
        fired.bonus_draws += 1;
    }

    // 한 번의 잡기에는 추가 수 하나. double_strike 가 먼저 쓰이고,
    // 자리를 못 얻은 쪽은 다음 잡기까지 장전된 채 남는다.
    let grants = [
        (armed.double_strike, CardId::DoubleStrike, Some(capture_square)),
        (armed.berserker_rage, CardId::BerserkerRage, None),
    ];
    for (is_armed, source, capture_away_from) in grants {
        if !is_armed {
            continue;
        }
        if registry.extra_moves[color].is_none() {
            registry.extra_moves[color] = Some(ExtraMoveGrant {
                source,
                capture_away_from,
            });
            fired.extra_move = Some(source);
        } else {
            rearm(&mut registry.flags[color], source);
        }
    }

    fired
}

fn rearm(flags: &mut TurnFlags, source: CardId) {
    match source {
        CardId::DoubleStrike => flags.double_strike = true,
        CardId::BerserkerRage => flags.berserker_rage = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{sq, Bench};
    use crate::{arcana::CardId, game::intent::TargetParams, oracle::Color};

    #[test]
    fn arming_twice_is_a_no_op() {
        let mut bench = Bench::new("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::FocusFire, Color::White, TargetParams::default())
            .is_some());
        assert!(bench.registry.flags[Color::White].focus_fire);
        assert!(bench
            .apply(CardId::FocusFire, Color::White, TargetParams::default())
            .is_none());
    }

    #[test]
    fn plague_targets_enemy_non_king() {
        let mut bench = Bench::new("4k3/8/2n5/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::Plague, Color::White, TargetParams::square(sq("e8")))
            .is_none());
        let outcome = bench
            .apply(CardId::Plague, Color::White, TargetParams::square(sq("c6")))
            .unwrap();
        assert_eq!(outcome.params["turns"], 3);
        assert!(bench.registry.has_poison(sq("c6")));
    }

    #[test]
    fn curse_needs_an_empty_square() {
        let mut bench = Bench::new("4k3/8/2n5/8/8/8/8/4K3 w - - 0 1");
        assert!(bench
            .apply(CardId::CursedSquare, Color::White, TargetParams::square(sq("c6")))
            .is_none());
        assert!(bench
            .apply(CardId::CursedSquare, Color::White, TargetParams::square(sq("d5")))
            .is_some());
    }

    #[test]
    fn chain_lightning_hits_the_most_valuable_neighbor_once() {
        let mut bench = Bench::new("4k3/8/8/2rq4/3B4/8/8/4K3 w - - 0 1");
        bench.registry.flags[Color::White].chain_lightning = true;
        bench.registry.flags[Color::White].phantom_step = true;

        let fired = super::on_capture(
            &mut bench.position,
            &mut bench.registry,
            &mut bench.captured,
            Color::White,
            sq("e5"),
            sq("d4"),
        );

        assert_eq!(fired.lightning, Some(sq("d5")));
        assert!(bench.position.piece_at(sq("d5")).is_none());
        assert!(bench.position.piece_at(sq("c5")).is_some());
        assert!(!bench.registry.flags[Color::White].chain_lightning);
        assert!(bench.registry.flags[Color::White].phantom_step);
    }

    #[test]
    fn double_strike_grants_a_constrained_follow_up() {
        let mut bench = Bench::new("4k3/8/8/8/3B4/8/8/4K3 w - - 0 1");
        bench.registry.flags[Color::White].double_strike = true;

        let fired = super::on_capture(
            &mut bench.position,
            &mut bench.registry,
            &mut bench.captured,
            Color::White,
            sq("d4"),
            sq("d4"),
        );

        assert_eq!(fired.extra_move, Some(CardId::DoubleStrike));
        let grant = bench.registry.extra_moves[Color::White].unwrap();
        assert_eq!(grant.capture_away_from, Some(sq("d4")));
    }

    #[test]
    fn berserker_waits_for_the_next_capture_behind_double_strike() {
        let mut bench = Bench::new("4k3/8/8/8/3B4/8/8/4K3 w - - 0 1");
        bench.registry.flags[Color::White].double_strike = true;
        bench.registry.flags[Color::White].berserker_rage = true;

        // 첫 잡기: double_strike 만 발동
        let first = super::on_capture(
            &mut bench.position,
            &mut bench.registry,
            &mut bench.captured,
            Color::White,
            sq("d4"),
            sq("d4"),
        );
        assert_eq!(first.extra_move, Some(CardId::DoubleStrike));
        assert!(!bench.registry.flags[Color::White].double_strike);
        assert!(bench.registry.flags[Color::White].berserker_rage);

        // 추가 수가 소비된 뒤의 잡기에서 berserker 발동
        bench.registry.extra_moves[Color::White] = None;
        let second = super::on_capture(
            &mut bench.position,
            &mut bench.registry,
            &mut bench.captured,
            Color::White,
            sq("h8"),
            sq("h8"),
        );
        assert_eq!(second.extra_move, Some(CardId::BerserkerRage));
        assert!(!bench.registry.flags[Color::White].berserker_rage);
        assert_eq!(
            bench.registry.extra_moves[Color::White].unwrap().capture_away_from,
            None
        );
    }
}
