use std::collections::HashMap;

use serde_json::json;

use super::{EffectContext, EffectOutcome, FollowUp, Handler, NON_KING};
use crate::{
    arcana::{self, CardId},
    oracle::{Color, PieceKind, Position},
};

const BONUS_DRAWS: u32 = 2;
const REWIND_HALF_MOVES: usize = 2;
const DIVINATION_CHOICES: usize = 3;

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::Sacrifice, sacrifice);
    table.insert(CardId::TimeTravel, time_travel);
    table.insert(CardId::Fortune, fortune);
    table.insert(CardId::ArcaneCycle, arcane_cycle);
    table.insert(CardId::Divination, divination);
}

fn sacrifice(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, _) = ctx.own_target(&NON_KING)?;
    let piece = ctx.destroy(square)?;
    Some(
        EffectOutcome::new(json!({ "square": square, "piece": piece.kind }))
            .with(FollowUp::Draw(BONUS_DRAWS)),
    )
}

/// Restores the board from two half-moves ago with the caster to move.
/// Pieces that come back to life leave the captured pool, and piece-bound
/// effects that no longer match the board are dropped.
fn time_travel(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let mut rewound = ctx.history.clone();
    let entry = rewound.rewind(REWIND_HALF_MOVES)?;
    let mut restored = Position::from_fen(&entry.fen).ok()?;
    restored.set_side_to_move(ctx.color).ok()?;

    for color in Color::BOTH {
        for kind in NON_KING {
            let before = count(ctx.position, color, kind);
            let after = count(&restored, color, kind);
            for _ in before..after {
                ctx.captured.take(color, kind);
            }
        }
    }
    *ctx.position = restored;
    *ctx.history = rewound;
    ctx.registry.prune_stale(ctx.position);

    Some(
        EffectOutcome::new(json!({ "fen": entry.fen, "halfMoves": REWIND_HALF_MOVES })).with(
            FollowUp::Rewound {
                last_move: entry.last_move,
            },
        ),
    )
}

fn count(position: &Position, color: Color, kind: PieceKind) -> usize {
    position
        .pieces(color)
        .iter()
        .filter(|(_, p)| p.kind == kind)
        .count()
}

fn fortune(_ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    Some(EffectOutcome::new(json!({ "draws": BONUS_DRAWS })).with(FollowUp::Draw(BONUS_DRAWS)))
}

fn arcane_cycle(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let discard = ctx.target.card_instance?;
    let card = ctx
        .hand
        .iter()
        .find(|c| c.instance_id == discard)
        .map(|c| c.card)?;
    Some(
        EffectOutcome::new(json!({ "discarded": card, "draws": BONUS_DRAWS }))
            .with(FollowUp::Discard(discard))
            .with(FollowUp::Draw(BONUS_DRAWS)),
    )
}

fn divination(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let options = arcana::draw_distinct(ctx.rng, DIVINATION_CHOICES);
    Some(EffectOutcome::new(json!({ "options": options })).with(FollowUp::Reveal(options)))
}
