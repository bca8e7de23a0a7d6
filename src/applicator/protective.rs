use std::collections::HashMap;

use serde_json::json;

use super::{EffectContext, EffectOutcome, Handler};
use crate::{
    arcana::CardId,
    effect::{Blessing, DivineWard, Fortress, Shield, ShieldCoverage, TimedSquare},
    oracle::{Color, PieceKind, Square},
};

const SANCTUARY_TURNS: u32 = 2;
const FORTRESS_TURNS: u32 = 2;
const BLESSING_TURNS: u32 = 2;

pub(super) fn register(table: &mut HashMap<CardId, Handler>) {
    table.insert(CardId::ShieldPawn, shield_pawn);
    table.insert(CardId::PawnGuard, pawn_guard);
    table.insert(CardId::Sanctuary, sanctuary);
    table.insert(CardId::IronFortress, iron_fortress);
    table.insert(CardId::BishopsBlessing, bishops_blessing);
    table.insert(CardId::DivineIntervention, divine_intervention);
    table.insert(CardId::Cleanse, cleanse);
}

fn shield_pawn(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (square, _) = ctx.own_target(&[PieceKind::Pawn])?;
    ctx.registry.set_shield(
        ctx.color,
        Shield {
            source: CardId::ShieldPawn,
            coverage: ShieldCoverage::Square(square),
        },
    );
    Some(EffectOutcome::new(json!({ "square": square })))
}

fn pawn_guard(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (pawn, _) = ctx.own_target(&[PieceKind::Pawn])?;
    let shield = Shield {
        source: CardId::PawnGuard,
        coverage: ShieldCoverage::BehindPawn(pawn),
    };
    let guarded = shield.guarded_square(ctx.color)?;
    match ctx.position.piece_at(guarded) {
        Some(piece) if piece.color == ctx.color => {}
        _ => return None,
    }
    ctx.registry.set_shield(ctx.color, shield);
    Some(EffectOutcome::new(json!({ "pawn": pawn, "guarded": guarded })))
}

fn sanctuary(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let square = ctx.target_square()?;
    match ctx.registry.sanctuaries.iter_mut().find(|s| s.square == square) {
        Some(existing) => existing.turns_remaining = SANCTUARY_TURNS,
        None => ctx.registry.sanctuaries.push(TimedSquare {
            square,
            owner: ctx.color,
            turns_remaining: SANCTUARY_TURNS,
        }),
    }
    Some(EffectOutcome::new(
        json!({ "square": square, "turns": SANCTUARY_TURNS }),
    ))
}

fn iron_fortress(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let color = ctx.color;
    ctx.registry.fortresses.retain(|f| f.owner != color);
    ctx.registry.fortresses.push(Fortress {
        owner: color,
        turns_remaining: FORTRESS_TURNS,
    });
    Some(EffectOutcome::new(json!({ "turns": FORTRESS_TURNS })))
}

fn bishops_blessing(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let (bishop, _) = ctx.own_target(&[PieceKind::Bishop])?;
    let mut squares = vec![bishop];
    squares.extend(own_pieces_on_diagonals(ctx, bishop, ctx.color));
    ctx.registry.blessings.push(Blessing {
        owner: ctx.color,
        squares: squares.clone(),
        turns_remaining: BLESSING_TURNS,
    });
    Some(EffectOutcome::new(
        json!({ "bishop": bishop, "protected": squares, "turns": BLESSING_TURNS }),
    ))
}

/// First piece met along each diagonal ray from `from`, kept when it is ours.
fn own_pieces_on_diagonals(ctx: &EffectContext<'_>, from: Square, color: Color) -> Vec<Square> {
    let mut found = Vec::new();
    for (df, dr) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let mut cursor = from.offset(df, dr);
        while let Some(sq) = cursor {
            if let Some(piece) = ctx.position.piece_at(sq) {
                if piece.color == color {
                    found.push(sq);
                }
                break;
            }
            cursor = sq.offset(df, dr);
        }
    }
    found
}

fn divine_intervention(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    if ctx.registry.divine[ctx.color].is_some() {
        return None;
    }
    let turns_remaining = ctx.settings.divine_intervention_turns;
    ctx.registry.divine[ctx.color] = Some(DivineWard { turns_remaining });
    Some(EffectOutcome::new(json!({ "turns": turns_remaining })))
}

fn cleanse(ctx: &mut EffectContext<'_>) -> Option<EffectOutcome> {
    let color = ctx.color;
    let position = *ctx.position;
    let poisoned_before = ctx.registry.poisons.len();
    ctx.registry
        .poisons
        .retain(|p| !matches!(position.piece_at(p.square), Some(piece) if piece.color == color));
    let cleansed = poisoned_before - ctx.registry.poisons.len();

    let cursed_before = ctx.registry.cursed_squares.len();
    ctx.registry.cursed_squares.retain(|c| c.owner == color);
    let lifted = cursed_before - ctx.registry.cursed_squares.len();

    if cleansed == 0 && lifted == 0 {
        return None;
    }
    Some(EffectOutcome::new(
        json!({ "cleansedPoisons": cleansed, "liftedCurses": lifted }),
    ))
}
