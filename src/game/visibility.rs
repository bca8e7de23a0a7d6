//! Visibility Projector.
//!
//! 매치 상태를 특정 시청자 관점으로 잘라낸다. 계산 중 어떤 단계라도 실패하면
//! 가장 보수적인(가장 많이 가린) 결과를 돌려준다.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{reveal::PendingReveal, Match, MatchOutcome, MatchStatus};
use crate::{
    arcana::{CardId, CardInstance},
    effect::{CapturedPool, EffectRegistry, TurnFlags},
    oracle::{Color, MoveResult},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum CardView {
    Known {
        #[serde(rename = "instanceId")]
        instance_id: Uuid,
        card: CardId,
    },
    Hidden,
}

impl From<&CardInstance> for CardView {
    fn from(instance: &CardInstance) -> Self {
        CardView::Known {
            instance_id: instance.instance_id,
            card: instance.card,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandView {
    pub player_id: Uuid,
    pub color: Color,
    pub cards: Vec<CardView>,
    pub used: usize,
}

/// What one viewer is allowed to see of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub match_id: Uuid,
    /// `None` for a viewer who is not seated in the match.
    pub viewer_color: Option<Color>,
    pub fen: String,
    pub side_to_move: Color,
    pub ply: u32,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    pub in_check: bool,
    pub ascended: bool,
    pub hands: Vec<HandView>,
    pub last_move: Option<MoveResult>,
    pub effects: Value,
    pub captured: CapturedPool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_reveal: Option<PendingReveal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_options: Option<Vec<CardId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_available_at: Option<u32>,
    pub card_used_this_turn: bool,
}

/// Projects `game` for `viewer`. Never fails; errors fall back to the
/// redacted view.
pub fn project(game: &Match, viewer: Uuid) -> ViewerState {
    match try_project(game, viewer) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                "MATCH [{}]: projection for {} failed, sending redacted state: {}",
                game.id(),
                viewer,
                e
            );
            redacted(game)
        }
    }
}

fn try_project(game: &Match, viewer: Uuid) -> Result<ViewerState, serde_json::Error> {
    let viewer_color = game.participant(viewer).map(|p| p.color);
    let hands = game
        .participants()
        .iter()
        .map(|p| {
            let hand = game.hand(p.id);
            let cards = hand.map_or_else(Vec::new, |h| {
                if p.id == viewer {
                    h.cards().iter().map(CardView::from).collect()
                } else {
                    vec![CardView::Hidden; h.len()]
                }
            });
            HandView {
                player_id: p.id,
                color: p.color,
                cards,
                used: hand.map_or(0, |h| h.used().len()),
            }
        })
        .collect();

    let fog = &game.registry().fog;
    let fogged = match viewer_color {
        Some(color) => fog[color.opposite()],
        None => fog.white || fog.black,
    };
    let revealed_options = game
        .pending_selection()
        .filter(|s| s.owner == viewer)
        .map(|s| s.options.clone());

    Ok(ViewerState {
        match_id: game.id(),
        viewer_color,
        fen: game.position().fen(),
        side_to_move: game.position().side_to_move(),
        ply: game.ply(),
        status: game.status(),
        outcome: game.outcome(),
        in_check: game.position().in_check(),
        ascended: game.ascended(),
        hands,
        last_move: if fogged { None } else { game.last_move() },
        effects: serde_json::to_value(public_effects(game.registry(), viewer_color))?,
        captured: game.captured().clone(),
        pending_reveal: game.pending_reveal().map(|pending| PendingReveal {
            card: pending.card.filter(|_| pending.owner == viewer),
            ..pending
        }),
        revealed_options,
        draw_available_at: viewer_color.and_then(|_| game.draw_available_at(viewer)),
        card_used_this_turn: viewer_color.is_some_and(|c| game.card_used_this_turn(c)),
    })
}

/// The registry as `viewer` may see it. Armed triggers, pending grants and
/// the divine ward stay private to their owner until they fire.
fn public_effects(registry: &EffectRegistry, viewer: Option<Color>) -> EffectRegistry {
    let mut visible = registry.clone();
    for color in Color::BOTH {
        if viewer == Some(color) {
            continue;
        }
        visible.flags[color] = TurnFlags::default();
        visible.extra_moves[color] = None;
        visible.follow_up_capture[color] = None;
        visible.divine[color] = None;
        if matches!(visible.echo, Some(echo) if echo.owner == color) {
            visible.echo = None;
        }
    }
    visible
}

/// Board only: every hand hidden, no move record, no effect detail.
fn redacted(game: &Match) -> ViewerState {
    let hands = game
        .participants()
        .iter()
        .map(|p| HandView {
            player_id: p.id,
            color: p.color,
            cards: vec![CardView::Hidden; game.hand(p.id).map_or(0, |h| h.len())],
            used: 0,
        })
        .collect();
    ViewerState {
        match_id: game.id(),
        viewer_color: None,
        fen: game.position().fen(),
        side_to_move: game.position().side_to_move(),
        ply: game.ply(),
        status: game.status(),
        outcome: game.outcome(),
        in_check: game.position().in_check(),
        ascended: game.ascended(),
        hands,
        last_move: None,
        effects: Value::Null,
        captured: CapturedPool::default(),
        pending_reveal: None,
        revealed_options: None,
        draw_available_at: None,
        card_used_this_turn: false,
    }
}
