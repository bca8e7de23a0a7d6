//! AI Opponent.
//!
//! AI 는 매치를 직접 건드리지 않는다. `AiView` 스냅샷을 받아 시도할 행동 후보를
//! 우선순위 순서로 돌려주고, `MatchActor` 가 엔진이 받아들일 때까지 차례로 제출한다.

use std::{cmp::Reverse, fmt, str::FromStr, time::Duration};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    arcana::{CardId, CardInstance, Targeting},
    effect::EffectRegistry,
    game::{
        intent::{ActionRequest, TargetParams},
        Match,
    },
    oracle::{Color, LegalMove, PieceKind, Position, SpecialFlag, Square, Terminal},
    validator::MoveRequest,
};

const MATE_SCORE: i32 = 100_000;
const CHECK_BONUS: i32 = 30;
/// Upper bound of card targets tried per card.
const TARGETS_PER_CARD: usize = 2;
/// Cards whose effect is too erratic for the heuristic to judge.
const AVOIDED: [CardId; 4] = [
    CardId::QueensGambit,
    CardId::ChaosTheory,
    CardId::TimeTravel,
    CardId::Sacrifice,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            other => Err(format!("unknown AI difficulty '{}'", other)),
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiDifficulty::Easy => write!(f, "easy"),
            AiDifficulty::Normal => write!(f, "normal"),
            AiDifficulty::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiProfile {
    pub think_delay: Duration,
    /// Chance of ignoring the evaluation and playing a random move.
    pub randomness: f64,
    pub card_use_chance: f64,
    pub draw_chance: f64,
    /// Search depth in plies.
    pub depth: u8,
}

impl AiDifficulty {
    pub fn profile(self) -> AiProfile {
        match self {
            AiDifficulty::Easy => AiProfile {
                think_delay: Duration::from_millis(400),
                randomness: 0.3,
                card_use_chance: 0.1,
                draw_chance: 0.3,
                depth: 1,
            },
            AiDifficulty::Normal => AiProfile {
                think_delay: Duration::from_millis(700),
                randomness: 0.0,
                card_use_chance: 0.35,
                draw_chance: 0.4,
                depth: 1,
            },
            AiDifficulty::Hard => AiProfile {
                think_delay: Duration::from_millis(1000),
                randomness: 0.0,
                card_use_chance: 0.5,
                draw_chance: 0.5,
                depth: 2,
            },
        }
    }
}

/// Owned snapshot the AI decides from, safe to move onto a blocking thread.
#[derive(Debug, Clone)]
pub struct AiView {
    pub player_id: Uuid,
    pub color: Color,
    pub position: Position,
    pub registry: EffectRegistry,
    pub hand: Vec<CardInstance>,
    pub can_use_card: bool,
    pub can_draw: bool,
    pub pending_options: Option<Vec<CardId>>,
    pub seed: u64,
}

impl AiView {
    pub fn capture(game: &Match, player_id: Uuid, seed: u64) -> Option<Self> {
        let color = game.participant(player_id)?.color;
        let hand: Vec<CardInstance> = game
            .hand(player_id)
            .map(|h| h.cards().to_vec())
            .unwrap_or_default();
        let hand_room = hand.len() < game.settings().max_hand_size;
        let in_check = game.position().in_check();
        Some(Self {
            player_id,
            color,
            position: *game.position(),
            registry: game.registry().clone(),
            can_use_card: game.ascended() && !game.card_used_this_turn(color),
            can_draw: game.ascended()
                && !in_check
                && hand_room
                && game.draw_available_at(player_id).is_none(),
            pending_options: game
                .pending_selection()
                .filter(|s| s.owner == player_id && hand_room)
                .map(|s| s.options.clone()),
            hand,
            seed,
        })
    }
}

/// Ordered action candidates for the AI's next step.
pub fn decide(view: &AiView, profile: &AiProfile) -> Vec<ActionRequest> {
    let mut rng = StdRng::seed_from_u64(view.seed);
    let mut plan = Vec::new();

    if let Some(options) = &view.pending_options {
        if let Some(card) = options.iter().copied().find(|c| !AVOIDED.contains(c)) {
            plan.push(ActionRequest::select(card));
        }
    }
    if view.can_use_card && rng.gen_bool(profile.card_use_chance) {
        let mut plays = card_plays(view);
        plays.shuffle(&mut rng);
        plan.extend(plays);
    }
    if view.can_draw && rng.gen_bool(profile.draw_chance) {
        plan.push(ActionRequest::draw());
    }
    plan.extend(
        rank_moves(view, profile, &mut rng)
            .into_iter()
            .map(|mv| ActionRequest {
                move_to: Some(MoveRequest {
                    from: mv.from,
                    to: mv.to,
                    promotion: mv.promotion,
                }),
                ..Default::default()
            }),
    );
    plan
}

fn rank_moves(view: &AiView, profile: &AiProfile, rng: &mut StdRng) -> Vec<LegalMove> {
    let mut scored: Vec<(i32, LegalMove)> = view
        .position
        .legal_moves()
        .into_iter()
        .filter(|mv| playable(view, mv))
        .map(|mv| (evaluate(&view.position, &mv, view.color, profile.depth), mv))
        .collect();
    if profile.randomness > 0.0 && rng.gen_bool(profile.randomness) {
        scored.shuffle(rng);
    } else {
        scored.sort_by_key(|(score, _)| Reverse(*score));
    }
    scored.into_iter().map(|(_, mv)| mv).collect()
}

/// Filters moves the engine would reject because of active effects.
fn playable(view: &AiView, mv: &LegalMove) -> bool {
    if mv.special.is_some_and(SpecialFlag::is_castle) && view.registry.castling_locked(view.color) {
        return false;
    }
    if view.registry.capture_blocked_by_sanctuary(mv) {
        return false;
    }
    if let Some(square) = mv.capture_square {
        let protected = view
            .position
            .piece_at(square)
            .is_some_and(|p| view.registry.protection_reason(square, p).is_some());
        if protected {
            return false;
        }
    }
    match view.registry.follow_up_capture[view.color] {
        Some(origin) => mv
            .capture_square
            .is_some_and(|sq| sq != origin && !sq.is_adjacent(origin)),
        None => true,
    }
}

/// Material balance from `me`'s side after `mv`, searched `depth` plies.
fn evaluate(position: &Position, mv: &LegalMove, me: Color, depth: u8) -> i32 {
    let mut next = *position;
    if next.apply_legal(mv).is_err() {
        return -MATE_SCORE;
    }
    match next.status() {
        Terminal::Checkmate { loser } if loser == me => return -MATE_SCORE,
        Terminal::Checkmate { .. } => return MATE_SCORE,
        Terminal::Stalemate | Terminal::InsufficientMaterial => return 0,
        Terminal::Ongoing => {}
    }
    if depth <= 1 {
        let check = match (next.in_check(), next.side_to_move() == me) {
            (true, true) => -CHECK_BONUS,
            (true, false) => CHECK_BONUS,
            (false, _) => 0,
        };
        return next.material(me) - next.material(me.opposite()) + check;
    }
    next.legal_moves()
        .iter()
        .map(|reply| evaluate(&next, reply, me, depth - 1))
        .min()
        .unwrap_or(0)
}

fn card_plays(view: &AiView) -> Vec<ActionRequest> {
    let in_check = view.position.in_check();
    view.hand
        .iter()
        .filter(|c| !AVOIDED.contains(&c.card))
        .filter(|c| !(in_check && c.card.ends_turn()))
        .flat_map(|c| {
            targets_for(view, c)
                .into_iter()
                .take(TARGETS_PER_CARD)
                .map(move |target| ActionRequest::use_card(c.instance_id, target))
        })
        .collect()
}

fn targets_for(view: &AiView, instance: &CardInstance) -> Vec<TargetParams> {
    let me = view.color;
    let own = view.position.pieces(me);
    let enemy = view.position.pieces(me.opposite());
    let threatened: Vec<Square> = view
        .position
        .threatened_pieces(me)
        .into_iter()
        .filter(|(_, p)| p.kind != PieceKind::King)
        .map(|(sq, _)| sq)
        .collect();

    let squares: Vec<Square> = match instance.card.definition().targeting {
        Targeting::None => return vec![TargetParams::default()],
        Targeting::HandCard => {
            return view
                .hand
                .iter()
                .filter(|c| c.instance_id != instance.instance_id)
                .map(|c| TargetParams {
                    card_instance: Some(c.instance_id),
                    ..Default::default()
                })
                .collect()
        }
        Targeting::OwnPawn => {
            let mut pawns: Vec<Square> = own
                .iter()
                .filter(|(_, p)| p.kind == PieceKind::Pawn)
                .map(|(sq, _)| *sq)
                .collect();
            // 위협받는 폰, 그다음 전진한 폰 순서
            pawns.sort_by_key(|sq| {
                let advance = match me {
                    Color::White => sq.rank(),
                    Color::Black => 7 - sq.rank(),
                };
                Reverse((threatened.contains(sq), advance))
            });
            pawns
        }
        Targeting::OwnBishop => own
            .iter()
            .filter(|(_, p)| p.kind == PieceKind::Bishop)
            .map(|(sq, _)| *sq)
            .collect(),
        Targeting::OwnPiece | Targeting::AnySquare => {
            let mut at_risk: Vec<(Square, i32)> = own
                .iter()
                .filter(|(sq, _)| threatened.contains(sq))
                .map(|(sq, p)| (*sq, p.kind.value()))
                .collect();
            at_risk.sort_by_key(|(_, value)| Reverse(*value));
            at_risk.into_iter().map(|(sq, _)| sq).collect()
        }
        Targeting::EnemyPiece => {
            let mut targets: Vec<(Square, i32)> = enemy
                .iter()
                .filter(|(_, p)| p.kind != PieceKind::King)
                .map(|(sq, p)| (*sq, p.kind.value()))
                .collect();
            targets.sort_by_key(|(_, value)| Reverse(*value));
            targets.into_iter().map(|(sq, _)| sq).collect()
        }
        Targeting::EmptySquare
        | Targeting::OwnPieceAndSquare
        | Targeting::OwnPieceAndKind
        | Targeting::SquareAndKind => Vec::new(),
    };
    squares.into_iter().map(TargetParams::square).collect()
}
