//! Turn Engine.
//!
//! Every state change to a [`Match`] goes through here. `submit` takes one
//! intent per call, guards against re-entry and duplicate action ids, and
//! either applies the intent completely or leaves the match untouched.

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    history::HistoryEntry,
    intent::{ActionRequest, Intent, IntentKind, SelectRevealedPayload, TargetParams, UseCardPayload},
    reveal::{PendingReveal, RevealResolution, RevealTrigger},
    Match, MatchOutcome, MatchStatus, PendingSelection,
};
use crate::{
    applicator::{self, on_capture, EffectContext, FollowUp},
    arcana::{self, CardDefinition, CardId, CardInstance, Targeting},
    effect::{run_decay_pass, CapturedPool, DecayReport, EffectRegistry},
    env::AscensionTrigger,
    exception::ActionError,
    game::history::MoveHistory,
    oracle::{Color, LegalMove, MoveResult, Piece, PieceKind, Position, SpecialFlag, Square, Terminal},
    validator::{self, ArcanaRule, MoveRequest},
};

/// Result of an accepted intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub intent: IntentKind,
    /// The action id was seen before and nothing was applied.
    pub duplicate: bool,
    pub turn_completed: bool,
    /// The mover acts again before control passes.
    pub extra_move: bool,
    pub awaiting_reveal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    pub details: Value,
}

impl ActionReport {
    fn new(intent: IntentKind) -> Self {
        Self {
            intent,
            duplicate: false,
            turn_completed: false,
            extra_move: false,
            awaiting_reveal: false,
            outcome: None,
            details: json!({}),
        }
    }

    fn duplicate(intent: IntentKind) -> Self {
        Self {
            duplicate: true,
            ..Self::new(intent)
        }
    }
}

/// Everything a card handler may touch, kept so a card without effect can be
/// rolled back.
struct Snapshot {
    position: Position,
    registry: EffectRegistry,
    captured: CapturedPool,
    history: MoveHistory,
    last_move: Option<MoveResult>,
}

impl Match {
    /// Applies one client intent on behalf of `player_id`.
    pub fn submit(
        &mut self,
        player_id: Uuid,
        request: &ActionRequest,
        now: Instant,
    ) -> Result<ActionReport, ActionError> {
        let intent = Intent::try_from(request)?;
        if self.busy {
            return Err(ActionError::Busy);
        }
        if let Some(action_id) = request.action_id.as_deref() {
            if self.idempotency.contains(action_id, now) {
                debug!("MATCH [{}]: duplicate action id {} ignored", self.id, action_id);
                return Ok(ActionReport::duplicate(intent.kind()));
            }
        }

        self.busy = true;
        let result = self.dispatch(player_id, intent);
        self.busy = false;

        if let (Ok(_), Some(action_id)) = (&result, &request.action_id) {
            self.idempotency.record(action_id.clone(), now);
        }
        result
    }

    fn dispatch(&mut self, player_id: Uuid, intent: Intent) -> Result<ActionReport, ActionError> {
        let color = self
            .participant(player_id)
            .ok_or(ActionError::NotParticipant(player_id))?
            .color;
        if self.is_finished() {
            return Err(ActionError::MatchFinished);
        }
        if self.pending_reveal.is_some() {
            return Err(ActionError::RevealPending);
        }
        if self.position.side_to_move() != color {
            return Err(ActionError::NotYourTurn);
        }

        match intent {
            Intent::Move(request) => self.play_move(player_id, color, request),
            Intent::DrawCard => self.draw_card(player_id, color),
            Intent::UseCard(payload) => self.use_card(player_id, color, payload),
            Intent::SelectRevealedCard(payload) => self.select_revealed(player_id, payload),
        }
    }

    // ---------------------------------------------------------------
    // move
    // ---------------------------------------------------------------

    fn play_move(
        &mut self,
        player_id: Uuid,
        color: Color,
        request: MoveRequest,
    ) -> Result<ActionReport, ActionError> {
        let castling_locked = self.registry.castling_locked(color);
        let standard = self
            .position
            .find_legal(request.from, request.to, request.promotion)
            .filter(|mv| !(castling_locked && mv.special.is_some_and(SpecialFlag::is_castle)));
        let (mv, rule) = match standard {
            Some(mv) => (mv, None),
            None => validator::validate(&self.position, &request, &self.registry, color)
                .map(|(mv, rule)| (mv, Some(rule)))
                .ok_or_else(|| {
                    ActionError::IllegalMove(format!("{}{}", request.from, request.to))
                })?,
        };
        self.check_capture_allowed(color, &mv)?;

        let fen_before = self.position.fen();
        let applied = match rule {
            None => self.position.apply_legal(&mv),
            Some(_) => self.position.apply_synthetic(color, &mv),
        }
        .map_err(|e| ActionError::IllegalMove(e.to_string()))?;

        self.history.push(HistoryEntry {
            fen: fen_before,
            last_move: self.last_move,
            ply: self.ply,
        });
        if rule == Some(ArcanaRule::TemporalEcho) {
            self.registry.echo = None;
            self.registry.flags[color].temporal_echo = false;
        }
        self.registry.follow_up_capture[color] = None;
        self.track_pieces(color, &applied);
        self.last_move = Some(applied);

        let mut report = ActionReport::new(IntentKind::Move);
        report.details = json!({ "move": applied, "rule": rule });
        info!(
            "MATCH [{}]: {} played {}{}",
            self.id, color, applied.from, applied.to
        );

        if let (Some(_), Some(capture_square)) = (applied.captured, applied.capture_square) {
            self.after_capture(player_id, color, capture_square, applied.to, &mut report);
        }
        self.apply_curse(color, applied.to, &mut report);

        if self.settle(&mut report) {
            return Ok(report);
        }

        if let Some(grant) = self.registry.take_extra_move(color) {
            if applied.promotion.is_some() {
                debug!(
                    "MATCH [{}]: {:?} grant dropped by a promoting move",
                    self.id, grant.source
                );
            } else if self.grant_extra_move(color, grant.capture_away_from) {
                report.extra_move = true;
                report.details["extraMove"] = json!(grant.source);
                return Ok(report);
            }
        }

        self.finish_turn(color, &mut report);
        Ok(report)
    }

    fn check_capture_allowed(&self, color: Color, mv: &LegalMove) -> Result<(), ActionError> {
        if self.registry.capture_blocked_by_sanctuary(mv) {
            return Err(ActionError::Protected("in a sanctuary"));
        }
        if let Some(capture_square) = mv.capture_square {
            if let Some(victim) = self.position.piece_at(capture_square) {
                if let Some(reason) = self.registry.protection_reason(capture_square, victim) {
                    return Err(ActionError::Protected(reason));
                }
            }
        }
        if let Some(origin) = self.registry.follow_up_capture[color] {
            let away = mv
                .capture_square
                .is_some_and(|sq| sq != origin && !sq.is_adjacent(origin));
            if !away {
                return Err(ActionError::IllegalMove(format!(
                    "the second strike must capture away from {}",
                    origin
                )));
            }
        }
        Ok(())
    }

    /// Keeps the captured pool and piece-bound registry entries in step with
    /// an applied move.
    fn track_pieces(&mut self, color: Color, applied: &MoveResult) {
        if let (Some(kind), Some(square)) = (applied.captured, applied.capture_square) {
            self.captured.push(Piece::new(kind, color.opposite()));
            self.registry.forget(square);
        }
        self.registry.relocate(applied.from, applied.to);
        let rank = color.back_rank();
        let rook = match applied.special {
            Some(SpecialFlag::KingsideCastle) => Square::new(7, rank).zip(Square::new(5, rank)),
            Some(SpecialFlag::QueensideCastle) => Square::new(0, rank).zip(Square::new(3, rank)),
            _ => None,
        };
        if let Some((from, to)) = rook {
            self.registry.relocate(from, to);
        }
    }

    fn after_capture(
        &mut self,
        player_id: Uuid,
        color: Color,
        capture_square: Square,
        landing: Square,
        report: &mut ActionReport,
    ) {
        if !self.ascended && self.settings.ascension_trigger == AscensionTrigger::FirstCapture {
            self.ascend();
            report.details["ascended"] = json!(true);
        }
        let triggers = on_capture(
            &mut self.position,
            &mut self.registry,
            &mut self.captured,
            color,
            capture_square,
            landing,
        );
        if triggers.bonus_draws > 0 {
            let drawn = self.award(player_id, triggers.bonus_draws);
            report.details["bonusDraws"] = json!(drawn.len());
        }
        if !triggers.is_empty() {
            report.details["triggers"] = json!(triggers);
        }
    }

    /// Destroys the mover's piece when it ended its move on an enemy curse.
    fn apply_curse(&mut self, color: Color, landing: Square, report: &mut ActionReport) {
        if self.registry.curse_against(landing, color).is_none() {
            return;
        }
        let Some(piece) = self.position.piece_at(landing) else {
            return;
        };
        if piece.color != color || piece.kind == PieceKind::King {
            return;
        }
        if self.position.edit(|editor| editor.remove(landing)).is_some() {
            self.captured.push(piece);
            self.registry.forget(landing);
            report.details["cursed"] = json!(landing);
            info!("MATCH [{}]: {} {} destroyed by a curse on {}", self.id, color, piece.kind, landing);
        } else {
            warn!("MATCH [{}]: curse on {} rejected by the oracle", self.id, landing);
        }
    }

    /// Hands the move back to `color`. Returns `false` (grant forfeited) when
    /// the override is impossible or leaves nothing to play.
    fn grant_extra_move(&mut self, color: Color, capture_away_from: Option<Square>) -> bool {
        let before = self.position;
        if self.position.set_side_to_move(color).is_err() {
            debug!("MATCH [{}]: extra move forfeited, opponent is in check", self.id);
            return false;
        }
        let moves = self.position.legal_moves();
        let playable = match capture_away_from {
            None => !moves.is_empty(),
            Some(origin) => moves.iter().any(|mv| {
                mv.capture_square.is_some_and(|sq| {
                    sq != origin
                        && !sq.is_adjacent(origin)
                        && self
                            .position
                            .piece_at(sq)
                            .is_some_and(|p| self.registry.protection_reason(sq, p).is_none())
                })
            }),
        };
        if !playable {
            self.position = before;
            debug!("MATCH [{}]: extra move forfeited, nothing to play", self.id);
            return false;
        }
        self.registry.follow_up_capture[color] = capture_away_from;
        true
    }

    fn finish_turn(&mut self, color: Color, report: &mut ActionReport) {
        let decay = self.complete_turn(color);
        if !decay.is_empty() {
            report.details["decay"] = json!(decay);
        }
        if self.pass_control(color.opposite()) {
            report.details["skipped"] = json!(color.opposite());
        }
        report.turn_completed = true;
        self.settle(report);
    }

    // ---------------------------------------------------------------
    // cards
    // ---------------------------------------------------------------

    fn draw_card(&mut self, player_id: Uuid, color: Color) -> Result<ActionReport, ActionError> {
        if !self.ascended {
            return Err(ActionError::ArcanaDormant);
        }
        if self.position.in_check() {
            return Err(ActionError::InCheck);
        }
        if let Some(available_at) = self.draw_available_at(player_id) {
            return Err(ActionError::DrawCooldown { available_at });
        }
        let hand_size = self.hands.get(&player_id).map_or(0, |h| h.len());
        if hand_size >= self.settings.max_hand_size {
            return Err(ActionError::HandFull);
        }

        let instance = CardInstance::new(arcana::draw_random(&mut self.rng), self.ply);
        self.hands
            .entry(player_id)
            .or_default()
            .add(instance.clone());
        self.last_draw_ply.insert(player_id, self.ply);
        info!("MATCH [{}]: {} drew a card", self.id, color);

        let mut report = ActionReport::new(IntentKind::DrawCard);
        report.details = json!({ "card": instance });
        let decay = self.complete_turn(color);
        if !decay.is_empty() {
            report.details["decay"] = json!(decay);
        }
        report.turn_completed = true;
        self.defer_reveal(player_id, color, true, Some(instance.card), &mut report);
        Ok(report)
    }

    fn use_card(
        &mut self,
        player_id: Uuid,
        color: Color,
        payload: UseCardPayload,
    ) -> Result<ActionReport, ActionError> {
        if !self.ascended {
            return Err(ActionError::ArcanaDormant);
        }
        if self.card_used[color] {
            return Err(ActionError::CardLimitReached);
        }
        let hand = self
            .hands
            .get(&player_id)
            .ok_or(ActionError::CardNotInHand(payload.instance_id))?;
        let instance = hand.find(payload.instance_id)?.clone();
        let others: Vec<CardInstance> = hand
            .cards()
            .iter()
            .filter(|c| c.instance_id != instance.instance_id)
            .cloned()
            .collect();
        let definition = instance.card.definition();
        check_targets(definition, &payload.target)?;
        if definition.ends_turn && self.position.in_check() {
            return Err(ActionError::InCheck);
        }

        let snapshot = self.snapshot();
        let outcome = {
            let mut ctx = EffectContext {
                position: &mut self.position,
                registry: &mut self.registry,
                captured: &mut self.captured,
                history: &mut self.history,
                requester: player_id,
                color,
                prior_move: self.last_move,
                target: &payload.target,
                hand: &others,
                rng: &mut self.rng,
                settings: &self.settings,
            };
            applicator::apply(instance.card, &mut ctx)
        };
        let Some(outcome) = outcome else {
            self.restore(snapshot);
            debug!("MATCH [{}]: {} had no effect", self.id, instance.card);
            return Err(ActionError::NoEffect(instance.card));
        };
        if definition.ends_turn {
            let mut handover = self.position;
            if handover.set_side_to_move(color.opposite()).is_err() {
                self.restore(snapshot);
                debug!(
                    "MATCH [{}]: {} would leave the turn unpassable, rolled back",
                    self.id, instance.card
                );
                return Err(ActionError::NoEffect(instance.card));
            }
        }

        if let Some(hand) = self.hands.get_mut(&player_id) {
            hand.mark_used(instance.instance_id)?;
        }
        self.card_used[color] = true;
        info!("MATCH [{}]: {} used {}", self.id, color, instance.card);

        let mut report = ActionReport::new(IntentKind::UseCard);
        report.details = json!({
            "card": instance.card,
            "instanceId": instance.instance_id,
            "params": outcome.params,
        });
        for follow_up in outcome.follow_ups {
            match follow_up {
                FollowUp::Draw(count) => {
                    let drawn = self.award(player_id, count);
                    report.details["drawn"] = json!(drawn);
                }
                FollowUp::Discard(instance_id) => {
                    if let Some(hand) = self.hands.get_mut(&player_id) {
                        hand.discard(instance_id);
                    }
                }
                FollowUp::Reveal(options) => {
                    self.pending_selection = Some(PendingSelection {
                        owner: player_id,
                        options,
                    });
                }
                FollowUp::Rewound { last_move } => {
                    self.last_move = last_move;
                }
            }
        }

        if self.settle(&mut report) {
            return Ok(report);
        }
        if definition.ends_turn {
            let decay = self.complete_turn(color);
            if !decay.is_empty() {
                report.details["decay"] = json!(decay);
            }
            report.turn_completed = true;
        }
        self.defer_reveal(
            player_id,
            color,
            definition.ends_turn,
            Some(instance.card),
            &mut report,
        );
        Ok(report)
    }

    fn select_revealed(
        &mut self,
        player_id: Uuid,
        payload: SelectRevealedPayload,
    ) -> Result<ActionReport, ActionError> {
        let selection = self
            .pending_selection
            .as_ref()
            .filter(|s| s.owner == player_id)
            .ok_or(ActionError::NoPendingSelection)?;
        if !selection.options.contains(&payload.card) {
            return Err(ActionError::InvalidTarget(format!(
                "{} was not among the revealed cards",
                payload.card
            )));
        }
        let hand_size = self.hands.get(&player_id).map_or(0, |h| h.len());
        if hand_size >= self.settings.max_hand_size {
            return Err(ActionError::HandFull);
        }

        let instance = CardInstance::new(payload.card, self.ply);
        self.hands
            .entry(player_id)
            .or_default()
            .add(instance.clone());
        self.pending_selection = None;

        let mut report = ActionReport::new(IntentKind::SelectRevealedCard);
        report.details = json!({ "card": instance });
        Ok(report)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            position: self.position,
            registry: self.registry.clone(),
            captured: self.captured.clone(),
            history: self.history.clone(),
            last_move: self.last_move,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.position = snapshot.position;
        self.registry = snapshot.registry;
        self.captured = snapshot.captured;
        self.history = snapshot.history;
        self.last_move = snapshot.last_move;
    }

    /// Adds up to `count` random cards to the hand, stopping at the hand limit.
    fn award(&mut self, player_id: Uuid, count: u32) -> Vec<CardInstance> {
        let max = self.settings.max_hand_size;
        let mut drawn = Vec::new();
        for _ in 0..count {
            let hand = self.hands.entry(player_id).or_default();
            if hand.len() >= max {
                debug!("MATCH [{}]: hand full, bonus draw dropped", self.id);
                break;
            }
            let instance = CardInstance::new(arcana::draw_random(&mut self.rng), self.ply);
            hand.add(instance.clone());
            drawn.push(instance);
        }
        drawn
    }

    pub(super) fn ascend(&mut self) {
        self.ascended = true;
        let ids: Vec<Uuid> = self.participants.iter().map(|p| p.id).collect();
        for id in ids {
            self.award(id, 1);
        }
        info!("MATCH [{}]: arcana awakened at ply {}", self.id, self.ply);
    }

    // ---------------------------------------------------------------
    // turn boundaries
    // ---------------------------------------------------------------

    /// Ends `ending`'s turn: advances the ply and runs the decay pass.
    fn complete_turn(&mut self, ending: Color) -> DecayReport {
        self.ply += 1;
        if self.pending_selection.take().is_some() {
            debug!("MATCH [{}]: unclaimed divination options dropped", self.id);
        }
        let report = run_decay_pass(
            &mut self.registry,
            &mut self.position,
            &mut self.captured,
            ending,
        );
        self.card_used[ending] = false;
        if !report.is_empty() {
            debug!("MATCH [{}]: decay after {}: {:?}", self.id, ending, report);
        }
        if let AscensionTrigger::Ply(at) = self.settings.ascension_trigger {
            if !self.ascended && self.ply >= at {
                self.ascend();
            }
        }
        report
    }

    /// Gives the turn to `next`. A frozen color loses the turn unless it is in
    /// check. Returns whether a turn was skipped.
    fn pass_control(&mut self, next: Color) -> bool {
        if let Err(e) = self.position.set_side_to_move(next) {
            warn!("MATCH [{}]: could not pass the turn to {}: {}", self.id, next, e);
            return false;
        }
        if !self.registry.frozen[next] {
            return false;
        }
        self.registry.frozen[next] = false;
        if self.position.in_check() {
            debug!("MATCH [{}]: {} is frozen but in check, turn kept", self.id, next);
            return false;
        }
        self.complete_turn(next);
        if let Err(e) = self.position.set_side_to_move(next.opposite()) {
            warn!("MATCH [{}]: frozen turn could not be skipped: {}", self.id, e);
            return false;
        }
        info!("MATCH [{}]: {} is frozen, turn skipped", self.id, next);
        true
    }

    /// Records a terminal outcome if the position has one. A checkmate may be
    /// averted once by an armed divine ward.
    fn settle(&mut self, report: &mut ActionReport) -> bool {
        if self.is_finished() {
            report.outcome = self.outcome;
            return true;
        }
        for color in Color::BOTH {
            if self.position.king_square(color).is_none() {
                self.finish(MatchOutcome::KingDestroyed {
                    winner: color.opposite(),
                });
                report.outcome = self.outcome;
                return true;
            }
        }
        let outcome = match self.position.status() {
            Terminal::Ongoing => return false,
            Terminal::Checkmate { loser } => {
                if self.registry.divine[loser].is_some() {
                    if let Some((square, kind)) = self.divine_rescue(loser) {
                        report.details["divineIntervention"] =
                            json!({ "square": square, "piece": kind, "color": loser });
                        return false;
                    }
                }
                MatchOutcome::Checkmate {
                    winner: loser.opposite(),
                }
            }
            Terminal::Stalemate => MatchOutcome::Stalemate,
            Terminal::InsufficientMaterial => MatchOutcome::InsufficientMaterial,
        };
        self.finish(outcome);
        report.outcome = self.outcome;
        true
    }

    /// Summons a defender for `loser` so the position is no longer mate.
    /// Squares between the king and its checkers are tried first.
    fn divine_rescue(&mut self, loser: Color) -> Option<(Square, PieceKind)> {
        let king = self.position.king_square(loser)?;
        let mut squares: Vec<Square> = self
            .position
            .attackers(king, loser.opposite())
            .into_iter()
            .flat_map(|checker| king.between(checker))
            .collect();
        let rest: Vec<Square> = Square::all().filter(|sq| !squares.contains(sq)).collect();
        squares.extend(rest);
        squares.retain(|&sq| self.position.piece_at(sq).is_none());

        const DEFENDERS: [PieceKind; 4] = [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ];
        for square in squares {
            for kind in DEFENDERS {
                let mut trial = self.position;
                let placed = trial.edit(|editor| {
                    editor.put(square, Piece::new(kind, loser));
                    Some(())
                });
                if placed.is_some() && trial.status() == Terminal::Ongoing {
                    self.position = trial;
                    self.registry.divine[loser] = None;
                    info!(
                        "MATCH [{}]: divine intervention saved {} with a {} on {}",
                        self.id, loser, kind, square
                    );
                    return Some((square, kind));
                }
            }
        }
        warn!("MATCH [{}]: divine intervention found no rescue for {}", self.id, loser);
        None
    }

    fn finish(&mut self, outcome: MatchOutcome) {
        self.status = MatchStatus::Finished;
        self.outcome = Some(outcome);
        self.pending_reveal = None;
        self.pending_selection = None;
        info!("MATCH [{}]: finished, {:?}", self.id, outcome);
    }

    // ---------------------------------------------------------------
    // reveal
    // ---------------------------------------------------------------

    fn defer_reveal(
        &mut self,
        owner: Uuid,
        owner_color: Color,
        turn_should_end: bool,
        card: Option<CardId>,
        report: &mut ActionReport,
    ) {
        self.pending_reveal = Some(PendingReveal {
            owner,
            owner_color,
            turn_should_end,
            card,
        });
        report.awaiting_reveal = true;
    }

    /// The owner finished its reveal animation.
    pub fn acknowledge_reveal(&mut self, player_id: Uuid) -> Option<RevealResolution> {
        match self.pending_reveal {
            Some(pending) if pending.owner == player_id => {
                self.finalize_reveal(RevealTrigger::Acknowledged)
            }
            _ => None,
        }
    }

    /// Runs the deferred work once. Later calls find nothing pending and
    /// return `None`.
    pub fn finalize_reveal(&mut self, trigger: RevealTrigger) -> Option<RevealResolution> {
        let pending = self.pending_reveal.take()?;
        let mut turn_passed = false;
        if pending.turn_should_end && !self.is_finished() {
            let mut report = ActionReport::new(IntentKind::UseCard);
            self.pass_control(pending.owner_color.opposite());
            turn_passed = true;
            self.settle(&mut report);
        }
        debug!(
            "MATCH [{}]: reveal for {} finalized ({:?})",
            self.id, pending.owner, trigger
        );
        Some(RevealResolution {
            owner: pending.owner,
            trigger,
            turn_passed,
            next_to_move: self.position.side_to_move(),
        })
    }

    // ---------------------------------------------------------------
    // lifecycle
    // ---------------------------------------------------------------

    /// Marks the match busy while an AI decision is in flight.
    pub fn mark_busy(&mut self) {
        self.busy = true;
    }

    pub fn clear_busy(&mut self) {
        self.busy = false;
    }

    /// The player's turn is given up after an AI timeout. A player in check
    /// cannot pass, so its first legal move is played instead.
    pub fn forfeit_turn(&mut self, player_id: Uuid) -> Result<ActionReport, ActionError> {
        self.busy = false;
        let color = self
            .participant(player_id)
            .ok_or(ActionError::NotParticipant(player_id))?
            .color;
        if self.is_finished() {
            return Err(ActionError::MatchFinished);
        }
        if self.pending_reveal.is_some() {
            return Err(ActionError::RevealPending);
        }
        if self.position.side_to_move() != color {
            return Err(ActionError::NotYourTurn);
        }

        if self.position.in_check() {
            let mv = self
                .position
                .legal_moves()
                .into_iter()
                .next()
                .ok_or_else(|| ActionError::IllegalMove("no legal move to play".into()))?;
            return self.dispatch(
                player_id,
                Intent::Move(MoveRequest {
                    from: mv.from,
                    to: mv.to,
                    promotion: mv.promotion,
                }),
            );
        }

        warn!("MATCH [{}]: {} forfeits its turn", self.id, color);
        let mut report = ActionReport::new(IntentKind::Move);
        report.details = json!({ "forfeited": color });
        self.registry.extra_moves[color] = None;
        self.finish_turn(color, &mut report);
        Ok(report)
    }

    pub fn resign(&mut self, player_id: Uuid) -> Result<MatchOutcome, ActionError> {
        let color = self
            .participant(player_id)
            .ok_or(ActionError::NotParticipant(player_id))?
            .color;
        if self.is_finished() {
            return Err(ActionError::MatchFinished);
        }
        let outcome = MatchOutcome::Resigned {
            winner: color.opposite(),
        };
        self.finish(outcome);
        Ok(outcome)
    }

    /// Ends an ongoing match in the opponent's favor. Returns `None` when
    /// there was nothing to end.
    pub fn disconnect(&mut self, player_id: Uuid) -> Option<MatchOutcome> {
        let color = self.participant(player_id)?.color;
        if self.is_finished() {
            return None;
        }
        let outcome = MatchOutcome::Disconnected {
            winner: color.opposite(),
        };
        self.finish(outcome);
        Some(outcome)
    }

    /// Records a rematch vote. Returns `true` once both participants agreed
    /// and the match restarted with colors swapped.
    pub fn vote_rematch(&mut self, player_id: Uuid) -> Result<bool, ActionError> {
        if self.participant(player_id).is_none() {
            return Err(ActionError::NotParticipant(player_id));
        }
        if !self.is_finished() {
            return Err(ActionError::MatchInProgress);
        }
        self.rematch_votes.insert(player_id);
        let agreed = self
            .participants
            .iter()
            .all(|p| p.is_ai() || self.rematch_votes.contains(&p.id));
        if agreed {
            self.reset_for_rematch();
            info!("MATCH [{}]: rematch started", self.id);
        }
        Ok(agreed)
    }
}

/// Rejects a card activation whose target parameters do not have the shape
/// the card needs. Whether the targets are acceptable is the handler's call.
fn check_targets(definition: &CardDefinition, target: &TargetParams) -> Result<(), ActionError> {
    let targeting: Targeting = definition.targeting;
    let missing = |what: &'static str| ActionError::MissingTarget {
        card: definition.id,
        what,
    };
    if targeting.needs_square() && target.square.is_none() {
        return Err(missing("square"));
    }
    if targeting.needs_destination() && target.destination.is_none() {
        return Err(missing("destination"));
    }
    if targeting.needs_piece_type() && target.piece_type.is_none() {
        return Err(missing("pieceType"));
    }
    if targeting.needs_card() && target.card_instance.is_none() {
        return Err(missing("cardInstance"));
    }
    Ok(())
}
