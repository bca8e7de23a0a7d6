use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use actix::prelude::*;
use tokio::{task::JoinError, time::error::Elapsed};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    ai::{self, AiView},
    env::AiSettings,
    exception::{ActionError, StateError},
    game::{
        intent::ActionRequest,
        reveal::{RevealResolution, RevealTrigger},
        visibility, ActionReport, Match, MatchOutcome, ParticipantKind,
    },
    metrics::MetricsCtx,
};

use super::{
    messages::{Connect, Disconnect, MatchClosed, Resign, RevealComplete, SubmitAction, SyncState, VoteRematch},
    protocol::ServerMessage,
};

/// 아무도 접속하지 않은 매치를 정리하기까지의 유예 시간
const IDLE_GRACE: Duration = Duration::from_secs(120);

type AiOutcome = Result<Result<Vec<ActionRequest>, JoinError>, Elapsed>;

/// 매치 하나를 소유하는 단일 작성자 액터.
///
/// 모든 의도는 메일박스를 통해 순서대로 들어오며, 비동기 지점은 AI 사고 시간과
/// 공개 애니메이션 대기 두 곳뿐이다. 상태 방송은 항상 정착된 이후의 상태를 보낸다.
pub struct MatchActor {
    game: Match,
    connections: HashMap<Uuid, Recipient<ServerMessage>>,
    reveal_timer: Option<SpawnHandle>,
    ai_thinking: bool,
    announced: bool,
    ai_settings: AiSettings,
    metrics: Arc<MetricsCtx>,
    on_close: Option<Recipient<MatchClosed>>,
}

impl MatchActor {
    pub fn new(
        game: Match,
        ai_settings: AiSettings,
        metrics: Arc<MetricsCtx>,
        on_close: Option<Recipient<MatchClosed>>,
    ) -> Self {
        Self {
            game,
            connections: HashMap::new(),
            reveal_timer: None,
            ai_thinking: false,
            announced: false,
            ai_settings,
            metrics,
            on_close,
        }
    }

    fn match_id(&self) -> Uuid {
        self.game.id()
    }

    /// Runs after every accepted change: arms or resolves the pending reveal,
    /// broadcasts per-viewer state, announces the outcome and hands the turn
    /// to the AI when it is its move.
    fn settle(&mut self, ctx: &mut Context<Self>) {
        if let Some(pending) = self.game.pending_reveal() {
            let owner_is_ai = self
                .game
                .participant(pending.owner)
                .is_some_and(|p| p.is_ai());
            if owner_is_ai {
                if let Some(resolution) = self.game.finalize_reveal(RevealTrigger::Immediate) {
                    self.on_reveal_resolved(resolution, ctx);
                    return;
                }
            } else if self.reveal_timer.is_none() {
                let timeout = Duration::from_millis(self.game.settings().reveal_timeout_ms);
                self.reveal_timer = Some(ctx.run_later(timeout, |act, ctx| {
                    act.reveal_timer = None;
                    warn!(
                        "MATCH [{}]: reveal acknowledgement timed out, finalizing",
                        act.match_id()
                    );
                    act.metrics.reveal_timeout();
                    if let Some(resolution) = act.game.finalize_reveal(RevealTrigger::TimedOut) {
                        act.on_reveal_resolved(resolution, ctx);
                    }
                }));
            }
        }

        self.broadcast_state();
        self.announce_outcome();
        self.schedule_ai(ctx);
    }

    fn on_reveal_resolved(&mut self, resolution: RevealResolution, ctx: &mut Context<Self>) {
        if let Some(handle) = self.reveal_timer.take() {
            ctx.cancel_future(handle);
        }
        if let Some(addr) = self.connections.get(&resolution.owner) {
            addr.do_send(ServerMessage::RevealResolved { resolution });
        }
        self.settle(ctx);
    }

    fn broadcast_state(&self) {
        for (player_id, addr) in &self.connections {
            let state = visibility::project(&self.game, *player_id);
            addr.do_send(ServerMessage::State {
                state: Box::new(state),
            });
        }
    }

    fn announce_outcome(&mut self) {
        let Some(outcome) = self.game.outcome() else {
            return;
        };
        if self.announced {
            return;
        }
        self.announced = true;
        info!("MATCH [{}]: over, {:?}", self.match_id(), outcome);
        self.metrics.match_finished(outcome_label(&outcome));
        for addr in self.connections.values() {
            addr.do_send(ServerMessage::MatchOver { outcome });
        }
    }

    fn schedule_ai(&mut self, ctx: &mut Context<Self>) {
        if self.ai_thinking || self.game.is_finished() || self.game.pending_reveal().is_some() {
            return;
        }
        let participant = *self.game.to_move();
        let ParticipantKind::Ai(difficulty) = participant.kind else {
            return;
        };
        let seed = self.game.fork_seed();
        let Some(view) = AiView::capture(&self.game, participant.id, seed) else {
            return;
        };
        let profile = difficulty.profile();
        let delay = profile.think_delay + Duration::from_millis(self.ai_settings.extra_think_delay_ms);
        let limit = Duration::from_millis(self.game.settings().ai_think_timeout_ms);

        self.ai_thinking = true;
        self.game.mark_busy();
        debug!(
            "MATCH [{}]: AI ({}) thinking for {:?}",
            self.match_id(),
            difficulty,
            delay
        );

        let think = async move {
            tokio::time::timeout(limit, async move {
                tokio::time::sleep(delay).await;
                tokio::task::spawn_blocking(move || ai::decide(&view, &profile)).await
            })
            .await
        };
        ctx.spawn(
            think
                .into_actor(self)
                .map(move |outcome, act, ctx| act.on_ai_decision(participant.id, outcome, ctx)),
        );
    }

    fn on_ai_decision(&mut self, player_id: Uuid, outcome: AiOutcome, ctx: &mut Context<Self>) {
        self.ai_thinking = false;
        self.game.clear_busy();

        let plan = match outcome {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                error!("MATCH [{}]: AI task failed: {}", self.match_id(), e);
                Vec::new()
            }
            Err(_) => {
                warn!("MATCH [{}]: AI think timeout, passing its turn", self.match_id());
                self.metrics.ai_timeout();
                Vec::new()
            }
        };

        let now = Instant::now();
        let mut accepted = false;
        for request in plan {
            let result = self.game.submit(player_id, &request, now);
            self.record(&request, &result);
            match result {
                Ok(_) => {
                    accepted = true;
                    break;
                }
                Err(e) => debug!("MATCH [{}]: AI candidate rejected: {}", self.match_id(), e),
            }
        }
        if !accepted {
            if let Err(e) = self.game.forfeit_turn(player_id) {
                debug!("MATCH [{}]: AI turn not forfeited: {}", self.match_id(), e);
            }
        }
        self.settle(ctx);
    }

    fn record(&self, request: &ActionRequest, result: &Result<ActionReport, ActionError>) {
        let intent = intent_label(request);
        match result {
            Ok(report) => {
                self.metrics.action(intent, "accepted");
                if let Some(card) = report.details.get("card").and_then(|c| c.as_str()) {
                    if report.intent == crate::game::intent::IntentKind::UseCard {
                        self.metrics.card_used(card);
                    }
                }
            }
            Err(_) => self.metrics.action(intent, "rejected"),
        }
    }
}

fn intent_label(request: &ActionRequest) -> &'static str {
    if request.move_to.is_some() {
        "move"
    } else if request.draw_card.is_some() {
        "draw_card"
    } else if request.use_card.is_some() {
        "use_card"
    } else if request.select_revealed_card.is_some() {
        "select_revealed_card"
    } else {
        "empty"
    }
}

fn outcome_label(outcome: &MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Checkmate { .. } => "checkmate",
        MatchOutcome::Stalemate => "stalemate",
        MatchOutcome::InsufficientMaterial => "insufficient_material",
        MatchOutcome::KingDestroyed { .. } => "king_destroyed",
        MatchOutcome::Resigned { .. } => "resigned",
        MatchOutcome::Disconnected { .. } => "disconnected",
    }
}

impl Actor for MatchActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "MATCH [{}]: actor started ({} vs {})",
            self.match_id(),
            self.game.participants()[0].color,
            self.game.participants()[1].color
        );
        ctx.run_later(IDLE_GRACE, |act, ctx| {
            if act.connections.is_empty() {
                warn!("MATCH [{}]: nobody connected, closing", act.match_id());
                ctx.stop();
            }
        });
        self.settle(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("MATCH [{}]: actor stopped", self.match_id());
        self.metrics.match_closed();
        if let Some(on_close) = &self.on_close {
            on_close.do_send(MatchClosed {
                match_id: self.match_id(),
            });
        }
    }
}

impl Handler<Connect> for MatchActor {
    type Result = Result<(), StateError>;

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        let Some(participant) = self.game.participant(msg.player_id).copied() else {
            return Err(StateError::NotParticipant {
                match_id: self.match_id(),
                player_id: msg.player_id,
            });
        };
        info!(
            "MATCH [{}]: {} connected as {}",
            self.match_id(),
            msg.player_id,
            participant.color
        );
        msg.addr.do_send(ServerMessage::Connected {
            match_id: self.match_id(),
            player_id: msg.player_id,
            color: participant.color,
        });
        msg.addr.do_send(ServerMessage::State {
            state: Box::new(visibility::project(&self.game, msg.player_id)),
        });
        self.connections.insert(msg.player_id, msg.addr);
        Ok(())
    }
}

impl Handler<Disconnect> for MatchActor {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Self::Context) {
        if self.connections.remove(&msg.player_id).is_none() {
            return;
        }
        info!("MATCH [{}]: {} disconnected", self.match_id(), msg.player_id);
        if let Some(outcome) = self.game.disconnect(msg.player_id) {
            debug!("MATCH [{}]: finished by disconnect, {:?}", self.match_id(), outcome);
            self.settle(ctx);
        }
        if self.connections.is_empty() {
            ctx.stop();
        }
    }
}

impl Handler<SubmitAction> for MatchActor {
    type Result = Result<ActionReport, ActionError>;

    fn handle(&mut self, msg: SubmitAction, ctx: &mut Self::Context) -> Self::Result {
        let result = self.game.submit(msg.player_id, &msg.request, Instant::now());
        self.record(&msg.request, &result);
        if let Err(e) = &result {
            debug!(
                "MATCH [{}]: action from {} rejected: {}",
                self.match_id(),
                msg.player_id,
                e
            );
        }
        if let Some(addr) = self.connections.get(&msg.player_id) {
            addr.do_send(ServerMessage::action_result(&result));
        }
        if result.is_ok() {
            self.settle(ctx);
        }
        result
    }
}

impl Handler<RevealComplete> for MatchActor {
    type Result = ();

    fn handle(&mut self, msg: RevealComplete, ctx: &mut Self::Context) {
        match self.game.acknowledge_reveal(msg.player_id) {
            Some(resolution) => self.on_reveal_resolved(resolution, ctx),
            None => debug!(
                "MATCH [{}]: stray reveal acknowledgement from {}",
                self.match_id(),
                msg.player_id
            ),
        }
    }
}

impl Handler<VoteRematch> for MatchActor {
    type Result = Result<bool, ActionError>;

    fn handle(&mut self, msg: VoteRematch, ctx: &mut Self::Context) -> Self::Result {
        let agreed = self.game.vote_rematch(msg.player_id)?;
        if agreed {
            self.announced = false;
            if let Some(handle) = self.reveal_timer.take() {
                ctx.cancel_future(handle);
            }
            for (player_id, addr) in &self.connections {
                if let Some(p) = self.game.participant(*player_id) {
                    addr.do_send(ServerMessage::RematchStarted { color: p.color });
                }
            }
            self.settle(ctx);
        }
        Ok(agreed)
    }
}

impl Handler<Resign> for MatchActor {
    type Result = Result<(), ActionError>;

    fn handle(&mut self, msg: Resign, ctx: &mut Self::Context) -> Self::Result {
        self.game.resign(msg.player_id)?;
        self.settle(ctx);
        Ok(())
    }
}

impl Handler<SyncState> for MatchActor {
    type Result = MessageResult<SyncState>;

    fn handle(&mut self, msg: SyncState, _ctx: &mut Self::Context) -> Self::Result {
        let state = visibility::project(&self.game, msg.player_id);
        if let Some(addr) = self.connections.get(&msg.player_id) {
            addr.do_send(ServerMessage::State {
                state: Box::new(state.clone()),
            });
        }
        MessageResult(state)
    }
}
