use std::{collections::HashMap, sync::Arc};

use actix::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    env::{AiSettings, GameSettings},
    exception::{GameError, StateError},
    game::{Match, Participant},
    metrics::MetricsCtx,
    oracle::Color,
};

use super::{
    match_actor::MatchActor,
    messages::{ActiveMatches, CreateMatch, FindMatch, MatchClosed, MatchCreated, Opponent},
};

/// 진행 중인 매치를 매치 id 와 참가자 id 로 찾을 수 있게 한다.
pub struct MatchRegistry {
    matches: HashMap<Uuid, Addr<MatchActor>>,
    seats: HashMap<Uuid, Uuid>,
    game_settings: GameSettings,
    ai_settings: AiSettings,
    metrics: Arc<MetricsCtx>,
}

impl MatchRegistry {
    pub fn new(game_settings: GameSettings, ai_settings: AiSettings, metrics: Arc<MetricsCtx>) -> Self {
        Self {
            matches: HashMap::new(),
            seats: HashMap::new(),
            game_settings,
            ai_settings,
            metrics,
        }
    }
}

impl Actor for MatchRegistry {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("MatchRegistry started");
    }
}

impl Handler<CreateMatch> for MatchRegistry {
    type Result = Result<MatchCreated, GameError>;

    fn handle(&mut self, msg: CreateMatch, ctx: &mut Self::Context) -> Self::Result {
        let creator_color = msg.color.unwrap_or(Color::White);
        let creator = Participant::human(creator_color);
        let opponent = match msg.opponent {
            Opponent::Human => Participant::human(creator_color.opposite()),
            Opponent::Ai { difficulty } => Participant::ai(
                creator_color.opposite(),
                difficulty.unwrap_or(self.ai_settings.default_difficulty),
            ),
        };
        // 백이 항상 participants[0]
        let participants = if creator_color == Color::White {
            [creator, opponent]
        } else {
            [opponent, creator]
        };

        let match_id = Uuid::new_v4();
        let game = Match::new(match_id, participants, self.game_settings.clone());
        let actor = MatchActor::new(
            game,
            self.ai_settings.clone(),
            self.metrics.clone(),
            Some(ctx.address().recipient()),
        )
        .start();

        self.matches.insert(match_id, actor);
        for p in &participants {
            self.seats.insert(p.id, match_id);
        }
        self.metrics.match_created();
        info!("MATCH [{}]: created ({:?})", match_id, msg.opponent);

        Ok(MatchCreated {
            match_id,
            participants: participants.to_vec(),
        })
    }
}

impl Handler<FindMatch> for MatchRegistry {
    type Result = Result<Addr<MatchActor>, StateError>;

    fn handle(&mut self, msg: FindMatch, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self
            .matches
            .get(&msg.match_id)
            .ok_or(StateError::MatchNotFound(msg.match_id))?;
        match self.seats.get(&msg.player_id) {
            Some(seated) if *seated == msg.match_id => Ok(addr.clone()),
            Some(_) | None => {
                warn!(
                    "MATCH [{}]: {} tried to join without a seat",
                    msg.match_id, msg.player_id
                );
                Err(StateError::NotParticipant {
                    match_id: msg.match_id,
                    player_id: msg.player_id,
                })
            }
        }
    }
}

impl Handler<MatchClosed> for MatchRegistry {
    type Result = ();

    fn handle(&mut self, msg: MatchClosed, _ctx: &mut Self::Context) {
        self.matches.remove(&msg.match_id);
        self.seats.retain(|_, match_id| *match_id != msg.match_id);
        debug!("MATCH [{}]: removed from registry", msg.match_id);
    }
}

impl Handler<ActiveMatches> for MatchRegistry {
    type Result = usize;

    fn handle(&mut self, _msg: ActiveMatches, _ctx: &mut Self::Context) -> usize {
        self.matches.len()
    }
}
