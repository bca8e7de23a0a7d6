use std::time::Duration;

use actix::{Actor, AsyncContext, Context};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use actix_ws::handle;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    exception::{ConnectionError, GameError},
    AppState,
};

use super::{
    connection::ConnectionActor,
    messages::{ActiveMatches, CreateMatch, FindMatch},
};

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub match_id: Uuid,
    pub player_id: Uuid,
}

/// 새 매치를 만들고 양쪽 좌석 id 를 돌려준다.
#[post("/match/create")]
#[instrument(skip(state))]
pub async fn create_match(
    state: web::Data<AppState>,
    body: web::Json<CreateMatch>,
) -> Result<HttpResponse, GameError> {
    let created = state.registry_addr.send(body.into_inner()).await??;
    info!(
        "Match {} created via HTTP with {} participants",
        created.match_id,
        created.participants.len()
    );
    Ok(HttpResponse::Created().json(created))
}

#[get("/matches/active")]
pub async fn active_matches(state: web::Data<AppState>) -> Result<HttpResponse, GameError> {
    let count = state.registry_addr.send(ActiveMatches).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "active": count })))
}

/// 좌석 확인 후 웹소켓으로 업그레이드하고 ConnectionActor 를 붙인다.
#[get("/game")]
#[instrument(skip(state, req, payload), fields(match_id = %query.match_id, player_id = %query.player_id))]
pub async fn game_ws(
    query: web::Query<JoinQuery>,
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, GameError> {
    let JoinQuery {
        match_id,
        player_id,
    } = query.into_inner();

    let match_addr = state
        .registry_addr
        .send(FindMatch {
            match_id,
            player_id,
        })
        .await?
        .map_err(|e| {
            warn!("Rejecting join for {} on match {}: {}", player_id, match_id, e);
            e
        })?;

    // WebSocket 핸드셰이크 및 스트림/세션 분리
    match handle(&req, payload) {
        Ok((response, session, stream)) => {
            let heartbeat_interval =
                Duration::from_secs(state.settings.server.heartbeat_interval_seconds);
            let client_timeout =
                Duration::from_secs(state.settings.server.heartbeat_timeout_seconds);
            let metrics = state.metrics.clone();

            ConnectionActor::create(|ctx: &mut Context<ConnectionActor>| {
                ctx.add_stream(stream);
                ConnectionActor::new(
                    session,
                    match_addr,
                    match_id,
                    player_id,
                    heartbeat_interval,
                    client_timeout,
                    metrics,
                )
            });

            info!(
                "ConnectionActor created for player {} on match {}",
                player_id, match_id
            );
            Ok(response)
        }
        Err(e) => {
            error!(
                "WebSocket handling/upgrade failed for player {}: {:?}",
                player_id, e
            );
            Err(ConnectionError::HandshakeFailed(e.to_string()).into())
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_match)
        .service(active_matches)
        .service(game_ws);
}
