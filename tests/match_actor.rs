mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix::prelude::*;
use arcana_server::{
    ai::AiDifficulty,
    env::{AiSettings, AscensionTrigger, GameSettings},
    exception::{ActionError, StateError},
    game::{intent::ActionRequest, Match, MatchOutcome, MatchStatus, Participant},
    metrics::MetricsCtx,
    oracle::Color,
    server::{
        match_actor::MatchActor,
        messages::{
            ActiveMatches, Connect, CreateMatch, Disconnect, FindMatch, Opponent, Resign,
            SubmitAction, SyncState, VoteRematch,
        },
        protocol::ServerMessage,
        registry::MatchRegistry,
    },
};
use common::{seeded, sq};
use uuid::Uuid;

/// ConnectionActor 대신 받은 메시지를 모아두는 테스트용 수신자
struct Collector {
    inbox: Arc<Mutex<Vec<ServerMessage>>>,
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<ServerMessage> for Collector {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, _ctx: &mut Self::Context) {
        self.inbox.lock().unwrap().push(msg);
    }
}

type Inbox = Arc<Mutex<Vec<ServerMessage>>>;

fn collector() -> (Recipient<ServerMessage>, Inbox) {
    let inbox = Arc::new(Mutex::new(Vec::new()));
    let addr = Collector {
        inbox: inbox.clone(),
    }
    .start();
    (addr.recipient(), inbox)
}

fn spawn_match(white: Participant, black: Participant, settings: GameSettings) -> Addr<MatchActor> {
    let game = Match::new(Uuid::new_v4(), [white, black], settings);
    MatchActor::new(game, AiSettings::default(), Arc::new(MetricsCtx::new()), None).start()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[actix::test]
async fn strangers_cannot_connect() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());
    let (addr, _) = collector();
    let stranger = Uuid::new_v4();

    let result = actor
        .send(Connect {
            player_id: stranger,
            addr,
        })
        .await
        .unwrap();

    assert!(matches!(result, Err(StateError::NotParticipant { player_id, .. }) if player_id == stranger));
}

#[actix::test]
async fn connected_player_gets_greeting_then_state() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());
    let (addr, inbox) = collector();

    actor
        .send(Connect {
            player_id: black.id,
            addr,
        })
        .await
        .unwrap()
        .unwrap();
    settle().await;

    let inbox = inbox.lock().unwrap();
    assert!(matches!(
        inbox[0],
        ServerMessage::Connected { color: Color::Black, .. }
    ));
    match &inbox[1] {
        ServerMessage::State { state } => {
            assert_eq!(state.viewer_color, Some(Color::Black));
            assert_eq!(state.ply, 0);
        }
        other => panic!("expected state, got {:?}", other),
    }
}

#[actix::test]
async fn accepted_move_is_answered_and_broadcast() {
    // Given: 두 사람 모두 접속
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());
    let (white_addr, white_inbox) = collector();
    let (black_addr, black_inbox) = collector();
    for (player_id, addr) in [(white.id, white_addr), (black.id, black_addr)] {
        actor.send(Connect { player_id, addr }).await.unwrap().unwrap();
    }

    // When: 백이 e4
    let report = actor
        .send(SubmitAction {
            player_id: white.id,
            request: ActionRequest::play(sq("e2"), sq("e4")),
        })
        .await
        .unwrap()
        .unwrap();
    settle().await;

    // Then: 요청자에게 결과, 양쪽에 새 상태
    assert!(report.turn_completed);
    assert!(white_inbox
        .lock()
        .unwrap()
        .iter()
        .any(|m| matches!(m, ServerMessage::ActionResult { ok: true, .. })));
    let black_inbox = black_inbox.lock().unwrap();
    assert!(!black_inbox
        .iter()
        .any(|m| matches!(m, ServerMessage::ActionResult { .. })));
    assert!(black_inbox
        .iter()
        .any(|m| matches!(m, ServerMessage::State { state } if state.ply == 1)));
}

#[actix::test]
async fn rejected_move_reports_the_reason() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());
    let (addr, inbox) = collector();
    actor
        .send(Connect {
            player_id: black.id,
            addr,
        })
        .await
        .unwrap()
        .unwrap();

    let result = actor
        .send(SubmitAction {
            player_id: black.id,
            request: ActionRequest::play(sq("e7"), sq("e5")),
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(result.unwrap_err(), ActionError::NotYourTurn);
    assert!(inbox.lock().unwrap().iter().any(|m| matches!(
        m,
        ServerMessage::ActionResult { ok: false, reason: Some(_), .. }
    )));
}

#[actix::test]
async fn missing_reveal_acknowledgement_times_out() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let settings = GameSettings {
        reveal_timeout_ms: 40,
        ascension_trigger: AscensionTrigger::Immediate,
        ..seeded()
    };
    let actor = spawn_match(white, black, settings);

    // 드로우 후 reveal_complete 를 보내지 않는다
    actor
        .send(SubmitAction {
            player_id: white.id,
            request: ActionRequest::draw(),
        })
        .await
        .unwrap()
        .unwrap();
    let pending = actor.send(SyncState { player_id: white.id }).await.unwrap();
    assert!(pending.pending_reveal.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = actor.send(SyncState { player_id: white.id }).await.unwrap();
    assert!(state.pending_reveal.is_none());
    assert_eq!(state.side_to_move, Color::Black);
}

#[actix::test]
async fn ai_that_runs_out_of_time_passes_its_turn() {
    let white = Participant::human(Color::White);
    let black = Participant::ai(Color::Black, AiDifficulty::Easy);
    let settings = GameSettings {
        ai_think_timeout_ms: 20,
        ..seeded()
    };
    let actor = spawn_match(white, black, settings);

    actor
        .send(SubmitAction {
            player_id: white.id,
            request: ActionRequest::play(sq("e2"), sq("e4")),
        })
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = actor.send(SyncState { player_id: white.id }).await.unwrap();
    assert_eq!(state.side_to_move, Color::White);
    assert_eq!(state.ply, 2);
}

#[actix::test]
async fn disconnect_hands_the_win_to_the_opponent() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());
    let (white_addr, _) = collector();
    let (black_addr, black_inbox) = collector();
    for (player_id, addr) in [(white.id, white_addr), (black.id, black_addr)] {
        actor.send(Connect { player_id, addr }).await.unwrap().unwrap();
    }

    actor.send(Disconnect { player_id: white.id }).await.unwrap();
    settle().await;

    assert!(black_inbox.lock().unwrap().iter().any(|m| matches!(
        m,
        ServerMessage::MatchOver {
            outcome: MatchOutcome::Disconnected { winner: Color::Black }
        }
    )));
    let state = actor.send(SyncState { player_id: black.id }).await.unwrap();
    assert_eq!(state.status, MatchStatus::Finished);
}

#[actix::test]
async fn rematch_needs_both_votes_and_swaps_colors() {
    let white = Participant::human(Color::White);
    let black = Participant::human(Color::Black);
    let actor = spawn_match(white, black, seeded());

    // 진행 중에는 투표할 수 없다
    let early = actor.send(VoteRematch { player_id: white.id }).await.unwrap();
    assert_eq!(early.unwrap_err(), ActionError::MatchInProgress);

    actor.send(Resign { player_id: black.id }).await.unwrap().unwrap();
    assert!(!actor
        .send(VoteRematch { player_id: white.id })
        .await
        .unwrap()
        .unwrap());
    assert!(actor
        .send(VoteRematch { player_id: black.id })
        .await
        .unwrap()
        .unwrap());

    let state = actor.send(SyncState { player_id: white.id }).await.unwrap();
    assert_eq!(state.status, MatchStatus::Ongoing);
    assert_eq!(state.viewer_color, Some(Color::Black));
    assert_eq!(state.ply, 0);
}

#[actix::test]
async fn registry_finds_matches_by_seat() {
    let registry =
        MatchRegistry::new(seeded(), AiSettings::default(), Arc::new(MetricsCtx::new())).start();

    let created = registry
        .send(CreateMatch {
            opponent: Opponent::Ai { difficulty: None },
            color: Some(Color::Black),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.participants.len(), 2);
    let human = created
        .participants
        .iter()
        .find(|p| !p.is_ai())
        .copied()
        .unwrap();
    assert_eq!(human.color, Color::Black);
    assert_eq!(registry.send(ActiveMatches).await.unwrap(), 1);

    let found = registry
        .send(FindMatch {
            match_id: created.match_id,
            player_id: human.id,
        })
        .await
        .unwrap();
    assert!(found.is_ok());

    let stranger = registry
        .send(FindMatch {
            match_id: created.match_id,
            player_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    assert!(matches!(stranger, Err(StateError::NotParticipant { .. })));

    let unknown = Uuid::new_v4();
    let missing = registry
        .send(FindMatch {
            match_id: unknown,
            player_id: human.id,
        })
        .await
        .unwrap();
    assert!(matches!(missing, Err(StateError::MatchNotFound(id)) if id == unknown));
}
