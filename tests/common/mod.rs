#![allow(dead_code)]

use std::time::Instant;

use arcana_server::{
    arcana::CardId,
    env::GameSettings,
    exception::ActionError,
    game::{
        intent::{ActionRequest, TargetParams},
        ActionReport, Match, Participant,
    },
    oracle::{Color, PieceKind, Position, Square},
    validator::MoveRequest,
};
use uuid::Uuid;

pub fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

/// 고정 시드. 무작위 드로우가 매 실행마다 같은 카드를 낸다.
pub fn seeded() -> GameSettings {
    GameSettings {
        rng_seed: Some(7),
        ..GameSettings::default()
    }
}

/// 사람 대 사람 테이블
pub struct Table {
    pub game: Match,
    pub white: Uuid,
    pub black: Uuid,
}

impl Table {
    pub fn standard() -> Self {
        Self::with_settings(seeded())
    }

    pub fn with_settings(settings: GameSettings) -> Self {
        let white = Participant::human(Color::White);
        let black = Participant::human(Color::Black);
        let game = Match::new(Uuid::new_v4(), [white, black], settings);
        Self {
            game,
            white: white.id,
            black: black.id,
        }
    }

    pub fn at(fen: &str) -> Self {
        Self::standard().placed(fen)
    }

    pub fn placed(mut self, fen: &str) -> Self {
        self.game = self.game.with_position(Position::from_fen(fen).unwrap());
        self
    }

    /// 각성 상태로 만들고 `color` 에게 카드를 쥐여준다.
    pub fn arm(mut self, color: Color, cards: &[CardId]) -> Self {
        self.game = self.game.ascended_now().with_hand(color, cards);
        self
    }

    pub fn id_of(&self, color: Color) -> Uuid {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn play(&mut self, color: Color, from: &str, to: &str) -> Result<ActionReport, ActionError> {
        let player = self.id_of(color);
        self.game
            .submit(player, &ActionRequest::play(sq(from), sq(to)), Instant::now())
    }

    pub fn promote(
        &mut self,
        color: Color,
        from: &str,
        to: &str,
        kind: PieceKind,
    ) -> Result<ActionReport, ActionError> {
        let player = self.id_of(color);
        let request = ActionRequest {
            move_to: Some(MoveRequest {
                from: sq(from),
                to: sq(to),
                promotion: Some(kind),
            }),
            ..Default::default()
        };
        self.game.submit(player, &request, Instant::now())
    }

    pub fn draw(&mut self, color: Color) -> Result<ActionReport, ActionError> {
        let player = self.id_of(color);
        self.game.submit(player, &ActionRequest::draw(), Instant::now())
    }

    /// 손패에서 아직 쓰지 않은 `card` 인스턴스를 찾는다.
    pub fn instance(&self, color: Color, card: CardId) -> Uuid {
        self.game
            .hand(self.id_of(color))
            .and_then(|hand| hand.cards().iter().find(|c| c.card == card))
            .map(|c| c.instance_id)
            .unwrap_or_else(|| panic!("{} holds no {}", color, card))
    }

    pub fn use_card(
        &mut self,
        color: Color,
        card: CardId,
        target: TargetParams,
    ) -> Result<ActionReport, ActionError> {
        let instance_id = self.instance(color, card);
        self.use_instance(color, instance_id, target)
    }

    pub fn use_instance(
        &mut self,
        color: Color,
        instance_id: Uuid,
        target: TargetParams,
    ) -> Result<ActionReport, ActionError> {
        let player = self.id_of(color);
        self.game.submit(
            player,
            &ActionRequest::use_card(instance_id, target),
            Instant::now(),
        )
    }

    /// 공개 애니메이션 완료를 알린다. 대기 중인 공개가 없으면 패닉.
    pub fn ack(&mut self, color: Color) {
        let player = self.id_of(color);
        self.game
            .acknowledge_reveal(player)
            .expect("a reveal should be pending");
    }

    pub fn piece_at(&self, square: &str) -> Option<arcana_server::oracle::Piece> {
        self.game.position().piece_at(sq(square))
    }
}
