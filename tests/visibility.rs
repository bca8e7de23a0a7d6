mod common;

use arcana_server::{
    arcana::CardId,
    game::{
        intent::TargetParams,
        visibility::{project, CardView},
    },
    oracle::Color,
};
use common::{sq, Table};
use uuid::Uuid;

#[test]
fn fog_hides_the_casters_moves_until_control_returns() {
    // Given: 백이 안개를 건다
    let mut table = Table::standard().arm(Color::White, &[CardId::FogOfWar]);
    table
        .use_card(Color::White, CardId::FogOfWar, TargetParams::default())
        .unwrap();
    table.ack(Color::White);

    // When: 안개 아래에서 백이 둔다
    table.play(Color::White, "e2", "e4").unwrap();

    // Then: 흑에게는 lastMove 가 가려지고, 백 자신은 그대로 본다
    let black_view = project(&table.game, table.black);
    let white_view = project(&table.game, table.white);
    assert!(table.game.registry().fog[Color::White]);
    assert_eq!(black_view.last_move, None);
    assert_eq!(white_view.last_move.map(|m| m.to), Some(sq("e4")));

    // 흑의 턴이 끝나 제어가 백에게 돌아오면 안개가 걷힌다
    table.play(Color::Black, "e7", "e5").unwrap();
    assert!(!table.game.registry().fog[Color::White]);
    let white_view = project(&table.game, table.white);
    let black_view = project(&table.game, table.black);
    assert_eq!(white_view.last_move.map(|m| m.to), Some(sq("e5")));
    assert_eq!(black_view.last_move.map(|m| m.to), Some(sq("e5")));
}

#[test]
fn opponent_cards_are_counted_but_not_named() {
    let table = Table::standard().arm(Color::White, &[CardId::Vision, CardId::Execution]);

    let black_view = project(&table.game, table.black);
    let white_hand = black_view
        .hands
        .iter()
        .find(|h| h.color == Color::White)
        .unwrap();

    assert_eq!(white_hand.cards.len(), 3);
    assert!(white_hand.cards.iter().all(|c| *c == CardView::Hidden));

    let own = project(&table.game, table.white);
    let own_hand = own.hands.iter().find(|h| h.color == Color::White).unwrap();
    assert!(own_hand
        .cards
        .iter()
        .any(|c| matches!(c, CardView::Known { card: CardId::Execution, .. })));
}

#[test]
fn strangers_see_no_hand_and_no_fogged_move() {
    let mut table = Table::standard().arm(Color::White, &[CardId::FogOfWar]);
    table
        .use_card(Color::White, CardId::FogOfWar, TargetParams::default())
        .unwrap();
    table.ack(Color::White);
    table.play(Color::White, "d2", "d4").unwrap();

    let view = project(&table.game, Uuid::new_v4());

    assert_eq!(view.viewer_color, None);
    assert_eq!(view.last_move, None);
    assert!(view
        .hands
        .iter()
        .flat_map(|h| h.cards.iter())
        .all(|c| *c == CardView::Hidden));
    assert_eq!(view.draw_available_at, None);
}

#[test]
fn pending_draw_shows_up_in_the_drawers_view() {
    let mut table = Table::standard().arm(Color::White, &[]);
    table.draw(Color::White).unwrap();

    let view = project(&table.game, table.white);

    assert!(view.pending_reveal.is_some());
    assert_eq!(view.side_to_move, Color::White);
    assert_eq!(view.ply, 1);
}

#[test]
fn a_drawn_card_stays_secret_until_the_reveal_ends() {
    // Given: 백이 카드를 뽑고 공개 애니메이션이 진행 중
    let mut table = Table::standard().arm(Color::White, &[]);
    let report = table.draw(Color::White).unwrap();
    let drawn: CardId = serde_json::from_value(report.details["card"]["card"].clone()).unwrap();

    // When: 흑과 관전자의 시점으로 투영
    let black_view = project(&table.game, table.black);
    let stranger_view = project(&table.game, Uuid::new_v4());
    let white_view = project(&table.game, table.white);

    // Then: 대기 중인 공개는 보이지만 카드 이름은 뽑은 사람에게만
    let pending = black_view.pending_reveal.unwrap();
    assert_eq!(pending.owner_color, Color::White);
    assert_eq!(pending.card, None);
    assert_eq!(stranger_view.pending_reveal.unwrap().card, None);
    assert_eq!(white_view.pending_reveal.unwrap().card, Some(drawn));

    let wire = serde_json::to_value(&black_view).unwrap();
    assert!(wire["pendingReveal"].get("card").is_none());
}
