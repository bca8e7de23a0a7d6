use serde::Serialize;
use tracing::{debug, warn};

use super::{CapturedPool, EffectRegistry, MindControl, Mirror, Poison};
use crate::oracle::{Color, Piece, PieceKind, Position, Square};

/// Board consequences applied by one decay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayReport {
    pub poison_kills: Vec<Square>,
    pub mirrors_vanished: Vec<Square>,
    pub reverted: Vec<Square>,
    /// Removals and reverts the oracle refused this pass, typically a piece
    /// pinned to its own king. The entry stays at one turn and is retried by
    /// the next pass.
    pub deferred: Vec<Square>,
}

impl DecayReport {
    pub fn is_empty(&self) -> bool {
        self.poison_kills.is_empty()
            && self.mirrors_vanished.is_empty()
            && self.reverted.is_empty()
            && self.deferred.is_empty()
    }
}

/// Runs once per completed turn, `ending` being the color whose turn just
/// finished. The steps run in a fixed order:
///
/// 1. tick duration-counted collections, applying terminal consequences
/// 2. revert elapsed mind control
/// 3. clear one-turn flags, the echo pattern and unspent extra-move grants
/// 4. tick castling locks
/// 5. expire the shield that guarded against `ending`
///
/// Fog of war survives the opponent's turn and clears only once control is
/// about to return to the color that cast it.
pub fn run_decay_pass(
    registry: &mut EffectRegistry,
    position: &mut Position,
    captured: &mut CapturedPool,
    ending: Color,
) -> DecayReport {
    let mut report = DecayReport::default();

    // 1. duration-counted collections
    tick_squares(&mut registry.sanctuaries);
    tick_squares(&mut registry.cursed_squares);
    registry.fortresses.retain_mut(|f| tick(&mut f.turns_remaining));
    registry.blessings.retain_mut(|b| tick(&mut b.turns_remaining));

    let mut expired_poisons = Vec::new();
    registry.poisons.retain_mut(|p| {
        let alive = tick(&mut p.turns_remaining);
        if !alive {
            expired_poisons.push(*p);
        }
        alive
    });
    for poison in expired_poisons {
        let square = poison.square;
        match position.piece_at(square) {
            Some(piece) if piece.kind != PieceKind::King => {
                if position.edit(|editor| editor.remove(square)).is_some() {
                    captured.push(piece);
                    registry.mind_controls.retain(|c| c.square != square);
                    report.poison_kills.push(square);
                } else {
                    // 핀에 묶인 말: 지금 치우면 잘못된 국면이 된다. 다음 감쇠에서 다시 시도.
                    warn!("poison kill on {} rejected by the oracle, deferred", square);
                    registry.poisons.push(Poison {
                        turns_remaining: 1,
                        ..poison
                    });
                    report.deferred.push(square);
                }
            }
            Some(_) => debug!("poison on {} expired on a king, no kill", square),
            None => {}
        }
    }

    let mut expired_mirrors = Vec::new();
    registry.mirrors.retain_mut(|m| {
        let alive = tick(&mut m.turns_remaining);
        if !alive {
            expired_mirrors.push(*m);
        }
        alive
    });
    for mirror in expired_mirrors {
        let square = mirror.square;
        if position.piece_at(square) != Some(mirror.piece) {
            continue;
        }
        if position.edit(|editor| editor.remove(square)).is_some() {
            report.mirrors_vanished.push(square);
        } else {
            warn!("mirror removal on {} rejected by the oracle, deferred", square);
            registry.mirrors.push(Mirror {
                turns_remaining: 1,
                ..mirror
            });
            report.deferred.push(square);
        }
    }

    for ward in [&mut registry.divine.white, &mut registry.divine.black] {
        let expired = match ward.as_mut().and_then(|w| w.turns_remaining.as_mut()) {
            Some(turns) => !tick(turns),
            None => false,
        };
        if expired {
            *ward = None;
        }
    }

    // 2. mind control
    let mut elapsed = Vec::new();
    registry.mind_controls.retain_mut(|c| {
        let alive = tick(&mut c.turns_remaining);
        if !alive {
            elapsed.push(*c);
        }
        alive
    });
    for control in elapsed {
        let square = control.square;
        let Some(piece) = position.piece_at(square) else {
            continue;
        };
        if piece.color == control.original {
            continue;
        }
        let reverted = position.edit(|editor| {
            editor.put(square, Piece::new(piece.kind, control.original));
            Some(())
        });
        if reverted.is_some() {
            report.reverted.push(square);
        } else {
            warn!("mind control revert on {} rejected by the oracle, deferred", square);
            registry.mind_controls.push(MindControl {
                turns_remaining: 1,
                ..control
            });
            report.deferred.push(square);
        }
    }

    // 3. one-turn state
    registry.flags = Default::default();
    registry.echo = None;
    registry.extra_moves = Default::default();
    registry.follow_up_capture = Default::default();

    // 4. castling locks
    for color in Color::BOTH {
        registry.castling_locks[color] = registry.castling_locks[color].saturating_sub(1);
    }

    // 5. shields
    registry.shields[ending.opposite()] = None;
    registry.fog[ending.opposite()] = false;

    report
}

/// Decrements a counter, returning whether the entry stays alive.
fn tick(turns_remaining: &mut u32) -> bool {
    *turns_remaining = turns_remaining.saturating_sub(1);
    *turns_remaining > 0
}

fn tick_squares(entries: &mut Vec<super::TimedSquare>) {
    entries.retain_mut(|e| tick(&mut e.turns_remaining));
}
