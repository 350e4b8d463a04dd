//! Offside filter
//!
//! Attackers beyond the offside line cannot legally receive the ball, so
//! they are removed before control is computed.
//!
//! - Attack direction comes from the defending goalkeeper: the sign of the
//!   keeper's x says which goal the defence protects.
//! - Line = max(second-deepest defender, ball, halfway) + tolerance, all
//!   projected onto that direction.

use serde::Serialize;
use tracing::debug;

use crate::error::{PitchControlError, Result};
use crate::geometry::Point;
use crate::player::{PlayerId, PlayerState};
use crate::roster::Roster;

/// Marginally offside players (up to this many meters) are kept.
pub const DEFAULT_OFFSIDE_TOLERANCE_M: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsideFilter {
    pub tolerance: f64,
}

impl Default for OffsideFilter {
    fn default() -> Self {
        Self { tolerance: DEFAULT_OFFSIDE_TOLERANCE_M }
    }
}

/// Result of filtering one attacking roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsideOutcome {
    pub onside: Roster,
    pub removed: Vec<PlayerId>,
    /// Line in projected coordinates (distance toward the defended goal),
    /// tolerance included
    pub line: f64,
    /// -1 (left goal), +1 (right goal), 0 (keeper on the halfway line)
    pub defending_half: f64,
}

impl OffsideFilter {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn apply(
        &self,
        attacking: &Roster,
        defending: &Roster,
        ball: Option<Point>,
    ) -> Result<OffsideOutcome> {
        let goalkeeper = defending.goalkeeper_state().ok_or_else(|| {
            PitchControlError::MissingGoalkeeper {
                id: defending
                    .goalkeeper()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<unassigned>".to_string()),
            }
        })?;

        let defending_half = sign(goalkeeper.position().x);
        let line = self.offside_line(defending.players(), ball, defending_half);

        let (onside, offside): (Vec<PlayerState>, Vec<PlayerState>) = attacking
            .players()
            .iter()
            .cloned()
            .partition(|p| p.position().x * defending_half <= line);

        for p in &offside {
            debug!(player = %p.id(), x = p.position().x, line, "attacker offside");
        }

        Ok(OffsideOutcome {
            onside: attacking.with_players(onside),
            removed: offside.into_iter().map(|p| p.id().clone()).collect(),
            line,
            defending_half,
        })
    }

    fn offside_line(&self, defenders: &[PlayerState], ball: Option<Point>, half: f64) -> f64 {
        let mut depths: Vec<f64> = defenders.iter().map(|p| half * p.position().x).collect();
        depths.sort_by(|a, b| b.total_cmp(a));

        let second_deepest = depths.get(1).copied().unwrap_or(f64::NEG_INFINITY);
        let ball_x = ball
            .filter(|b| b.x.is_finite())
            .map(|b| half * b.x)
            .unwrap_or(f64::NEG_INFINITY);

        second_deepest.max(ball_x).max(0.0) + self.tolerance
    }
}

/// numpy-style sign: 0 stays 0
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelParameters;
    use crate::player::Side;

    fn roster(side: Side, gk: Option<&str>, xs: &[(&str, f64)]) -> Roster {
        let params = ModelParameters::default();
        let players = xs
            .iter()
            .map(|(id, x)| {
                let is_gk = gk == Some(*id);
                PlayerState::new(*id, side, is_gk, Point::new(*x, 0.0), None, &params)
            })
            .collect();
        Roster::new(side, gk.map(PlayerId::from), players)
    }

    fn defence_right() -> Roster {
        roster(
            Side::Defending,
            Some("1"),
            &[("1", 50.0), ("2", 30.0), ("3", 20.0), ("4", 10.0)],
        )
    }

    #[test]
    fn test_removes_exactly_the_offside_attacker() {
        let defence = defence_right();
        // line = 30 + 0.2; "9" is 5m beyond it
        let attack = roster(
            Side::Attacking,
            None,
            &[("9", 35.2), ("10", 25.0), ("11", 30.1), ("7", -5.0)],
        );
        let out = OffsideFilter::default().apply(&attack, &defence, Some(Point::origin())).unwrap();

        assert_eq!(out.removed, vec![PlayerId::from("9")]);
        assert_eq!(out.onside.len(), 3);
        assert!((out.line - 30.2).abs() < 1e-12);
        assert_eq!(out.defending_half, 1.0);
    }

    #[test]
    fn test_ball_ahead_of_defence_moves_line() {
        let defence = defence_right();
        let attack = roster(Side::Attacking, None, &[("9", 35.2)]);
        let out =
            OffsideFilter::default().apply(&attack, &defence, Some(Point::new(40.0, 0.0))).unwrap();
        assert!(out.removed.is_empty());
        assert!((out.line - 40.2).abs() < 1e-12);
    }

    #[test]
    fn test_own_half_never_offside() {
        // defence pushed up beyond halfway: line clamps at 0
        let defence =
            roster(Side::Defending, Some("1"), &[("1", 5.0), ("2", -10.0), ("3", -20.0)]);
        let attack = roster(Side::Attacking, None, &[("9", 0.1), ("10", 0.5)]);
        let ball = Some(Point::new(-30.0, 0.0));
        let out = OffsideFilter::default().apply(&attack, &defence, ball).unwrap();
        assert!((out.line - 0.2).abs() < 1e-12);
        assert_eq!(out.removed, vec![PlayerId::from("10")]);
    }

    #[test]
    fn test_left_goal_direction() {
        let defence = roster(
            Side::Defending,
            Some("1"),
            &[("1", -50.0), ("2", -30.0), ("3", -20.0)],
        );
        let attack = roster(Side::Attacking, None, &[("9", -35.0), ("10", 35.0)]);
        let out = OffsideFilter::default().apply(&attack, &defence, None).unwrap();
        assert_eq!(out.defending_half, -1.0);
        assert_eq!(out.removed, vec![PlayerId::from("9")]);
    }

    #[test]
    fn test_missing_goalkeeper_is_fatal() {
        let defence = roster(Side::Defending, Some("99"), &[("2", 30.0), ("3", 20.0)]);
        let attack = roster(Side::Attacking, None, &[("9", 35.0)]);
        let err = OffsideFilter::default().apply(&attack, &defence, None).unwrap_err();
        assert!(matches!(err, PitchControlError::MissingGoalkeeper { ref id } if id == "99"));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_goalkeeper_resolved_from_roster_id() {
        let params = ModelParameters::default();
        let players = [("1", -50.0), ("2", -30.0), ("3", -20.0)]
            .iter()
            .map(|(id, x)| {
                PlayerState::new(*id, Side::Defending, false, Point::new(*x, 0.0), None, &params)
            })
            .collect();
        let defence = Roster::new(Side::Defending, Some(PlayerId::from("1")), players);
        let attack = roster(Side::Attacking, None, &[("9", -35.0), ("10", -25.0)]);

        let out = OffsideFilter::default().apply(&attack, &defence, None).unwrap();
        assert_eq!(out.defending_half, -1.0);
        assert_eq!(out.removed, vec![PlayerId::from("9")]);
    }

    #[test]
    fn test_lone_keeper_uses_ball_and_halfway() {
        let defence = roster(Side::Defending, Some("1"), &[("1", 50.0)]);
        let attack = roster(Side::Attacking, None, &[("9", 45.0), ("10", 10.0)]);
        let out =
            OffsideFilter::default().apply(&attack, &defence, Some(Point::new(20.0, 0.0))).unwrap();
        assert_eq!(out.removed, vec![PlayerId::from("9")]);
        assert!((out.line - 20.2).abs() < 1e-12);
    }

    #[test]
    fn test_keeper_on_halfway_keeps_everyone() {
        let defence = roster(Side::Defending, Some("1"), &[("1", 0.0), ("2", 30.0)]);
        let attack = roster(Side::Attacking, None, &[("9", 50.0), ("10", -50.0)]);
        let out = OffsideFilter::default().apply(&attack, &defence, None).unwrap();
        assert_eq!(out.defending_half, 0.0);
        assert!(out.removed.is_empty());
    }
}
