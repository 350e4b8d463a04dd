//! Pitch control at a single target
//!
//! Probability that each team gains first control if the ball is moved to
//! `target` (Spearman 2018, Eq. 3).
//!
//! 1. Ball travel time: distance / average ball speed (0 if the ball is
//!    already there).
//! 2. Fastest arrival per side.
//! 3. Veto: if one side trails by more than the other side's veto time the
//!    race is decided without integrating.
//! 4. Otherwise prune players outside their side's veto window and
//!    integrate the claim equation from the ball arrival time until the
//!    unclaimed mass drops below `convergence_tolerance` or the horizon runs
//!    out.
//!
//! An exact tie in arrival times always takes the integration path: the
//! veto tests need a strictly positive lag of at least the veto time.
//!
//! One step claims `unclaimed * sum(rate * P_arrival * dt)` over every
//! remaining contender of both sides. Once that summed step claim exceeds 1
//! the step overshoots; several players already at the target while the
//! ball is still travelling is enough with default parameters. A total
//! above `1 + convergence_tolerance` is a [`ControlOverflow`] carrying the
//! largest summed step claim, and a smaller `integration_step` resolves it.
//!
//! [`ControlOverflow`]: PitchControlError::ControlOverflow

use serde::Serialize;
use tracing::warn;

use crate::error::{PitchControlError, Result};
use crate::geometry::{distance, Point};
use crate::params::ModelParameters;
use crate::player::{Intercept, PlayerId, PlayerState, Side};

/// How a target was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Defence arrives so much earlier that attack cannot win
    DefenseVeto,
    /// Attack arrives so much earlier that defence cannot win
    AttackVeto,
    Converged { steps: usize },
    /// Horizon exhausted; `residual` is the unclaimed mass
    Unconverged { steps: usize, residual: f64 },
}

impl Outcome {
    pub fn steps(&self) -> usize {
        match self {
            Outcome::DefenseVeto | Outcome::AttackVeto => 0,
            Outcome::Converged { steps } | Outcome::Unconverged { steps, .. } => *steps,
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Outcome::DefenseVeto | Outcome::AttackVeto)
    }

    pub fn is_converged(&self) -> bool {
        !matches!(self, Outcome::Unconverged { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetControl {
    pub attack: f64,
    pub defense: f64,
    pub outcome: Outcome,
}

impl TargetControl {
    pub fn total(&self) -> f64 {
        self.attack + self.defense
    }

    /// Unclaimed probability mass
    pub fn residual(&self) -> f64 {
        1.0 - self.total()
    }
}

/// Probability claimed by one player during integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerControl {
    pub id: PlayerId,
    pub side: Side,
    pub probability: f64,
}

struct Contender<'p> {
    player: &'p PlayerState,
    intercept: Intercept,
    claimed: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetResolver<'a> {
    params: &'a ModelParameters,
}

impl<'a> TargetResolver<'a> {
    pub fn new(params: &'a ModelParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ModelParameters {
        self.params
    }

    /// Seconds for the ball to reach `target`; 0 when the origin is unknown.
    pub fn ball_travel_time(&self, target: &Point, ball_origin: Option<Point>) -> f64 {
        match ball_origin {
            Some(origin) if origin.x.is_finite() && origin.y.is_finite() => {
                distance(&origin, target) / self.params.average_ball_speed()
            }
            _ => 0.0,
        }
    }

    pub fn resolve(
        &self,
        target: Point,
        attacking: &[PlayerState],
        defending: &[PlayerState],
        ball_origin: Option<Point>,
    ) -> Result<TargetControl> {
        self.run(target, attacking, defending, ball_origin, None)
    }

    /// Like [`resolve`](Self::resolve), also returning each contender's
    /// claimed probability. Vetoed targets have no contributions.
    pub fn resolve_with_contributions(
        &self,
        target: Point,
        attacking: &[PlayerState],
        defending: &[PlayerState],
        ball_origin: Option<Point>,
    ) -> Result<(TargetControl, Vec<PlayerControl>)> {
        let mut contributions = Vec::new();
        let control =
            self.run(target, attacking, defending, ball_origin, Some(&mut contributions))?;
        Ok((control, contributions))
    }

    fn run(
        &self,
        target: Point,
        attacking: &[PlayerState],
        defending: &[PlayerState],
        ball_origin: Option<Point>,
        contributions: Option<&mut Vec<PlayerControl>>,
    ) -> Result<TargetControl> {
        if attacking.is_empty() {
            return Err(PitchControlError::EmptyRoster { side: Side::Attacking });
        }
        if defending.is_empty() {
            return Err(PitchControlError::EmptyRoster { side: Side::Defending });
        }

        let params = self.params;
        let ball_travel_time = self.ball_travel_time(&target, ball_origin);

        let mut att = contenders(attacking, &target);
        let mut def = contenders(defending, &target);
        let tau_min_att = fastest(&att);
        let tau_min_def = fastest(&def);

        if tau_min_att - ball_travel_time.max(tau_min_def) >= params.defense_veto_time() {
            return Ok(TargetControl { attack: 0.0, defense: 1.0, outcome: Outcome::DefenseVeto });
        }
        if tau_min_def - ball_travel_time.max(tau_min_att) >= params.attack_veto_time() {
            return Ok(TargetControl { attack: 1.0, defense: 0.0, outcome: Outcome::AttackVeto });
        }

        att.retain(|c| c.intercept.is_contender(tau_min_att, params.attack_veto_time()));
        def.retain(|c| c.intercept.is_contender(tau_min_def, params.defense_veto_time()));

        let dt = params.integration_step();
        let tol = params.convergence_tolerance();
        let max_steps = params.max_integration_steps();

        let (mut p_att, mut p_def) = (0.0_f64, 0.0_f64);
        let mut step_claim = 0.0_f64;
        let mut steps = 0;
        while 1.0 - (p_att + p_def) > tol && steps < max_steps {
            let t = ball_travel_time + steps as f64 * dt;
            let unclaimed = 1.0 - p_att - p_def;
            let (att_total, att_claim) = claim_step(&mut att, unclaimed, t, dt)?;
            let (def_total, def_claim) = claim_step(&mut def, unclaimed, t, dt)?;
            p_att = att_total;
            p_def = def_total;
            step_claim = step_claim.max(att_claim + def_claim);
            steps += 1;
        }

        let total = p_att + p_def;
        if total > 1.0 + tol {
            return Err(PitchControlError::ControlOverflow {
                x: target.x,
                y: target.y,
                total,
                tolerance: tol,
                step_claim,
            });
        }

        let residual = 1.0 - total;
        let outcome = if residual > tol {
            warn!(x = target.x, y = target.y, residual, steps, "integration failed to converge");
            Outcome::Unconverged { steps, residual }
        } else {
            Outcome::Converged { steps }
        };

        if let Some(out) = contributions {
            out.extend(att.iter().chain(def.iter()).map(|c| PlayerControl {
                id: c.player.id().clone(),
                side: c.player.side(),
                probability: c.claimed,
            }));
        }

        Ok(TargetControl { attack: p_att, defense: p_def, outcome })
    }
}

/// Pitch control at one target with default resolver settings.
pub fn pitch_control_at_target(
    target: Point,
    attacking: &[PlayerState],
    defending: &[PlayerState],
    ball_origin: Option<Point>,
    params: &ModelParameters,
) -> Result<TargetControl> {
    TargetResolver::new(params).resolve(target, attacking, defending, ball_origin)
}

fn contenders<'p>(players: &'p [PlayerState], target: &Point) -> Vec<Contender<'p>> {
    players
        .iter()
        .map(|player| Contender { player, intercept: player.intercept(target), claimed: 0.0 })
        .collect()
}

fn fastest(contenders: &[Contender<'_>]) -> f64 {
    contenders.iter().map(|c| c.intercept.time_to_intercept).fold(f64::INFINITY, f64::min)
}

/// Advance one side by one step. Returns the side's new total and its
/// step claim, `sum(rate * P_arrival * dt)` before scaling by the unclaimed
/// mass.
fn claim_step(
    side: &mut [Contender<'_>],
    unclaimed: f64,
    t: f64,
    dt: f64,
) -> Result<(f64, f64)> {
    let mut total = 0.0;
    let mut claim = 0.0;
    for c in side.iter_mut() {
        let rate = c.intercept.arrival_probability(t) * c.intercept.control_rate() * dt;
        claim += rate;
        let increment = unclaimed * rate;
        if !(increment >= 0.0) {
            return Err(PitchControlError::NegativeIncrement {
                player: c.player.id().clone(),
                side: c.player.side(),
                time: t,
                increment,
            });
        }
        c.claimed += increment;
        total += c.claimed;
    }
    Ok((total, claim))
}
