//! Player kinematics for the arrival race
//!
//! A player keeps its current velocity for `reaction_time` seconds and then
//! runs straight to the target at `max_player_speed`. Arrival is uncertain:
//! the probability of having arrived by time T is a logistic curve centred on
//! the expected arrival time (Spearman 2018, Eq. 4).

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{distance, Point, Velocity};
use crate::params::ModelParameters;

/// Opaque roster key (usually the jersey number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        PlayerId(s)
    }
}

impl From<u32> for PlayerId {
    fn from(n: u32) -> Self {
        PlayerId(n.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacking,
    Defending,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Attacking => f.write_str("attacking"),
            Side::Defending => f.write_str("defending"),
        }
    }
}

/// Kinematic snapshot of one in-frame player at the evaluation instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    id: PlayerId,
    side: Side,
    is_goalkeeper: bool,
    position: Point,
    velocity: Velocity,
    max_speed: f64,
    reaction_time: f64,
    /// pi / sqrt(3) / tti_sigma
    logistic_slope: f64,
    control_rate: f64,
}

impl PlayerState {
    /// Missing or non-finite velocity components are treated as zero.
    pub fn new(
        id: impl Into<PlayerId>,
        side: Side,
        is_goalkeeper: bool,
        position: Point,
        velocity: Option<Velocity>,
        params: &ModelParameters,
    ) -> Self {
        let velocity = velocity
            .filter(|v| v.x.is_finite() && v.y.is_finite())
            .unwrap_or_else(Velocity::zeros);
        let control_rate = match side {
            Side::Attacking => params.attack_control_rate(),
            Side::Defending if is_goalkeeper => params.keeper_control_rate(),
            Side::Defending => params.defense_control_rate(),
        };
        Self {
            id: id.into(),
            side,
            is_goalkeeper,
            position,
            velocity,
            max_speed: params.max_player_speed(),
            reaction_time: params.reaction_time(),
            logistic_slope: PI / 3.0_f64.sqrt() / params.arrival_time_uncertainty(),
            control_rate,
        }
    }

    /// Individual speed cap; non-positive values are ignored.
    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        if max_speed.is_finite() && max_speed > 0.0 {
            self.max_speed = max_speed;
        }
        self
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn is_goalkeeper(&self) -> bool {
        self.is_goalkeeper
    }
    pub fn position(&self) -> Point {
        self.position
    }
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Rate (1/s) at which this player turns arrival into control
    pub fn control_rate(&self) -> f64 {
        self.control_rate
    }

    /// Expected arrival time at `target` (seconds)
    pub fn time_to_intercept(&self, target: &Point) -> f64 {
        let r_reaction = self.position + self.velocity * self.reaction_time;
        self.reaction_time + distance(&r_reaction, target) / self.max_speed
    }

    /// Arrival evaluation for one target.
    pub fn intercept(&self, target: &Point) -> Intercept {
        Intercept {
            time_to_intercept: self.time_to_intercept(target),
            logistic_slope: self.logistic_slope,
            control_rate: self.control_rate,
        }
    }
}

/// Arrival time of one player at one target. Computed fresh per target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intercept {
    pub time_to_intercept: f64,
    logistic_slope: f64,
    control_rate: f64,
}

impl Intercept {
    /// Probability the player has arrived by time `t`
    #[inline]
    pub fn arrival_probability(&self, t: f64) -> f64 {
        1.0 / (1.0 + (-self.logistic_slope * (t - self.time_to_intercept)).exp())
    }

    #[inline]
    pub fn control_rate(&self) -> f64 {
        self.control_rate
    }

    /// Still in the race: arrives within `veto_time` of the side's fastest.
    #[inline]
    pub fn is_contender(&self, tau_min: f64, veto_time: f64) -> bool {
        self.time_to_intercept - tau_min < veto_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(side: Side, gk: bool, pos: (f64, f64), vel: (f64, f64)) -> PlayerState {
        PlayerState::new(
            "7",
            side,
            gk,
            Point::new(pos.0, pos.1),
            Some(Velocity::new(vel.0, vel.1)),
            &ModelParameters::default(),
        )
    }

    #[test]
    fn test_time_to_intercept_stationary() {
        let p = player(Side::Attacking, false, (0.0, 0.0), (0.0, 0.0));
        let t = p.time_to_intercept(&Point::new(10.0, 0.0));
        assert!((t - (0.7 + 10.0 / 5.0)).abs() < 1e-12);
        assert!((p.time_to_intercept(&Point::new(0.0, 0.0)) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_time_to_intercept_uses_reaction_drift() {
        // Running toward the target at 5 m/s covers 3.5m during the reaction
        let p = player(Side::Attacking, false, (0.0, 0.0), (5.0, 0.0));
        let t = p.time_to_intercept(&Point::new(10.0, 0.0));
        assert!((t - (0.7 + 6.5 / 5.0)).abs() < 1e-12);

        // Running away costs the same distance back
        let p = player(Side::Attacking, false, (0.0, 0.0), (-5.0, 0.0));
        let t = p.time_to_intercept(&Point::new(10.0, 0.0));
        assert!((t - (0.7 + 13.5 / 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_velocity_is_zero() {
        let params = ModelParameters::default();
        let p = PlayerState::new("1", Side::Defending, false, Point::origin(), None, &params);
        assert_eq!(p.velocity(), Velocity::zeros());
        let p = PlayerState::new(
            "1",
            Side::Defending,
            false,
            Point::origin(),
            Some(Velocity::new(f64::NAN, 1.0)),
            &params,
        );
        assert_eq!(p.velocity(), Velocity::zeros());
    }

    #[test]
    fn test_arrival_probability_logistic() {
        let p = player(Side::Attacking, false, (0.0, 0.0), (0.0, 0.0));
        let ic = p.intercept(&Point::new(10.0, 0.0));
        assert!((ic.arrival_probability(ic.time_to_intercept) - 0.5).abs() < 1e-12);
        assert!(ic.arrival_probability(ic.time_to_intercept + 2.0) > 0.99);
        assert!(ic.arrival_probability(ic.time_to_intercept - 2.0) < 0.01);
        // symmetric around the expected arrival
        let a = ic.arrival_probability(ic.time_to_intercept + 0.3);
        let b = ic.arrival_probability(ic.time_to_intercept - 0.3);
        assert!((a + b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_control_rates() {
        let att = player(Side::Attacking, false, (0.0, 0.0), (0.0, 0.0));
        let att_gk = player(Side::Attacking, true, (0.0, 0.0), (0.0, 0.0));
        let def = player(Side::Defending, false, (0.0, 0.0), (0.0, 0.0));
        let gk = player(Side::Defending, true, (0.0, 0.0), (0.0, 0.0));
        assert_eq!(att.control_rate(), 4.3);
        // only the defending keeper catches
        assert_eq!(att_gk.control_rate(), 4.3);
        assert_eq!(def.control_rate(), 4.3);
        assert!((gk.control_rate() - 12.9).abs() < 1e-12);
    }

    #[test]
    fn test_individual_speed() {
        let p = player(Side::Attacking, false, (0.0, 0.0), (0.0, 0.0)).with_max_speed(10.0);
        assert!((p.time_to_intercept(&Point::new(10.0, 0.0)) - 1.7).abs() < 1e-12);
        let p = p.with_max_speed(-1.0);
        assert_eq!(p.max_speed(), 10.0);
    }

    #[test]
    fn test_contender_window() {
        let p = player(Side::Attacking, false, (0.0, 0.0), (0.0, 0.0));
        let ic = p.intercept(&Point::new(10.0, 0.0)); // 2.7s
        assert!(ic.is_contender(0.7, 3.0));
        assert!(!ic.is_contender(0.7, 2.0));
    }
}
