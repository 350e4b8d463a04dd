//! # Model Parameters
//!
//! Physical and numerical constants of the pitch control model, with the
//! derived veto thresholds used for the short-circuit tests.
//!
//! ## Usage
//! ```rust
//! use pitch_control::params::{ModelParameters, ParameterOverrides};
//!
//! let defaults = ModelParameters::default();
//! let paper = ModelParameters::spearman_2018();
//! let custom = ParameterOverrides { max_player_speed: Some(5.5), ..Default::default() }
//!     .build()
//!     .unwrap();
//! assert!(custom.max_player_speed() > defaults.max_player_speed());
//! assert!(paper.defense_control_rate() > defaults.defense_control_rate());
//! ```

use std::f64::consts::{LN_10, PI};

use serde::{Deserialize, Serialize};

use crate::error::{PitchControlError, Result};

pub mod defaults {
    pub const MAX_PLAYER_SPEED: f64 = 5.0;
    pub const REACTION_TIME: f64 = 0.7;
    pub const ARRIVAL_TIME_UNCERTAINTY: f64 = 0.45;
    pub const CONTROL_RATE: f64 = 4.3;
    pub const DEFENDER_ADVANTAGE: f64 = 1.0;
    /// Goalkeepers can catch the ball
    pub const KEEPER_RATE_MULTIPLIER: f64 = 3.0;
    pub const AVERAGE_BALL_SPEED: f64 = 15.0;
    pub const INTEGRATION_STEP: f64 = 0.04;
    pub const MAX_INTEGRATION_HORIZON: f64 = 10.0;
    pub const CONVERGENCE_TOLERANCE: f64 = 0.01;
    pub const VETO_STRENGTH: f64 = 3.0;
    /// kappa in Spearman 2018
    pub const SPEARMAN_DEFENDER_ADVANTAGE: f64 = 1.72;
}

/// Optional overrides on top of the defaults.
///
/// This is also the on-disk shape of a parameter file: every key is
/// optional and missing keys fall back to [`defaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterOverrides {
    pub max_player_speed: Option<f64>,
    pub reaction_time: Option<f64>,
    /// tti_sigma
    pub arrival_time_uncertainty: Option<f64>,
    pub attack_control_rate: Option<f64>,
    /// Base defending rate, before `defender_advantage` is applied
    pub defense_control_rate: Option<f64>,
    pub defender_advantage: Option<f64>,
    pub keeper_rate_multiplier: Option<f64>,
    /// Explicit keeper rate; wins over `keeper_rate_multiplier`
    pub keeper_control_rate: Option<f64>,
    pub average_ball_speed: Option<f64>,
    pub integration_step: Option<f64>,
    pub max_integration_horizon: Option<f64>,
    pub convergence_tolerance: Option<f64>,
    pub veto_strength: Option<f64>,
}

impl ParameterOverrides {
    pub fn build(&self) -> Result<ModelParameters> {
        use defaults::*;

        let defender_advantage = self.defender_advantage.unwrap_or(DEFENDER_ADVANTAGE);
        let keeper_rate_multiplier = self.keeper_rate_multiplier.unwrap_or(KEEPER_RATE_MULTIPLIER);
        ensure_positive("defender_advantage", defender_advantage)?;
        ensure_positive("keeper_rate_multiplier", keeper_rate_multiplier)?;

        let defense_control_rate =
            self.defense_control_rate.unwrap_or(CONTROL_RATE) * defender_advantage;
        let keeper_control_rate =
            self.keeper_control_rate.unwrap_or(defense_control_rate * keeper_rate_multiplier);

        ModelParameters::new(RawParameters {
            max_player_speed: self.max_player_speed.unwrap_or(MAX_PLAYER_SPEED),
            reaction_time: self.reaction_time.unwrap_or(REACTION_TIME),
            arrival_time_uncertainty: self
                .arrival_time_uncertainty
                .unwrap_or(ARRIVAL_TIME_UNCERTAINTY),
            attack_control_rate: self.attack_control_rate.unwrap_or(CONTROL_RATE),
            defense_control_rate,
            keeper_control_rate,
            defender_advantage,
            average_ball_speed: self.average_ball_speed.unwrap_or(AVERAGE_BALL_SPEED),
            integration_step: self.integration_step.unwrap_or(INTEGRATION_STEP),
            max_integration_horizon: self
                .max_integration_horizon
                .unwrap_or(MAX_INTEGRATION_HORIZON),
            convergence_tolerance: self.convergence_tolerance.unwrap_or(CONVERGENCE_TOLERANCE),
            veto_strength: self.veto_strength.unwrap_or(VETO_STRENGTH),
        })
    }
}

struct RawParameters {
    max_player_speed: f64,
    reaction_time: f64,
    arrival_time_uncertainty: f64,
    attack_control_rate: f64,
    defense_control_rate: f64,
    keeper_control_rate: f64,
    defender_advantage: f64,
    average_ball_speed: f64,
    integration_step: f64,
    max_integration_horizon: f64,
    convergence_tolerance: f64,
    veto_strength: f64,
}

/// Immutable model configuration. Construct via [`Default`], a preset, or
/// [`ParameterOverrides::build`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParameters {
    max_player_speed: f64,
    reaction_time: f64,
    arrival_time_uncertainty: f64,
    attack_control_rate: f64,
    defense_control_rate: f64,
    keeper_control_rate: f64,
    defender_advantage: f64,
    average_ball_speed: f64,
    integration_step: f64,
    max_integration_horizon: f64,
    convergence_tolerance: f64,
    veto_strength: f64,
    attack_veto_time: f64,
    defense_veto_time: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        let sigma = defaults::ARRIVAL_TIME_UNCERTAINTY;
        let rate = defaults::CONTROL_RATE * defaults::DEFENDER_ADVANTAGE;
        let veto = veto_time(defaults::VETO_STRENGTH, sigma, rate);
        Self {
            max_player_speed: defaults::MAX_PLAYER_SPEED,
            reaction_time: defaults::REACTION_TIME,
            arrival_time_uncertainty: sigma,
            attack_control_rate: defaults::CONTROL_RATE,
            defense_control_rate: rate,
            keeper_control_rate: rate * defaults::KEEPER_RATE_MULTIPLIER,
            defender_advantage: defaults::DEFENDER_ADVANTAGE,
            average_ball_speed: defaults::AVERAGE_BALL_SPEED,
            integration_step: defaults::INTEGRATION_STEP,
            max_integration_horizon: defaults::MAX_INTEGRATION_HORIZON,
            convergence_tolerance: defaults::CONVERGENCE_TOLERANCE,
            veto_strength: defaults::VETO_STRENGTH,
            attack_veto_time: veto_time(defaults::VETO_STRENGTH, sigma, defaults::CONTROL_RATE),
            defense_veto_time: veto,
        }
    }
}

impl ModelParameters {
    fn new(raw: RawParameters) -> Result<Self> {
        ensure_positive("max_player_speed", raw.max_player_speed)?;
        ensure_positive("reaction_time", raw.reaction_time)?;
        ensure_positive("arrival_time_uncertainty", raw.arrival_time_uncertainty)?;
        ensure_positive("attack_control_rate", raw.attack_control_rate)?;
        ensure_positive("defense_control_rate", raw.defense_control_rate)?;
        ensure_positive("keeper_control_rate", raw.keeper_control_rate)?;
        ensure_positive("average_ball_speed", raw.average_ball_speed)?;
        ensure_positive("integration_step", raw.integration_step)?;
        ensure_positive("max_integration_horizon", raw.max_integration_horizon)?;
        ensure_positive("veto_strength", raw.veto_strength)?;

        let tol = raw.convergence_tolerance;
        if !(tol.is_finite() && tol > 0.0 && tol < 1.0) {
            return Err(PitchControlError::InvalidParameter {
                name: "convergence_tolerance",
                value: tol,
                reason: "must lie in (0, 1)",
            });
        }
        if raw.integration_step >= raw.max_integration_horizon {
            return Err(PitchControlError::InvalidParameter {
                name: "integration_step",
                value: raw.integration_step,
                reason: "must be shorter than max_integration_horizon",
            });
        }
        // Necessary, not sufficient: a step claims sum(rate * P_arrival * dt)
        // over every contender, so crowded targets can still overshoot. The
        // resolver reports those as ControlOverflow with the summed claim.
        let fastest_rate =
            raw.attack_control_rate.max(raw.defense_control_rate).max(raw.keeper_control_rate);
        if fastest_rate * raw.integration_step >= 1.0 {
            return Err(PitchControlError::InvalidParameter {
                name: "integration_step",
                value: raw.integration_step,
                reason: "a lone contender's step claim (control_rate * integration_step) \
                         must stay below 1",
            });
        }

        let sigma = raw.arrival_time_uncertainty;
        Ok(Self {
            attack_veto_time: veto_time(raw.veto_strength, sigma, raw.attack_control_rate),
            defense_veto_time: veto_time(raw.veto_strength, sigma, raw.defense_control_rate),
            max_player_speed: raw.max_player_speed,
            reaction_time: raw.reaction_time,
            arrival_time_uncertainty: sigma,
            attack_control_rate: raw.attack_control_rate,
            defense_control_rate: raw.defense_control_rate,
            keeper_control_rate: raw.keeper_control_rate,
            defender_advantage: raw.defender_advantage,
            average_ball_speed: raw.average_ball_speed,
            integration_step: raw.integration_step,
            max_integration_horizon: raw.max_integration_horizon,
            convergence_tolerance: tol,
            veto_strength: raw.veto_strength,
        })
    }

    /// Defaults with a different `veto_strength`.
    pub fn with_veto_strength(veto_strength: f64) -> Result<Self> {
        ParameterOverrides { veto_strength: Some(veto_strength), ..Default::default() }.build()
    }

    /// Defending players get the paper's control advantage (kappa = 1.72)
    pub fn spearman_2018() -> Self {
        let sigma = defaults::ARRIVAL_TIME_UNCERTAINTY;
        let rate = defaults::CONTROL_RATE * defaults::SPEARMAN_DEFENDER_ADVANTAGE;
        Self {
            defense_control_rate: rate,
            keeper_control_rate: rate * defaults::KEEPER_RATE_MULTIPLIER,
            defender_advantage: defaults::SPEARMAN_DEFENDER_ADVANTAGE,
            defense_veto_time: veto_time(defaults::VETO_STRENGTH, sigma, rate),
            ..Self::default()
        }
    }

    /// Decode a JSON parameter file (see [`ParameterOverrides`]).
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: ParameterOverrides = serde_json::from_str(json)?;
        overrides.build()
    }

    pub fn max_player_speed(&self) -> f64 {
        self.max_player_speed
    }
    pub fn reaction_time(&self) -> f64 {
        self.reaction_time
    }
    pub fn arrival_time_uncertainty(&self) -> f64 {
        self.arrival_time_uncertainty
    }
    pub fn attack_control_rate(&self) -> f64 {
        self.attack_control_rate
    }
    pub fn defense_control_rate(&self) -> f64 {
        self.defense_control_rate
    }
    pub fn keeper_control_rate(&self) -> f64 {
        self.keeper_control_rate
    }
    pub fn defender_advantage(&self) -> f64 {
        self.defender_advantage
    }
    pub fn average_ball_speed(&self) -> f64 {
        self.average_ball_speed
    }
    pub fn integration_step(&self) -> f64 {
        self.integration_step
    }
    pub fn max_integration_horizon(&self) -> f64 {
        self.max_integration_horizon
    }
    pub fn convergence_tolerance(&self) -> f64 {
        self.convergence_tolerance
    }
    pub fn veto_strength(&self) -> f64 {
        self.veto_strength
    }
    pub fn attack_veto_time(&self) -> f64 {
        self.attack_veto_time
    }
    pub fn defense_veto_time(&self) -> f64 {
        self.defense_veto_time
    }

    /// Number of integration steps that fit in the horizon
    pub fn max_integration_steps(&self) -> usize {
        ((self.max_integration_horizon / self.integration_step).round() as usize).max(1)
    }
}

/// Lag beyond which the trailing side wins with probability below
/// `10^-veto_strength` under the logistic arrival model.
pub fn veto_time(veto_strength: f64, sigma: f64, rate: f64) -> f64 {
    veto_strength * LN_10 * (3.0_f64.sqrt() * sigma / PI + 1.0 / rate)
}

fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PitchControlError::InvalidParameter {
            name,
            value,
            reason: "must be positive and finite",
        })
    }
}
