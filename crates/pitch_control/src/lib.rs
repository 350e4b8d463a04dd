//! # pitch_control - Spearman-style Pitch Control Model
//!
//! Computes, for any point on the pitch, the probability that each team
//! would gain control of the ball if it were passed there now.
//!
//! ## Features
//! - Physics-based time to intercept with reaction time and top speed
//! - Short-circuit vetoes when one team is clearly faster
//! - Numerical integration of the arrival/control race otherwise
//! - Offside filtering of the attacking roster
//! - Full-pitch surfaces evaluated row-parallel on rayon
//!
//! ## Usage
//! ```rust
//! use pitch_control::{
//!     generate_pitch_control_for_event, ModelParameters, PlayerId, PlayerState, Point, Roster,
//!     Side,
//! };
//!
//! let params = ModelParameters::default();
//! let attacker = PlayerState::new("9", Side::Attacking, false, Point::new(-10.0, 0.0), None, &params);
//! let keeper = PlayerState::new("1", Side::Defending, true, Point::new(50.0, 0.0), None, &params);
//! let defender = PlayerState::new("4", Side::Defending, false, Point::new(20.0, 5.0), None, &params);
//!
//! let attacking = Roster::new(Side::Attacking, None, vec![attacker]);
//! let defending = Roster::new(Side::Defending, Some(PlayerId::from("1")), vec![keeper, defender]);
//!
//! let surface =
//!     generate_pitch_control_for_event(&attacking, &defending, Some(Point::origin()), &params)
//!         .unwrap();
//! assert_eq!(surface.cols(), 50);
//! assert!(surface.is_valid());
//! ```

// Doc formatting lints - purely cosmetic
#![allow(clippy::doc_lazy_continuation)]

pub mod error;
pub mod geometry;
pub mod offside;
pub mod params;
pub mod player;
pub mod resolver;
pub mod roster;
pub mod surface;

pub use error::{PitchControlError, Result};
pub use geometry::{distance, FieldDimensions, Point, Velocity};
pub use offside::{OffsideFilter, OffsideOutcome, DEFAULT_OFFSIDE_TOLERANCE_M};
pub use params::{veto_time, ModelParameters, ParameterOverrides};
pub use player::{Intercept, PlayerId, PlayerState, Side};
pub use resolver::{
    pitch_control_at_target, Outcome, PlayerControl, TargetControl, TargetResolver,
};
pub use roster::{
    build_rosters, ColumnarFrame, FrameSnapshot, Goalkeepers, Roster, RosterSource, Rosters,
    TeamLabel, TeamSnapshot, TrackedPlayer,
};
pub use surface::{
    generate_pitch_control_for_event, generate_pitch_control_for_frame, ControlSurface,
    GridLayout, GridSpec, PassControl, SurfaceCheck, SurfaceDiagnostics, SurfaceGenerator,
    SurfaceOptions, DEFAULT_CELLS_X,
};
