//! Roster assembly
//!
//! Turns a tracking snapshot into attacking/defending [`PlayerState`] lists.
//! Out-of-frame players (no finite position) are dropped here, before any
//! model evaluation.
//!
//! Two tracking layouts are supported through [`RosterSource`]:
//! - [`FrameSnapshot`]: one list of players per team
//! - [`ColumnarFrame`]: one flat row keyed `"{Team}_{id}_{x|y|vx|vy}"` plus
//!   `ball_x` / `ball_y`

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PitchControlError, Result};
use crate::geometry::{Point, Velocity};
use crate::params::ModelParameters;
use crate::player::{PlayerId, PlayerState, Side};

/// One player as delivered by the tracking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPlayer {
    pub id: PlayerId,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub velocity: Option<Velocity>,
}

impl TrackedPlayer {
    pub fn new(
        id: impl Into<PlayerId>,
        position: Option<Point>,
        velocity: Option<Velocity>,
    ) -> Self {
        Self { id: id.into(), position, velocity }
    }

    pub fn in_frame(&self) -> bool {
        self.position.map(|p| p.x.is_finite() && p.y.is_finite()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub players: Vec<TrackedPlayer>,
}

/// Both teams and the ball at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub home: TeamSnapshot,
    pub away: TeamSnapshot,
    #[serde(default)]
    pub ball: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamLabel {
    Home,
    Away,
}

impl TeamLabel {
    pub fn opponent(self) -> Self {
        match self {
            TeamLabel::Home => TeamLabel::Away,
            TeamLabel::Away => TeamLabel::Home,
        }
    }

    /// Column prefix used by flat tracking rows
    pub fn prefix(self) -> &'static str {
        match self {
            TeamLabel::Home => "Home",
            TeamLabel::Away => "Away",
        }
    }
}

impl fmt::Display for TeamLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Goalkeeper identities for (home, away)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goalkeepers {
    pub home: PlayerId,
    pub away: PlayerId,
}

impl Goalkeepers {
    pub fn new(home: impl Into<PlayerId>, away: impl Into<PlayerId>) -> Self {
        Self { home: home.into(), away: away.into() }
    }

    pub fn for_team(&self, label: TeamLabel) -> &PlayerId {
        match label {
            TeamLabel::Home => &self.home,
            TeamLabel::Away => &self.away,
        }
    }
}

/// In-frame players of one side at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    side: Side,
    goalkeeper: Option<PlayerId>,
    players: Vec<PlayerState>,
}

impl Roster {
    pub fn new(side: Side, goalkeeper: Option<PlayerId>, players: Vec<PlayerState>) -> Self {
        Self { side, goalkeeper, players }
    }

    /// Build from a team snapshot, dropping out-of-frame players.
    pub fn from_team(
        team: &TeamSnapshot,
        side: Side,
        goalkeeper: Option<&PlayerId>,
        params: &ModelParameters,
    ) -> Self {
        let players: Vec<PlayerState> = team
            .players
            .iter()
            .filter(|p| p.in_frame())
            .filter_map(|p| {
                let position = p.position?;
                let is_gk = goalkeeper == Some(&p.id);
                Some(PlayerState::new(p.id.clone(), side, is_gk, position, p.velocity, params))
            })
            .collect();

        debug!(
            side = %side,
            in_frame = players.len(),
            excluded = team.players.len() - players.len(),
            "roster assembled"
        );

        Self { side, goalkeeper: goalkeeper.cloned(), players }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Goalkeeper identity the roster was built with (may be out of frame)
    pub fn goalkeeper(&self) -> Option<&PlayerId> {
        self.goalkeeper.as_ref()
    }

    /// The in-frame goalkeeper: looked up by the roster's goalkeeper id when
    /// one is set, otherwise by the player's keeper flag.
    pub fn goalkeeper_state(&self) -> Option<&PlayerState> {
        match &self.goalkeeper {
            Some(id) => self.players.iter().find(|p| p.id() == id),
            None => self.players.iter().find(|p| p.is_goalkeeper()),
        }
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.players.is_empty() {
            return Err(PitchControlError::EmptyRoster { side: self.side });
        }
        Ok(())
    }

    /// Same side and goalkeeper, different player list
    pub fn with_players(&self, players: Vec<PlayerState>) -> Self {
        Self { side: self.side, goalkeeper: self.goalkeeper.clone(), players }
    }
}

/// Capability set a tracking provider must offer to feed the model.
pub trait RosterSource {
    fn team(&self, label: TeamLabel) -> Result<TeamSnapshot>;
    fn ball_position(&self) -> Option<Point>;
}

impl RosterSource for FrameSnapshot {
    fn team(&self, label: TeamLabel) -> Result<TeamSnapshot> {
        Ok(match label {
            TeamLabel::Home => self.home.clone(),
            TeamLabel::Away => self.away.clone(),
        })
    }

    fn ball_position(&self) -> Option<Point> {
        self.ball.filter(|b| b.x.is_finite() && b.y.is_finite())
    }
}

/// Flat tracking row: `Home_11_x`, `Home_11_vx`, `Away_1_y`, `ball_x`, ...
/// Missing values are NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnarFrame {
    columns: BTreeMap<String, f64>,
}

impl ColumnarFrame {
    pub fn new(columns: BTreeMap<String, f64>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns.get(column).copied()
    }

    /// Player ids that have at least one kinematic column for `label`
    pub fn player_ids(&self, label: TeamLabel) -> BTreeSet<String> {
        let prefix = format!("{}_", label.prefix());
        self.columns
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.rsplit_once('_'))
            .filter(|(_, field)| matches!(*field, "x" | "y" | "vx" | "vy"))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// The player furthest from the halfway line; on a kick-off frame this
    /// is the goalkeeper.
    pub fn infer_goalkeeper(&self, label: TeamLabel) -> Result<PlayerId> {
        let team = self.team(label)?;
        team.players
            .iter()
            .filter_map(|p| p.position.filter(|_| p.in_frame()).map(|pos| (p, pos.x.abs())))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p.id.clone())
            .ok_or_else(|| {
                PitchControlError::Tracking(format!(
                    "no in-frame {} players to pick a goalkeeper",
                    label
                ))
            })
    }

    fn pair(&self, x_col: &str, y_col: &str) -> Option<(f64, f64)> {
        match (self.get(x_col), self.get(y_col)) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        }
    }
}

impl FromIterator<(String, f64)> for ColumnarFrame {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self { columns: iter.into_iter().collect() }
    }
}

impl RosterSource for ColumnarFrame {
    fn team(&self, label: TeamLabel) -> Result<TeamSnapshot> {
        let mut players = Vec::new();
        for id in self.player_ids(label) {
            let base = format!("{}_{}", label.prefix(), id);
            let (x_col, y_col) = (format!("{}_x", base), format!("{}_y", base));
            if self.get(&x_col).is_none() || self.get(&y_col).is_none() {
                return Err(PitchControlError::Tracking(format!(
                    "player {} has no {} / {} columns",
                    base, x_col, y_col
                )));
            }
            let position = self.pair(&x_col, &y_col).map(|(x, y)| Point::new(x, y));
            let velocity = self
                .pair(&format!("{}_vx", base), &format!("{}_vy", base))
                .map(|(vx, vy)| Velocity::new(vx, vy));
            players.push(TrackedPlayer { id: PlayerId(id), position, velocity });
        }
        Ok(TeamSnapshot { players })
    }

    fn ball_position(&self) -> Option<Point> {
        self.pair("ball_x", "ball_y").map(|(x, y)| Point::new(x, y))
    }
}

/// Both rosters plus ball position for one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rosters {
    pub attacking: Roster,
    pub defending: Roster,
    pub ball: Option<Point>,
}

/// Split a snapshot into attacking (team in possession) and defending rosters.
pub fn build_rosters<S: RosterSource + ?Sized>(
    source: &S,
    possession: TeamLabel,
    goalkeepers: Option<&Goalkeepers>,
    params: &ModelParameters,
) -> Result<Rosters> {
    let defending_label = possession.opponent();
    let attacking = Roster::from_team(
        &source.team(possession)?,
        Side::Attacking,
        goalkeepers.map(|g| g.for_team(possession)),
        params,
    );
    let defending = Roster::from_team(
        &source.team(defending_label)?,
        Side::Defending,
        goalkeepers.map(|g| g.for_team(defending_label)),
        params,
    );
    Ok(Rosters { attacking, defending, ball: source.ball_position() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columnar() -> ColumnarFrame {
        [
            ("Home_1_x", -50.0),
            ("Home_1_y", 0.0),
            ("Home_9_x", 10.0),
            ("Home_9_y", 5.0),
            ("Home_9_vx", 2.0),
            ("Home_9_vy", f64::NAN),
            ("Home_9_speed", 2.0),
            ("Home_14_x", f64::NAN),
            ("Home_14_y", f64::NAN),
            ("Away_25_x", 45.0),
            ("Away_25_y", -1.0),
            ("Away_4_x", 20.0),
            ("Away_4_y", 3.0),
            ("Away_4_vx", -1.0),
            ("Away_4_vy", 0.5),
            ("ball_x", 9.0),
            ("ball_y", 4.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_in_frame() {
        assert!(TrackedPlayer::new("1", Some(Point::new(1.0, 2.0)), None).in_frame());
        assert!(!TrackedPlayer::new("1", None, None).in_frame());
        assert!(!TrackedPlayer::new("1", Some(Point::new(f64::NAN, 2.0)), None).in_frame());
    }

    #[test]
    fn test_roster_excludes_out_of_frame() {
        let team = TeamSnapshot {
            players: vec![
                TrackedPlayer::new("1", Some(Point::new(-50.0, 0.0)), None),
                TrackedPlayer::new("2", None, None),
                TrackedPlayer::new("3", Some(Point::new(f64::NAN, 0.0)), None),
            ],
        };
        let gk = PlayerId::from("1");
        let roster =
            Roster::from_team(&team, Side::Defending, Some(&gk), &ModelParameters::default());
        assert_eq!(roster.len(), 1);
        assert!(roster.players()[0].is_goalkeeper());
        assert_eq!(roster.goalkeeper_state().map(|p| p.id().clone()), Some(gk));
    }

    #[test]
    fn test_goalkeeper_found_by_id() {
        let params = ModelParameters::default();
        let unflagged_keeper =
            PlayerState::new("1", Side::Defending, false, Point::new(50.0, 0.0), None, &params);
        let flagged =
            PlayerState::new("2", Side::Defending, true, Point::new(30.0, 0.0), None, &params);
        let roster = Roster::new(
            Side::Defending,
            Some(PlayerId::from("1")),
            vec![flagged.clone(), unflagged_keeper],
        );
        assert_eq!(roster.goalkeeper_state().map(|p| p.id().clone()), Some(PlayerId::from("1")));

        // without an id the keeper flag decides
        let roster = Roster::new(Side::Defending, None, vec![flagged]);
        assert_eq!(roster.goalkeeper_state().map(|p| p.id().clone()), Some(PlayerId::from("2")));
    }

    #[test]
    fn test_empty_roster_error() {
        let roster = Roster::new(Side::Attacking, None, Vec::new());
        assert!(matches!(
            roster.ensure_non_empty(),
            Err(PitchControlError::EmptyRoster { side: Side::Attacking })
        ));
    }

    #[test]
    fn test_columnar_team() {
        let frame = columnar();
        let ids: Vec<String> = frame.player_ids(TeamLabel::Home).into_iter().collect();
        assert_eq!(ids, vec!["1", "14", "9"]);

        let home = frame.team(TeamLabel::Home).unwrap();
        let p9 = home.players.iter().find(|p| p.id.0 == "9").unwrap();
        assert_eq!(p9.position, Some(Point::new(10.0, 5.0)));
        // NaN vy drops the velocity pair
        assert_eq!(p9.velocity, None);
        let p14 = home.players.iter().find(|p| p.id.0 == "14").unwrap();
        assert!(!p14.in_frame());

        assert_eq!(frame.ball_position(), Some(Point::new(9.0, 4.0)));
    }

    #[test]
    fn test_columnar_missing_y_column() {
        let frame: ColumnarFrame =
            [("Home_3_x".to_string(), 1.0)].into_iter().collect();
        assert!(matches!(frame.team(TeamLabel::Home), Err(PitchControlError::Tracking(_))));
    }

    #[test]
    fn test_infer_goalkeeper() {
        let frame = columnar();
        assert_eq!(frame.infer_goalkeeper(TeamLabel::Home).unwrap(), PlayerId::from("1"));
        assert_eq!(frame.infer_goalkeeper(TeamLabel::Away).unwrap(), PlayerId::from("25"));
        assert!(ColumnarFrame::default().infer_goalkeeper(TeamLabel::Home).is_err());
    }

    #[test]
    fn test_build_rosters_by_possession() {
        let frame = columnar();
        let params = ModelParameters::default();
        let gks = Goalkeepers::new("1", "25");

        let rosters = build_rosters(&frame, TeamLabel::Away, Some(&gks), &params).unwrap();
        assert_eq!(rosters.attacking.side(), Side::Attacking);
        assert_eq!(rosters.attacking.len(), 2);
        assert_eq!(rosters.defending.len(), 2); // Home_14 out of frame
        assert_eq!(rosters.defending.goalkeeper(), Some(&PlayerId::from("1")));
        assert!(rosters.defending.goalkeeper_state().is_some());
        assert_eq!(rosters.ball, Some(Point::new(9.0, 4.0)));

        // same instant through the listed-player adapter
        let snapshot = FrameSnapshot {
            home: frame.team(TeamLabel::Home).unwrap(),
            away: frame.team(TeamLabel::Away).unwrap(),
            ball: frame.ball_position(),
        };
        let listed = build_rosters(&snapshot, TeamLabel::Away, Some(&gks), &params).unwrap();
        assert_eq!(listed, rosters);
    }

    #[test]
    fn test_snapshot_json_contract() {
        let json = r#"{
            "home": { "players": [ { "id": "10", "position": [1.0, 2.0], "velocity": [0.5, 0.0] } ] },
            "away": { "players": [ { "id": "1", "position": null } ] },
            "ball": [0.0, 0.0]
        }"#;
        let snapshot: FrameSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.home.players[0].in_frame());
        assert!(!snapshot.away.players[0].in_frame());
        assert_eq!(snapshot.ball_position(), Some(Point::origin()));
    }
}
