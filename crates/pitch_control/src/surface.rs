//! Pitch control surface
//!
//! Runs [`TargetResolver`] over every cell of a grid covering the pitch for
//! one instant. Rows are independent once the rosters are fixed, so they
//! are evaluated with rayon when `parallel` is set.
//!
//! Grid contract:
//! - `cells_x` columns along the length, `rows = round(cells_x * width / length)`
//! - storage is row-major, `attack[row * cols + col]`, row 0 at -width/2
//! - the global checksum (mean of attack + defense) is attached as a
//!   [`SurfaceCheck`] rather than aborting; [`ControlSurface::ensure_valid`]
//!   gives the strict behaviour

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PitchControlError, Result};
use crate::geometry::{FieldDimensions, Point};
use crate::offside::{OffsideFilter, DEFAULT_OFFSIDE_TOLERANCE_M};
use crate::params::ModelParameters;
use crate::player::PlayerId;
use crate::resolver::{Outcome, TargetControl, TargetResolver};
use crate::roster::{build_rosters, Goalkeepers, Roster, RosterSource, TeamLabel};

pub const DEFAULT_CELLS_X: usize = 50;

/// Where cell coordinates sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridLayout {
    /// Cell centers, inset half a cell from the touchlines (event evaluation)
    #[default]
    CellCentered,
    /// Evenly spaced points including both boundaries (frame evaluation)
    EdgeAligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub field: FieldDimensions,
    pub cells_x: usize,
    pub layout: GridLayout,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            field: FieldDimensions::default(),
            cells_x: DEFAULT_CELLS_X,
            layout: GridLayout::CellCentered,
        }
    }
}

impl GridSpec {
    pub fn new(field: FieldDimensions, cells_x: usize) -> Self {
        Self { field, cells_x, layout: GridLayout::CellCentered }
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Vertical resolution preserving the field's aspect ratio
    pub fn cells_y(&self) -> usize {
        (self.cells_x as f64 * self.field.width / self.field.length).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        self.field.validate()?;
        if self.cells_x == 0 {
            return Err(PitchControlError::InvalidGrid("cells_x must be at least 1".to_string()));
        }
        if self.cells_y() == 0 {
            return Err(PitchControlError::InvalidGrid(format!(
                "{} columns on a {}x{} field leave no rows",
                self.cells_x, self.field.length, self.field.width
            )));
        }
        Ok(())
    }

    pub fn x_grid(&self) -> Vec<f64> {
        axis(self.cells_x, self.field.length, self.layout)
    }

    pub fn y_grid(&self) -> Vec<f64> {
        axis(self.cells_y(), self.field.width, self.layout)
    }
}

fn axis(n: usize, extent: f64, layout: GridLayout) -> Vec<f64> {
    match layout {
        GridLayout::CellCentered => {
            let d = extent / n as f64;
            (0..n).map(|i| i as f64 * d - extent / 2.0 + d / 2.0).collect()
        }
        GridLayout::EdgeAligned if n == 1 => vec![0.0],
        GridLayout::EdgeAligned => {
            let d = extent / (n - 1) as f64;
            (0..n).map(|i| -extent / 2.0 + i as f64 * d).collect()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceOptions {
    /// Remove offside attackers first
    pub offsides: bool,
    pub offside_tolerance: f64,
    /// Evaluate rows on the rayon pool
    pub parallel: bool,
    /// Upper bound on integration steps summed over all cells
    pub step_budget: Option<u64>,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            offsides: true,
            offside_tolerance: DEFAULT_OFFSIDE_TOLERANCE_M,
            parallel: true,
            step_budget: None,
        }
    }
}

impl SurfaceOptions {
    /// Frame evaluation: no possession event, so no offside filtering
    pub fn for_frame() -> Self {
        Self { offsides: false, ..Self::default() }
    }
}

/// Global conservation check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceCheck {
    /// Mean of attack + defense over all cells
    pub checksum: f64,
    /// 1 - checksum
    pub residual: f64,
    pub tolerance: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SurfaceDiagnostics {
    pub attack_vetoes: usize,
    pub defense_vetoes: usize,
    pub integrated: usize,
    pub unconverged: usize,
    pub max_residual: f64,
    pub integration_steps: u64,
}

impl SurfaceDiagnostics {
    fn record(&mut self, control: &TargetControl) {
        match control.outcome {
            Outcome::AttackVeto => self.attack_vetoes += 1,
            Outcome::DefenseVeto => self.defense_vetoes += 1,
            Outcome::Converged { steps } => {
                self.integrated += 1;
                self.integration_steps += steps as u64;
            }
            Outcome::Unconverged { steps, residual } => {
                self.integrated += 1;
                self.unconverged += 1;
                self.integration_steps += steps as u64;
                self.max_residual = self.max_residual.max(residual);
            }
        }
    }

    fn merge(&mut self, other: &SurfaceDiagnostics) {
        self.attack_vetoes += other.attack_vetoes;
        self.defense_vetoes += other.defense_vetoes;
        self.integrated += other.integrated;
        self.unconverged += other.unconverged;
        self.max_residual = self.max_residual.max(other.max_residual);
        self.integration_steps += other.integration_steps;
    }
}

/// Control probabilities over the grid for one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSurface {
    rows: usize,
    cols: usize,
    attack: Vec<f64>,
    defense: Vec<f64>,
    x_grid: Vec<f64>,
    y_grid: Vec<f64>,
    check: SurfaceCheck,
    diagnostics: SurfaceDiagnostics,
    offside_removed: Vec<PlayerId>,
}

impl ControlSurface {
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Attacking-team control, row-major
    pub fn attack(&self) -> &[f64] {
        &self.attack
    }
    pub fn defense(&self) -> &[f64] {
        &self.defense
    }

    pub fn attack_at(&self, row: usize, col: usize) -> f64 {
        self.attack[row * self.cols + col]
    }
    pub fn defense_at(&self, row: usize, col: usize) -> f64 {
        self.defense[row * self.cols + col]
    }

    pub fn attack_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.attack.chunks(self.cols)
    }

    /// Cell centers along the length (meters)
    pub fn x_grid(&self) -> &[f64] {
        &self.x_grid
    }
    /// Cell centers across the width (meters)
    pub fn y_grid(&self) -> &[f64] {
        &self.y_grid
    }

    pub fn check(&self) -> &SurfaceCheck {
        &self.check
    }
    pub fn is_valid(&self) -> bool {
        self.check.valid
    }
    pub fn diagnostics(&self) -> &SurfaceDiagnostics {
        &self.diagnostics
    }

    /// Attackers dropped by the offside filter
    pub fn offside_removed(&self) -> &[PlayerId] {
        &self.offside_removed
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if self.check.valid {
            return Ok(());
        }
        Err(PitchControlError::ChecksumFailed {
            checksum: self.check.checksum,
            residual: self.check.residual,
            tolerance: self.check.tolerance,
        })
    }
}

/// Attack/defense control at a pass origin and destination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PassControl {
    pub at_origin: TargetControl,
    pub at_target: TargetControl,
}

pub struct SurfaceGenerator<'a> {
    params: &'a ModelParameters,
    grid: GridSpec,
    options: SurfaceOptions,
}

impl<'a> SurfaceGenerator<'a> {
    pub fn new(params: &'a ModelParameters, grid: GridSpec) -> Self {
        Self { params, grid, options: SurfaceOptions::default() }
    }

    pub fn with_options(mut self, options: SurfaceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Build rosters from a tracking source and evaluate the surface.
    pub fn generate_for_instant<S: RosterSource + ?Sized>(
        &self,
        source: &S,
        possession: TeamLabel,
        goalkeepers: Option<&Goalkeepers>,
    ) -> Result<ControlSurface> {
        let rosters = build_rosters(source, possession, goalkeepers, self.params)?;
        self.generate(&rosters.attacking, &rosters.defending, rosters.ball)
    }

    pub fn generate(
        &self,
        attacking: &Roster,
        defending: &Roster,
        ball: Option<Point>,
    ) -> Result<ControlSurface> {
        self.grid.validate()?;
        attacking.ensure_non_empty()?;
        defending.ensure_non_empty()?;

        let (attacking, offside_removed) = self.onside(attacking, defending, ball)?;
        attacking.ensure_non_empty()?;

        let x_grid = self.grid.x_grid();
        let y_grid = self.grid.y_grid();
        let (rows, cols) = (y_grid.len(), x_grid.len());

        let resolver = TargetResolver::new(self.params);
        let consumed = AtomicU64::new(0);
        let eval_row = |row: usize| -> Result<(Vec<TargetControl>, SurfaceDiagnostics)> {
            let mut cells = Vec::with_capacity(cols);
            let mut diag = SurfaceDiagnostics::default();
            for &x in &x_grid {
                let target = Point::new(x, y_grid[row]);
                let control =
                    resolver.resolve(target, attacking.players(), defending.players(), ball)?;
                diag.record(&control);
                cells.push(control);
            }
            self.charge(&consumed, diag.integration_steps)?;
            Ok((cells, diag))
        };

        let evaluated: Vec<(Vec<TargetControl>, SurfaceDiagnostics)> = if self.options.parallel {
            (0..rows).into_par_iter().map(eval_row).collect::<Result<_>>()?
        } else {
            (0..rows).map(eval_row).collect::<Result<_>>()?
        };

        let mut attack = Vec::with_capacity(rows * cols);
        let mut defense = Vec::with_capacity(rows * cols);
        let mut diagnostics = SurfaceDiagnostics::default();
        for (cells, diag) in &evaluated {
            attack.extend(cells.iter().map(|c| c.attack));
            defense.extend(cells.iter().map(|c| c.defense));
            diagnostics.merge(diag);
        }

        let check = self.checksum(&attack, &defense);
        if diagnostics.unconverged > 0 {
            warn!(
                cells = diagnostics.unconverged,
                max_residual = diagnostics.max_residual,
                "surface has unconverged cells"
            );
        }
        if !check.valid {
            warn!(checksum = check.checksum, residual = check.residual, "checksum failed");
        }
        info!(
            rows,
            cols,
            attack_vetoes = diagnostics.attack_vetoes,
            defense_vetoes = diagnostics.defense_vetoes,
            integrated = diagnostics.integrated,
            steps = diagnostics.integration_steps,
            "pitch control surface generated"
        );

        Ok(ControlSurface {
            rows,
            cols,
            attack,
            defense,
            x_grid,
            y_grid,
            check,
            diagnostics,
            offside_removed,
        })
    }

    /// Control at the pass origin and at its intended target, after the
    /// offside filter (when enabled).
    pub fn pass_control(
        &self,
        attacking: &Roster,
        defending: &Roster,
        origin: Point,
        target: Point,
    ) -> Result<PassControl> {
        attacking.ensure_non_empty()?;
        defending.ensure_non_empty()?;
        let (attacking, _) = self.onside(attacking, defending, Some(origin))?;
        attacking.ensure_non_empty()?;

        let resolver = TargetResolver::new(self.params);
        let at_origin =
            resolver.resolve(origin, attacking.players(), defending.players(), Some(origin))?;
        let at_target =
            resolver.resolve(target, attacking.players(), defending.players(), Some(origin))?;
        Ok(PassControl { at_origin, at_target })
    }

    fn onside(
        &self,
        attacking: &Roster,
        defending: &Roster,
        ball: Option<Point>,
    ) -> Result<(Roster, Vec<PlayerId>)> {
        if !self.options.offsides {
            return Ok((attacking.clone(), Vec::new()));
        }
        let outcome =
            OffsideFilter::new(self.options.offside_tolerance).apply(attacking, defending, ball)?;
        debug!(removed = outcome.removed.len(), line = outcome.line, "offside filter applied");
        Ok((outcome.onside, outcome.removed))
    }

    fn charge(&self, consumed: &AtomicU64, steps: u64) -> Result<()> {
        let total = consumed.fetch_add(steps, Ordering::Relaxed) + steps;
        match self.options.step_budget {
            Some(limit) if total > limit => {
                Err(PitchControlError::BudgetExhausted { limit, consumed: total })
            }
            _ => Ok(()),
        }
    }

    fn checksum(&self, attack: &[f64], defense: &[f64]) -> SurfaceCheck {
        let tolerance = self.params.convergence_tolerance();
        let n = attack.len().max(1) as f64;
        let checksum = attack.iter().zip(defense).map(|(a, d)| a + d).sum::<f64>() / n;
        let residual = 1.0 - checksum;
        SurfaceCheck { checksum, residual, tolerance, valid: residual.abs() <= tolerance }
    }
}

/// Surface for a possession event with default grid and options.
pub fn generate_pitch_control_for_event(
    attacking: &Roster,
    defending: &Roster,
    ball: Option<Point>,
    params: &ModelParameters,
) -> Result<ControlSurface> {
    SurfaceGenerator::new(params, GridSpec::default()).generate(attacking, defending, ball)
}

/// Surface for a tracking frame: edge-aligned grid, no offside filter.
pub fn generate_pitch_control_for_frame<S: RosterSource + ?Sized>(
    source: &S,
    possession: TeamLabel,
    params: &ModelParameters,
) -> Result<ControlSurface> {
    let grid = GridSpec::default().with_layout(GridLayout::EdgeAligned);
    SurfaceGenerator::new(params, grid)
        .with_options(SurfaceOptions::for_frame())
        .generate_for_instant(source, possession, None)
}
