//! Stepped decimation driver for heavy reductions.
//!
//! Collapsing a mesh far below its current face count in one pass tends to
//! tear thin regions and texture seams. The driver instead walks down in
//! bounded steps, never removing more than 40% of the remaining faces at
//! once, and stops early on a wall-clock budget, a step cap, or when
//! progress stalls. Textured meshes under very aggressive ratios take a
//! fixed two-phase route instead, which damages seams less than repeated
//! partial collapses.

use crate::collapse::QuadricDecimator;
use crate::params::DecimationTarget;
use meshpress_analysis::{
    remove_degenerate_faces, remove_duplicate_faces, remove_duplicate_vertices,
};
use meshpress_core::TriangleMesh;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Per-step reduction bound: each step keeps at least this share of faces.
const STEP_FACTOR: f64 = 0.6;
/// A step that keeps more than this share of its input made no real progress.
const STALL_FRACTION: f64 = 0.95;
/// Results within this factor of the target count as reached.
const TARGET_SLACK: f64 = 1.05;
/// Ratios at or above this skip the stepped loop entirely.
const SINGLE_PASS_RATIO: f64 = 0.5;
/// Textured meshes below this ratio go through the two-phase route.
const UV_TWO_PHASE_RATIO: f64 = 0.3;

/// How a single reduction step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step reduced the face count meaningfully and was kept.
    Progressed,
    /// The step changed too little; its result was discarded.
    Stalled,
    /// The step failed or produced an unusable mesh; discarded.
    Aborted,
}

/// Record of one reduction step.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DecimationStep {
    pub faces_before: usize,
    pub faces_after: usize,
    pub outcome: StepOutcome,
}

/// Why the run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimationStatus {
    /// Final face count is within the tolerance band of the target.
    ReachedTarget,
    /// Progress stalled; the result predates the stalling step.
    Stalled,
    /// The step cap was hit with the target still out of reach.
    StepLimit,
    /// The wall-clock budget ran out.
    TimedOut,
}

/// Result of a progressive decimation run.
///
/// The run never fails: on any internal trouble the best mesh achieved so
/// far (possibly the unmodified input) is returned with a status
/// explaining how far it got.
#[derive(Debug, Clone)]
pub struct DecimationOutcome {
    pub mesh: TriangleMesh,
    pub faces_before: usize,
    pub faces_after: usize,
    pub status: DecimationStatus,
    pub steps: Vec<DecimationStep>,
    pub elapsed: Duration,
}

/// Convergence-guarded driver around [`QuadricDecimator`].
#[derive(Debug, Clone)]
pub struct ProgressiveDecimator {
    pub time_budget: Duration,
    pub max_steps: usize,
}

impl Default for ProgressiveDecimator {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ProgressiveDecimator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Reduce `mesh` toward the target face count.
    pub fn decimate(&self, mesh: &TriangleMesh, target: &DecimationTarget) -> DecimationOutcome {
        let start = Instant::now();
        let faces_before = mesh.face_count();
        let goal = target.face_count();

        if faces_before <= goal {
            debug!(faces = faces_before, goal, "mesh already within face budget");
            return DecimationOutcome {
                mesh: mesh.clone(),
                faces_before,
                faces_after: faces_before,
                status: DecimationStatus::ReachedTarget,
                steps: Vec::new(),
                elapsed: start.elapsed(),
            };
        }

        let ratio = goal as f64 / faces_before as f64;
        let uv_mode = target.preserve_uv && mesh.has_texcoords();
        // Seam weighting only applies when there are seams to protect; an
        // untextured mesh takes the plain boundary weight.
        let weight = target.with_preserve_uv(uv_mode).boundary_weight();
        let decimator = QuadricDecimator::with_params(None, weight);

        let outcome = if uv_mode && ratio < UV_TWO_PHASE_RATIO {
            self.run_two_phase(mesh, goal, &decimator, start)
        } else if ratio >= SINGLE_PASS_RATIO {
            self.run_single_pass(mesh, goal, &decimator, start)
        } else {
            self.run_stepped(mesh, goal, &decimator, start)
        };

        info!(
            faces_before,
            faces_after = outcome.faces_after,
            goal,
            status = ?outcome.status,
            steps = outcome.steps.len(),
            "decimation finished"
        );
        outcome
    }

    /// Moderate reductions collapse straight to the target.
    fn run_single_pass(
        &self,
        mesh: &TriangleMesh,
        goal: usize,
        decimator: &QuadricDecimator,
        start: Instant,
    ) -> DecimationOutcome {
        let faces_before = mesh.face_count();
        let (work, outcome) = run_step(mesh, goal, decimator);
        let step = DecimationStep {
            faces_before,
            faces_after: work.face_count(),
            outcome,
        };
        finish(work, faces_before, goal, vec![step], start)
    }

    /// Aggressive reductions on textured meshes: one intermediate stop at
    /// half the original count, then the target.
    fn run_two_phase(
        &self,
        mesh: &TriangleMesh,
        goal: usize,
        decimator: &QuadricDecimator,
        start: Instant,
    ) -> DecimationOutcome {
        let faces_before = mesh.face_count();
        let midway = (faces_before / 2).max(goal);
        let mut work = mesh.clone();
        let mut steps = Vec::new();

        for phase_goal in [midway, goal] {
            let before = work.face_count();
            if before <= phase_goal {
                continue;
            }
            let (result, outcome) = run_step(&work, phase_goal, decimator);
            steps.push(DecimationStep {
                faces_before: before,
                faces_after: result.face_count(),
                outcome,
            });
            if outcome != StepOutcome::Progressed {
                break;
            }
            work = result;
        }

        finish(work, faces_before, goal, steps, start)
    }

    /// The stepped loop: bounded reductions with stall and budget guards.
    fn run_stepped(
        &self,
        mesh: &TriangleMesh,
        goal: usize,
        decimator: &QuadricDecimator,
        start: Instant,
    ) -> DecimationOutcome {
        let faces_before = mesh.face_count();
        let mut work = mesh.clone();

        // One-time cleanup; duplicate and null geometry confuses the
        // collapse ordering and inflates the face count.
        let merged = remove_duplicate_vertices(&mut work);
        let dup_faces = remove_duplicate_faces(&mut work);
        let degenerate = remove_degenerate_faces(&mut work);
        if merged + dup_faces + degenerate > 0 {
            debug!(merged, dup_faces, degenerate, "cleaned mesh before stepping");
        }

        let mut steps: Vec<DecimationStep> = Vec::new();
        let mut exit = None;

        while steps.len() < self.max_steps {
            if start.elapsed() >= self.time_budget {
                exit = Some(DecimationStatus::TimedOut);
                break;
            }
            let before = work.face_count();
            if within_slack(before, goal) {
                exit = Some(DecimationStatus::ReachedTarget);
                break;
            }

            let step_goal = goal.max((before as f64 * STEP_FACTOR).floor() as usize);
            let (result, outcome) = run_step(&work, step_goal, decimator);
            let after = result.face_count();

            match outcome {
                StepOutcome::Progressed
                    if (after as f64) < (before as f64) * STALL_FRACTION =>
                {
                    steps.push(DecimationStep {
                        faces_before: before,
                        faces_after: after,
                        outcome: StepOutcome::Progressed,
                    });
                    work = result;
                }
                StepOutcome::Progressed => {
                    // Too little movement: keep the pre-step mesh
                    steps.push(DecimationStep {
                        faces_before: before,
                        faces_after: after,
                        outcome: StepOutcome::Stalled,
                    });
                    exit = Some(DecimationStatus::Stalled);
                    break;
                }
                StepOutcome::Stalled | StepOutcome::Aborted => {
                    steps.push(DecimationStep {
                        faces_before: before,
                        faces_after: before,
                        outcome: StepOutcome::Aborted,
                    });
                    exit = Some(DecimationStatus::Stalled);
                    break;
                }
            }
        }

        let status = exit.unwrap_or(DecimationStatus::StepLimit);

        // One precise pass to the exact target, unless the loop stalled.
        if status != DecimationStatus::Stalled && work.face_count() > goal {
            let before = work.face_count();
            let (result, outcome) = run_step(&work, goal, decimator);
            if outcome == StepOutcome::Progressed {
                steps.push(DecimationStep {
                    faces_before: before,
                    faces_after: result.face_count(),
                    outcome,
                });
                work = result;
            }
        }

        let faces_after = work.face_count();
        let status = if within_slack(faces_after, goal) {
            DecimationStatus::ReachedTarget
        } else {
            status
        };
        DecimationOutcome {
            mesh: work,
            faces_before,
            faces_after,
            status,
            steps,
            elapsed: start.elapsed(),
        }
    }
}

fn within_slack(faces: usize, goal: usize) -> bool {
    (faces as f64) <= (goal as f64) * TARGET_SLACK
}

/// Run one collapse pass, shielding the caller from failures.
fn run_step(
    mesh: &TriangleMesh,
    goal: usize,
    decimator: &QuadricDecimator,
) -> (TriangleMesh, StepOutcome) {
    match decimator.decimate_to_count(mesh, goal) {
        Ok(result) if result.face_count() > 0 => (result, StepOutcome::Progressed),
        Ok(_) => {
            warn!(goal, "collapse pass produced an empty mesh, discarding");
            (mesh.clone(), StepOutcome::Aborted)
        }
        Err(err) => {
            warn!(goal, %err, "collapse pass failed, keeping previous mesh");
            (mesh.clone(), StepOutcome::Aborted)
        }
    }
}

fn finish(
    work: TriangleMesh,
    faces_before: usize,
    goal: usize,
    steps: Vec<DecimationStep>,
    start: Instant,
) -> DecimationOutcome {
    let faces_after = work.face_count();
    let status = if within_slack(faces_after, goal) {
        DecimationStatus::ReachedTarget
    } else {
        DecimationStatus::Stalled
    };
    DecimationOutcome {
        mesh: work,
        faces_before,
        faces_after,
        status,
        steps,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpress_core::{Point2f, Point3f};

    fn make_plane_grid(size: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3f::new(x as f32, y as f32, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, bl, tr]);
                faces.push([tr, bl, br]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    fn make_textured_grid(size: usize) -> TriangleMesh {
        let mut mesh = make_plane_grid(size);
        let span = (size - 1) as f32;
        let uvs = mesh
            .vertices
            .iter()
            .map(|v| Point2f::new(v.x / span, v.y / span))
            .collect();
        mesh.set_texcoords(uvs);
        mesh
    }

    fn make_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    #[test]
    fn test_noop_at_or_below_target() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_plane_grid(5);
        let target = DecimationTarget::new(mesh.face_count()).unwrap();

        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.status, DecimationStatus::ReachedTarget);
        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.faces_after, mesh.face_count());
        assert_eq!(outcome.mesh.vertex_count(), mesh.vertex_count());
    }

    #[test]
    fn test_moderate_reduction_single_pass() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_plane_grid(6); // 50 faces
        let target = DecimationTarget::new(30).unwrap();

        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.status, DecimationStatus::ReachedTarget);
        assert!(outcome.faces_after <= 31);
    }

    #[test]
    fn test_aggressive_reduction_steps_down() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_plane_grid(11); // 200 faces
        let target = DecimationTarget::new(50).unwrap();

        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.status, DecimationStatus::ReachedTarget);
        assert!(outcome.steps.len() >= 2, "expected stepped reduction");
        assert!(outcome.faces_after <= 52);

        // Face counts never increase across recorded steps
        for pair in outcome.steps.windows(2) {
            assert!(pair[1].faces_after <= pair[0].faces_after);
        }
    }

    #[test]
    fn test_stall_returns_pre_stall_mesh() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_tetrahedron();
        let target = DecimationTarget::new(1).unwrap().with_preserve_boundaries(false);

        // A tetrahedron collapses once to a two-face sandwich; after that
        // every remaining edge fails the link condition, so the run stalls
        // and keeps the sandwich.
        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.status, DecimationStatus::Stalled);
        assert_eq!(outcome.faces_after, 2);
        let last = outcome.steps.last().unwrap();
        assert_eq!(last.outcome, StepOutcome::Stalled);
    }

    #[test]
    fn test_zero_budget_skips_stepping() {
        let driver = ProgressiveDecimator::new().with_time_budget(Duration::ZERO);
        let mesh = make_plane_grid(11);
        let target = DecimationTarget::new(50).unwrap();

        // The stepped loop exits immediately on the expired budget; only
        // the final precise pass runs.
        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].outcome, StepOutcome::Progressed);
        assert!(outcome.faces_after <= 52);
    }

    #[test]
    fn test_uv_two_phase_route() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_textured_grid(11); // 200 faces
        let target = DecimationTarget::new(40).unwrap().with_preserve_uv(true);

        // ratio 0.2 < 0.3 on a textured mesh: half-way stop, then target
        let outcome = driver.decimate(&mesh, &target);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.status, DecimationStatus::ReachedTarget);
        assert!(outcome.faces_after <= 42);
        assert!(outcome.steps[0].faces_after >= 80);

        let uvs = outcome.mesh.texcoords.as_ref().unwrap();
        assert_eq!(uvs.len(), outcome.mesh.vertex_count());
    }

    #[test]
    fn test_uv_moderate_ratio_uses_stepped_loop() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_textured_grid(6); // 50 faces
        let target = DecimationTarget::new(20).unwrap().with_preserve_uv(true);

        // ratio 0.4 is above the two-phase cutoff but still aggressive:
        // the generic stepped loop runs, with seam weighting on
        let outcome = driver.decimate(&mesh, &target);
        assert!(outcome.steps.len() >= 2);
        assert!(outcome.faces_after <= 21);
        assert!(outcome.mesh.texcoords.is_some());
    }

    #[test]
    fn test_untextured_mesh_ignores_uv_flag() {
        let driver = ProgressiveDecimator::new();
        let mesh = make_plane_grid(11);
        let target = DecimationTarget::new(40).unwrap().with_preserve_uv(true);

        // No texcoords: the generic stepped loop runs, not the two-phase route
        let outcome = driver.decimate(&mesh, &target);
        assert!(outcome.steps.len() >= 2);
        assert!(outcome.faces_after <= 42);

        // And the seam weighting is off: the run is indistinguishable from
        // one that never asked for it
        let plain = driver.decimate(&mesh, &target.with_preserve_uv(false));
        assert_eq!(outcome.faces_after, plain.faces_after);
        assert_eq!(outcome.mesh.vertices, plain.mesh.vertices);
        assert_eq!(outcome.mesh.faces, plain.mesh.faces);
    }
}
