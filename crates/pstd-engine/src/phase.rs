//! Per-domain phase work as pure functions over owned messages.
//!
//! Every backend builds the same [`DerivativeTask`] and [`UpdateTask`]
//! records, runs them through [`compute_derivatives`] and
//! [`compute_update`], and gathers results with [`collect_phase`]. Results
//! are written back to the scene only when every domain of the phase
//! succeeded, so a failed phase leaves no domain half-updated.

use pstd_core::{
    DerivativeInput, DerivativeOperator, Derivatives, DomainError, DomainId, FieldName,
    FieldState, GridPoint, NeighbourSlab, OperatorError, Orientation, Phase, Quantity, Shape,
    DERIVATIVE_PASSES,
};
use pstd_scene::{Domain, Scene};
use serde::{Deserialize, Serialize};

use crate::error::PhaseError;

// ── Field lookup ───────────────────────────────────────────────────

/// Borrowed numerical data of one domain, as seen by a neighbour.
#[derive(Clone, Copy, Debug)]
pub struct SlabSource<'a> {
    /// Top-left cell in global grid coordinates.
    pub origin: GridPoint,
    /// Array shape.
    pub shape: Shape,
    /// Density.
    pub rho: f64,
    /// Whether the domain is a reflecting wall.
    pub rigid: bool,
    /// Current arrays.
    pub fields: &'a FieldState,
}

/// Read access to neighbour state when building derivative inputs.
///
/// Implemented by [`Scene`] for in-process backends and by
/// [`Worker`](crate::Worker) for distributed execution.
pub trait FieldLookup {
    /// The data of `id`, if this view holds it.
    fn slab_source(&self, id: DomainId) -> Option<SlabSource<'_>>;
}

impl FieldLookup for Scene {
    fn slab_source(&self, id: DomainId) -> Option<SlabSource<'_>> {
        self.domain(id).map(|d| SlabSource {
            origin: d.origin(),
            shape: d.shape(),
            rho: d.rho(),
            rigid: d.is_rigid(),
            fields: d.fields(),
        })
    }
}

// ── Derivative phase ───────────────────────────────────────────────

/// All derivative passes of one domain for one sub-stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeTask {
    /// The domain being differentiated.
    pub domain: DomainId,
    /// One input per pass whose orientation the domain updates.
    pub inputs: Vec<DerivativeInput>,
}

/// The arrays produced by a [`DerivativeTask`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeResult {
    /// The differentiated domain.
    pub domain: DomainId,
    /// `(orientation, quantity, array)` per computed pass.
    pub outputs: Vec<(Orientation, Quantity, Vec<f64>)>,
}

/// Build the derivative work for `domain`, or `None` if it computes
/// nothing this sub-stage (rigid, or no orientation to update).
pub fn derivative_task(
    domain: &Domain,
    grid_spacing: f64,
    lookup: &impl FieldLookup,
) -> Option<DerivativeTask> {
    if domain.is_rigid() {
        return None;
    }
    let inputs: Vec<DerivativeInput> = DERIVATIVE_PASSES
        .iter()
        .filter(|(orientation, _)| domain.should_update(*orientation))
        .map(|&(orientation, quantity)| {
            let name = FieldName::for_pass(orientation, quantity);
            let neighbours = orientation
                .sides()
                .iter()
                .flat_map(|&side| {
                    domain.neighbours_on(side).into_iter().filter_map(move |id| {
                        lookup.slab_source(id).map(|src| NeighbourSlab {
                            domain: id,
                            side,
                            origin: src.origin,
                            shape: src.shape,
                            rho: src.rho,
                            rigid: src.rigid,
                            field: src.fields.get(name).to_vec(),
                        })
                    })
                })
                .collect();
            DerivativeInput {
                domain: domain.id(),
                origin: domain.origin(),
                shape: domain.shape(),
                orientation,
                quantity,
                rho: domain.rho(),
                grid_spacing,
                field: domain.fields().get(name).to_vec(),
                neighbours,
            }
        })
        .collect();
    if inputs.is_empty() {
        None
    } else {
        Some(DerivativeTask {
            domain: domain.id(),
            inputs,
        })
    }
}

/// Run every pass of `task` through the operator.
pub fn compute_derivatives(
    operator: &dyn DerivativeOperator,
    task: &DerivativeTask,
) -> Result<DerivativeResult, DomainError> {
    derive_each(task, operator.name(), |input| operator.derive(input))
}

/// Run every pass of `task` through `derive`, checking output lengths.
pub fn derive_each(
    task: &DerivativeTask,
    name: &str,
    mut derive: impl FnMut(&DerivativeInput) -> Result<Vec<f64>, OperatorError>,
) -> Result<DerivativeResult, DomainError> {
    let mut outputs = Vec::with_capacity(task.inputs.len());
    for input in &task.inputs {
        let values = derive(input).map_err(|e| DomainError::ComputationFailed {
            domain: task.domain,
            phase: Phase::Derivative,
            reason: format!("{name} ({} {}): {e}", input.orientation, input.quantity),
        })?;
        if values.len() != input.shape.len() {
            return Err(DomainError::ShapeMismatch {
                domain: task.domain,
                shape: input.shape,
                expected: input.shape.len(),
                actual: values.len(),
            });
        }
        outputs.push((input.orientation, input.quantity, values));
    }
    Ok(DerivativeResult {
        domain: task.domain,
        outputs,
    })
}

/// Store derivative results in their domains.
pub fn apply_derivatives(scene: &mut Scene, results: Vec<DerivativeResult>) {
    for result in results {
        let Some(derivatives) = scene
            .domain_mut(result.domain)
            .and_then(Domain::derivatives_mut)
        else {
            continue;
        };
        for (orientation, quantity, values) in result.outputs {
            *derivatives.slot_mut(orientation, quantity) = values;
        }
    }
}

// ── Update phase ───────────────────────────────────────────────────

/// Scalars of one sub-stage update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateStep {
    /// Zero-based sub-stage index.
    pub stage: usize,
    /// The stage's Runge-Kutta coefficient.
    pub alpha: f64,
    /// Time step.
    pub dt: f64,
    /// Speed of sound.
    pub wave_speed: f64,
}

/// Everything the update of one domain reads, by reference.
#[derive(Clone, Copy, Debug)]
pub struct UpdateView<'a> {
    /// The domain being updated.
    pub domain: DomainId,
    /// Its density.
    pub rho: f64,
    /// Sub-stage scalars.
    pub step: UpdateStep,
    /// The start-of-frame snapshot.
    pub old: &'a FieldState,
    /// This sub-stage's derivatives.
    pub derivatives: &'a Derivatives,
}

impl<'a> UpdateView<'a> {
    /// View of a non-rigid domain; `None` for rigid domains.
    pub fn of(domain: &'a Domain, step: UpdateStep) -> Option<Self> {
        (!domain.is_rigid()).then(|| Self {
            domain: domain.id(),
            rho: domain.rho(),
            step,
            old: domain.old(),
            derivatives: domain.derivatives(),
        })
    }

    /// Owned copy for sending across a thread or process boundary.
    pub fn to_task(&self) -> UpdateTask {
        UpdateTask {
            domain: self.domain,
            rho: self.rho,
            step: self.step,
            old: self.old.clone(),
            derivatives: self.derivatives.clone(),
        }
    }
}

/// Owned form of [`UpdateView`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateTask {
    /// The domain being updated.
    pub domain: DomainId,
    /// Its density.
    pub rho: f64,
    /// Sub-stage scalars.
    pub step: UpdateStep,
    /// The start-of-frame snapshot.
    pub old: FieldState,
    /// This sub-stage's derivatives.
    pub derivatives: Derivatives,
}

impl UpdateTask {
    /// Borrow as a view.
    pub fn view(&self) -> UpdateView<'_> {
        UpdateView {
            domain: self.domain,
            rho: self.rho,
            step: self.step,
            old: &self.old,
            derivatives: &self.derivatives,
        }
    }
}

/// New velocity and pressure components of one domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatedFields {
    /// The updated domain.
    pub domain: DomainId,
    /// Horizontal velocity.
    pub u0: Vec<f64>,
    /// Vertical velocity.
    pub w0: Vec<f64>,
    /// Horizontal pressure component.
    pub px0: Vec<f64>,
    /// Vertical pressure component.
    pub pz0: Vec<f64>,
}

/// The low-storage Runge-Kutta update of one domain:
///
/// ```text
/// u0  = u0_old  - dt·α·Lpx / rho
/// w0  = w0_old  - dt·α·Lpz / rho
/// px0 = px0_old - dt·α·rho·c²·Lvx
/// pz0 = pz0_old - dt·α·rho·c²·Lvz
/// ```
///
/// Fails with [`DomainError::NonFinite`] if any result is NaN or infinite.
pub fn compute_update(view: &UpdateView<'_>) -> Result<UpdatedFields, DomainError> {
    let UpdateStep {
        alpha,
        dt,
        wave_speed,
        ..
    } = view.step;
    let rho = view.rho;
    let velocity_scale = dt * alpha / rho;
    let pressure_scale = dt * alpha * rho * wave_speed * wave_speed;
    let d = view.derivatives;
    let old = view.old;

    let step = |prev: &[f64], deriv: &[f64], scale: f64| -> Vec<f64> {
        prev.iter().zip(deriv).map(|(p, l)| p - scale * l).collect()
    };
    let updated = UpdatedFields {
        domain: view.domain,
        u0: step(&old.u0, &d.lpx, velocity_scale),
        w0: step(&old.w0, &d.lpz, velocity_scale),
        px0: step(&old.px0, &d.lvx, pressure_scale),
        pz0: step(&old.pz0, &d.lvz, pressure_scale),
    };

    for (field, values) in [
        (FieldName::U0, &updated.u0),
        (FieldName::W0, &updated.w0),
        (FieldName::Px0, &updated.px0),
        (FieldName::Pz0, &updated.pz0),
    ] {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DomainError::NonFinite {
                domain: view.domain,
                field,
                index,
            });
        }
    }
    Ok(updated)
}

/// Store updated components in their domains. `p0` is left for the
/// pressure-summation step.
pub fn apply_updates(scene: &mut Scene, results: Vec<UpdatedFields>) {
    for result in results {
        let Some(fields) = scene.domain_mut(result.domain).and_then(Domain::fields_mut) else {
            continue;
        };
        fields.u0 = result.u0;
        fields.w0 = result.w0;
        fields.px0 = result.px0;
        fields.pz0 = result.pz0;
    }
}

// ── Barrier ────────────────────────────────────────────────────────

/// Gather per-domain results at a barrier.
///
/// Returns every success if nothing failed; otherwise every failure,
/// sorted by domain id.
pub fn collect_phase<T>(
    phase: Phase,
    stage: usize,
    results: impl IntoIterator<Item = Result<T, DomainError>>,
) -> Result<Vec<T>, PhaseError> {
    let mut ok = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(e) => failures.push(e),
        }
    }
    if failures.is_empty() {
        Ok(ok)
    } else {
        failures.sort_by_key(DomainError::domain);
        Err(PhaseError {
            phase,
            stage,
            failures,
        })
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
