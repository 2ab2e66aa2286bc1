//! Scene assembly and validation.

use pstd_core::{DomainId, GridPoint, Orientation, ReceiverId, Shape, Side};

use crate::domain::{Domain, DomainKind};
use crate::error::SceneError;
use crate::geometry::{subtract_span, Bounds};
use crate::pml::{PmlProfile, PmlSettings};
use crate::receiver::Receiver;
use crate::scene::Scene;
use crate::speaker::Speaker;

/// Density given to rigid walls.
pub const RIGID_DENSITY: f64 = 1e200;

/// Density of air, in kg/m³.
pub const AIR_DENSITY: f64 = 1.0;

/// Default Gaussian bandwidth of speaker pulses.
pub const DEFAULT_SPEAKER_BANDWIDTH: f64 = 20.0;

struct PendingDomain {
    bounds: Bounds,
    rho: f64,
    kind: DomainKind,
}

/// Builder for [`Scene`].
///
/// Domains and receivers get sequential ids in registration order. PML
/// layers requested with [`pml`](Self::pml) are appended after every
/// user domain, one per free segment of each air domain's sides.
///
/// ```
/// use pstd_core::{GridPoint, Shape};
/// use pstd_scene::SceneBuilder;
///
/// let mut b = SceneBuilder::new(0.2);
/// let left = b.domain(GridPoint::new(0, 0), Shape::new(8, 8));
/// let right = b.domain(GridPoint::new(8, 0), Shape::new(8, 8));
/// b.receiver(10.5, 3.0);
/// let scene = b.build().unwrap();
/// assert!(scene.domain(left).unwrap().neighbours().contains_key(&right));
/// assert_eq!(scene.receivers()[0].container(), right);
/// ```
pub struct SceneBuilder {
    grid_spacing: f64,
    domains: Vec<PendingDomain>,
    receivers: Vec<(f64, f64)>,
    speakers: Vec<Speaker>,
    speaker_bandwidth: f64,
    pml: Option<PmlSettings>,
}

impl SceneBuilder {
    /// Start a scene on a grid with cells `grid_spacing` metres wide.
    pub fn new(grid_spacing: f64) -> Self {
        Self {
            grid_spacing,
            domains: Vec::new(),
            receivers: Vec::new(),
            speakers: Vec::new(),
            speaker_bandwidth: DEFAULT_SPEAKER_BANDWIDTH,
            pml: None,
        }
    }

    /// Add an air domain.
    pub fn domain(&mut self, origin: GridPoint, shape: Shape) -> DomainId {
        self.domain_with_density(origin, shape, AIR_DENSITY)
    }

    /// Add an air domain with an explicit density.
    pub fn domain_with_density(&mut self, origin: GridPoint, shape: Shape, rho: f64) -> DomainId {
        self.push(Bounds::new(origin, shape), rho, DomainKind::Air)
    }

    /// Add a rigid (reflecting) domain.
    pub fn rigid(&mut self, origin: GridPoint, shape: Shape) -> DomainId {
        self.push(Bounds::new(origin, shape), RIGID_DENSITY, DomainKind::Rigid)
    }

    /// Add a receiver at a location in grid cells.
    pub fn receiver(&mut self, x: f64, z: f64) -> ReceiverId {
        let id = ReceiverId(self.receivers.len() as u32);
        self.receivers.push((x, z));
        id
    }

    /// Add a speaker at a location in grid cells.
    pub fn speaker(&mut self, x: f64, z: f64) -> &mut Self {
        self.speakers.push(Speaker { x, z });
        self
    }

    /// Gaussian bandwidth used for speaker pulses.
    pub fn speaker_bandwidth(&mut self, bandwidth: f64) -> &mut Self {
        self.speaker_bandwidth = bandwidth;
        self
    }

    /// Surround air domains with absorbing layers.
    pub fn pml(&mut self, settings: PmlSettings) -> &mut Self {
        self.pml = Some(settings);
        self
    }

    fn push(&mut self, bounds: Bounds, rho: f64, kind: DomainKind) -> DomainId {
        let id = DomainId(self.domains.len() as u32);
        self.domains.push(PendingDomain { bounds, rho, kind });
        id
    }

    /// Validate and assemble the scene.
    pub fn build(mut self) -> Result<Scene, SceneError> {
        if !(self.grid_spacing.is_finite() && self.grid_spacing > 0.0) {
            return Err(SceneError::InvalidGridSpacing {
                value: self.grid_spacing,
            });
        }
        if self.domains.is_empty() {
            return Err(SceneError::Empty);
        }
        for (i, d) in self.domains.iter().enumerate() {
            let domain = DomainId(i as u32);
            if d.bounds.shape.is_empty() {
                return Err(SceneError::EmptyDomain { domain });
            }
            if !(d.rho.is_finite() && d.rho > 0.0) {
                return Err(SceneError::InvalidDensity {
                    domain,
                    value: d.rho,
                });
            }
        }

        if let Some(settings) = self.pml {
            self.add_pml_ring(settings)?;
        }

        for (i, a) in self.domains.iter().enumerate() {
            for (j, b) in self.domains.iter().enumerate().skip(i + 1) {
                if a.bounds.overlaps(&b.bounds) {
                    return Err(SceneError::Overlap {
                        first: DomainId(i as u32),
                        second: DomainId(j as u32),
                    });
                }
            }
        }

        let mut domains: Vec<Domain> = self
            .domains
            .into_iter()
            .enumerate()
            .map(|(i, p)| Domain::new(DomainId(i as u32), p.bounds, p.rho, p.kind))
            .collect();

        for i in 0..domains.len() {
            for j in 0..domains.len() {
                if i == j {
                    continue;
                }
                if let Some(edge) = domains[i].bounds().shared_edge(&domains[j].bounds()) {
                    let other = domains[j].id();
                    domains[i].add_neighbour(other, edge);
                }
            }
        }

        let rigid: Vec<bool> = domains.iter().map(Domain::is_rigid).collect();
        for domain in &mut domains {
            for orientation in Orientation::ALL {
                let flag = match domain.kind() {
                    DomainKind::Air => true,
                    DomainKind::Rigid => false,
                    DomainKind::Pml(_) => orientation.sides().iter().any(|&side| {
                        domain
                            .neighbours_on(side)
                            .iter()
                            .any(|n| !rigid[n.0 as usize])
                    }),
                };
                domain.set_update(orientation, flag);
            }
        }

        let mut receivers = Vec::with_capacity(self.receivers.len());
        for (i, &(x, z)) in self.receivers.iter().enumerate() {
            if !(x.is_finite() && z.is_finite()) {
                return Err(SceneError::InvalidLocation { x, z });
            }
            let id = ReceiverId(i as u32);
            let cell = Receiver::cell_of(x, z);
            let container = domains
                .iter()
                .find(|d| !d.is_rigid() && d.bounds().contains_cell(cell))
                .map(Domain::id)
                .ok_or(SceneError::ReceiverOutside { receiver: id, cell })?;
            receivers.push(Receiver::new(id, x, z, container));
        }

        for speaker in &self.speakers {
            if !(speaker.x.is_finite() && speaker.z.is_finite()) {
                return Err(SceneError::InvalidLocation {
                    x: speaker.x,
                    z: speaker.z,
                });
            }
            for domain in &mut domains {
                let bounds = domain.bounds();
                if let Some(fields) = domain.fields_mut() {
                    speaker.apply(bounds, self.grid_spacing, self.speaker_bandwidth, fields);
                }
            }
        }

        Ok(Scene {
            grid_spacing: self.grid_spacing,
            domains,
            receivers,
            speakers: self.speakers,
        })
    }

    /// Layers along every free stretch of every air domain's sides.
    ///
    /// A side is split into the segments no other domain touches. Each
    /// segment's strip is clipped along its length wherever it would run
    /// into a domain or an earlier layer, so inner corners of concave
    /// rooms are covered once.
    fn add_pml_ring(&mut self, settings: PmlSettings) -> Result<(), SceneError> {
        if settings.cells == 0 {
            return Err(SceneError::InvalidPml {
                reason: "layer thickness must be at least one cell".into(),
            });
        }
        if !(settings.attenuation.is_finite() && settings.attenuation >= 0.0) {
            return Err(SceneError::InvalidPml {
                reason: format!(
                    "attenuation must be non-negative, got {}",
                    settings.attenuation
                ),
            });
        }
        let factors = settings.factors();
        let mut layers: Vec<PendingDomain> = Vec::new();
        for (i, d) in self.domains.iter().enumerate() {
            if !matches!(d.kind, DomainKind::Air) {
                continue;
            }
            for side in Side::ALL {
                let mut free = vec![d.bounds.span_along(side)];
                for (j, other) in self.domains.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    if let Some(edge) = d.bounds.shared_edge(&other.bounds) {
                        if edge.side == side {
                            let cut = (edge.start, edge.start + edge.length as i64);
                            free = subtract_span(&free, cut);
                        }
                    }
                }

                let obstacles: Vec<Bounds> =
                    self.domains.iter().chain(&layers).map(|p| p.bounds).collect();
                for obstacle in &obstacles {
                    free = free
                        .into_iter()
                        .flat_map(|span| {
                            if d.bounds.strip_along(side, settings.cells, span).overlaps(obstacle) {
                                subtract_span(&[span], obstacle.span_along(side))
                            } else {
                                vec![span]
                            }
                        })
                        .collect();
                }

                for span in free {
                    layers.push(PendingDomain {
                        bounds: d.bounds.strip_along(side, settings.cells, span),
                        rho: d.rho,
                        kind: DomainKind::Pml(PmlProfile {
                            interface: side.opposite(),
                            factors: factors.clone(),
                        }),
                    });
                }
            }
        }
        self.domains.extend(layers);
        Ok(())
    }
}
