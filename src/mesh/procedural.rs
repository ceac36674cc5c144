//! Procedural generation of structured periodic meshes and sample meshes.
use crate::mesh::{CellStencil, MeshGraph};
use crate::sample_mesh::SampleToFullMap;
use eyre::eyre;
use log::info;
use nalgebra::Point2;
use std::collections::{BTreeSet, HashMap};

/// Generates a cell-centred, periodic `nx` x `ny` grid covering `[0, lx] x [0, ly]`.
///
/// Cells are numbered in natural row order, starting with the lower-left cell:
///
/// ```text
///  ...
///  10 11 12 13 14
///   5  6  7  8  9
///   0  1  2  3  4
/// ```
///
/// Every cell is a residual cell, and neighbours wrap around at the domain boundary.
///
/// # Panics
///
/// Panics if `nx` or `ny` is zero, or if `lx` or `ly` is not positive.
pub fn create_periodic_mesh(nx: usize, ny: usize, lx: f64, ly: f64) -> MeshGraph {
    assert!(nx > 0 && ny > 0, "Grid must have at least one cell in each direction");
    assert!(lx > 0.0 && ly > 0.0, "Domain extents must be positive");
    let dx = lx / nx as f64;
    let dy = ly / ny as f64;

    let gid = |i: usize, j: usize| j * nx + i;

    let mut coordinates = Vec::with_capacity(nx * ny);
    let mut stencils = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            coordinates.push(Point2::new(0.5 * dx + i as f64 * dx, 0.5 * dy + j as f64 * dy));

            let west = if i == 0 { nx - 1 } else { i - 1 };
            let east = if i == nx - 1 { 0 } else { i + 1 };
            let north = if j == ny - 1 { 0 } else { j + 1 };
            let south = if j == 0 { ny - 1 } else { j - 1 };
            stencils.push(CellStencil::new(
                gid(i, j),
                gid(west, j),
                gid(i, north),
                gid(east, j),
                gid(i, south),
            ));
        }
    }

    MeshGraph::try_from_stencils_and_coordinates(dx, dy, stencils, coordinates)
        .expect("Periodic grid is valid by construction")
}

/// Generates a periodic grid with `cells_per_dim` cells in each direction on the unit square.
pub fn create_unit_square_periodic_mesh(cells_per_dim: usize) -> MeshGraph {
    create_periodic_mesh(cells_per_dim, cells_per_dim, 1.0, 1.0)
}

/// A sample mesh together with the map from its local GIDs to the GIDs of the full mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMesh {
    pub mesh: MeshGraph,
    pub sample_to_full: SampleToFullMap,
}

/// Extracts a sample mesh from a full mesh.
///
/// The residual cells of the sample mesh are the given cells of the full mesh. The state cells
/// of the sample mesh are the residual cells together with all their stencil neighbours. State
/// cells are renumbered consecutively in ascending order of their full-mesh GIDs, and the
/// residual cells of the sample mesh appear in ascending order.
///
/// Returns an error if a GID appears more than once or is not a residual cell of `full`.
pub fn create_sample_mesh(full: &MeshGraph, residual_gids: &[usize]) -> eyre::Result<SampleMesh> {
    let full_stencils: HashMap<usize, &CellStencil> = full
        .stencils()
        .iter()
        .map(|stencil| (stencil.center(), stencil))
        .collect();

    let mut residual_set = BTreeSet::new();
    for &gid in residual_gids {
        if !full_stencils.contains_key(&gid) {
            return Err(eyre!("GID {gid} is not a residual cell of the full mesh"));
        }
        if !residual_set.insert(gid) {
            return Err(eyre!("GID {gid} appears more than once in the list of sample cells"));
        }
    }

    let state_set: BTreeSet<usize> = residual_set
        .iter()
        .flat_map(|gid| full_stencils[gid].gids().iter().copied())
        .collect();

    let full_to_sample: HashMap<usize, usize> = state_set
        .iter()
        .enumerate()
        .map(|(local, &gid)| (gid, local))
        .collect();

    let coordinates = state_set
        .iter()
        .map(|&gid| full.coordinates()[gid])
        .collect();

    let stencils = residual_set
        .iter()
        .map(|gid| {
            let full_stencil = full_stencils[gid];
            CellStencil(full_stencil.0.map(|g| full_to_sample[&g]))
        })
        .collect();

    let sample_to_full = SampleToFullMap::from_pairs(state_set.iter().copied().enumerate().collect());

    info!(
        "Sample mesh: {} residual cells ({:.2} % of full mesh), {} state cells ({:.2} % of full mesh)",
        residual_set.len(),
        100.0 * residual_set.len() as f64 / full.num_state_cells() as f64,
        state_set.len(),
        100.0 * state_set.len() as f64 / full.num_state_cells() as f64
    );

    let mesh = MeshGraph::try_from_stencils_and_coordinates(full.dx(), full.dy(), stencils, coordinates)?;
    Ok(SampleMesh { mesh, sample_to_full })
}
