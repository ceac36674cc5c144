//! The text format for mesh graphs.
//!
//! A mesh file consists of whitespace-separated tokens, one record per line:
//!
//! ```text
//! dx 0.25000000000000
//! dy 0.25000000000000
//! numResidualPts 16
//! numStatePts 16
//! 0 0.12500000000000 0.12500000000000 3 0.87500000000000 0.12500000000000 ...
//! ```
//!
//! Every data row holds five `gid x y` triples for the cell itself and its west, north, east
//! and south neighbours. The size declarations must precede the first data row.
use crate::mesh::{CellStencil, MeshGraph};
use crate::sample_mesh::SampleToFullMap;
use crate::NUM_SPECIES;
use eyre::{eyre, Context};
use log::info;
use nalgebra::Point2;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const TOKENS_PER_ROW: usize = 15;

/// Errors arising from malformed mesh files.
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshLoadError {
    /// The mesh file does not exist.
    FileNotFound(PathBuf),
    /// A data row appeared before the given size declaration.
    SizeNotDeclared { line: usize, key: &'static str },
    /// A size declaration appears after the first data row.
    DeclarationAfterData { line: usize, key: &'static str },
    /// A required declaration is missing from the file altogether.
    MissingDeclaration { key: &'static str },
    /// A line could not be parsed.
    MalformedLine { line: usize, reason: String },
    /// A data row references a GID that is not smaller than the declared number of state cells.
    GidOutOfBounds { line: usize, gid: usize, num_state_cells: usize },
    /// The number of data rows differs from the declared number of residual cells.
    ResidualCountMismatch { declared: usize, found: usize },
}

impl Display for MeshLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshLoadError::FileNotFound(path) => write!(f, "mesh file {} not found", path.display()),
            MeshLoadError::SizeNotDeclared { line, key } => {
                write!(f, "line {line}: data row appears before `{key}` is declared")
            }
            MeshLoadError::DeclarationAfterData { line, key } => {
                write!(f, "line {line}: `{key}` must be declared before the first data row")
            }
            MeshLoadError::MissingDeclaration { key } => write!(f, "mesh file does not declare `{key}`"),
            MeshLoadError::MalformedLine { line, reason } => write!(f, "line {line}: {reason}"),
            MeshLoadError::GidOutOfBounds {
                line,
                gid,
                num_state_cells,
            } => write!(
                f,
                "line {line}: GID {gid} is out of bounds for {num_state_cells} state cells"
            ),
            MeshLoadError::ResidualCountMismatch { declared, found } => write!(
                f,
                "mesh file declares {declared} residual cells, but contains {found} data rows"
            ),
        }
    }
}

impl Error for MeshLoadError {}

fn parse_token<T: FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T, MeshLoadError> {
    let token = token.ok_or_else(|| MeshLoadError::MalformedLine {
        line,
        reason: format!("missing value for {what}"),
    })?;
    token.parse().map_err(|_| MeshLoadError::MalformedLine {
        line,
        reason: format!("invalid value `{token}` for {what}"),
    })
}

// Sizes allocate the graph and the coordinate table, so redeclaring them would discard parsed rows
fn reject_declaration_after_data(
    stencils: &[CellStencil],
    line: usize,
    key: &'static str,
) -> Result<(), MeshLoadError> {
    if stencils.is_empty() {
        Ok(())
    } else {
        Err(MeshLoadError::DeclarationAfterData { line, key })
    }
}

/// Loads a [`MeshGraph`] from the mesh file at the given path.
///
/// A missing file is reported as [`MeshLoadError::FileNotFound`].
pub fn load_mesh_from_file(path: impl AsRef<Path>) -> eyre::Result<MeshGraph> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(MeshLoadError::FileNotFound(path.to_path_buf()).into());
        }
        Err(err) => return Err(err).wrap_err_with(|| format!("failed to open mesh file {}", path.display())),
    };
    parse_mesh(BufReader::new(file)).wrap_err_with(|| format!("failed to load mesh from {}", path.display()))
}

/// Parses a [`MeshGraph`] from a reader providing the mesh file format.
pub fn parse_mesh<R: BufRead>(reader: R) -> eyre::Result<MeshGraph> {
    let mut dx = None;
    let mut dy = None;
    let mut num_residual_cells: Option<usize> = None;
    let mut num_state_cells: Option<usize> = None;
    let mut stencils = Vec::new();
    let mut coordinates: Vec<Point2<f64>> = Vec::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line_number = line_idx + 1;
        let line = line.wrap_err("failed to read mesh file")?;
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };

        match first {
            "dx" => {
                let value: f64 = parse_token(tokens.next(), line_number, "dx")?;
                info!("dx = {value}");
                dx = Some(value);
            }
            "dy" => {
                let value: f64 = parse_token(tokens.next(), line_number, "dy")?;
                info!("dy = {value}");
                dy = Some(value);
            }
            "numResidualPts" => {
                reject_declaration_after_data(&stencils, line_number, "numResidualPts")?;
                let value: usize = parse_token(tokens.next(), line_number, "numResidualPts")?;
                info!("number of residual cells = {value}, residual dofs = {}", NUM_SPECIES * value);
                num_residual_cells = Some(value);
                stencils.reserve(value);
            }
            "numStatePts" => {
                reject_declaration_after_data(&stencils, line_number, "numStatePts")?;
                let value: usize = parse_token(tokens.next(), line_number, "numStatePts")?;
                info!("number of state cells = {value}, state dofs = {}", NUM_SPECIES * value);
                num_state_cells = Some(value);
                coordinates = vec![Point2::origin(); value];
            }
            _ => {
                if num_residual_cells.is_none() {
                    return Err(MeshLoadError::SizeNotDeclared {
                        line: line_number,
                        key: "numResidualPts",
                    }
                    .into());
                }
                let num_state_cells = num_state_cells.ok_or(MeshLoadError::SizeNotDeclared {
                    line: line_number,
                    key: "numStatePts",
                })?;

                let row: Vec<&str> = std::iter::once(first).chain(tokens).collect();
                if row.len() != TOKENS_PER_ROW {
                    return Err(MeshLoadError::MalformedLine {
                        line: line_number,
                        reason: format!("expected {TOKENS_PER_ROW} values in data row, found {}", row.len()),
                    }
                    .into());
                }

                let mut gids = [0; 5];
                for (gid, triple) in gids.iter_mut().zip(row.chunks_exact(3)) {
                    *gid = parse_token(Some(triple[0]), line_number, "GID")?;
                    if *gid >= num_state_cells {
                        return Err(MeshLoadError::GidOutOfBounds {
                            line: line_number,
                            gid: *gid,
                            num_state_cells,
                        }
                        .into());
                    }
                    let x: f64 = parse_token(Some(triple[1]), line_number, "x-coordinate")?;
                    let y: f64 = parse_token(Some(triple[2]), line_number, "y-coordinate")?;
                    coordinates[*gid] = Point2::new(x, y);
                }
                stencils.push(CellStencil(gids));
            }
        }
    }

    let dx = dx.ok_or(MeshLoadError::MissingDeclaration { key: "dx" })?;
    let dy = dy.ok_or(MeshLoadError::MissingDeclaration { key: "dy" })?;
    let declared = num_residual_cells.ok_or(MeshLoadError::MissingDeclaration { key: "numResidualPts" })?;
    num_state_cells.ok_or(MeshLoadError::MissingDeclaration { key: "numStatePts" })?;
    if stencils.len() != declared {
        return Err(MeshLoadError::ResidualCountMismatch {
            declared,
            found: stencils.len(),
        }
        .into());
    }

    MeshGraph::try_from_stencils_and_coordinates(dx, dy, stencils, coordinates)
}

/// Writes a mesh graph in the mesh file format.
pub fn write_mesh<W: Write>(mut writer: W, mesh: &MeshGraph) -> eyre::Result<()> {
    writeln!(writer, "dx {:.14}", mesh.dx())?;
    writeln!(writer, "dy {:.14}", mesh.dy())?;
    writeln!(writer, "numResidualPts {}", mesh.num_residual_cells())?;
    writeln!(writer, "numStatePts {}", mesh.num_state_cells())?;
    for stencil in mesh.stencils() {
        for (i, &gid) in stencil.gids().iter().enumerate() {
            let p = &mesh.coordinates()[gid];
            if i > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{} {:.14} {:.14}", gid, p.x, p.y)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_mesh_to_file(path: impl AsRef<Path>, mesh: &MeshGraph) -> eyre::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).wrap_err_with(|| format!("failed to create mesh file {}", path.display()))?;
    write_mesh(BufWriter::new(file), mesh).wrap_err_with(|| format!("failed to write mesh to {}", path.display()))
}

/// Parses a sample-to-full GID map, one `sample_local_gid full_gid` pair per line.
pub fn parse_sample_to_full_map<R: BufRead>(reader: R) -> eyre::Result<SampleToFullMap> {
    let mut pairs = Vec::new();
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.wrap_err("failed to read sample-to-full map")?;
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        let local: usize = first
            .parse()
            .map_err(|_| eyre!("line {}: invalid sample-local GID `{}`", line_idx + 1, first))?;
        let full: usize = tokens
            .next()
            .ok_or_else(|| eyre!("line {}: missing full-mesh GID", line_idx + 1))?
            .parse()
            .map_err(|_| eyre!("line {}: invalid full-mesh GID", line_idx + 1))?;
        pairs.push((local, full));
    }
    Ok(SampleToFullMap::from_pairs(pairs))
}

pub fn load_sample_to_full_map(path: impl AsRef<Path>) -> eyre::Result<SampleToFullMap> {
    let path = path.as_ref();
    let file = File::open(path).wrap_err_with(|| format!("failed to open sample-to-full map {}", path.display()))?;
    let map = parse_sample_to_full_map(BufReader::new(file))
        .wrap_err_with(|| format!("failed to load sample-to-full map from {}", path.display()))?;
    info!("Loaded sample-to-full map with {} entries", map.len());
    Ok(map)
}

pub fn write_sample_to_full_map<W: Write>(mut writer: W, map: &SampleToFullMap) -> eyre::Result<()> {
    for (local, full) in map.pairs() {
        writeln!(writer, "{local} {full}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_sample_to_full_map(path: impl AsRef<Path>, map: &SampleToFullMap) -> eyre::Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).wrap_err_with(|| format!("failed to create sample-to-full map {}", path.display()))?;
    write_sample_to_full_map(BufWriter::new(file), map)
}
