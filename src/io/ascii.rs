//! Dense matrices stored as ASCII tables, one matrix row per line.
use eyre::{eyre, Context};
use log::info;
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Parses a matrix with `ncols` columns from whitespace-separated values.
///
/// Every non-empty line is one row. Only the first `ncols` values of each line are read, so that
/// a basis with more modes than needed can be truncated while reading.
pub fn parse_ascii_matrix<R: BufRead>(reader: R, ncols: usize) -> eyre::Result<DMatrix<f64>> {
    let mut data = Vec::new();
    let mut nrows = 0;
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.wrap_err("failed to read matrix data")?;
        if line.trim().is_empty() {
            continue;
        }
        let row_start = data.len();
        for token in line.split_whitespace().take(ncols) {
            let value: f64 = token
                .parse()
                .map_err(|_| eyre!("line {}: invalid matrix entry `{}`", line_idx + 1, token))?;
            data.push(value);
        }
        let found = data.len() - row_start;
        if found < ncols {
            return Err(eyre!("line {}: expected {} columns, found {}", line_idx + 1, ncols, found));
        }
        nrows += 1;
    }
    Ok(DMatrix::from_row_slice(nrows, ncols, &data))
}

pub fn read_ascii_matrix(path: impl AsRef<Path>, ncols: usize) -> eyre::Result<DMatrix<f64>> {
    let path = path.as_ref();
    let file = File::open(path).wrap_err_with(|| format!("failed to open matrix file {}", path.display()))?;
    parse_ascii_matrix(BufReader::new(file), ncols)
        .wrap_err_with(|| format!("failed to read matrix from {}", path.display()))
}

/// Reads the first `rom_size` modes of a basis.
pub fn load_basis(path: impl AsRef<Path>, rom_size: usize) -> eyre::Result<DMatrix<f64>> {
    let basis = read_ascii_matrix(path, rom_size)?;
    info!("Loaded basis with {} rows and {} modes", basis.nrows(), basis.ncols());
    Ok(basis)
}

/// Writes a matrix with 15 decimal digits per entry.
pub fn write_ascii_matrix<W: Write>(mut writer: W, matrix: &DMatrix<f64>) -> eyre::Result<()> {
    for row in matrix.row_iter() {
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{value:.15}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_ascii_matrix(path: impl AsRef<Path>, matrix: &DMatrix<f64>) -> eyre::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).wrap_err_with(|| format!("failed to create matrix file {}", path.display()))?;
    write_ascii_matrix(BufWriter::new(file), matrix)
        .wrap_err_with(|| format!("failed to write matrix to {}", path.display()))
}
