//! Text matrix files
//!
//! Fields are stored as a pair of delimited text files holding the real and
//! imaginary parts. A file with a single row is a 1D field.

use std::{fs::File, path::Path};

use ndarray::{Array1, Array2, ArrayD, Axis, Zip};
use num_complex::Complex64;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("failed to open the matrix file")]
    Io(#[from] std::io::Error),
    #[error("failed to read or write the matrix file")]
    Csv(#[from] csv::Error),
    #[error("row {row}, column {column}: {value:?} is not a number")]
    Parse {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("row {row} has {len} columns, expected {expected}")]
    Ragged {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("no data in {0}")]
    Empty(String),
    #[error("real part {0:?} and imaginary part {1:?} shapes differ")]
    Shape(Vec<usize>, Vec<usize>),
    #[error("only 1D and 2D fields can be written, got {0} dimensions")]
    Dimensionality(usize),
}
type Result<T> = std::result::Result<T, IoError>;

/// Reads a matrix of numbers separated by `delimiter`
///
/// Repeated blank delimiters count as one.
pub fn read_matrix<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    log::debug!("reading {path:?}");
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);
    let mut rows: Vec<Vec<f64>> = vec![];
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let values = record
            .iter()
            .filter(|value| !value.is_empty())
            .enumerate()
            .map(|(column, value)| {
                value.parse::<f64>().map_err(|_| IoError::Parse {
                    row,
                    column,
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if !values.is_empty() {
            rows.push(values);
        }
    }
    let n_cols = match rows.first() {
        Some(first) => first.len(),
        None => return Err(IoError::Empty(path.display().to_string())),
    };
    if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(IoError::Ragged {
            row,
            len: values.len(),
            expected: n_cols,
        });
    }
    let n_rows = rows.len();
    let data: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(if n_rows == 1 {
        Array1::from(data).into_dyn()
    } else {
        Array2::from_shape_vec((n_rows, n_cols), data)
            .map_err(|_| IoError::Empty(path.display().to_string()))?
            .into_dyn()
    })
}

/// Reads a complex field from its real and imaginary parts
pub fn read_field<P: AsRef<Path>>(real: P, imag: P, delimiter: u8) -> Result<ArrayD<Complex64>> {
    let re = read_matrix(real, delimiter)?;
    let im = read_matrix(imag, delimiter)?;
    if re.shape() != im.shape() {
        return Err(IoError::Shape(re.shape().to_vec(), im.shape().to_vec()));
    }
    Ok(Zip::from(&re)
        .and(&im)
        .map_collect(|&re, &im| Complex64::new(re, im)))
}

/// Writes a real matrix, one row per line
pub fn write_matrix<P: AsRef<Path>>(path: P, data: &ArrayD<f64>, delimiter: u8) -> Result<()> {
    let data = match data.ndim() {
        1 => data.view().insert_axis(Axis(0)),
        2 => data.view(),
        n => return Err(IoError::Dimensionality(n)),
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_path(path)?;
    for row in data.outer_iter() {
        wtr.write_record(row.iter().map(|x| x.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `{prefix}_real.txt` and `{prefix}_imag.txt`
pub fn write_field(prefix: &str, field: &ArrayD<Complex64>, delimiter: u8) -> Result<()> {
    write_matrix(format!("{prefix}_real.txt"), &field.mapv(|x| x.re), delimiter)?;
    write_matrix(format!("{prefix}_imag.txt"), &field.mapv(|x| x.im), delimiter)?;
    log::info!("field written to {prefix}_{{real,imag}}.txt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("refocus-{}-{name}", std::process::id()))
    }

    #[test]
    fn whitespace_matrix() {
        let path = temp_path("ws.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1  2   3\n 4 5 6 \n\n").unwrap();
        let m = read_matrix(&path, b' ').unwrap();
        assert_eq!(m.shape(), &[2, 3]);
        assert_eq!(m[[1, 0]], 4.);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn ragged_and_bad_values() {
        let path = temp_path("ragged.txt");
        std::fs::write(&path, "1,2\n3\n").unwrap();
        assert!(matches!(
            read_matrix(&path, b','),
            Err(IoError::Ragged {
                row: 1,
                len: 1,
                expected: 2
            })
        ));
        std::fs::write(&path, "1,x\n").unwrap();
        assert!(matches!(read_matrix(&path, b','), Err(IoError::Parse { column: 1, .. })));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn field_round_trip() {
        let field = Array2::from_shape_fn((3, 4), |(i, j)| {
            Complex64::new(i as f64 - 0.5, 0.25 * j as f64)
        })
        .into_dyn();
        let prefix = temp_path("field").display().to_string();
        write_field(&prefix, &field, b',').unwrap();
        let real = format!("{prefix}_real.txt");
        let imag = format!("{prefix}_imag.txt");
        assert_eq!(read_field(&real, &imag, b',').unwrap(), field);
        std::fs::remove_file(real).unwrap();
        std::fs::remove_file(imag).unwrap();
    }

    #[test]
    fn single_row_is_one_dimensional() {
        let field = Array1::from(vec![Complex64::new(1., -1.), Complex64::new(0.5, 2.)]).into_dyn();
        let prefix = temp_path("line").display().to_string();
        write_field(&prefix, &field, b'\t').unwrap();
        let real = format!("{prefix}_real.txt");
        let imag = format!("{prefix}_imag.txt");
        assert_eq!(read_field(&real, &imag, b'\t').unwrap(), field);
        std::fs::remove_file(real).unwrap();
        std::fs::remove_file(imag).unwrap();
    }
}
