use crate::error::Result;
use csv::Writer;
use ndarray::{Array2, NdFloat};

/// Write a matrix to a CSV file, one record per row.
pub fn write_matrix_to_csv<A: NdFloat>(matrix: &Array2<A>, file_path: &str) -> Result<()> {
    let mut wtr = Writer::from_path(file_path)?;

    for row in matrix.outer_iter() {
        let record: Vec<String> = row.iter().map(|x| x.to_string()).collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
