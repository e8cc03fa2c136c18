use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use log::info;
use nalgebra::DVector;

use crate::error::{LqrError, Result};
use crate::utils::sampling::SampleSet;

/// Reads a `stage,w0,w1,...` file, one row per realization. `stage` is
/// 1-based and every stage up to the largest must appear.
pub fn read_sample_sets<R: io::Read>(reader: R) -> Result<Vec<SampleSet>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let dim = rdr.headers()?.len().saturating_sub(1);
    if dim == 0 {
        return Err(LqrError::InvalidParameter(
            "sample file needs a stage column and at least one value column".to_owned(),
        ));
    }

    let mut stages: BTreeMap<usize, Vec<DVector<f64>>> = BTreeMap::new();
    for result in rdr.deserialize() {
        let row: Vec<f64> = result?;
        let stage = row[0];
        if !(stage >= 1.0 && stage.fract() == 0.0 && stage <= usize::MAX as f64) {
            return Err(LqrError::InvalidParameter(format!(
                "stage index must be a positive integer, got {stage}"
            )));
        }
        stages
            .entry(stage as usize)
            .or_default()
            .push(DVector::from_vec(row[1..].to_vec()));
    }

    // stages must be exactly 1..=len, a gap is an empty sample set
    if stages.keys().enumerate().any(|(i, &stage)| stage != i + 1) {
        return Err(LqrError::EmptySampleSet);
    }
    let sets = stages
        .into_values()
        .map(SampleSet::new)
        .collect::<Result<Vec<_>>>()?;
    if let Some(set) = sets.iter().find(|s| s.dim() != dim) {
        return Err(LqrError::DimensionMismatch {
            operation: "sample file",
            left: (set.dim(), 1),
            right: (dim, 1),
        });
    }
    Ok(sets)
}

pub fn load_sample_sets<P: AsRef<Path>>(path: P) -> Result<Vec<SampleSet>> {
    let file = std::fs::File::open(path.as_ref())?;
    let sets = read_sample_sets(file)?;
    info!(
        "loaded {} sample sets from {}",
        sets.len(),
        path.as_ref().display()
    );
    Ok(sets)
}

pub fn write_sample_sets<W: io::Write>(writer: W, sets: &[SampleSet]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let dim = sets.first().map_or(0, SampleSet::dim);
    let mut header = vec!["stage".to_owned()];
    header.extend((0..dim).map(|i| format!("w{i}")));
    wtr.write_record(&header)?;

    for (t, set) in sets.iter().enumerate() {
        for w in set.samples() {
            let mut row = vec![(t + 1).to_string()];
            row.extend(w.iter().map(f64::to_string));
            wtr.write_record(&row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
