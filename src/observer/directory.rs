use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{UpdateObserver, UpdateSummary};
use crate::optimization::{ExplorationCurve, ExplorationCurveRow, LearningCurve, LearningCurveRow};
use crate::{CostVector, Error, Result};

const LEARNING_CURVE_FILE: &str = "learning_curve.json";
const EXPLORATION_CURVE_FILE: &str = "exploration_curve.json";

/// One update as written to disk by a [`DirectoryRecorder`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateRecord<D> {
    /// Zero-based update index.
    pub update: usize,
    /// Samples evaluated before this update.
    pub n_samples: usize,
    /// Exploration magnitude of `distribution`.
    pub exploration: f64,
    /// The distribution the samples were drawn from.
    pub distribution: D,
    /// Cost at the mean of `distribution`.
    pub cost_eval: CostVector,
    /// Samples, one inner vector per sample.
    pub samples: Vec<Vec<f64>>,
    /// Costs, one per sample.
    pub costs: Vec<CostVector>,
    /// Weights, one per sample.
    pub weights: Vec<f64>,
    /// The distribution that replaced `distribution`.
    pub distribution_new: D,
}

impl<D: Clone> UpdateRecord<D> {
    fn from_summary(summary: &UpdateSummary<'_, D>) -> Self {
        Self {
            update: summary.update,
            n_samples: summary.n_samples,
            exploration: summary.exploration,
            distribution: summary.distribution.clone(),
            cost_eval: summary.cost_eval.clone(),
            samples: rows(summary.samples),
            costs: summary.costs.to_vec(),
            weights: summary.weights.iter().copied().collect(),
            distribution_new: summary.distribution_new.clone(),
        }
    }
}

impl<D: DeserializeOwned> UpdateRecord<D> {
    /// Read the record of update `update` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file is missing or malformed.
    pub fn load(dir: impl AsRef<Path>, update: usize) -> Result<Self> {
        read_json(&dir.as_ref().join(update_file_name(update)))
    }
}

impl<D> UpdateRecord<D> {
    /// The samples as an `n × D` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the rows have unequal lengths.
    pub fn sample_matrix(&self) -> Result<DMatrix<f64>> {
        let n_cols = self.samples.first().map_or(0, Vec::len);
        if let Some(row) = self.samples.iter().find(|row| row.len() != n_cols) {
            return Err(Error::DimensionMismatch {
                context: "stored sample length",
                expected: n_cols,
                got: row.len(),
            });
        }
        Ok(DMatrix::from_row_iterator(
            self.samples.len(),
            n_cols,
            self.samples.iter().flatten().copied(),
        ))
    }
}

/// Read the curves a [`DirectoryRecorder`] wrote at the end of a run.
///
/// # Errors
///
/// Returns [`Error::Storage`] if either file is missing or malformed.
pub fn load_curves(dir: impl AsRef<Path>) -> Result<(LearningCurve, ExplorationCurve)> {
    let dir = dir.as_ref();
    let learning_curve = read_json(&dir.join(LEARNING_CURVE_FILE))?;
    let exploration_curve = read_json(&dir.join(EXPLORATION_CURVE_FILE))?;
    Ok((learning_curve, exploration_curve))
}

/// Writes every update and the final curves as JSON files into a directory,
/// for offline plotting and post-hoc analysis.
///
/// Layout:
///
/// ```text
/// <dir>/update_00000.json      one UpdateRecord per update
/// <dir>/update_00001.json
/// ...
/// <dir>/learning_curve.json    written when the run finishes
/// <dir>/exploration_curve.json
/// ```
///
/// The directory is created on first write. Each file is written to a
/// temporary file first and renamed into place, so readers never see a
/// partial file.
#[derive(Clone, Debug)]
pub struct DirectoryRecorder {
    dir: PathBuf,
}

impl DirectoryRecorder {
    /// Record into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::Storage(e.to_string()))?;
        write_json_atomic(&self.dir.join(file_name), value)
    }
}

impl<D: Clone + Serialize> UpdateObserver<D> for DirectoryRecorder {
    fn on_update(&mut self, summary: &UpdateSummary<'_, D>) -> Result<()> {
        self.write(
            &update_file_name(summary.update),
            &UpdateRecord::from_summary(summary),
        )
    }

    fn on_finish(
        &mut self,
        learning_curve: &[LearningCurveRow],
        exploration_curve: &[ExplorationCurveRow],
    ) -> Result<()> {
        self.write(LEARNING_CURVE_FILE, learning_curve)?;
        self.write(EXPLORATION_CURVE_FILE, exploration_curve)
    }
}

fn update_file_name(update: usize) -> String {
    format!("update_{update:05}.json")
}

fn rows(samples: &DMatrix<f64>) -> Vec<Vec<f64>> {
    samples
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    let file = std::fs::File::create(&tmp_path).map_err(|e| Error::Storage(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| Error::Storage(e.to_string()))?;
    writer.flush().map_err(|e| Error::Storage(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::Storage(e.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))
}
