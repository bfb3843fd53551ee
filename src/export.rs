//! CSV export of learning and exploration curves.

use std::borrow::Cow;
use std::io::Write;

use crate::optimization::{ExplorationCurveRow, LearningCurveRow};

/// Write a learning curve in CSV format.
///
/// Columns: `n_samples`, `total`, then one column per cost component. The
/// component columns are named after `labels` when there is one label per
/// component (see [`Task::cost_labels`](crate::Task::cost_labels)), and
/// `cost_1`, `cost_2`, ... otherwise. Rows with fewer components than the
/// widest row leave the remaining cells empty.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
///
/// # Examples
///
/// ```
/// use bbo::{CostVector, LearningCurveRow, write_learning_curve_csv};
///
/// let curve = vec![LearningCurveRow {
///     n_samples: 0,
///     costs: CostVector::from_components([1.0, 0.5]),
/// }];
/// let mut buf = Vec::new();
/// let labels = ["distance".to_string(), "effort".to_string()];
/// write_learning_curve_csv(&mut buf, &curve, &labels).unwrap();
/// assert_eq!(String::from_utf8(buf).unwrap(), "n_samples,total,distance,effort\n0,1.5,1,0.5\n");
/// ```
pub fn write_learning_curve_csv(
    mut writer: impl Write,
    curve: &[LearningCurveRow],
    labels: &[String],
) -> std::io::Result<()> {
    let n_components = curve
        .iter()
        .map(|row| row.costs.n_components())
        .max()
        .unwrap_or(labels.len());

    write!(writer, "n_samples,total")?;
    if labels.len() == n_components {
        for label in labels {
            write!(writer, ",{}", csv_escape(label))?;
        }
    } else {
        for k in 1..=n_components {
            write!(writer, ",cost_{k}")?;
        }
    }
    writeln!(writer)?;

    for row in curve {
        write!(writer, "{},{}", row.n_samples, row.costs.total())?;
        let components = row.costs.components();
        for k in 0..n_components {
            match components.get(k) {
                Some(cost) => write!(writer, ",{cost}")?,
                None => write!(writer, ",")?,
            }
        }
        writeln!(writer)?;
    }

    writer.flush()
}

/// Write an exploration curve in CSV format with columns `n_samples` and
/// `exploration`.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_exploration_curve_csv(
    mut writer: impl Write,
    curve: &[ExplorationCurveRow],
) -> std::io::Result<()> {
    writeln!(writer, "n_samples,exploration")?;
    for row in curve {
        writeln!(writer, "{},{}", row.n_samples, row.exploration)?;
    }
    writer.flush()
}

/// Escape a string for CSV output. If the value contains a comma, quote, or
/// newline, wrap it in double quotes and double any internal quotes.
fn csv_escape(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostVector;

    #[test]
    fn generated_labels_and_padding() {
        let curve = vec![
            LearningCurveRow {
                n_samples: 0,
                costs: CostVector::scalar(2.0),
            },
            LearningCurveRow {
                n_samples: 10,
                costs: CostVector::from_components([1.0, 0.25]),
            },
        ];
        let mut buf = Vec::new();
        write_learning_curve_csv(&mut buf, &curve, &[]).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        assert_eq!(
            csv,
            "n_samples,total,cost_1,cost_2\n0,2,2,\n10,1.25,1,0.25\n"
        );
    }

    #[test]
    fn exploration_csv() {
        let curve = vec![
            ExplorationCurveRow {
                n_samples: 0,
                exploration: 1.0,
            },
            ExplorationCurveRow {
                n_samples: 5,
                exploration: 0.5,
            },
        ];
        let mut buf = Vec::new();
        write_exploration_curve_csv(&mut buf, &curve).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "n_samples,exploration\n0,1\n5,0.5\n"
        );
    }

    #[test]
    fn escapes_labels() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
