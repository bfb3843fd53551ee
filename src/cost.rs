//! Cost vectors returned by cost functions.

use crate::{Error, Result};

/// Total cost followed by its named components: `[total, c_1, ..., c_K]`.
///
/// The total is always the sum of the components; the only way to build a
/// `CostVector` is from its components, so the invariant cannot be broken.
///
/// # Examples
///
/// ```
/// use bbo::CostVector;
///
/// let costs = CostVector::from_components([0.5, 0.25, 0.0]);
/// assert_eq!(costs.total(), 0.75);
/// assert_eq!(costs.components(), &[0.5, 0.25, 0.0]);
/// assert_eq!(costs.as_slice(), &[0.75, 0.5, 0.25, 0.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "Vec<f64>", try_from = "Vec<f64>")
)]
pub struct CostVector(Vec<f64>);

impl CostVector {
    /// Build a cost vector whose total is the sum of `components`.
    #[must_use]
    pub fn from_components(components: impl Into<Vec<f64>>) -> Self {
        let components = components.into();
        let mut costs = Vec::with_capacity(components.len() + 1);
        costs.push(components.iter().sum());
        costs.extend(components);
        Self(costs)
    }

    /// A cost with a single component, for cost functions without a breakdown.
    #[must_use]
    pub fn scalar(cost: f64) -> Self {
        Self(vec![cost, cost])
    }

    /// The total cost, used for ranking samples.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0[0]
    }

    /// The individual cost components.
    #[must_use]
    pub fn components(&self) -> &[f64] {
        &self.0[1..]
    }

    /// Number of components (`K`).
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.0.len() - 1
    }

    /// The full vector, total first.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<CostVector> for Vec<f64> {
    fn from(costs: CostVector) -> Self {
        costs.0
    }
}

impl TryFrom<Vec<f64>> for CostVector {
    type Error = Error;

    /// Accept `[total, c_1..c_K]` only if the total matches the components.
    fn try_from(costs: Vec<f64>) -> Result<Self> {
        let Some((&total, components)) = costs.split_first() else {
            return Err(Error::InvalidConfiguration(
                "a cost vector needs at least a total".to_string(),
            ));
        };
        let sum: f64 = components.iter().sum();
        let tolerance = 1e-9 * total.abs().max(sum.abs()).max(1.0);
        if (total - sum).abs() > tolerance {
            return Err(Error::InvalidConfiguration(format!(
                "total cost {total} differs from the sum of its components {sum}"
            )));
        }
        Ok(Self(costs))
    }
}

impl core::fmt::Display for CostVector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.total())?;
        if !self.components().is_empty() {
            write!(f, " (")?;
            for (i, c) in self.components().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
