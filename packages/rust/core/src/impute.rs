//! Numeric fill strategies for missing cells.

use polars::prelude::*;

use cinelayer_shared::{ColumnKind, Frame, ImputationKind, RefineConfig, Result};

/// Computes the value used to fill nulls in one numeric column.
pub trait Imputer: Send + Sync {
    /// Strategy name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Fill value from the column's values; nulls are ignored. `None` leaves
    /// the column untouched.
    fn fill_value(&self, values: &Float64Chunked) -> Option<f64>;
}

/// Arithmetic mean of present values.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanImputer;

impl Imputer for MeanImputer {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn fill_value(&self, values: &Float64Chunked) -> Option<f64> {
        values.mean()
    }
}

/// Median of present values.
#[derive(Debug, Default, Clone, Copy)]
pub struct MedianImputer;

impl Imputer for MedianImputer {
    fn name(&self) -> &'static str {
        "median"
    }

    fn fill_value(&self, values: &Float64Chunked) -> Option<f64> {
        values.median()
    }
}

/// Fixed fill value, regardless of the data.
#[derive(Debug, Clone, Copy)]
pub struct ConstantImputer(pub f64);

impl Imputer for ConstantImputer {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn fill_value(&self, _values: &Float64Chunked) -> Option<f64> {
        Some(self.0)
    }
}

/// Build the imputer selected in `[refine]`.
pub fn imputer_for(config: &RefineConfig) -> Box<dyn Imputer> {
    match config.imputation {
        ImputationKind::Mean => Box::new(MeanImputer),
        ImputationKind::Median => Box::new(MedianImputer),
        ImputationKind::Constant => Box::new(ConstantImputer(config.constant_fill)),
    }
}

/// What [`impute_column`] did to a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Imputation {
    pub column: String,
    pub filled: usize,
    pub value: f64,
}

/// Fill the nulls of a numeric column in place.
///
/// Returns `None` when the column has no nulls, is not numeric, or the
/// imputer has nothing to offer (e.g. the mean of no values). An `Integer`
/// column receiving a fractional fill is promoted to `Float`.
pub fn impute_column(
    frame: &mut Frame,
    name: &str,
    imputer: &dyn Imputer,
) -> Result<Option<Imputation>> {
    let column = frame.column(name)?;
    let kind = ColumnKind::of(column.dtype());
    let nulls = column.null_count();
    if !kind.is_numeric() || nulls == 0 {
        return Ok(None);
    }

    let floats = column.cast(&DataType::Float64)?;
    let Some(value) = imputer
        .fill_value(floats.f64()?)
        .filter(|v| v.is_finite())
    else {
        return Ok(None);
    };

    let fill = if kind == ColumnKind::Integer && value.fract() == 0.0 {
        lit(value as i64)
    } else {
        frame.upsert_column(floats)?;
        lit(value)
    };

    let filled = frame
        .df()
        .clone()
        .lazy()
        .with_column(col(name).fill_null(fill))
        .collect()?;
    *frame = Frame::from(filled);

    Ok(Some(Imputation {
        column: name.to_string(),
        filled: nulls,
        value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(column: Column) -> Frame {
        Frame::new(vec![column]).unwrap()
    }

    fn popularity(values: &[Option<f64>]) -> Frame {
        frame_of(Column::new("popularity".into(), values))
    }

    fn chunk(values: &[Option<f64>]) -> Float64Chunked {
        Float64Chunked::from_slice_options("v".into(), values)
    }

    #[test]
    fn mean_fill_matches_present_mean() {
        let mut frame = popularity(&[Some(2.0), None, Some(4.0), None]);
        let done = impute_column(&mut frame, "popularity", &MeanImputer)
            .unwrap()
            .unwrap();
        assert_eq!(done.filled, 2);
        assert_eq!(done.value, 3.0);
        assert_eq!(frame.column("popularity").unwrap().null_count(), 0);
        assert_eq!(
            frame.f64_values("popularity").unwrap(),
            vec![Some(2.0), Some(3.0), Some(4.0), Some(3.0)]
        );
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(MedianImputer.fill_value(&chunk(&[Some(3.0), Some(1.0), Some(2.0)])), Some(2.0));
        assert_eq!(
            MedianImputer.fill_value(&chunk(&[Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)])),
            Some(2.5)
        );
        assert_eq!(MedianImputer.fill_value(&chunk(&[None])), None);
    }

    #[test]
    fn integer_column_promoted_on_fractional_fill() {
        let mut frame = frame_of(Column::new("vote_count".into(), [Some(1i64), None, Some(2)]));
        impute_column(&mut frame, "vote_count", &MeanImputer).unwrap();
        assert_eq!(frame.kind("vote_count"), Some(ColumnKind::Float));
        assert_eq!(
            frame.rendered("vote_count").unwrap(),
            vec![Some("1.0".into()), Some("1.5".into()), Some("2.0".into())]
        );
    }

    #[test]
    fn integer_column_kept_on_integral_fill() {
        let mut frame = frame_of(Column::new("vote_count".into(), [Some(2i64), None, Some(4)]));
        impute_column(&mut frame, "vote_count", &MeanImputer).unwrap();
        assert_eq!(frame.kind("vote_count"), Some(ColumnKind::Integer));
        assert_eq!(frame.rendered("vote_count").unwrap()[1].as_deref(), Some("3"));
    }

    #[test]
    fn all_null_column_left_untouched() {
        let mut frame = popularity(&[None, None]);
        assert!(impute_column(&mut frame, "popularity", &MeanImputer)
            .unwrap()
            .is_none());
        assert_eq!(frame.column("popularity").unwrap().null_count(), 2);
    }

    #[test]
    fn text_columns_are_not_imputed() {
        let mut frame = frame_of(Column::new("title".into(), [Some("A"), None]));
        assert!(impute_column(&mut frame, "title", &ConstantImputer(1.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn constant_imputer_ignores_data() {
        let mut frame = popularity(&[None, None]);
        let done = impute_column(&mut frame, "popularity", &ConstantImputer(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(done.filled, 2);
        assert_eq!(frame.f64_values("popularity").unwrap(), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn imputer_follows_config() {
        let mut config = RefineConfig::default();
        assert_eq!(imputer_for(&config).name(), "mean");
        config.imputation = ImputationKind::Median;
        assert_eq!(imputer_for(&config).name(), "median");
        config.imputation = ImputationKind::Constant;
        config.constant_fill = 7.0;
        assert_eq!(imputer_for(&config).fill_value(&chunk(&[Some(1.0)])), Some(7.0));
    }
}
