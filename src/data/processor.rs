//! Data Processor Module
//! Joins the SNAP tables on `state` and derives the per-capita metrics.

use crate::config::PipelineConfig;
use crate::data::loader::{SnapTables, STATE_COLUMN};
use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{column}' is not numeric: {source}")]
    NonNumeric {
        column: String,
        source: PolarsError,
    },
    #[error("State '{state}' has no value for '{column}'")]
    MissingValue { state: String, column: String },
    #[error("State '{state}' has {column} = {value}; expected a whole count")]
    NotACount {
        state: String,
        column: String,
        value: f64,
    },
    #[error("States '{first}' and '{second}' both title-case to '{state}'")]
    AmbiguousState {
        state: String,
        first: String,
        second: String,
    },
    #[error("State '{state}' has {column} = {value}; ratio is undefined")]
    NonPositiveDenominator {
        state: String,
        column: String,
        value: i64,
    },
}

/// Value columns of the three source tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueColumns {
    pub benefits: String,
    pub households: String,
    pub persons: String,
}

impl ValueColumns {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            benefits: config.benefits.value_column.clone(),
            households: config.households.value_column.clone(),
            persons: config.persons.value_column.clone(),
        }
    }
}

impl Default for ValueColumns {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// One state present in all three tables, with both derived ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub state: String,
    pub total_benefits: f64,
    pub households: i64,
    pub persons: i64,
    pub snap_per_household: f64,
    pub snap_per_person: f64,
}

/// Handles the join and the derived columns.
pub struct DataProcessor;

impl DataProcessor {
    /// Inner-join the three tables on `state`.
    ///
    /// Keys must match exactly; a state missing from any table is dropped.
    /// Output columns: ["state", benefits, households, persons]
    pub fn join_on_state(
        tables: &SnapTables,
        columns: &ValueColumns,
    ) -> Result<DataFrame, ProcessorError> {
        let project = |df: &DataFrame, value: &str| {
            df.clone()
                .lazy()
                .select([col(STATE_COLUMN), col(value)])
        };
        let on = || [col(STATE_COLUMN)];

        let joined = project(&tables.benefits, columns.benefits.as_str())
            .join(
                project(&tables.households, columns.households.as_str()),
                on(),
                on(),
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                project(&tables.persons, columns.persons.as_str()),
                on(),
                on(),
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        let dropped = Self::distinct_states(tables)?.saturating_sub(joined.height());
        if dropped > 0 {
            warn!(
                dropped,
                "states missing from at least one table were excluded by the join"
            );
        }
        info!(rows = joined.height(), "joined tables on state");

        Ok(joined)
    }

    /// Compute `snap_per_household` and `snap_per_person` for every joined row,
    /// then title-case the state names. Rows come back sorted by state.
    pub fn derive_metrics(
        joined: &DataFrame,
        columns: &ValueColumns,
    ) -> Result<Vec<JoinedRecord>, ProcessorError> {
        let states = joined.column(STATE_COLUMN)?.str()?;
        let benefits = Self::numeric(joined, &columns.benefits, DataType::Float64)?;
        // Counts go through Float64 so that fractional values are seen, not truncated
        let households = Self::numeric(joined, &columns.households, DataType::Float64)?;
        let persons = Self::numeric(joined, &columns.persons, DataType::Float64)?;

        let benefits_ca = benefits.f64()?;
        let households_ca = households.f64()?;
        let persons_ca = persons.f64()?;

        let mut records: Vec<(String, JoinedRecord)> = Vec::with_capacity(joined.height());
        for i in 0..joined.height() {
            let state = states.get(i).unwrap_or_default();
            let missing = |column: &str| ProcessorError::MissingValue {
                state: state.to_string(),
                column: column.to_string(),
            };

            let total_benefits = benefits_ca
                .get(i)
                .filter(|v| v.is_finite())
                .ok_or_else(|| missing(columns.benefits.as_str()))?;
            let households = Self::count(state, households_ca.get(i), &columns.households)?;
            let persons = Self::count(state, persons_ca.get(i), &columns.persons)?;

            let snap_per_household =
                Self::ratio(state, total_benefits, households, &columns.households)?;
            let snap_per_person = Self::ratio(state, total_benefits, persons, &columns.persons)?;

            let record = JoinedRecord {
                state: title_case(state),
                total_benefits,
                households,
                persons,
                snap_per_household,
                snap_per_person,
            };
            records.push((state.to_string(), record));
        }

        records.sort_by(|a, b| a.1.state.cmp(&b.1.state).then_with(|| a.0.cmp(&b.0)));
        // Distinct source keys must stay distinct once title-cased
        if let Some(pair) = records.windows(2).find(|w| w[0].1.state == w[1].1.state) {
            return Err(ProcessorError::AmbiguousState {
                state: pair[0].1.state.clone(),
                first: pair[0].0.clone(),
                second: pair[1].0.clone(),
            });
        }
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    /// Join and derive in one step.
    pub fn process(
        tables: &SnapTables,
        columns: &ValueColumns,
    ) -> Result<Vec<JoinedRecord>, ProcessorError> {
        let joined = Self::join_on_state(tables, columns)?;
        Self::derive_metrics(&joined, columns)
    }

    fn numeric(df: &DataFrame, column: &str, dtype: DataType) -> Result<Series, ProcessorError> {
        df.column(column)?
            .as_materialized_series()
            .strict_cast(&dtype)
            .map_err(|source| ProcessorError::NonNumeric {
                column: column.to_string(),
                source,
            })
    }

    /// Number of distinct states across the three tables.
    fn distinct_states(tables: &SnapTables) -> Result<usize, ProcessorError> {
        let mut states = HashSet::new();
        for df in [&tables.benefits, &tables.households, &tables.persons] {
            states.extend(df.column(STATE_COLUMN)?.str()?.into_iter().flatten());
        }
        Ok(states.len())
    }

    /// A household or person count: present, finite and whole.
    fn count(state: &str, value: Option<f64>, column: &str) -> Result<i64, ProcessorError> {
        let value = value
            .filter(|v| !v.is_nan())
            .ok_or_else(|| ProcessorError::MissingValue {
                state: state.to_string(),
                column: column.to_string(),
            })?;
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(ProcessorError::NotACount {
                state: state.to_string(),
                column: column.to_string(),
                value,
            });
        }
        Ok(value as i64)
    }

    /// A zero or negative denominator is an error, never an infinite ratio.
    fn ratio(
        state: &str,
        numerator: f64,
        denominator: i64,
        column: &str,
    ) -> Result<f64, ProcessorError> {
        if denominator <= 0 {
            return Err(ProcessorError::NonPositiveDenominator {
                state: state.to_string(),
                column: column.to_string(),
                value: denominator,
            });
        }
        Ok(numerator / denominator as f64)
    }
}

/// Uppercase the first letter of every run of letters, lowercase the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(value_column: &str, rows: &[(&str, i64)]) -> DataFrame {
        let states: Vec<&str> = rows.iter().map(|(s, _)| *s).collect();
        let values: Vec<i64> = rows.iter().map(|(_, v)| *v).collect();
        DataFrame::new(vec![
            Column::new(STATE_COLUMN.into(), states),
            Column::new(value_column.into(), values),
        ])
        .unwrap()
    }

    fn tables(
        benefits: &[(&str, i64)],
        households: &[(&str, i64)],
        persons: &[(&str, i64)],
    ) -> SnapTables {
        SnapTables {
            benefits: table("TotalBenefits", benefits),
            households: table("Households", households),
            persons: table("Persons", persons),
        }
    }

    #[test]
    fn test_single_state_ratios() -> anyhow::Result<()> {
        let tables = tables(&[("Alpha", 1000)], &[("Alpha", 10)], &[("Alpha", 40)]);
        let records = DataProcessor::process(&tables, &ValueColumns::default())?;

        assert_eq!(records.len(), 1);
        let row = &records[0];
        assert_eq!(row.state, "Alpha");
        assert!((row.snap_per_household - 100.0).abs() < 1e-9);
        assert!((row.snap_per_person - 25.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_join_keeps_only_states_in_all_tables() -> anyhow::Result<()> {
        let tables = tables(
            &[("Alpha", 1000), ("Beta", 500), ("Gamma", 300)],
            &[("Alpha", 10), ("Beta", 5)],
            &[("Alpha", 40), ("Gamma", 30), ("Beta", 20)],
        );
        let records = DataProcessor::process(&tables, &ValueColumns::default())?;

        let states: Vec<&str> = records.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["Alpha", "Beta"]);
        Ok(())
    }

    #[test]
    fn test_join_is_case_and_whitespace_sensitive() -> anyhow::Result<()> {
        let tables = tables(
            &[("alpha", 1000), ("Beta", 500)],
            &[("Alpha", 10), ("Beta ", 5)],
            &[("alpha", 40), ("Beta", 20)],
        );
        let records = DataProcessor::process(&tables, &ValueColumns::default())?;
        assert!(records.is_empty());
        Ok(())
    }

    #[test]
    fn test_ratios_hold_for_every_row() -> anyhow::Result<()> {
        let tables = tables(
            &[("Alpha", 1234), ("Beta", 999), ("Gamma", 7)],
            &[("Alpha", 7), ("Beta", 3), ("Gamma", 2)],
            &[("Alpha", 13), ("Beta", 11), ("Gamma", 5)],
        );
        let records = DataProcessor::process(&tables, &ValueColumns::default())?;

        assert_eq!(records.len(), 3);
        for r in &records {
            assert!((r.snap_per_household - r.total_benefits / r.households as f64).abs() < 1e-9);
            assert!((r.snap_per_person - r.total_benefits / r.persons as f64).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_zero_households_is_an_error() {
        let tables = tables(&[("Alpha", 1000)], &[("Alpha", 0)], &[("Alpha", 40)]);
        let err = DataProcessor::process(&tables, &ValueColumns::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::NonPositiveDenominator { ref state, value: 0, .. } if state == "Alpha"
        ));
    }

    #[test]
    fn test_zero_persons_is_an_error() {
        let tables = tables(&[("Alpha", 1000)], &[("Alpha", 10)], &[("Alpha", 0)]);
        let err = DataProcessor::process(&tables, &ValueColumns::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::NonPositiveDenominator { ref column, value: 0, .. } if column == "Persons"
        ));
    }

    #[test]
    fn test_fractional_households_are_rejected() {
        for value in [10.5, 0.4] {
            let mut tables = tables(&[("Alpha", 1000)], &[("Alpha", 10)], &[("Alpha", 40)]);
            tables.households = DataFrame::new(vec![
                Column::new(STATE_COLUMN.into(), vec!["Alpha"]),
                Column::new("Households".into(), vec![value]),
            ])
            .unwrap();

            let err = DataProcessor::process(&tables, &ValueColumns::default()).unwrap_err();
            assert!(
                matches!(err, ProcessorError::NotACount { ref column, .. } if column == "Households"),
                "{value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_whole_float_counts_are_accepted() -> anyhow::Result<()> {
        let mut tables = tables(&[("Alpha", 1000)], &[("Alpha", 10)], &[("Alpha", 40)]);
        tables.persons = DataFrame::new(vec![
            Column::new(STATE_COLUMN.into(), vec!["Alpha"]),
            Column::new("Persons".into(), vec![40.0]),
        ])?;

        let records = DataProcessor::process(&tables, &ValueColumns::default())?;
        assert_eq!(records[0].persons, 40);
        assert!((records[0].snap_per_person - 25.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_keys_colliding_after_title_case_are_an_error() {
        let tables = tables(
            &[("california", 100), ("California", 200)],
            &[("california", 1), ("California", 2)],
            &[("california", 1), ("California", 2)],
        );
        let err = DataProcessor::process(&tables, &ValueColumns::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::AmbiguousState { ref state, ref first, ref second }
                if state == "California" && first == "California" && second == "california"
        ));
    }

    #[test]
    fn test_distinct_states_counts_every_table() -> anyhow::Result<()> {
        let tables = tables(
            &[("A", 1), ("B", 1)],
            &[("A", 1), ("C", 1)],
            &[("A", 1), ("B", 1)],
        );
        assert_eq!(DataProcessor::distinct_states(&tables)?, 3);

        let joined = DataProcessor::join_on_state(&tables, &ValueColumns::default())?;
        assert_eq!(joined.height(), 1);
        Ok(())
    }

    #[test]
    fn test_state_names_are_title_cased() -> anyhow::Result<()> {
        let tables = tables(
            &[("california", 100), ("NEW YORK", 100)],
            &[("california", 1), ("NEW YORK", 1)],
            &[("california", 1), ("NEW YORK", 1)],
        );
        let records = DataProcessor::process(&tables, &ValueColumns::default())?;
        let states: Vec<&str> = records.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["California", "New York"]);
        Ok(())
    }

    #[test]
    fn test_non_numeric_value_column() {
        let mut tables = tables(&[("Alpha", 1000)], &[("Alpha", 10)], &[("Alpha", 40)]);
        tables.persons = DataFrame::new(vec![
            Column::new(STATE_COLUMN.into(), vec!["Alpha"]),
            Column::new("Persons".into(), vec!["forty"]),
        ])
        .unwrap();

        let err = DataProcessor::process(&tables, &ValueColumns::default()).unwrap_err();
        assert!(matches!(err, ProcessorError::NonNumeric { ref column, .. } if column == "Persons"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("california"), "California");
        assert_eq!(title_case("north dakota"), "North Dakota");
        assert_eq!(title_case("DISTRICT OF COLUMBIA"), "District Of Columbia");
        assert_eq!(title_case("o'brien"), "O'Brien");
        assert_eq!(title_case(""), "");
    }
}
