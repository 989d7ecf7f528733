#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use sf_reduce::ReducerId;
use sf_types::{DType, Scalar, TypeError, infer_dtype};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPlacement {
    Top,
    #[default]
    Bottom,
}

/// Record of one synthetic row injected into a column.
///
/// Entries are append-only: each invocation that computes a value for a
/// column adds one, and the accumulated list is the authoritative set of
/// row indices to exclude from later aggregation input, regardless of
/// placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRowEntry {
    pub placement: RowPlacement,
    pub reducer: ReducerId,
    pub col: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub display_name: Option<String>,
    pub stat_rows: Vec<StatRowEntry>,
}

/// Derived display state other stages may cache on a column. Stale after
/// any structural edit, so transforms drop it when rebuilding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnState {
    pub display_name: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("column {column:?} has {found} rows but the frame has {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<Scalar>,
    config: ColumnConfig,
    #[serde(skip)]
    state: Option<ColumnState>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
            config: ColumnConfig::default(),
            state: None,
        }
    }

    /// Build a column with the dtype inferred from the values. Values are
    /// stored as delivered; inference only widens the declared dtype.
    pub fn from_values(name: impl Into<String>, values: Vec<Scalar>) -> Result<Self, FrameError> {
        let dtype = infer_dtype(&values)?;
        Ok(Self::new(name, dtype, values))
    }

    #[must_use]
    pub fn with_config(mut self, config: ColumnConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.config.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: ColumnState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn config(&self) -> &ColumnConfig {
        &self.config
    }

    #[must_use]
    pub fn stat_rows(&self) -> &[StatRowEntry] {
        &self.config.stat_rows
    }

    #[must_use]
    pub fn state(&self) -> Option<&ColumnState> {
        self.state.as_ref()
    }
}

/// One table-shaped snapshot: ordered columns of uniform length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    name: Option<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Frame {
    pub fn new(name: Option<String>, columns: Vec<Column>) -> Result<Self, FrameError> {
        let row_count = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != row_count {
                return Err(FrameError::RowCountMismatch {
                    column: column.name().to_owned(),
                    expected: row_count,
                    found: column.len(),
                });
            }
        }

        Ok(Self {
            name,
            columns,
            row_count,
        })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Resolve the name a column is addressed by in transform configuration.
///
/// Cached state wins, then the config override, then the column's own
/// name, qualified with the frame name when several frames in the batch
/// carry a column of the same name. Returns `None` for columns with no
/// usable name; such columns are not addressable.
#[must_use]
pub fn display_name(column: &Column, frame: &Frame, frames: &[Frame]) -> Option<String> {
    if let Some(cached) = column.state().and_then(|state| state.display_name.clone()) {
        return Some(cached);
    }

    if let Some(configured) = &column.config().display_name {
        if !configured.is_empty() {
            return Some(configured.clone());
        }
    }

    if column.name().is_empty() {
        return None;
    }

    if frames.len() > 1 {
        let carriers = frames
            .iter()
            .filter(|other| other.column(column.name()).is_some())
            .count();
        if carriers > 1 {
            if let Some(frame_name) = frame.name().filter(|name| !name.is_empty()) {
                return Some(format!("{frame_name} {}", column.name()));
            }
        }
    }

    Some(column.name().to_owned())
}

#[cfg(test)]
mod tests {
    use sf_reduce::ReducerId;
    use sf_types::{NullKind, Scalar};

    use super::{
        Column, ColumnState, Frame, FrameError, RowPlacement, StatRowEntry, display_name,
    };

    fn int_column(name: &str, values: &[i64]) -> Column {
        Column::from_values(name, values.iter().map(|v| Scalar::Int64(*v)).collect())
            .expect("column should build")
    }

    #[test]
    fn frame_rejects_ragged_columns() {
        let err = Frame::new(
            None,
            vec![int_column("a", &[1, 2, 3]), int_column("b", &[1, 2])],
        )
        .expect_err("must fail");

        assert!(matches!(
            err,
            FrameError::RowCountMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn display_name_prefers_cached_state_then_config() {
        let column = int_column("raw", &[1])
            .with_display_name("configured")
            .with_state(ColumnState {
                display_name: Some("cached".to_owned()),
            });
        let frame = Frame::new(None, vec![column]).expect("frame");

        let frames = [frame];
        let resolved = display_name(&frames[0].columns()[0], &frames[0], &frames);
        assert_eq!(resolved.as_deref(), Some("cached"));
    }

    #[test]
    fn display_name_qualifies_shadowed_columns_with_frame_name() {
        let a = Frame::new(Some("cpu".to_owned()), vec![int_column("value", &[1])])
            .expect("frame a");
        let b = Frame::new(Some("mem".to_owned()), vec![int_column("value", &[2])])
            .expect("frame b");

        let frames = [a, b];
        let resolved = display_name(&frames[0].columns()[0], &frames[0], &frames);
        assert_eq!(resolved.as_deref(), Some("cpu value"));
    }

    #[test]
    fn display_name_is_absent_for_unnamed_columns() {
        let column = Column::from_values("", vec![Scalar::Int64(1)]).expect("column");
        let frame = Frame::new(None, vec![column]).expect("frame");

        let frames = [frame];
        assert_eq!(display_name(&frames[0].columns()[0], &frames[0], &frames), None);
    }

    #[test]
    fn stat_row_metadata_travels_through_serde() {
        let mut column = int_column("value", &[1, 2, 6]);
        column = column.with_config(super::ColumnConfig {
            display_name: None,
            stat_rows: vec![StatRowEntry {
                placement: RowPlacement::Bottom,
                reducer: ReducerId::Sum,
                col: 0,
                row: 2,
            }],
        });
        let frame = Frame::new(None, vec![column.with_state(ColumnState::default())])
            .expect("frame");

        let encoded = serde_json::to_string(&frame).expect("serialize");
        let decoded: Frame = serde_json::from_str(&encoded).expect("deserialize");

        let restored = &decoded.columns()[0];
        assert_eq!(restored.stat_rows().len(), 1);
        assert_eq!(restored.stat_rows()[0].row, 2);
        // Cached state is derived data and does not round-trip.
        assert!(restored.state().is_none());
    }

    #[test]
    fn missing_values_are_representable_in_typed_columns() {
        let column = Column::from_values(
            "value",
            vec![
                Scalar::Int64(1),
                Scalar::Null(NullKind::Null),
                Scalar::Int64(3),
            ],
        )
        .expect("column");

        assert_eq!(column.len(), 3);
        assert!(column.values()[1].is_missing());
    }
}
