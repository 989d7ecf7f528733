#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sf_frame::{Column, Frame, FrameError, RowPlacement, StatRowEntry, display_name};
use sf_reduce::{ReduceError, ReducerId, reduce};
use sf_types::{NullKind, Scalar};
use thiserror::Error;

/// Configuration for one stat-row invocation, supplied by the caller on
/// every pass; the stage keeps no state of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRowOptions {
    /// Reducers per column, keyed by resolved display name. Only the
    /// first id in each list produces a value.
    pub reducers: BTreeMap<String, Vec<ReducerId>>,
    pub placement: RowPlacement,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A synchronous pipeline stage over batches of frames. The host invokes
/// `transform` once per upstream emission.
pub trait FrameTransform {
    fn id(&self) -> &'static str;

    fn transform(&self, frames: Vec<Frame>) -> Result<Vec<Frame>, TransformError>;
}

/// The stat-row stage: reduces each configured column to one aggregate
/// value and injects the results as a synthetic row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRowStage {
    pub options: StatRowOptions,
}

impl StatRowStage {
    pub const ID: &'static str = "stat_row";

    #[must_use]
    pub fn new(options: StatRowOptions) -> Self {
        Self { options }
    }
}

impl FrameTransform for StatRowStage {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn transform(&self, frames: Vec<Frame>) -> Result<Vec<Frame>, TransformError> {
        inject_stat_rows(frames, &self.options)
    }
}

/// Row placement resolved once per invocation, before any column is
/// rebuilt: every top-placed value of one pass lands at the same index.
#[derive(Debug, Clone, Copy)]
struct PlacementPlan {
    next_top_row: usize,
}

impl PlacementPlan {
    fn scan(frames: &[Frame]) -> Self {
        let max_top = frames
            .iter()
            .flat_map(Frame::columns)
            .flat_map(Column::stat_rows)
            .filter(|entry| entry.placement == RowPlacement::Top)
            .map(|entry| entry.row)
            .max();

        Self {
            next_top_row: max_top.map_or(0, |row| row + 1),
        }
    }

    /// Index for a column that produced no aggregate this pass.
    fn default_row(self, placement: RowPlacement, column_len: usize) -> usize {
        match placement {
            RowPlacement::Top => self.next_top_row,
            RowPlacement::Bottom => column_len,
        }
    }

    /// Index for a column that did produce an aggregate. Bottom rows
    /// stack directly after the column's latest bottom entry rather than
    /// jumping to the tail of a possibly longer column.
    fn stat_row(
        self,
        placement: RowPlacement,
        column_len: usize,
        stat_rows: &[StatRowEntry],
    ) -> usize {
        match placement {
            RowPlacement::Top => self.next_top_row,
            RowPlacement::Bottom => stat_rows
                .iter()
                .rev()
                .find(|entry| entry.placement == RowPlacement::Bottom)
                .map_or(column_len, |entry| entry.row + 1),
        }
    }
}

/// Inject one aggregate row into every frame of the batch.
///
/// Frames whose columns all fail display-name resolution are omitted;
/// every surviving frame grows by exactly one row, including columns with
/// no configured reducer (they get an unset value so the frame stays
/// rectangular). With no reducer configured anywhere the input batch is
/// returned untouched.
pub fn inject_stat_rows(
    frames: Vec<Frame>,
    options: &StatRowOptions,
) -> Result<Vec<Frame>, TransformError> {
    if options.reducers.values().all(|ids| ids.is_empty()) {
        return Ok(frames);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        frames = frames.len(),
        placement = ?options.placement,
        "injecting stat rows"
    );

    let plan = PlacementPlan::scan(&frames);
    let mut processed = Vec::with_capacity(frames.len());

    for frame in &frames {
        let mut columns = Vec::with_capacity(frame.columns().len());
        for (col, column) in frame.columns().iter().enumerate() {
            // Unnamed columns are not addressable by configuration.
            let Some(name) = display_name(column, frame, &frames) else {
                continue;
            };
            let reducer_ids = options.reducers.get(&name).map_or(&[][..], Vec::as_slice);
            columns.push(rebuild_column(
                column,
                col,
                reducer_ids,
                options.placement,
                plan,
            )?);
        }

        if columns.is_empty() {
            continue;
        }
        processed.push(Frame::new(frame.name().map(str::to_owned), columns)?);
    }

    Ok(processed)
}

/// Produce the column's next revision: one extra value at the resolved
/// index and, when a reducer ran, one extra tracker entry.
fn rebuild_column(
    column: &Column,
    col: usize,
    reducer_ids: &[ReducerId],
    placement: RowPlacement,
    plan: PlacementPlan,
) -> Result<Column, TransformError> {
    let mut config = column.config().clone();
    let tracked: Vec<usize> = config.stat_rows.iter().map(|entry| entry.row).collect();

    let (value, row) = if let Some(&reducer) = reducer_ids.first() {
        // Rows injected by earlier passes never feed the aggregate.
        let sample: Vec<Scalar> = column
            .values()
            .iter()
            .enumerate()
            .filter(|(idx, _)| !tracked.contains(idx))
            .map(|(_, value)| value.clone())
            .collect();

        let results = reduce(&sample, reducer_ids)?;
        let value = results
            .get(&reducer)
            .cloned()
            .unwrap_or(Scalar::Null(NullKind::Null));

        // Clamp so short columns under a tall shared top index stay
        // insertable; the entry records the row actually written.
        let row = plan
            .stat_row(placement, column.len(), &config.stat_rows)
            .min(column.len());
        config.stat_rows.push(StatRowEntry {
            placement,
            reducer,
            col,
            row,
        });
        (value, row)
    } else {
        let row = plan.default_row(placement, column.len()).min(column.len());
        (Scalar::Null(NullKind::Null), row)
    };

    let mut values = column.values().to_vec();
    values.insert(row, value);

    // Rebuilding is a structural edit; any cached display state is stale.
    Ok(Column::new(column.name(), column.dtype(), values).with_config(config))
}
