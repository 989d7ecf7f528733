#![forbid(unsafe_code)]

//! Umbrella crate re-exporting the statframe public API.

pub use sf_frame::{
    Column, ColumnConfig, ColumnState, Frame, FrameError, RowPlacement, StatRowEntry,
    display_name,
};
pub use sf_reduce::{ReduceError, ReducerId, ReducerInfo, info, list, reduce, reducers};
pub use sf_transform::{
    FrameTransform, StatRowOptions, StatRowStage, TransformError, inject_stat_rows,
};
pub use sf_types::{DType, NullKind, Scalar, TypeError, common_dtype, infer_dtype};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        Column, Frame, FrameTransform, ReducerId, RowPlacement, Scalar, StatRowOptions,
        StatRowStage,
    };

    #[test]
    fn facade_wires_the_stage_end_to_end() {
        let frame = Frame::new(
            None,
            vec![
                Column::from_values("value", vec![2_i64.into(), 4_i64.into()])
                    .expect("column"),
            ],
        )
        .expect("frame");

        let mut reducers = BTreeMap::new();
        reducers.insert("value".to_owned(), vec![ReducerId::Mean]);
        let stage = StatRowStage::new(StatRowOptions {
            reducers,
            placement: RowPlacement::Bottom,
        });

        let out = stage.transform(vec![frame]).expect("transform");
        assert_eq!(out[0].row_count(), 3);
        assert_eq!(
            out[0].column("value").expect("value").values()[2],
            Scalar::Float64(3.0)
        );
    }
}
