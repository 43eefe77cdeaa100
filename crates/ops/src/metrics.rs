//! Prometheus metrics exported by the shuffle core.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Count of new physical partitions created for a collection, keyed by
    /// collection name. Incremented once per successful `CreatePartition`
    /// race winner in the mapper; a process that loses the race (because a
    /// concurrent writer created the partition first) does not increment it.
    pub static ref PARTITIONS_CREATED: IntCounterVec = register_int_counter_vec!(
        "flow_collection_partitions_created_total",
        "Number of new physical partitions created for a collection",
        &["collection"]
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments_by_label() {
        PARTITIONS_CREATED.with_label_values(&["acmeCo/widgets"]).inc();
        assert_eq!(
            PARTITIONS_CREATED
                .with_label_values(&["acmeCo/widgets"])
                .get(),
            1
        );
    }
}
