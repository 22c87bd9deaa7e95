use proptest::prelude::*;
use rustpet_analysis::{frequent_channel_pairs, Bins, ChannelPairCounts, Histogram};
use rustpet_core::{CoincidenceBatch, CoincidenceEvent, EventBatch};

fn batch_of(pairs: &[(u64, u64)]) -> CoincidenceBatch {
    let mut batch = CoincidenceBatch::default();
    for &(l, r) in pairs {
        batch.push(CoincidenceEvent {
            time_l: 0.0,
            charge_l: 0.0,
            channel_id_l: l,
            time_r: 0.0,
            charge_r: 0.0,
            channel_id_r: r,
        });
    }
    batch
}

proptest! {
    #[test]
    fn histogram_counts_values_in_range(
        values in prop::collection::vec(-10.0f64..110.0, 0..300),
        n in 1usize..50,
    ) {
        let h = Histogram::new(&values, &Bins::uniform(0.0, 100.0, n)).unwrap();
        let inside = values.iter().filter(|v| (0.0..=100.0).contains(*v)).count() as u64;
        prop_assert_eq!(h.len(), n);
        prop_assert_eq!(h.total(), inside);
    }

    #[test]
    fn threshold_one_keeps_every_pair(
        pairs in prop::collection::vec((0u64..6, 0u64..6), 0..100),
    ) {
        let batch = batch_of(&pairs);
        let frequent = frequent_channel_pairs(&batch, 1);
        prop_assert_eq!(frequent.len(), ChannelPairCounts::from_batch(&batch).distinct());
        prop_assert!(pairs.iter().all(|p| frequent.contains(p)));

        let max = ChannelPairCounts::from_batch(&batch).max_count();
        prop_assert!(frequent_channel_pairs(&batch, max + 1).is_empty());
    }

    #[test]
    fn split_counting_is_order_free(
        pairs in prop::collection::vec((0u64..4, 0u64..4), 1..80),
        split in 0usize..80,
    ) {
        let split = split.min(pairs.len());
        let (a, b) = pairs.split_at(split);
        let whole = ChannelPairCounts::from_batch(&batch_of(&pairs));
        let ab = ChannelPairCounts::from_batch(&batch_of(a)).merged(ChannelPairCounts::from_batch(&batch_of(b)));
        let ba = ChannelPairCounts::from_batch(&batch_of(b)).merged(ChannelPairCounts::from_batch(&batch_of(a)));
        prop_assert_eq!(&ab, &whole);
        prop_assert_eq!(&ba, &whole);
    }
}
