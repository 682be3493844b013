//! End-to-end integration tests.
//!
//! Longer operation sequences than the per-module unit tests: trims and
//! appends interleaved across many segments, with restarts in between.

#[cfg(test)]
mod tests {
    use crate::fixtures::{fill, indexed_payload, small_segment_options, TestWal};
    use seglog_core::WalError;

    #[test]
    fn interleaved_trims_and_appends() {
        let mut fixture = TestWal::with_options(small_segment_options(3));
        fill(&fixture, 1..=12);

        fixture.clean(5).unwrap();
        fixture.truncate(10).unwrap();
        assert_eq!(fixture.first_index().unwrap(), 5);
        assert_eq!(fixture.last_index().unwrap(), 10);

        // Appends continue after the tail trim.
        for i in 11..=15 {
            fixture.write(i, &indexed_payload(i)).unwrap();
        }
        fixture.flush_and_sync().unwrap();

        fixture = fixture.reopen(small_segment_options(3));
        assert_eq!(fixture.first_index().unwrap(), 5);
        assert_eq!(fixture.last_index().unwrap(), 15);
        for i in 5..=15 {
            assert_eq!(fixture.read(i).unwrap(), indexed_payload(i), "entry {i}");
        }
        assert!(matches!(fixture.read(4), Err(WalError::OutOfRange)));
    }

    #[test]
    fn repeated_clean_walks_the_log_forward() {
        let fixture = TestWal::with_options(small_segment_options(4));
        fill(&fixture, 1..=20);

        for first in [3u64, 7, 11, 18] {
            fixture.clean(first).unwrap();
            assert_eq!(fixture.first_index().unwrap(), first);
            assert!(matches!(fixture.read(first - 1), Err(WalError::OutOfRange)));
            assert_eq!(fixture.read(first).unwrap(), indexed_payload(first));
            assert_eq!(fixture.read(20).unwrap(), indexed_payload(20));
        }
    }

    #[test]
    fn repeated_truncate_walks_the_log_backward() {
        let fixture = TestWal::with_options(small_segment_options(4));
        fill(&fixture, 1..=20);

        for last in [17u64, 12, 9, 2] {
            fixture.truncate(last).unwrap();
            assert_eq!(fixture.last_index().unwrap(), last);
            assert!(matches!(fixture.read(last + 1), Err(WalError::OutOfRange)));
            assert_eq!(fixture.read(last).unwrap(), indexed_payload(last));
            assert_eq!(fixture.read(1).unwrap(), indexed_payload(1));
        }
    }

    #[test]
    fn truncate_then_rewrite_diverging_history() {
        // The raft-style use: discard a suffix, then append different
        // entries over the same indices.
        let mut fixture = TestWal::with_options(small_segment_options(3));
        fill(&fixture, 1..=8);

        fixture.truncate(4).unwrap();
        for i in 5..=8 {
            fixture.write(i, format!("v2-{i}").as_bytes()).unwrap();
        }
        fixture.flush_and_sync().unwrap();

        fixture = fixture.reopen(small_segment_options(3));
        assert_eq!(fixture.read(3).unwrap(), indexed_payload(3));
        assert_eq!(fixture.read(6).unwrap(), b"v2-6");
        assert_eq!(fixture.last_index().unwrap(), 8);
    }

    #[test]
    fn restart_cycles_preserve_the_window() {
        let opts = || small_segment_options(5);
        let mut fixture = TestWal::with_options(opts());
        let mut next = 1u64;

        for round in 0..4 {
            let upto = next + 9;
            for i in next..=upto {
                fixture.write(i, &indexed_payload(i)).unwrap();
            }
            fixture.flush_and_sync().unwrap();
            next = upto + 1;

            // Keep a sliding window of the most recent 15 entries.
            let first = fixture.first_index().unwrap();
            if upto - first >= 15 {
                fixture.clean(upto - 14).unwrap();
            }
            fixture = fixture.reopen(opts());

            let first = fixture.first_index().unwrap();
            assert_eq!(fixture.last_index().unwrap(), upto, "round {round}");
            for i in first..=upto {
                assert_eq!(fixture.read(i).unwrap(), indexed_payload(i));
            }
        }
    }

    #[test]
    fn large_payloads_across_size_rollovers() {
        let opts = || seglog_core::Options::new().segment_size(4096);
        let mut fixture = TestWal::with_options(opts());

        let payloads: Vec<Vec<u8>> = (1u64..=10)
            .map(|i| vec![i as u8; 700 + i as usize])
            .collect();
        for (i, payload) in payloads.iter().enumerate() {
            fixture.write(1 + i as u64, payload).unwrap();
        }
        fixture.flush_and_sync().unwrap();

        fixture = fixture.reopen(opts());
        for (i, payload) in payloads.iter().enumerate() {
            assert_eq!(&fixture.read(1 + i as u64).unwrap(), payload);
        }
    }
}
