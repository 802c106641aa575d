use crate::errors::TransitionError;

/// Timestamp for the next payload to build on top of a parent with
/// `parent_timestamp`, given the consensus time of the deciding host.
/// Execution clients require strictly increasing timestamps.
pub fn next_timestamp(consensus_time: u64, parent_timestamp: u64) -> u64 {
    std::cmp::max(consensus_time, parent_timestamp) + 1
}

/// Bound a proposed payload timestamp by the parent timestamp below and the
/// host-asserted consensus time (plus a small drift) above.
pub fn verify_timestamp(
    consensus_time: u64,
    parent_timestamp: u64,
    timestamp: u64,
    max_drift: u64,
) -> Result<(), TransitionError> {
    let upper_bound = next_timestamp(consensus_time, parent_timestamp) + max_drift;
    if timestamp <= parent_timestamp || timestamp > upper_bound {
        return Err(TransitionError::InvalidPayloadTimestamp {
            timestamp,
            parent_timestamp,
            upper_bound,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_half_open() {
        // Parent at 100, host says 105, drift 2 => valid range (100, 108].
        assert!(verify_timestamp(105, 100, 100, 2).is_err());
        assert!(verify_timestamp(105, 100, 101, 2).is_ok());
        assert!(verify_timestamp(105, 100, 108, 2).is_ok());
        assert!(verify_timestamp(105, 100, 109, 2).is_err());
    }

    #[test]
    fn lagging_consensus_clock_still_allows_the_next_second() {
        // Parent already at the consensus time: the next slot must still be
        // buildable one second later.
        assert_eq!(next_timestamp(100, 100), 101);
        assert!(verify_timestamp(100, 100, 101, 0).is_ok());
    }
}
