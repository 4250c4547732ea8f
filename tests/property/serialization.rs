//! Property-based serialization round-trip tests.
//!
//! Uses proptest to verify:
//! 1. Any valid `Task` survives encode → decode round-trip.
//! 2. Any valid `FeedMessage` survives encode → decode round-trip.
//! 3. Random bytes never cause a panic in `decode` (returns `Err` gracefully).

use proptest::prelude::*;
use taskcast_proto::feed::{self, FeedMessage};
use taskcast_proto::task::{Priority, Task};

// --- Arbitrary implementations for protocol types ---

/// Strategy for generating arbitrary `Priority` values.
fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Vital),
    ]
}

/// Strategy for generating arbitrary `Task` values.
/// Uses non-empty names so generated tasks satisfy the model invariant.
fn arb_task() -> impl Strategy<Value = Task> {
    ("[^\x00]{1,64}", "[^\x00]{0,256}", arb_priority())
        .prop_map(|(name, description, priority)| Task::new(name, description, priority))
}

/// Strategy for generating arbitrary `FeedMessage` values.
fn arb_feed_message() -> impl Strategy<Value = FeedMessage> {
    prop_oneof![
        arb_task().prop_map(FeedMessage::Task),
        arb_task().prop_map(FeedMessage::Submit),
        ".{0,128}".prop_map(|reason| FeedMessage::Error { reason }),
    ]
}

proptest! {
    #[test]
    fn task_round_trips(task in arb_task()) {
        let bytes = postcard::to_allocvec(&task).unwrap();
        let decoded: Task = postcard::from_bytes(&bytes).unwrap();
        prop_assert_eq!(task, decoded);
    }

    #[test]
    fn feed_message_round_trips(msg in arb_feed_message()) {
        let bytes = feed::encode(&msg).unwrap();
        let decoded = feed::decode(&bytes).unwrap();
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn decode_never_panics_on_garbage(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        // Either outcome is fine; what matters is no panic.
        let _ = feed::decode(&bytes);
    }

    #[test]
    fn decode_of_truncated_encoding_never_panics(msg in arb_feed_message(), cut in 0usize..64) {
        let bytes = feed::encode(&msg).unwrap();
        let cut = cut.min(bytes.len());
        let _ = feed::decode(&bytes[..cut]);
    }
}
