//! Queue topology names.
//!
//! The names are part of the external contract: every worker and the
//! front-end address queues by these exact strings, and mismatched
//! declaration parameters are broker-fatal.

/// Live-stream capture jobs.
pub const COLLECT_QUEUE: &str = "collect_queue";

/// Transcription jobs (per whole video, or per stream segment).
pub const TRANSCRIBE_QUEUE: &str = "transcribe_queue";

/// Transcript analysis jobs.
pub const ANALYSE_QUEUE: &str = "analyse_queue";

/// Clip-cutting jobs.
pub const EDIT_QUEUE: &str = "edit_queue";

/// Terminal notifications. Informational only: no dead-letter binding.
pub const COMPLETED_QUEUE: &str = "completed_queue";

/// Parking lot for messages rejected without requeue.
pub const DEAD_LETTER_QUEUE: &str = "dead_letter_queue";

/// Fanout exchange routing rejected messages into the DLQ.
pub const DEAD_LETTER_EXCHANGE: &str = "dlx";

/// The primary queues that carry the dead-letter arguments.
pub const DEAD_LETTERED_QUEUES: [&str; 4] =
    [COLLECT_QUEUE, TRANSCRIBE_QUEUE, ANALYSE_QUEUE, EDIT_QUEUE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_queue_has_no_dlx() {
        assert!(!DEAD_LETTERED_QUEUES.contains(&COMPLETED_QUEUE));
        assert!(!DEAD_LETTERED_QUEUES.contains(&DEAD_LETTER_QUEUE));
    }
}
