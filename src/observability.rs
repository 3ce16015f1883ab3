use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("routerchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("routerchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("routerchat.client.request_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("routerchat.stream.fragments");
pub(crate) static STREAM_SKIPPED_CHUNKS: Counter =
    Counter::new("routerchat.stream.skipped_chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("routerchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("routerchat.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("routerchat.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("routerchat.session.turns");
pub(crate) static SESSION_TURN_FAILURES: Counter =
    Counter::new("routerchat.session.turn_failures");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("routerchat.session.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_SKIPPED_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURN_FAILURES);
    collector.register_moments(&SESSION_TURN_DURATION);
}
