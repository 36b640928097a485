use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatline.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatline.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatline.client.request_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("chatline.stream.fragments");
pub(crate) static STREAM_TURNS: Counter = Counter::new("chatline.stream.turns");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatline.stream.errors");
pub(crate) static STREAM_INTERRUPTS: Counter = Counter::new("chatline.stream.interrupts");
pub(crate) static STREAM_TTFF: Moments = Moments::new("chatline.stream.ttff_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("chatline.stream.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_TURNS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_INTERRUPTS);
    collector.register_moments(&STREAM_TTFF);
    collector.register_moments(&STREAM_DURATION);
}
