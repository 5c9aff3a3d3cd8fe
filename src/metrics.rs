use tracing::trace;

// Lightweight metrics helpers that stay safe without a live recorder.
// Trace-based so demo builds keep working with the same call sites.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "partscout.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "partscout.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn phase_attempted(phase: &'static str) {
    trace!(
        target = "partscout.metrics",
        phase = phase,
        "identify_phase_attempted"
    );
}
