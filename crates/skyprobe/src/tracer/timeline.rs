//! Connection lifecycle timestamps and the phase durations derived from them.

use std::time::{Duration, Instant};

use crate::schema::PhaseDurations;

/// Instants recorded while a request moves through its connection lifecycle.
/// Events that never happened stay `None`.
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    pub started: Instant,
    pub dns_start: Option<Instant>,
    pub dns_done: Option<Instant>,
    pub connect_start: Option<Instant>,
    pub connect_done: Option<Instant>,
    pub tls_start: Option<Instant>,
    pub tls_done: Option<Instant>,
    pub got_conn: Option<Instant>,
    pub first_byte: Option<Instant>,
    pub finished: Option<Instant>,
}

fn between(from: Option<Instant>, to: Option<Instant>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.saturating_duration_since(from),
        _ => Duration::ZERO,
    }
}

impl Timeline {
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(started: Instant) -> Self {
        Self {
            started,
            dns_start: None,
            dns_done: None,
            connect_start: None,
            connect_done: None,
            tls_start: None,
            tls_done: None,
            got_conn: None,
            first_byte: None,
            finished: None,
        }
    }

    /// Connecting begins where DNS finished, or at request start without DNS
    pub fn begin_connect(&mut self) {
        self.connect_start = Some(self.dns_done.unwrap_or(self.started));
    }

    /// Derive the phase durations; the TLS phase is reported only when `tls` is set
    pub fn phases(&self, tls: bool) -> PhaseDurations {
        PhaseDurations {
            dns_lookup: between(self.dns_start, self.dns_done),
            tcp_connection: between(self.connect_start, self.connect_done),
            tls_handshake: tls.then(|| between(self.tls_start, self.tls_done)),
            server_processing: between(self.got_conn, self.first_byte),
            content_transfer: between(self.first_byte, self.finished),
            total: between(Some(self.dns_start.unwrap_or(self.started)), self.finished),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, millis: u64) -> Option<Instant> {
        Some(base + Duration::from_millis(millis))
    }

    fn full_timeline(base: Instant) -> Timeline {
        let mut timeline = Timeline::starting_at(base);
        timeline.dns_start = at(base, 1);
        timeline.dns_done = at(base, 11);
        timeline.begin_connect();
        timeline.connect_done = at(base, 31);
        timeline.tls_start = at(base, 31);
        timeline.tls_done = at(base, 71);
        timeline.got_conn = at(base, 72);
        timeline.first_byte = at(base, 152);
        timeline.finished = at(base, 155);
        timeline
    }

    #[test]
    fn test_https_phases() {
        let base = Instant::now();
        let phases = full_timeline(base).phases(true);

        assert_eq!(phases.dns_lookup, Duration::from_millis(10));
        assert_eq!(phases.tcp_connection, Duration::from_millis(20));
        assert_eq!(phases.tls_handshake, Some(Duration::from_millis(40)));
        assert_eq!(phases.server_processing, Duration::from_millis(80));
        assert_eq!(phases.content_transfer, Duration::from_millis(3));
        assert_eq!(phases.total, Duration::from_millis(154));

        for (_, phase) in phases.phases() {
            assert!(phases.total >= phase);
        }
    }

    #[test]
    fn test_tls_phase_only_for_https() {
        let phases = full_timeline(Instant::now()).phases(false);
        assert_eq!(phases.tls_handshake, None);
    }

    #[test]
    fn test_connect_starts_at_request_start_without_dns() {
        let base = Instant::now();
        let mut timeline = Timeline::starting_at(base);
        timeline.begin_connect();
        timeline.connect_done = at(base, 5);
        timeline.got_conn = at(base, 6);
        timeline.first_byte = at(base, 9);
        timeline.finished = at(base, 10);

        let phases = timeline.phases(false);
        assert_eq!(phases.dns_lookup, Duration::ZERO);
        assert_eq!(phases.tcp_connection, Duration::from_millis(5));
        assert_eq!(phases.total, Duration::from_millis(10));
    }

    #[test]
    fn test_out_of_order_events_saturate() {
        let base = Instant::now();
        let mut timeline = Timeline::starting_at(base);
        timeline.got_conn = at(base, 10);
        timeline.first_byte = at(base, 5);

        assert_eq!(timeline.phases(false).server_processing, Duration::ZERO);
    }
}
