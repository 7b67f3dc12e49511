//! Decode counters in Prometheus exposition format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::error::DecodeError;
use crate::kerberos::KerberosValue;
use crate::ldap_protocol::LdapMessage;

/// Upper bucket bounds for per-chunk decode time, in seconds. +Inf is the count.
const DURATION_BUCKETS: [f64; 8] = [0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05];

/// Label under which a decoded PDU is counted.
pub trait PduKind {
    fn pdu_kind(&self) -> &'static str;
}

impl PduKind for LdapMessage {
    fn pdu_kind(&self) -> &'static str {
        self.protocol_op.name()
    }
}

impl PduKind for KerberosValue {
    fn pdu_kind(&self) -> &'static str {
        self.structure().name()
    }
}

#[derive(Debug, Default)]
struct DurationHistogram {
    buckets: [AtomicU64; 8],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl DurationHistogram {
    fn observe(&self, duration: Duration) {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;
        let secs = duration.as_secs_f64();
        // stored non-cumulative; render() sums
        if let Some(i) = DURATION_BUCKETS.iter().position(|&le| secs <= le) {
            self.buckets[i].fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

/// Lock-free decode statistics, shareable through `Arc`.
#[derive(Debug, Default)]
pub struct DecodeMetrics {
    pub streams_total: AtomicU64,
    pub chunks_total: AtomicU64,
    pub bytes_total: AtomicU64,
    pub errors_malformed: AtomicU64,
    pub errors_unexpected_tag: AtomicU64,
    pub errors_domain: AtomicU64,
    pub errors_truncated: AtomicU64,
    /// Decoded PDUs by kind (LDAP operation or Kerberos structure).
    pdus: DashMap<&'static str, AtomicU64>,
    chunk_duration: DurationHistogram,
}

impl DecodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_streams(&self) {
        self.streams_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn observe_chunk(&self, bytes: usize, duration: Duration) {
        self.chunks_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_total.fetch_add(bytes as u64, Ordering::Relaxed);
        self.chunk_duration.observe(duration);
    }

    #[inline]
    pub fn inc_pdu(&self, kind: &'static str) {
        self.pdus
            .entry(kind)
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_error(&self, error: &DecodeError) {
        let counter = match error {
            DecodeError::MalformedEncoding { .. } => &self.errors_malformed,
            DecodeError::UnexpectedTag { .. } => &self.errors_unexpected_tag,
            DecodeError::DomainConstraintViolation { .. } => &self.errors_domain,
            DecodeError::TruncatedInput { .. } => &self.errors_truncated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pdus_decoded(&self, kind: &str) -> u64 {
        self.pdus
            .get(kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn errors_total(&self) -> u64 {
        [
            &self.errors_malformed,
            &self.errors_unexpected_tag,
            &self.errors_domain,
            &self.errors_truncated,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, help, counter) in [
            ("ber_codec_streams_total", "Byte streams attached to a decoder.", &self.streams_total),
            ("ber_codec_chunks_total", "Input chunks fed to decoders.", &self.chunks_total),
            ("ber_codec_bytes_total", "Input bytes fed to decoders.", &self.bytes_total),
        ] {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, counter.load(Ordering::Relaxed)));
        }

        out.push_str("# HELP ber_codec_pdus_total Decoded PDUs by kind.\n");
        out.push_str("# TYPE ber_codec_pdus_total counter\n");
        let mut kinds: Vec<(&'static str, u64)> = self
            .pdus
            .iter()
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .collect();
        kinds.sort_unstable();
        for (kind, count) in kinds {
            out.push_str(&format!("ber_codec_pdus_total{{kind=\"{}\"}} {}\n", kind, count));
        }

        out.push_str("# HELP ber_codec_errors_total Decode errors by kind.\n");
        out.push_str("# TYPE ber_codec_errors_total counter\n");
        for (kind, counter) in [
            ("malformed_encoding", &self.errors_malformed),
            ("unexpected_tag", &self.errors_unexpected_tag),
            ("domain_constraint", &self.errors_domain),
            ("truncated_input", &self.errors_truncated),
        ] {
            out.push_str(&format!(
                "ber_codec_errors_total{{kind=\"{}\"}} {}\n",
                kind,
                counter.load(Ordering::Relaxed)
            ));
        }

        let hist = &self.chunk_duration;
        out.push_str("# HELP ber_codec_chunk_decode_seconds Time spent decoding one input chunk.\n");
        out.push_str("# TYPE ber_codec_chunk_decode_seconds histogram\n");
        let count = hist.count.load(Ordering::Relaxed);
        let mut cum = 0u64;
        for (i, &le) in DURATION_BUCKETS.iter().enumerate() {
            cum += hist.buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!("ber_codec_chunk_decode_seconds_bucket{{le=\"{}\"}} {}\n", le, cum));
        }
        out.push_str(&format!("ber_codec_chunk_decode_seconds_bucket{{le=\"+Inf\"}} {}\n", count));
        let sum_secs = hist.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        out.push_str(&format!("ber_codec_chunk_decode_seconds_sum {}\n", sum_secs));
        out.push_str(&format!("ber_codec_chunk_decode_seconds_count {}\n", count));

        out
    }
}
