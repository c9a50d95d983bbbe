//! MODE Z support helpers
//!
//! The deflate negotiation itself happens inside the data broker (MODE Z
//! before the data command, MODE S restored afterwards); this module carries
//! the advertisement check and the session byte counters.

use std::sync::atomic::Ordering;

use super::FtpClient;

impl FtpClient {
    /// Whether the server's FEAT advertises deflate transfer mode
    ///
    /// Compressed transfers are attempted regardless when requested; this
    /// is a hint for callers that want to avoid a doomed MODE Z exchange.
    pub fn supports_compression(&self) -> bool {
        self.features
            .param("MODE")
            .is_some_and(|modes| modes.split_whitespace().any(|m| m.eq_ignore_ascii_case("Z")))
    }

    /// Add a finished transfer's byte counts to the session totals
    pub(super) fn record_compression(&self, compressed: u64, decompressed: u64) {
        self.bytes_compressed.fetch_add(compressed, Ordering::Relaxed);
        self.bytes_decompressed
            .fetch_add(decompressed, Ordering::Relaxed);
    }
}
