//! Change fingerprints for the per-subscriber notification gate.
//!
//! A fingerprint is an order-independent 64-bit digest over the fields
//! subscribers can observe: id, derived status, quantized progress, and
//! quantized throughput. Two canonical maps with the same observable
//! content produce the same fingerprint regardless of iteration order, so
//! the scheduler can skip subscribers whose view has not changed.

use tether_core::Transfer;

/// Progress buckets of 0.1%.
const PROGRESS_QUANTUM: f64 = 0.001;
/// Throughput buckets of 1 KiB/s.
const RATE_QUANTUM: u64 = 1024;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(hash: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(hash, |acc, byte| {
        (acc ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Digest of one transfer's observable fields.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn entity_digest(transfer: &Transfer) -> u64 {
    let quantized_progress = (transfer.progress / PROGRESS_QUANTUM).round() as u64;
    let mut hash = fnv1a(FNV_OFFSET, transfer.id.as_str().as_bytes());
    hash = fnv1a(hash, &[transfer.status.discriminant()]);
    hash = fnv1a(hash, &quantized_progress.to_le_bytes());
    hash = fnv1a(hash, &(transfer.rate_down / RATE_QUANTUM).to_le_bytes());
    hash = fnv1a(hash, &(transfer.rate_up / RATE_QUANTUM).to_le_bytes());
    hash
}

/// Order-independent fingerprint over a set of transfers.
pub fn fingerprint<'a>(transfers: impl IntoIterator<Item = &'a Transfer>) -> u64 {
    let (sum, count) = transfers
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), transfer| {
            (sum.wrapping_add(entity_digest(transfer)), count + 1)
        });
    sum ^ count.wrapping_mul(FNV_PRIME)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
