//! Time-sortable state identifiers (UUIDv7) and their generators.
//!
//! A [`StateId`] is the primary key of every ledger entry and the *only*
//! ordering authority for "current state" queries: the embedded 48-bit
//! millisecond timestamp occupies the most significant bits, so unsigned
//! comparison of two ids is comparison of their creation instants. No
//! secondary timestamp index is ever needed — a range of wall-clock time maps
//! to a range of ids via [`StateId::time_range`].
//!
//! Layout (RFC 9562 v7): `[48-bit unix millis][ver=7][12-bit rand_a]
//! [variant][62-bit rand_b]`.
//!
//! Two generators exist:
//! - [`SystemIdGenerator`] — wall-clock, strictly increasing per instance
//!   (a sequence counter in `rand_a` breaks same-millisecond ties, and the
//!   clock is clamped so it never runs backwards within an instance).
//! - [`FixedBaseIdGenerator`] — a fixed base instant plus a caller-controlled
//!   millisecond offset, for deterministic tests.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Safety buffer applied to both ends of [`StateId::time_range`], absorbing
/// clock rounding between id generation and timestamp capture.
pub const RANGE_BUFFER_MS: u64 = 1;

/// A time-sortable unique identifier for one ledger entry.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(uuid::Uuid);

impl StateId {
    /// Create a fresh id from the process-wide system generator.
    pub fn generate() -> Self {
        use std::sync::OnceLock;
        static GLOBAL: OnceLock<SystemIdGenerator> = OnceLock::new();
        GLOBAL.get_or_init(SystemIdGenerator::new).generate()
    }

    /// An id embedding exactly `millis` with zero random bits.
    ///
    /// Only for synthesizing range-query boundaries: every real id generated
    /// at or after `millis` compares `>=` this one. Never use as a row id.
    pub fn from_millis(millis: u64) -> Self {
        Self(uuid::Builder::from_unix_timestamp_millis(millis, &[0u8; 10]).into_uuid())
    }

    /// An id embedding `t` truncated to millisecond precision.
    pub fn from_datetime(t: DateTime<Utc>) -> Self {
        Self::from_millis(t.timestamp_millis().max(0) as u64)
    }

    /// The embedded unix timestamp in milliseconds (most significant 48 bits).
    pub fn timestamp_millis(&self) -> u64 {
        let b = self.0.as_bytes();
        (u64::from(b[0]) << 40)
            | (u64::from(b[1]) << 32)
            | (u64::from(b[2]) << 24)
            | (u64::from(b[3]) << 16)
            | (u64::from(b[4]) << 8)
            | u64::from(b[5])
    }

    /// The embedded instant as a timezone-aware datetime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_millis() as i64)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Whether this id carries the expected version and variant markers.
    ///
    /// Ids of any other UUID version simply fail this check; nothing panics
    /// on malformed input.
    pub fn is_valid(&self) -> bool {
        self.0.get_version_num() == 7 && self.0.get_variant() == uuid::Variant::RFC4122
    }

    /// Inclusive `(low, high)` pair bounding every id generated in
    /// `[start, end]`, with a [`RANGE_BUFFER_MS`] buffer on both ends.
    ///
    /// `end` defaults to now.
    pub fn time_range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> (Self, Self) {
        let start_ms = (start.timestamp_millis().max(0) as u64).saturating_sub(RANGE_BUFFER_MS);
        let end_ms =
            end.unwrap_or_else(Utc::now).timestamp_millis().max(0) as u64 + RANGE_BUFFER_MS;
        (Self::from_millis(start_ms), Self::from_millis(end_ms))
    }

    /// The id as an unsigned 128-bit integer; ordering matches `Ord`.
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Full 32-character lowercase hex (no hyphens).
    ///
    /// Fixed-length lowercase hex sorts lexicographically in id order, which
    /// is what the ledger store relies on for its TEXT primary key.
    pub fn to_hex(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// First 8 hex characters — for human display only, not lookup.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// Parse from hex (32 chars) or standard hyphenated UUID text.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl From<uuid::Uuid> for StateId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl From<StateId> for uuid::Uuid {
    fn from(id: StateId) -> uuid::Uuid {
        id.0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StateId({})", self.short())
    }
}

/// Source of fresh ledger-entry ids.
///
/// The state manager takes one by injection so tests can pin time with a
/// [`FixedBaseIdGenerator`].
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> StateId;
}

/// Build a v7 id from millis, a 12-bit sequence value, and 8 entropy bytes.
fn build_id(millis: u64, seq: u16, entropy: [u8; 8]) -> StateId {
    let mut random = [0u8; 10];
    random[0] = (seq >> 8) as u8 & 0x0F;
    random[1] = seq as u8;
    random[2..10].copy_from_slice(&entropy);
    StateId(uuid::Builder::from_unix_timestamp_millis(millis, &random).into_uuid())
}

/// Wall-clock id generator, strictly increasing per instance.
///
/// Within one millisecond, a sequence counter in the `rand_a` bits orders
/// ids; the millisecond field is clamped to the last observed value so a
/// backwards clock step cannot produce an out-of-order id.
pub struct SystemIdGenerator {
    last: Mutex<(u64, u16)>,
}

impl SystemIdGenerator {
    pub fn new() -> Self {
        Self {
            last: Mutex::new((0, 0)),
        }
    }
}

impl Default for SystemIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SystemIdGenerator {
    fn generate(&self) -> StateId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let (millis, seq) = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let (mut millis, mut seq) = *last;
            if now > millis {
                millis = now;
                seq = 0;
            } else {
                // Same or regressed millisecond: stay on the clamped tick
                // and advance the sequence; roll into the next tick on
                // exhaustion.
                seq += 1;
                if seq > 0x0FFF {
                    millis += 1;
                    seq = 0;
                }
            }
            *last = (millis, seq);
            (millis, seq)
        };
        let mut entropy = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut entropy);
        build_id(millis, seq, entropy)
    }
}

/// Deterministic id generator: fixed base instant + caller-set offset.
///
/// Every call advances an internal counter that lands in the random bits, so
/// ids are strictly increasing even for identical offsets. Test-only by
/// intent; it produces valid v7 ids.
pub struct FixedBaseIdGenerator {
    base_ms: u64,
    offset_ms: std::sync::atomic::AtomicU64,
    counter: std::sync::atomic::AtomicU64,
}

impl FixedBaseIdGenerator {
    pub fn new(base_ms: u64) -> Self {
        Self {
            base_ms,
            offset_ms: std::sync::atomic::AtomicU64::new(0),
            counter: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Set the offset used by subsequent [`IdGenerator::generate`] calls.
    pub fn set_offset_ms(&self, offset: u64) {
        self.offset_ms
            .store(offset, std::sync::atomic::Ordering::SeqCst);
    }

    /// Generate at an explicit offset from the base instant.
    pub fn generate_at(&self, offset_ms: u64) -> StateId {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        build_id(self.base_ms + offset_ms, 0, n.to_be_bytes())
    }
}

impl IdGenerator for FixedBaseIdGenerator {
    fn generate(&self) -> StateId {
        self.generate_at(self.offset_ms.load(std::sync::atomic::Ordering::SeqCst))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_is_valid_v7() {
        assert!(StateId::generate().is_valid());
        assert!(StateId::from_millis(0).is_valid());
        assert!(StateId::from_millis(1_700_000_000_000).is_valid());
    }

    #[test]
    fn test_other_versions_are_not_valid() {
        let nil = StateId::from(uuid::Uuid::nil());
        assert!(!nil.is_valid());

        let v4 = uuid::Builder::from_bytes([0xAB; 16])
            .with_version(uuid::Version::Random)
            .into_uuid();
        assert!(!StateId::from(v4).is_valid());
    }

    #[test]
    fn test_system_generator_strictly_increases() {
        let generator = SystemIdGenerator::new();
        let ids: Vec<StateId> = (0..500).map(|_| generator.generate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_ordering_follows_time() {
        let generator = FixedBaseIdGenerator::new(1_700_000_000_000);
        let early = generator.generate_at(0);
        let late = generator.generate_at(2_000);
        assert!(early.as_u128() < late.as_u128());
    }

    #[test]
    fn test_millis_roundtrip() {
        for millis in [0u64, 1, 999, 1_700_000_000_123, (1 << 48) - 1] {
            assert_eq!(StateId::from_millis(millis).timestamp_millis(), millis);
        }
    }

    #[test]
    fn test_datetime_roundtrip_truncates_to_millis() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap()
            + chrono::Duration::microseconds(123_456);
        let id = StateId::from_datetime(t);
        let back = id.datetime();
        assert_eq!(back.timestamp_millis(), t.timestamp_millis());
        assert_eq!(back.timestamp_subsec_micros() % 1000, 0);
    }

    #[test]
    fn test_fixed_base_identical_offsets_stay_ordered() {
        let generator = FixedBaseIdGenerator::new(1_700_000_000_000);
        let a = generator.generate_at(50);
        let b = generator.generate_at(50);
        let c = generator.generate_at(50);
        assert!(a < b && b < c);
        assert_eq!(a.timestamp_millis(), b.timestamp_millis());
    }

    #[test]
    fn test_time_range_bounds_real_ids() {
        let base = 1_700_000_000_000u64;
        let generator = FixedBaseIdGenerator::new(base);
        let inside = generator.generate_at(500);
        let before = generator.generate_at(0);
        let after = generator.generate_at(5_000);

        let start = DateTime::from_timestamp_millis((base + 100) as i64).unwrap();
        let end = DateTime::from_timestamp_millis((base + 1_000) as i64).unwrap();
        let (low, high) = StateId::time_range(start, Some(end));

        assert!(low <= inside && inside <= high);
        assert!(before < low);
        assert!(after > high);
    }

    #[test]
    fn test_time_range_buffer_is_applied() {
        let start = DateTime::from_timestamp_millis(10_000).unwrap();
        let (low, high) = StateId::time_range(start, Some(start));
        assert_eq!(low.timestamp_millis(), 10_000 - RANGE_BUFFER_MS);
        assert_eq!(high.timestamp_millis(), 10_000 + RANGE_BUFFER_MS);
    }

    #[test]
    fn test_hex_sorts_like_ids() {
        let generator = FixedBaseIdGenerator::new(1_700_000_000_000);
        let mut ids: Vec<StateId> = (0..20).map(|n| generator.generate_at(n * 3)).collect();
        let mut by_hex = ids.clone();
        ids.sort();
        by_hex.sort_by_key(|id| id.to_hex());
        assert_eq!(ids, by_hex);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = StateId::generate();
        assert_eq!(StateId::parse(&id.to_hex()).unwrap(), id);
        assert_eq!(StateId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = StateId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: StateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
