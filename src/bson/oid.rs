//! ObjectId generation and text codec
//!
//! An ObjectId is 12 bytes:
//!
//! ```text
//! | 4-byte BE seconds | 3-byte machine | 2-byte process | 3-byte BE counter |
//! ```
//!
//! The counter is process-wide, seeded randomly when the generator is built
//! and incremented atomically, so ids generated within the same second
//! still differ.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use crate::config::IdentityConfig;
use crate::error::{CodecError, Result, WireError};

const COUNTER_MASK: u32 = 0x00FF_FFFF;
const MACHINE_MASK: u32 = 0x00FF_FFFF;

static DEFAULT_GENERATOR: OnceLock<ObjectIdGenerator> = OnceLock::new();

/// 12-byte unique document identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// The all-zero sentinel; never produced by a generator
    pub const EMPTY: ObjectId = ObjectId([0; 12]);

    /// Generate a new id from the process-wide default generator
    pub fn new() -> Self {
        default_generator().generate()
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Parse 24 hexadecimal characters (either case)
    ///
    /// # Arguments
    /// * `text` - Hex string
    ///
    /// # Returns
    /// * `Result<ObjectId>` - Parsed id or `MalformedIdentifier`
    pub fn parse_str(text: &str) -> Result<Self> {
        if text.len() != 24 {
            return Err(CodecError::MalformedIdentifier(text.to_string()).into());
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| WireError::from(CodecError::MalformedIdentifier(text.to_string())))?;
        Ok(ObjectId(bytes))
    }

    /// Lowercase 24-character hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creation time embedded in the first four bytes
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
    }

    pub fn machine_id(&self) -> u32 {
        u32::from_be_bytes([0, self.0[4], self.0[5], self.0[6]])
    }

    pub fn process_id(&self) -> u16 {
        u16::from_be_bytes([self.0[7], self.0[8]])
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }
}

/// The absent state of an id field is the empty sentinel
impl Default for ObjectId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }
}

/// ObjectId generator with injected machine and process identity
#[derive(Debug)]
pub struct ObjectIdGenerator {
    machine_id: [u8; 3],
    process_id: u16,
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    /// Create a generator with a random counter seed
    ///
    /// # Arguments
    /// * `machine_id` - Machine identifier; only the low 24 bits are used
    /// * `process_id` - Process identifier
    pub fn new(machine_id: u32, process_id: u16) -> Self {
        Self::with_counter_seed(machine_id, process_id, random_u32())
    }

    /// Create a generator with an explicit counter seed
    pub fn with_counter_seed(machine_id: u32, process_id: u16, seed: u32) -> Self {
        let m = (machine_id & MACHINE_MASK).to_be_bytes();
        Self {
            machine_id: [m[1], m[2], m[3]],
            process_id,
            counter: AtomicU32::new(seed & COUNTER_MASK),
        }
    }

    /// Build from configuration, falling back to the host name and the
    /// current process id for unset values
    pub fn from_config(config: &IdentityConfig) -> Self {
        let machine_id = config.machine_id.unwrap_or_else(host_machine_id);
        // Only the low 16 bits of the OS pid fit the layout.
        let process_id = config
            .process_id
            .unwrap_or_else(|| (std::process::id() & 0xFFFF) as u16);
        Self::new(machine_id, process_id)
    }

    /// Generate an id stamped with the current time
    pub fn generate(&self) -> ObjectId {
        let secs = Utc::now().timestamp().clamp(1, i64::from(u32::MAX)) as u32;
        self.generate_at(secs)
    }

    /// Generate an id stamped with `secs` since the epoch
    ///
    /// A zero timestamp is stamped as 1 so the result is never
    /// [`ObjectId::EMPTY`].
    pub fn generate_at(&self, secs: u32) -> ObjectId {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        let ts = secs.max(1).to_be_bytes();
        let pid = self.process_id.to_be_bytes();
        let c = count.to_be_bytes();
        ObjectId([
            ts[0],
            ts[1],
            ts[2],
            ts[3],
            self.machine_id[0],
            self.machine_id[1],
            self.machine_id[2],
            pid[0],
            pid[1],
            c[1],
            c[2],
            c[3],
        ])
    }

    pub fn machine_id(&self) -> u32 {
        u32::from_be_bytes([0, self.machine_id[0], self.machine_id[1], self.machine_id[2]])
    }

    pub fn process_id(&self) -> u16 {
        self.process_id
    }
}

/// The process-wide generator, created on first use
pub fn default_generator() -> &'static ObjectIdGenerator {
    DEFAULT_GENERATOR.get_or_init(|| ObjectIdGenerator::from_config(&IdentityConfig::default()))
}

/// Install the process-wide generator
///
/// Must run before the first id is generated; the generator is never
/// replaced afterwards.
pub fn install_default_generator(generator: ObjectIdGenerator) -> Result<()> {
    debug!(
        "Installing ObjectId generator (machine {:06x}, process {})",
        generator.machine_id(),
        generator.process_id()
    );
    DEFAULT_GENERATOR.set(generator).map_err(|_| {
        WireError::from(CodecError::InvalidState(
            "default ObjectId generator already initialized".to_string(),
        ))
    })
}

/// 24-bit machine id derived from the host name (FNV-1a)
fn host_machine_id() -> u32 {
    match hostname::get() {
        Ok(name) => {
            let mut hash: u32 = 0x811C_9DC5;
            for byte in name.to_string_lossy().bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(0x0100_0193);
            }
            hash & MACHINE_MASK
        }
        Err(_) => random_u32() & MACHINE_MASK,
    }
}

fn random_u32() -> u32 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_zero_identity_at_epoch_is_not_empty() {
        let generator = ObjectIdGenerator::with_counter_seed(0, 0, 0);
        let id = generator.generate_at(0);
        assert_ne!(id, ObjectId::EMPTY);
        assert!(!id.is_empty());
        assert_eq!(id.timestamp().timestamp(), 1);
    }

    #[test]
    fn test_layout() {
        let generator = ObjectIdGenerator::with_counter_seed(0xABCDEF, 0x1234, 0x000102);
        let id = generator.generate_at(0x5F5E_1000);
        assert_eq!(
            id.bytes(),
            [0x5F, 0x5E, 0x10, 0x00, 0xAB, 0xCD, 0xEF, 0x12, 0x34, 0x00, 0x01, 0x02]
        );
        assert_eq!(id.machine_id(), 0xABCDEF);
        assert_eq!(id.process_id(), 0x1234);
        assert_eq!(id.counter(), 0x000102);
        assert_eq!(id.timestamp().timestamp(), 0x5F5E_1000);
    }

    #[test]
    fn test_machine_id_truncated_to_24_bits() {
        let generator = ObjectIdGenerator::with_counter_seed(0xFF12_3456, 1, 0);
        assert_eq!(generator.machine_id(), 0x12_3456);
    }

    #[test]
    fn test_counter_wraps_at_24_bits() {
        let generator = ObjectIdGenerator::with_counter_seed(1, 1, 0x00FF_FFFF);
        let a = generator.generate_at(100);
        let b = generator.generate_at(100);
        assert_eq!(a.counter(), 0x00FF_FFFF);
        assert_eq!(b.counter(), 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_ten_thousand_unique_ids() {
        let ids: HashSet<ObjectId> = (0..10_000).map(|_| ObjectId::new()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(!ids.contains(&ObjectId::EMPTY));
    }

    #[test]
    fn test_same_second_ids_differ() {
        let generator = ObjectIdGenerator::new(7, 7);
        let a = generator.generate_at(1_700_000_000);
        let b = generator.generate_at(1_700_000_000);
        assert_ne!(a, b);
        assert_eq!(a.timestamp(), b.timestamp());
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let generator = Arc::new(ObjectIdGenerator::new(3, 3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..1_000)
                        .map(|_| generator.generate_at(1_700_000_000))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("generator thread panicked") {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 8_000);
    }

    #[test]
    fn test_parse_format_identity() {
        let id = ObjectId::new();
        let text = id.to_hex();
        assert_eq!(text.len(), 24);
        assert_eq!(text, text.to_lowercase());
        assert_eq!(ObjectId::parse_str(&text).unwrap(), id);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let upper = ObjectId::parse_str("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in [
            "",
            "507f1f77bcf86cd79943901",
            "507f1f77bcf86cd7994390111",
            "507f1f77bcf86cd79943901g",
            "zzzzzzzzzzzzzzzzzzzzzzzz",
            " 507f1f77bcf86cd79943901",
        ] {
            let err = ObjectId::parse_str(bad).unwrap_err();
            assert!(
                matches!(err.as_codec(), Some(CodecError::MalformedIdentifier(_))),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(ObjectId::EMPTY.is_empty());
        assert_eq!(ObjectId::EMPTY.to_hex(), "000000000000000000000000");
        assert_ne!(ObjectId::new(), ObjectId::EMPTY);
        assert_eq!(
            ObjectId::parse_str("000000000000000000000000").unwrap(),
            ObjectId::EMPTY
        );
    }

    #[test]
    fn test_from_config_uses_injected_identity() {
        let config = IdentityConfig {
            machine_id: Some(0x010203),
            process_id: Some(99),
        };
        let id = ObjectIdGenerator::from_config(&config).generate();
        assert_eq!(id.machine_id(), 0x010203);
        assert_eq!(id.process_id(), 99);
    }
}
