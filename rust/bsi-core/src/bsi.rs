//! Bit-sliced index over 64-bit identifiers.
//!
//! A [`Bsi`] stores one integer per identifier. Bit `i` of every stored value
//! lives in plane `i`, a compressed set of the identifiers whose value has
//! that bit set. A separate existence set records which identifiers hold a
//! value at all; plane membership of an identifier outside the existence set
//! carries no meaning.
//!
//! Values are fixed-width bit patterns. The width is derived from the declared
//! bounds, or grows on demand when both bounds are zero ("auto-size" mode).
//! There is no sign extension: a negative value stored in a narrow index is
//! truncated to the low `bit_count()` bits, and in auto-size mode it occupies
//! all 64 planes and orders above every non-negative value.

use rayon::prelude::*;
use roaring::RoaringTreemap;

use crate::config::BsiConfig;

/// Widest supported value, in planes.
pub(crate) const MAX_PLANES: usize = 64;

/// Number of bits needed to represent the pattern `value`.
#[inline]
pub(crate) fn bit_len(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()) as usize
}

/// Bit-sliced index: a plane per bit position plus an existence set.
#[derive(Debug, Clone)]
pub struct Bsi {
    pub(crate) max_value: i64,
    pub(crate) min_value: i64,
    pub(crate) planes: Vec<RoaringTreemap>,
    pub(crate) existence: RoaringTreemap,
    pub(crate) config: BsiConfig,
}

impl Bsi {
    /// Creates an index whose width fits `max(|max_value|, |min_value|)`.
    ///
    /// When both bounds are zero the index starts with no planes and grows as
    /// values are set.
    ///
    /// The width only covers magnitudes: a negative bound does not reserve
    /// room for negative values. `Bsi::new(100, -100)` has 7 planes, so a
    /// later `set_value(id, -100)` keeps the low 7 bits of the two's
    /// complement pattern and reads back as 28. Store negative values in an
    /// auto-sized index (or one declared 64 planes wide) to keep them intact.
    pub fn new(max_value: i64, min_value: i64) -> Bsi {
        let magnitude = max_value.unsigned_abs().max(min_value.unsigned_abs());
        let plane_count = bit_len(magnitude);
        Bsi {
            max_value,
            min_value,
            planes: vec![RoaringTreemap::new(); plane_count],
            existence: RoaringTreemap::new(),
            config: BsiConfig::default(),
        }
    }

    /// Creates an auto-sized index.
    pub fn new_default() -> Bsi {
        Bsi::new(0, 0)
    }

    /// Replaces the execution parameters of this index.
    ///
    /// `config` is attached as is. Build it with
    /// [`BsiConfig::with_all_parameters`] or call [`BsiConfig::validate`]
    /// first when its fields were set by hand. Batch operations accept any
    /// degree of parallelism, so an oversized value only costs scheduling.
    pub fn with_config(mut self, config: BsiConfig) -> Bsi {
        self.config = config;
        self
    }

    #[inline]
    pub fn config(&self) -> &BsiConfig {
        &self.config
    }

    #[inline]
    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    #[inline]
    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    /// Whether the width is derived from the stored values rather than from
    /// declared bounds.
    #[inline]
    pub fn is_auto_size(&self) -> bool {
        self.max_value == 0 && self.min_value == 0
    }

    /// Number of planes (the bit width of stored values).
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.planes.len()
    }

    /// Number of identifiers holding a value.
    #[inline]
    pub fn cardinality(&self) -> u64 {
        self.existence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.existence.is_empty()
    }

    /// The set of identifiers holding a value.
    #[inline]
    pub fn existence(&self) -> &RoaringTreemap {
        &self.existence
    }

    /// Plane `index`, i.e. the identifiers whose value has bit `index` set.
    #[inline]
    pub fn plane(&self, index: usize) -> Option<&RoaringTreemap> {
        self.planes.get(index)
    }

    #[inline]
    pub fn value_exists(&self, id: u64) -> bool {
        self.existence.contains(id)
    }

    /// Stores `value` for `id`, replacing any previous value.
    ///
    /// In auto-size mode the index first grows to the bit length of `value`.
    /// With declared bounds, bits above `bit_count()` are dropped.
    pub fn set_value(&mut self, id: u64, value: i64) {
        let pattern = value as u64;
        if self.is_auto_size() {
            self.ensure_planes(bit_len(pattern));
        }

        let update = move |(i, plane): (usize, &mut RoaringTreemap)| {
            if pattern & (1u64 << i) != 0 {
                plane.insert(id);
            } else {
                plane.remove(id);
            }
        };
        if self.config.fan_out_planes(self.planes.len()) {
            self.planes.par_iter_mut().enumerate().for_each(update);
        } else {
            self.planes.iter_mut().enumerate().for_each(update);
        }

        // Only after every plane holds the new pattern.
        self.existence.insert(id);
    }

    /// Returns the value of `id`, or `None` when it holds no value.
    pub fn get_value(&self, id: u64) -> Option<i64> {
        if !self.existence.contains(id) {
            return None;
        }
        Some(self.decode(id) as i64)
    }

    /// Reads the bit pattern of `id` from the planes without consulting the
    /// existence set.
    #[inline]
    pub(crate) fn decode(&self, id: u64) -> u64 {
        self.planes
            .iter()
            .enumerate()
            .filter(|(_, plane)| plane.contains(id))
            .fold(0u64, |value, (i, _)| value | (1u64 << i))
    }

    /// Appends empty planes until there are at least `plane_count`.
    pub(crate) fn ensure_planes(&mut self, plane_count: usize) {
        let plane_count = plane_count.min(MAX_PLANES);
        if self.planes.len() < plane_count {
            self.planes.resize_with(plane_count, RoaringTreemap::new);
        }
    }

    /// Total size of the serialized existence set and planes, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.existence.serialized_size()
            + self
                .planes
                .iter()
                .map(|plane| plane.serialized_size())
                .sum::<usize>()
    }
}

impl Default for Bsi {
    fn default() -> Self {
        Bsi::new_default()
    }
}

/// Two indexes are equal when their bounds, existence sets and planes match.
/// Execution parameters are not compared.
impl PartialEq for Bsi {
    fn eq(&self, other: &Self) -> bool {
        self.max_value == other.max_value
            && self.min_value == other.min_value
            && self.existence == other.existence
            && self.planes == other.planes
    }
}

impl Eq for Bsi {}
