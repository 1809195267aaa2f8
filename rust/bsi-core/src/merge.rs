//! Bulk mutation: union merge, elementwise addition, increments, removal and
//! filtering.

use log::debug;
use rayon::prelude::*;
use roaring::RoaringTreemap;

use crate::{Bsi, bsi::MAX_PLANES};

impl Bsi {
    /// Merges `bsis` into this index by union.
    ///
    /// The index first grows to the widest operand, then every plane and the
    /// existence set become the union of the corresponding sets of all
    /// operands. Identifier domains are expected to be disjoint: an identifier
    /// present in several operands ends up with the bitwise OR of its patterns,
    /// not with any one of them.
    ///
    /// `parallelism == 1` keeps the merge on the calling thread.
    pub fn par_or(&mut self, parallelism: usize, bsis: &[&Bsi]) {
        let width = bsis
            .iter()
            .map(|bsi| bsi.bit_count())
            .fold(self.bit_count(), usize::max);
        self.ensure_planes(width);
        debug!(
            "par_or: merging {} indexes into {} planes",
            bsis.len(),
            self.planes.len()
        );

        let fan_out = parallelism != 1 && self.config.fan_out_planes(self.planes.len());
        let Bsi {
            planes, existence, ..
        } = self;

        let mut merge_planes = || {
            let merge = |(i, plane): (usize, &mut RoaringTreemap)| {
                for source in bsis.iter().filter_map(|bsi| bsi.planes.get(i)) {
                    *plane |= source;
                }
            };
            if fan_out {
                planes.par_iter_mut().enumerate().for_each(merge);
            } else {
                planes.iter_mut().enumerate().for_each(merge);
            }
        };
        let mut merge_existence = || {
            for bsi in bsis {
                *existence |= &bsi.existence;
            }
        };

        if fan_out {
            rayon::join(merge_planes, merge_existence);
        } else {
            merge_planes();
            merge_existence();
        }
    }

    /// Adds the values of `other` to this index, identifier by identifier.
    ///
    /// Identifiers present only in `other` take its value. The width grows to
    /// that of `other`, plus one plane when the carry overflows, up to 64
    /// planes; a carry out of plane 63 is dropped (wrapping addition).
    pub fn add(&mut self, other: &Bsi) {
        debug!(
            "add: {} planes into {} planes",
            other.bit_count(),
            self.bit_count()
        );
        self.existence |= &other.existence;
        self.ensure_planes(other.bit_count());
        for (i, digit) in other.planes.iter().enumerate() {
            self.add_digit(digit, i);
        }
    }

    /// Adds 1 to the value of every identifier of `found_set`.
    ///
    /// Identifiers without a value count from zero and thus end up holding 1.
    pub fn increment(&mut self, found_set: &RoaringTreemap) {
        self.add_digit(found_set, 0);
        self.existence |= found_set;
    }

    /// Adds 1 to every stored value.
    pub fn increment_all(&mut self) {
        let existence = self.existence.clone();
        self.add_digit(&existence, 0);
    }

    /// Single-identifier [`increment`](Bsi::increment).
    pub(crate) fn increment_id(&mut self, id: u64) {
        for i in 0..MAX_PLANES {
            self.ensure_planes(i + 1);
            // A set bit absorbs the carry and passes it on; a clear bit ends it.
            if !self.planes[i].remove(id) {
                self.planes[i].insert(id);
                break;
            }
        }
        self.existence.insert(id);
    }

    /// Adds the single-bit addend `digit` (one bit per identifier) at plane
    /// `position`, rippling the carry towards the most significant plane.
    fn add_digit(&mut self, digit: &RoaringTreemap, position: usize) {
        let mut carry = self.add_bits(digit, position);
        let mut position = position + 1;
        while !carry.is_empty() && position < MAX_PLANES {
            carry = self.add_bits(&carry, position);
            position += 1;
        }
    }

    /// Half adder over one plane; returns the carry.
    fn add_bits(&mut self, bits: &RoaringTreemap, position: usize) -> RoaringTreemap {
        if bits.is_empty() || position >= MAX_PLANES {
            return RoaringTreemap::new();
        }
        self.ensure_planes(position + 1);
        let plane = &mut self.planes[position];
        let carry = &*plane & bits;
        *plane ^= bits;
        carry
    }

    /// Removes the identifiers of `found_set` from the existence set and from
    /// every plane.
    pub fn clear_values(&mut self, found_set: &RoaringTreemap) {
        debug!("clear_values: {} ids", found_set.len());
        let fan_out = self.config.fan_out_planes(self.planes.len());
        let Bsi {
            planes, existence, ..
        } = self;
        if fan_out {
            rayon::join(
                || *existence -= found_set,
                || {
                    planes
                        .par_iter_mut()
                        .for_each(|plane| *plane -= found_set)
                },
            );
        } else {
            *existence -= found_set;
            planes.iter_mut().for_each(|plane| *plane -= found_set);
        }
    }

    /// Returns a new index holding only the identifiers of `found_set`.
    ///
    /// The new index keeps the bounds and configuration of this one, which is
    /// left untouched.
    pub fn new_bsi_retain_set(&self, found_set: &RoaringTreemap) -> Bsi {
        let retain = |plane: &RoaringTreemap| plane & found_set;
        let (existence, planes) = if self.config.fan_out_planes(self.planes.len()) {
            rayon::join(
                || retain(&self.existence),
                || self.planes.par_iter().map(retain).collect::<Vec<_>>(),
            )
        } else {
            (
                retain(&self.existence),
                self.planes.iter().map(retain).collect::<Vec<_>>(),
            )
        };
        Bsi {
            max_value: self.max_value,
            min_value: self.min_value,
            planes,
            existence,
            config: self.config.clone(),
        }
    }
}
