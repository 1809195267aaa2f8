//! Binary layout of a [`Bsi`].
//!
//! The buffer form is an ordered list of opaque byte buffers: buffer 0 holds
//! the existence set, buffers `1..=N` hold planes `0..N`, least significant
//! first. Every buffer is a bitmap in the roaring 64-bit (treemap) format.
//!
//! The stream form frames the same buffers:
//!
//! ```text
//! u32   magic/version
//! i64   max_value
//! i64   min_value
//! u32   buffer count (N + 1)
//! N+1 × { u64 length, length bytes }
//! ```
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use bsi_common::{Result, error::Error, verify_data};
use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use log::debug;
use roaring::RoaringTreemap;

use crate::{
    Bsi,
    bsi::{MAX_PLANES, bit_len},
    config::BsiConfig,
    scratch::ScratchPool,
};

impl Bsi {
    pub const BSI_FORMAT_MAGIC_VERSION: u32 = 0x4253_4901;

    /// Encodes the existence set followed by every plane.
    pub fn marshal_binary(&self) -> Result<Vec<Vec<u8>>> {
        let mut buffers = Vec::with_capacity(self.planes.len() + 1);
        buffers.push(encode_bitmap(&self.existence, "existence")?);
        for (i, plane) in self.planes.iter().enumerate() {
            buffers.push(encode_bitmap(plane, &format!("plane {i}"))?);
        }
        debug!(
            "marshal_binary: {} planes, {} ids",
            self.planes.len(),
            self.existence.len()
        );
        Ok(buffers)
    }

    /// Restores the existence set and planes from `buffers`, the inverse of
    /// [`marshal_binary`](Bsi::marshal_binary).
    ///
    /// An empty (or missing) first buffer yields an empty existence set; an
    /// empty plane buffer yields an empty plane. The index grows to
    /// `buffers.len() - 1` planes and never shrinks; planes beyond the
    /// supplied ones are cleared.
    ///
    /// On error the index is left in an unspecified state and should be
    /// discarded.
    pub fn unmarshal_binary<B: AsRef<[u8]>>(&mut self, buffers: &[B]) -> Result<()> {
        verify_data!(buffers, buffers.len() <= MAX_PLANES + 1);
        let Some((existence, planes)) = buffers.split_first() else {
            self.existence = RoaringTreemap::new();
            self.planes.iter_mut().for_each(RoaringTreemap::clear);
            return Ok(());
        };

        self.ensure_planes(planes.len());
        for (i, buffer) in planes.iter().enumerate() {
            self.planes[i] = decode_bitmap(buffer.as_ref(), &format!("plane {i}"))?;
        }
        self.planes[planes.len()..]
            .iter_mut()
            .for_each(RoaringTreemap::clear);
        self.existence = decode_bitmap(existence.as_ref(), "existence")?;
        debug!(
            "unmarshal_binary: {} planes, {} ids",
            self.planes.len(),
            self.existence.len()
        );
        Ok(())
    }

    /// Writes the framed stream form, returning the number of bytes written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<usize> {
        let stream_err = |e| Error::io("bsi stream", e);
        w.write_u32::<LE>(Self::BSI_FORMAT_MAGIC_VERSION)
            .map_err(stream_err)?;
        w.write_i64::<LE>(self.max_value).map_err(stream_err)?;
        w.write_i64::<LE>(self.min_value).map_err(stream_err)?;
        w.write_u32::<LE>((self.planes.len() + 1) as u32)
            .map_err(stream_err)?;
        let mut written = 4 + 8 + 8 + 4;

        let pool = ScratchPool::new();
        for bitmap in std::iter::once(&self.existence).chain(self.planes.iter()) {
            let mut scratch = pool.get_buffer(bitmap.serialized_size());
            bitmap
                .serialize_into(&mut *scratch)
                .map_err(|e| Error::io("bitmap", e))?;
            w.write_u64::<LE>(scratch.len() as u64)
                .map_err(stream_err)?;
            w.write_all(&scratch).map_err(stream_err)?;
            written += 8 + scratch.len();
        }
        debug!("write_to: {written} bytes, {} planes", self.planes.len());
        Ok(written)
    }

    /// Reads an index written by [`write_to`](Bsi::write_to). The result
    /// carries the default configuration.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Bsi> {
        let stream_err = |e| Error::bitmap_codec("bsi stream", e);
        let magic = r.read_u32::<LE>().map_err(stream_err)?;
        verify_data!(magic, magic == Self::BSI_FORMAT_MAGIC_VERSION);
        let max_value = r.read_i64::<LE>().map_err(stream_err)?;
        let min_value = r.read_i64::<LE>().map_err(stream_err)?;
        let buffer_count = r.read_u32::<LE>().map_err(stream_err)? as usize;
        verify_data!(
            buffer_count,
            buffer_count >= 1 && buffer_count <= MAX_PLANES + 1
        );

        let pool = ScratchPool::new();
        let mut bitmaps = Vec::with_capacity(buffer_count);
        for index in 0..buffer_count {
            let len = r.read_u64::<LE>().map_err(stream_err)?;
            let mut scratch = pool.get_buffer(len.min(1 << 20) as usize);
            let read = r
                .by_ref()
                .take(len)
                .read_to_end(&mut scratch)
                .map_err(stream_err)?;
            verify_data!(frame_length, read as u64 == len);
            bitmaps.push(decode_bitmap(&scratch, &format!("frame {index}"))?);
        }

        let mut bitmaps = bitmaps.into_iter();
        let existence = bitmaps.next().unwrap_or_default();
        let mut bsi = Bsi {
            max_value,
            min_value,
            planes: bitmaps.collect(),
            existence,
            config: BsiConfig::default(),
        };
        let declared_width = bit_len(max_value.unsigned_abs().max(min_value.unsigned_abs()));
        bsi.ensure_planes(declared_width);
        debug!(
            "read_from: {} planes, {} ids",
            bsi.planes.len(),
            bsi.existence.len()
        );
        Ok(bsi)
    }
}

fn encode_bitmap(bitmap: &RoaringTreemap, element: &str) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(bitmap.serialized_size());
    bitmap
        .serialize_into(&mut buffer)
        .map_err(|e| Error::io(element, e))?;
    Ok(buffer)
}

fn decode_bitmap(bytes: &[u8], element: &str) -> Result<RoaringTreemap> {
    if bytes.is_empty() {
        return Ok(RoaringTreemap::new());
    }
    RoaringTreemap::deserialize_from(bytes).map_err(|e| Error::bitmap_codec(element, e))
}

