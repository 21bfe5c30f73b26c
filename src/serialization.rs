//! Wire-format codec. The bit-exact little-endian layout for a run
//! container — `u16 nbrruns` then `nbrruns` `(value, length)` pairs, all
//! little-endian — is the one piece of external interface this crate owns;
//! everything above it (a container-type discriminator, a key-to-container
//! index) belongs to a higher-level façade, out of scope here.
//!
//! [`Container::serialize`]/[`Container::deserialize`] add a single leading
//! discriminator byte so this crate's own containers round-trip standalone;
//! a façade embedding many containers under one 32-bit key space would strip
//! that byte out and own the discriminator itself.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::array_store::ArrayContainer;
use crate::bitmap_store::BitmapContainer;
use crate::container::Container;
use crate::error::{Result, RoaringCoreError};
use crate::run_store::RunContainer;
use crate::util::BITMAP_LENGTH;

const TAG_ARRAY: u8 = 0;
const TAG_BITMAP: u8 = 1;
const TAG_RUN: u8 = 2;

fn truncated(_: std::io::Error) -> RoaringCoreError {
    RoaringCoreError::CorruptContainer("buffer truncated")
}

/// `u16 nbrruns` followed by `nbrruns` little-endian `(value, length)` pairs.
pub fn serialize_run(container: &RunContainer) -> Vec<u8> {
    let mut out = Vec::with_capacity(container.byte_size());
    out.write_u16::<LittleEndian>(container.nbrruns() as u16).unwrap();
    for i in 0..container.nbrruns() {
        out.write_u16::<LittleEndian>(container.get_value(i)).unwrap();
        out.write_u16::<LittleEndian>(container.get_length(i)).unwrap();
    }
    out
}

pub fn deserialize_run(bytes: &[u8]) -> Result<RunContainer> {
    let mut cursor = Cursor::new(bytes);
    let nbrruns = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;
    let expected_len = 2 + 4 * nbrruns;
    if bytes.len() != expected_len {
        return Err(RoaringCoreError::CorruptContainer("run body length mismatch"));
    }
    let mut runs = Vec::with_capacity(nbrruns);
    for _ in 0..nbrruns {
        let value = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let length = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        if value as u32 + length as u32 > 0xFFFF {
            return Err(RoaringCoreError::CorruptContainer("run extends past 0xFFFF"));
        }
        if let Some(&(prev_value, prev_length)) = runs.last() {
            let prev_end = prev_value as u32 + prev_length as u32;
            if value as u32 <= prev_end + 1 {
                return Err(RoaringCoreError::CorruptContainer("runs not strictly sorted and non-adjacent"));
            }
        }
        runs.push((value, length));
    }
    tracing::debug!(nbrruns, "deserialize: run container");
    Ok(RunContainer::from_runs_unchecked(&runs))
}

fn serialize_bitmap(container: &BitmapContainer) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 * BITMAP_LENGTH);
    for &word in container.words() {
        out.write_u64::<LittleEndian>(word).unwrap();
    }
    out
}

fn deserialize_bitmap(bytes: &[u8]) -> Result<BitmapContainer> {
    if bytes.len() != 8 * BITMAP_LENGTH {
        return Err(RoaringCoreError::CorruptContainer("bitmap body length mismatch"));
    }
    let mut cursor = Cursor::new(bytes);
    let mut bits = Box::new([0u64; BITMAP_LENGTH]);
    for word in bits.iter_mut() {
        *word = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
    }
    let len = bits.iter().map(|w| w.count_ones() as u64).sum();
    Ok(BitmapContainer::from_raw(len, bits))
}

fn serialize_array(container: &ArrayContainer) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * container.as_slice().len());
    for &v in container.as_slice() {
        out.write_u16::<LittleEndian>(v).unwrap();
    }
    out
}

fn deserialize_array(bytes: &[u8]) -> Result<ArrayContainer> {
    if bytes.len() % 2 != 0 {
        return Err(RoaringCoreError::CorruptContainer("array body length is odd"));
    }
    let mut cursor = Cursor::new(bytes);
    let mut vec = Vec::with_capacity(bytes.len() / 2);
    for _ in 0..bytes.len() / 2 {
        vec.push(cursor.read_u16::<LittleEndian>().map_err(truncated)?);
    }
    if vec.windows(2).any(|w| w[0] >= w[1]) {
        return Err(RoaringCoreError::CorruptContainer("array elements not strictly increasing"));
    }
    Ok(ArrayContainer::from_vec_unchecked(vec))
}

impl Container {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.serialized_size_in_bytes());
        match self {
            Container::Array(c) => {
                out.push(TAG_ARRAY);
                out.extend(serialize_array(c));
            }
            Container::Bitmap(c) => {
                out.push(TAG_BITMAP);
                out.extend(serialize_bitmap(c));
            }
            Container::Run(c) => {
                out.push(TAG_RUN);
                out.extend(serialize_run(c));
            }
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Container> {
        let (&tag, body) =
            bytes.split_first().ok_or(RoaringCoreError::CorruptContainer("empty container buffer"))?;
        match tag {
            TAG_ARRAY => Ok(Container::Array(deserialize_array(body)?)),
            TAG_BITMAP => Ok(Container::Bitmap(deserialize_bitmap(body)?)),
            TAG_RUN => Ok(Container::Run(deserialize_run(body)?)),
            _ => Err(RoaringCoreError::CorruptContainer("unrecognized container tag")),
        }
    }

    /// Size in bytes of [`Container::serialize`]'s payload, discriminator
    /// byte not included. This is the wire size (`serializedSizeInBytes` in
    /// the façade contract), distinct from [`Container::get_size_in_bytes`]
    /// which reports the current encoding's in-memory footprint and
    /// [`Container::get_array_size_in_bytes`] which reports a hypothetical
    /// array encoding's size regardless of the current variant.
    pub fn serialized_size_in_bytes(&self) -> usize {
        match self {
            Container::Array(c) => c.byte_size(),
            Container::Bitmap(_) => 8 * BITMAP_LENGTH,
            Container::Run(c) => c.byte_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_serialize_matches_literal_bytes() {
        let c = RunContainer::from_runs_unchecked(&[(1, 2), (100, 0), (65530, 5)]);
        let bytes = serialize_run(&c);
        assert_eq!(
            bytes,
            vec![0x03, 0x00, 0x01, 0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0xFA, 0xFF, 0x05, 0x00]
        );
    }

    #[test]
    fn container_round_trip_all_variants() {
        let mut array = Container::new();
        array.add(1);
        array.add(5000);
        let bitmap = {
            let mut c = Container::new();
            c.iadd(0, 5000).unwrap();
            c
        };
        let run = Container::Run(RunContainer::from_runs_unchecked(&[(0, 99), (500, 10)]));

        for container in [array, bitmap, run] {
            let bytes = container.serialize();
            let back = Container::deserialize(&bytes).unwrap();
            assert_eq!(back.cardinality(), container.cardinality());
            for v in container.iter() {
                assert!(back.contains(v));
            }
        }
    }

    #[test]
    fn deserialize_rejects_truncated_run_header() {
        assert!(matches!(
            deserialize_run(&[0x01]),
            Err(RoaringCoreError::CorruptContainer(_))
        ));
    }

    #[test]
    fn deserialize_rejects_adjacent_runs_that_should_have_fused() {
        // nbrruns=2, runs (0,4) and (5,4): adjacent, should have been fused.
        let bytes = [0x02, 0x00, 0x00, 0x00, 0x04, 0x00, 0x05, 0x00, 0x04, 0x00];
        assert!(matches!(deserialize_run(&bytes), Err(RoaringCoreError::CorruptContainer(_))));
    }
}
