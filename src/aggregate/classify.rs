//! # Classify
//!
//! Decides which registers the fields of a small aggregate occupy
//!
//! Call contexts always keep a stack copy of every struct argument; the classifiers here add the
//! register half of the ABI rule for aggregates of at most [`MAX_UNROLL_SIZE`] bytes.

use log::trace;

use super::{ScalarClass, StructLayout};
use crate::vm::registers::{RegisterData, SLOT_SIZE};

/// Largest aggregate that is offered to a classifier at all
pub const MAX_UNROLL_SIZE: usize = 64;

/// Largest aggregate System V ever passes in registers
const SYSV_MAX_REGISTER_AGGREGATE: usize = 16;

/// Maps the fields of an aggregate onto free argument registers
///
/// Implementations may consume any number of free slots from `regs`, or none at all. They never
/// touch the stack buffer.
pub trait StructClassifier: Sync {
    /// Offers `data`, laid out as `layout`, to the register file
    fn classify(&self, regs: &mut RegisterData, layout: &StructLayout, data: &[u8]);
}

/// Class of one eightbyte of a System V aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EightbyteClass {
    /// Only padding
    NoClass,
    /// Only floating-point fields
    Sse,
    /// At least one integer or pointer field
    Integer,
}

impl EightbyteClass {
    /// Merges the class of another field into this eightbyte
    fn merge(self, field: ScalarClass) -> Self {
        match (self, field) {
            (Self::Integer, _) | (_, ScalarClass::Integer) => Self::Integer,
            _ => Self::Sse,
        }
    }
}

/// System V AMD64 aggregate classification
#[derive(Debug, Default)]
pub struct SysVClassifier;

impl StructClassifier for SysVClassifier {
    fn classify(&self, regs: &mut RegisterData, layout: &StructLayout, data: &[u8]) {
        let size = layout.size();
        if size == 0 || size > SYSV_MAX_REGISTER_AGGREGATE {
            trace!("{size} byte aggregate is class MEMORY");
            return;
        }

        let mut classes = [EightbyteClass::NoClass; 2];
        let mut aligned = true;
        layout.for_each_scalar(&mut |offset, ty| {
            if offset % ty.align() != 0 {
                aligned = false;
                return;
            }
            let class = &mut classes[offset / SLOT_SIZE];
            *class = class.merge(ty.class());
        });
        if !aligned {
            trace!("aggregate with unaligned fields is class MEMORY");
            return;
        }

        let eightbytes = &classes[..(size + SLOT_SIZE - 1) / SLOT_SIZE];
        let sse = eightbytes
            .iter()
            .filter(|&&class| class == EightbyteClass::Sse)
            .count();
        let ints = eightbytes.len() - sse;

        // the whole aggregate goes to registers or none of it does
        if ints > regs.int_remaining() || sse > regs.float_remaining() {
            trace!("not enough registers left for aggregate ({ints} integer, {sse} sse)");
            return;
        }

        for (chunk, class) in data[..size].chunks(SLOT_SIZE).zip(eightbytes) {
            let word = read_word(chunk);
            match class {
                EightbyteClass::Sse => regs.push_float(word),
                _ => regs.push_int(word),
            };
        }
        trace!("aggregate unrolled into {ints} integer and {sse} sse registers");
    }
}

/// Microsoft x64 aggregate classification
///
/// Aggregates of exactly 1, 2, 4 or 8 bytes travel in the next positional slot as if they were integers.
#[derive(Debug, Default)]
pub struct Win64Classifier;

impl StructClassifier for Win64Classifier {
    fn classify(&self, regs: &mut RegisterData, layout: &StructLayout, data: &[u8]) {
        let size = layout.size();
        if !matches!(size, 1 | 2 | 4 | 8) {
            trace!("{size} byte aggregate is passed by memory");
            return;
        }
        if regs.push_int(read_word(&data[..size])) {
            trace!("{size} byte aggregate passed in a register");
        }
    }
}

/// Reads up to eight little-endian bytes, zero-extending the rest
fn read_word(bytes: &[u8]) -> u64 {
    let mut word = [0u8; SLOT_SIZE];
    word[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(word)
}
