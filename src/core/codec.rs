// Null-run compaction for dense, index-positioned records.
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

/// Dense record: position `i` holds the value of the field with index `i`.
pub type DenseRecord = Vec<Option<Value>>;

/// Compacted record: values interleaved with absence markers.
pub type CompactRecord = Vec<Slot>;

#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Value(Value),
    /// One absent position.
    Absent,
    /// `n >= 2` consecutive absent positions.
    AbsentRun(usize),
}

impl Slot {
    /// Number of dense positions this slot covers.
    pub fn width(&self) -> usize {
        match self {
            Slot::Value(_) | Slot::Absent => 1,
            Slot::AbsentRun(count) => *count,
        }
    }
}

fn flush_run(out: &mut CompactRecord, run: usize) {
    match run {
        0 => {}
        1 => out.push(Slot::Absent),
        count => out.push(Slot::AbsentRun(count)),
    }
}

/// Compact `dense`, collapsing absent runs. A trailing absent run is
/// dropped so the result does not depend on how wide the schema was.
pub fn encode(dense: &[Option<Value>]) -> CompactRecord {
    encode_owned(dense.to_vec())
}

/// Owned variant of [`encode`] that moves values instead of cloning them.
pub fn encode_owned(dense: DenseRecord) -> CompactRecord {
    let mut out = Vec::new();
    let mut run = 0usize;
    for item in dense {
        match item {
            Some(value) => {
                flush_run(&mut out, run);
                out.push(Slot::Value(value));
                run = 0;
            }
            None => run += 1,
        }
    }
    out
}

/// Expand `compact` into `output_len` positions; positions past the
/// encoded content stay absent.
pub fn decode(compact: &[Slot], output_len: usize) -> Result<DenseRecord, Error> {
    decode_owned(compact.to_vec(), output_len)
}

/// Owned variant of [`decode`]. Fails with `Corrupt` instead of writing
/// past `output_len`.
pub fn decode_owned(compact: CompactRecord, output_len: usize) -> Result<DenseRecord, Error> {
    let covered = covered_width(&compact);
    if covered > output_len {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "compacted record covers {covered} positions, output holds {output_len}"
        )));
    }
    Ok(expand(compact, output_len))
}

/// Number of dense positions `compact` spans, trailing absence excluded.
pub fn covered_width(compact: &[Slot]) -> usize {
    compact
        .iter()
        .fold(0usize, |width, slot| width.saturating_add(slot.width()))
}

/// Expand `compact` to at least `output_len` positions, growing past it
/// when the record covers more.
pub(crate) fn expand(compact: CompactRecord, output_len: usize) -> DenseRecord {
    let mut out = vec![None; output_len.max(covered_width(&compact))];
    let mut cursor = 0usize;
    for slot in compact {
        let width = slot.width();
        if let Slot::Value(value) = slot {
            out[cursor] = Some(value);
        }
        cursor += width;
    }
    out
}
