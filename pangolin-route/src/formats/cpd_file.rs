//! The `.cpd` file format.
//!
//! Layout (little-endian, fixed widths):
//!
//! | field              | type           |
//! |--------------------|----------------|
//! | magic              | 4 bytes `CPD1` |
//! | version            | u32            |
//! | num_vertices       | u32            |
//! | to_new             | u32 × n        |
//! | to_old             | u32 × n        |
//! | num_runs           | u64            |
//! | row_begin          | u64 × (n+1)    |
//! | runs               | (u32, u8) × R  |
//! | trailer_checksum   | u64            |
//!
//! The trailer is a CRC-64 over every preceding byte; a mismatch fails the
//! load before any structure is interpreted.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use pangolin_common::{Error, Result};

use super::crc;
use crate::cpd::row::Run;
use crate::cpd::Cpd;
use crate::order::NodeOrder;

const MAGIC: [u8; 4] = *b"CPD1";
const VERSION: u32 = 1;

struct CountingWriter<W: Write> {
    writer: W,
    digest: crc::Digest,
}

impl<W: Write> CountingWriter<W> {
    fn new(writer: W) -> Self {
        CountingWriter { writer, digest: crc::Digest::new() }
    }

    fn put(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(bytes)?;
        self.digest.update(bytes);
        Ok(())
    }
}

fn write_body<W: Write>(out: &mut CountingWriter<W>, cpd: &Cpd) -> std::io::Result<()> {
    out.put(&MAGIC)?;
    out.put(&VERSION.to_le_bytes())?;
    out.put(&(cpd.num_rows() as u32).to_le_bytes())?;
    for &v in cpd.order().to_new_slice() {
        out.put(&v.to_le_bytes())?;
    }
    for &v in cpd.order().to_old_slice() {
        out.put(&v.to_le_bytes())?;
    }
    out.put(&(cpd.num_runs() as u64).to_le_bytes())?;
    for &offset in cpd.row_begin() {
        out.put(&offset.to_le_bytes())?;
    }
    for run in cpd.runs() {
        out.put(&run.start.to_le_bytes())?;
        out.put(&[run.symbol])?;
    }
    Ok(())
}

/// Write a CPD to `path`.
pub fn write<P: AsRef<Path>>(path: P, cpd: &Cpd) -> Result<()> {
    let path = path.as_ref();
    let io_err = |e: std::io::Error| Error::Io(format!("{}: {}", path.display(), e));

    let file = File::create(path).map_err(io_err)?;
    let mut out = CountingWriter::new(BufWriter::new(file));
    write_body(&mut out, cpd).map_err(io_err)?;

    let trailer = out.digest.finalize();
    out.writer.write_all(&trailer.to_le_bytes()).map_err(io_err)?;
    out.writer.flush().map_err(io_err)?;
    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::Io("cpd file truncated".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

/// Load a CPD from `path`, verifying the trailer checksum and the
/// structural invariants of the ordering and the offset table.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Cpd> {
    let path = path.as_ref();
    let buf = std::fs::read(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;

    if buf.len() < MAGIC.len() + 8 + 8 {
        return Err(Error::Io(format!("{}: too short for a cpd file", path.display())));
    }

    let body = &buf[..buf.len() - 8];
    let stored = u64::from_le_bytes(buf[buf.len() - 8..].try_into().unwrap());
    if crc::checksum(body) != stored {
        return Err(Error::Io(format!("{}: checksum mismatch", path.display())));
    }

    let mut cur = Cursor { buf: body, pos: 0 };
    if cur.take(4)? != MAGIC {
        return Err(Error::Io(format!("{}: not a cpd file", path.display())));
    }
    let version = cur.u32()?;
    if version != VERSION {
        return Err(Error::Io(format!(
            "{}: unsupported cpd version {}",
            path.display(),
            version
        )));
    }

    let n = cur.u32()? as usize;
    let mut to_new = Vec::with_capacity(n);
    for _ in 0..n {
        to_new.push(cur.u32()?);
    }
    let mut to_old = Vec::with_capacity(n);
    for _ in 0..n {
        to_old.push(cur.u32()?);
    }

    let num_runs = cur.u64()? as usize;
    let mut row_begin = Vec::with_capacity(n + 1);
    for _ in 0..=n {
        row_begin.push(cur.u64()?);
    }
    let mut runs = Vec::with_capacity(num_runs);
    for _ in 0..num_runs {
        let start = cur.u32()?;
        let symbol = cur.u8()?;
        runs.push(Run { start, symbol });
    }
    if cur.pos != body.len() {
        return Err(Error::Io(format!("{}: trailing bytes after runs", path.display())));
    }

    let order = NodeOrder::from_parts(to_new, to_old)?;
    Cpd::from_parts(order, row_begin, runs)
}
