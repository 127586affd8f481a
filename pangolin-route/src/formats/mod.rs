//! On-disk binary formats. Little-endian, fixed widths, CRC-64 trailer.

pub mod cpd_file;
pub mod crc;
