use std::io::{BufReader, Read};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use crate::errors::Error;
use crate::parsers::tags::{RecordFormat, MAGIC};

/// Fixed size header at the start of every tag file.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TagHeader {
    pub format: RecordFormat,
    /// Duration of one time unit of the records in picoseconds.
    pub resolution_ps: f64,
    /// Number of raw records, overflow and marker records included.
    pub num_records: u64,
}

pub(in super) fn read_tag_header(filename: &PathBuf) -> Result<TagHeader, Error> {
    let mut buffered = BufReader::new(std::fs::File::open(filename)?);
    parse_tag_header(&mut buffered)
}

pub(in super) fn parse_tag_header<R: Read>(source: &mut R) -> Result<TagHeader, Error> {
    let mut magic_buffer: [u8; 8] = [0; 8];
    source.read_exact(&mut magic_buffer)?;
    if &magic_buffer != MAGIC {
        return Err(Error::InvalidHeader(String::from("Not a tag file, bad magic number")));
    }

    let format_code = source.read_u32::<LittleEndian>()?;
    let _reserved = source.read_u32::<LittleEndian>()?;
    let resolution_ps = source.read_f64::<LittleEndian>()?;
    let num_records = source.read_u64::<LittleEndian>()?;

    let format = FromPrimitive::from_u32(format_code)
        .ok_or_else(|| Error::InvalidHeader(format!("Invalid record format {:#x}", format_code)))?;
    if !(resolution_ps.is_finite() && resolution_ps > 0.0) {
        return Err(Error::InvalidHeader(format!(
            "Invalid time resolution {} ps",
            resolution_ps
        )));
    }

    Ok(TagHeader {
        format,
        resolution_ps,
        num_records,
    })
}
