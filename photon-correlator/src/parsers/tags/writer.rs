use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use num_traits::ToPrimitive;

use crate::errors::Error;
use crate::parsers::tags::{RecordFormat, MAGIC};
use crate::TimeTag;

const COMPACT_WRAPAROUND: u64 = 1 << 30;
const COMPACT_OVERFLOW: u32 = 0b11 << 30;
const WIDE_MAX_TICKS: u64 = (1 << 62) - 1;

/// Write `tags` to a tag file.
///
/// Timestamps are rounded to the nearest multiple of `resolution_ps`. In the
/// `Compact32` format overflow records are inserted whenever the time wraps.
pub fn write_tag_file<P: AsRef<Path>>(
    path: P,
    format: RecordFormat,
    resolution_ps: f64,
    tags: &[TimeTag],
) -> Result<(), Error> {
    if !(resolution_ps.is_finite() && resolution_ps > 0.0) {
        return Err(Error::InvalidHeader(format!(
            "Invalid time resolution {} ps",
            resolution_ps
        )));
    }
    let ticks = |t: &TimeTag| (t.timestamp_ps as f64 / resolution_ps).round() as u64;

    let mut out = BufWriter::new(std::fs::File::create(path)?);
    match format {
        RecordFormat::Compact32 => {
            let mut records: Vec<u32> = Vec::with_capacity(tags.len());
            let mut base = 0;
            for tag in tags {
                let t = ticks(tag);
                if t < base {
                    return Err(Error::InvalidHeader(String::from(
                        "Compact32 records need non-decreasing timestamps",
                    )));
                }
                while t - base >= COMPACT_WRAPAROUND {
                    records.push(COMPACT_OVERFLOW);
                    base += COMPACT_WRAPAROUND;
                }
                records.push(((tag.channel as u32) << 30) | ((t - base) as u32));
            }
            write_header(&mut out, format, resolution_ps, records.len() as u64)?;
            for r in records {
                out.write_u32::<LittleEndian>(r)?;
            }
        }
        RecordFormat::Wide64 => {
            write_header(&mut out, format, resolution_ps, tags.len() as u64)?;
            for tag in tags {
                let t = ticks(tag);
                if t > WIDE_MAX_TICKS {
                    return Err(Error::InvalidHeader(format!(
                        "Timestamp {} ps does not fit a Wide64 record",
                        tag.timestamp_ps
                    )));
                }
                out.write_u64::<LittleEndian>(((tag.channel as u64) << 62) | t)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn write_header<W: Write>(
    out: &mut W,
    format: RecordFormat,
    resolution_ps: f64,
    num_records: u64,
) -> Result<(), Error> {
    let code = format
        .to_u32()
        .ok_or_else(|| Error::InvalidHeader(String::from("Unencodable record format")))?;
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(code)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_f64::<LittleEndian>(resolution_ps)?;
    out.write_u64::<LittleEndian>(num_records)?;
    Ok(())
}
