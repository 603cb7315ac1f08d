const BUFFER_SIZE: usize = 1024 * 16;

use std::io::{BufReader, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::warn;

use crate::errors::Error;
use crate::parsers::tags::{TagFile, HEADER_SIZE};
use crate::{Channel, TagStream, TimeTag};

use photon_correlator_proc_macros::make_tag_stream;

// - - - - - - - - - - - - //
// Compact32 Record Stream //
// - - - - - - - - - - - - //
#[make_tag_stream(Compact32, u32)]
fn parse_record(&mut self, record: Self::RecordSize) -> Option<TimeTag> {
    const WRAPAROUND: u64 = 1 << 30;

    let ch = (record >> 30) as i32;
    let tm = (record & 0x3FFF_FFFF) as u64;

    if ch == 0b11 {
        if tm == 0 {
            self.overflow_correction += WRAPAROUND;
        }
        // markers carry no click
        return None;
    }

    let ticks = self.overflow_correction + tm;
    Some(TimeTag {
        channel: Channel::from_raw(ch).ok()?,
        timestamp_ps: (ticks as f64 * self.time_resolution).round() as u64,
    })
}

// - - - - - - - - - - - //
// Wide64 Record Stream  //
// - - - - - - - - - - - //
#[make_tag_stream(Wide64, u64)]
fn parse_record(&mut self, record: Self::RecordSize) -> Option<TimeTag> {
    let ch = (record >> 62) as i32;
    let tm = record & 0x3FFF_FFFF_FFFF_FFFF;

    if ch == 0b11 {
        return None;
    }

    Some(TimeTag {
        channel: Channel::from_raw(ch).ok()?,
        timestamp_ps: ((self.overflow_correction + tm) as f64 * self.time_resolution).round() as u64,
    })
}
