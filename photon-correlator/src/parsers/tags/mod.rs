pub mod header;
pub mod streamers;
pub mod writer;

use std::path::PathBuf;

use crate::errors::Error;
use crate::TimeTag;

pub use header::TagHeader;

pub(crate) const MAGIC: &[u8; 8] = b"PHCTAGS\0";
pub(crate) const HEADER_SIZE: u64 = 32;

/// Record layouts a tag file can hold.
///
/// - `Compact32`: bits 31..30 channel, bits 29..0 time in resolution units.
///   Channel 3 with a zero time is an overflow record worth 2^30 units, any
///   other channel 3 record is a marker.
/// - `Wide64`: bits 63..62 channel, bits 61..0 time in resolution units.
///   Channel 3 records are markers.
#[derive(FromPrimitive, ToPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordFormat {
    Compact32 = 0x0001_0020,
    Wide64 = 0x0001_0040,
}

/// A binary file of recorded time tags.
pub struct TagFile {
    pub path: PathBuf,
    pub header: TagHeader,
}

impl TagFile {
    /// Open a tag file and read its header.
    ///
    /// If the file does not exist a FileNotAvailable error will be returned.
    pub fn new(filename: PathBuf) -> Result<Self, Error> {
        if filename.exists() {
            let header = self::header::read_tag_header(&filename)?;
            Ok(Self {
                path: filename,
                header,
            })
        } else {
            let filename_string = filename.display().to_string();
            Err(Error::FileNotAvailable(filename_string))
        }
    }

    /// Stream of the clicks stored in the file, in file order.
    pub fn clicks(&self) -> Result<Box<dyn Iterator<Item = TimeTag> + Send>, Error> {
        Ok(match self.header.format {
            RecordFormat::Compact32 => Box::new(streamers::Compact32Stream::new(self)?),
            RecordFormat::Wide64 => Box::new(streamers::Wide64Stream::new(self)?),
        })
    }
}

impl std::fmt::Display for TagFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{:<20}: {}", "Path", self.path.display())?;
        writeln!(f, "{:<20}: {:?}", "Record format", self.header.format)?;
        writeln!(f, "{:<20}: {} ps", "Resolution", self.header.resolution_ps)?;
        write!(f, "{:<20}: {}", "Records", self.header.num_records)
    }
}
