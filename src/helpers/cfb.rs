//! OLE Compound File Binary (CFB) reader.
//! Legacy `.xls` workbooks keep their BIFF8 stream inside this container, and
//! password-protected `.xlsx` files are wrapped in one as well.

use crate::error::ClippingsError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector ids from here on are markers (free, end of chain, FAT, DIFAT).
const MAX_REG_SECT: usize = 0xFFFFFFFB;

/// Streams smaller than this live in the mini stream.
const MINI_STREAM_CUTOFF: usize = 4096;

const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Sector chain starting at '{0}' is broken")]
    SectorChainError(usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// In-memory view of a compound file: its directory plus both allocation tables.
pub(crate) struct Cfb {
    directories: HashMap<String, Directory>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads the whole container and resolves its directory.
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, ClippingsError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 512 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data: Vec<u8> = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..512])?;
        let size = header.sector_size()?;
        let sectors = Sectors { data, size, offset: size };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_start)?;
        let mini_file_allocation_table = if header.mini_fat_count > 0 {
            let bytes = Self::read_chain(&file_allocation_table, &sectors, header.mini_fat_start)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => {
                let mut data = Self::read_chain(&file_allocation_table, &sectors, root.start)?;
                data.truncate(root.size);
                Sectors { data, size: 64, offset: 0 }
            }
            None => Sectors { data: Vec::new(), size: 64, offset: 0 },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Returns the content of the named stream, or `None` when it does not exist.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, ClippingsError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.size < MINI_STREAM_CUTOFF {
            Self::read_chain(&self.mini_file_allocation_table, &self.mini_sectors, directory.start)?
        } else {
            Self::read_chain(&self.file_allocation_table, &self.sectors, directory.start)?
        };
        bytes.truncate(directory.size);
        Ok(Some(bytes))
    }

    /// Builds the FAT from the 109 header DIFAT slots plus any chained DIFAT sectors.
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, ClippingsError> {
        let mut fat_sectors: Vec<usize> = to_usize_iter(&sectors.data[76..512]).collect();

        let mut index = header.difat_start;
        let mut visited = 0usize;
        while index < MAX_REG_SECT {
            if visited > header.difat_count {
                Err(CfbError::SectorChainError(header.difat_start))?
            }
            let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
            fat_sectors.extend(to_usize_iter(sector));
            // Last slot of every DIFAT sector links to the next one
            index = fat_sectors.pop().ok_or(CfbError::FileFormatError)?;
            visited += 1;
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        for index in fat_sectors.into_iter().filter(|index| *index < MAX_REG_SECT) {
            let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
            file_allocation_table.extend(to_usize_iter(sector));
        }
        if file_allocation_table.is_empty() {
            Err(CfbError::FileFormatError)?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<HashMap<String, Directory>, ClippingsError> {
        let bytes = Self::read_chain(file_allocation_table, sectors, start)?;
        let directories: HashMap<String, Directory> = bytes.chunks_exact(128).map(Directory::new).collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Follows an allocation chain and concatenates its sectors.
    fn read_chain(allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, ClippingsError> {
        let mut content: Vec<u8> = Vec::new();
        let mut index = start;
        let mut steps = 0usize;
        while index < MAX_REG_SECT {
            // A chain can never be longer than the table itself
            if steps > allocation_table.len() {
                Err(CfbError::SectorChainError(start))?
            }
            content.extend(sectors.get(index).ok_or(CfbError::SectorChainError(start))?);
            index = *allocation_table.get(index).ok_or(CfbError::SectorChainError(start))?;
            steps += 1;
        }
        Ok(content)
    }
}

#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    size: usize,
    /// Bytes before sector 0: the header for regular sectors, nothing for the mini stream
    offset: usize,
}

impl Sectors {
    fn get(&self, index: usize) -> Option<&[u8]> {
        let source = self.offset + index * self.size;
        let target = self.data.len().min(source + self.size);
        (source < target).then(|| &self.data[source..target])
    }
}

#[derive(Debug)]
struct Header {
    major_version: u16,
    sector_shift: u16,
    directory_start: usize,
    mini_fat_start: usize,
    mini_fat_count: usize,
    difat_start: usize,
    difat_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, ClippingsError> {
        if to_u64(&data[0..8]) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            directory_start: to_usize(&data[48..52]),
            mini_fat_start: to_usize(&data[60..64]),
            mini_fat_count: to_usize(&data[64..68]),
            difat_start: to_usize(&data[68..72]),
            difat_count: to_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, ClippingsError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the 512 byte header up to a full 4096 byte sector
            (4, 0x000C) => Ok(4096),
            _ => Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?,
        }
    }
}

#[derive(Debug)]
struct Directory {
    start: usize,
    size: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let length = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..length]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };
        let start = to_usize(&bytes[116..120]);
        let size = to_u64(&bytes[120..128]) as usize;
        (name, Directory { start, size })
    }
}
