use crate::arch::Architecture;
use crate::header::Header;
use crate::{Error, Result};
use byteorder::{ByteOrder, LE};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// `MZ`
pub const IMAGE_DOS_SIGNATURE: u16 = 0x5a4d;
/// `PE\0\0`
pub const IMAGE_NT_SIGNATURE: u32 = 0x0000_4550;
pub const IMAGE_NT_OPTIONAL_HDR32_MAGIC: u16 = 0x010b;
pub const IMAGE_NT_OPTIONAL_HDR64_MAGIC: u16 = 0x020b;
pub const IMAGE_FILE_DLL: u16 = 0x2000;
pub const IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR: usize = 14;

const DOS_HEADER_SIZE: usize = 64;
const DOS_E_LFANEW: usize = 0x3c;

const PE_SIGNATURE_SIZE: usize = 4;
const FILE_HEADER_SIZE: usize = 20;
const FILE_HEADER_MACHINE: usize = 0;
const FILE_HEADER_CHARACTERISTICS: usize = 18;

const DATA_DIRECTORY_ENTRY_SIZE: usize = 8;

/// Bit width of the optional header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PeFormat {
    #[default]
    Unknown,
    #[serde(rename = "PE32")]
    Pe32,
    #[serde(rename = "PE32+")]
    Pe32Plus,
}

impl PeFormat {
    fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            IMAGE_NT_OPTIONAL_HDR32_MAGIC => Some(PeFormat::Pe32),
            IMAGE_NT_OPTIONAL_HDR64_MAGIC => Some(PeFormat::Pe32Plus),
            _ => None,
        }
    }

    fn layout(self) -> Option<&'static OptionalHeaderLayout> {
        match self {
            PeFormat::Pe32 => Some(&PE32_LAYOUT),
            PeFormat::Pe32Plus => Some(&PE32_PLUS_LAYOUT),
            PeFormat::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeFormat::Pe32 => "PE32",
            PeFormat::Pe32Plus => "PE32+",
            PeFormat::Unknown => "unknown",
        }
    }
}

/// Byte offsets of the optional header fields we read, relative to the
/// start of the optional header.
///
/// PE32 and PE32+ share everything up to `BaseOfCode`; PE32+ drops
/// `BaseOfData` and widens `ImageBase` and the four stack/heap size fields
/// to 64 bits, so the data directory array moves from 96 to 112.
struct OptionalHeaderLayout {
    size: usize,
    subsystem: usize,
    data_directories: usize,
}

/// `IMAGE_OPTIONAL_HEADER32`
const PE32_LAYOUT: OptionalHeaderLayout = OptionalHeaderLayout {
    size: 224,
    subsystem: 68,
    data_directories: 96,
};

/// `IMAGE_OPTIONAL_HEADER64`
const PE32_PLUS_LAYOUT: OptionalHeaderLayout = OptionalHeaderLayout {
    size: 240,
    subsystem: 68,
    data_directories: 112,
};

impl OptionalHeaderLayout {
    fn data_directory(&self, index: usize) -> usize {
        self.data_directories + index * DATA_DIRECTORY_ENTRY_SIZE
    }
}

/// The subset of a PE image's headers needed to decide how to launch it.
///
/// Only three fixed-size regions of the file are read: the DOS header, the
/// PE signature with the COFF file header, and the optional header.
///
/// Reference: [PE Format](https://learn.microsoft.com/windows/win32/debug/pe-format)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeHeader {
    /// PE32 or PE32+, taken from the optional header magic.
    pub format: PeFormat,

    /// Target CPU, taken from the COFF `Machine` field.
    ///
    /// Unrecognised machine codes leave this `Unknown`; the header is still
    /// considered valid.
    pub architecture: Architecture,

    /// Windows subsystem (2 = GUI, 3 = console, ...).
    pub subsystem: u16,

    /// COFF `Characteristics` bitfield, verbatim.
    pub characteristics: u16,

    /// Whether the CLR runtime header data directory is populated.
    pub is_managed: bool,
}

impl PeHeader {
    /// Opens `path` and parses its headers. The file is closed before returning.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let header = Self::parse(&mut reader);
        match &header {
            Ok(h) => log::info!(
                "{}: {} {} (managed: {})",
                path.as_ref().display(),
                h.format.as_str(),
                h.architecture,
                h.is_managed
            ),
            Err(e) => log::warn!("{}: {}", path.as_ref().display(), e),
        }
        header
    }

    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let coff_offset = parse_dos_header(reader)?;
        log::debug!("PE header at {:#x}", coff_offset);

        let (mut header, opt_offset) = parse_coff_header(reader, coff_offset)?;
        log::debug!(
            "machine {}, characteristics {:#06x}, {} optional header at {:#x}",
            header.architecture,
            header.characteristics,
            header.format.as_str(),
            opt_offset
        );

        parse_optional_header(reader, opt_offset, &mut header)?;
        log::debug!(
            "subsystem {}, managed {}",
            header.subsystem,
            header.is_managed
        );
        Ok(header)
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics & IMAGE_FILE_DLL != 0
    }

    pub fn subsystem_name(&self) -> &'static str {
        match self.subsystem {
            1 => "native",
            2 => "windows gui",
            3 => "windows console",
            9 => "windows ce gui",
            10 => "efi application",
            _ => "other",
        }
    }
}

impl Header for PeHeader {
    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn is_64(&self) -> bool {
        self.format == PeFormat::Pe32Plus
    }

    fn format_name(&self) -> &'static str {
        self.format.as_str()
    }

    fn is_library(&self) -> bool {
        self.is_dll()
    }

    fn is_managed(&self) -> bool {
        self.is_managed
    }
}

fn read_block<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)?;
    Ok(())
}

/// Returns the file offset of the PE signature (`e_lfanew`).
fn parse_dos_header<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; DOS_HEADER_SIZE];
    read_block(reader, 0, &mut buf)?;

    if LE::read_u16(&buf) != IMAGE_DOS_SIGNATURE {
        return Err(Error::InvalidExecutable("missing MZ signature".into()));
    }

    Ok(u64::from(LE::read_u32(&buf[DOS_E_LFANEW..])))
}

/// Returns a header with format, architecture and characteristics filled in,
/// and the offset of the optional header.
fn parse_coff_header<R: Read + Seek>(reader: &mut R, coff_offset: u64) -> Result<(PeHeader, u64)> {
    let mut buf = [0u8; PE_SIGNATURE_SIZE + FILE_HEADER_SIZE + 2];
    read_block(reader, coff_offset, &mut buf)?;

    if LE::read_u32(&buf) != IMAGE_NT_SIGNATURE {
        return Err(Error::InvalidExecutable("missing PE signature".into()));
    }

    let file_header = &buf[PE_SIGNATURE_SIZE..PE_SIGNATURE_SIZE + FILE_HEADER_SIZE];
    let machine = LE::read_u16(&file_header[FILE_HEADER_MACHINE..]);
    let characteristics = LE::read_u16(&file_header[FILE_HEADER_CHARACTERISTICS..]);

    let magic = LE::read_u16(&buf[PE_SIGNATURE_SIZE + FILE_HEADER_SIZE..]);
    let format = PeFormat::from_magic(magic).ok_or_else(|| {
        Error::InvalidExecutable(format!("unsupported optional header magic {magic:#06x}"))
    })?;

    let header = PeHeader {
        format,
        architecture: Architecture::from_machine(machine),
        characteristics,
        ..PeHeader::default()
    };
    let opt_offset = coff_offset + (PE_SIGNATURE_SIZE + FILE_HEADER_SIZE) as u64;
    Ok((header, opt_offset))
}

fn parse_optional_header<R: Read + Seek>(
    reader: &mut R,
    opt_offset: u64,
    header: &mut PeHeader,
) -> Result<()> {
    let layout = header
        .format
        .layout()
        .ok_or_else(|| Error::InvalidExecutable("unknown optional header format".into()))?;

    let mut buf = vec![0u8; layout.size];
    read_block(reader, opt_offset, &mut buf)?;

    header.subsystem = LE::read_u16(&buf[layout.subsystem..]);

    let clr = layout.data_directory(IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR);
    let virtual_address = LE::read_u32(&buf[clr..]);
    let size = LE::read_u32(&buf[clr + 4..]);
    header.is_managed = virtual_address != 0 && size != 0;

    Ok(())
}
