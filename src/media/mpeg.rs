//! MPEG audio frame header parsing
//!
//! Encoder output is read in arbitrary-sized pieces, so a client joining
//! mid-stream usually gets a first chunk that starts inside a frame. Players
//! resync eventually, but starting on a header avoids the initial glitch.
//!
//! Frame header (32 bits):
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A: frame sync (11 bits, all set)   E: bitrate index
//! B: version (00=2.5, 10=2, 11=1)    F: sample rate index
//! C: layer (01=III, 10=II, 11=I)     G: padding bit
//! D: protection bit                  I: channel mode
//! ```

/// MPEG audio version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// MPEG audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Layer1,
    Layer2,
    Layer3,
}

/// Channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// Parsed MPEG audio frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// Bitrate in kbit/s (0 = free format)
    pub bitrate_kbps: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub padding: bool,
    pub channel_mode: ChannelMode,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 4;

    const BITRATES_V1_L1: [u32; 15] = [
        0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
    ];
    const BITRATES_V1_L2: [u32; 15] = [
        0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
    ];
    const BITRATES_V1_L3: [u32; 15] = [
        0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
    ];
    const BITRATES_V2_L1: [u32; 15] = [
        0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
    ];
    const BITRATES_V2_L23: [u32; 15] = [
        0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
    ];

    /// Parse a header from the first four bytes of `data`
    ///
    /// Returns None for anything that is not a valid header, including the
    /// reserved version/layer/bitrate/sample-rate encodings.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        if data[0] != 0xFF || data[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (data[1] >> 3) & 0x03 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };

        let layer = match (data[1] >> 1) & 0x03 {
            0b01 => Layer::Layer3,
            0b10 => Layer::Layer2,
            0b11 => Layer::Layer1,
            _ => return None,
        };

        let bitrate_index = (data[2] >> 4) as usize;
        if bitrate_index == 0x0F {
            return None;
        }
        let table = match (version, layer) {
            (MpegVersion::Mpeg1, Layer::Layer1) => &Self::BITRATES_V1_L1,
            (MpegVersion::Mpeg1, Layer::Layer2) => &Self::BITRATES_V1_L2,
            (MpegVersion::Mpeg1, Layer::Layer3) => &Self::BITRATES_V1_L3,
            (_, Layer::Layer1) => &Self::BITRATES_V2_L1,
            (_, _) => &Self::BITRATES_V2_L23,
        };
        let bitrate_kbps = table[bitrate_index];

        let sample_rate_index = ((data[2] >> 2) & 0x03) as usize;
        if sample_rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => [44100, 48000, 32000][sample_rate_index],
            MpegVersion::Mpeg2 => [22050, 24000, 16000][sample_rate_index],
            MpegVersion::Mpeg25 => [11025, 12000, 8000][sample_rate_index],
        };

        let channel_mode = match data[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Some(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            padding: (data[2] >> 1) & 0x01 == 1,
            channel_mode,
        })
    }

    /// Frame length in bytes, header included (None for free format)
    pub fn frame_len(&self) -> Option<usize> {
        if self.bitrate_kbps == 0 {
            return None;
        }

        let bitrate = self.bitrate_kbps as usize * 1000;
        let sample_rate = self.sample_rate as usize;
        let padding = self.padding as usize;

        let len = match (self.layer, self.version) {
            (Layer::Layer1, _) => (12 * bitrate / sample_rate + padding) * 4,
            (Layer::Layer3, MpegVersion::Mpeg2 | MpegVersion::Mpeg25) => {
                72 * bitrate / sample_rate + padding
            }
            _ => 144 * bitrate / sample_rate + padding,
        };
        Some(len)
    }
}

/// Find the offset of the first frame header in `data`
///
/// When the candidate frame ends inside `data`, the next frame must also
/// start with a valid header; this rejects most sync-like bytes in the
/// middle of audio payload.
pub fn find_frame_start(data: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while offset + FrameHeader::SIZE <= data.len() {
        if let Some(header) = FrameHeader::parse(&data[offset..]) {
            let next = header.frame_len().map(|len| offset + len);
            match next {
                Some(next) if next + FrameHeader::SIZE <= data.len() => {
                    if FrameHeader::parse(&data[next..]).is_some() {
                        return Some(offset);
                    }
                }
                _ => return Some(offset),
            }
        }
        offset += 1;
    }
    None
}
