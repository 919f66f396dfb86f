//! In-memory AVI file builder shared by the integration tests.

#![allow(dead_code)]

/// A chunk placed in the movi list, for building idx1.
struct MoviChunk {
    tag: [u8; 4],
    /// Offset of the chunk header from the `movi` list type.
    offset: u32,
    size: u32,
    keyframe: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    None,
    Relative,
    Absolute,
}

/// Builds a RIFF AVI file chunk by chunk.
pub struct AviBuilder {
    frame_period: u32,
    flags: u32,
    declared: Option<u32>,
    stream_count: u32,
    hdrl: Vec<u8>,
    movi: Vec<u8>,
    chunks: Vec<MoviChunk>,
    index: IndexMode,
}

pub fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn le32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn strh(fcc: &[u8; 4], handler: &[u8; 4], scale: u32, rate: u32, sample_size: u32) -> Vec<u8> {
    let mut payload = fcc.to_vec();
    payload.extend_from_slice(handler);
    // flags, priority+language, initial frames, scale, rate, start, length,
    // suggested buffer, quality, sample size
    payload.extend(le32s(&[0, 0, 0, scale, rate, 0, 0, 0, 0, sample_size]));
    payload.extend_from_slice(&[0; 8]);
    chunk(b"strh", &payload)
}

pub fn bitmap_strf(tag: &[u8; 4], bit_depth: u16, extra: &[u8]) -> Vec<u8> {
    let mut payload = le32s(&[40 + extra.len() as u32, 64, 48]);
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&bit_depth.to_le_bytes());
    payload.extend_from_slice(tag);
    payload.extend_from_slice(&[0; 20]);
    payload.extend_from_slice(extra);
    chunk(b"strf", &payload)
}

pub fn wave_strf(format_tag: u16, channels: u16, sample_rate: u32, block_align: u16) -> Vec<u8> {
    let mut payload = format_tag.to_le_bytes().to_vec();
    payload.extend_from_slice(&channels.to_le_bytes());
    payload.extend_from_slice(&sample_rate.to_le_bytes());
    payload.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    payload.extend_from_slice(&block_align.to_le_bytes());
    payload.extend_from_slice(&16u16.to_le_bytes());
    chunk(b"strf", &payload)
}

/// Deterministic payload so split packets can be checked for continuity.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|k| (k % 251) as u8).collect()
}

impl AviBuilder {
    pub fn new() -> Self {
        AviBuilder {
            frame_period: 40_000,
            flags: 0,
            declared: None,
            stream_count: 0,
            hdrl: Vec::new(),
            movi: Vec::new(),
            chunks: Vec::new(),
            index: IndexMode::None,
        }
    }

    /// Override the stream count written to avih.
    pub fn declared_streams(mut self, count: u32) -> Self {
        self.declared = Some(count);
        self
    }

    pub fn main_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn index(mut self, mode: IndexMode) -> Self {
        self.index = mode;
        self
    }

    /// Append raw chunks to the header list.
    pub fn header_chunks(mut self, chunks: &[Vec<u8>]) -> Self {
        for c in chunks {
            self.hdrl.extend_from_slice(c);
        }
        self
    }

    pub fn video(self, scale: u32, rate: u32) -> Self {
        self.video_with(scale, rate, b"DIVX", 24, &[])
    }

    pub fn video_with(
        mut self,
        scale: u32,
        rate: u32,
        tag: &[u8; 4],
        bit_depth: u16,
        extra: &[u8],
    ) -> Self {
        self.stream_count += 1;
        self.header_chunks(&[
            strh(b"vids", tag, scale, rate, 0),
            bitmap_strf(tag, bit_depth, extra),
        ])
    }

    pub fn audio(mut self, scale: u32, rate: u32, sample_size: u32) -> Self {
        self.stream_count += 1;
        self.header_chunks(&[
            strh(b"auds", b"\0\0\0\0", scale, rate, sample_size),
            wave_strf(1, 1, rate, sample_size as u16),
        ])
    }

    /// Count a stream whose header chunks are added by hand.
    pub fn count_stream(mut self) -> Self {
        self.stream_count += 1;
        self
    }

    /// Append a data chunk to the movi list.
    pub fn chunk(self, tag: &[u8; 4], payload: &[u8]) -> Self {
        self.chunk_with_key(tag, payload, true)
    }

    pub fn chunk_with_key(mut self, tag: &[u8; 4], payload: &[u8], keyframe: bool) -> Self {
        self.chunks.push(MoviChunk {
            tag: *tag,
            offset: 4 + self.movi.len() as u32,
            size: payload.len() as u32,
            keyframe,
        });
        self.movi.extend(chunk(tag, payload));
        self
    }

    /// Append bytes to the movi list that are not part of any chunk.
    pub fn raw_movi(mut self, bytes: &[u8]) -> Self {
        self.movi.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let streams = self.declared.unwrap_or(self.stream_count);
        let mut avih = le32s(&[self.frame_period, 100_000, 0, self.flags, 0, 0, streams, 0]);
        avih.extend_from_slice(&[0; 24]);

        let mut hdrl = b"hdrl".to_vec();
        hdrl.extend(chunk(b"avih", &avih));
        hdrl.extend_from_slice(&self.hdrl);

        let mut body = b"AVI ".to_vec();
        body.extend(chunk(b"LIST", &hdrl));

        // RIFF header, body so far, then the movi LIST header.
        let movi_list = (8 + body.len() + 8) as u32;
        let mut movi = b"movi".to_vec();
        movi.extend_from_slice(&self.movi);
        body.extend(chunk(b"LIST", &movi));

        if self.index != IndexMode::None {
            let base = match self.index {
                IndexMode::Absolute => movi_list,
                _ => 0,
            };
            let mut idx1 = Vec::new();
            for c in &self.chunks {
                idx1.extend_from_slice(&c.tag);
                idx1.extend_from_slice(&(if c.keyframe { 0x10u32 } else { 0 }).to_le_bytes());
                idx1.extend_from_slice(&(base + c.offset).to_le_bytes());
                idx1.extend_from_slice(&c.size.to_le_bytes());
            }
            body.extend(chunk(b"idx1", &idx1));
        }

        chunk(b"RIFF", &body)
    }

    /// Offset of the `movi` list type in the built file.
    pub fn movi_list_offset(&self) -> u64 {
        let hdrl_len = 4 + 64 + self.hdrl.len();
        (12 + 8 + hdrl_len + 8) as u64
    }
}
