use crate::{
    binary_utils::{Field, FieldKind, RecordLayout},
    containers::{CompressionContainer, ContainerHandler},
    error::{ExtractError, Result},
};

// RNC ProPack method 1: LZ77 with three per-block Huffman tables (literal run
// lengths, match distances, match lengths). Bits are consumed LSB first from
// little-endian 16-bit words, and literal bytes are interleaved in the stream.

pub const RNC_HEADER_SIZE: usize = 18;
pub const RNC_SIGNATURE: &[u8; 4] = b"RNC\x01";

static RNC_HEADER: RecordLayout = RecordLayout::new("RNC header", RNC_HEADER_SIZE);
const UNPACKED_SIZE: Field = Field::new("unpacked_size", 4, FieldKind::U32Be);
const PACKED_SIZE: Field = Field::new("packed_size", 8, FieldKind::U32Be);
const UNPACKED_CRC: Field = Field::new("unpacked_crc", 12, FieldKind::U16Be);
const PACKED_CRC: Field = Field::new("packed_crc", 14, FieldKind::U16Be);

const MAX_EXTRA_BITS: u32 = 16;

#[derive(Debug)]
pub struct RncContainer {
    pub unpacked_size: u32,
    pub unpacked_crc: u16,
    pub packed_crc: u16,
    pub packed_data: Vec<u8>,
}

impl RncContainer {
    /// Total length of the container (header plus packed payload) at the
    /// start of `data`.
    pub fn container_len(data: &[u8]) -> Result<usize> {
        let header = RNC_HEADER.at(data, 0)?;
        Ok(RNC_HEADER_SIZE + header.u32(&PACKED_SIZE)? as usize)
    }
}

impl ContainerHandler for RncContainer {
    fn magic_word() -> &'static [u8] {
        RNC_SIGNATURE
    }

    fn deserialise(data: &[u8]) -> Result<Box<dyn CompressionContainer>> {
        if !Self::matches(data) {
            return Err(ExtractError::format(
                "RNC header",
                "missing RNC method 1 signature",
            ));
        }
        let header = RNC_HEADER.at(data, 0)?;
        let packed_size = header.u32(&PACKED_SIZE)? as usize;
        let end = RNC_HEADER_SIZE + packed_size;
        if end > data.len() {
            return Err(ExtractError::format(
                "RNC header",
                format!(
                    "packed size {} exceeds the {} bytes available",
                    packed_size,
                    data.len() - RNC_HEADER_SIZE
                ),
            ));
        }

        Ok(Box::new(RncContainer {
            unpacked_size: header.u32(&UNPACKED_SIZE)?,
            unpacked_crc: header.u16(&UNPACKED_CRC)?,
            packed_crc: header.u16(&PACKED_CRC)?,
            packed_data: data[RNC_HEADER_SIZE..end].to_vec(),
        }))
    }
}

impl CompressionContainer for RncContainer {
    fn decompress(&self) -> Result<Vec<u8>> {
        if rnc_crc(&self.packed_data) != self.packed_crc {
            return Err(ExtractError::decompress("RNC stream", "packed data CRC mismatch"));
        }

        let expected = self.unpacked_size as usize;
        let mut output = Vec::with_capacity(expected);
        let mut bits = BitStream::new(&self.packed_data);
        // Lock and key flags
        bits.advance(2);

        while output.len() < expected {
            let block_start = output.len();
            let raw = HuffmanTable::read(&mut bits);
            let distances = HuffmanTable::read(&mut bits);
            let lengths = HuffmanTable::read(&mut bits);
            let mut pending = bits.read(0xFFFF, 16) as i32;

            loop {
                let literal_len = raw.decode(&mut bits)? as usize;
                if literal_len > 0 {
                    if output.len() + literal_len > expected {
                        return Err(overrun(expected));
                    }
                    for _ in 0..literal_len {
                        let byte = bits.take_literal().ok_or_else(|| {
                            ExtractError::decompress("RNC stream", "literal run past end of input")
                        })?;
                        output.push(byte);
                    }
                    bits.refill();
                }

                pending -= 1;
                if pending <= 0 {
                    break;
                }

                let distance = distances.decode(&mut bits)? as usize + 1;
                let count = lengths.decode(&mut bits)? as usize + 2;
                if distance > output.len() {
                    return Err(ExtractError::decompress(
                        "RNC stream",
                        format!(
                            "back reference {} reaches before the start of output ({} bytes)",
                            distance,
                            output.len()
                        ),
                    ));
                }
                if output.len() + count > expected {
                    return Err(overrun(expected));
                }
                for _ in 0..count {
                    let byte = output[output.len() - distance];
                    output.push(byte);
                }
            }

            if output.len() == block_start {
                return Err(ExtractError::decompress(
                    "RNC stream",
                    "block produced no output",
                ));
            }
        }

        if rnc_crc(&output) != self.unpacked_crc {
            return Err(ExtractError::decompress(
                "RNC stream",
                "unpacked data CRC mismatch",
            ));
        }

        Ok(output)
    }
}

fn overrun(expected: usize) -> ExtractError {
    ExtractError::decompress(
        "RNC stream",
        format!("output exceeds declared size of {} bytes", expected),
    )
}

struct BitStream<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    count: u32,
}

impl<'a> BitStream<'a> {
    fn new(data: &'a [u8]) -> Self {
        let mut stream = BitStream {
            data,
            pos: 0,
            buffer: 0,
            count: 16,
        };
        stream.buffer = stream.word_at(0);
        stream
    }

    // Reads past the end yield zero bits; a corrupt stream then fails on a
    // Huffman lookup, a CRC or the no-progress check.
    fn word_at(&self, at: usize) -> u32 {
        let lo = self.data.get(at).copied().unwrap_or(0) as u32;
        let hi = self.data.get(at + 1).copied().unwrap_or(0) as u32;
        lo | (hi << 8)
    }

    fn peek(&self, mask: u32) -> u32 {
        self.buffer & mask
    }

    fn advance(&mut self, n: u32) {
        self.buffer >>= n;
        self.count -= n;
        if self.count < 16 {
            self.pos += 2;
            self.buffer |= self.word_at(self.pos) << self.count;
            self.count += 16;
        }
    }

    fn read(&mut self, mask: u32, n: u32) -> u32 {
        let value = self.peek(mask);
        self.advance(n);
        value
    }

    /// Replaces the look-ahead word after literal bytes were taken.
    fn refill(&mut self) {
        self.count -= 16;
        self.buffer &= (1 << self.count) - 1;
        self.buffer |= self.word_at(self.pos) << self.count;
        self.count += 16;
    }

    fn take_literal(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }
}

#[derive(Debug, Clone, Copy)]
struct HuffmanCode {
    code: u32,
    mask: u32,
    len: u32,
    value: u32,
}

struct HuffmanTable {
    codes: Vec<HuffmanCode>,
}

impl HuffmanTable {
    fn read(bits: &mut BitStream) -> Self {
        let num = bits.read(0x1F, 5) as usize;
        let mut lengths = Vec::with_capacity(num);
        for _ in 0..num {
            lengths.push(bits.read(0x0F, 4));
        }
        let longest = lengths.iter().copied().max().unwrap_or(0).max(1);

        let mut codes = Vec::with_capacity(num);
        let mut code = 0u32;
        for len in 1..=longest {
            for (value, _) in lengths.iter().enumerate().filter(|(_, l)| **l == len) {
                codes.push(HuffmanCode {
                    code: mirror(code, len),
                    mask: (1 << len) - 1,
                    len,
                    value: value as u32,
                });
                code += 1;
            }
            code <<= 1;
        }

        HuffmanTable { codes }
    }

    fn decode(&self, bits: &mut BitStream) -> Result<u32> {
        let entry = self
            .codes
            .iter()
            .find(|c| bits.peek(c.mask) == c.code)
            .copied()
            .ok_or_else(|| ExtractError::decompress("RNC stream", "invalid Huffman code"))?;
        bits.advance(entry.len);

        if entry.value < 2 {
            return Ok(entry.value);
        }
        let extra = entry.value - 1;
        if extra > MAX_EXTRA_BITS {
            return Err(ExtractError::decompress(
                "RNC stream",
                format!("Huffman value {} out of range", entry.value),
            ));
        }
        let base = 1u32 << extra;
        Ok(base | bits.read(base - 1, extra))
    }
}

/// Reverses the low `n` bits of `x`.
fn mirror(mut x: u32, n: u32) -> u32 {
    let mut top = 1u32 << (n - 1);
    let mut bottom = 1u32;
    while top > bottom {
        let mask = top | bottom;
        let masked = x & mask;
        if masked != 0 && masked != mask {
            x ^= mask;
        }
        top >>= 1;
        bottom <<= 1;
    }
    x
}

/// CRC-16 (reflected polynomial 0xA001, zero initial value) used for both RNC
/// checksums.
pub fn rnc_crc(data: &[u8]) -> u16 {
    let mut table = [0u16; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut value = i as u16;
        for _ in 0..8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ 0xA001
            } else {
                value >> 1
            };
        }
        *slot = value;
    }

    data.iter().fold(0u16, |crc, &byte| {
        let crc = crc ^ byte as u16;
        (crc >> 8) ^ table[(crc & 0xFF) as usize]
    })
}
