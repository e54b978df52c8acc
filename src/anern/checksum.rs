/// CRC-16/CCITT lookup table, one entry per nibble value.
const CRC_TABLE: [u16; 16] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50a5, 0x60c6, 0x70e7, //
    0x8108, 0x9129, 0xa14a, 0xb16b, 0xc18c, 0xd1ad, 0xe1ce, 0xf1ef,
];

/// Bytes the inverter uses as frame delimiters; a checksum byte must never be one of these.
pub const RESERVED: [u8; 3] = [b'(', b'\r', b'\n'];

/// Raw CRC accumulator over `data`, before reserved-byte avoidance.
///
/// Processes each byte as two nibbles, high nibble first. The accumulator is 16 bits wide and the
/// left shift discards anything above bit 15.
pub fn raw_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &c in data {
        crc = step(crc, c >> 4);
        crc = step(crc, c & 0x0f);
    }

    crc
}

fn step(crc: u16, nibble: u8) -> u16 {
    let da = ((crc >> 8) as u8) >> 4;
    let index = (da ^ nibble) as usize;
    (crc << 4) ^ CRC_TABLE[index]
}

/// Checksum bytes for `data`, high byte first, with reserved-byte avoidance applied to each byte
/// independently.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let [high, low] = raw_crc(data).to_be_bytes();
    [avoid_reserved(high), avoid_reserved(low)]
}

// bumped once only; none of the reserved bytes are adjacent so the result is never reserved
fn avoid_reserved(byte: u8) -> u8 {
    if RESERVED.contains(&byte) {
        byte + 1
    } else {
        byte
    }
}
