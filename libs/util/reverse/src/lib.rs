// This file is part of OpenNDM.
//
// OpenNDM is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenNDM is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenNDM.  If not, see <http://www.gnu.org/licenses/>.

//! Small helpers for looking at raw bytes while reverse engineering formats.

pub fn n2h(n: u8) -> char {
    match n {
        0..=9 => (b'0' + n) as char,
        10..=15 => (b'A' + n - 10) as char,
        _ => panic!("expected a nibble, got: {}", n),
    }
}

pub fn b2h(b: u8, v: &mut String) {
    v.push(n2h(b >> 4));
    v.push(n2h(b & 0xF));
}

/// Space separated hex, e.g. `80 00 04 00`.
pub fn bs2s(bs: &[u8]) -> String {
    let mut v = String::with_capacity(bs.len() * 3);
    for (i, &b) in bs.iter().enumerate() {
        if i > 0 {
            v.push(' ');
        }
        b2h(b, &mut v);
    }
    v
}

/// Printable ASCII or a dot, for the right hand column of a hexdump.
pub fn bs2a(bs: &[u8]) -> String {
    bs.iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Classic 16-byte-per-row dump. Offsets in the left column are `base` relative,
/// so a slice cut out of a larger file can still be labelled with file offsets.
pub fn hexdump(bs: &[u8], base: usize) -> Vec<String> {
    bs.chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            format!(
                "{:08X}  {:<47}  |{}|",
                base + row * 16,
                bs2s(chunk),
                bs2a(chunk)
            )
        })
        .collect()
}

/// Hex for at most `limit` bytes of `bs` starting at `offset`, clipped to the buffer.
pub fn excerpt(bs: &[u8], offset: usize, limit: usize) -> String {
    let start = offset.min(bs.len());
    let end = offset.saturating_add(limit).min(bs.len());
    bs2s(&bs[start..end])
}
