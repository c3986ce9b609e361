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

use crate::{
    format::RefWidth,
    util::{clip, read_u16},
};
use log::trace;
use reverse::excerpt;
use std::{fmt, ops::Range};

// A display list is a run of draw commands, each an opcode byte, a big endian u16 reference
// count and that many vertex references. Setup state and padding are mixed in with no framing,
// so the decoder scans byte by byte and only enters a command when the opcode, the count and
// the first few references all look right.

pub const MAX_COMMAND_VERTICES: usize = 20_000;
pub const COMMAND_HEADER_SIZE: usize = 3;
pub const VALIDATION_LOOKAHEAD: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Quads,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            0x80 => Self::Quads,
            0x90 => Self::Triangles,
            0x98 => Self::TriangleStrip,
            0xA0 => Self::TriangleFan,
            _ => return None,
        })
    }

    pub fn opcode(self) -> u8 {
        match self {
            Self::Quads => 0x80,
            Self::Triangles => 0x90,
            Self::TriangleStrip => 0x98,
            Self::TriangleFan => 0xA0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Quads => "quads",
            Self::Triangles => "triangles",
            Self::TriangleStrip => "strip",
            Self::TriangleFan => "fan",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How many of the sampled references must be in range for a command to be accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validation {
    /// Three quarters.
    #[default]
    Strict,
    /// One quarter.
    Lenient,
}

impl Validation {
    pub fn accepts(self, valid: usize, sampled: usize) -> bool {
        match self {
            Self::Strict => valid * 4 >= sampled * 3,
            Self::Lenient => valid * 4 >= sampled,
        }
    }
}

/// One reference: a position index and the texture coordinate index riding along with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Corner {
    pub position: u32,
    pub uv: u32,
}

fn distinct(positions: &[u32]) -> bool {
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| !positions[i + 1..].contains(p))
}

/// Expand a primitive's corners into triangles, dropping any that are degenerate by position.
pub fn triangulate(primitive: Primitive, corners: &[Corner]) -> Vec<[Corner; 3]> {
    let mut out = Vec::new();
    match primitive {
        Primitive::Quads => {
            for q in corners.chunks_exact(4) {
                if distinct(&[q[0].position, q[1].position, q[2].position, q[3].position]) {
                    out.push([q[0], q[1], q[2]]);
                    out.push([q[0], q[2], q[3]]);
                }
            }
        }
        Primitive::Triangles => {
            for t in corners.chunks_exact(3) {
                if distinct(&[t[0].position, t[1].position, t[2].position]) {
                    out.push([t[0], t[1], t[2]]);
                }
            }
        }
        Primitive::TriangleStrip => {
            for (i, w) in corners.windows(3).enumerate() {
                if !distinct(&[w[0].position, w[1].position, w[2].position]) {
                    continue;
                }
                // Every other triangle in a strip winds the other way.
                if i % 2 == 0 {
                    out.push([w[0], w[1], w[2]]);
                } else {
                    out.push([w[0], w[2], w[1]]);
                }
            }
        }
        Primitive::TriangleFan => {
            if let Some((apex, rim)) = corners.split_first() {
                for w in rim.windows(2) {
                    if distinct(&[apex.position, w[0].position, w[1].position]) {
                        out.push([*apex, w[0], w[1]]);
                    }
                }
            }
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub offset: usize,
    pub primitive: Primitive,
    pub declared: usize,
    pub decoded: usize,
    pub triangles: usize,
}

/// A reference that named a vertex past the end of the position array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutOfRange {
    pub offset: usize,
    pub index: u32,
    pub limit: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedList {
    pub triangles: Vec<[u32; 3]>,
    /// Parallel to `triangles`.
    pub uv_triangles: Vec<[u32; 3]>,
    pub commands: Vec<DrawCommand>,
    pub rejected_opcodes: usize,
    pub out_of_range: Vec<OutOfRange>,
}

#[derive(Clone, Copy, Debug)]
struct CommandHeader {
    offset: usize,
    primitive: Primitive,
    count: usize,
}

enum Probe {
    NotOpcode,
    Rejected,
    Accepted(CommandHeader),
}

enum State {
    Scanning,
    InCommand(CommandHeader),
}

pub struct DisplayListDecoder<'a> {
    data: &'a [u8],
    range: Range<usize>,
    width: RefWidth,
    vertex_count: usize,
    validation: Validation,
}

impl<'a> DisplayListDecoder<'a> {
    pub fn new(
        data: &'a [u8],
        range: Range<usize>,
        width: RefWidth,
        vertex_count: usize,
        validation: Validation,
    ) -> Self {
        Self {
            data,
            range: clip(range, data.len()),
            width,
            vertex_count,
            validation,
        }
    }

    pub fn decode(&self) -> DecodedList {
        let mut out = DecodedList::default();
        let mut offset = self.range.start;
        let mut state = State::Scanning;
        loop {
            state = match state {
                State::Scanning => {
                    if offset >= self.range.end {
                        break;
                    }
                    match self.probe(offset) {
                        Probe::Accepted(header) => State::InCommand(header),
                        Probe::Rejected => {
                            out.rejected_opcodes += 1;
                            offset += 1;
                            State::Scanning
                        }
                        Probe::NotOpcode => {
                            offset += 1;
                            State::Scanning
                        }
                    }
                }
                State::InCommand(header) => {
                    offset = self.emit(header, &mut out);
                    State::Scanning
                }
            };
        }
        out
    }

    fn record(&self, offset: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(self.width.bytes())?;
        if end > self.range.end {
            return None;
        }
        self.data.get(offset..end)
    }

    fn reference_at(&self, header_offset: usize, i: usize) -> usize {
        header_offset + COMMAND_HEADER_SIZE + i * self.width.bytes()
    }

    fn probe(&self, offset: usize) -> Probe {
        let primitive = match Primitive::from_opcode(self.data[offset]) {
            Some(primitive) => primitive,
            None => return Probe::NotOpcode,
        };
        let count = match read_u16(self.data, offset + 1) {
            Some(count) if offset + COMMAND_HEADER_SIZE <= self.range.end => usize::from(count),
            _ => return Probe::Rejected,
        };
        if count == 0 || count > MAX_COMMAND_VERTICES {
            trace!("{} at {:08X}: bad count {}", primitive, offset, count);
            return Probe::Rejected;
        }
        let sampled = count.min(VALIDATION_LOOKAHEAD);
        let valid = (0..sampled)
            .filter_map(|i| self.record(self.reference_at(offset, i)))
            .filter(|r| (self.width.position_index(r) as usize) < self.vertex_count)
            .count();
        if !self.validation.accepts(valid, sampled) {
            trace!(
                "{} at {:08X}: {}/{} refs in range: {}",
                primitive,
                offset,
                valid,
                sampled,
                excerpt(self.data, offset, 16)
            );
            return Probe::Rejected;
        }
        Probe::Accepted(CommandHeader {
            offset,
            primitive,
            count,
        })
    }

    // Returns where scanning resumes: past the full declared command even if emission stopped
    // early.
    fn emit(&self, header: CommandHeader, out: &mut DecodedList) -> usize {
        let mut corners = Vec::with_capacity(header.count);
        for i in 0..header.count {
            let at = self.reference_at(header.offset, i);
            let record = match self.record(at) {
                Some(record) => record,
                None => break,
            };
            let position = self.width.position_index(record);
            if position as usize >= self.vertex_count {
                out.out_of_range.push(OutOfRange {
                    offset: at,
                    index: position,
                    limit: self.vertex_count,
                });
                break;
            }
            corners.push(Corner {
                position,
                uv: self.width.uv_index(record),
            });
        }

        let mut triangles = 0;
        if corners.len() >= 3 {
            for [a, b, c] in triangulate(header.primitive, &corners) {
                out.triangles.push([a.position, b.position, c.position]);
                out.uv_triangles.push([a.uv, b.uv, c.uv]);
                triangles += 1;
            }
        }
        trace!(
            "{} at {:08X}: {} of {} refs, {} triangles",
            header.primitive,
            header.offset,
            corners.len(),
            header.count,
            triangles
        );
        out.commands.push(DrawCommand {
            offset: header.offset,
            primitive: header.primitive,
            declared: header.count,
            decoded: corners.len(),
            triangles,
        });
        self.reference_at(header.offset, header.count)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn corners(positions: &[u32]) -> Vec<Corner> {
        positions
            .iter()
            .map(|&p| Corner {
                position: p,
                uv: p + 100,
            })
            .collect()
    }

    fn positions(tris: &[[Corner; 3]]) -> Vec<[u32; 3]> {
        tris.iter()
            .map(|t| [t[0].position, t[1].position, t[2].position])
            .collect()
    }

    fn decode(list: &[u8], width: RefWidth, vertex_count: usize) -> DecodedList {
        DisplayListDecoder::new(list, 0..list.len(), width, vertex_count, Validation::Strict)
            .decode()
    }

    #[test]
    fn it_maps_opcodes() {
        for opcode in [0x80, 0x90, 0x98, 0xA0] {
            assert_eq!(Primitive::from_opcode(opcode).map(Primitive::opcode), Some(opcode));
        }
        assert_eq!(Primitive::from_opcode(0x88), None);
    }

    #[test]
    fn it_triangulates_quads() {
        let tris = triangulate(Primitive::Quads, &corners(&[0, 1, 2, 3, 4, 4, 5, 6, 7]));
        assert_eq!(positions(&tris), vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(tris[1][2].uv, 103);
    }

    #[test]
    fn it_triangulates_lists() {
        let tris = triangulate(Primitive::Triangles, &corners(&[0, 1, 2, 3, 3, 4, 5, 6]));
        assert_eq!(positions(&tris), vec![[0, 1, 2]]);
    }

    #[test]
    fn it_alternates_strip_winding() {
        let tris = triangulate(Primitive::TriangleStrip, &corners(&[0, 1, 2, 3, 4]));
        assert_eq!(positions(&tris), vec![[0, 1, 2], [1, 3, 2], [2, 3, 4]]);
        let tris = triangulate(Primitive::TriangleStrip, &corners(&[0, 1, 1, 2, 3]));
        assert_eq!(positions(&tris), vec![[1, 2, 3]]);
    }

    #[test]
    fn it_fans_around_the_apex() {
        let tris = triangulate(Primitive::TriangleFan, &corners(&[0, 1, 2, 3]));
        assert_eq!(positions(&tris), vec![[0, 1, 2], [0, 2, 3]]);
        assert!(triangulate(Primitive::TriangleFan, &corners(&[0])).is_empty());
    }

    #[test]
    fn it_decodes_a_simple_quad() {
        let list = [0x80, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0];
        let decoded = decode(&list, RefWidth::Three, 4);
        assert_eq!(decoded.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(decoded.uv_triangles, vec![[0, 0, 0], [0, 0, 0]]);
        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.commands[0].triangles, 2);
        assert!(decoded.out_of_range.is_empty());
    }

    #[test]
    fn it_reads_uv_indices_per_width() {
        let list = [0x90, 0x00, 0x03, 0, 0, 0, 5, 1, 0, 0, 6, 2, 0, 0, 7];
        let decoded = decode(&list, RefWidth::Four, 3);
        assert_eq!(decoded.triangles, vec![[0, 1, 2]]);
        assert_eq!(decoded.uv_triangles, vec![[5, 6, 7]]);

        let list = [
            0x90, 0x00, 0x03, 0x01, 0x00, 0, 0, 0x00, 0x10, 0x01, 0x01, 0, 0, 0x00, 0x11, 0x01,
            0x02, 0, 0, 0x00, 0x12,
        ];
        let decoded = decode(&list, RefWidth::Six, 0x103);
        assert_eq!(decoded.triangles, vec![[0x100, 0x101, 0x102]]);
        assert_eq!(decoded.uv_triangles, vec![[0x10, 0x11, 0x12]]);
    }

    #[test]
    fn it_skips_noise_between_commands() {
        let mut list = vec![0x00, 0x13, 0x80, 0x00, 0x00, 0x42];
        list.extend_from_slice(&[0x98, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0]);
        let decoded = decode(&list, RefWidth::Three, 4);
        assert_eq!(decoded.rejected_opcodes, 1);
        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.commands[0].offset, 6);
        assert_eq!(decoded.triangles, vec![[0, 1, 2], [1, 3, 2]]);
    }

    #[test]
    fn it_rejects_commands_with_bad_refs() {
        let list = [0x80, 0x00, 0x04, 9, 0, 0, 9, 0, 0, 9, 0, 0, 0, 0, 0];
        let strict = decode(&list, RefWidth::Three, 4);
        assert!(strict.commands.is_empty());
        assert!(strict.triangles.is_empty());

        let lenient =
            DisplayListDecoder::new(&list, 0..list.len(), RefWidth::Three, 4, Validation::Lenient)
                .decode();
        assert_eq!(lenient.commands.len(), 1);
        assert_eq!(lenient.out_of_range.len(), 1);
        assert_eq!(lenient.out_of_range[0].index, 9);
        assert!(lenient.triangles.is_empty());
    }

    #[test]
    fn it_stops_at_the_first_out_of_range_ref() {
        let list = [
            0x90, 0x00, 0x06, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0, 7, 0, 0, 1, 0, 0, 0x90, 0x00,
            0x03, 1, 0, 0, 2, 0, 0, 3, 0, 0,
        ];
        let decoded = decode(&list, RefWidth::Three, 4);
        assert_eq!(decoded.out_of_range.len(), 1);
        assert_eq!(decoded.out_of_range[0].offset, 15);
        assert_eq!(decoded.commands.len(), 2);
        assert_eq!(decoded.commands[0].decoded, 4);
        assert_eq!(decoded.commands[1].offset, 21);
        assert_eq!(decoded.triangles, vec![[0, 1, 2], [1, 2, 3]]);
    }

    #[test]
    fn it_stays_inside_the_range() {
        let list = [0x80, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0];
        let decoded =
            DisplayListDecoder::new(&list, 0..9, RefWidth::Three, 4, Validation::Strict).decode();
        // Only two of the four sampled refs fit.
        assert!(decoded.commands.is_empty());
        let decoded =
            DisplayListDecoder::new(&list, 0..100, RefWidth::Three, 4, Validation::Strict)
                .decode();
        assert_eq!(decoded.triangles.len(), 2);
    }
}
