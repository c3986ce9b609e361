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
    display_list::{Primitive, COMMAND_HEADER_SIZE, MAX_COMMAND_VERTICES},
    util::{clip, read_u16},
};
use byteorder::{BigEndian, ByteOrder};
use log::debug;
use std::{fmt, ops::Range};

// Vertex references in a display list are 3, 4 or 6 bytes wide, and nothing in the file says
// which. The first command near the start of the list is sampled under every width and a
// fixed chain of rules picks the reading that looks like real indices.

pub const DETECT_SCAN_WINDOW: usize = 0x100;
pub const DETECT_SAMPLE: usize = 8;
pub const MAX_NARROW_VERTEX_COUNT: usize = 255;
pub const MAX_SEQUENTIAL_STEP: u32 = 4;
const MIN_SEQUENCE: usize = 3;
const ZERO_PAD_SAMPLE: usize = 6;
const ZERO_PAD_MIN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefWidth {
    Three,
    Four,
    Six,
}

impl RefWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::Three => 3,
            Self::Four => 4,
            Self::Six => 6,
        }
    }

    /// `record` must be at least `bytes()` long.
    pub fn position_index(self, record: &[u8]) -> u32 {
        match self {
            Self::Three | Self::Four => u32::from(record[0]),
            Self::Six => u32::from(BigEndian::read_u16(&record[0..2])),
        }
    }

    pub fn uv_index(self, record: &[u8]) -> u32 {
        match self {
            Self::Three => u32::from(record[2]),
            Self::Four => u32::from(record[3]),
            Self::Six => u32::from(BigEndian::read_u16(&record[4..6])),
        }
    }
}

impl fmt::Display for RefWidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-byte", self.bytes())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    Unverified,
    Weak,
    Likely,
    Certain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectionRule {
    WideVertexCount,
    SixByteSequential,
    FourByteZeroPadding,
    ExactQuadPattern,
    GeneralSequential,
    ZeroSecondByte,
    NoOpcode,
    Default,
}

impl DetectionRule {
    pub fn confidence(self) -> Confidence {
        match self {
            Self::WideVertexCount => Confidence::Certain,
            Self::SixByteSequential | Self::FourByteZeroPadding | Self::ExactQuadPattern => {
                Confidence::Likely
            }
            Self::GeneralSequential | Self::ZeroSecondByte => Confidence::Weak,
            Self::NoOpcode | Self::Default => Confidence::Unverified,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefFormat {
    pub width: RefWidth,
    pub rule: DetectionRule,
    /// The command the decision was drawn from, if any.
    pub opcode_offset: Option<usize>,
}

impl RefFormat {
    pub fn confidence(&self) -> Confidence {
        self.rule.confidence()
    }
}

/// The leading references of the sampled command, read under each candidate width.
pub struct Samples<'a> {
    refs: &'a [u8],
    count: usize,
    vertex_count: usize,
}

impl<'a> Samples<'a> {
    pub fn new(refs: &'a [u8], count: usize, vertex_count: usize) -> Self {
        Self {
            refs,
            count,
            vertex_count,
        }
    }

    fn records(&self, width: RefWidth, limit: usize) -> impl Iterator<Item = &'a [u8]> {
        self.refs
            .chunks_exact(width.bytes())
            .take(self.count.min(limit))
    }

    fn indices(&self, width: RefWidth) -> Vec<u32> {
        self.records(width, DETECT_SAMPLE)
            .map(|r| width.position_index(r))
            .collect()
    }

    fn looks_like_indices(&self, width: RefWidth) -> bool {
        let indices = self.indices(width);
        indices.len() >= MIN_SEQUENCE
            && indices.iter().all(|&i| (i as usize) < self.vertex_count)
            && indices.windows(2).any(|w| w[0] != w[1])
            && indices
                .windows(2)
                .all(|w| w[0].abs_diff(w[1]) <= MAX_SEQUENTIAL_STEP)
    }
}

pub struct Rule {
    pub rule: DetectionRule,
    pub verdict: fn(&Samples) -> Option<RefWidth>,
}

fn six_byte_sequential(s: &Samples) -> Option<RefWidth> {
    s.looks_like_indices(RefWidth::Six).then_some(RefWidth::Six)
}

// Four byte records are mostly [index, 0, 0, uv].
fn four_byte_zero_padding(s: &Samples) -> Option<RefWidth> {
    let records = s
        .records(RefWidth::Four, ZERO_PAD_SAMPLE)
        .collect::<Vec<_>>();
    let padded = records.iter().filter(|r| r[1] == 0 && r[2] == 0).count();
    (records.len() >= 4 && padded * ZERO_PAD_SAMPLE >= records.len() * ZERO_PAD_MIN)
        .then_some(RefWidth::Four)
}

fn exact_quad_pattern(s: &Samples) -> Option<RefWidth> {
    let is_quad = |width: RefWidth| {
        let indices = s.indices(width);
        indices.len() >= 4
            && (indices[0] as usize) + 3 < s.vertex_count
            && (1..4).all(|k| indices[k] == indices[0] + k as u32)
    };
    match (is_quad(RefWidth::Four), is_quad(RefWidth::Three)) {
        (true, false) => Some(RefWidth::Four),
        (false, true) => Some(RefWidth::Three),
        _ => None,
    }
}

// A 4-byte reading of [position, 0, uv] triples lands on the zero attribute bytes and small
// uv values, which can look sequential. Such a reading never outranks the zero second bytes.
fn general_sequential(s: &Samples) -> Option<RefWidth> {
    if s.looks_like_indices(RefWidth::Three) {
        return Some(RefWidth::Three);
    }
    (s.looks_like_indices(RefWidth::Four) && !second_bytes_mostly_zero(s))
        .then_some(RefWidth::Four)
}

fn second_bytes_mostly_zero(s: &Samples) -> bool {
    let records = s
        .records(RefWidth::Three, DETECT_SAMPLE)
        .collect::<Vec<_>>();
    let zeros = records.iter().filter(|r| r[1] == 0).count();
    records.len() >= 4 && zeros * 4 >= records.len() * 3
}

fn zero_second_byte(s: &Samples) -> Option<RefWidth> {
    second_bytes_mostly_zero(s).then_some(RefWidth::Three)
}

/// Evaluated in order; the first rule with an opinion wins.
pub const RULES: [Rule; 5] = [
    Rule {
        rule: DetectionRule::SixByteSequential,
        verdict: six_byte_sequential,
    },
    Rule {
        rule: DetectionRule::FourByteZeroPadding,
        verdict: four_byte_zero_padding,
    },
    Rule {
        rule: DetectionRule::ExactQuadPattern,
        verdict: exact_quad_pattern,
    },
    Rule {
        rule: DetectionRule::GeneralSequential,
        verdict: general_sequential,
    },
    Rule {
        rule: DetectionRule::ZeroSecondByte,
        verdict: zero_second_byte,
    },
];

// A quad command with a sane count near the start of the list, failing that any primitive.
fn find_sample_command(data: &[u8], range: &Range<usize>) -> Option<(usize, usize)> {
    let window = clip(
        range.start..range.start.saturating_add(DETECT_SCAN_WINDOW).min(range.end),
        data.len(),
    );
    let command_at = |offset: usize, want_quads: bool| -> Option<(usize, usize)> {
        let primitive = Primitive::from_opcode(data[offset])?;
        if want_quads && primitive != Primitive::Quads {
            return None;
        }
        let count = usize::from(read_u16(data, offset + 1)?);
        (count > 0 && count <= MAX_COMMAND_VERTICES).then_some((offset, count))
    };
    window
        .clone()
        .find_map(|offset| command_at(offset, true))
        .or_else(|| window.clone().find_map(|offset| command_at(offset, false)))
}

/// Decide how wide the vertex references in `range` are.
pub fn detect_ref_format(data: &[u8], range: Range<usize>, vertex_count: usize) -> RefFormat {
    if vertex_count > MAX_NARROW_VERTEX_COUNT {
        return RefFormat {
            width: RefWidth::Six,
            rule: DetectionRule::WideVertexCount,
            opcode_offset: None,
        };
    }
    let (offset, count) = match find_sample_command(data, &range) {
        Some(found) => found,
        None => {
            return RefFormat {
                width: RefWidth::Three,
                rule: DetectionRule::NoOpcode,
                opcode_offset: None,
            }
        }
    };
    let refs = clip(offset + COMMAND_HEADER_SIZE..range.end, data.len());
    let samples = Samples::new(&data[refs], count, vertex_count);
    for rule in &RULES {
        if let Some(width) = (rule.verdict)(&samples) {
            debug!(
                "{} references by {:?} from command at {:08X}",
                width, rule.rule, offset
            );
            return RefFormat {
                width,
                rule: rule.rule,
                opcode_offset: Some(offset),
            };
        }
    }
    RefFormat {
        width: RefWidth::Three,
        rule: DetectionRule::Default,
        opcode_offset: Some(offset),
    }
}
