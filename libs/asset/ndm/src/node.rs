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

use crate::{layout::LayoutVariant, util::align_up};
use byteorder::{BigEndian, ByteOrder};
use std::{fmt, ops::Range};

pub const NODE_HEADER_SIZE: usize = 128;
pub const NODE_ALIGNMENT: usize = 16;
pub const NAME_SIZE: usize = 16;
pub const TEXTURE_SLOTS: usize = 4;
pub const NO_TEXTURE: u16 = 0xFFFF;

// Sections at or above this size are garbage, not geometry.
pub const MAX_MESH_SECTION_SIZE: u32 = 0x10_0000;
pub const SETUP_SIZE_BASE: u32 = 0x80;
pub const MAX_SETUP_SKIP: u32 = 0x1000;
pub const POSITION_STRIDE: usize = 6;
pub const UV_STRIDE: usize = 4;

const POSITION_OFFSET: usize = 0x10;
const SCALE_OFFSET: usize = 0x20;
const SCALE_GATE_OFFSET: usize = 0x28;
const TEXTURES_OFFSET: usize = 0x40;
const VERTEX_DATA_SIZE_OFFSET: usize = 0x50;
const SETUP_SIZE_OFFSET: usize = 0x54;
const DISPLAY_LIST_SIZE_OFFSET: usize = 0x58;
const POSITION_DATA_SIZE_OFFSET: usize = 0x74;

const MAX_POSITION: f32 = 100_000.0;
const MIN_SCALE: f32 = 1e-4;
const MAX_SCALE: f32 = 1e4;
const MIN_GATE_SCALE: f32 = 0.001;
const MAX_GATE_SCALE: f32 = 10_000.0;

// Top byte of the flags word on nodes seen in the wild. Informational only.
const PLAUSIBLE_FLAG_BYTES: [u8; 6] = [0x00, 0x14, 0x54, 0xD4, 0x3F, 0x40];

/// How the raw setup-size field maps to the number of bytes skipped at the head of the display
/// list before decoding starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetupSizeMode {
    /// The field counts from a fixed base of 0x80.
    #[default]
    BaseRelative,
    /// The field is the skip length itself.
    Absolute,
}

impl SetupSizeMode {
    pub fn skip_length(self, raw: u32) -> u32 {
        let skip = match self {
            Self::BaseRelative => raw.saturating_sub(SETUP_SIZE_BASE),
            Self::Absolute => raw,
        };
        if skip < MAX_SETUP_SKIP {
            skip
        } else {
            0
        }
    }
}

/// Everything outside the 128 bytes of a node block that its interpretation depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeContext {
    pub texture_count: usize,
    pub layout: LayoutVariant,
    pub setup: SetupSizeMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Truncated,
    EmptyName,
    UnprintableName,
    ImplausibleScale,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Truncated => "block runs past the end of the file",
            Self::EmptyName => "empty name",
            Self::UnprintableName => "name is not printable ascii",
            Self::ImplausibleScale => "implausible scale",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Candidate {
    Valid(Node),
    Invalid(Rejection),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    name: String,
    offset: usize,
    position: [f32; 3],
    scale: [f32; 3],
    flags: u32,
    color1: [f32; 4],
    color2: [f32; 4],
    texture_indices: [Option<u16>; TEXTURE_SLOTS],
    vertex_data_size: u32,
    raw_setup_size: u32,
    setup_skip: u32,
    display_list_size: u32,
    position_data_size: u32,
}

impl Node {
    /// Decide whether the 128 bytes at `offset` are a node header and decode them if so.
    pub fn validate(data: &[u8], offset: usize, context: &NodeContext) -> Candidate {
        let block = match offset
            .checked_add(NODE_HEADER_SIZE)
            .and_then(|end| data.get(offset..end))
        {
            Some(block) => block,
            None => return Candidate::Invalid(Rejection::Truncated),
        };
        let name = match validate_name(&block[..NAME_SIZE]) {
            Ok(name) => name,
            Err(rejection) => return Candidate::Invalid(rejection),
        };
        let gate = BigEndian::read_f32(&block[SCALE_GATE_OFFSET..]);
        let plausible = MIN_GATE_SCALE < gate.abs() && gate.abs() < MAX_GATE_SCALE;
        if !(gate.is_nan() || plausible) {
            return Candidate::Invalid(Rejection::ImplausibleScale);
        }
        Candidate::Valid(Self::decode(name, offset, block, context))
    }

    fn decode(name: String, offset: usize, block: &[u8], context: &NodeContext) -> Self {
        let f32_at = |at: usize| BigEndian::read_f32(&block[at..]);
        let u32_at = |at: usize| BigEndian::read_u32(&block[at..]);

        let mut position = [0f32; 3];
        for (i, v) in position.iter_mut().enumerate() {
            *v = f32_at(POSITION_OFFSET + i * 4);
        }
        if position.iter().any(|v| !v.is_finite() || v.abs() >= MAX_POSITION) {
            position = [0f32; 3];
        }

        let mut scale = [0f32; 3];
        for (i, v) in scale.iter_mut().enumerate() {
            *v = f32_at(SCALE_OFFSET + i * 4);
        }
        // NaN fails both comparisons and falls back too.
        if !scale
            .iter()
            .all(|v| MIN_SCALE < v.abs() && v.abs() < MAX_SCALE)
        {
            scale = [1f32; 3];
        }

        let color = |at: usize| {
            let mut c = [0f32; 4];
            for (v, &b) in c.iter_mut().zip(&block[at..at + 4]) {
                *v = f32::from(b) / 255.0;
            }
            c
        };

        let mut texture_indices = [None; TEXTURE_SLOTS];
        for (slot, index) in texture_indices.iter_mut().enumerate() {
            let raw = BigEndian::read_u16(&block[TEXTURES_OFFSET + slot * 2..]);
            if raw != NO_TEXTURE && usize::from(raw) < context.texture_count {
                *index = Some(raw);
            }
        }

        let raw_setup_size = u32_at(SETUP_SIZE_OFFSET);
        Self {
            name,
            offset,
            position,
            scale,
            flags: u32_at(context.layout.flags_offset()),
            color1: color(context.layout.color1_offset()),
            color2: color(context.layout.color2_offset()),
            texture_indices,
            vertex_data_size: u32_at(VERTEX_DATA_SIZE_OFFSET),
            raw_setup_size,
            setup_skip: context.setup.skip_length(raw_setup_size),
            display_list_size: u32_at(DISPLAY_LIST_SIZE_OFFSET),
            position_data_size: u32_at(POSITION_DATA_SIZE_OFFSET),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    pub fn scale(&self) -> [f32; 3] {
        self.scale
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn flags_plausible(&self) -> bool {
        PLAUSIBLE_FLAG_BYTES.contains(&((self.flags >> 24) as u8))
    }

    pub fn color1(&self) -> [f32; 4] {
        self.color1
    }

    pub fn color2(&self) -> [f32; 4] {
        self.color2
    }

    pub fn texture_indices(&self) -> [Option<u16>; TEXTURE_SLOTS] {
        self.texture_indices
    }

    pub fn vertex_data_size(&self) -> u32 {
        self.vertex_data_size
    }

    pub fn raw_setup_size(&self) -> u32 {
        self.raw_setup_size
    }

    pub fn setup_skip(&self) -> u32 {
        self.setup_skip
    }

    pub fn display_list_size(&self) -> u32 {
        self.display_list_size
    }

    pub fn position_data_size(&self) -> u32 {
        self.position_data_size
    }

    pub fn vertex_count(&self) -> usize {
        let pds = self.position_data_size as usize;
        if pds > 0 && pds % POSITION_STRIDE == 0 {
            pds / POSITION_STRIDE
        } else {
            self.vertex_data_size as usize / POSITION_STRIDE
        }
    }

    /// Number of UV pairs packed between the positions and the display list.
    pub fn uv_count(&self) -> usize {
        let pds = self.position_data_size as usize;
        let vds = self.vertex_data_size as usize;
        if pds == 0 || vds < pds || (vds - pds) % UV_STRIDE != 0 {
            return 0;
        }
        (vds - pds) / UV_STRIDE
    }

    pub fn has_mesh(&self) -> bool {
        let sane = |size: u32| size > 0 && size < MAX_MESH_SECTION_SIZE;
        sane(self.vertex_data_size) && sane(self.display_list_size)
    }

    pub fn block_range(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(NODE_HEADER_SIZE)
    }

    pub fn mesh_data_offset(&self) -> usize {
        self.offset.saturating_add(NODE_HEADER_SIZE)
    }

    pub fn uv_data_offset(&self) -> usize {
        self.mesh_data_offset()
            .saturating_add(self.position_data_size as usize)
    }

    pub fn display_list_range(&self) -> Range<usize> {
        let start = self
            .mesh_data_offset()
            .saturating_add(self.vertex_data_size as usize);
        start..start.saturating_add(self.display_list_size as usize)
    }

    /// The display list minus its setup prefix. The prefix is ignored if it would swallow the
    /// whole list.
    pub fn decode_range(&self) -> Range<usize> {
        let range = self.display_list_range();
        if self.setup_skip < self.display_list_size {
            range.start.saturating_add(self.setup_skip as usize)..range.end
        } else {
            range
        }
    }

    pub fn next_block_offset(&self) -> usize {
        if self.has_mesh() {
            align_up(self.display_list_range().end, NODE_ALIGNMENT)
        } else {
            self.offset.saturating_add(NODE_HEADER_SIZE)
        }
    }
}

fn validate_name(raw: &[u8]) -> Result<String, Rejection> {
    let end = raw.iter().rposition(|&c| c != 0).map_or(0, |p| p + 1);
    if end == 0 {
        return Err(Rejection::EmptyName);
    }
    let name = &raw[..end];
    if !name.iter().all(|c| (0x20..0x7F).contains(c)) {
        return Err(Rejection::UnprintableName);
    }
    Ok(String::from_utf8_lossy(name).into_owned())
}
