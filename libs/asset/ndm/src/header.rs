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

use crate::{error::NdmError, util::read_name};
use anyhow::{bail, Result};
use byteorder::{BigEndian, ByteOrder};
use log::warn;

pub const HEADER_SIZE: usize = 0x20;
pub const TEXTURE_TABLE_OFFSET: usize = 0x20;
pub const TEXTURE_SLOT_SIZE: usize = 16;
pub const HIERARCHY_ENTRY_SIZE: usize = 3;
const NO_PARENT: u16 = 0xFFFF;

// The first 32 bytes. Only the texture count is load bearing; the packed word carries a node
// count hint in its upper half, either in the low byte of that half or, if that byte is zero,
// in the whole 16 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    texture_count: u32,
    declared_table_end: u32,
    packed_word: u32,
    extra_word: u32,
}

impl FileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            bail!(NdmError::TooShort {
                length: data.len(),
                minimum: HEADER_SIZE,
            });
        }
        Ok(Self {
            texture_count: BigEndian::read_u32(&data[0x00..]),
            declared_table_end: BigEndian::read_u32(&data[0x04..]),
            packed_word: BigEndian::read_u32(&data[0x08..]),
            extra_word: BigEndian::read_u32(&data[0x0C..]),
        })
    }

    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    /// The table end as stored in the file. Not trusted; see `texture_table_end`.
    pub fn declared_table_end(&self) -> u32 {
        self.declared_table_end
    }

    pub fn packed_word(&self) -> u32 {
        self.packed_word
    }

    pub fn extra_word(&self) -> u32 {
        self.extra_word
    }

    pub fn node_count_hint(&self) -> usize {
        let upper = self.packed_word >> 16;
        let narrow = upper & 0xFF;
        if narrow != 0 {
            narrow as usize
        } else {
            upper as usize
        }
    }

    pub fn texture_table_end(&self) -> usize {
        TEXTURE_TABLE_OFFSET
            .saturating_add((self.texture_count as usize).saturating_mul(TEXTURE_SLOT_SIZE))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureTable {
    names: Vec<String>,
}

impl TextureTable {
    pub fn from_bytes(data: &[u8], header: &FileHeader) -> Self {
        let declared = header.texture_count() as usize;
        let slots = data.get(TEXTURE_TABLE_OFFSET..).unwrap_or(&[]);
        let available = slots.len() / TEXTURE_SLOT_SIZE;
        if declared > available {
            warn!(
                "texture table truncated: {} declared, room for {}",
                declared, available
            );
        }
        Self {
            names: slots
                .chunks_exact(TEXTURE_SLOT_SIZE)
                .take(declared)
                .map(read_name)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&str> {
        self.names.get(usize::from(index)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub parent: Option<u16>,
    pub flags: u8,
}

/// Three bytes per node between the texture table and the first node, present only in the
/// hierarchical revision of the format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyTable {
    offset: usize,
    declared: usize,
    entries: Vec<HierarchyEntry>,
}

impl HierarchyTable {
    pub fn from_bytes(data: &[u8], offset: usize, declared: usize) -> Self {
        let entries = data
            .get(offset..)
            .unwrap_or(&[])
            .chunks_exact(HIERARCHY_ENTRY_SIZE)
            .take(declared)
            .map(|entry| {
                let parent = BigEndian::read_u16(&entry[0..2]);
                HierarchyEntry {
                    parent: if parent == NO_PARENT { None } else { Some(parent) },
                    flags: entry[2],
                }
            })
            .collect();
        Self {
            offset,
            declared,
            entries,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn end_offset(&self) -> usize {
        self.offset
            .saturating_add(self.declared.saturating_mul(HIERARCHY_ENTRY_SIZE))
    }

    pub fn entries(&self) -> &[HierarchyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.len() == self.declared
    }

    /// Every parent names another entry and at least one entry is a root.
    pub fn is_consistent(&self) -> bool {
        self.declared > 0
            && self.is_complete()
            && self.entries.iter().any(|e| e.parent.is_none())
            && self
                .entries
                .iter()
                .all(|e| e.parent.map_or(true, |p| usize::from(p) < self.declared))
    }
}
