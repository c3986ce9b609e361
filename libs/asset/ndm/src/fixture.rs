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

// Builds small synthetic NDM files for tests.
use crate::{
    display_list::Primitive,
    header::{HEADER_SIZE, TEXTURE_SLOT_SIZE},
    layout::LayoutVariant,
    node::{NODE_ALIGNMENT, NODE_HEADER_SIZE, NO_TEXTURE, SETUP_SIZE_BASE},
    util::align_up,
};
use byteorder::{BigEndian, ByteOrder};

/// A command with 3 byte references of the form [position, 0, uv].
pub(crate) fn command3(opcode: u8, refs: &[(u8, u8)]) -> Vec<u8> {
    let mut out = vec![opcode, 0, 0];
    BigEndian::write_u16(&mut out[1..], refs.len() as u16);
    for &(position, uv) in refs {
        out.extend_from_slice(&[position, 0, uv]);
    }
    out
}

pub(crate) fn quad3(a: u8, b: u8, c: u8, d: u8) -> Vec<u8> {
    command3(
        Primitive::Quads.opcode(),
        &[(a, 0), (b, 0), (c, 0), (d, 0)],
    )
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MeshSpec {
    positions: Vec<[i16; 3]>,
    uvs: Vec<[i16; 2]>,
    setup: Vec<u8>,
    display_list: Vec<u8>,
    raw_setup_size: Option<u32>,
    position_data_size: Option<u32>,
}

impl MeshSpec {
    pub(crate) fn new(positions: &[[i16; 3]]) -> Self {
        Self {
            positions: positions.to_vec(),
            ..Self::default()
        }
    }

    /// The unit square in the z = 0 plane.
    pub(crate) fn square() -> Self {
        Self::new(&[[0, 0, 0], [256, 0, 0], [256, 256, 0], [0, 256, 0]])
    }

    pub(crate) fn uvs(mut self, uvs: &[[i16; 2]]) -> Self {
        self.uvs = uvs.to_vec();
        self
    }

    pub(crate) fn setup(mut self, prefix: &[u8]) -> Self {
        self.setup = prefix.to_vec();
        self
    }

    pub(crate) fn raw_setup_size(mut self, raw: u32) -> Self {
        self.raw_setup_size = Some(raw);
        self
    }

    pub(crate) fn display_list(mut self, bytes: Vec<u8>) -> Self {
        self.display_list.extend(bytes);
        self
    }

    pub(crate) fn position_data_size(mut self, size: u32) -> Self {
        self.position_data_size = Some(size);
        self
    }

    fn write(&self, block: &mut [u8], out: &mut Vec<u8>) {
        let pds = (self.positions.len() * 6) as u32;
        let vds = pds + (self.uvs.len() * 4) as u32;
        let dls = (self.setup.len() + self.display_list.len()) as u32;
        let raw_setup = self.raw_setup_size.unwrap_or(if self.setup.is_empty() {
            0
        } else {
            SETUP_SIZE_BASE + self.setup.len() as u32
        });
        BigEndian::write_u32(&mut block[0x50..], vds);
        BigEndian::write_u32(&mut block[0x54..], raw_setup);
        BigEndian::write_u32(&mut block[0x58..], dls);
        BigEndian::write_u32(&mut block[0x74..], self.position_data_size.unwrap_or(pds));

        let mut word = [0u8; 2];
        for v in self.positions.iter().flatten().chain(self.uvs.iter().flatten()) {
            BigEndian::write_i16(&mut word, *v);
            out.extend_from_slice(&word);
        }
        out.extend_from_slice(&self.setup);
        out.extend_from_slice(&self.display_list);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NodeSpec {
    name: String,
    position: [f32; 3],
    scale: [f32; 3],
    flags: u32,
    colors: [[u8; 4]; 2],
    textures: [u16; 4],
    mesh: Option<MeshSpec>,
}

impl NodeSpec {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            position: [0.0; 3],
            scale: [1.0; 3],
            flags: 0,
            colors: [[0; 4]; 2],
            textures: [NO_TEXTURE; 4],
            mesh: None,
        }
    }

    pub(crate) fn position(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub(crate) fn scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub(crate) fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn colors(mut self, color1: [u8; 4], color2: [u8; 4]) -> Self {
        self.colors = [color1, color2];
        self
    }

    pub(crate) fn textures(mut self, textures: [u16; 4]) -> Self {
        self.textures = textures;
        self
    }

    pub(crate) fn mesh(mut self, mesh: MeshSpec) -> Self {
        self.mesh = Some(mesh);
        self
    }

    fn write(&self, layout: LayoutVariant, out: &mut Vec<u8>) {
        let mut block = vec![0u8; NODE_HEADER_SIZE];
        let name = self.name.as_bytes();
        let name_len = name.len().min(16);
        block[..name_len].copy_from_slice(&name[..name_len]);
        for (i, v) in self.position.iter().enumerate() {
            BigEndian::write_f32(&mut block[0x10 + i * 4..], *v);
        }
        for (i, v) in self.scale.iter().enumerate() {
            BigEndian::write_f32(&mut block[0x20 + i * 4..], *v);
        }
        BigEndian::write_u32(&mut block[layout.flags_offset()..], self.flags);
        block[layout.color1_offset()..][..4].copy_from_slice(&self.colors[0]);
        block[layout.color2_offset()..][..4].copy_from_slice(&self.colors[1]);
        for (i, t) in self.textures.iter().enumerate() {
            BigEndian::write_u16(&mut block[0x40 + i * 2..], *t);
        }
        let mut payload = Vec::new();
        if let Some(mesh) = &self.mesh {
            mesh.write(&mut block, &mut payload);
            payload.resize(align_up(payload.len(), NODE_ALIGNMENT), 0);
        }
        out.extend_from_slice(&block);
        out.extend_from_slice(&payload);
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct NdmBuilder {
    textures: Vec<String>,
    hierarchy: Option<Vec<(Option<u16>, u8)>>,
    node_count_hint: Option<u16>,
    padding: usize,
    nodes: Vec<NodeSpec>,
}

impl NdmBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn texture(mut self, name: &str) -> Self {
        self.textures.push(name.to_owned());
        self
    }

    /// Switch to the hierarchical layout with the given (parent, flags) links.
    pub(crate) fn hierarchical(mut self, links: Vec<(Option<u16>, u8)>) -> Self {
        self.hierarchy = Some(links);
        self
    }

    pub(crate) fn node_count_hint(mut self, hint: u16) -> Self {
        self.node_count_hint = Some(hint);
        self
    }

    /// Zero bytes between the tables and the first node.
    pub(crate) fn padding(mut self, len: usize) -> Self {
        self.padding = len;
        self
    }

    pub(crate) fn node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let layout = if self.hierarchy.is_some() {
            LayoutVariant::Hierarchical
        } else {
            LayoutVariant::Flat
        };
        let hint = self.node_count_hint.unwrap_or_else(|| {
            self.hierarchy
                .as_ref()
                .map_or(self.nodes.len(), Vec::len) as u16
        });

        let mut data = vec![0u8; HEADER_SIZE];
        let table_end = HEADER_SIZE + self.textures.len() * TEXTURE_SLOT_SIZE;
        BigEndian::write_u32(&mut data[0x00..], self.textures.len() as u32);
        BigEndian::write_u32(&mut data[0x04..], table_end as u32);
        BigEndian::write_u32(&mut data[0x08..], u32::from(hint) << 16);
        for name in &self.textures {
            let mut slot = [0u8; TEXTURE_SLOT_SIZE];
            let len = name.len().min(TEXTURE_SLOT_SIZE);
            slot[..len].copy_from_slice(&name.as_bytes()[..len]);
            data.extend_from_slice(&slot);
        }
        if let Some(links) = &self.hierarchy {
            for (parent, flags) in links {
                let mut entry = [0u8; 3];
                BigEndian::write_u16(&mut entry[..2], parent.unwrap_or(0xFFFF));
                entry[2] = *flags;
                data.extend_from_slice(&entry);
            }
            data.resize(align_up(data.len(), NODE_ALIGNMENT), 0);
        }
        data.resize(data.len() + self.padding, 0);
        for node in &self.nodes {
            node.write(layout, &mut data);
        }
        data
    }
}
