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

// NDM files hold a tree of named nodes, some of which carry a mesh. Everything is big endian.
//
// 0x00  u32  texture count
// 0x04  u32  end of the texture table (not trusted)
// 0x08  u32  packed word; the upper half holds a node count hint
// 0x0C  u32  unknown
// 0x20       texture table: 16 byte NUL padded names
//            [hierarchy table: 3 bytes per node, in the hierarchical revision]
//            nodes, each a 128 byte header at a 16 byte aligned offset
//
// A mesh node's header is followed by its vertex data (positions, then texture coordinates, all
// 8.8 fixed point) and then its display list. Nothing frames the node region, so nodes are found
// by sliding over it and keeping blocks whose header looks sane.
mod error;
mod locate;
mod options;
mod util;

pub mod display_list;
pub mod format;
pub mod geometry;
pub mod header;
pub mod layout;
pub mod mesh;
pub mod node;

#[cfg(test)]
mod fixture;

pub use crate::{
    display_list::{DrawCommand, Primitive, Validation},
    error::NdmError,
    format::{Confidence, DetectionRule, RefFormat, RefWidth},
    header::{FileHeader, HierarchyEntry, HierarchyTable, TextureTable},
    layout::LayoutVariant,
    locate::locate_nodes,
    mesh::{MeshReport, MeshWarning, NodeMesh},
    node::{Node, SetupSizeMode},
    options::DecodeOptions,
};

use crate::layout::{resolve_layout, LayoutProbe};
use anyhow::{ensure, Result};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use rayon::prelude::*;

/// A parsed NDM file. Node headers are decoded up front; geometry is decoded on first use and
/// cached per node.
pub struct Model<'a> {
    data: &'a [u8],
    header: FileHeader,
    textures: TextureTable,
    layout: LayoutVariant,
    hierarchy: Option<HierarchyTable>,
    nodes: Vec<Node>,
    meshes: Vec<OnceCell<Option<NodeMesh>>>,
    options: DecodeOptions,
}

impl<'a> Model<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, DecodeOptions::default())
    }

    pub fn from_bytes_with_options(data: &'a [u8], options: DecodeOptions) -> Result<Self> {
        let header = FileHeader::from_bytes(data)?;
        let textures = TextureTable::from_bytes(data, &header);
        let LayoutProbe {
            variant,
            nodes,
            hierarchy,
        } = match options.layout {
            Some(variant) => LayoutProbe::run(data, &header, variant, options.setup_size),
            None => resolve_layout(data, &header, options.setup_size),
        };
        if nodes.is_empty() {
            warn!("no nodes found in {} bytes", data.len());
        } else if nodes.len() != header.node_count_hint() {
            debug!(
                "found {} nodes, header hints at {}",
                nodes.len(),
                header.node_count_hint()
            );
        }
        let meshes = nodes.iter().map(|_| OnceCell::new()).collect();
        Ok(Self {
            data,
            header,
            textures,
            layout: variant,
            hierarchy,
            nodes,
            meshes,
            options,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn textures(&self) -> &TextureTable {
        &self.textures
    }

    pub fn layout(&self) -> LayoutVariant {
        self.layout
    }

    pub fn hierarchy(&self) -> Option<&HierarchyTable> {
        self.hierarchy.as_ref()
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Result<&Node> {
        ensure!(
            index < self.nodes.len(),
            NdmError::NodeOutOfRange {
                index,
                count: self.nodes.len()
            }
        );
        Ok(&self.nodes[index])
    }

    pub fn find_node(&self, name: &str) -> Option<(usize, &Node)> {
        self.nodes.iter().enumerate().find(|(_, n)| n.name() == name)
    }

    pub fn mesh_nodes(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate().filter(|(_, n)| n.has_mesh())
    }

    /// Names of the textures bound in each of the node's slots.
    pub fn texture_names(&self, node: &Node) -> Vec<Option<&str>> {
        node.texture_indices()
            .iter()
            .map(|slot| slot.and_then(|i| self.textures.get(i)))
            .collect()
    }

    /// The raw 128 byte header of a node.
    pub fn node_bytes(&self, node: &Node) -> &'a [u8] {
        let range = node.block_range();
        &self.data[range.start.min(self.data.len())..range.end.min(self.data.len())]
    }

    fn decode_node(&self, node: &Node) -> Option<NodeMesh> {
        node.has_mesh()
            .then(|| NodeMesh::decode(self.data, node, &self.options))
    }

    /// Geometry for the node at `index`, or None if it has no mesh.
    pub fn mesh(&self, index: usize) -> Result<Option<&NodeMesh>> {
        let node = self.node(index)?;
        Ok(self.meshes[index]
            .get_or_init(|| self.decode_node(node))
            .as_ref())
    }

    /// Decode every node's geometry in parallel; results are in node order.
    pub fn decode_all(&self) -> Vec<Option<&NodeMesh>> {
        self.nodes
            .par_iter()
            .zip(self.meshes.par_iter())
            .map(|(node, cell)| cell.get_or_init(|| self.decode_node(node)).as_ref())
            .collect()
    }
}
