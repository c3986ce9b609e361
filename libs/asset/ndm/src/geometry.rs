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
    node::{Node, POSITION_STRIDE, UV_STRIDE},
    util::read_i16,
};
use log::warn;

pub const MAX_VERTEX_COUNT: usize = 100_000;

// Both positions and texture coordinates are signed 8.8 fixed point.
pub const FIXED_POINT_ONE: f32 = 256.0;

fn fixed(data: &[u8], offset: usize) -> Option<f32> {
    read_i16(data, offset).map(|v| f32::from(v) / FIXED_POINT_ONE)
}

/// Read up to `count` positions at `offset`, stopping early at the end of the buffer.
pub fn read_positions(data: &[u8], offset: usize, count: usize) -> Vec<[f32; 3]> {
    let mut out = Vec::with_capacity(count.min(MAX_VERTEX_COUNT));
    for i in 0..count {
        let at = offset.saturating_add(i * POSITION_STRIDE);
        match (fixed(data, at), fixed(data, at + 2), fixed(data, at + 4)) {
            (Some(x), Some(y), Some(z)) => out.push([x, y, z]),
            _ => break,
        }
    }
    out
}

pub fn read_uv_pairs(data: &[u8], offset: usize, count: usize) -> Vec<[f32; 2]> {
    let mut out = Vec::with_capacity(count.min(MAX_VERTEX_COUNT));
    for i in 0..count {
        let at = offset.saturating_add(i * UV_STRIDE);
        match (fixed(data, at), fixed(data, at + 2)) {
            (Some(u), Some(v)) => out.push([u, v]),
            _ => break,
        }
    }
    out
}

/// The node's vertex positions. Empty for nodes without a mesh or with an absurd count.
pub fn read_vertices(data: &[u8], node: &Node) -> Vec<[f32; 3]> {
    let count = node.vertex_count();
    if !node.has_mesh() || count == 0 {
        return Vec::new();
    }
    if count > MAX_VERTEX_COUNT {
        warn!(
            "{}: vertex count {} exceeds {}",
            node.name(),
            count,
            MAX_VERTEX_COUNT
        );
        return Vec::new();
    }
    read_positions(data, node.mesh_data_offset(), count)
}

/// The node's texture coordinates, which sit between the positions and the display list.
pub fn read_uvs(data: &[u8], node: &Node) -> Vec<[f32; 2]> {
    if !node.has_mesh() {
        return Vec::new();
    }
    read_uv_pairs(data, node.uv_data_offset(), node.uv_count())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fixture::{quad3, MeshSpec, NdmBuilder, NodeSpec},
        layout::LayoutVariant,
        node::{Candidate, NodeContext, SetupSizeMode},
    };
    use approx::assert_relative_eq;

    fn first_node(data: &[u8]) -> Node {
        let context = NodeContext {
            texture_count: 0,
            layout: LayoutVariant::Flat,
            setup: SetupSizeMode::BaseRelative,
        };
        match Node::validate(data, 0x20, &context) {
            Candidate::Valid(node) => node,
            Candidate::Invalid(why) => panic!("no node: {}", why),
        }
    }

    #[test]
    fn it_reads_fixed_point() {
        let data = [0x01, 0x00, 0xFF, 0x80, 0x00, 0x40, 0x7F];
        let positions = read_positions(&data, 0, 2);
        assert_eq!(positions.len(), 1);
        assert_relative_eq!(positions[0][0], 1.0);
        assert_relative_eq!(positions[0][1], -0.5);
        assert_relative_eq!(positions[0][2], 0.25);
    }

    #[test]
    fn it_does_not_clamp_uvs() {
        let data = [0x02, 0x00, 0xFE, 0x00];
        let uvs = read_uv_pairs(&data, 0, 1);
        assert_relative_eq!(uvs[0][0], 2.0);
        assert_relative_eq!(uvs[0][1], -2.0);
    }

    #[test]
    fn it_reads_node_geometry() {
        let data = NdmBuilder::new()
            .node(
                NodeSpec::new("plane").mesh(
                    MeshSpec::square()
                        .uvs(&[[0, 0], [256, 0], [256, 256], [0, 256]])
                        .display_list(quad3(0, 1, 2, 3)),
                ),
            )
            .build();
        let node = first_node(&data);
        let vertices = read_vertices(&data, &node);
        assert_eq!(vertices.len(), 4);
        assert_relative_eq!(vertices[2][0], 1.0);
        let uvs = read_uvs(&data, &node);
        assert_eq!(uvs.len(), 4);
        assert_relative_eq!(uvs[2][1], 1.0);
    }

    #[test]
    fn it_returns_partial_geometry_when_truncated() {
        let mut data = NdmBuilder::new()
            .node(NodeSpec::new("cut").mesh(MeshSpec::square().display_list(quad3(0, 1, 2, 3))))
            .build();
        let node = first_node(&data);
        data.truncate(node.mesh_data_offset() + POSITION_STRIDE * 2 + 1);
        assert_eq!(read_vertices(&data, &node).len(), 2);
    }

    #[test]
    fn it_has_no_uvs_without_position_size() {
        let data = NdmBuilder::new()
            .node(
                NodeSpec::new("bare").mesh(
                    MeshSpec::square()
                        .uvs(&[[0, 0], [0, 0], [0, 0], [0, 0]])
                        .position_data_size(0)
                        .display_list(quad3(0, 1, 2, 3)),
                ),
            )
            .build();
        let node = first_node(&data);
        assert!(read_uvs(&data, &node).is_empty());
    }
}
