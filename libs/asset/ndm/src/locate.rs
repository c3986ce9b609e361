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

use crate::node::{Candidate, Node, NodeContext, NODE_ALIGNMENT, NODE_HEADER_SIZE};
use crate::util::align_up;
use log::trace;

/// Walk the node region from `start`, collecting every block that validates as a node header.
///
/// After a mesh node the walk jumps over its vertex data and display list, otherwise it moves on
/// one header (for plain nodes) or one alignment step (for rejected candidates).
pub fn locate_nodes(data: &[u8], start: usize, context: &NodeContext) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut offset = align_up(start, NODE_ALIGNMENT);
    while offset
        .checked_add(NODE_HEADER_SIZE)
        .map_or(false, |end| end <= data.len())
    {
        match Node::validate(data, offset, context) {
            Candidate::Valid(node) => {
                trace!(
                    "node {} '{}' at {:08X}, mesh: {}",
                    nodes.len(),
                    node.name(),
                    offset,
                    node.has_mesh()
                );
                offset = node.next_block_offset();
                nodes.push(node);
            }
            Candidate::Invalid(_) => offset += NODE_ALIGNMENT,
        }
    }
    nodes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fixture::{quad3, MeshSpec, NdmBuilder, NodeSpec},
        layout::LayoutVariant,
        node::SetupSizeMode,
    };

    fn context(texture_count: usize) -> NodeContext {
        NodeContext {
            texture_count,
            layout: LayoutVariant::Flat,
            setup: SetupSizeMode::BaseRelative,
        }
    }

    #[test]
    fn it_finds_nothing_in_an_empty_region() {
        let data = NdmBuilder::new().build();
        assert!(locate_nodes(&data, 0x20, &context(0)).is_empty());
    }

    #[test]
    fn it_skips_over_mesh_payloads() {
        let data = NdmBuilder::new()
            .texture("skin.tex")
            .node(NodeSpec::new("root"))
            .node(NodeSpec::new("body").mesh(MeshSpec::square().display_list(quad3(0, 1, 2, 3))))
            .node(NodeSpec::new("tail"))
            .build();
        let nodes = locate_nodes(&data, 0x30, &context(1));
        let names = nodes.iter().map(|n| n.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["root", "body", "tail"]);
        assert_eq!(nodes[0].offset(), 0x30);
        assert_eq!(nodes[1].offset(), 0xB0);
        assert_eq!(nodes[2].offset(), nodes[1].next_block_offset());
        for pair in nodes.windows(2) {
            assert!(pair[0].offset() < pair[1].offset());
        }
    }

    #[test]
    fn it_steps_past_garbage() {
        let data = NdmBuilder::new()
            .padding(0x30)
            .node(NodeSpec::new("late"))
            .build();
        let nodes = locate_nodes(&data, 0x20, &context(0));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].offset(), 0x50);
    }

    #[test]
    fn it_ignores_truncated_trailing_blocks() {
        let mut data = NdmBuilder::new().node(NodeSpec::new("whole")).build();
        let mut partial = NdmBuilder::new().node(NodeSpec::new("part")).build();
        partial.drain(..0x20);
        partial.truncate(NODE_HEADER_SIZE - 1);
        data.extend_from_slice(&partial);
        let nodes = locate_nodes(&data, 0x20, &context(0));
        assert_eq!(nodes.len(), 1);
    }
}
