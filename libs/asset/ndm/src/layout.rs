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
    header::{FileHeader, HierarchyTable, HIERARCHY_ENTRY_SIZE},
    locate::locate_nodes,
    node::{Node, NodeContext, SetupSizeMode, NODE_ALIGNMENT},
    util::align_up,
};
use anyhow::{bail, Error};
use log::debug;
use std::{fmt, str::FromStr};

// Two revisions of the node header are in circulation. The flat one starts nodes right after
// the texture table and keeps flags at 0x2C and colors at 0x30/0x34. The hierarchical one puts
// a table of 3 byte parent links between the textures and the nodes, and moves flags to 0x34
// and colors to 0x38/0x3C. Files do not say which one they are, so both are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    Flat,
    Hierarchical,
}

impl LayoutVariant {
    pub const ALL: [Self; 2] = [Self::Flat, Self::Hierarchical];

    pub fn flags_offset(self) -> usize {
        match self {
            Self::Flat => 0x2C,
            Self::Hierarchical => 0x34,
        }
    }

    pub fn color1_offset(self) -> usize {
        match self {
            Self::Flat => 0x30,
            Self::Hierarchical => 0x38,
        }
    }

    pub fn color2_offset(self) -> usize {
        match self {
            Self::Flat => 0x34,
            Self::Hierarchical => 0x3C,
        }
    }

    pub fn node_region_start(self, header: &FileHeader) -> usize {
        let textures_end = header.texture_table_end();
        match self {
            Self::Flat => textures_end,
            Self::Hierarchical => align_up(
                textures_end
                    .saturating_add(header.node_count_hint().saturating_mul(HIERARCHY_ENTRY_SIZE)),
                NODE_ALIGNMENT,
            ),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LayoutVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "flat" => Self::Flat,
            "hierarchical" => Self::Hierarchical,
            _ => bail!("unknown layout '{}'; expected flat or hierarchical", s),
        })
    }
}

/// The nodes found by reading a file under one layout.
#[derive(Clone, Debug)]
pub struct LayoutProbe {
    pub variant: LayoutVariant,
    pub nodes: Vec<Node>,
    pub hierarchy: Option<HierarchyTable>,
}

impl LayoutProbe {
    pub fn run(
        data: &[u8],
        header: &FileHeader,
        variant: LayoutVariant,
        setup: SetupSizeMode,
    ) -> Self {
        let context = NodeContext {
            texture_count: header.texture_count() as usize,
            layout: variant,
            setup,
        };
        let hierarchy = match variant {
            LayoutVariant::Flat => None,
            LayoutVariant::Hierarchical => Some(HierarchyTable::from_bytes(
                data,
                header.texture_table_end(),
                header.node_count_hint(),
            )),
        };
        Self {
            variant,
            nodes: locate_nodes(data, variant.node_region_start(header), &context),
            hierarchy,
        }
    }

    pub fn plausible_flags(&self) -> usize {
        self.nodes.iter().filter(|n| n.flags_plausible()).count()
    }

    fn score(&self) -> (usize, bool, usize) {
        let consistent = self
            .hierarchy
            .as_ref()
            .map_or(false, HierarchyTable::is_consistent);
        (self.nodes.len(), consistent, self.plausible_flags())
    }
}

/// Read the file under both layouts and keep the better reading: more nodes first, then a
/// hierarchy table that actually links up, then more recognizable flags. Ties go to flat.
pub fn resolve_layout(data: &[u8], header: &FileHeader, setup: SetupSizeMode) -> LayoutProbe {
    let flat = LayoutProbe::run(data, header, LayoutVariant::Flat, setup);
    let hierarchical = LayoutProbe::run(data, header, LayoutVariant::Hierarchical, setup);
    debug!(
        "layout probe: flat {:?}, hierarchical {:?}",
        flat.score(),
        hierarchical.score()
    );
    if hierarchical.score() > flat.score() {
        hierarchical
    } else {
        flat
    }
}
