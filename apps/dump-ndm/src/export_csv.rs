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

use anyhow::Result;
use csv::WriterBuilder;
use ndm::Model;
use reverse::excerpt;
use serde::Serialize;
use std::path::Path;

/// One row per node.
#[derive(Debug, Serialize)]
pub struct NodeRecord {
    pub file: String,
    pub index: usize,
    pub name: String,

    // File offset of the node header, in hex.
    pub offset: String,
    pub flags: String,
    pub has_mesh: bool,
    pub textures: String,

    pub vertices: usize,
    pub uvs: usize,
    pub faces: usize,
    pub uv_faces: Option<usize>,

    // Reference width in bytes and how sure we are of it.
    pub ref_width: Option<usize>,
    pub rule: String,
    pub confidence: String,

    pub commands: usize,
    pub rejected_opcodes: usize,
    pub warnings: String,

    // First 16 bytes of the display list after the setup prefix.
    pub display_list_head: String,
}

pub fn node_records(file: &Path, model: &Model) -> Result<Vec<NodeRecord>> {
    let meshes = model.decode_all();
    let mut records = Vec::with_capacity(model.nodes().len());
    for (index, (node, mesh)) in model.nodes().iter().zip(meshes).enumerate() {
        let textures = model
            .texture_names(node)
            .into_iter()
            .map(|name| name.unwrap_or("-"))
            .collect::<Vec<_>>()
            .join(" ");
        let format = mesh.and_then(|m| m.report.ref_format);
        let decode_range = node.decode_range();
        let head = if node.has_mesh() {
            excerpt(model.data(), decode_range.start, 16)
        } else {
            String::new()
        };
        records.push(NodeRecord {
            file: file.display().to_string(),
            index,
            name: node.name().to_owned(),
            offset: format!("{:08X}", node.offset()),
            flags: format!("{:08X}", node.flags()),
            has_mesh: node.has_mesh(),
            textures,
            vertices: mesh.map_or(0, |m| m.vertices.len()),
            uvs: mesh.map_or(0, |m| m.uvs.len()),
            faces: mesh.map_or(0, |m| m.faces.len()),
            uv_faces: mesh.and_then(|m| m.uv_faces.as_ref().map(Vec::len)),
            ref_width: format.map(|f| f.width.bytes()),
            rule: format.map(|f| format!("{:?}", f.rule)).unwrap_or_default(),
            confidence: format
                .map(|f| format!("{:?}", f.confidence()))
                .unwrap_or_default(),
            commands: mesh.map_or(0, |m| m.report.commands.len()),
            rejected_opcodes: mesh.map_or(0, |m| m.report.rejected_opcodes),
            warnings: mesh
                .map(|m| {
                    m.report
                        .warnings
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default(),
            display_list_head: head,
        });
    }
    Ok(records)
}

pub fn export_csv(records: &[NodeRecord], output: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(output)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
