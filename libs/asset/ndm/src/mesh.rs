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
    display_list::{DecodedList, DisplayListDecoder, DrawCommand, OutOfRange, Validation},
    format::{detect_ref_format, Confidence, RefFormat},
    geometry::{read_uvs, read_vertices, MAX_VERTEX_COUNT},
    node::Node,
    options::DecodeOptions,
};
use log::{debug, warn};
use std::fmt;

/// Something odd about a node's geometry that did not stop it from decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshWarning {
    ImplausibleVertexCount { count: usize },
    TruncatedVertices { expected: usize, found: usize },
    TruncatedUvs { expected: usize, found: usize },
    UnverifiedRefWidth,
    LenientRetry,
    IndexOutOfRange(OutOfRange),
    UvIndexOutOfRange { index: u32, limit: usize },
    VerticesWithoutFaces { vertices: usize },
}

impl fmt::Display for MeshWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ImplausibleVertexCount { count } => {
                write!(f, "vertex count {} is over {}", count, MAX_VERTEX_COUNT)
            }
            Self::TruncatedVertices { expected, found } => {
                write!(f, "expected {} vertices, file holds {}", expected, found)
            }
            Self::TruncatedUvs { expected, found } => {
                write!(f, "expected {} uvs, file holds {}", expected, found)
            }
            Self::UnverifiedRefWidth => write!(f, "reference width is a guess"),
            Self::LenientRetry => write!(f, "faces only found with lenient validation"),
            Self::IndexOutOfRange(oor) => write!(
                f,
                "vertex index {} at {:08X} is past {} vertices",
                oor.index, oor.offset, oor.limit
            ),
            Self::UvIndexOutOfRange { index, limit } => write!(
                f,
                "uv index {} is past {} uvs; uv faces dropped",
                index, limit
            ),
            Self::VerticesWithoutFaces { vertices } => {
                write!(f, "{} vertices but no faces", vertices)
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshReport {
    /// Absent when there were no vertices to reference.
    pub ref_format: Option<RefFormat>,
    pub validation: Validation,
    pub commands: Vec<DrawCommand>,
    pub rejected_opcodes: usize,
    pub warnings: Vec<MeshWarning>,
}

/// Decoded geometry for one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeMesh {
    pub vertices: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub faces: Vec<[u32; 3]>,
    /// Present only when there are uvs and every index is inside them.
    pub uv_faces: Option<Vec<[u32; 3]>>,
    pub report: MeshReport,
}

impl NodeMesh {
    pub fn decode(data: &[u8], node: &Node, options: &DecodeOptions) -> Self {
        let mut mesh = Self::default();
        let expected = node.vertex_count();
        if expected > MAX_VERTEX_COUNT {
            mesh.report
                .warnings
                .push(MeshWarning::ImplausibleVertexCount { count: expected });
        }

        mesh.vertices = read_vertices(data, node);
        if expected <= MAX_VERTEX_COUNT && mesh.vertices.len() < expected {
            mesh.report.warnings.push(MeshWarning::TruncatedVertices {
                expected,
                found: mesh.vertices.len(),
            });
        }
        mesh.uvs = read_uvs(data, node);
        if mesh.uvs.len() < node.uv_count() {
            mesh.report.warnings.push(MeshWarning::TruncatedUvs {
                expected: node.uv_count(),
                found: mesh.uvs.len(),
            });
        }
        if mesh.vertices.is_empty() {
            mesh.report.validation = options.validation;
            mesh.log_warnings(node);
            return mesh;
        }

        let range = node.decode_range();
        let vertex_count = mesh.vertices.len();
        let format = detect_ref_format(data, range.clone(), vertex_count);
        if format.confidence() == Confidence::Unverified {
            mesh.report.warnings.push(MeshWarning::UnverifiedRefWidth);
        }
        let decode = |validation| {
            DisplayListDecoder::new(
                data,
                range.clone(),
                format.width,
                vertex_count,
                validation,
            )
            .decode()
        };
        let mut validation = options.validation;
        let mut decoded = decode(validation);
        if decoded.triangles.is_empty()
            && validation == Validation::Strict
            && options.lenient_retry
        {
            let retry = decode(Validation::Lenient);
            if !retry.triangles.is_empty() {
                debug!("{}: faces recovered by lenient retry", node.name());
                validation = Validation::Lenient;
                decoded = retry;
                mesh.report.warnings.push(MeshWarning::LenientRetry);
            }
        }
        mesh.report.ref_format = Some(format);
        mesh.report.validation = validation;
        mesh.apply(decoded);
        mesh.log_warnings(node);
        mesh
    }

    fn apply(&mut self, decoded: DecodedList) {
        let DecodedList {
            triangles,
            uv_triangles,
            commands,
            rejected_opcodes,
            out_of_range,
        } = decoded;
        self.report.commands = commands;
        self.report.rejected_opcodes = rejected_opcodes;
        self.report.warnings.extend(
            out_of_range
                .into_iter()
                .map(MeshWarning::IndexOutOfRange),
        );

        if !self.uvs.is_empty() {
            let limit = self.uvs.len();
            match uv_triangles.iter().flatten().find(|&&i| i as usize >= limit) {
                Some(&index) => self
                    .report
                    .warnings
                    .push(MeshWarning::UvIndexOutOfRange { index, limit }),
                None => self.uv_faces = Some(uv_triangles),
            }
        }
        if triangles.is_empty() {
            self.report.warnings.push(MeshWarning::VerticesWithoutFaces {
                vertices: self.vertices.len(),
            });
        }
        self.faces = triangles;
    }

    fn log_warnings(&self, node: &Node) {
        for warning in &self.report.warnings {
            warn!("{} at {:08X}: {}", node.name(), node.offset(), warning);
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_warnings(&self) -> bool {
        !self.report.warnings.is_empty()
    }

    /// Axis aligned bounds of the vertices, in model units.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let (first, rest) = self.vertices.split_first()?;
        let mut lo = *first;
        let mut hi = *first;
        for v in rest {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v[axis]);
                hi[axis] = hi[axis].max(v[axis]);
            }
        }
        Some((lo, hi))
    }
}
