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
use ndm::{Model, NodeMesh};
use std::{
    collections::{HashMap, HashSet},
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

// Node names are free text; keep them usable as file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

// Hands out file names that are unique within one export, even when a numbered duplicate
// collides with a node that really carries that name.
struct FileNames {
    prefix: String,
    next: HashMap<String, usize>,
    used: HashSet<String>,
}

impl FileNames {
    fn new(prefix: String) -> Self {
        Self {
            prefix,
            next: HashMap::new(),
            used: HashSet::new(),
        }
    }

    fn claim(&mut self, stem: &str) -> String {
        let next = self.next.entry(stem.to_owned()).or_insert(0);
        loop {
            let filename = if *next == 0 {
                format!("{}_{}.obj", self.prefix, stem)
            } else {
                format!("{}_{}_{}.obj", self.prefix, stem, next)
            };
            *next += 1;
            if self.used.insert(filename.clone()) {
                return filename;
            }
        }
    }
}

fn write_obj(out: &mut impl Write, label: &str, mesh: &NodeMesh) -> Result<()> {
    writeln!(out, "# {}", label)?;
    writeln!(out, "o {}", label)?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v[0], v[1], v[2])?;
    }
    for uv in &mesh.uvs {
        writeln!(out, "vt {} {}", uv[0], uv[1])?;
    }
    match &mesh.uv_faces {
        Some(uv_faces) => {
            for (f, t) in mesh.faces.iter().zip(uv_faces) {
                writeln!(
                    out,
                    "f {}/{} {}/{} {}/{}",
                    f[0] + 1,
                    t[0] + 1,
                    f[1] + 1,
                    t[1] + 1,
                    f[2] + 1,
                    t[2] + 1
                )?;
            }
        }
        None => {
            for f in &mesh.faces {
                writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
            }
        }
    }
    Ok(())
}

/// Write one OBJ per mesh node, in node-local coordinates. Returns the files written.
pub fn export_obj(model: &Model, input: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let prefix = input
        .file_stem()
        .map(|s| file_stem(&s.to_string_lossy()))
        .unwrap_or_else(|| "model".to_owned());

    let mut names = FileNames::new(prefix);
    let mut written = Vec::new();
    for (index, node) in model.mesh_nodes() {
        let mesh = match model.mesh(index)? {
            Some(mesh) if !mesh.faces.is_empty() => mesh,
            _ => continue,
        };
        let filename = names.claim(&file_stem(node.name()));

        let path = dir.join(filename);
        let mut out = BufWriter::new(File::create(&path)?);
        write_obj(&mut out, node.name(), mesh)?;
        out.flush()?;
        written.push(path);
    }
    Ok(written)
}
