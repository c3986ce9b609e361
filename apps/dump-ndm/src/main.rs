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

mod export_csv;
mod export_obj;

use crate::{
    export_csv::{export_csv, node_records},
    export_obj::export_obj,
};
use anyhow::{bail, Context, Result};
use log::LevelFilter;
use ndm::{DecodeOptions, LayoutVariant, Model, Node, SetupSizeMode, Validation};
use reverse::hexdump;
use std::{fs, path::PathBuf};
use structopt::StructOpt;

/// Print contents of NDM files, with various options.
#[derive(Debug, StructOpt)]
#[structopt(name = "dump-ndm", about = "OpenNDM model inspection and export")]
struct Opt {
    /// Trace execution
    #[structopt(short, long)]
    verbose: bool,

    /// Show decoded geometry for each node
    #[structopt(short, long)]
    meshes: bool,

    /// List every draw command; implies --meshes
    #[structopt(short, long)]
    commands: bool,

    /// Hex dump node headers
    #[structopt(short = "x", long)]
    hex: bool,

    /// Only show the node with this name or index
    #[structopt(short, long)]
    node: Option<String>,

    /// Accept draw commands with only a quarter of their references in range
    #[structopt(long)]
    lenient: bool,

    /// Do not retry leniently when strict decoding finds no faces
    #[structopt(long)]
    no_retry: bool,

    /// Treat the setup size field as an absolute byte count
    #[structopt(long)]
    setup_absolute: bool,

    /// Force the node layout: flat or hierarchical
    #[structopt(long)]
    layout: Option<LayoutVariant>,

    /// Write a row per node to this CSV file
    #[structopt(long, parse(from_os_str))]
    csv: Option<PathBuf>,

    /// Write a Wavefront OBJ per mesh node into this directory
    #[structopt(long, parse(from_os_str))]
    obj: Option<PathBuf>,

    /// One or more NDM files to process
    #[structopt(parse(from_os_str))]
    inputs: Vec<PathBuf>,
}

impl Opt {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            validation: if self.lenient {
                Validation::Lenient
            } else {
                Validation::Strict
            },
            lenient_retry: !self.no_retry,
            setup_size: if self.setup_absolute {
                SetupSizeMode::Absolute
            } else {
                SetupSizeMode::BaseRelative
            },
            layout: self.layout,
        }
    }
}

fn selected_nodes(model: &Model, filter: Option<&str>) -> Result<Vec<usize>> {
    let filter = match filter {
        Some(filter) => filter,
        None => return Ok((0..model.nodes().len()).collect()),
    };
    if let Ok(index) = filter.parse::<usize>() {
        model.node(index)?;
        return Ok(vec![index]);
    }
    match model.find_node(filter) {
        Some((index, _)) => Ok(vec![index]),
        None => bail!("no node named '{}'", filter),
    }
}

fn header_lines(model: &Model) -> Vec<String> {
    let header = model.header();
    let mut lines = vec![
        format!(
            "header:      textures:{}  table end:{:08X} (computed {:08X})",
            header.texture_count(),
            header.declared_table_end(),
            header.texture_table_end()
        ),
        format!(
            "             packed:{:08X}  extra:{:08X}",
            header.packed_word(),
            header.extra_word()
        ),
    ];
    if let Some(hierarchy) = model.hierarchy() {
        lines.push(format!(
            "hierarchy:   {} entries @{:08X}",
            hierarchy.len(),
            hierarchy.offset()
        ));
        for (i, entry) in hierarchy.entries().iter().enumerate() {
            let parent = entry
                .parent
                .map_or_else(|| "root".to_owned(), |p| p.to_string());
            lines.push(format!(
                "  {:3}: parent:{:4}  flags:{:02X}",
                i, parent, entry.flags
            ));
        }
    }
    lines
}

fn show_node(opt: &Opt, model: &Model, index: usize, node: &Node) -> Result<()> {
    let p = node.position();
    println!(
        "{:3}: {:16} @{:08X}  flags:{:08X}  pos:({:.2}, {:.2}, {:.2})  mesh:{}",
        index,
        node.name(),
        node.offset(),
        node.flags(),
        p[0],
        p[1],
        p[2],
        node.has_mesh()
    );
    let textures = model
        .texture_names(node)
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    if !textures.is_empty() {
        println!("     textures: {}", textures.join(", "));
    }
    if opt.hex {
        for line in hexdump(model.node_bytes(node), node.offset()) {
            println!("     {}", line);
        }
    }
    if !(opt.meshes || opt.commands) {
        return Ok(());
    }
    let mesh = match model.mesh(index)? {
        Some(mesh) => mesh,
        None => return Ok(()),
    };
    println!(
        "     vertices: {}  uvs: {}  faces: {}  uv faces: {}",
        mesh.vertices.len(),
        mesh.uvs.len(),
        mesh.faces.len(),
        mesh.uv_faces
            .as_ref()
            .map_or_else(|| "-".to_owned(), |f| f.len().to_string())
    );
    if let Some(format) = mesh.report.ref_format {
        println!(
            "     refs: {} ({:?}, {:?})  validation: {:?}  rejected opcodes: {}",
            format.width,
            format.rule,
            format.confidence(),
            mesh.report.validation,
            mesh.report.rejected_opcodes
        );
    }
    if let Some((lo, hi)) = mesh.bounds() {
        println!("     bounds: {:?} - {:?}", lo, hi);
    }
    for warning in &mesh.report.warnings {
        println!("     warning: {}", warning);
    }
    if opt.commands {
        for cmd in &mesh.report.commands {
            println!(
                "       {:08X} {:9} {:5}/{:<5} -> {} triangles",
                cmd.offset,
                cmd.primitive.name(),
                cmd.decoded,
                cmd.declared,
                cmd.triangles
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut logger = env_logger::Builder::from_default_env();
    if opt.verbose {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.init();

    if opt.inputs.is_empty() {
        println!("No inputs found!");
        return Ok(());
    }

    let options = opt.decode_options();
    let mut records = Vec::new();
    for path in &opt.inputs {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let model = match Model::from_bytes_with_options(&data, options) {
            Ok(model) => model,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                continue;
            }
        };

        println!("{} =>", path.display());
        for line in header_lines(&model) {
            println!("{}", line);
        }
        println!("textures:    {}", model.textures().len());
        for (i, name) in model.textures().iter().enumerate() {
            println!("  {:3}: {}", i, name);
        }
        println!("layout:      {}", model.layout());
        println!(
            "nodes:       {} (header hints {})",
            model.nodes().len(),
            model.header().node_count_hint()
        );
        if opt.meshes || opt.commands {
            model.decode_all();
        }
        for index in selected_nodes(&model, opt.node.as_deref())? {
            show_node(&opt, &model, index, model.node(index)?)?;
        }

        if opt.csv.is_some() {
            records.extend(node_records(path, &model)?);
        }
        if let Some(dir) = &opt.obj {
            for written in export_obj(&model, path, dir)? {
                println!("wrote {}", written.display());
            }
        }
        println!();
    }

    if let Some(output) = &opt.csv {
        export_csv(&records, output)?;
    }
    Ok(())
}
