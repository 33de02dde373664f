//! Stream-rewrites a SUMO .rou.xml, dropping every vehicle that a vehroute
//! output file doesn't mention. The route files can be much bigger than the
//! scaled-down scenario, so this never loads the whole document.

use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use cmputil::prettyprint_usize;

use crate::compare_vehicles::vehicle_ids;

pub fn run(sumorou: &str, vehroute: &str, output: Option<String>) -> Result<()> {
    let keep = vehicle_ids(vehroute)?;
    let out_path = pick_output_name(output);

    let mut reader = Reader::from_file(sumorou)?;
    let mut writer = Writer::new(std::io::BufWriter::new(fs_err::File::create(&out_path)?));

    let mut kept = 0;
    let mut dropped = 0;
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    loop {
        let event = match reader.read_event(&mut buf) {
            Ok(ev) => ev,
            Err(err) => bail!(
                "XML error in {} at position {}: {}",
                sumorou,
                reader.buffer_position(),
                err
            ),
        };
        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.name() == b"vehicle" => {
                if keep.contains(&vehicle_id(&reader, e, sumorou)?) {
                    kept += 1;
                    writer.write_event(&event)?;
                } else {
                    dropped += 1;
                    let name = e.name().to_vec();
                    skip_buf.clear();
                    reader.read_to_end(name, &mut skip_buf)?;
                }
            }
            Event::Empty(ref e) if e.name() == b"vehicle" => {
                if keep.contains(&vehicle_id(&reader, e, sumorou)?) {
                    kept += 1;
                    writer.write_event(&event)?;
                } else {
                    dropped += 1;
                }
            }
            _ => {
                writer.write_event(&event)?;
            }
        }
        buf.clear();
    }

    writer.into_inner().flush()?;

    println!(
        "Wrote {} ({} vehicles kept, {} dropped)",
        out_path,
        prettyprint_usize(kept),
        prettyprint_usize(dropped)
    );
    Ok(())
}

fn vehicle_id<R: BufRead>(reader: &Reader<R>, e: &BytesStart, path: &str) -> Result<String> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key == b"id" {
            return Ok(attr.unescape_and_decode_value(reader)?);
        }
    }
    bail!("a vehicle element in {} has no id", path)
}

fn pick_output_name(requested: Option<String>) -> String {
    let mut name = match requested {
        Some(x) => x,
        None => {
            let mut candidate = "sumorou_created.rou.xml".to_string();
            let mut i = 0;
            while cmputil::file_exists(&candidate) {
                candidate = format!("sumorou_created_{}.rou.xml", i);
                i += 1;
            }
            candidate
        }
    };
    if !name.ends_with(".rou.xml") {
        name = format!("{}.rou.xml", name);
    }
    name
}
