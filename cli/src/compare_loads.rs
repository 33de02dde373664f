//! Checks that several loads-matrix folders describe the same simulation:
//! step by step, every edge must carry exactly the same load.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Result};

use cmputil::prettyprint_usize;

pub fn run(folders: Vec<String>) -> Result<()> {
    let steps = cmputil::list_dir(&folders[0])?.len();
    // Light matrices use a different extension, detectable from the folder name
    let name = folder_name(&folders[0]);
    let extension = if name.starts_with("light") {
        ".llm.xml"
    } else {
        ".lm.xml"
    };

    for step in 0..steps {
        let mut first: Option<(String, BTreeMap<String, String>)> = None;
        for folder in &folders {
            let path = format!("{}/step_{}{}", folder.trim_end_matches('/'), step, extension);
            let loads = edge_loads(&path)?;
            match &first {
                None => first = Some((path, loads)),
                Some((first_path, first_loads)) => {
                    if loads != *first_loads {
                        println!(
                            "The loads matrices differ at step {}: {} vs {}",
                            step, first_path, path
                        );
                        return Ok(());
                    }
                }
            }
        }
    }

    println!(
        "All the folders contain the same loads across {} steps",
        prettyprint_usize(steps)
    );
    Ok(())
}

/// Per-edge load, kept as the raw attribute text; two matrices only count as
/// equal when the files agree exactly.
fn edge_loads(path: &str) -> Result<BTreeMap<String, String>> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    let mut loads = BTreeMap::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("edge")) {
        match node.attribute("id") {
            Some(id) => {
                loads.insert(
                    id.to_string(),
                    node.attribute("load").unwrap_or("").to_string(),
                );
            }
            None => bail!("an edge element in {} has no id", path),
        }
    }
    Ok(loads)
}

fn folder_name(path: &str) -> String {
    Path::new(path.trim_end_matches('/'))
        .file_name()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
