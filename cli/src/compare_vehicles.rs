//! Checks that several XML files agree on which vehicles exist. Useful as a
//! sanity check before comparing two runs: if the id sets already differ, the
//! metric comparisons will refuse to run.

use std::collections::BTreeSet;

use anyhow::{bail, Result};

use cmputil::prettyprint_usize;

pub fn run(files: Vec<String>) -> Result<()> {
    let mut sets = Vec::new();
    for path in files {
        let ids = vehicle_ids(&path)?;
        println!(
            "{} contains {} vehicles",
            path,
            prettyprint_usize(ids.len())
        );
        sets.push((path, ids));
    }

    let (first_path, first_ids) = &sets[0];
    let mut all_match = true;
    for (path, ids) in &sets[1..] {
        if ids == first_ids {
            continue;
        }
        all_match = false;
        println!(
            "{} doesn't match {}: {} vehicles missing, {} extra",
            path,
            first_path,
            prettyprint_usize(first_ids.difference(ids).count()),
            prettyprint_usize(ids.difference(first_ids).count())
        );
    }

    if all_match {
        println!("All the files contain the same vehicles");
    } else {
        println!("The files do not contain the same vehicles");
    }
    Ok(())
}

/// Every vehicle id in the document, deduplicated.
pub fn vehicle_ids(path: &str) -> Result<BTreeSet<String>> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    let mut ids = BTreeSet::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("vehicle")) {
        match node.attribute("id") {
            Some(id) => {
                ids.insert(id.to_string());
            }
            None => bail!("a vehicle element in {} has no id", path),
        }
    }
    Ok(ids)
}
