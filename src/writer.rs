use crate::{
    error::{GraphError, Result},
    graph::NodeEntry,
};
use serde::Serialize;
use std::{
    fs,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::info;

/// Writes an edge list as a JSON array of pairs.
pub fn write_edges<T: Serialize>(path: impl AsRef<Path>, edges: &[[T; 2]]) -> Result<()> {
    let path = path.as_ref();
    write_json(path, edges)?;
    info!(target: "solver_graph", "{} edges saved at {}", edges.len(), path.display());
    Ok(())
}

/// Writes the node-index table as `[{"node_id": .., "prob_id": ..}, ..]`.
pub fn write_nodes(path: impl AsRef<Path>, nodes: &[NodeEntry]) -> Result<()> {
    let path = path.as_ref();
    write_json(path, nodes)?;
    info!(target: "solver_graph", "{} nodes saved at {}", nodes.len(), path.display());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let write_err = |source| GraphError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(fs::File::create(path).map_err(write_err)?);
    serde_json::to_writer(&mut writer, value).map_err(|err| write_err(err.into()))?;
    writer.flush().map_err(write_err)
}
