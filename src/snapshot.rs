use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::protocol::{NetworkState, RoutingTable};

/// Writes `routing-output<LABEL>.txt` files, one per node.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, table: &RoutingTable) -> PathBuf {
        self.dir.join(format!("routing-output{}.txt", table.owner()))
    }

    /// Truncates every node's file and writes its starting table.
    pub fn initialize(&self, network: &NetworkState) -> io::Result<()> {
        for table in network.tables() {
            let mut out = BufWriter::new(File::create(self.path_for(table))?);
            write_snapshot(&mut out, table)?;
            out.flush()?;
        }
        Ok(())
    }

    pub fn append(&self, table: &RoutingTable) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(table))?;
        let mut out = BufWriter::new(file);
        write_snapshot(&mut out, table)?;
        out.flush()
    }
}

fn write_snapshot(out: &mut impl Write, table: &RoutingTable) -> io::Result<()> {
    writeln!(out, "Timestamp: {}", Local::now().to_rfc3339())?;
    writeln!(out, "Destination, Cost, Outgoing Port, Destination Port")?;
    for (_, entry) in table.iter() {
        writeln!(
            out,
            "{} {} {} {}",
            entry.via.map_or('-', |via| via.label()),
            entry.cost,
            entry.outgoing.map_or(0, |a| a.0),
            entry.destination.map_or(0, |a| a.0),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Topology;
    use crate::types::{AddressPlan, NodeId};

    #[test]
    fn test_initialize_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("out")).unwrap();
        let plan = AddressPlan::default();
        let state = Topology::undirected(2, &[(0, 1, 5)]).initial_state(&plan);

        writer.initialize(&state).unwrap();
        let path = writer.path_for(state.table(NodeId(0)));
        assert!(path.ends_with("routing-outputA.txt"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("Timestamp: "));
        assert_eq!(lines[1], "Destination, Cost, Outgoing Port, Destination Port");
        assert_eq!(lines[2], "A 0 10000 10000");
        assert_eq!(lines[3], "B 5 10001 10001");

        writer.append(state.table(NodeId(0))).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Timestamp: ").count(), 2);
        assert!(writer.path_for(state.table(NodeId(1))).exists());
    }

    #[test]
    fn test_unreachable_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path()).unwrap();
        let state = Topology::new(2).initial_state(&AddressPlan::default());
        writer.initialize(&state).unwrap();

        let content = fs::read_to_string(writer.path_for(state.table(NodeId(1)))).unwrap();
        assert!(content.lines().any(|line| line == "- inf 0 0"));
    }
}
