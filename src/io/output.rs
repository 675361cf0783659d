use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use log::info;
use serde_json::json;

use super::AXIS_NAMES;
use crate::config::NUM_DIMENSIONS;
use crate::error::Result;
use crate::simulation::Simulation;

const BINARY_MAGIC: &[u8; 4] = b"SPDR";
const BINARY_VERSION: u32 = 1;

/// Writes one CSV file per snapshot plus, once per run, a
/// metadata.json describing the columns. Binary snapshots mirror the
/// CSV payload in packed little-endian records behind a fixed header.
pub struct OutputWriter {
    directory: PathBuf,
    binary: bool,
    snapshot_index: usize,
    metadata_written: bool,
}

struct Column {
    name: String,
    unit: &'static str,
    description: &'static str,
}

fn columns() -> Vec<Column> {
    let mut columns = vec![Column {
        name: "time".into(),
        unit: "code time",
        description: "simulation time of the snapshot",
    }];
    for axis in &AXIS_NAMES[..NUM_DIMENSIONS] {
        columns.push(Column {
            name: format!("pos_{}", axis),
            unit: "code length",
            description: "particle position",
        });
    }
    for axis in &AXIS_NAMES[..NUM_DIMENSIONS] {
        columns.push(Column {
            name: format!("vel_{}", axis),
            unit: "code velocity",
            description: "particle velocity",
        });
    }
    for (name, description) in [
        ("dens", "mass density"),
        ("pres", "thermodynamic pressure"),
        ("ene", "specific internal energy"),
        ("mass", "particle mass"),
        ("sml", "smoothing length"),
    ] {
        columns.push(Column {
            name: name.into(),
            unit: "code units",
            description,
        });
    }
    columns
}

impl OutputWriter {
    pub fn new(directory: PathBuf, binary: bool) -> Self {
        Self {
            directory,
            binary,
            snapshot_index: 0,
            metadata_written: false,
        }
    }

    /// Index the next snapshot will get; checkpoints record it so a
    /// resumed run continues the numbering.
    pub fn set_snapshot_index(&mut self, index: usize) {
        self.snapshot_index = index;
    }

    pub fn snapshot_index(&self) -> usize {
        self.snapshot_index
    }

    fn write_metadata(&self, simulation: &Simulation) -> Result<()> {
        let columns: Vec<_> = columns()
            .iter()
            .map(|column| {
                json!({
                    "name": column.name,
                    "unit": column.unit,
                    "description": column.description,
                })
            })
            .collect();
        let metadata = json!({
            "units": "code",
            "dimension": NUM_DIMENSIONS,
            "particle_count": simulation.particles.len(),
            "columns": columns,
        });
        let file = File::create(self.directory.join("metadata.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &metadata)?;
        Ok(())
    }

    pub fn write_snapshot(&mut self, simulation: &Simulation) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        if !self.metadata_written {
            self.write_metadata(simulation)?;
            self.metadata_written = true;
        }
        self.write_csv(simulation)?;
        if self.binary {
            self.write_binary(simulation)?;
        }
        info!(
            "wrote snapshot {} at t = {:.6e}",
            self.snapshot_index, simulation.t
        );
        self.snapshot_index += 1;
        Ok(())
    }

    fn write_csv(&self, simulation: &Simulation) -> Result<()> {
        let path = self
            .directory
            .join(format!("snapshot_{:04}.csv", self.snapshot_index));
        let mut writer = BufWriter::new(File::create(path)?);
        let names: Vec<_> = columns().into_iter().map(|column| column.name).collect();
        writeln!(writer, "{}", names.join(","))?;
        for particle in simulation.particles.iter() {
            write!(writer, "{:.12e}", simulation.t)?;
            for axis in 0..NUM_DIMENSIONS {
                write!(writer, ",{:.12e}", particle.pos[axis])?;
            }
            for axis in 0..NUM_DIMENSIONS {
                write!(writer, ",{:.12e}", particle.vel[axis])?;
            }
            writeln!(
                writer,
                ",{:.12e},{:.12e},{:.12e},{:.12e},{:.12e}",
                particle.dens, particle.pres, particle.ene, particle.mass, particle.sml
            )?;
        }
        Ok(())
    }

    fn write_binary(&self, simulation: &Simulation) -> Result<()> {
        let path = self
            .directory
            .join(format!("snapshot_{:04}.bin", self.snapshot_index));
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(BINARY_MAGIC)?;
        writer.write_all(&BINARY_VERSION.to_le_bytes())?;
        writer.write_all(&(NUM_DIMENSIONS as u8).to_le_bytes())?;
        writer.write_all(&(simulation.particles.len() as u64).to_le_bytes())?;
        writer.write_all(&simulation.t.to_le_bytes())?;
        for particle in simulation.particles.iter() {
            for axis in 0..NUM_DIMENSIONS {
                writer.write_all(&particle.pos[axis].to_le_bytes())?;
            }
            for axis in 0..NUM_DIMENSIONS {
                writer.write_all(&particle.vel[axis].to_le_bytes())?;
            }
            for value in [
                particle.dens,
                particle.pres,
                particle.ene,
                particle.mass,
                particle.sml,
            ] {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::OutputWriter;
    use crate::config::NUM_DIMENSIONS;
    use crate::test_utils::build_lattice_simulation;

    #[test]
    fn snapshot_files_and_metadata_are_written() {
        let directory = tempfile::tempdir().unwrap();
        let simulation = build_lattice_simulation(3);
        let mut writer = OutputWriter::new(directory.path().into(), true);
        writer.write_snapshot(&simulation).unwrap();
        writer.write_snapshot(&simulation).unwrap();
        assert!(directory.path().join("metadata.json").exists());
        assert!(directory.path().join("snapshot_0000.csv").exists());
        assert!(directory.path().join("snapshot_0001.csv").exists());
        assert!(directory.path().join("snapshot_0000.bin").exists());
        let metadata: serde_json::Value = serde_json::from_reader(
            std::fs::File::open(directory.path().join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata["dimension"], NUM_DIMENSIONS);
        let columns = metadata["columns"].as_array().unwrap();
        assert_eq!(columns[0]["name"], "time");
        assert_eq!(
            columns.len(),
            1 + 2 * NUM_DIMENSIONS + 5
        );
    }

    #[test]
    fn csv_rows_match_the_particle_count() {
        let directory = tempfile::tempdir().unwrap();
        let simulation = build_lattice_simulation(3);
        let mut writer = OutputWriter::new(directory.path().into(), false);
        writer.write_snapshot(&simulation).unwrap();
        let contents =
            std::fs::read_to_string(directory.path().join("snapshot_0000.csv")).unwrap();
        assert_eq!(contents.lines().count(), simulation.particles.len() + 1);
        let header = contents.lines().next().unwrap();
        assert!(header.starts_with("time,pos_x"));
        assert!(header.ends_with("dens,pres,ene,mass,sml"));
    }
}
