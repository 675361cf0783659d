use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;
use sha2::Digest;
use sha2::Sha256;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::parameters::Parameters;
use crate::particle::Particle;
use crate::simulation::Simulation;

const MAGIC: &[u8; 4] = b"SPCK";
const VERSION: u32 = 1;

const FLAG_POINT_MASS: u8 = 1;
const FLAG_WALL: u8 = 1 << 1;

/// Number of f64 fields in one packed particle record, besides the
/// id, the flag byte and the neighbor count.
const SCALAR_FIELDS: usize = 12;

/// The state a checkpoint restores besides the particle array. The
/// timestep is carried along so a resumed run continues with exactly
/// the dt the interrupted run would have used.
pub struct RestoredState {
    pub parameters_json: String,
    pub particles: Vec<Particle>,
    pub t: Float,
    pub dt: Float,
    pub step: u64,
    pub snapshot_index: usize,
}

fn push_vec(payload: &mut Vec<u8>, v: &MVec) {
    for axis in 0..NUM_DIMENSIONS {
        payload.extend_from_slice(&v[axis].to_le_bytes());
    }
}

fn particle_payload(particles: &[Particle]) -> Vec<u8> {
    let vector_len = 8 * NUM_DIMENSIONS;
    let record_len = 8 + 1 + 3 * vector_len + 8 * SCALAR_FIELDS + 8;
    let mut payload = Vec::with_capacity(particles.len() * record_len);
    for particle in particles {
        payload.extend_from_slice(&particle.id.to_le_bytes());
        let mut flags = 0u8;
        if particle.is_point_mass {
            flags |= FLAG_POINT_MASS;
        }
        if particle.is_wall {
            flags |= FLAG_WALL;
        }
        payload.push(flags);
        push_vec(&mut payload, &particle.pos);
        push_vec(&mut payload, &particle.vel);
        push_vec(&mut payload, &particle.acc);
        for value in [
            particle.mass,
            particle.dens,
            particle.pres,
            particle.ene,
            particle.dene,
            particle.sound,
            particle.sml,
            particle.volume,
            particle.gradh,
            particle.alpha,
            particle.balsara,
            particle.v_sig,
        ] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        payload.extend_from_slice(&(particle.neighbor as u64).to_le_bytes());
    }
    payload
}

/// Binary checkpoint: header with a SHA-256 over the payload, the
/// JSON-encoded parameters, then one packed record per particle with
/// every integration-relevant field, so a resumed run continues
/// bit-identically.
pub fn write_checkpoint(path: &Path, simulation: &Simulation, snapshot_index: usize) -> Result<()> {
    let parameters_json = serde_json::to_vec(&simulation.parameters)?;
    let mut payload = parameters_json;
    let json_len = payload.len() as u64;
    payload.extend(particle_payload(&simulation.particles));
    let digest = Sha256::digest(&payload);

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(NUM_DIMENSIONS as u8).to_le_bytes())?;
    writer.write_all(&simulation.step.to_le_bytes())?;
    writer.write_all(&simulation.t.to_le_bytes())?;
    writer.write_all(&simulation.dt.to_le_bytes())?;
    writer.write_all(&(simulation.particles.len() as u64).to_le_bytes())?;
    writer.write_all(&(snapshot_index as u64).to_le_bytes())?;
    writer.write_all(&json_len.to_le_bytes())?;
    writer.write_all(&digest)?;
    writer.write_all(&payload)?;
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.offset + count > self.bytes.len() {
            return Err(Error::Corrupt("unexpected end of file".into()));
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<Float> {
        Ok(Float::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn vec(&mut self) -> Result<MVec> {
        let mut v = MVec::ZERO;
        for axis in 0..NUM_DIMENSIONS {
            v[axis] = self.f64()?;
        }
        Ok(v)
    }
}

pub fn read_checkpoint(path: &Path) -> Result<RestoredState> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let mut reader = Reader {
        bytes: &bytes,
        offset: 0,
    };
    if reader.take(4)? != MAGIC {
        return Err(Error::Corrupt(format!("{} is not a checkpoint", path.display())));
    }
    let version = reader.u32()?;
    if version != VERSION {
        return Err(Error::Corrupt(format!(
            "unsupported checkpoint version {}",
            version
        )));
    }
    let dimension = reader.u8()? as usize;
    if dimension != NUM_DIMENSIONS {
        return Err(Error::Corrupt(format!(
            "checkpoint was written by a {}d build, this is a {}d build",
            dimension, NUM_DIMENSIONS
        )));
    }
    let step = reader.u64()?;
    let t = reader.f64()?;
    let dt = reader.f64()?;
    let count = reader.u64()? as usize;
    let snapshot_index = reader.u64()? as usize;
    let json_len = reader.u64()? as usize;
    let stored_digest: [u8; 32] = reader.take(32)?.try_into().unwrap();
    let payload = &bytes[reader.offset..];
    let digest = Sha256::digest(payload);
    if digest.as_slice() != stored_digest {
        return Err(Error::Corrupt("checksum mismatch".into()));
    }

    let parameters_json =
        String::from_utf8(reader.take(json_len)?.to_vec()).map_err(|_| {
            Error::Corrupt("parameter block is not valid utf-8".into())
        })?;
    let mut particles = Vec::with_capacity(count);
    for _ in 0..count {
        let id = reader.u64()?;
        let flags = reader.u8()?;
        let pos = reader.vec()?;
        let vel = reader.vec()?;
        let acc = reader.vec()?;
        let mut particle = Particle::gas(id, pos, vel, 0.0, 0.0);
        particle.acc = acc;
        particle.mass = reader.f64()?;
        particle.dens = reader.f64()?;
        particle.pres = reader.f64()?;
        particle.ene = reader.f64()?;
        particle.dene = reader.f64()?;
        particle.sound = reader.f64()?;
        particle.sml = reader.f64()?;
        particle.volume = reader.f64()?;
        particle.gradh = reader.f64()?;
        particle.alpha = reader.f64()?;
        particle.balsara = reader.f64()?;
        particle.v_sig = reader.f64()?;
        particle.neighbor = reader.u64()? as usize;
        particle.is_point_mass = flags & FLAG_POINT_MASS != 0;
        particle.is_wall = flags & FLAG_WALL != 0;
        particles.push(particle);
    }
    Ok(RestoredState {
        parameters_json,
        particles,
        t,
        dt,
        step,
        snapshot_index,
    })
}

/// Interval-driven checkpoint rotation. Write failures warn and
/// continue; the next successful checkpoint supersedes the loss.
pub struct CheckpointWriter {
    directory: PathBuf,
    enabled: bool,
    interval: Float,
    max_keep: usize,
    next_time: Float,
}

impl CheckpointWriter {
    pub fn new(parameters: &Parameters, start_time: Float) -> Self {
        Self {
            directory: parameters.checkpoint_directory.clone(),
            enabled: parameters.enable_checkpointing,
            interval: parameters.checkpoint_interval,
            max_keep: parameters.checkpoint_max_keep,
            next_time: start_time + parameters.checkpoint_interval,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn path_for_step(&self, step: u64) -> PathBuf {
        self.directory.join(format!("checkpoint_{:08}.bin", step))
    }

    fn write(&self, simulation: &Simulation, snapshot_index: usize) {
        if let Err(error) = self.try_write(simulation, snapshot_index) {
            warn!(
                "checkpoint write failed at step {}: {}",
                simulation.step, error
            );
        }
    }

    fn try_write(&self, simulation: &Simulation, snapshot_index: usize) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.path_for_step(simulation.step);
        write_checkpoint(&path, simulation, snapshot_index)?;
        info!(
            "wrote checkpoint {} at step {}",
            path.display(),
            simulation.step
        );
        self.rotate()?;
        Ok(())
    }

    /// Removes the oldest checkpoints beyond the configured keep
    /// count.
    fn rotate(&self) -> Result<()> {
        let mut checkpoints: Vec<_> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("checkpoint_") && name.ends_with(".bin"))
                    .unwrap_or(false)
            })
            .collect();
        checkpoints.sort();
        while checkpoints.len() > self.max_keep {
            let oldest = checkpoints.remove(0);
            std::fs::remove_file(&oldest)?;
        }
        Ok(())
    }

    /// Called at every step boundary; writes when the interval
    /// elapsed.
    pub fn maybe_write(&mut self, simulation: &Simulation, snapshot_index: usize) {
        if !self.enabled || simulation.t < self.next_time {
            return;
        }
        self.write(simulation, snapshot_index);
        while self.next_time <= simulation.t {
            self.next_time += self.interval;
        }
    }

    /// Unconditional write, used on interrupt and as the emergency
    /// dump after a numerical failure.
    pub fn write_now(&self, simulation: &Simulation, snapshot_index: usize) {
        self.write(simulation, snapshot_index);
    }

    /// The newest checkpoint in the directory, used when no explicit
    /// resume file is configured.
    pub fn latest(directory: &Path) -> Option<PathBuf> {
        let mut checkpoints: Vec<_> = std::fs::read_dir(directory)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("checkpoint_") && name.ends_with(".bin"))
                    .unwrap_or(false)
            })
            .collect();
        checkpoints.sort();
        checkpoints.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::read_checkpoint;
    use super::write_checkpoint;
    use super::CheckpointWriter;
    use crate::test_utils::build_lattice_simulation;

    #[test]
    fn round_trip_restores_every_field() {
        let directory = tempfile::tempdir().unwrap();
        let mut simulation = build_lattice_simulation(3);
        simulation.t = 0.75;
        simulation.step = 42;
        simulation.particles[1].is_wall = true;
        simulation.particles[2].is_point_mass = true;
        for (index, particle) in simulation.particles.iter_mut().enumerate() {
            particle.sml = 0.1 + index as f64;
            particle.dene = -0.5 * index as f64;
            particle.alpha = 1.0 + index as f64;
            particle.neighbor = index;
        }
        simulation.dt = 1.5e-3;
        let path = directory.path().join("checkpoint_00000042.bin");
        write_checkpoint(&path, &simulation, 7).unwrap();
        let restored = read_checkpoint(&path).unwrap();
        assert_eq!(restored.t, 0.75);
        assert_eq!(restored.dt, 1.5e-3);
        assert_eq!(restored.step, 42);
        assert_eq!(restored.snapshot_index, 7);
        assert_eq!(restored.particles.len(), simulation.particles.len());
        for (restored, original) in restored.particles.iter().zip(simulation.particles.iter()) {
            assert_eq!(restored.id, original.id);
            assert_eq!(restored.pos, original.pos);
            assert_eq!(restored.vel, original.vel);
            assert_eq!(restored.acc, original.acc);
            assert_eq!(restored.mass, original.mass);
            assert_eq!(restored.ene, original.ene);
            assert_eq!(restored.dene, original.dene);
            assert_eq!(restored.sml, original.sml);
            assert_eq!(restored.alpha, original.alpha);
            assert_eq!(restored.neighbor, original.neighbor);
            assert_eq!(restored.is_wall, original.is_wall);
            assert_eq!(restored.is_point_mass, original.is_point_mass);
        }
    }

    #[test]
    fn corruption_is_detected() {
        let directory = tempfile::tempdir().unwrap();
        let simulation = build_lattice_simulation(3);
        let path = directory.path().join("checkpoint_00000000.bin");
        write_checkpoint(&path, &simulation, 0).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();
        assert!(read_checkpoint(&path).is_err());
    }

    #[test]
    fn rotation_keeps_only_the_newest_checkpoints() {
        let directory = tempfile::tempdir().unwrap();
        let mut simulation = build_lattice_simulation(3);
        simulation.parameters.enable_checkpointing = true;
        simulation.parameters.checkpoint_max_keep = 2;
        simulation.parameters.checkpoint_directory = directory.path().into();
        let writer = CheckpointWriter::new(&simulation.parameters, 0.0);
        for step in 0..5 {
            simulation.step = step;
            writer.write_now(&simulation, 0);
        }
        let kept: Vec<_> = std::fs::read_dir(directory.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().into_string().unwrap())
            .collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&"checkpoint_00000003.bin".to_string()));
        assert!(kept.contains(&"checkpoint_00000004.bin".to_string()));
    }

    #[test]
    fn latest_returns_the_newest_checkpoint() {
        let directory = tempfile::tempdir().unwrap();
        let mut simulation = build_lattice_simulation(3);
        for step in [3u64, 12, 7] {
            simulation.step = step;
            let path = directory
                .path()
                .join(format!("checkpoint_{:08}.bin", step));
            write_checkpoint(&path, &simulation, 0).unwrap();
        }
        let latest = CheckpointWriter::latest(directory.path()).unwrap();
        assert!(latest.ends_with("checkpoint_00000012.bin"));
    }
}
