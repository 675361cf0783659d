use std::path::Path;

use log::info;

use super::AXIS_NAMES;
use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::particle::Particle;

/// Reads initial conditions from a snapshot-format CSV file. The
/// header row is validated against the expected column schema; the
/// time column is ignored, density and smoothing length seed the
/// first pre-interaction pass when present.
pub fn load_initial_conditions(path: &Path) -> Result<Vec<Particle>> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = contents.lines();
    let header = lines
        .next()
        .ok_or_else(|| Error::Config(format!("{} is empty", path.display())))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let find = |name: &str| -> Result<usize> {
        columns
            .iter()
            .position(|column| *column == name)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is missing the required column {}",
                    path.display(),
                    name
                ))
            })
    };
    let mut pos_columns = [0; NUM_DIMENSIONS];
    let mut vel_columns = [0; NUM_DIMENSIONS];
    for axis in 0..NUM_DIMENSIONS {
        pos_columns[axis] = find(&format!("pos_{}", AXIS_NAMES[axis]))?;
        vel_columns[axis] = find(&format!("vel_{}", AXIS_NAMES[axis]))?;
    }
    let mass_column = find("mass")?;
    let ene_column = find("ene")?;
    let dens_column = columns.iter().position(|column| *column == "dens");
    let sml_column = columns.iter().position(|column| *column == "sml");
    let wall_column = columns.iter().position(|column| *column == "wall");
    let point_mass_column = columns.iter().position(|column| *column == "point_mass");

    let mut particles = Vec::new();
    for (line_number, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<Float> = line
            .split(',')
            .map(|value| value.trim().parse::<Float>())
            .collect::<Result<_, _>>()
            .map_err(|parse_error| {
                Error::Config(format!(
                    "{}:{}: {}",
                    path.display(),
                    line_number + 2,
                    parse_error
                ))
            })?;
        let get = |column: usize| -> Result<Float> {
            values.get(column).copied().ok_or_else(|| {
                Error::Config(format!(
                    "{}:{}: missing column {}",
                    path.display(),
                    line_number + 2,
                    column
                ))
            })
        };
        let mut pos = MVec::ZERO;
        let mut vel = MVec::ZERO;
        for axis in 0..NUM_DIMENSIONS {
            pos[axis] = get(pos_columns[axis])?;
            vel[axis] = get(vel_columns[axis])?;
        }
        let mass = get(mass_column)?;
        let ene = get(ene_column)?;
        if mass <= 0.0 {
            return Err(Error::Config(format!(
                "{}:{}: particle mass must be positive",
                path.display(),
                line_number + 2
            )));
        }
        if ene < 0.0 {
            return Err(Error::Config(format!(
                "{}:{}: internal energy must not be negative",
                path.display(),
                line_number + 2
            )));
        }
        let mut particle = Particle::gas(particles.len() as u64, pos, vel, mass, ene);
        if let Some(column) = dens_column {
            particle.dens = get(column)?;
        }
        if let Some(column) = sml_column {
            particle.sml = get(column)?;
        }
        if let Some(column) = wall_column {
            particle.is_wall = get(column)? != 0.0;
        }
        if let Some(column) = point_mass_column {
            particle.is_point_mass = get(column)? != 0.0;
        }
        particles.push(particle);
    }
    if particles.is_empty() {
        return Err(Error::Config(format!(
            "{} contains no particles",
            path.display()
        )));
    }
    info!(
        "loaded {} particles from {}",
        particles.len(),
        path.display()
    );
    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::load_initial_conditions;
    use crate::config::NUM_DIMENSIONS;
    use crate::io::AXIS_NAMES;

    fn write_csv(rows: &[String]) -> (tempfile::TempDir, std::path::PathBuf) {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("ics.csv");
        let mut header = vec!["time".to_string()];
        for axis in &AXIS_NAMES[..NUM_DIMENSIONS] {
            header.push(format!("pos_{}", axis));
        }
        for axis in &AXIS_NAMES[..NUM_DIMENSIONS] {
            header.push(format!("vel_{}", axis));
        }
        header.extend(["dens", "pres", "ene", "mass", "sml"].map(String::from));
        let mut contents = header.join(",");
        for row in rows {
            contents.push('\n');
            contents.push_str(row);
        }
        std::fs::write(&path, contents).unwrap();
        (directory, path)
    }

    fn row(pos: f64, mass: f64, ene: f64) -> String {
        let mut values = vec!["0.0".to_string()];
        values.push(format!("{}", pos));
        values.extend(std::iter::repeat("0.0".to_string()).take(2 * NUM_DIMENSIONS - 1));
        values.extend([
            "1.0".to_string(),
            "0.4".to_string(),
            format!("{}", ene),
            format!("{}", mass),
            "0.0".to_string(),
        ]);
        values.join(",")
    }

    #[test]
    fn loads_particles_with_seeded_density() {
        let (_dir, path) = write_csv(&[row(0.1, 0.5, 2.0), row(0.2, 0.5, 2.0)]);
        let particles = load_initial_conditions(&path).unwrap();
        assert_eq!(particles.len(), 2);
        assert_eq!(particles[0].pos[0], 0.1);
        assert_eq!(particles[0].mass, 0.5);
        assert_eq!(particles[0].ene, 2.0);
        assert_eq!(particles[0].dens, 1.0);
        assert_eq!(particles[1].id, 1);
    }

    #[test]
    fn rejects_missing_columns() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("ics.csv");
        std::fs::write(&path, "mass,ene\n1.0,1.0\n").unwrap();
        assert!(load_initial_conditions(&path).is_err());
    }

    #[test]
    fn rejects_non_positive_masses() {
        let (_dir, path) = write_csv(&[row(0.1, -0.5, 1.0)]);
        assert!(load_initial_conditions(&path).is_err());
    }

    #[test]
    fn rejects_empty_files() {
        let (_dir, path) = write_csv(&[]);
        assert!(load_initial_conditions(&path).is_err());
    }
}
