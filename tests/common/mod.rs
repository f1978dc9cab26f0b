use std::{fs, path::Path};

use tempfile::TempDir;

/// Minimal on-disk Geolife dataset.
pub struct FixtureDataset {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl FixtureDataset {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("Data")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn labeled_ids(&self, ids: &[&str]) -> &Self {
        fs::write(self.root().join("labeled_ids.txt"), ids.join("\n") + "\n").unwrap();
        self
    }

    /// Write `Data/<user>/Trajectory/<name>.plt` from `(lat, lon, altitude, "YYYY-MM-DD HH:MM:SS")` rows.
    pub fn trajectory(&self, user: &str, name: &str, points: &[(f64, f64, i32, &str)]) -> &Self {
        let lines: Vec<String> = points
            .iter()
            .map(|(lat, lon, altitude, at)| {
                let (date, time) = at.split_once(' ').unwrap();
                format!("{},{},0,{},39744.1201851852,{},{}", lat, lon, altitude, date, time)
            })
            .collect();
        self.raw_trajectory(user, name, &lines)
    }

    /// Write a trajectory with the standard six header lines followed by `lines`.
    pub fn raw_trajectory(&self, user: &str, name: &str, lines: &[String]) -> &Self {
        let dir = self.root().join("Data").join(user).join("Trajectory");
        fs::create_dir_all(&dir).unwrap();

        let mut content = String::from(
            "Geolife trajectory\nWGS 84\nAltitude is in Feet\nReserved 3\n0,2,255,My Track,0,0,2,8421376\n0\n",
        );
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(dir.join(format!("{}.plt", name)), content).unwrap();
        self
    }

    /// Write `Data/<user>/labels.txt` from `(start, end, mode)` rows in `YYYY/MM/DD HH:MM:SS` form.
    pub fn labels(&self, user: &str, rows: &[(&str, &str, &str)]) -> &Self {
        let dir = self.root().join("Data").join(user);
        fs::create_dir_all(&dir).unwrap();

        let mut content = String::from("Start Time\tEnd Time\tTransportation Mode\n");
        for (start, end, mode) in rows {
            content.push_str(&format!("{}\t{}\t{}\n", start, end, mode));
        }
        fs::write(dir.join("labels.txt"), content).unwrap();
        self
    }
}

/// Connection string for a test database, if one is configured.
#[allow(dead_code)]
pub fn test_database_url(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Skip test with message if the given database variable is not set.
#[macro_export]
macro_rules! require_db {
    ($var:expr) => {
        match crate::common::test_database_url($var) {
            Some(url) => url,
            None => {
                eprintln!("Skipping: {} not set", $var);
                return;
            }
        }
    };
}
