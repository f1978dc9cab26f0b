//! Reading the Geolife dataset from disk.
//!
//! Layout expected under the dataset root:
//!
//! ```text
//! labeled_ids.txt
//! Data/<user>/labels.txt            (optional)
//! Data/<user>/Trajectory/<id>.plt
//! ```

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    data_types::geolife::{ActivityRecord, Label, TrajectoryPoint, UserRecord},
    error::{GeolifeError, Result},
    logln, logvbln, logwarn,
    util::time::DateTimeUtils,
};

pub const TRAJECTORY_HEADER_LINES: usize = 6;
const TRAJECTORY_FIELDS: usize = 7;

/// Parse a `.plt` file.
///
/// Returns `Ok(None)` when the file has more than `max_lines` lines.
pub fn read_trajectory(path: &Path, max_lines: usize) -> Result<Option<Vec<TrajectoryPoint>>> {
    let content = fs::read_to_string(path).map_err(|e| GeolifeError::io(path, e))?;

    if content.lines().count() > max_lines {
        return Ok(None);
    }

    content
        .lines()
        .enumerate()
        .skip(TRAJECTORY_HEADER_LINES)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_trajectory_line(line).map_err(|reason| {
            GeolifeError::MalformedTrajectory {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            }
        }))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// `lat,lon,unused,altitude,date_days,date,time`
pub fn parse_trajectory_line(line: &str) -> std::result::Result<TrajectoryPoint, String> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != TRAJECTORY_FIELDS {
        return Err(format!(
            "expected {} fields, found {}",
            TRAJECTORY_FIELDS,
            fields.len()
        ));
    }

    let number = |index: usize, name: &str| -> std::result::Result<f64, String> {
        fields[index]
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("invalid {}: {:?}", name, fields[index]))
    };

    // Some files carry fractional altitudes
    let altitude = number(3, "altitude")?.trunc();
    if altitude < f64::from(i32::MIN) || altitude > f64::from(i32::MAX) {
        return Err(format!("altitude out of range: {:?}", fields[3]));
    }

    let date_time_str = format!("{} {}", fields[5], fields[6]);
    let date_time = DateTimeUtils::parse(&date_time_str)
        .ok_or_else(|| format!("invalid timestamp: {:?}", date_time_str))?;

    Ok(TrajectoryPoint {
        lat: number(0, "latitude")?,
        lon: number(1, "longitude")?,
        altitude: altitude as i32,
        date_days: number(4, "date_days")?,
        date_time_str,
        date_time,
    })
}

/// Parse a `labels.txt` file, skipping its header line.
pub fn read_labels(path: &Path) -> Result<Vec<Label>> {
    let content = fs::read_to_string(path).map_err(|e| GeolifeError::io(path, e))?;

    content
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_label_line(line).ok_or_else(|| GeolifeError::MalformedLabel {
                path: path.to_path_buf(),
                line: index + 1,
            })
        })
        .collect()
}

/// `2008/04/02 11:24:21 2008/04/02 11:50:45 bus`
pub fn parse_label_line(line: &str) -> Option<Label> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }

    let normalise = |date: &str, time: &str| {
        format!("{} {}", date.replace('/', "-"), time.replace('/', ":"))
    };

    Some(Label {
        start_date_time: normalise(fields[0], fields[1]),
        end_date_time: normalise(fields[2], fields[3]),
        transportation_mode: fields[4].to_string(),
    })
}

/// Mode of the first label whose boundaries both equal the activity's.
pub fn match_transportation_mode(start: &str, end: &str, labels: &[Label]) -> Option<String> {
    labels
        .iter()
        .find(|label| label.start_date_time == start && label.end_date_time == end)
        .map(|label| label.transportation_mode.clone())
}

/// Walks a dataset directory one user at a time.
pub struct DatasetReader {
    root: PathBuf,
    max_trajectory_lines: usize,
}

/// A user read from disk plus the number of oversized files left out.
#[derive(Debug)]
pub struct UserRead {
    pub user: UserRecord,
    pub skipped_files: u64,
}

impl DatasetReader {
    const CC: &'static str = "Ingestion";

    pub fn new(root: impl Into<PathBuf>, max_trajectory_lines: usize) -> Self {
        Self {
            root: root.into(),
            max_trajectory_lines,
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("Data")
    }

    pub fn labeled_ids(&self) -> Result<HashSet<String>> {
        let path = self.root.join("labeled_ids.txt");
        if !path.exists() {
            logwarn!("{} not found, no user has labels", path.display());
            return Ok(HashSet::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| GeolifeError::io(&path, e))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// User directory names, sorted.
    pub fn user_ids(&self) -> Result<Vec<String>> {
        Ok(sorted_entries(&self.data_dir())?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    pub fn read_user(&self, user_id: &str, has_labels: bool) -> Result<UserRead> {
        let user_root = self.data_dir().join(user_id);

        let labels = if has_labels {
            let labels_path = user_root.join("labels.txt");
            if labels_path.exists() {
                read_labels(&labels_path)?
            } else {
                logwarn!("User {} is labelled but has no labels.txt", user_id);
                Vec::new()
            }
        } else {
            Vec::new()
        };

        let mut activities = Vec::new();
        let mut skipped_files = 0;

        for file_path in sorted_entries(&user_root.join("Trajectory"))? {
            if file_path.extension().map_or(true, |ext| ext != "plt") {
                continue;
            }

            let Some(track_points) = read_trajectory(&file_path, self.max_trajectory_lines)? else {
                logwarn!(
                    "File {} has more than {} lines: skipping",
                    file_path.display(),
                    self.max_trajectory_lines
                );
                skipped_files += 1;
                continue;
            };

            let (Some(first), Some(last)) = (track_points.first(), track_points.last()) else {
                logvbln!("File {} has no track points", file_path.display());
                continue;
            };

            let transportation_mode =
                match_transportation_mode(&first.date_time_str, &last.date_time_str, &labels);

            activities.push(ActivityRecord {
                user_id: user_id.to_string(),
                transportation_mode,
                start_date_time: first.date_time,
                end_date_time: last.date_time,
                track_points,
            });
        }

        logln!(
            "Read user {}: {} activities, {} skipped files",
            user_id,
            activities.len(),
            skipped_files
        );

        Ok(UserRead {
            user: UserRecord {
                id: user_id.to_string(),
                has_labels,
                activities,
            },
            skipped_files,
        })
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| GeolifeError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| GeolifeError::io(dir, e))?;
    entries.sort();

    Ok(entries)
}
