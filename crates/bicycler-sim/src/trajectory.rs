//! Recorded time series of one simulation run.

use std::collections::BTreeMap;
use std::path::Path;

use bicycler_core::{BicycleState, SimError, SimResult, STATE_COLUMNS};

use crate::archive::{Archive, Entry};

/// Archive field holding the `(frames, 6)` state matrix.
pub const DATA_FIELD: &str = "data";
/// Archive field holding the timestep in seconds.
pub const TIMESTEP_FIELD: &str = "timestep";
/// Prefix that marks metadata entries in an archive.
pub const METADATA_PREFIX: &str = "md_";

/// Read interface used by playback front ends.
pub trait BikeAnimation {
    /// State shown at `frame`.
    ///
    /// # Panics
    ///
    /// Panics if `frame >= self.frame_count()`.
    fn state_at(&self, frame: usize) -> BicycleState;

    /// Delay between two frames in whole milliseconds.
    fn frame_delay_ms(&self) -> u64;

    fn frame_count(&self) -> usize;

    fn metadata(&self) -> &BTreeMap<String, String>;
}

/// Fixed-length sequence of states plus timestep and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    rows: Vec<BicycleState>,
    timestep: f64,
    metadata: BTreeMap<String, String>,
}

impl Trajectory {
    /// Zero-filled trajectory of `frame_count` rows.
    pub fn new(timestep: f64, frame_count: usize) -> Self {
        Self {
            rows: vec![BicycleState::default(); frame_count],
            timestep,
            metadata: BTreeMap::new(),
        }
    }

    pub fn from_rows(
        timestep: f64,
        rows: Vec<BicycleState>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            rows,
            timestep,
            metadata,
        }
    }

    pub fn rows(&self) -> &[BicycleState] {
        &self.rows
    }

    pub fn get(&self, frame: usize) -> Option<&BicycleState> {
        self.rows.get(frame)
    }

    /// # Panics
    ///
    /// Panics if `frame` is out of range.
    pub fn set_state_at(&mut self, frame: usize, state: BicycleState) {
        self.rows[frame] = state;
    }

    /// Copy row `frame` into every later row.
    pub fn freeze_from(&mut self, frame: usize) {
        let frozen = self.rows[frame];
        self.rows[frame + 1..].fill(frozen);
    }

    /// Timestep in seconds.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn set_timestep(&mut self, timestep: f64) {
        self.timestep = timestep;
    }

    pub fn set_metadata_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn extend_metadata(&mut self, entries: BTreeMap<String, String>) {
        self.metadata.extend(entries);
    }

    /// Simulated duration in seconds.
    pub fn duration(&self) -> f64 {
        self.timestep * self.rows.len() as f64
    }

    pub fn final_state(&self) -> Option<&BicycleState> {
        self.rows.last()
    }

    /// First frame at which the bicycle is past the fall-over limit.
    pub fn fall_frame(&self) -> Option<usize> {
        self.rows.iter().position(BicycleState::is_fallen)
    }

    /// Row-major copy of the state matrix.
    pub fn data_matrix(&self) -> Vec<f64> {
        self.rows.iter().flat_map(|s| s.to_row()).collect()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn to_archive(&self) -> Archive {
        let mut archive = Archive::new();
        archive.insert(
            DATA_FIELD,
            Entry::Array {
                shape: vec![self.rows.len(), STATE_COLUMNS],
                values: self.data_matrix(),
            },
        );
        archive.insert(TIMESTEP_FIELD, Entry::Scalar(self.timestep));
        for (key, value) in &self.metadata {
            archive.insert(format!("{METADATA_PREFIX}{key}"), Entry::Text(value.clone()));
        }
        archive
    }

    pub fn from_archive(archive: &Archive) -> SimResult<Self> {
        let timestep = archive.scalar(TIMESTEP_FIELD)?;
        let (shape, values) = archive.array(DATA_FIELD)?;
        if shape.len() != 2 || shape[1] != STATE_COLUMNS {
            return Err(SimError::format(format!(
                "data array has shape {shape:?}, expected (n, {STATE_COLUMNS})"
            )));
        }

        let rows = values
            .chunks_exact(STATE_COLUMNS)
            .map(|chunk| {
                let mut row = [0.0; STATE_COLUMNS];
                row.copy_from_slice(chunk);
                BicycleState::from_row(row)
            })
            .collect();

        let mut metadata = BTreeMap::new();
        for (name, entry) in archive.entries() {
            let Some(key) = name.strip_prefix(METADATA_PREFIX) else {
                continue;
            };
            match entry {
                Entry::Text(value) => {
                    metadata.insert(key.to_string(), value.clone());
                }
                Entry::Scalar(value) => {
                    metadata.insert(key.to_string(), format!("{value:?}"));
                }
                Entry::Array { .. } => {
                    return Err(SimError::format(format!(
                        "metadata field \"{name}\" holds an array"
                    )));
                }
            }
        }

        Ok(Self::from_rows(timestep, rows, metadata))
    }

    /// Write the trajectory to a single archive file.
    pub fn save(&self, path: &Path) -> SimResult<()> {
        self.to_archive().save(path)?;
        tracing::debug!(path = %path.display(), frames = self.rows.len(), "saved trajectory");
        Ok(())
    }

    /// Read a trajectory written by [`Trajectory::save`].
    pub fn load(path: &Path) -> SimResult<Self> {
        let trajectory = Self::from_archive(&Archive::load(path)?)?;
        tracing::debug!(
            path = %path.display(),
            frames = trajectory.rows.len(),
            "loaded trajectory"
        );
        Ok(trajectory)
    }
}

impl BikeAnimation for Trajectory {
    fn state_at(&self, frame: usize) -> BicycleState {
        self.rows[frame]
    }

    fn frame_delay_ms(&self) -> u64 {
        (self.timestep * 1000.0).round() as u64
    }

    fn frame_count(&self) -> usize {
        self.rows.len()
    }

    fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}
