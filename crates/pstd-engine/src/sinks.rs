//! Receiver and checkpoint output.
//!
//! Receiver samples are single-precision and flushed on every write, so a
//! crash loses at most the sample in flight. Checkpoint formats belong to
//! the sink; [`PressureFrameWriter`] writes raw little-endian `p0` arrays.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::map::Entry;
use indexmap::IndexMap;
use pstd_core::ReceiverId;
use pstd_scene::Scene;

// ── Receivers ──────────────────────────────────────────────────────

/// Consumes one sample per receiver per frame.
pub trait ReceiverSink {
    /// Append and flush one sample.
    fn write(&mut self, receiver: ReceiverId, sample: f32) -> io::Result<()>;
}

/// One `receiver-<id>.bin` file per receiver, little-endian `f32`s.
pub struct FileReceiverSink {
    dir: PathBuf,
    files: IndexMap<ReceiverId, File>,
}

impl FileReceiverSink {
    /// Create (truncating) one file per receiver under `dir`.
    pub fn create(
        dir: impl AsRef<Path>,
        receivers: impl IntoIterator<Item = ReceiverId>,
    ) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let mut files = IndexMap::new();
        for id in receivers {
            let file = File::create(Self::path_in(&dir, id))?;
            files.insert(id, file);
        }
        Ok(Self { dir, files })
    }

    /// Create files for every receiver of `scene`.
    pub fn for_scene(dir: impl AsRef<Path>, scene: &Scene) -> io::Result<Self> {
        Self::create(dir, scene.receivers().iter().map(|r| r.id()))
    }

    /// Path of one receiver's file.
    pub fn path(&self, receiver: ReceiverId) -> PathBuf {
        Self::path_in(&self.dir, receiver)
    }

    fn path_in(dir: &Path, receiver: ReceiverId) -> PathBuf {
        dir.join(format!("receiver-{receiver}.bin"))
    }

    /// Read back a receiver file.
    pub fn read_samples(path: impl AsRef<Path>) -> io::Result<Vec<f32>> {
        let bytes = fs::read(path)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

impl ReceiverSink for FileReceiverSink {
    fn write(&mut self, receiver: ReceiverId, sample: f32) -> io::Result<()> {
        let file = match self.files.entry(receiver) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(Self::path_in(&self.dir, receiver))?;
                entry.insert(file)
            }
        };
        file.write_all(&sample.to_le_bytes())?;
        file.flush()
    }
}

/// Keeps samples in memory, per receiver, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct MemoryReceiverSink {
    samples: IndexMap<ReceiverId, Vec<f32>>,
}

impl MemoryReceiverSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples recorded for one receiver.
    pub fn samples(&self, receiver: ReceiverId) -> &[f32] {
        self.samples.get(&receiver).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every receiver that got at least one sample, in first-write order.
    pub fn receivers(&self) -> impl Iterator<Item = ReceiverId> + '_ {
        self.samples.keys().copied()
    }
}

impl ReceiverSink for MemoryReceiverSink {
    fn write(&mut self, receiver: ReceiverId, sample: f32) -> io::Result<()> {
        self.samples.entry(receiver).or_default().push(sample);
        Ok(())
    }
}

// ── Checkpoints ────────────────────────────────────────────────────

/// Persists scene state at checkpoint frames.
pub trait CheckpointSink {
    /// Write the state after frame `frame` (zero-based).
    fn write_checkpoint(&mut self, frame: u64, scene: &Scene) -> io::Result<()>;
}

/// Discards checkpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCheckpoints;

impl CheckpointSink for NoCheckpoints {
    fn write_checkpoint(&mut self, _frame: u64, _scene: &Scene) -> io::Result<()> {
        Ok(())
    }
}

/// Records which frames were checkpointed.
#[derive(Clone, Debug, Default)]
pub struct CheckpointLog {
    /// Checkpointed frames, in order.
    pub frames: Vec<u64>,
}

impl CheckpointSink for CheckpointLog {
    fn write_checkpoint(&mut self, frame: u64, _scene: &Scene) -> io::Result<()> {
        self.frames.push(frame);
        Ok(())
    }
}

/// Writes each non-rigid domain's `p0` to `<dir>/<domain>-<frame>.bin`
/// as little-endian `f32`.
pub struct PressureFrameWriter {
    dir: PathBuf,
}

impl PressureFrameWriter {
    /// Write frames under `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of one domain's frame file.
    pub fn path(&self, domain: pstd_core::DomainId, frame: u64) -> PathBuf {
        self.dir.join(format!("{domain}-{frame}.bin"))
    }
}

impl CheckpointSink for PressureFrameWriter {
    fn write_checkpoint(&mut self, frame: u64, scene: &Scene) -> io::Result<()> {
        for domain in scene.domains().iter().filter(|d| !d.is_rigid()) {
            let bytes: Vec<u8> = domain
                .fields()
                .p0
                .iter()
                .flat_map(|&v| (v as f32).to_le_bytes())
                .collect();
            fs::write(self.path(domain.id(), frame), bytes)?;
        }
        Ok(())
    }
}
