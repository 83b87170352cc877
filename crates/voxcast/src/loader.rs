//! Background loading of volume and colormap files.
//!
//! Each request runs on its own worker thread, which fetches the bytes and
//! fully prepares them (parse, size check, texel conversion or image
//! decode). Finished work comes back over an `mpsc` channel tagged with a
//! generation number so the render thread can drop results that a newer
//! request has superseded.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use voxcast_core::{parse_descriptor, Result, VolumeLayout, VoxcastError};
use voxcast_render::{ColormapDescriptor, VolumeTexels};

/// Source of raw file bytes.
pub trait Fetcher: Send + Sync + 'static {
    /// Returns the full contents at `path`.
    fn fetch(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Reads from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| VoxcastError::FetchFailure {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serves bytes from memory; useful for tests and embedded assets.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFetcher {
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), bytes);
        }
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.lock().map_err(|_| VoxcastError::FetchFailure {
            path: path.display().to_string(),
            reason: "file table poisoned".into(),
        })?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| VoxcastError::FetchFailure {
                path: path.display().to_string(),
                reason: "not found".into(),
            })
    }
}

/// A volume parsed and converted off the render thread.
#[derive(Debug, Clone)]
pub struct PreparedVolume {
    /// Name, dimensions and voxel type.
    pub layout: VolumeLayout,
    /// Texels ready for upload.
    pub texels: VolumeTexels,
}

impl PreparedVolume {
    /// Parses `filename` + `bytes` and converts to texels.
    pub fn prepare(filename: &str, bytes: Vec<u8>) -> Result<Self> {
        let descriptor = parse_descriptor(filename, bytes)?;
        let texels = VolumeTexels::from_descriptor(&descriptor);
        Ok(Self {
            layout: descriptor.layout().clone(),
            texels,
        })
    }
}

/// Finished background work.
#[derive(Debug)]
pub enum LoadCompletion {
    /// A volume request finished.
    Volume {
        generation: u64,
        path: PathBuf,
        result: Result<PreparedVolume>,
    },
    /// A colormap request finished.
    Colormap {
        generation: u64,
        path: PathBuf,
        result: Result<ColormapDescriptor>,
    },
}

impl LoadCompletion {
    /// Generation the request was issued with.
    pub fn generation(&self) -> u64 {
        match self {
            LoadCompletion::Volume { generation, .. }
            | LoadCompletion::Colormap { generation, .. } => *generation,
        }
    }
}

/// Monotonic counter deciding which result is the latest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerationGate {
    latest: u64,
}

impl GenerationGate {
    /// Issues a new generation, superseding all earlier ones.
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    /// Returns true if `generation` is the most recently issued one.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }

    /// Most recently issued generation (0 before any).
    pub fn latest(&self) -> u64 {
        self.latest
    }
}

/// Spawns load requests and collects their completions.
pub struct AssetLoader {
    fetcher: Arc<dyn Fetcher>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
    volumes: GenerationGate,
    colormaps: GenerationGate,
    in_flight: usize,
}

impl AssetLoader {
    /// Creates a loader over `fetcher`.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            fetcher,
            sender,
            receiver,
            volumes: GenerationGate::default(),
            colormaps: GenerationGate::default(),
            in_flight: 0,
        }
    }

    /// Starts loading a volume file; returns its generation.
    pub fn request_volume(&mut self, path: PathBuf) -> Result<u64> {
        let generation = self.volumes.latest() + 1;
        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let worker_path = path.clone();
        spawn_worker("voxcast-volume-loader", move || {
            let filename = worker_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let result = run_guarded(&worker_path, || {
                fetcher
                    .fetch(&worker_path)
                    .and_then(|bytes| PreparedVolume::prepare(&filename, bytes))
            });
            let _ = sender.send(LoadCompletion::Volume {
                generation,
                path: worker_path,
                result,
            });
        })?;
        self.volumes.issue();
        self.in_flight += 1;
        log::info!("loading volume {} (generation {generation})", path.display());
        Ok(generation)
    }

    /// Starts loading a colormap image; returns its generation.
    pub fn request_colormap(&mut self, path: PathBuf) -> Result<u64> {
        let generation = self.colormaps.latest() + 1;
        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let worker_path = path.clone();
        spawn_worker("voxcast-colormap-loader", move || {
            let result = run_guarded(&worker_path, || {
                fetcher
                    .fetch(&worker_path)
                    .and_then(|bytes| Ok(ColormapDescriptor::decode(&bytes)?))
            });
            let _ = sender.send(LoadCompletion::Colormap {
                generation,
                path: worker_path,
                result,
            });
        })?;
        self.colormaps.issue();
        self.in_flight += 1;
        log::info!("loading colormap {} (generation {generation})", path.display());
        Ok(generation)
    }

    /// Supersedes any in-flight volume request without starting a new one.
    pub fn supersede_volume(&mut self) -> u64 {
        self.volumes.issue()
    }

    /// Supersedes any in-flight colormap request without starting a new one.
    pub fn supersede_colormap(&mut self) -> u64 {
        self.colormaps.issue()
    }

    /// Returns every completion received so far without blocking.
    pub fn drain(&mut self) -> Vec<LoadCompletion> {
        let completions: Vec<_> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(completions.len());
        completions
    }

    /// Blocks until one completion arrives. Returns `None` when nothing is
    /// in flight.
    pub fn wait_one(&mut self) -> Option<LoadCompletion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().ok()?;
        self.in_flight -= 1;
        Some(completion)
    }

    /// Returns true if `completion` is the latest of its kind.
    pub fn is_current(&self, completion: &LoadCompletion) -> bool {
        match completion {
            LoadCompletion::Volume { generation, .. } => self.volumes.is_current(*generation),
            LoadCompletion::Colormap { generation, .. } => self.colormaps.is_current(*generation),
        }
    }

    /// Number of requests whose completion has not been drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

/// Runs `work`, turning a panic into a failed load so the completion is
/// still sent and the in-flight count still drops.
fn run_guarded<T>(path: &Path, work: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| {
        log::error!("loader worker for {} panicked", path.display());
        Err(VoxcastError::FetchFailure {
            path: path.display().to_string(),
            reason: "loader worker panicked".into(),
        })
    })
}

fn spawn_worker(name: &str, work: impl FnOnce() + Send + 'static) -> Result<()> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(work)?;
    Ok(())
}
