//! Scoped ownership of device streams and artifact handles.
//!
//! Everything a session acquires from the outside world is registered in a
//! `ResourceGuard`. The guard releases what it holds exactly once, whether
//! the release comes from an explicit stop, an error path, or `Drop`.

use tracing::{debug, info};

/// What a registered resource is, used for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A live capture stream (microphone tracks).
    DeviceStream,
    /// An addressable handle to a finalized artifact.
    ArtifactHandle,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceStream => "device_stream",
            Self::ArtifactHandle => "artifact_handle",
        }
    }
}

/// A resource that must be given back to the system.
///
/// `release` must not fail; implementations log and swallow their own errors.
/// It may be called on a resource that is already closed.
pub trait Releasable {
    fn kind(&self) -> ResourceKind;

    fn release(&mut self);
}

/// Arena of releasable resources with idempotent bulk release.
pub struct ResourceGuard {
    label: &'static str,
    resources: Vec<Box<dyn Releasable>>,
    releases: usize,
}

impl ResourceGuard {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            resources: Vec::new(),
            releases: 0,
        }
    }

    /// Register a resource for tracked release.
    pub fn acquire(&mut self, resource: Box<dyn Releasable>) {
        debug!(
            "{}: acquired {} (tracking {})",
            self.label,
            resource.kind().as_str(),
            self.resources.len() + 1
        );
        self.resources.push(resource);
    }

    /// Release every registered resource. Later calls are no-ops until
    /// something new is acquired.
    pub fn release_all(&mut self) {
        if self.resources.is_empty() {
            debug!("{}: nothing to release", self.label);
            return;
        }

        let count = self.resources.len();
        // Reverse acquisition order
        while let Some(mut resource) = self.resources.pop() {
            resource.release();
        }
        self.releases += 1;
        info!("{}: released {} resource(s)", self.label, count);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn holds(&self, kind: ResourceKind) -> bool {
        self.resources.iter().any(|r| r.kind() == kind)
    }

    /// Number of `release_all` calls that actually released something.
    pub fn release_count(&self) -> usize {
        self.releases
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            debug!("{}: dropped while holding resources, releasing", self.label);
            self.release_all();
        }
    }
}
