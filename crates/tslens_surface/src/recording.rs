//! Recording surface for tests and headless inspection.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{AnalysisSurface, AnalyzerOptions, ScriptFamily};

/// Everything that happened to a [`RecordingSurface`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    OptionsSet { family: ScriptFamily },
    ModelCreated { path: String },
    ModelContentSet { path: String },
    ModelDisposed { path: String },
    AmbientAdded { virtual_path: String },
    AmbientCleared,
}

#[derive(Debug, Default)]
struct RecordingState {
    options: BTreeMap<ScriptFamily, AnalyzerOptions>,
    models: BTreeMap<String, (ScriptFamily, String)>,
    ambient: BTreeMap<String, String>,
    events: Vec<SurfaceEvent>,
}

/// An [`AnalysisSurface`] that records every call instead of driving a
/// real analyzer. The test double for this workspace, and the surface
/// the CLI inspects projects with.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    state: Mutex<RecordingState>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RecordingState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut state)
    }

    pub fn options_for(&self, family: ScriptFamily) -> Option<AnalyzerOptions> {
        self.with_state(|state| state.options.get(&family).cloned())
    }

    pub fn model_content(&self, path: &str) -> Option<String> {
        self.with_state(|state| state.models.get(path).map(|(_, content)| content.clone()))
    }

    pub fn model_family(&self, path: &str) -> Option<ScriptFamily> {
        self.with_state(|state| state.models.get(path).map(|(family, _)| *family))
    }

    pub fn model_paths(&self) -> Vec<String> {
        self.with_state(|state| state.models.keys().cloned().collect())
    }

    pub fn model_count(&self) -> usize {
        self.with_state(|state| state.models.len())
    }

    pub fn ambient_paths(&self) -> Vec<String> {
        self.with_state(|state| state.ambient.keys().cloned().collect())
    }

    pub fn ambient_content(&self, virtual_path: &str) -> Option<String> {
        self.with_state(|state| state.ambient.get(virtual_path).cloned())
    }

    pub fn ambient_count(&self) -> usize {
        self.with_state(|state| state.ambient.len())
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.with_state(|state| state.events.clone())
    }

    /// Events touching one model path, for asserting what a registry
    /// operation did and did not do to the surface.
    pub fn events_for(&self, path: &str) -> Vec<SurfaceEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                SurfaceEvent::ModelCreated { path: p }
                | SurfaceEvent::ModelContentSet { path: p }
                | SurfaceEvent::ModelDisposed { path: p } => p == path,
                _ => false,
            })
            .collect()
    }
}

impl AnalysisSurface for RecordingSurface {
    fn set_compiler_options(&self, family: ScriptFamily, options: AnalyzerOptions) {
        self.with_state(|state| {
            state.options.insert(family, options);
            state.events.push(SurfaceEvent::OptionsSet { family });
        });
    }

    fn has_model(&self, path: &str) -> bool {
        self.with_state(|state| state.models.contains_key(path))
    }

    fn create_model(&self, path: &str, family: ScriptFamily, content: &str) {
        self.with_state(|state| {
            state
                .models
                .insert(path.to_string(), (family, content.to_string()));
            state.events.push(SurfaceEvent::ModelCreated {
                path: path.to_string(),
            });
        });
    }

    fn set_model_content(&self, path: &str, content: &str) {
        self.with_state(|state| {
            if let Some((_, existing)) = state.models.get_mut(path) {
                *existing = content.to_string();
            }
            state.events.push(SurfaceEvent::ModelContentSet {
                path: path.to_string(),
            });
        });
    }

    fn dispose_model(&self, path: &str) {
        self.with_state(|state| {
            state.models.remove(path);
            state.events.push(SurfaceEvent::ModelDisposed {
                path: path.to_string(),
            });
        });
    }

    fn add_ambient_declaration(&self, virtual_path: &str, content: &str) {
        self.with_state(|state| {
            state
                .ambient
                .insert(virtual_path.to_string(), content.to_string());
            state.events.push(SurfaceEvent::AmbientAdded {
                virtual_path: virtual_path.to_string(),
            });
        });
    }

    fn clear_ambient_declarations(&self) {
        self.with_state(|state| {
            state.ambient.clear();
            state.events.push(SurfaceEvent::AmbientCleared);
        });
    }
}
