//! Named planar surfaces anchored on the screen-corner marker.
//!
//! A surface is stored as the four screen corners expressed in the surface's
//! own unit square (origin bottom-left). Each frame, the detected screen quad
//! gives the surface-to-image homography, which maps gaze onto the surface.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use gazecal_core::{
    homography_from_4pt, normalize, surface_to_quad, unit_surface_corners, Homography, Marker,
    MarkerKind, SharedSink,
};
use nalgebra::Point2;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::collector::PupilSample;
use crate::error::SurfaceError;

pub const DEFAULT_GAZE_HISTORY_LENGTH: f64 = 1.0;

/// Key under which surface definitions are persisted.
pub const SURFACE_DEFINITIONS_KEY: &str = "surface_definitions";

#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDefinition {
    pub name: String,
    /// Screen corners `[tl, tr, br, bl]` in surface coordinates.
    pub corners: [Point2<f32>; 4],
    /// Seconds of gaze kept per surface.
    pub gaze_history_length: f64,
}

impl SurfaceDefinition {
    /// A surface covering exactly the screen.
    pub fn full_screen(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            corners: unit_surface_corners(),
            gaze_history_length: DEFAULT_GAZE_HISTORY_LENGTH,
        }
    }
}

/// On-disk value for one surface; the name is the map key.
#[derive(Serialize, Deserialize)]
struct SurfaceRecord {
    corners: [Point2<f32>; 4],
    #[serde(default = "default_history")]
    gaze_history_length: f64,
}

fn default_history() -> f64 {
    DEFAULT_GAZE_HISTORY_LENGTH
}

/// Ordered set of surface definitions with unique names.
///
/// Serializes as a JSON object from name to definition, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceStore {
    surfaces: Vec<SurfaceDefinition>,
}

impl SurfaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SurfaceDefinition> {
        self.surfaces.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SurfaceDefinition> {
        self.surfaces.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut SurfaceDefinition> {
        self.surfaces.iter_mut().find(|s| s.name == name)
    }

    pub fn add(&mut self, surface: SurfaceDefinition) -> Result<(), SurfaceError> {
        if self.get(&surface.name).is_some() {
            return Err(SurfaceError::DuplicateName(surface.name));
        }
        if surface.gaze_history_length <= 0.0 {
            return Err(SurfaceError::NonPositiveHistory(surface.gaze_history_length));
        }
        self.surfaces.push(surface);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<SurfaceDefinition> {
        let idx = self.surfaces.iter().position(|s| s.name == name)?;
        Some(self.surfaces.remove(idx))
    }

    /// Persist under [`SURFACE_DEFINITIONS_KEY`].
    pub fn save(&self, store: &dyn ObjectStore) -> Result<(), SurfaceError> {
        store.save(SURFACE_DEFINITIONS_KEY, &serde_json::to_string_pretty(self)?)
    }

    /// Load from `store`; an absent entry gives an empty set.
    ///
    /// The text is parsed straight into the store so that name order and
    /// duplicate detection see the entries exactly as written.
    pub fn load(store: &dyn ObjectStore) -> Result<Self, SurfaceError> {
        match store.load(SURFACE_DEFINITIONS_KEY)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Self::new()),
        }
    }
}

impl Serialize for SurfaceStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.surfaces.len()))?;
        for s in &self.surfaces {
            map.serialize_entry(
                &s.name,
                &SurfaceRecord {
                    corners: s.corners,
                    gaze_history_length: s.gaze_history_length,
                },
            )?;
        }
        map.end()
    }
}

struct SurfaceStoreVisitor;

impl<'de> Visitor<'de> for SurfaceStoreVisitor {
    type Value = SurfaceStore;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from surface name to surface definition")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut store = SurfaceStore::new();
        while let Some((name, record)) = access.next_entry::<String, SurfaceRecord>()? {
            store
                .add(SurfaceDefinition {
                    name,
                    corners: record.corners,
                    gaze_history_length: record.gaze_history_length,
                })
                .map_err(serde::de::Error::custom)?;
        }
        Ok(store)
    }
}

impl<'de> Deserialize<'de> for SurfaceStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SurfaceStoreVisitor)
    }
}

/// Generic keyed persistence for serialized JSON documents.
pub trait ObjectStore {
    fn save(&self, key: &str, json: &str) -> Result<(), SurfaceError>;

    /// `Ok(None)` when nothing was saved under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, SurfaceError>;
}

/// One JSON file per key inside a directory.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ObjectStore for JsonFileStore {
    fn save(&self, key: &str, json: &str) -> Result<(), SurfaceError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), json)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, SurfaceError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}

/// Gaze mapped onto a surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceGaze {
    pub timestamp: f64,
    /// Surface coordinates, origin bottom-left.
    pub norm_pos: Point2<f32>,
    pub confidence: f32,
    pub on_surface: bool,
}

/// Where a surface currently is in the image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceLocation {
    /// Maps surface coordinates to normalized image coordinates.
    pub surface_to_image: Homography,
    pub image_to_surface: Homography,
}

impl SurfaceLocation {
    /// Surface corners `[tl, tr, br, bl]` in normalized image coordinates.
    pub fn corners_in_image(&self) -> [Point2<f32>; 4] {
        self.surface_to_image.map_quad(&unit_surface_corners())
    }
}

#[derive(Clone, Debug)]
struct SurfaceState {
    location: Option<SurfaceLocation>,
    gaze_history: VecDeque<SurfaceGaze>,
}

/// Per-surface gaze produced by one [`SurfaceTracker::map_gaze`] call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfaceGazeEvent {
    pub name: String,
    pub gaze_on_surface: Vec<SurfaceGaze>,
}

pub struct SurfaceTracker {
    definitions: SurfaceStore,
    states: Vec<SurfaceState>,
    screen_marker: Option<Marker>,
    image_size: (usize, usize),
    store: Option<Box<dyn ObjectStore>>,
    sink: SharedSink,
}

impl SurfaceTracker {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            definitions: SurfaceStore::new(),
            states: Vec::new(),
            screen_marker: None,
            image_size: (1, 1),
            store: None,
            sink,
        }
    }

    /// Load definitions from `store` and save back to it on every change.
    pub fn with_store(store: Box<dyn ObjectStore>, sink: SharedSink) -> Result<Self, SurfaceError> {
        let definitions = SurfaceStore::load(store.as_ref())?;
        let states = definitions.iter().map(|_| SurfaceState::empty()).collect();
        Ok(Self {
            definitions,
            states,
            screen_marker: None,
            image_size: (1, 1),
            store: Some(store),
            sink,
        })
    }

    pub fn definitions(&self) -> &SurfaceStore {
        &self.definitions
    }

    /// Feed the markers detected in the current frame and relocate surfaces.
    pub fn update_markers(&mut self, markers: &[Marker], image_size: (usize, usize)) {
        let screens: Vec<&Marker> = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::ScreenCorners && m.geometry.len() == 4)
            .collect();
        if screens.len() > 1 {
            self.sink.warn(format_args!(
                "{} screen markers detected, using the first",
                screens.len()
            ));
        }
        self.screen_marker = screens.first().map(|m| (*m).clone());
        self.image_size = image_size;
        self.update_locations();
    }

    /// Recompute every surface's homographies from the current screen marker.
    pub fn update_locations(&mut self) {
        let quad = self.screen_quad();
        for (def, state) in self.definitions.surfaces.iter().zip(self.states.iter_mut()) {
            state.location = quad.and_then(|q| locate(def, &q));
        }
    }

    pub fn location(&self, name: &str) -> Option<SurfaceLocation> {
        let idx = self.index_of(name)?;
        self.states[idx].location
    }

    pub fn gaze_history(&self, name: &str) -> Option<&VecDeque<SurfaceGaze>> {
        let idx = self.index_of(name)?;
        Some(&self.states[idx].gaze_history)
    }

    /// Define a new full-screen surface from the current screen marker.
    pub fn add_surface(&mut self) -> Result<&SurfaceDefinition, SurfaceError> {
        if self.screen_marker.is_none() {
            self.sink.warn(format_args!("{}", SurfaceError::NoMarkers));
            return Err(SurfaceError::NoMarkers);
        }
        let mut n = self.definitions.len() + 1;
        while self.definitions.get(&format!("Surface {n}")).is_some() {
            n += 1;
        }
        self.definitions
            .add(SurfaceDefinition::full_screen(format!("Surface {n}")))?;
        self.states.push(SurfaceState::empty());
        self.update_locations();
        self.persist()?;
        let idx = self.definitions.len() - 1;
        Ok(&self.definitions.surfaces[idx])
    }

    pub fn remove_surface(&mut self, name: &str) -> Result<SurfaceDefinition, SurfaceError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| SurfaceError::UnknownSurface(name.to_string()))?;
        self.states.remove(idx);
        let def = self.definitions.surfaces.remove(idx);
        self.persist()?;
        Ok(def)
    }

    pub fn set_gaze_history_length(&mut self, name: &str, seconds: f64) -> Result<(), SurfaceError> {
        if seconds <= 0.0 || !seconds.is_finite() {
            self.sink.warn(format_args!("Gaze history length must be a positive number!"));
            return Err(SurfaceError::NonPositiveHistory(seconds));
        }
        let def = self
            .definitions
            .get_mut(name)
            .ok_or_else(|| SurfaceError::UnknownSurface(name.to_string()))?;
        def.gaze_history_length = seconds;
        self.persist()
    }

    /// Move one surface corner (`0..4`, order `[tl, tr, br, bl]`) to a new
    /// normalized image position. Needs the surface to be located.
    pub fn move_corner(
        &mut self,
        name: &str,
        corner: usize,
        image_pos: Point2<f32>,
    ) -> Result<(), SurfaceError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| SurfaceError::UnknownSurface(name.to_string()))?;
        let (Some(location), Some(quad)) = (self.states[idx].location, self.screen_quad()) else {
            return Err(SurfaceError::NoMarkers);
        };
        if corner >= 4 {
            return Err(SurfaceError::DegenerateSurface);
        }
        let mut image_corners = location.corners_in_image();
        image_corners[corner] = image_pos;
        let surface_to_image =
            surface_to_quad(&image_corners).ok_or(SurfaceError::DegenerateSurface)?;
        let image_to_surface = surface_to_image
            .inverse()
            .ok_or(SurfaceError::DegenerateSurface)?;

        self.definitions.surfaces[idx].corners = image_to_surface.map_quad(&quad);
        self.update_locations();
        self.persist()
    }

    /// Map gaze onto every located surface and extend the time-windowed
    /// histories. Samples without a position are skipped.
    pub fn map_gaze(&mut self, gaze: &[PupilSample], world_timestamp: f64) -> Vec<SurfaceGazeEvent> {
        let mut events = Vec::new();
        for (def, state) in self.definitions.surfaces.iter().zip(self.states.iter_mut()) {
            let Some(location) = state.location else {
                continue;
            };
            let mapped: Vec<SurfaceGaze> = gaze
                .iter()
                .filter_map(|g| {
                    let p = location.image_to_surface.apply(g.norm_pos?);
                    Some(SurfaceGaze {
                        timestamp: g.timestamp,
                        norm_pos: p,
                        confidence: g.confidence,
                        on_surface: (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y),
                    })
                })
                .collect();

            state.gaze_history.extend(mapped.iter().copied());
            let cutoff = world_timestamp - def.gaze_history_length;
            while state
                .gaze_history
                .front()
                .is_some_and(|g| g.timestamp <= cutoff)
            {
                state.gaze_history.pop_front();
            }

            events.push(SurfaceGazeEvent {
                name: def.name.clone(),
                gaze_on_surface: mapped,
            });
        }
        events
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.definitions.surfaces.iter().position(|s| s.name == name)
    }

    /// Screen corners in normalized image coordinates (origin bottom-left).
    fn screen_quad(&self) -> Option<[Point2<f32>; 4]> {
        let m = self.screen_marker.as_ref()?;
        let g = &m.geometry;
        let size = self.image_size;
        Some([
            normalize(g[0], size, true),
            normalize(g[1], size, true),
            normalize(g[2], size, true),
            normalize(g[3], size, true),
        ])
    }

    fn persist(&self) -> Result<(), SurfaceError> {
        match &self.store {
            Some(store) => self.definitions.save(store.as_ref()),
            None => Ok(()),
        }
    }
}

impl SurfaceState {
    fn empty() -> Self {
        Self {
            location: None,
            gaze_history: VecDeque::new(),
        }
    }
}

fn locate(def: &SurfaceDefinition, screen_quad: &[Point2<f32>; 4]) -> Option<SurfaceLocation> {
    let surface_to_image = homography_from_4pt(&def.corners, screen_quad)?;
    let image_to_surface = surface_to_image.inverse()?;
    Some(SurfaceLocation {
        surface_to_image,
        image_to_surface,
    })
}
