//! Scene files (TOML) describing targets, animations and timelines

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_animation::{
    stagger, AnimationParams, Composition, Easing, Engine, EngineConfig, LoopCount, Position,
    PropertyValue, TimelineParams, Value,
};
use cadence_core::{MemorySink, PropertyKind, RawValue, TargetId};
use serde::Deserialize;
use tracing::{debug, info};

/// Top-level scene
#[derive(Debug, Default, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub animations: Vec<AnimationSpec>,
    #[serde(default)]
    pub timelines: Vec<TimelineSpec>,
}

/// A target and its initial property values
#[derive(Debug, Deserialize)]
pub struct TargetSpec {
    pub id: u64,
    #[serde(default = "default_kind")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub properties: BTreeMap<String, RawValue>,
}

fn default_kind() -> PropertyKind {
    PropertyKind::Style
}

/// A property value: a `to` value, or a `[from, to, ...]` sequence
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PropertySpec {
    Single(RawValue),
    Sequence(Vec<RawValue>),
}

impl From<&PropertySpec> for PropertyValue {
    fn from(spec: &PropertySpec) -> Self {
        match spec {
            PropertySpec::Single(value) => PropertyValue::To(Value::from(value.clone())),
            PropertySpec::Sequence(values) => {
                PropertyValue::sequence(values.iter().cloned().map(Value::from).collect())
            }
        }
    }
}

/// An animation, standalone or as a timeline child
#[derive(Debug, Default, Deserialize)]
pub struct AnimationSpec {
    pub targets: Vec<u64>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
    pub duration: Option<f64>,
    pub delay: Option<f64>,
    /// Extra delay per target index
    pub stagger: Option<f64>,
    pub ease: Option<Easing>,
    pub composition: Option<Composition>,
    #[serde(rename = "loop")]
    pub loop_count: Option<LoopCount>,
    pub loop_delay: Option<f64>,
    pub alternate: Option<bool>,
    pub reversed: Option<bool>,
    pub playback_rate: Option<f64>,
    /// Placement inside a timeline; ignored for standalone animations
    pub position: Option<String>,
}

impl AnimationSpec {
    fn target_ids(&self) -> Vec<TargetId> {
        self.targets.iter().copied().map(TargetId).collect()
    }

    fn params(&self) -> AnimationParams {
        let mut params = AnimationParams::new();
        for (name, spec) in &self.properties {
            params = params.prop(name.as_str(), PropertyValue::from(spec));
        }
        if let Some(duration) = self.duration {
            params = params.duration(duration);
        }
        match (self.stagger, self.delay) {
            (Some(step), delay) => params = params.delay(stagger(step, delay.unwrap_or(0.0))),
            (None, Some(delay)) => params = params.delay(delay),
            (None, None) => {}
        }
        if let Some(ease) = &self.ease {
            params = params.ease(ease.clone());
        }
        if let Some(composition) = self.composition {
            params = params.composition(composition);
        }
        if let Some(count) = self.loop_count {
            params = params.looped(count);
        }
        if let Some(ms) = self.loop_delay {
            params = params.loop_delay(ms);
        }
        if let Some(alternate) = self.alternate {
            params = params.alternate(alternate);
        }
        if let Some(reversed) = self.reversed {
            params = params.reversed(reversed);
        }
        if let Some(rate) = self.playback_rate {
            params = params.playback_rate(rate);
        }
        params
    }

    fn position(&self) -> Result<Position> {
        match &self.position {
            Some(text) => text
                .parse()
                .with_context(|| format!("Invalid timeline position `{text}`")),
            None => Ok(Position::end()),
        }
    }
}

/// A timeline and its children
#[derive(Debug, Default, Deserialize)]
pub struct TimelineSpec {
    pub label: Option<String>,
    pub delay: Option<f64>,
    #[serde(rename = "loop")]
    pub loop_count: Option<LoopCount>,
    pub alternate: Option<bool>,
    /// Label name to position, registered before any child is added
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<AnimationSpec>,
}

impl Scene {
    /// Load a scene file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Build an engine over a fresh sink holding the scene's targets
    pub fn build(&self) -> Result<Engine<MemorySink>> {
        let mut sink = MemorySink::new();
        for target in &self.targets {
            for (name, value) in &target.properties {
                sink.insert(TargetId(target.id), name.as_str(), target.kind, value.clone());
            }
        }
        let mut engine = Engine::with_config(sink, self.engine.clone());

        for animation in &self.animations {
            let id = engine.animate(&animation.target_ids(), animation.params());
            debug!(?id, targets = ?animation.targets, "scene animation created");
        }

        for timeline in &self.timelines {
            let mut params = TimelineParams::new();
            if let Some(label) = &timeline.label {
                params = params.label(label.as_str());
            }
            if let Some(delay) = timeline.delay {
                params = params.delay(delay);
            }
            if let Some(count) = timeline.loop_count {
                params = params.looped(count);
            }
            if let Some(alternate) = timeline.alternate {
                params = params.alternate(alternate);
            }
            let tl = engine.create_timeline(params);
            for (name, position) in &timeline.labels {
                let position: Position = position
                    .parse()
                    .with_context(|| format!("Invalid position for label `{name}`"))?;
                engine.timeline_label(tl, name.as_str(), position);
            }
            for child in &timeline.children {
                engine.timeline_add(tl, &child.target_ids(), child.params(), child.position()?);
            }
            debug!(?tl, children = timeline.children.len(), "scene timeline created");
        }

        info!(
            targets = self.targets.len(),
            animations = self.animations.len(),
            timelines = self.timelines.len(),
            "scene loaded"
        );
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
        [engine]
        precision = 2

        [[targets]]
        id = 1
        properties = { x = 0, y = 0, width = "10px" }

        [[animations]]
        targets = [1]
        duration = 1000
        ease = "linear"
        properties = { x = [0, 100], width = "20px" }

        [[timelines]]
        labels = { mid = "500" }

        [[timelines.children]]
        targets = [1]
        position = "mid"
        duration = 200
        properties = { y = 1 }
    "#;

    #[test]
    fn test_parse_scene() {
        let scene = Scene::parse(SCENE).unwrap();
        assert_eq!(scene.engine.precision, 2);
        assert_eq!(scene.targets[0].kind, PropertyKind::Style);
        assert_eq!(scene.animations[0].ease.as_ref().map(Easing::to_string).as_deref(), Some("linear"));
        assert!(matches!(
            scene.animations[0].properties["x"],
            PropertySpec::Sequence(ref values) if values.len() == 2
        ));
        assert_eq!(scene.timelines[0].children[0].position.as_deref(), Some("mid"));
    }

    #[test]
    fn test_build_and_run() {
        let scene = Scene::parse(SCENE).unwrap();
        let mut engine = scene.build().unwrap();
        engine.update(0.0);
        engine.update(500.0);
        assert_eq!(engine.sink().number(TargetId(1), "x"), Some(50.0));
        assert_eq!(engine.sink().get(TargetId(1), "width"), Some(&RawValue::from("15px")));
    }

    #[test]
    fn test_bad_position_is_reported() {
        let mut scene = Scene::parse(SCENE).unwrap();
        scene.timelines[0].children[0].position = Some("mid+=oops".to_string());
        let err = scene.build().unwrap_err();
        assert!(err.to_string().contains("mid+=oops"));
    }

    #[test]
    fn test_unknown_easing_fails_to_parse() {
        let err = Scene::parse("[[animations]]\ntargets = [1]\nease = \"wobble\"").unwrap_err();
        assert!(err.to_string().contains("wobble"));
    }
}
