//! Reading package text.
//!
//! A [`PackageLoader`] parses one package and reports its contents to a
//! [`PackageBuilder`]. Prototypes are loaded on demand: an instance whose
//! prototype sits further down the same section loads that prototype first.
//! Imported packages the builder does not know yet are loaded recursively by a
//! nested loader.

use std::rc::Rc;

use serde_json::{Map, Value as Json};

use super::builder::{ControlPlace, PackageBuilder};
use super::source::PackageSource;
use super::value;
use super::{
    CURRENT_VERSION, LEGACY_ALIGNS_VERSION, LEGACY_BACKGROUND_VERSION, LEGACY_ORIENTATION_VERSION,
    MIN_SUPPORTED_VERSION,
};
use crate::css::parser::parse_selector_list;
use crate::css::stylesheet::StyleProperty;
use crate::css::transition::{Interpolation, TransitionSpec};
use crate::error::LoadError;
use crate::registry::{enums, ComponentKind, Value};

/// Pre-anchor alignment keys and the anchor fields they became.
const LEGACY_ALIGNS: [(&str, &str); 6] = [
    ("leftAlign", "leftAnchor"),
    ("hcenterAlign", "hCenterAnchor"),
    ("rightAlign", "rightAnchor"),
    ("topAlign", "topAnchor"),
    ("vcenterAlign", "vCenterAnchor"),
    ("bottomAlign", "bottomAnchor"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Wait,
    Loading,
    Loaded,
}

#[derive(Debug)]
struct QueueItem {
    name: String,
    status: Status,
}

/// Controls of the section being loaded, by position.
struct Queue {
    items: Vec<QueueItem>,
    nodes: Rc<[Json]>,
    place: ControlPlace,
}

pub struct PackageLoader<'s> {
    source: &'s dyn PackageSource,
    /// Paths of the packages being loaded, outermost first.
    chain: Vec<String>,
    version: u32,
    queue: Option<Queue>,
}

impl<'s> PackageLoader<'s> {
    pub fn new(source: &'s dyn PackageSource) -> Self {
        Self {
            source,
            chain: Vec::new(),
            version: CURRENT_VERSION,
            queue: None,
        }
    }

    /// Load the package at `path`, read from the source.
    pub fn load_package(
        &mut self,
        path: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        let text = self.source.read(path)?;
        self.load_text(&text, path, builder)
    }

    /// Load `text` as the package at `path`.
    pub fn load_text(
        &mut self,
        text: &str,
        path: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        self.chain.push(path.to_owned());
        self.load(text, path, builder)
    }

    /// Load `text` that is not a package of its own, such as clipboard
    /// contents. It may import the package at `path`.
    pub fn load_fragment(
        &mut self,
        text: &str,
        path: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        self.load(text, path, builder)
    }

    fn load(
        &mut self,
        text: &str,
        path: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        if text.trim().is_empty() {
            builder.begin_package(path)?;
            return builder.end_package();
        }

        let root: Json = serde_json::from_str(text)?;
        let root = root
            .as_object()
            .ok_or_else(|| LoadError::Malformed("top level must be a map".to_owned()))?;
        let version = read_version(root)?;
        tracing::debug!(path, version, "loading package");

        builder.begin_package(path)?;

        if let Some(imports) = root.get("ImportedPackages") {
            for import in array(imports, "ImportedPackages")? {
                let import = import.as_str().ok_or_else(|| {
                    LoadError::Malformed("imported package paths must be strings".to_owned())
                })?;
                self.import(import, builder)?;
            }
        }

        self.version = version;

        if let Some(sheets) = root.get("StyleSheets") {
            self.load_style_sheets(sheets, builder)?;
        }
        if let Some(prototypes) = root.get("Prototypes") {
            self.load_section(prototypes, ControlPlace::Prototypes, builder)?;
        }
        if let Some(controls) = root.get("Controls") {
            self.load_section(controls, ControlPlace::Controls, builder)?;
        }

        builder.end_package()
    }

    fn import(&mut self, path: &str, builder: &mut dyn PackageBuilder) -> Result<(), LoadError> {
        if self.chain.iter().any(|p| p == path) {
            return Err(LoadError::ImportCycle(path.to_owned()));
        }
        if builder.process_imported_package(path)? {
            return Ok(());
        }
        let mut nested = PackageLoader {
            source: self.source,
            chain: self.chain.clone(),
            version: CURRENT_VERSION,
            queue: None,
        };
        nested.load_package(path, builder)
    }

    // -----------------------------------------------------------------------
    // Style sheets
    // -----------------------------------------------------------------------

    fn load_style_sheets(
        &mut self,
        sheets: &Json,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        let registry = builder.registry();
        let interpolation = registry.enum_map(enums::INTERPOLATION);

        for sheet in array(sheets, "StyleSheets")? {
            let sheet = object(sheet, "style sheet")?;
            let selector = sheet
                .get("selector")
                .and_then(Json::as_str)
                .ok_or(LoadError::MissingKey("selector"))?;
            let selectors = parse_selector_list(selector)?;

            let mut properties = Vec::new();
            if let Some(map) = sheet.get("properties") {
                for (name, node) in object(map, "properties")? {
                    let Some(descriptor) = registry.style_property_by_name(name) else {
                        tracing::warn!(property = %name, selector, "unknown style property");
                        continue;
                    };
                    let (json, transition) = match node {
                        Json::Object(entry) => {
                            let json = entry.get("value").ok_or(LoadError::MissingKey("value"))?;
                            let transition = match entry.get("transitionTime") {
                                Some(time) => {
                                    let duration = time.as_f64().ok_or_else(|| {
                                        invalid(name, "transitionTime must be a number")
                                    })?;
                                    let function = match entry
                                        .get("transitionFunction")
                                        .and_then(Json::as_str)
                                    {
                                        Some(f) => interpolation
                                            .to_value(f)
                                            .and_then(Interpolation::from_code)
                                            .ok_or_else(|| {
                                                invalid(name, &format!("unknown interpolation '{f}'"))
                                            })?,
                                        None => Interpolation::Linear,
                                    };
                                    Some(TransitionSpec::new(duration, function))
                                }
                                None => None,
                            };
                            (json, transition)
                        }
                        other => (other, None),
                    };
                    let value = value::decode(&registry, name, descriptor.kind, json)?;
                    let mut property = StyleProperty::new(descriptor.index, value);
                    property.transition = transition;
                    properties.push(property);
                }
            }
            builder.process_style_sheet(selectors, properties);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    fn load_section(
        &mut self,
        section: &Json,
        place: ControlPlace,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        let nodes: Rc<[Json]> = array(section, "control section")?.to_vec().into();
        let items = nodes
            .iter()
            .map(|n| QueueItem {
                name: n
                    .get("name")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                status: Status::Wait,
            })
            .collect();
        self.queue = Some(Queue {
            items,
            nodes: Rc::clone(&nodes),
            place,
        });

        for i in 0..nodes.len() {
            let waiting = self
                .queue
                .as_ref()
                .is_some_and(|q| q.items[i].status == Status::Wait);
            if waiting {
                self.load_queued(i, builder)?;
            }
        }
        self.queue = None;
        Ok(())
    }

    fn load_queued(&mut self, i: usize, builder: &mut dyn PackageBuilder) -> Result<(), LoadError> {
        let Some(queue) = self.queue.as_mut() else {
            return Ok(());
        };
        queue.items[i].status = Status::Loading;
        let nodes = Rc::clone(&queue.nodes);
        let place = queue.place;
        self.load_control(&nodes[i], place, builder)?;
        if let Some(queue) = self.queue.as_mut() {
            queue.items[i].status = Status::Loaded;
        }
        Ok(())
    }

    /// Load the not yet loaded control `name` of the current section.
    /// Returns `false` if there is none, or it is being loaded already (a
    /// control that is its own prototype).
    fn load_control_by_name(
        &mut self,
        name: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<bool, LoadError> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(false);
        };
        let Some(i) = queue.items.iter().position(|item| item.name == name) else {
            return Ok(false);
        };
        match queue.items[i].status {
            Status::Wait => {
                tracing::trace!(name, "loading prototype ahead of its instance");
                self.load_queued(i, builder)?;
                Ok(true)
            }
            Status::Loaded => Ok(true),
            Status::Loading => Ok(false),
        }
    }

    fn load_control(
        &mut self,
        node: &Json,
        place: ControlPlace,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        let control = object(node, "control")?;
        let custom_class = control.get("customClass").and_then(Json::as_str);
        let mut from_class = false;

        let class = if let Some(path) = control.get("path") {
            let path = string(path, "path")?;
            builder.begin_control_with_path(path, custom_class)?
        } else {
            let name = control
                .get("name")
                .and_then(Json::as_str)
                .ok_or(LoadError::MissingKey("name"))?;
            if let Some(prototype) = control.get("prototype") {
                let prototype = string(prototype, "prototype")?;
                let (package, proto_name) = match prototype.split_once('/') {
                    Some((package, proto_name)) => (Some(package), proto_name),
                    None => (None, prototype),
                };
                match builder.begin_control_with_prototype(name, package, proto_name, custom_class)? {
                    Some(class) => class,
                    None => {
                        let retried = if package.is_none()
                            && self.load_control_by_name(proto_name, builder)?
                        {
                            builder.begin_control_with_prototype(name, None, proto_name, custom_class)?
                        } else {
                            None
                        };
                        retried.ok_or_else(|| LoadError::UnknownPrototype(prototype.to_owned()))?
                    }
                }
            } else if let Some(class) = control.get("class") {
                let class = string(class, "class")?;
                from_class = true;
                match custom_class {
                    Some(custom) => builder.begin_control_with_custom_class(name, custom, class)?,
                    None => builder.begin_control_with_class(name, class)?,
                }
            } else {
                return Err(LoadError::MissingKey("class"));
            }
        };

        self.load_control_properties(control, &class, builder)?;
        let has_background = self.load_components(control, builder)?;
        if from_class && !has_background && self.version <= LEGACY_BACKGROUND_VERSION {
            builder.begin_component_properties_section(ComponentKind::Background, 0)?;
            builder.end_component_properties_section();
        }
        if self.version <= LEGACY_ALIGNS_VERSION {
            load_legacy_aligns(control, builder)?;
        }

        if let Some(children) = control.get("children") {
            for child in array(children, "children")? {
                self.load_control(child, ControlPlace::PreviousControl, builder)?;
            }
        }
        builder.end_control(place)
    }

    fn load_control_properties(
        &self,
        control: &Map<String, Json>,
        class: &str,
        builder: &mut dyn PackageBuilder,
    ) -> Result<(), LoadError> {
        let registry = builder.registry();
        for section in registry.class_sections(class) {
            let present: Vec<_> = section
                .properties
                .iter()
                .filter_map(|d| Some((d, control.get(d.name)?)))
                .collect();
            if present.is_empty() {
                continue;
            }
            builder.begin_control_properties_section(section.name)?;
            for (descriptor, json) in present {
                let value = value::decode(&registry, descriptor.name, descriptor.kind, json)?;
                builder.process_property(descriptor.name, value)?;
            }
            builder.end_control_properties_section();
        }
        Ok(())
    }

    /// Returns whether a `Background` component was listed.
    fn load_components(
        &self,
        control: &Map<String, Json>,
        builder: &mut dyn PackageBuilder,
    ) -> Result<bool, LoadError> {
        let Some(components) = control.get("components") else {
            return Ok(false);
        };
        let registry = builder.registry();
        let mut has_background = false;

        for (key, fields) in object(components, "components")? {
            let (kind, index) = parse_component_key(key)?;
            has_background |= kind == ComponentKind::Background;
            let fields = object(fields, "component")?;

            builder.begin_component_properties_section(kind, index)?;
            for descriptor in &registry.component(kind).properties {
                let Some(json) = fields.get(descriptor.name) else {
                    continue;
                };
                let legacy = (kind == ComponentKind::LinearLayout
                    && descriptor.name == "orientation"
                    && self.version <= LEGACY_ORIENTATION_VERSION)
                    .then(|| legacy_orientation(json))
                    .flatten();
                let value = match legacy {
                    Some(value) => value,
                    None => value::decode(&registry, descriptor.name, descriptor.kind, json)?,
                };
                builder.process_property(descriptor.name, value)?;
            }
            builder.end_component_properties_section();
        }
        Ok(has_background)
    }
}

fn read_version(root: &Map<String, Json>) -> Result<u32, LoadError> {
    let header = root
        .get("Header")
        .and_then(Json::as_object)
        .ok_or(LoadError::MissingHeader)?;
    let version = header
        .get("version")
        .ok_or(LoadError::MissingKey("version"))?;
    let text = version
        .as_str()
        .ok_or_else(|| LoadError::BadVersion(version.to_string()))?;
    let version: u32 = text
        .parse()
        .map_err(|_| LoadError::BadVersion(text.to_owned()))?;
    if !(MIN_SUPPORTED_VERSION..=CURRENT_VERSION).contains(&version) {
        return Err(LoadError::UnsupportedVersion {
            version,
            min: MIN_SUPPORTED_VERSION,
            max: CURRENT_VERSION,
        });
    }
    Ok(version)
}

/// Split `Action2` into the component kind and index; no digits means 0.
fn parse_component_key(key: &str) -> Result<(ComponentKind, u32), LoadError> {
    let name = key.trim_end_matches(|c: char| c.is_ascii_digit());
    let unknown = || LoadError::UnknownComponent(key.to_owned());
    let kind = ComponentKind::from_name(name).ok_or_else(unknown)?;
    let index = match &key[name.len()..] {
        "" => 0,
        digits => digits.parse().map_err(|_| unknown())?,
    };
    Ok((kind, index))
}

/// Orientation used to be written as `Horizontal` or `Vertical`.
fn legacy_orientation(json: &Json) -> Option<Value> {
    match json.as_str()? {
        "Horizontal" => Some(Value::Int(0)),
        "Vertical" => Some(Value::Int(2)),
        _ => None,
    }
}

fn load_legacy_aligns(
    control: &Map<String, Json>,
    builder: &mut dyn PackageBuilder,
) -> Result<(), LoadError> {
    let mut found = Vec::new();
    for (old, new) in LEGACY_ALIGNS {
        if let Some(json) = control.get(&format!("{old}Enabled")) {
            let enabled = json
                .as_bool()
                .ok_or_else(|| invalid(old, "expected a boolean"))?;
            found.push((format!("{new}Enabled"), Value::Bool(enabled)));
        }
        if let Some(json) = control.get(old) {
            let offset = json
                .as_f64()
                .ok_or_else(|| invalid(old, "expected a number"))?;
            found.push((new.to_owned(), Value::Float(offset)));
        }
    }
    if found.is_empty() {
        return Ok(());
    }
    builder.begin_component_properties_section(ComponentKind::Anchor, 0)?;
    for (name, value) in found {
        builder.process_property(&name, value)?;
    }
    builder.end_component_properties_section();
    Ok(())
}

fn array<'j>(json: &'j Json, what: &str) -> Result<&'j Vec<Json>, LoadError> {
    json.as_array()
        .ok_or_else(|| LoadError::Malformed(format!("{what} must be a list")))
}

fn object<'j>(json: &'j Json, what: &str) -> Result<&'j Map<String, Json>, LoadError> {
    json.as_object()
        .ok_or_else(|| LoadError::Malformed(format!("{what} must be a map")))
}

fn string<'j>(json: &'j Json, key: &str) -> Result<&'j str, LoadError> {
    json.as_str()
        .ok_or_else(|| LoadError::Malformed(format!("'{key}' must be a string")))
}

fn invalid(property: &str, reason: &str) -> LoadError {
    LoadError::InvalidValue {
        property: property.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::source::MemorySource;
    use crate::css::model::Selector;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;

    #[test]
    fn component_keys() {
        assert_eq!(parse_component_key("Action12").unwrap(), (ComponentKind::Action, 12));
        assert_eq!(parse_component_key("Background").unwrap(), (ComponentKind::Background, 0));
        assert!(matches!(
            parse_component_key("Sound0"),
            Err(LoadError::UnknownComponent(ref k)) if k == "Sound0"
        ));
    }

    #[test]
    fn version_must_be_a_supported_string() {
        let parse = |text: &str| {
            let json: Json = serde_json::from_str(text).unwrap();
            read_version(json.as_object().unwrap())
        };
        assert_eq!(parse(r#"{"Header": {"version": "3"}}"#).unwrap(), 3);
        assert_eq!(parse(r#"{}"#), Err(LoadError::MissingHeader));
        assert_eq!(parse(r#"{"Header": {}}"#), Err(LoadError::MissingKey("version")));
        assert_eq!(
            parse(r#"{"Header": {"version": 3}}"#),
            Err(LoadError::BadVersion("3".to_owned()))
        );
        assert!(matches!(
            parse(r#"{"Header": {"version": "99"}}"#),
            Err(LoadError::UnsupportedVersion { version: 99, .. })
        ));
    }

    /// Records the events a loader emits.
    struct Recorder {
        events: Vec<String>,
        registry: Rc<Registry>,
    }

    fn recorder() -> Recorder {
        Recorder {
            events: Vec::new(),
            registry: Rc::new(Registry::with_defaults()),
        }
    }

    impl PackageBuilder for Recorder {
        fn registry(&self) -> Rc<Registry> {
            Rc::clone(&self.registry)
        }
        fn begin_package(&mut self, path: &str) -> Result<(), LoadError> {
            self.events.push(format!("begin {path}"));
            Ok(())
        }
        fn end_package(&mut self) -> Result<(), LoadError> {
            self.events.push("end".to_owned());
            Ok(())
        }
        fn process_imported_package(&mut self, path: &str) -> Result<bool, LoadError> {
            self.events.push(format!("import {path}"));
            Ok(false)
        }
        fn process_style_sheet(&mut self, selectors: Vec<Selector>, properties: Vec<StyleProperty>) {
            self.events.push(format!("style {} ({})", selectors.len(), properties.len()));
        }
        fn begin_control_with_class(&mut self, name: &str, class: &str) -> Result<String, LoadError> {
            self.events.push(format!("control {name}: {class}"));
            Ok(class.to_owned())
        }
        fn begin_control_with_custom_class(&mut self, name: &str, custom: &str, class: &str) -> Result<String, LoadError> {
            self.events.push(format!("control {name}: {class} as {custom}"));
            Ok(class.to_owned())
        }
        fn begin_control_with_prototype(
            &mut self,
            name: &str,
            package: Option<&str>,
            prototype: &str,
            _custom_class: Option<&str>,
        ) -> Result<Option<String>, LoadError> {
            let loaded = self.events.iter().any(|e| e.starts_with(&format!("control {prototype}:")));
            if package.is_none() && !loaded {
                return Ok(None);
            }
            self.events.push(format!("instance {name} of {prototype}"));
            Ok(Some("UIControl".to_owned()))
        }
        fn begin_control_with_path(&mut self, path: &str, _custom_class: Option<&str>) -> Result<String, LoadError> {
            self.events.push(format!("path {path}"));
            Ok("UIControl".to_owned())
        }
        fn end_control(&mut self, place: ControlPlace) -> Result<(), LoadError> {
            self.events.push(format!("end control {place:?}"));
            Ok(())
        }
        fn begin_control_properties_section(&mut self, section: &str) -> Result<(), LoadError> {
            self.events.push(format!("section {section}"));
            Ok(())
        }
        fn end_control_properties_section(&mut self) {}
        fn begin_component_properties_section(&mut self, kind: ComponentKind, index: u32) -> Result<(), LoadError> {
            self.events.push(format!("component {kind}{index}"));
            Ok(())
        }
        fn end_component_properties_section(&mut self) {}
        fn process_property(&mut self, name: &str, value: Value) -> Result<(), LoadError> {
            self.events.push(format!("{name} = {value:?}"));
            Ok(())
        }
    }

    #[test]
    fn prototypes_load_before_their_instances() {
        let text = r#"{
            "Header": {"version": "5"},
            "Prototypes": [
                {"prototype": "Base", "name": "Derived"},
                {"class": "UIControl", "name": "Base", "angle": 90.0}
            ]
        }"#;
        let source = MemorySource::new();
        let mut recorder = recorder();
        PackageLoader::new(&source)
            .load_text(text, "Main.yaml", &mut recorder)
            .unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "begin Main.yaml",
                "control Base: UIControl",
                "section UIControl",
                "angle = Float(90.0)",
                "end control Prototypes",
                "instance Derived of Base",
                "end control Prototypes",
                "end",
            ]
        );
    }

    #[test]
    fn legacy_versions_are_migrated() {
        let text = r#"{
            "Header": {"version": "1"},
            "Controls": [{
                "class": "UIControl",
                "name": "Panel",
                "leftAlignEnabled": true,
                "leftAlign": 4.0,
                "components": {"LinearLayout": {"orientation": "Vertical"}}
            }]
        }"#;
        let source = MemorySource::new();
        let mut recorder = recorder();
        PackageLoader::new(&source)
            .load_text(text, "Old.yaml", &mut recorder)
            .unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "begin Old.yaml",
                "control Panel: UIControl",
                "component LinearLayout0",
                "orientation = Int(2)",
                "component Background0",
                "component Anchor0",
                "leftAnchorEnabled = Bool(true)",
                "leftAnchor = Float(4.0)",
                "end control Controls",
                "end",
            ]
        );
    }

    #[test]
    fn import_cycles_are_reported() {
        let source = MemorySource::new()
            .with("A.yaml", r#"{"Header": {"version": "5"}, "ImportedPackages": ["B.yaml"]}"#)
            .with("B.yaml", r#"{"Header": {"version": "5"}, "ImportedPackages": ["A.yaml"]}"#);
        let mut recorder = recorder();
        let err = PackageLoader::new(&source)
            .load_package("A.yaml", &mut recorder)
            .unwrap_err();
        assert_eq!(err, LoadError::ImportCycle("A.yaml".to_owned()));
    }
}
