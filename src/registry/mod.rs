//! Control classes, components, style properties and enum tables.
//!
//! A [`Registry`] is built once with [`Registry::with_defaults`] and shared by
//! reference (`Rc<Registry>`) with every document that uses it. Nothing in the
//! crate reaches for global tables.

pub mod descriptor;
pub mod value;

use std::rc::Rc;

pub use descriptor::{
    ComponentKind, EnumId, EnumMap, PropertyDescriptor, PropertyKind, SectionDescriptor,
    StylePropertyDescriptor, StylePropertySet, StyleTarget,
};
pub use value::{Color, Value, Vec2};

/// Ids of the built-in enum tables.
pub mod enums {
    use super::EnumId;

    pub const INTERPOLATION: EnumId = EnumId(0);
    pub const ORIENTATION: EnumId = EnumId(1);
    pub const DRAW_TYPE: EnumId = EnumId(2);
    pub const MULTILINE: EnumId = EnumId(3);
    pub const ALIGN: EnumId = EnumId(4);
    pub const FITTING: EnumId = EnumId(5);
    pub const SIZE_POLICY: EnumId = EnumId(6);
}

/// Name of the `UIControl` property that holds the space separated class list.
pub const CLASSES_PROPERTY: &str = "classes";

/// A control class: its own property section, its base class and the
/// components every control of this class carries intrinsically.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: &'static str,
    pub base: Option<&'static str>,
    pub section: Rc<SectionDescriptor>,
    pub default_components: Vec<ComponentKind>,
}

/// Style properties as `(style name, target)`; the index is the row number.
const STYLE_TABLE: &[(&str, StyleTarget)] = &[
    ("angle", StyleTarget::Control("angle")),
    ("scale", StyleTarget::Control("scale")),
    ("pivot", StyleTarget::Control("pivot")),
    ("visible", StyleTarget::Control("visible")),
    ("input", StyleTarget::Control("input")),
    ("font", StyleTarget::Control("font")),
    ("textColor", StyleTarget::Control("textColor")),
    ("textAlign", StyleTarget::Control("textAlign")),
    ("shadowOffset", StyleTarget::Control("shadowOffset")),
    ("shadowColor", StyleTarget::Control("shadowColor")),
    (
        "bg-drawType",
        StyleTarget::Component(ComponentKind::Background, "drawType"),
    ),
    (
        "bg-sprite",
        StyleTarget::Component(ComponentKind::Background, "sprite"),
    ),
    (
        "bg-color",
        StyleTarget::Component(ComponentKind::Background, "color"),
    ),
    (
        "layout-spacing",
        StyleTarget::Component(ComponentKind::LinearLayout, "spacing"),
    ),
    (
        "layout-padding",
        StyleTarget::Component(ComponentKind::LinearLayout, "padding"),
    ),
];

/// The registry of everything a document can describe.
#[derive(Debug)]
pub struct Registry {
    enums: Vec<EnumMap>,
    classes: Vec<ClassDescriptor>,
    components: Vec<Rc<SectionDescriptor>>,
    style_properties: Vec<StylePropertyDescriptor>,
    name: Rc<PropertyDescriptor>,
    custom_class: Rc<PropertyDescriptor>,
}

impl Registry {
    /// Build the standard class, component, style and enum tables.
    pub fn with_defaults() -> Self {
        let enums = vec![
            EnumMap::new(
                "Interpolation",
                &[
                    ("LINEAR", 0),
                    ("EASE_IN", 1),
                    ("EASE_OUT", 2),
                    ("EASE_IN_OUT", 3),
                    ("SINE_IN", 4),
                    ("SINE_OUT", 5),
                    ("SINE_IN_OUT", 6),
                ],
            ),
            EnumMap::new(
                "Orientation",
                &[
                    ("LeftToRight", 0),
                    ("RightToLeft", 1),
                    ("TopDown", 2),
                    ("BottomUp", 3),
                ],
            ),
            EnumMap::new(
                "DrawType",
                &[
                    ("DRAW_ASSIGNED_SPRITE", 0),
                    ("DRAW_FILL", 1),
                    ("DRAW_STRETCH_HORIZONTAL", 2),
                    ("DRAW_STRETCH_VERTICAL", 3),
                    ("DRAW_STRETCH_BOTH", 4),
                    ("DRAW_TILED", 5),
                ],
            ),
            EnumMap::new(
                "Multiline",
                &[
                    ("MULTILINE_DISABLED", 0),
                    ("MULTILINE_ENABLED", 1),
                    ("MULTILINE_ENABLED_BY_SYMBOL", 2),
                ],
            ),
            EnumMap::new(
                "Align",
                &[
                    ("LEFT", 1),
                    ("HCENTER", 2),
                    ("RIGHT", 4),
                    ("TOP", 8),
                    ("VCENTER", 16),
                    ("BOTTOM", 32),
                ],
            ),
            EnumMap::new(
                "Fitting",
                &[("ENLARGE", 1), ("REDUCE", 2), ("POINTS", 4)],
            ),
            EnumMap::new(
                "SizePolicy",
                &[
                    ("IgnoreSize", 0),
                    ("FixedSize", 1),
                    ("PercentOfChildrenSum", 2),
                    ("PercentOfMaxChild", 3),
                    ("PercentOfFirstChild", 4),
                    ("PercentOfLastChild", 5),
                    ("PercentOfContent", 6),
                    ("PercentOfParent", 7),
                ],
            ),
        ];

        use PropertyKind as K;

        let control = |name: &'static str, kind: PropertyKind, default: Value| {
            Rc::new(PropertyDescriptor {
                name,
                kind,
                default,
                read_only: false,
                style_index: style_index_of(StyleTarget::Control(name)),
            })
        };
        let field = |owner: ComponentKind, name: &'static str, kind: PropertyKind, default: Value| {
            Rc::new(PropertyDescriptor {
                name,
                kind,
                default,
                read_only: false,
                style_index: style_index_of(StyleTarget::Component(owner, name)),
            })
        };
        let section = |name: &'static str, properties: Vec<Rc<PropertyDescriptor>>| {
            Rc::new(SectionDescriptor { name, properties })
        };

        let classes = vec![
            ClassDescriptor {
                name: "UIControl",
                base: None,
                section: section(
                    "UIControl",
                    vec![
                        control("position", K::Vector2, Vec2::ZERO.into()),
                        control("size", K::Vector2, Vec2::ZERO.into()),
                        control("scale", K::Vector2, Vec2::ONE.into()),
                        control("pivot", K::Vector2, Vec2::ZERO.into()),
                        control("angle", K::Float, Value::Float(0.0)),
                        control("visible", K::Bool, Value::Bool(true)),
                        control("input", K::Bool, Value::Bool(true)),
                        control("exclusiveInput", K::Bool, Value::Bool(false)),
                        control("clip", K::Bool, Value::Bool(false)),
                        control("debugDraw", K::Bool, Value::Bool(false)),
                        control("tag", K::Int, Value::Int(0)),
                        control(CLASSES_PROPERTY, K::String, Value::from("")),
                    ],
                ),
                default_components: Vec::new(),
            },
            ClassDescriptor {
                name: "UIStaticText",
                base: Some("UIControl"),
                section: section(
                    "UIStaticText",
                    vec![
                        control("text", K::String, Value::from("")),
                        control("font", K::String, Value::from("")),
                        control("textColor", K::Color, Color::WHITE.into()),
                        control("textAlign", K::Flags(enums::ALIGN), Value::Int(18)),
                        control("multiline", K::Enum(enums::MULTILINE), Value::Int(0)),
                        control("fitting", K::Flags(enums::FITTING), Value::Int(0)),
                        control("shadowOffset", K::Vector2, Vec2::ZERO.into()),
                        control("shadowColor", K::Color, Color::BLACK.into()),
                    ],
                ),
                default_components: Vec::new(),
            },
            ClassDescriptor {
                name: "UIButton",
                base: Some("UIControl"),
                section: section(
                    "UIButton",
                    vec![control("clickSound", K::String, Value::from(""))],
                ),
                default_components: vec![ComponentKind::Background],
            },
            ClassDescriptor {
                name: "UITextField",
                base: Some("UIControl"),
                section: section(
                    "UITextField",
                    vec![
                        control("text", K::String, Value::from("")),
                        control("font", K::String, Value::from("")),
                        control("textColor", K::Color, Color::WHITE.into()),
                        control("maxLength", K::Int, Value::Int(-1)),
                        control("isPassword", K::Bool, Value::Bool(false)),
                    ],
                ),
                default_components: vec![ComponentKind::Background],
            },
            ClassDescriptor {
                name: "UIScrollView",
                base: Some("UIControl"),
                section: section(
                    "UIScrollView",
                    vec![
                        control("autoUpdate", K::Bool, Value::Bool(false)),
                        control("centerContent", K::Bool, Value::Bool(false)),
                    ],
                ),
                default_components: Vec::new(),
            },
        ];

        use ComponentKind as C;

        let components = vec![
            section(
                "Background",
                vec![
                    field(C::Background, "drawType", K::Enum(enums::DRAW_TYPE), Value::Int(0)),
                    field(C::Background, "sprite", K::String, Value::from("")),
                    field(C::Background, "frame", K::Int, Value::Int(0)),
                    field(C::Background, "color", K::Color, Color::WHITE.into()),
                    field(C::Background, "perPixelAccuracy", K::Bool, Value::Bool(false)),
                ],
            ),
            section(
                "Anchor",
                [
                    "leftAnchor",
                    "hCenterAnchor",
                    "rightAnchor",
                    "topAnchor",
                    "vCenterAnchor",
                    "bottomAnchor",
                ]
                .into_iter()
                .flat_map(|side| {
                    let enabled: &'static str = match side {
                        "leftAnchor" => "leftAnchorEnabled",
                        "hCenterAnchor" => "hCenterAnchorEnabled",
                        "rightAnchor" => "rightAnchorEnabled",
                        "topAnchor" => "topAnchorEnabled",
                        "vCenterAnchor" => "vCenterAnchorEnabled",
                        _ => "bottomAnchorEnabled",
                    };
                    [
                        field(C::Anchor, enabled, K::Bool, Value::Bool(false)),
                        field(C::Anchor, side, K::Float, Value::Float(0.0)),
                    ]
                })
                .collect(),
            ),
            section(
                "LinearLayout",
                vec![
                    field(C::LinearLayout, "enabled", K::Bool, Value::Bool(true)),
                    field(
                        C::LinearLayout,
                        "orientation",
                        K::Enum(enums::ORIENTATION),
                        Value::Int(0),
                    ),
                    field(C::LinearLayout, "padding", K::Float, Value::Float(0.0)),
                    field(C::LinearLayout, "dynamicPadding", K::Bool, Value::Bool(false)),
                    field(C::LinearLayout, "spacing", K::Float, Value::Float(0.0)),
                    field(C::LinearLayout, "dynamicSpacing", K::Bool, Value::Bool(false)),
                ],
            ),
            section(
                "SizePolicy",
                vec![
                    field(
                        C::SizePolicy,
                        "horizontalPolicy",
                        K::Enum(enums::SIZE_POLICY),
                        Value::Int(0),
                    ),
                    field(C::SizePolicy, "horizontalValue", K::Float, Value::Float(100.0)),
                    field(
                        C::SizePolicy,
                        "verticalPolicy",
                        K::Enum(enums::SIZE_POLICY),
                        Value::Int(0),
                    ),
                    field(C::SizePolicy, "verticalValue", K::Float, Value::Float(100.0)),
                ],
            ),
            section(
                "Action",
                vec![
                    field(C::Action, "action", K::String, Value::from("")),
                    field(C::Action, "shortcut", K::String, Value::from("")),
                ],
            ),
        ];

        let mut registry = Self {
            enums,
            classes,
            components,
            style_properties: Vec::new(),
            name: Rc::new(PropertyDescriptor {
                name: "name",
                kind: PropertyKind::String,
                default: Value::from(""),
                read_only: false,
                style_index: None,
            }),
            custom_class: Rc::new(PropertyDescriptor {
                name: "customClass",
                kind: PropertyKind::String,
                default: Value::from(""),
                read_only: false,
                style_index: None,
            }),
        };
        registry.style_properties = registry.build_style_table();
        registry
    }

    fn build_style_table(&self) -> Vec<StylePropertyDescriptor> {
        assert!(STYLE_TABLE.len() <= StylePropertySet::CAPACITY);
        STYLE_TABLE
            .iter()
            .enumerate()
            .map(|(index, (name, target))| {
                let descriptor = match target {
                    StyleTarget::Control(prop) => self
                        .classes
                        .iter()
                        .flat_map(|c| c.section.properties.iter())
                        .find(|p| p.name == *prop),
                    StyleTarget::Component(kind, prop) => self
                        .component(*kind)
                        .properties
                        .iter()
                        .find(|p| p.name == *prop),
                };
                let descriptor = descriptor
                    .unwrap_or_else(|| panic!("style property {name} has no target property"));
                StylePropertyDescriptor {
                    index,
                    name,
                    target: *target,
                    kind: descriptor.kind,
                    default: descriptor.default.clone(),
                }
            })
            .collect()
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    /// Property sections of `class`, base class first. Empty for unknown classes.
    pub fn class_sections(&self, class: &str) -> Vec<Rc<SectionDescriptor>> {
        let mut chain = Vec::new();
        let mut current = self.class(class);
        while let Some(descriptor) = current {
            chain.push(Rc::clone(&descriptor.section));
            current = descriptor.base.and_then(|b| self.class(b));
        }
        chain.reverse();
        chain
    }

    pub fn component(&self, kind: ComponentKind) -> &Rc<SectionDescriptor> {
        &self.components[kind.ordinal()]
    }

    pub fn enum_map(&self, id: EnumId) -> &EnumMap {
        &self.enums[id.0]
    }

    pub fn style_properties(&self) -> &[StylePropertyDescriptor] {
        &self.style_properties
    }

    pub fn style_property(&self, index: usize) -> &StylePropertyDescriptor {
        &self.style_properties[index]
    }

    pub fn style_property_by_name(&self, name: &str) -> Option<&StylePropertyDescriptor> {
        self.style_properties.iter().find(|p| p.name == name)
    }

    pub fn name_descriptor(&self) -> &Rc<PropertyDescriptor> {
        &self.name
    }

    pub fn custom_class_descriptor(&self) -> &Rc<PropertyDescriptor> {
        &self.custom_class
    }
}

fn style_index_of(target: StyleTarget) -> Option<usize> {
    STYLE_TABLE.iter().position(|(_, t)| *t == target)
}
