//! Turns matched style rules into concrete appearance attributes.
//!
//! Symbolizer attribute values are JSON numbers or strings. A string is
//! first read as a literal of the attribute's type; if that fails it is taken
//! as the name of a feature property. Text attributes invert this: the
//! property wins when it exists.

use scene::StyleState;
use scene::components::{
    Appearance, BillboardAttributes, BillboardImage, Color, GeometryKind, LabelAttributes,
    ModelAttributes, PolygonAttributes, PolylineAttributes,
};
use serde_json::Value;
use streaming::Properties;

use crate::filter::{as_number, as_text};
use crate::style::{Style, Symbolizer};

pub const PIN_COLOR: Color = [0.17, 0.45, 0.87, 1.0];
pub const PIN_SIZE_PX: f64 = 32.0;
pub const LINE_COLOR: Color = [1.0, 0.85, 0.0, 1.0];
pub const LINE_WIDTH_PX: f64 = 2.0;
pub const POLYGON_FILL: Color = [1.0, 0.85, 0.0, 0.35];
pub const POLYGON_OUTLINE: Color = [0.0, 0.0, 0.0, 1.0];

/// Appearance from the rules at `matched` (indices into `style.rules`),
/// applied in order so later rules overwrite earlier ones per attribute.
pub fn apply_rules(
    kind: GeometryKind,
    style: &Style,
    matched: &[usize],
    props: &Properties,
) -> Appearance {
    let mut out = Appearance::default();
    for rule in matched.iter().filter_map(|&i| style.rules.get(i)) {
        match kind {
            GeometryKind::Point => {
                if let Some(sym) = &rule.point {
                    apply_billboard(out.billboard.get_or_insert_with(Default::default), sym, props);
                }
                if let Some(sym) = &rule.model {
                    apply_model(out.model.get_or_insert_with(Default::default), sym, props);
                }
            }
            GeometryKind::Line => {
                if let Some(sym) = &rule.line {
                    apply_polyline(out.polyline.get_or_insert_with(Default::default), sym, props);
                }
            }
            GeometryKind::Polygon => {
                if let Some(sym) = &rule.polygon {
                    apply_polygon(out.polygon.get_or_insert_with(Default::default), sym, props);
                }
            }
        }
        if let Some(sym) = &rule.label {
            apply_label(out.label.get_or_insert_with(Default::default), sym, props);
        }
    }
    out
}

/// Styles one feature: matched rules when there are any, the per-geometry
/// default otherwise.
pub fn style_feature(
    kind: GeometryKind,
    style: Option<&Style>,
    matched: &[usize],
    props: &Properties,
) -> (Appearance, StyleState) {
    match style {
        Some(style) if !style.rules.is_empty() && !matched.is_empty() => {
            (apply_rules(kind, style, matched, props), StyleState::Styled)
        }
        _ => (fallback_appearance(kind), StyleState::Fallback),
    }
}

pub fn fallback_appearance(kind: GeometryKind) -> Appearance {
    match kind {
        GeometryKind::Point => Appearance {
            billboard: Some(BillboardAttributes {
                image: Some(BillboardImage::Pin {
                    color: PIN_COLOR,
                    size_px: PIN_SIZE_PX,
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        GeometryKind::Line => Appearance {
            polyline: Some(PolylineAttributes {
                color: Some(LINE_COLOR),
                width_px: Some(LINE_WIDTH_PX),
                dash_length_px: None,
            }),
            ..Default::default()
        },
        GeometryKind::Polygon => Appearance {
            polygon: Some(PolygonAttributes {
                fill: Some(POLYGON_FILL),
                outline: Some(true),
                outline_color: Some(POLYGON_OUTLINE),
                outline_width_px: Some(1.0),
                extruded_height_m: None,
            }),
            ..Default::default()
        },
    }
}

/// Badge for a cluster marker showing its member count.
pub fn cluster_appearance(count: usize) -> Appearance {
    Appearance {
        billboard: Some(BillboardAttributes {
            image: Some(BillboardImage::ClusterBadge { count }),
            ..Default::default()
        }),
        label: Some(LabelAttributes {
            text: Some(count.to_string()),
            fill: Some([1.0, 1.0, 1.0, 1.0]),
            halo_color: Some([0.0, 0.0, 0.0, 1.0]),
            halo_width_px: Some(2.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Re-resolves billboard rotation and model heading/pitch/roll against new
/// properties. Only attributes some matched rule sets are touched.
pub fn refresh_orientation(
    appearance: &mut Appearance,
    style: &Style,
    matched: &[usize],
    props: &Properties,
) {
    for rule in matched.iter().filter_map(|&i| style.rules.get(i)) {
        if let (Some(sym), Some(billboard)) = (&rule.point, appearance.billboard.as_mut()) {
            if let Some(v) = sym.get("rotation") {
                billboard.rotation_deg = number(v, props);
            }
        }
        if let (Some(sym), Some(model)) = (&rule.model, appearance.model.as_mut()) {
            if let Some(v) = sym.get("heading") {
                model.heading_deg = number(v, props);
            }
            if let Some(v) = sym.get("pitch") {
                model.pitch_deg = number(v, props);
            }
            if let Some(v) = sym.get("roll") {
                model.roll_deg = number(v, props);
            }
        }
    }
}

fn apply_billboard(out: &mut BillboardAttributes, sym: &Symbolizer, props: &Properties) {
    for (key, value) in sym {
        match key.as_str() {
            "image" => {
                if let Some(url) = text(value, props) {
                    out.image = Some(BillboardImage::Url(url));
                }
            }
            "color" => out.color = color(value, props),
            "size" => out.size_px = number(value, props),
            "scale" => out.scale = number(value, props),
            "rotation" => out.rotation_deg = number(value, props),
            _ => {}
        }
    }
}

fn apply_label(out: &mut LabelAttributes, sym: &Symbolizer, props: &Properties) {
    for (key, value) in sym {
        match key.as_str() {
            "text" => out.text = text(value, props),
            "font" => out.font = value.as_str().map(str::to_string),
            "fill" => out.fill = color(value, props),
            "haloColor" => out.halo_color = color(value, props),
            "haloWidth" => out.halo_width_px = number(value, props),
            "scale" => out.scale = number(value, props),
            "offsetX" => out.offset_x_px = number(value, props),
            "offsetY" => out.offset_y_px = number(value, props),
            _ => {}
        }
    }
}

fn apply_polyline(out: &mut PolylineAttributes, sym: &Symbolizer, props: &Properties) {
    for (key, value) in sym {
        match key.as_str() {
            "color" => out.color = color(value, props),
            "width" => out.width_px = number(value, props),
            "dashLength" => out.dash_length_px = number(value, props),
            _ => {}
        }
    }
}

fn apply_polygon(out: &mut PolygonAttributes, sym: &Symbolizer, props: &Properties) {
    for (key, value) in sym {
        match key.as_str() {
            "fill" => out.fill = color(value, props),
            "outline" => out.outline = boolean(value, props),
            "outlineColor" => out.outline_color = color(value, props),
            "outlineWidth" => out.outline_width_px = number(value, props),
            "extrudedHeight" => out.extruded_height_m = number(value, props),
            _ => {}
        }
    }
}

fn apply_model(out: &mut ModelAttributes, sym: &Symbolizer, props: &Properties) {
    for (key, value) in sym {
        match key.as_str() {
            "uri" => out.uri = value.as_str().map(str::to_string),
            "color" => out.color = color(value, props),
            "scale" => out.scale = number(value, props),
            "minimumPixelSize" => out.minimum_pixel_size = number(value, props),
            "heading" => out.heading_deg = number(value, props),
            "pitch" => out.pitch_deg = number(value, props),
            "roll" => out.roll_deg = number(value, props),
            _ => {}
        }
    }
}

/// Numeric literal, else the named property coerced to a number.
pub fn number(value: &Value, props: &Properties) -> Option<f64> {
    as_number(value).or_else(|| {
        let name = value.as_str()?;
        as_number(props.get(name)?)
    })
}

/// Color literal, else the named property parsed as a color.
pub fn color(value: &Value, props: &Properties) -> Option<Color> {
    let s = value.as_str()?;
    parse_color(s).or_else(|| parse_color(props.get(s)?.as_str()?))
}

/// The named property's value when it exists, else the literal itself.
pub fn text(value: &Value, props: &Properties) -> Option<String> {
    if let Some(name) = value.as_str() {
        if let Some(prop) = props.get(name).filter(|v| !v.is_null()) {
            return as_text(prop);
        }
    }
    as_text(value)
}

fn boolean(value: &Value, props: &Properties) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match props.get(s.as_str())? {
            Value::Bool(b) => Some(*b),
            Value::String(t) => t.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

/// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)`
/// and a handful of CSS color names.
pub fn parse_color(text: &str) -> Option<Color> {
    let s = text.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<f32> = args
            .split(',')
            .map(|p| p.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
            .collect::<Option<_>>()?;
        return match parts.as_slice() {
            [r, g, b] => Some([channel(*r), channel(*g), channel(*b), 1.0]),
            [r, g, b, a] => Some([channel(*r), channel(*g), channel(*b), a.clamp(0.0, 1.0)]),
            _ => None,
        };
    }
    named_color(&lower)
}

fn channel(v: f32) -> f32 {
    v.clamp(0.0, 255.0) / 255.0
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let unit = |b: u8| b as f32 / 255.0;
    match hex.len() {
        3 => Some([
            unit(digit(0)? * 17),
            unit(digit(1)? * 17),
            unit(digit(2)? * 17),
            1.0,
        ]),
        6 => Some([unit(byte(0)?), unit(byte(2)?), unit(byte(4)?), 1.0]),
        8 => Some([unit(byte(0)?), unit(byte(2)?), unit(byte(4)?), unit(byte(6)?)]),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    Some(match name {
        "black" => [0.0, 0.0, 0.0, 1.0],
        "white" => [1.0, 1.0, 1.0, 1.0],
        "red" => [1.0, 0.0, 0.0, 1.0],
        "green" => [0.0, 128.0 / 255.0, 0.0, 1.0],
        "blue" => [0.0, 0.0, 1.0, 1.0],
        "yellow" => [1.0, 1.0, 0.0, 1.0],
        "transparent" => [0.0, 0.0, 0.0, 0.0],
        _ => return None,
    })
}
