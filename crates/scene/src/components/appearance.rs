/// Linear RGBA in `[0, 1]`.
pub type Color = [f32; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum BillboardImage {
    /// Programmatically drawn map pin.
    Pin { color: Color, size_px: f64 },
    Url(String),
    /// Round badge showing a cluster's member count.
    ClusterBadge { count: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillboardAttributes {
    pub image: Option<BillboardImage>,
    pub color: Option<Color>,
    pub size_px: Option<f64>,
    pub scale: Option<f64>,
    pub rotation_deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelAttributes {
    pub text: Option<String>,
    pub font: Option<String>,
    pub fill: Option<Color>,
    pub halo_color: Option<Color>,
    pub halo_width_px: Option<f64>,
    pub scale: Option<f64>,
    pub offset_x_px: Option<f64>,
    pub offset_y_px: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolylineAttributes {
    pub color: Option<Color>,
    pub width_px: Option<f64>,
    pub dash_length_px: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonAttributes {
    pub fill: Option<Color>,
    pub outline: Option<bool>,
    pub outline_color: Option<Color>,
    pub outline_width_px: Option<f64>,
    pub extruded_height_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelAttributes {
    pub uri: Option<String>,
    pub color: Option<Color>,
    pub scale: Option<f64>,
    pub minimum_pixel_size: Option<f64>,
    pub heading_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
    pub roll_deg: Option<f64>,
}

/// Concrete visual attributes of a rendered feature, one optional set per
/// channel. Unset fields are left to the renderer's own defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Appearance {
    pub billboard: Option<BillboardAttributes>,
    pub label: Option<LabelAttributes>,
    pub polyline: Option<PolylineAttributes>,
    pub polygon: Option<PolygonAttributes>,
    pub model: Option<ModelAttributes>,
}

impl Appearance {
    pub fn is_empty(&self) -> bool {
        self.billboard.is_none()
            && self.label.is_none()
            && self.polyline.is_none()
            && self.polygon.is_none()
            && self.model.is_none()
    }
}
