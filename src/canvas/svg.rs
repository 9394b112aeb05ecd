//! Immediate SVG sink

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::trace;

use crate::layout::{BoundingBox, Point};
use crate::renderer::SvgConfig;

use super::{
    font_style, path_to_d, Canvas, CanvasState, Figure, ImageRun, PaintOp, StyleFrame, TextRun,
};

/// Build SVG elements incrementally from canvas calls
pub struct SvgCanvas {
    config: SvgConfig,
    state: CanvasState,
    defs: Vec<String>,
    elements: Vec<String>,
    indent: usize,
    has_shadow: bool,
}

impl SvgCanvas {
    /// Create a new SVG canvas
    pub fn new(config: SvgConfig) -> Self {
        Self {
            config,
            state: CanvasState::new(),
            defs: vec![],
            elements: vec![],
            indent: 1,
            has_shadow: false,
        }
    }

    fn prefix(&self) -> String {
        self.config.class_prefix.clone()
    }

    fn indent_str(&self) -> String {
        if self.config.pretty_print {
            "  ".repeat(self.indent)
        } else {
            String::new()
        }
    }

    fn newline(&self) -> &str {
        if self.config.pretty_print {
            "\n"
        } else {
            ""
        }
    }

    /// Open a group element with optional ID and classes
    pub fn start_group(&mut self, id: Option<&str>, classes: &[String]) {
        let id_attr = id
            .map(|i| format!(r#" id="{}""#, escape_xml(i)))
            .unwrap_or_default();
        let class_attr = if classes.is_empty() {
            String::new()
        } else {
            format!(r#" class="{}""#, classes.join(" "))
        };

        self.elements
            .push(format!("{}<g{}{}>", self.indent_str(), id_attr, class_attr));
        self.indent += 1;
    }

    /// Close a group element
    pub fn end_group(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.elements.push(format!("{}</g>", self.indent_str()));
    }

    fn push_element(&mut self, element: String) {
        let line = format!("{}{}", self.indent_str(), element);
        self.elements.push(line);
    }

    fn ensure_shadow_filter(&mut self) {
        if self.has_shadow {
            return;
        }
        self.has_shadow = true;
        let prefix = self.prefix();
        self.defs.push(format!(
            r#"<filter id="{prefix}shadow"><feDropShadow dx="2" dy="3" stdDeviation="1.7" flood-opacity="0.25"/></filter>"#
        ));
    }

    /// Attributes shared by every element drawn with `frame`; `local`
    /// transforms apply inside the frame's own transform
    fn common_attributes(&mut self, frame: &StyleFrame, local: &[String]) -> String {
        let mut parts = Vec::new();
        if let Some(t) = frame.transform {
            if t.rotation != 0.0 {
                parts.push(format!(
                    "rotate({},{},{})",
                    fmt_num(t.rotation),
                    fmt_num(t.center.x),
                    fmt_num(t.center.y)
                ));
            }
            if t.flip_h || t.flip_v {
                parts.push(mirror(t.center, t.flip_h, t.flip_v));
            }
        }
        parts.extend(local.iter().cloned());

        let mut attrs = String::new();
        if !parts.is_empty() {
            attrs.push_str(&format!(r#" transform="{}""#, parts.join(" ")));
        }
        if frame.shadow {
            self.ensure_shadow_filter();
            attrs.push_str(&format!(r#" filter="url(#{}shadow)""#, self.prefix()));
        }
        attrs
    }

    /// Build the final SVG string
    pub fn build(self, viewbox: BoundingBox) -> String {
        let padding = self.config.viewbox_padding;
        let vb_x = viewbox.x - padding;
        let vb_y = viewbox.y - padding;
        let vb_w = viewbox.width + 2.0 * padding;
        let vb_h = viewbox.height + 2.0 * padding;

        let nl = self.newline();

        let mut svg = String::new();

        if self.config.standalone {
            svg.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
            svg.push_str(nl);
        }

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
            fmt_num(vb_x),
            fmt_num(vb_y),
            fmt_num(vb_w),
            fmt_num(vb_h)
        ));
        svg.push_str(nl);

        if !self.defs.is_empty() {
            svg.push_str("  <defs>");
            svg.push_str(nl);
            for def in &self.defs {
                svg.push_str("    ");
                svg.push_str(def);
                svg.push_str(nl);
            }
            svg.push_str("  </defs>");
            svg.push_str(nl);
        }

        for elem in &self.elements {
            svg.push_str(elem);
            svg.push_str(nl);
        }

        svg.push_str("</svg>");

        svg
    }

    /// `src` as written, or a data URI when embedding is on and it names a
    /// readable local file
    fn image_href(&self, src: &str) -> String {
        if !self.config.embed_images || src.contains("://") || src.starts_with("data:") {
            return src.to_string();
        }
        match std::fs::read(src) {
            Ok(bytes) => format!("data:{};base64,{}", mime_type(src), STANDARD.encode(bytes)),
            Err(err) => {
                trace!(src, error:% = err; "Image not embedded");
                src.to_string()
            }
        }
    }
}

impl Canvas for SvgCanvas {
    fn state(&self) -> &CanvasState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CanvasState {
        &mut self.state
    }

    fn draw_figure(&mut self, figure: Figure, op: PaintOp, frame: &StyleFrame) {
        let prefix = self.prefix();
        let paint = paint_attributes(op, frame);
        let common = self.common_attributes(frame, &[]);
        let element = match figure {
            Figure::Rect(b) => format!(
                r#"<rect class="{prefix}shape" x="{}" y="{}" width="{}" height="{}"{paint}{common}/>"#,
                fmt_num(b.x),
                fmt_num(b.y),
                fmt_num(b.width),
                fmt_num(b.height)
            ),
            Figure::RoundRect { bounds: b, dx, dy } => format!(
                r#"<rect class="{prefix}shape" x="{}" y="{}" width="{}" height="{}" rx="{}" ry="{}"{paint}{common}/>"#,
                fmt_num(b.x),
                fmt_num(b.y),
                fmt_num(b.width),
                fmt_num(b.height),
                fmt_num(dx),
                fmt_num(dy)
            ),
            Figure::Ellipse(b) => {
                let c = b.center();
                format!(
                    r#"<ellipse class="{prefix}shape" cx="{}" cy="{}" rx="{}" ry="{}"{paint}{common}/>"#,
                    fmt_num(c.x),
                    fmt_num(c.y),
                    fmt_num(b.width / 2.0),
                    fmt_num(b.height / 2.0)
                )
            }
            Figure::Path(segments) => format!(
                r#"<path class="{prefix}shape" d="{}"{paint}{common}/>"#,
                path_to_d(&segments)
            ),
        };
        self.push_element(element);
    }

    fn draw_image(&mut self, image: ImageRun, frame: &StyleFrame) {
        let prefix = self.prefix();
        let local: Vec<String> = if image.flip_h || image.flip_v {
            vec![mirror(image.bounds.center(), image.flip_h, image.flip_v)]
        } else {
            vec![]
        };
        let common = self.common_attributes(frame, &local);
        let opacity = frame.alpha;
        let opacity_attr = if opacity < 1.0 {
            format!(r#" opacity="{}""#, fmt_num(opacity))
        } else {
            String::new()
        };
        let aspect = if image.preserve_aspect {
            ""
        } else {
            r#" preserveAspectRatio="none""#
        };
        let href = self.image_href(&image.src);
        self.push_element(format!(
            r#"<image class="{prefix}image" x="{}" y="{}" width="{}" height="{}" href="{}"{aspect}{opacity_attr}{common}/>"#,
            fmt_num(image.bounds.x),
            fmt_num(image.bounds.y),
            fmt_num(image.bounds.width),
            fmt_num(image.bounds.height),
            escape_xml(&href)
        ));
    }

    fn draw_text(&mut self, text: TextRun, frame: &StyleFrame) {
        if text.value.is_empty() {
            return;
        }
        let prefix = self.prefix();
        let local: Vec<String> = if text.rotation != 0.0 {
            vec![format!(
                "rotate({},{},{})",
                fmt_num(text.rotation),
                fmt_num(text.position.x),
                fmt_num(text.position.y)
            )]
        } else {
            vec![]
        };
        let common = self.common_attributes(frame, &local);

        let (x, anchor) = match text.align.as_str() {
            "center" => (text.position.x + text.width / 2.0, "middle"),
            "right" => (text.position.x + text.width, "end"),
            _ => (text.position.x, "start"),
        };
        let (y, baseline) = match text.valign.as_str() {
            "middle" => (text.position.y + text.height / 2.0, "middle"),
            "bottom" => (text.position.y + text.height, "text-after-edge"),
            _ => (text.position.y, "text-before-edge"),
        };

        let mut font = format!(
            r#" fill="{}" font-size="{}" font-family="{}""#,
            escape_xml(&frame.font_color),
            fmt_num(frame.font_size),
            escape_xml(&frame.font_family)
        );
        if frame.font_style & font_style::BOLD != 0 {
            font.push_str(r#" font-weight="bold""#);
        }
        if frame.font_style & font_style::ITALIC != 0 {
            font.push_str(r#" font-style="italic""#);
        }
        if frame.font_style & font_style::UNDERLINE != 0 {
            font.push_str(r#" text-decoration="underline""#);
        }
        if frame.alpha < 1.0 {
            font.push_str(&format!(r#" fill-opacity="{}""#, fmt_num(frame.alpha)));
        }

        let lines: Vec<&str> = text.value.lines().collect();
        let body = if lines.len() > 1 {
            let line_height = frame.font_size * 1.2;
            lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let dy = if i == 0 { 0.0 } else { line_height };
                    format!(
                        r#"<tspan x="{}" dy="{}">{}</tspan>"#,
                        fmt_num(x),
                        fmt_num(dy),
                        escape_xml(line)
                    )
                })
                .collect::<String>()
        } else {
            escape_xml(&text.value)
        };

        self.push_element(format!(
            r#"<text class="{prefix}label" x="{}" y="{}" text-anchor="{anchor}" dominant-baseline="{baseline}"{font}{common}>{body}</text>"#,
            fmt_num(x),
            fmt_num(y)
        ));
    }
}

/// Fill and stroke attributes for one paint op
fn paint_attributes(op: PaintOp, frame: &StyleFrame) -> String {
    let mut attrs = String::new();

    match frame.fill_color.as_deref().filter(|_| op.fills()) {
        Some(color) => {
            attrs.push_str(&format!(r#" fill="{}""#, escape_xml(color)));
            let opacity = frame.alpha * frame.fill_alpha;
            if opacity < 1.0 {
                attrs.push_str(&format!(r#" fill-opacity="{}""#, fmt_num(opacity)));
            }
        }
        None => attrs.push_str(r#" fill="none""#),
    }

    match frame.stroke_color.as_deref().filter(|_| op.strokes()) {
        Some(color) => {
            attrs.push_str(&format!(
                r#" stroke="{}" stroke-width="{}""#,
                escape_xml(color),
                fmt_num(frame.stroke_width.max(0.0))
            ));
            let opacity = frame.alpha * frame.stroke_alpha;
            if opacity < 1.0 {
                attrs.push_str(&format!(r#" stroke-opacity="{}""#, fmt_num(opacity)));
            }
            if frame.dashed {
                let factor = if frame.fixed_dash {
                    1.0
                } else {
                    frame.stroke_width
                };
                let pattern = frame
                    .dash_pattern
                    .split_whitespace()
                    .filter_map(|v| v.parse::<f64>().ok())
                    .map(|v| fmt_num(v * factor))
                    .collect::<Vec<_>>()
                    .join(" ");
                if !pattern.is_empty() {
                    attrs.push_str(&format!(r#" stroke-dasharray="{pattern}""#));
                }
            }
            match frame.line_cap.as_str() {
                "round" => attrs.push_str(r#" stroke-linecap="round""#),
                "square" => attrs.push_str(r#" stroke-linecap="square""#),
                _ => {}
            }
            match frame.line_join.as_str() {
                "round" => attrs.push_str(r#" stroke-linejoin="round""#),
                "bevel" => attrs.push_str(r#" stroke-linejoin="bevel""#),
                _ => {
                    if frame.miter_limit != 10.0 {
                        attrs.push_str(&format!(
                            r#" stroke-miterlimit="{}""#,
                            fmt_num(frame.miter_limit)
                        ));
                    }
                }
            }
        }
        None => attrs.push_str(r#" stroke="none""#),
    }

    attrs
}

/// Mirror around `center`
fn mirror(center: Point, flip_h: bool, flip_v: bool) -> String {
    format!(
        "translate({},{}) scale({},{}) translate({},{})",
        fmt_num(center.x),
        fmt_num(center.y),
        if flip_h { -1 } else { 1 },
        if flip_v { -1 } else { 1 },
        fmt_num(-center.x),
        fmt_num(-center.y)
    )
}

fn mime_type(src: &str) -> &'static str {
    let extension = Path::new(src)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Numbers with at most two decimals and no trailing zeros
fn fmt_num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let s = format!("{rounded:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact() -> SvgConfig {
        SvgConfig::default()
            .with_pretty_print(false)
            .with_standalone(false)
            .with_viewbox_padding(0.0)
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(10.0), "10");
        assert_eq!(fmt_num(1.5), "1.5");
        assert_eq!(fmt_num(1.005_1), "1.01");
        assert_eq!(fmt_num(-0.001), "0");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_fill_and_stroke_attributes() {
        let mut canvas = SvgCanvas::new(compact());
        canvas.set_fill_color(Some("#ff0000"));
        canvas.set_stroke_width(2.0);
        canvas.rect(0.0, 0.0, 10.0, 20.0);
        canvas.fill_and_stroke();
        let svg = canvas.build(BoundingBox::new(0.0, 0.0, 10.0, 20.0));

        assert!(svg.contains(
            r##"<rect class="cv-shape" x="0" y="0" width="10" height="20" fill="#ff0000" stroke="#000000" stroke-width="2"/>"##
        ));
    }

    #[test]
    fn test_dash_pattern_scales_with_stroke_width() {
        let mut canvas = SvgCanvas::new(compact());
        canvas.set_stroke_width(2.0);
        canvas.set_dashed(true, false);
        canvas.begin();
        canvas.move_to(0.0, 0.0);
        canvas.line_to(10.0, 0.0);
        canvas.stroke();
        let svg = canvas.build(BoundingBox::zero());
        assert!(svg.contains(r#"stroke-dasharray="6 6""#));
        assert!(svg.contains(r#"fill="none""#));
    }

    #[test]
    fn test_shadow_adds_filter_once() {
        let mut canvas = SvgCanvas::new(compact());
        canvas.set_shadow(true);
        canvas.rect(0.0, 0.0, 1.0, 1.0);
        canvas.fill();
        canvas.rect(2.0, 0.0, 1.0, 1.0);
        canvas.fill();
        let svg = canvas.build(BoundingBox::zero());
        assert_eq!(svg.matches("<filter").count(), 1);
        assert_eq!(svg.matches(r#"filter="url(#cv-shadow)""#).count(), 2);
    }

    #[test]
    fn test_text_alignment() {
        let mut canvas = SvgCanvas::new(compact());
        canvas.text(TextRun {
            position: Point::new(0.0, 0.0),
            width: 100.0,
            height: 40.0,
            value: "Hello".to_string(),
            align: "center".to_string(),
            valign: "middle".to_string(),
            rotation: 0.0,
        });
        let svg = canvas.build(BoundingBox::zero());
        assert!(svg.contains(r#"x="50" y="20" text-anchor="middle" dominant-baseline="middle""#));
        assert!(svg.contains(">Hello</text>"));
    }

    #[test]
    fn test_remote_image_not_embedded() {
        let config = compact().with_embed_images(true);
        let canvas = SvgCanvas::new(config);
        assert_eq!(
            canvas.image_href("https://example.com/a.png"),
            "https://example.com/a.png"
        );
    }
}
