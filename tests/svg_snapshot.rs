//! Snapshot tests for SVG output and cached layout
//!
//! Inline snapshots keep the expected output next to the input that
//! produces it.

use cellview::canvas::{Canvas, SvgCanvas};
use cellview::layout::{BoundingBox, LayoutCache, LayoutConfig};
use cellview::model::{CellId, Geometry, GraphModel};
use cellview::stencil::{Descriptor, Interpreter, ShapeContext, StencilRegistry};
use cellview::style::{keys, Style};
use cellview::SvgConfig;

const DIVIDED: &str = r#"<shape w="100" h="50">
  <background><rect x="0" y="0" w="100" h="50"/></background>
  <foreground>
    <fillstroke/>
    <path><move x="0" y="25"/><line x="100" y="25"/></path>
    <stroke/>
  </foreground>
</shape>"#;

#[test]
fn test_stencil_svg_snapshot() {
    let registry = StencilRegistry::new();
    let descriptor = Descriptor::parse(DIVIDED).expect("parse");
    let style = Style::new()
        .with(keys::FILL_COLOR, "#ffffff")
        .with(keys::STROKE_COLOR, "#000000");
    let bounds = BoundingBox::new(10.0, 10.0, 100.0, 50.0);
    let ctx = ShapeContext::new(&style, bounds);

    let config = SvgConfig::default()
        .with_standalone(false)
        .with_viewbox_padding(0.0);
    let mut canvas = SvgCanvas::new(config);
    Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);
    assert_eq!(canvas.state().depth(), 0);

    insta::assert_snapshot!(canvas.build(bounds), @r###"
    <svg xmlns="http://www.w3.org/2000/svg" viewBox="10 10 100 50">
      <rect class="cv-shape" x="10" y="10" width="100" height="50" fill="#ffffff" stroke="#000000" stroke-width="1"/>
      <path class="cv-shape" d="M10.00 35.00 L110.00 35.00" fill="none" stroke="#000000" stroke-width="1"/>
    </svg>
    "###);
}

/// Rounded to two decimals so perimeter trigonometry does not leak into
/// the snapshot
fn num(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

/// One line per listed cell: bounds, then the route for edges
fn summarize(cache: &LayoutCache, cells: &[(&str, CellId)]) -> String {
    let mut lines = Vec::new();
    for (name, cell) in cells {
        let Some(state) = cache.state(*cell) else {
            lines.push(format!("{name}: -"));
            continue;
        };
        let b = state.bounds;
        let mut line = format!(
            "{name}: {},{} {}x{}",
            num(b.x),
            num(b.y),
            num(b.width),
            num(b.height)
        );
        if !state.absolute_points.is_empty() {
            let route: Vec<String> = state
                .absolute_points
                .iter()
                .map(|p| format!("({},{})", num(p.x), num(p.y)))
                .collect();
            line.push_str(&format!(" via {}", route.join(" ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[test]
fn test_layout_snapshot() {
    let mut model = GraphModel::new();
    let layer = model.default_parent();
    let a = model.insert_vertex(layer, Some("a"), Geometry::new(0.0, 0.0, 80.0, 40.0), "");
    let b = model.insert_vertex(layer, Some("b"), Geometry::new(200.0, 0.0, 80.0, 40.0), "");
    let e = model.insert_edge(layer, Some("e"), Some(a), Some(b), Geometry::default(), "");

    let mut cache = LayoutCache::new(LayoutConfig::default());
    cache.validate(&model);
    let cells = [("a", a), ("b", b), ("e", e)];

    insta::assert_snapshot!(summarize(&cache, &cells), @r###"
    a: 0,0 80x40
    b: 200,0 80x40
    e: 80,20 120x1 via (80,20) (200,20)
    "###);

    model.set_visible(b, false);
    cache.invalidate(&model, b, true, true, false);
    cache.validate(&model);

    insta::assert_snapshot!(summarize(&cache, &cells), @r###"
    a: 0,0 80x40
    b: -
    e: -
    "###);
}
