//! Diagram renderer
//!
//! Draws the states of a validated [`LayoutCache`] onto any [`Canvas`].
//! Vertices whose `shape` names a registered stencil go through the
//! stencil [`Interpreter`]; the built-in shapes and edges are drawn
//! directly. Cells are painted in model order, each followed by its label.

pub mod config;

pub use config::SvgConfig;

use log::debug;

use crate::canvas::{apply_style, Canvas, RetainedCanvas, ShapeTree, SvgCanvas, TextRun};
use crate::layout::{BoundingBox, CellState, LayoutCache, Point};
use crate::model::{CellId, DiagramModel};
use crate::stencil::{Interpreter, ShapeContext};
use crate::style::{keys, shapes, Style};

/// Marker length in unscaled units
pub const DEFAULT_MARKER_SIZE: f64 = 6.0;

/// Corner radius of rounded rectangles, as a percentage of the smaller side
pub const RECTANGLE_ARC_SIZE: f64 = 15.0;

/// Draws the cells of one model through its layout cache
pub struct DiagramRenderer<'a, M: DiagramModel + ?Sized> {
    model: &'a M,
    cache: &'a LayoutCache,
}

impl<'a, M: DiagramModel + ?Sized> DiagramRenderer<'a, M> {
    pub fn new(model: &'a M, cache: &'a LayoutCache) -> Self {
        Self { model, cache }
    }

    /// Cells with a state, in paint order
    pub fn paint_order(&self) -> Vec<CellId> {
        let mut order = Vec::new();
        let Some(root) = self.cache.current_root().or_else(|| self.model.root()) else {
            return order;
        };
        let mut stack = vec![root];
        while let Some(cell) = stack.pop() {
            if self.cache.state(cell).is_some() {
                order.push(cell);
            }
            let children = self.model.children(cell);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Draw every cell with a state
    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        let order = self.paint_order();
        for &cell in &order {
            self.draw_cell(cell, canvas);
        }
        debug!(cells = order.len(); "rendered diagram");
    }

    /// Draw one cell and its label. Cells without a state are skipped.
    pub fn draw_cell<C: Canvas + ?Sized>(&self, cell: CellId, canvas: &mut C) {
        let Some(state) = self.cache.state(cell) else {
            return;
        };
        if self.model.is_edge(cell) {
            self.draw_edge(state, canvas);
        } else if self.model.is_vertex(cell) {
            self.draw_vertex(state, canvas);
        }
        self.draw_label(state, canvas);
    }

    fn draw_vertex<C: Canvas + ?Sized>(&self, state: &CellState, canvas: &mut C) {
        let shape = state.style.string(keys::SHAPE, shapes::RECTANGLE);
        if let Some(descriptor) = self.cache.stencils().get(shape) {
            let mut ctx = ShapeContext::new(&state.style, state.bounds).with_cell(state.cell);
            if let Some(label) = self.model.value(state.cell) {
                ctx = ctx.with_label(label);
            }
            Interpreter::new(self.cache.stencils()).draw_shape(descriptor, &ctx, canvas);
            return;
        }

        let depth = canvas.state().depth();
        canvas.save();
        apply_style(canvas, &state.style);
        canvas.set_stroke_width(state.style.number(keys::STROKE_WIDTH, 1.0) * self.cache.scale());

        let direction = state.style.direction();
        let rotation = state.style.number(keys::ROTATION, 0.0) + direction.angle();
        let mut flip_h = state.style.flag(keys::FLIP_H, false);
        let mut flip_v = state.style.flag(keys::FLIP_V, false);
        if direction.is_vertical() {
            std::mem::swap(&mut flip_h, &mut flip_v);
        }
        let center = state.bounds.center();
        if rotation % 360.0 != 0.0 || flip_h || flip_v {
            canvas.rotate(rotation, flip_h, flip_v, center);
        }

        // Built-in shapes point east; vertical directions draw into the
        // transposed box and rely on the rotation above.
        let b = if direction.is_vertical() {
            BoundingBox::new(
                center.x - state.bounds.height / 2.0,
                center.y - state.bounds.width / 2.0,
                state.bounds.height,
                state.bounds.width,
            )
        } else {
            state.bounds
        };

        match shape {
            shapes::ELLIPSE => canvas.ellipse(b.x, b.y, b.width, b.height),
            shapes::RHOMBUS => {
                canvas.begin();
                canvas.move_to(b.x + b.width / 2.0, b.y);
                canvas.line_to(b.right(), b.y + b.height / 2.0);
                canvas.line_to(b.x + b.width / 2.0, b.bottom());
                canvas.line_to(b.x, b.y + b.height / 2.0);
                canvas.close();
            }
            shapes::TRIANGLE => {
                canvas.begin();
                canvas.move_to(b.x, b.y);
                canvas.line_to(b.right(), b.y + b.height / 2.0);
                canvas.line_to(b.x, b.bottom());
                canvas.close();
            }
            _ => {
                if state.style.flag(keys::ROUNDED, false) {
                    let factor = state.style.number(keys::ARC_SIZE, RECTANGLE_ARC_SIZE) / 100.0;
                    let r = b.width.min(b.height) * factor;
                    canvas.round_rect(b.x, b.y, b.width, b.height, r, r);
                } else {
                    canvas.rect(b.x, b.y, b.width, b.height);
                }
            }
        }
        canvas.fill_and_stroke();
        canvas.state_mut().restore_to(depth);
    }

    fn draw_edge<C: Canvas + ?Sized>(&self, state: &CellState, canvas: &mut C) {
        let points = &state.absolute_points;
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return;
        };
        if points.len() < 2 {
            return;
        }

        let scale = self.cache.scale();
        let depth = canvas.state().depth();
        canvas.save();
        apply_style(canvas, &state.style);
        canvas.set_fill_color(None);
        canvas.set_stroke_width(state.style.number(keys::STROKE_WIDTH, 1.0) * scale);

        canvas.begin();
        canvas.move_to(first.x, first.y);
        for point in &points[1..] {
            canvas.line_to(point.x, point.y);
        }
        canvas.stroke();

        canvas.set_dashed(false, false);
        let size = DEFAULT_MARKER_SIZE * scale;
        if let Some(marker) = state.style.get(keys::END_ARROW) {
            draw_marker(canvas, &state.style, marker, points[points.len() - 2], last, size);
        }
        if let Some(marker) = state.style.get(keys::START_ARROW) {
            draw_marker(canvas, &state.style, marker, points[1], first, size);
        }
        canvas.state_mut().restore_to(depth);
    }

    fn draw_label<C: Canvas + ?Sized>(&self, state: &CellState, canvas: &mut C) {
        let Some(value) = self.model.value(state.cell).filter(|v| !v.is_empty()) else {
            return;
        };

        let align = state.style.string(keys::ALIGN, "center");
        let valign = state.style.string(keys::VERTICAL_ALIGN, "middle");
        let position = if self.model.is_edge(state.cell) {
            state.absolute_offset
        } else {
            let b = state.bounds;
            let x = match align {
                "left" => b.x,
                "right" => b.right(),
                _ => b.center().x,
            };
            let y = match valign {
                "top" => b.y,
                "bottom" => b.bottom(),
                _ => b.center().y,
            };
            Point::new(x, y).translated(state.absolute_offset.x, state.absolute_offset.y)
        };

        let depth = canvas.state().depth();
        canvas.save();
        apply_style(canvas, &state.style);
        canvas.set_shadow(false);
        let font_size = canvas.state().frame().font_size * self.cache.scale();
        canvas.set_font_size(font_size);
        canvas.text(TextRun {
            position,
            width: 0.0,
            height: 0.0,
            value: value.to_string(),
            align: align.to_string(),
            valign: valign.to_string(),
            rotation: 0.0,
        });
        canvas.state_mut().restore_to(depth);
    }

    /// Render the diagram as an SVG document framed by the graph bounds
    pub fn to_svg(&self, config: &SvgConfig) -> String {
        let mut canvas = SvgCanvas::new(config.clone());
        let prefix = config.class_prefix.clone();
        canvas.start_group(None, &[format!("{}diagram", prefix)]);
        self.draw(&mut canvas);
        canvas.end_group();
        canvas.build(self.cache.graph_bounds())
    }

    /// Record each cell's drawing as a retained shape tree
    pub fn retain(&self) -> Vec<(CellId, ShapeTree)> {
        self.paint_order()
            .into_iter()
            .map(|cell| {
                let mut canvas = RetainedCanvas::new();
                self.draw_cell(cell, &mut canvas);
                (cell, canvas.finish())
            })
            .collect()
    }
}

/// Arrow head at `tip`, pointing away from `from`
fn draw_marker<C: Canvas + ?Sized>(
    canvas: &mut C,
    style: &Style,
    kind: &str,
    from: Point,
    tip: Point,
    size: f64,
) {
    let dx = tip.x - from.x;
    let dy = tip.y - from.y;
    let length = (dx * dx + dy * dy).sqrt();
    if kind == "none" || length == 0.0 {
        return;
    }
    let (ux, uy) = (dx / length, dy / length);
    let base = Point::new(tip.x - ux * size, tip.y - uy * size);
    let (nx, ny) = (-uy * size / 2.0, ux * size / 2.0);

    canvas.begin();
    canvas.move_to(base.x + nx, base.y + ny);
    canvas.line_to(tip.x, tip.y);
    canvas.line_to(base.x - nx, base.y - ny);
    if kind == "open" {
        canvas.stroke();
    } else {
        canvas.close();
        canvas.set_fill_color(style.color(keys::STROKE_COLOR));
        canvas.fill_and_stroke();
    }
}

/// Render a validated cache to SVG
pub fn render_svg<M: DiagramModel + ?Sized>(
    model: &M,
    cache: &LayoutCache,
    config: &SvgConfig,
) -> String {
    DiagramRenderer::new(model, cache).to_svg(config)
}

/// Attach a retained shape tree to every state of the cache
pub fn attach_shapes<M: DiagramModel + ?Sized>(model: &M, cache: &mut LayoutCache) {
    let shapes = DiagramRenderer::new(model, cache).retain();
    for (cell, tree) in shapes {
        if let Some(state) = cache.state_mut(cell) {
            state.shape = Some(tree);
        }
    }
}

/// Topmost cell whose attached shape is under `point`.
///
/// Only states with an attached shape take part.
pub fn cell_at<M: DiagramModel + ?Sized>(
    model: &M,
    cache: &LayoutCache,
    point: Point,
    tolerance: f64,
) -> Option<CellId> {
    DiagramRenderer::new(model, cache)
        .paint_order()
        .into_iter()
        .rev()
        .find(|&cell| {
            cache
                .state(cell)
                .and_then(|state| state.shape.as_ref())
                .is_some_and(|shape| shape.hit(point, tolerance).is_some())
        })
}
