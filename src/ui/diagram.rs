use crate::app::App;
use crate::scene::{GraphScene, Point, SceneNode};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Scene units covered by one terminal cell at scale 1
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

const LINK_COLOR: Color = Color::Rgb(255, 183, 77);

/// Size of `area` in view units
pub fn view_size(area: Rect) -> (f64, f64) {
    (area.width as f64 * CELL_WIDTH, area.height as f64 * CELL_HEIGHT)
}

/// View point at the middle of a terminal cell
pub fn cell_to_view(area: Rect, col: u16, row: u16) -> Point {
    Point::new(
        (col.saturating_sub(area.x) as f64 + 0.5) * CELL_WIDTH,
        (row.saturating_sub(area.y) as f64 + 0.5) * CELL_HEIGHT,
    )
}

/// Cell (possibly off-screen) holding a scene point
fn scene_to_cell(scene: &GraphScene, area: Rect, p: Point) -> (i32, i32) {
    let v = scene.scene_to_view(p);
    (
        area.x as i32 + (v.x / CELL_WIDTH).floor() as i32,
        area.y as i32 + (v.y / CELL_HEIGHT).floor() as i32,
    )
}

/// Cells covered by a node, as (left, top, right, bottom), inclusive
fn node_cells(scene: &GraphScene, area: Rect, node: &SceneNode) -> (i32, i32, i32, i32) {
    let rect = node.rect();
    let (x0, y0) = scene_to_cell(scene, area, Point::new(rect.x, rect.y));
    let (x1, y1) = scene_to_cell(scene, area, Point::new(rect.right(), rect.bottom()));
    (x0, y0, x1.max(x0), y1.max(y0))
}

fn clip(area: Rect, (x0, y0, x1, y1): (i32, i32, i32, i32)) -> Option<Rect> {
    let left = x0.max(area.x as i32);
    let top = y0.max(area.y as i32);
    let right = x1.min(area.right() as i32 - 1);
    let bottom = y1.min(area.bottom() as i32 - 1);
    if left > right || top > bottom {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left + 1) as u16,
        (bottom - top + 1) as u16,
    ))
}

pub fn render_diagram(frame: &mut Frame, area: Rect, app: &App, block: Block) {
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let scene = &app.session.scene;
    if scene.is_empty() {
        let text = app
            .session
            .diagram_error()
            .unwrap_or("No tables to draw. Press R to re-read the database.");
        let empty = Paragraph::new(text)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: false });
        frame.render_widget(empty, inner);
        return;
    }

    let boxes: Vec<(i32, i32, i32, i32)> = scene
        .nodes()
        .iter()
        .map(|n| node_cells(scene, inner, n))
        .collect();

    let buf = frame.buffer_mut();
    for (i, edge) in scene.edges().iter().enumerate() {
        let style = if app.state.selected_edge == Some(i) {
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
        } else if edge.highlight {
            Style::default().fg(Color::LightGreen)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let (sx, sy) = scene_to_cell(scene, inner, edge.curve.start);
        let (ex, ey) = scene_to_cell(scene, inner, edge.curve.end);
        let dist = (((ex - sx).pow(2) + (ey - sy).pow(2)) as f64).sqrt();
        let steps = (dist as usize * 3).clamp(30, 300);
        let points: Vec<(i32, i32)> = edge
            .curve
            .sample(steps)
            .into_iter()
            .map(|p| scene_to_cell(scene, inner, p))
            .collect();
        draw_curve(buf, inner, &points, &boxes, style);
    }

    for (node, cells) in scene.nodes().iter().zip(&boxes) {
        if let Some(rect) = clip(inner, *cells) {
            render_node(frame, rect, node);
        }
    }
}

fn render_node(frame: &mut Frame, area: Rect, node: &SceneNode) {
    let (border, title) = if node.selected {
        (
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )
    } else if node.is_link {
        (
            Style::default().fg(LINK_COLOR),
            Style::default().fg(LINK_COLOR).add_modifier(Modifier::ITALIC),
        )
    } else {
        (
            Style::default().fg(Color::White),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    frame.render_widget(Clear, area);
    if area.width < 3 || area.height < 3 {
        // too small for a frame at this zoom
        let label = Paragraph::new(node.label.as_str()).style(title);
        frame.render_widget(label, Rect::new(area.x, area.y, area.width.max(1), 1));
        return;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let label = Paragraph::new(node.label.as_str())
        .style(title)
        .alignment(Alignment::Center);
    let row = inner.y + inner.height.saturating_sub(1) / 2;
    frame.render_widget(label, Rect::new(inner.x, row, inner.width, 1));
}

/// Plot a sampled curve cell by cell, skipping cells under node boxes
fn draw_curve(
    buf: &mut Buffer,
    area: Rect,
    samples: &[(i32, i32)],
    boxes: &[(i32, i32, i32, i32)],
    style: Style,
) {
    let mut points: Vec<(i32, i32)> = Vec::new();
    for &p in samples {
        if points.last() != Some(&p) {
            points.push(p);
        }
    }

    // Fill gaps between points to ensure continuous lines
    let mut filled = Vec::with_capacity(points.len());
    for (i, &(px, py)) in points.iter().enumerate() {
        filled.push((px, py));
        if let Some(&(nx, ny)) = points.get(i + 1) {
            let (dx, dy) = (nx - px, ny - py);
            let gap = dx.abs().max(dy.abs());
            for j in 1..gap {
                let t = j as f64 / gap as f64;
                filled.push((
                    (px as f64 + dx as f64 * t).round() as i32,
                    (py as f64 + dy as f64 * t).round() as i32,
                ));
            }
        }
    }

    let inside_box = |x: i32, y: i32| {
        boxes
            .iter()
            .any(|&(x0, y0, x1, y1)| x >= x0 && x <= x1 && y >= y0 && y <= y1)
    };
    let in_area = |x: i32, y: i32| {
        x >= area.x as i32 && x < area.right() as i32 && y >= area.y as i32 && y < area.bottom() as i32
    };

    // The curve ends on a box border; the arrow goes on the last free cell
    let last_free = filled.iter().rposition(|&(x, y)| !inside_box(x, y));

    for (i, &(x, y)) in filled.iter().enumerate() {
        if !in_area(x, y) || inside_box(x, y) {
            continue;
        }
        let (adx, ady) = match i.checked_sub(1).and_then(|p| filled.get(p)) {
            Some(&(px, py)) => (x - px, y - py),
            None => (1, 0),
        };
        let ch = if Some(i) == last_free {
            if adx.abs() > ady.abs() {
                if adx > 0 { '>' } else { '<' }
            } else if ady > 0 {
                'v'
            } else {
                '^'
            }
        } else if adx != 0 && ady != 0 {
            if (adx > 0) == (ady > 0) { '\\' } else { '/' }
        } else if ady != 0 {
            '│'
        } else {
            '─'
        };

        let cell = buf.get_mut(x as u16, y as u16);
        let current = cell.symbol().chars().next().unwrap_or(' ');
        if can_draw_on_cell(current) {
            cell.set_char(ch);
            cell.set_style(style);
        }
    }
}

fn can_draw_on_cell(ch: char) -> bool {
    // Allow drawing on empty space or existing line characters
    matches!(
        ch,
        ' ' | '─' | '│' | '┼' | '>' | '<' | '^' | 'v' | '/' | '\\'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_back_to_their_centres() {
        let area = Rect::new(10, 5, 40, 20);
        assert_eq!(view_size(area), (320.0, 320.0));
        let p = cell_to_view(area, 10, 5);
        assert_eq!(p, Point::new(4.0, 8.0));
        let p = cell_to_view(area, 13, 7);
        assert_eq!(p, Point::new(28.0, 40.0));
    }

    #[test]
    fn clipping_keeps_the_visible_part() {
        let area = Rect::new(0, 0, 10, 10);
        assert_eq!(clip(area, (-3, 2, 4, 5)), Some(Rect::new(0, 2, 5, 4)));
        assert_eq!(clip(area, (12, 2, 14, 5)), None);
    }

    #[test]
    fn curve_skips_boxes_and_ends_in_an_arrow() {
        let area = Rect::new(0, 0, 20, 3);
        let mut buf = Buffer::empty(area);
        let samples: Vec<(i32, i32)> = (0..20).map(|x| (x, 1)).collect();
        let boxes = [(0, 0, 2, 2), (15, 0, 19, 2)];
        draw_curve(&mut buf, area, &samples, &boxes, Style::default());

        let row: String = (0..20).map(|x| buf.get(x, 1).symbol().to_string()).collect();
        assert_eq!(row, "   ───────────>     ");
    }
}
