use bubble_space::bubble::{BubbleId, Movement};
use bubble_space::engine::{DisplayList, DrawCommand, Sprite};
use bubble_space::util::{short_title, stable_unit};
use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke};

const STYLE_PALETTE: [Color32; 6] = [
    Color32::from_rgb(55, 150, 215),
    Color32::from_rgb(90, 180, 120),
    Color32::from_rgb(215, 140, 60),
    Color32::from_rgb(170, 95, 200),
    Color32::from_rgb(215, 85, 100),
    Color32::from_rgb(70, 175, 175),
];

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn style_color(style: &str) -> Color32 {
    let slot = (stable_unit(style) * STYLE_PALETTE.len() as f32) as usize;
    STYLE_PALETTE[slot.min(STYLE_PALETTE.len() - 1)]
}

fn sprite_fill(sprite: &Sprite, highlighted: bool) -> Color32 {
    let base = style_color(&sprite.style);
    let base = match sprite.movement {
        Movement::Inert => base,
        Movement::Moving => blend_color(base, Color32::WHITE, 0.25),
        Movement::Automatic => blend_color(base, Color32::from_rgb(19, 23, 29), 0.2),
    };
    if highlighted {
        blend_color(base, Color32::from_rgb(255, 220, 90), 0.45)
    } else {
        base
    }
}

pub(super) fn draw_background(painter: &Painter, rect: Rect) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = 56.0;
    let grid = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + step;
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], grid);
        x += step;
    }

    let mut y = rect.top() + step;
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], grid);
        y += step;
    }
}

/// Replays a recorded frame with `origin` as the surface's top-left corner.
pub(super) fn paint_display_list(
    painter: &Painter,
    origin: Pos2,
    list: &DisplayList,
    highlighted: Option<BubbleId>,
) {
    let offset = origin.to_vec2();
    let edge = Stroke::new(1.5, Color32::from_rgba_unmultiplied(190, 200, 215, 140));

    for command in &list.commands {
        match command {
            DrawCommand::Clear => {}
            DrawCommand::Connection(connection) => {
                painter.line_segment([connection.start + offset, connection.end + offset], edge);
            }
            DrawCommand::Bubble(sprite) => {
                let center = sprite.center + offset;
                let fill = sprite_fill(sprite, highlighted == Some(sprite.id));
                painter.circle_filled(center, sprite.radius, fill);
                painter.circle_stroke(
                    center,
                    sprite.radius,
                    Stroke::new(1.0, blend_color(fill, Color32::BLACK, 0.35)),
                );

                let max_chars = ((sprite.radius / 4.5) as usize).max(3);
                painter.text(
                    center,
                    Align2::CENTER_CENTER,
                    short_title(&sprite.title, max_chars),
                    FontId::proportional((sprite.radius / 3.5).clamp(9.0, 18.0)),
                    Color32::WHITE,
                );
            }
        }
    }
}
