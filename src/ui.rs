use egui::Context;

use crate::controller::{DialogChoice, HudState, WinDialog};

/// Top of the speed bar
const SPEED_BAR_MAX_KMH: f32 = 120.0;

/// What the overlay needs to know about the game this frame
pub struct UiFrame<'a> {
    pub hud: &'a HudState,
    pub dialog: Option<&'a WinDialog>,
    /// The web build keeps the clock in a DOM element instead
    pub show_timer: bool,
    pub debug_keys: bool,
}

/// Raw input for a frame on platforms without an egui integration (the canvas)
pub fn raw_input(width: u32, height: u32, dpr: f32, now_ms: f64, events: Vec<egui::Event>) -> egui::RawInput {
    let mut raw_input = egui::RawInput::default();
    raw_input.time = Some(now_ms / 1000.0);
    raw_input.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::new(0.0, 0.0),
        egui::vec2(width as f32 / dpr, height as f32 / dpr),
    ));
    raw_input.events = events;
    raw_input
}

/// Build the overlay. Returns egui output and the dialog answer, if one was clicked.
pub fn build_ui(ctx: &Context, raw_input: egui::RawInput, frame: &UiFrame) -> (egui::FullOutput, Option<DialogChoice>) {
    let mut choice = None;
    let output = ctx.run(raw_input, |ctx| {
        draw_hud(ctx, frame);
        draw_controls_window(ctx, frame.debug_keys);
        if let Some(dialog) = frame.dialog {
            choice = draw_win_dialog(ctx, dialog);
        }
    });
    (output, choice)
}

fn draw_hud(ctx: &Context, frame: &UiFrame) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_BOTTOM, [8.0, -8.0])
        .show(ctx, |ui| {
            if frame.show_timer {
                ui.label(egui::RichText::new(&frame.hud.timer_text).monospace().size(18.0).color(egui::Color32::WHITE));
            }
            let speed = frame.hud.speed_kmh;
            ui.add(
                egui::ProgressBar::new((speed / SPEED_BAR_MAX_KMH).clamp(0.0, 1.0))
                    .desired_width(160.0)
                    .text(format!("{:.0} km/h", speed)),
            );
        });
}

fn draw_controls_window(ctx: &Context, debug_keys: bool) {
    egui::Window::new("Controls")
        .default_pos([8.0, 8.0])
        .default_open(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new("W / S - Throttle / Reverse").small());
            ui.label(egui::RichText::new("A / D - Steer").small());
            ui.label(egui::RichText::new("Space - Reset car").small());
            if debug_keys {
                ui.separator();
                ui.label(egui::RichText::new("K - Open door").small());
                ui.label(egui::RichText::new("L - Drop bonus balls").small());
            }
        });
}

fn draw_win_dialog(ctx: &Context, dialog: &WinDialog) -> Option<DialogChoice> {
    let mut choice = None;
    egui::Window::new(&dialog.title)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(&dialog.message);
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.button("Visit").clicked() {
                    choice = Some(DialogChoice::Visit);
                }
                if ui.button("Quit").clicked() {
                    choice = Some(DialogChoice::Quit);
                }
            });
        });
    choice
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_input_uses_logical_pixels() {
        let input = raw_input(1600, 1200, 2.0, 1500.0, Vec::new());
        assert_eq!(input.screen_rect.map(|r| r.size()), Some(egui::vec2(800.0, 600.0)));
        assert_eq!(input.time, Some(1.5));
    }

    #[test]
    fn test_dialog_without_clicks_gives_no_choice() {
        let ctx = Context::default();
        let hud = HudState { timer_text: "00:42:000".into(), speed_kmh: 35.0 };
        let dialog = WinDialog { title: "You made it!".into(), message: "00:42:000".into(), elapsed: "00:42:000".into() };
        let frame = UiFrame { hud: &hud, dialog: Some(&dialog), show_timer: true, debug_keys: false };
        let (output, choice) = build_ui(&ctx, raw_input(800, 600, 1.0, 0.0, Vec::new()), &frame);
        assert!(choice.is_none());
        assert!(!output.shapes.is_empty(), "overlay drew nothing");
    }
}
