//! Tray icon generation.

use tray_icon::Icon;

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

/// Generate the application tray icon.
pub fn create_app_icon() -> Result<Icon, String> {
    let rgba = generate_speaker_icon();
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

/// Speaker glyph (box + cone) with two sound-wave arcs, as RGBA data.
fn generate_speaker_icon() -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];
    let (r, g, b) = (235u8, 235u8, 235u8);

    let mut put = |x: usize, y: usize, alpha: u8| {
        let idx = (y * size + x) * 4;
        rgba[idx] = r;
        rgba[idx + 1] = g;
        rgba[idx + 2] = b;
        rgba[idx + 3] = rgba[idx + 3].max(alpha);
    };

    let center_y = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32;
            let dy = (y as f32 - center_y).abs();

            // Speaker box
            if (4.0..10.0).contains(&fx) && dy < 4.0 {
                put(x, y, 255);
            }

            // Cone widening to the right
            if (10.0..17.0).contains(&fx) && dy < 4.0 + (fx - 10.0) * 1.2 {
                put(x, y, 255);
            }

            // Sound waves
            let dx = fx - 14.0;
            let dist = (dx * dx + dy * dy).sqrt();
            if dx > 3.0 {
                for radius in [7.0f32, 12.0] {
                    let edge = (dist - radius).abs();
                    if edge < 1.5 {
                        put(x, y, ((1.5 - edge) / 1.5 * 255.0) as u8);
                    }
                }
            }
        }
    }

    rgba
}
