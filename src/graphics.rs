use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use minifb::{Key, Window, WindowOptions};

// ------------------------------------------------------------
// Live cart-pole view (CPU rasterization + minifb window)
//
// Pure presentation: consumes cart position and pole angle once per
// tick and paces itself at 60 FPS. Closing the window (or Escape)
// is reported back as a stop signal, never handled here.
// ------------------------------------------------------------

const WINDOW_TITLE: &str = "Inverted Pendulum on Cart";
const SCREEN_WIDTH: usize = 1600;
const SCREEN_HEIGHT: usize = 450;
const SCREEN_CENTER_X: f64 = SCREEN_WIDTH as f64 / 2.0;
const SCREEN_CENTER_Y: i32 = SCREEN_HEIGHT as i32 / 2;
// Pixels per meter of cart travel.
const SCREEN_SCALE: f64 = 34.0;
const FPS: usize = 60;

const CART_WIDTH: i32 = 70;
const CART_HEIGHT: i32 = 32;
const CART_OFFSET_Y: i32 = CART_HEIGHT / 2;
const POLE_LENGTH: f64 = 160.0;
const POLE_RADIUS: f64 = 5.0;
const WHEEL_RADIUS: i32 = 10;
const GROUND_THICKNESS: i32 = 5;

const BG_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CART_COLOR: Rgba<u8> = Rgba([255, 165, 117, 255]);
const POLE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const JOINT_COLOR: Rgba<u8> = Rgba([120, 0, 153, 255]);
const WHEEL_COLOR: Rgba<u8> = Rgba([117, 117, 117, 255]);
const GROUND_COLOR: Rgba<u8> = Rgba([57, 72, 84, 255]);

type Img = ImageBuffer<Rgba<u8>, Vec<u8>>;

pub struct CartPoleView {
    window: Window,
}

impl CartPoleView {
    pub fn new() -> Result<Self> {
        let mut window = Window::new(
            WINDOW_TITLE,
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
            WindowOptions::default(),
        )
        .context("Failed to create simulation window")?;
        window.set_target_fps(FPS);
        Ok(Self { window })
    }

    /// Draw one frame. Returns `Ok(false)` once the user has closed the
    /// window or pressed Escape; the caller must stop the loop then.
    pub fn step_render(&mut self, cart_x: f64, pole_theta: f64) -> Result<bool> {
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            return Ok(false);
        }

        let mut img: Img =
            ImageBuffer::from_pixel(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, BG_COLOR);

        let cart_pos = (cart_x * SCREEN_SCALE + SCREEN_CENTER_X).round() as i32;
        let cart_bottom = SCREEN_CENTER_Y + CART_OFFSET_Y;
        let cart_top = cart_bottom - CART_HEIGHT;

        // Pivot sits at the mid-height of the cart body; the tip hangs
        // below it at theta = 0 (screen y grows downward).
        let pivot = (cart_pos as f64, (cart_bottom - CART_HEIGHT / 2) as f64);
        let (sin_t, cos_t) = pole_theta.sin_cos();
        let tip = (
            pivot.0 + POLE_LENGTH * sin_t,
            pivot.1 + POLE_LENGTH * cos_t,
        );

        // Ground strip under the wheels.
        let wheel_y = cart_bottom + WHEEL_RADIUS;
        draw_filled_rect_mut(
            &mut img,
            Rect::at(0, wheel_y + WHEEL_RADIUS)
                .of_size(SCREEN_WIDTH as u32, GROUND_THICKNESS as u32),
            GROUND_COLOR,
        );

        // Cart body and wheels.
        draw_filled_rect_mut(
            &mut img,
            Rect::at(cart_pos - CART_WIDTH / 2, cart_top)
                .of_size(CART_WIDTH as u32, CART_HEIGHT as u32),
            CART_COLOR,
        );
        draw_filled_circle_mut(
            &mut img,
            (cart_pos + CART_WIDTH / 2 - WHEEL_RADIUS, wheel_y),
            WHEEL_RADIUS,
            WHEEL_COLOR,
        );
        draw_filled_circle_mut(
            &mut img,
            (cart_pos - CART_WIDTH / 2 + WHEEL_RADIUS, wheel_y),
            WHEEL_RADIUS,
            WHEEL_COLOR,
        );

        // Pole as a rotated rectangle from pivot to tip.
        let (ox, oy) = (POLE_RADIUS * cos_t, POLE_RADIUS * sin_t);
        let pole_quad = [
            Point::new((pivot.0 - ox) as i32, (pivot.1 + oy) as i32),
            Point::new((pivot.0 + ox) as i32, (pivot.1 - oy) as i32),
            Point::new((tip.0 + ox) as i32, (tip.1 - oy) as i32),
            Point::new((tip.0 - ox) as i32, (tip.1 + oy) as i32),
        ];
        draw_polygon_mut(&mut img, &pole_quad, POLE_COLOR);

        // Joints at both pole ends.
        let joint_r = POLE_RADIUS as i32 + 5;
        draw_filled_circle_mut(
            &mut img,
            (pivot.0 as i32, pivot.1 as i32),
            joint_r,
            JOINT_COLOR,
        );
        draw_filled_circle_mut(&mut img, (tip.0 as i32, tip.1 as i32), joint_r, JOINT_COLOR);

        let buffer = to_window_buffer(&img);
        self.window
            .update_with_buffer(&buffer, SCREEN_WIDTH, SCREEN_HEIGHT)
            .context("Failed to update simulation window")?;
        Ok(true)
    }
}

// Convert an RGBA image to a minifb buffer (u32 ARGB).
fn to_window_buffer(img: &Img) -> Vec<u32> {
    let mut out = vec![0u32; (img.width() * img.height()) as usize];
    for (i, p) in img.pixels().enumerate() {
        let r = p[0] as u32;
        let g = p[1] as u32;
        let b = p[2] as u32;
        out[i] = (255u32 << 24) | (r << 16) | (g << 8) | b;
    }
    out
}
