mod app;
mod config;
mod entity;
mod fluid;
mod input;
mod presets;
mod render;
mod texture;
mod vec2;
mod world;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
