// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Ember Sandbox
// Main binary for exercising the event system end to end

use std::thread;
use std::time::Duration;

use anyhow::Result;
use ember_core::event::catalog::{
    KeyPressed, MouseButton, MouseButtonPressed, MouseMoved, WindowClosed, WindowResized,
};
use ember_core::event::lifecycle::Tracked;
use ember_core::event::{Bindings, EventListener, Listener};
use ember_core::{notify, notify_async, try_notify, EventDispatcher};
use ember_telemetry::{init_logging, DispatchStats, LogConfig};

const MAIN_WINDOW: u64 = 1;
const TICKS: u32 = 5;

/// Caches the last known cursor position, fed asynchronously.
#[derive(Debug, Default, Clone)]
struct CursorState {
    x: f32,
    y: f32,
    samples: u32,
}

impl CursorState {
    fn on_motion(&mut self, event: &mut MouseMoved) {
        self.x = event.x;
        self.y = event.y;
        self.samples += 1;
    }
}

impl EventListener for CursorState {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings.on(Self::on_motion);
    }
}

/// Stands in for a renderer that follows the window size.
#[derive(Debug, Default)]
struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    fn on_resize(&mut self, event: &mut WindowResized) {
        self.width = event.width;
        self.height = event.height;
        log::info!(
            "Viewport resized to {}x{} (aspect {:.2})",
            self.width,
            self.height,
            event.aspect_ratio()
        );
    }
}

impl EventListener for Viewport {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings.on(Self::on_resize);
    }
}

/// The application context. Registered last, so it sees keys first and can
/// swallow the ones it owns.
#[derive(Debug, Default)]
struct AppContext {
    quit_requested: bool,
    clicks: u32,
}

impl AppContext {
    fn on_key(&mut self, event: &mut KeyPressed) -> bool {
        if event.key_code == "Escape" {
            log::info!("Escape pressed, quitting after this tick.");
            self.quit_requested = true;
            return true;
        }
        false
    }

    fn on_click(&mut self, event: &mut MouseButtonPressed) {
        if event.button == MouseButton::Left {
            self.clicks += 1;
        }
    }

    fn on_close(&mut self, _: &mut WindowClosed) -> bool {
        self.quit_requested = true;
        true
    }
}

impl EventListener for AppContext {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings
            .on(Self::on_key)
            .on(Self::on_click)
            .on(Self::on_close);
    }
}

/// Logs every key it sees; shadowed by `AppContext` for Escape.
#[derive(Debug, Default)]
struct KeyLogger;

impl KeyLogger {
    fn on_key(&mut self, event: &mut KeyPressed) {
        log::info!("Key: {}", event.key_code);
    }
}

impl EventListener for KeyLogger {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings.on(Self::on_key);
    }
}

/// Simulates a device thread sampling the mouse.
fn spawn_mouse_device(tick: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for i in 0..16 {
            let x = (tick * 16 + i) as f32;
            notify_async(MouseMoved::new(x, x * 0.5, 1.0, 0.5));
        }
    })
}

fn main() -> Result<()> {
    init_logging(&LogConfig::default())?;

    let stats = Listener::new(DispatchStats::new());
    let cursor = Listener::new(CursorState::default());
    let viewport = Listener::new(Viewport::default());
    let _keys = Listener::new(KeyLogger);
    let app = Listener::new(AppContext::default());

    // A second cursor cache that starts as a copy of the first one.
    let mirror = cursor.clone();

    try_notify(|| WindowResized::new(MAIN_WINDOW, 1280, 720))?;
    if let Err(e) = try_notify(|| WindowResized::new(MAIN_WINDOW, 0, 720)) {
        log::warn!("Rejected resize: {e}");
    }

    let mut assets = vec![Tracked::new("triangle-mesh".to_string())];
    let mut tick = 0;
    while tick < TICKS && !app.lock().quit_requested {
        let device = spawn_mouse_device(tick);

        notify(KeyPressed::new(format!("Digit{tick}")));
        notify(MouseButtonPressed {
            button: MouseButton::Left,
        });
        if tick == 2 {
            assets.push(assets[0].clone());
        }
        if tick == TICKS - 1 {
            notify(KeyPressed::new("Escape"));
        }

        device
            .join()
            .map_err(|_| anyhow::anyhow!("Mouse device thread panicked"))?;
        let flushed = ember_core::flush_async_events();
        log::debug!("Tick {tick}: {flushed} queued event(s) delivered.");
        thread::sleep(Duration::from_millis(10));
        tick += 1;
    }

    {
        let cursor = cursor.lock();
        log::info!(
            "Cursor at ({:.1}, {:.1}) after {} samples; mirror saw {}.",
            cursor.x,
            cursor.y,
            cursor.samples,
            mirror.lock().samples
        );
    }
    {
        let viewport = viewport.lock();
        log::info!(
            "Viewport {}x{}, {} click(s).",
            viewport.width,
            viewport.height,
            app.lock().clicks
        );
    }

    drop(assets);
    ember_core::flush_async_events();
    stats.lock().report();

    EventDispatcher::global().shutdown();
    Ok(())
}
