//! Headless driver: runs the globe viewer for a fixed number of frames
//! against a recording backend and prints what it saw.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use foundation::math::Vec2;
use gpu::{OverlayFrame, RenderBackend, RenderFrame, RenderTarget, ViewportSize};
use runtime::ManualClock;
use scene::interaction::HoverOutcome;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use viewer::poi::{points_from_json, sample_points};
use viewer::{GlobeConfig, GlobeViewer, ViewerError};

#[derive(Debug, Parser)]
#[command(name = "viewer_native", about = "Run the globe viewer headless")]
struct Args {
    /// Frames to run.
    #[arg(long, default_value_t = 120)]
    frames: u32,
    #[arg(long, default_value_t = 1280.0)]
    width: f64,
    #[arg(long, default_value_t = 720.0)]
    height: f64,
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f64,
    /// Simulated display refresh rate.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,
    /// POI JSON (feed records or `[{label, lat, lon}]`). Defaults to the sample cities.
    #[arg(long)]
    pois: Option<PathBuf>,
    /// Viewer config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Hover this marker on the last frame.
    #[arg(long)]
    hover: Option<String>,
}

#[derive(Debug, Default)]
struct RecordingBackend {
    size_px: (u32, u32),
    pixel_ratio: f64,
    scene_passes: u64,
    overlay_passes: u64,
    last_command_count: usize,
    last_label: Option<(String, Vec2)>,
}

impl RenderTarget for RecordingBackend {
    fn set_size(&mut self, width_px: u32, height_px: u32, pixel_ratio: f64) {
        self.size_px = (width_px, height_px);
        self.pixel_ratio = pixel_ratio;
    }
}

impl RenderBackend for RecordingBackend {
    fn render_scene(&mut self, frame: &RenderFrame) {
        self.scene_passes += 1;
        self.last_command_count = frame.commands.len();
    }

    fn render_overlay(&mut self, overlay: &OverlayFrame<'_>) {
        self.overlay_passes += 1;
        self.last_label = overlay.label.map(|l| (l.text.to_string(), l.position));
    }
}

fn read_json(path: Option<&PathBuf>) -> Result<String, ViewerError> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| ViewerError::Config(format!("read {}: {e}", p.display()))),
        None => Ok(String::new()),
    }
}

fn run(args: &Args) -> Result<(), ViewerError> {
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(ViewerError::Config(format!("fps must be positive, got {}", args.fps)));
    }
    let config = GlobeConfig::from_json_str(&read_json(args.config.as_ref())?)?;
    let points = match args.pois.as_ref() {
        Some(_) => points_from_json(&read_json(args.pois.as_ref())?)?,
        None => sample_points(),
    };

    let mut viewer = GlobeViewer::<RecordingBackend>::new(config, points)?;
    for request in viewer.request_assets()? {
        // Nothing to download headless; every asset counts as present.
        request.signal.resolve(Ok(()));
    }

    let clock = ManualClock::new(0.0);
    let size = ViewportSize::new(args.width, args.height, args.pixel_ratio);
    let token = viewer.mount(RecordingBackend::default(), size, &clock)?;
    let ticket = token.ticket();

    let dt = 1.0 / args.fps;
    for i in 0..args.frames {
        if i + 1 == args.frames {
            if let Some(label) = args.hover.as_deref() {
                hover(&mut viewer, label);
            }
        }
        viewer.frame(ticket, &clock);
        clock.advance(dt);
    }

    let camera = viewer.camera().clone();
    let rotation = viewer.graph().globe_rotation();
    let state = viewer.interaction_state();
    let loaded = viewer.is_loaded();
    let markers: Vec<String> = viewer
        .graph()
        .markers()
        .iter()
        .map(|m| m.label().to_string())
        .collect();
    let backend = viewer.unmount(token)?;

    println!("markers ({}): {}", markers.len(), markers.join(", "));
    println!("loaded: {loaded}");
    println!("interaction: {state:?}");
    println!("globe rotation: {rotation:.4} rad");
    println!(
        "camera: fov {:.1} deg, zoom {:.2}, aspect {:.3}, position ({:.3}, {:.3}, {:.3})",
        camera.fov_deg(),
        camera.zoom(),
        camera.aspect(),
        camera.position().x,
        camera.position().y,
        camera.position().z
    );
    println!(
        "render target: {}x{} @{}",
        backend.size_px.0, backend.size_px.1, backend.pixel_ratio
    );
    println!(
        "frames: {} scene / {} overlay, {} draw commands",
        backend.scene_passes, backend.overlay_passes, backend.last_command_count
    );
    match backend.last_label {
        Some((text, pos)) => println!("label: {text:?} at ({:.1}, {:.1})", pos.x, pos.y),
        None => println!("label: hidden"),
    }
    Ok(())
}

// Hover the named marker where it currently appears on screen.
fn hover(viewer: &mut GlobeViewer<RecordingBackend>, label: &str) {
    let Some(id) = viewer.graph().markers().find(label).map(|m| m.id) else {
        warn!(label, "no marker with that label");
        return;
    };
    let Some(pos) = viewer.marker_screen_position(id) else {
        warn!(label, "marker is behind the camera");
        return;
    };
    match viewer.on_pointer_move(pos) {
        HoverOutcome::Hit(hit) => info!(label, ?hit, "hover hit"),
        HoverOutcome::Miss => info!(label, "hover missed"),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
