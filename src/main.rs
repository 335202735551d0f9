use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use gesture_control::{
    Config, Controller, FrameResult, GestureEngine, TemplateStore,
    dispatch::{LogExecutor, WindowInfo},
    pipeline::{Trace, start_session},
};

const DEFAULT_TEMPLATES_FILE: &str = "custom_gestures.json";
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "gesture-control", version, about)]
struct Cli {
    /// TOML config; defaults are used when omitted or missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded landmark trace through the full pipeline.
    Replay {
        trace: PathBuf,
        /// Force a profile instead of the default one.
        #[arg(long, conflicts_with = "window_title")]
        profile: Option<String>,
        /// Pick the profile as if this window were in the foreground.
        #[arg(long)]
        window_title: Option<String>,
        /// Pace frames by their timestamps and poll like a live consumer.
        #[arg(long)]
        realtime: bool,
        /// Save the last annotated frame as PNG.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Screen size for pointer mapping, e.g. 1920x1080.
        #[arg(long, default_value = "1920x1080", value_parser = parse_screen)]
        screen: (u32, u32),
    },
    /// Store one frame of a trace as a custom gesture template.
    Record {
        name: String,
        trace: PathBuf,
        /// Frame to take; defaults to the first frame with a hand.
        #[arg(long)]
        frame: Option<usize>,
    },
    /// List capture devices.
    Cameras,
    /// Print the effective configuration.
    Config {
        /// Also write it to this path.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn parse_screen(value: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Replay {
            trace,
            profile,
            window_title,
            realtime,
            snapshot,
            screen,
        } => {
            let window = window_title.map(WindowInfo::titled);
            let options = ReplayOptions {
                profile,
                window,
                realtime,
                snapshot,
                screen,
            };
            replay(&trace, config, options)
        }
        Commands::Record { name, trace, frame } => record(&name, &trace, frame, &config),
        Commands::Cameras => list_cameras(),
        Commands::Config { write } => {
            print!("{}", config.to_toml()?);
            if let Some(path) = write {
                config.save(&path)?;
                log::info!("config written to {}", path.display());
            }
            Ok(())
        }
    }
}

struct ReplayOptions {
    profile: Option<String>,
    window: Option<WindowInfo>,
    realtime: bool,
    snapshot: Option<PathBuf>,
    screen: (u32, u32),
}

fn open_templates(config: &Config) -> Result<TemplateStore> {
    Ok(match &config.templates_path {
        Some(path) => TemplateStore::open(path)?,
        None => TemplateStore::new(),
    })
}

fn replay(path: &Path, mut config: Config, options: ReplayOptions) -> Result<()> {
    let trace = Trace::load(path)?;
    let frames = trace.len();
    if !options.realtime {
        // Offline runs keep every result instead of only the newest.
        config.scheduler.channel_depth = frames.max(1);
    }

    let engine = GestureEngine::new(&config, open_templates(&config)?);
    let (source, detector) = trace.into_parts();
    let source = source.realtime(options.realtime);
    let (session, results) = start_session(move || Ok(source), detector, &config, engine)?;

    let mut controller = Controller::new(&config, LogExecutor::new(), options.screen);
    if let Some(window) = &options.window {
        controller.observe_window(window);
    }
    if let Some(profile) = &options.profile {
        controller.set_profile(profile);
    }

    let mut handled = 0usize;
    let mut last: Option<FrameResult> = None;
    if options.realtime {
        while !results.is_finished() {
            match controller.poll(&results) {
                Some(result) => {
                    handled += 1;
                    last = Some(result);
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
        session.join();
    } else {
        session.join();
        for result in results.drain() {
            controller.handle(&result);
            handled += 1;
            last = Some(result);
        }
    }

    println!(
        "{frames} frames in trace, {handled} results handled, profile {}",
        controller.profile()
    );
    for action in controller.executor().actions() {
        println!("  {} -> {}", action.gesture, action.keys.join("+"));
    }

    if let Some(path) = options.snapshot {
        let result = last.ok_or_else(|| anyhow!("no frame was produced"))?;
        save_png(&result, &path)?;
        println!("snapshot written to {}", path.display());
    }
    Ok(())
}

fn save_png(result: &FrameResult, path: &Path) -> Result<()> {
    let frame = &result.frame;
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn record(name: &str, path: &Path, frame: Option<usize>, config: &Config) -> Result<()> {
    let trace = Trace::load(path)?;
    let landmarks = match frame {
        Some(index) => trace
            .frames()
            .get(index)
            .ok_or_else(|| anyhow!("trace has {} frames, no frame {index}", trace.len()))?
            .landmarks
            .ok_or_else(|| anyhow!("frame {index} has no hand"))?,
        None => trace
            .frames()
            .iter()
            .find_map(|f| f.landmarks)
            .ok_or_else(|| anyhow!("trace contains no hand"))?,
    };

    let store_path = config
        .templates_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_FILE));
    let mut store = TemplateStore::open(&store_path)?;
    store.record(name, &landmarks)?;
    println!(
        "recorded '{}' into {} ({} templates)",
        name.trim(),
        store_path.display(),
        store.len()
    );
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = gesture_control::pipeline::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without camera support (enable the `camera-nokhwa` feature)")
}
