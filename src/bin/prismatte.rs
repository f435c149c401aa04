use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "prismatte", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a project JSON.
    Validate(ValidateArgs),
    /// Render a frame range as numbered PNGs.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory with one still image per media id (`<media_id>.png`).
    #[arg(long)]
    media_dir: PathBuf,

    /// Output directory for `frame_NNNNN.png`.
    #[arg(long)]
    out: PathBuf,

    /// First frame (inclusive).
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Last frame (exclusive).
    #[arg(long)]
    end: i64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn read_project_json(path: &Path) -> anyhow::Result<prismatte::Project> {
    let f = File::open(path).with_context(|| format!("open project '{}'", path.display()))?;
    let r = BufReader::new(f);
    let project: prismatte::Project =
        serde_json::from_reader(r).with_context(|| "parse project JSON")?;
    Ok(project)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    project.validate()?;
    eprintln!(
        "ok: {} clips, {} transitions, {}x{}",
        project.clips.len(),
        project.transitions.len(),
        project.settings.canvas.width,
        project.settings.canvas.height
    );
    Ok(())
}

/// Serves one still image per media id, decoded lazily and cached.
struct ImageDirSource {
    root: PathBuf,
    cache: HashMap<String, Option<prismatte::ImageBuf>>,
}

impl prismatte::FrameSource for ImageDirSource {
    fn get_frame(&mut self, media_id: &str, _time_secs: f64) -> Option<prismatte::ImageBuf> {
        if !self.cache.contains_key(media_id) {
            let path = self.root.join(format!("{media_id}.png"));
            let loaded = image::open(&path).ok().and_then(|img| {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                prismatte::ImageBuf::new(w, h, rgba.into_raw()).ok()
            });
            self.cache.insert(media_id.to_string(), loaded);
        }
        self.cache.get(media_id).cloned().flatten()
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    project.validate()?;

    let mut source = ImageDirSource {
        root: args.media_dir.clone(),
        cache: HashMap::new(),
    };
    let luts = prismatte::LutRegistry::new();
    let ctx = prismatte::RenderContext {
        settings: &project.settings,
        luts: &luts,
        cancel: prismatte::CancelFlag::new(),
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let mut pipeline = prismatte::Pipeline::new();
    for f in args.start..args.end {
        let frame = pipeline.render_frame(
            &project,
            prismatte::FrameIndex(f),
            &mut source,
            None,
            &ctx,
        );
        let out_path = args.out.join(format!("frame_{f:05}.png"));
        image::save_buffer_with_format(
            &out_path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", out_path.display()))?;
    }

    eprintln!("wrote {} frames to {}", args.end - args.start, args.out.display());
    Ok(())
}
