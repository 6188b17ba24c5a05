//! dogclip CLI - generate a short AI video clip from a dog photo.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use dogclip::config::Config;
use dogclip::generator::{AspectRatio, GenerationOptions, Provider, VideoGenerator};
use dogclip::image::validate_image;
use dogclip::progress::Progress;
use dogclip::prompt::PromptMode;

#[derive(Parser, Debug)]
#[command(
    name = "dogclip",
    about = "Generate a short AI video clip from a dog photo"
)]
struct Cli {
    /// Path to the dog photo (JPEG, PNG, or WebP).
    image: PathBuf,

    /// Generation backend.
    #[arg(long, value_enum, default_value = "kling")]
    provider: Provider,

    /// What the dog should do in the clip.
    #[arg(long, value_enum, default_value = "speech")]
    mode: PromptMode,

    /// Dialogue text (speech mode) or dance-style descriptor (dance mode).
    #[arg(long, default_value = "")]
    prompt: String,

    /// Backend model id (defaults to the provider's known-good model).
    #[arg(long)]
    model: Option<String>,

    /// Clip duration in seconds.
    #[arg(long, default_value_t = 5)]
    duration: u32,

    /// Output aspect ratio.
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatio,

    /// Output resolution.
    #[arg(long, default_value = "720p")]
    resolution: String,

    /// Where to write the clip (defaults to dog_<timestamp>.mp4).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shared admin password gating generation.
    #[arg(long)]
    password: Option<String>,

    /// Custom config file path.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Output filename when `--output` is not given.
fn default_output_path() -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("dog_{timestamp}.mp4"))
}

#[tokio::main]
async fn main() -> ExitCode {
    // dotenv::dotenv() returns Err when no .env file exists, which is fine
    let _ = dotenv::dotenv();
    env_logger::init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Generation is gated behind the shared admin password.
    let Some(expected_password) = config.admin_password() else {
        eprintln!(
            "Error: admin password is not configured \
             (set [auth] admin_password in config.toml or DOGCLIP_ADMIN_PASSWORD)"
        );
        return ExitCode::FAILURE;
    };
    if cli.password.as_deref() != Some(expected_password.as_str()) {
        eprintln!("Error: admin password missing or incorrect (pass --password)");
        return ExitCode::FAILURE;
    }

    let image = match std::fs::read(&cli.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: failed to read {}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };
    // Early feedback before any network traffic; the backends re-check what
    // they care about at submission time.
    if let Err(e) = validate_image(&image) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let generator = match VideoGenerator::from_config(cli.provider, &config) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = GenerationOptions {
        model: cli.model.clone(),
        duration_secs: cli.duration,
        aspect_ratio: cli.aspect_ratio,
        resolution: cli.resolution.clone(),
    };

    let callback = |fraction: f32, message: &str| {
        eprintln!("[{:>3.0}%] {message}", fraction * 100.0);
    };
    let progress = Progress::new(&callback);

    let result = generator
        .generate_video(&image, &cli.prompt, &progress, &options, cli.mode)
        .await;

    if !result.success {
        eprintln!("Generation failed: {}", result.message);
        return ExitCode::FAILURE;
    }
    let Some(bytes) = result.video_bytes else {
        eprintln!("Generation reported success but returned no video");
        return ExitCode::FAILURE;
    };

    let output = cli.output.clone().unwrap_or_else(default_output_path);
    if let Err(e) = std::fs::write(&output, &bytes) {
        eprintln!("Error: failed to write {}: {e}", output.display());
        return ExitCode::FAILURE;
    }
    println!("Saved {} ({} bytes)", output.display(), bytes.len());
    ExitCode::SUCCESS
}
