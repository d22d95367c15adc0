use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use richmenu::api::{ApiConfig, LineClient, RichMenuApi};
use richmenu::render::{CdpBackend, RenderEngine};
use richmenu::{template, Provisioner, RenderConfig, RichMenuSpec};
use std::path::{Path, PathBuf};

/// Lay out, render and provision rich menus
#[derive(Parser, Debug)]
#[command(name = "richmenu", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tappable areas for COUNT actions as JSON
    Layout { count: usize },
    /// Print the HTML the menu image is rendered from
    Markup {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Render the menu image to a PNG without calling the remote API
    Render {
        #[arg(long)]
        spec: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Register, render, upload and activate a menu; prints a JSON summary
    Provision {
        #[arg(long)]
        spec: PathBuf,
        /// Also write the rendered PNG here
        #[arg(long)]
        image_out: Option<PathBuf>,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Delete a rich menu, e.g. one left behind by a failed provision
    Delete { menu_id: String },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Budget for page load, settle and capture
    #[arg(long, default_value_t = 10_000)]
    settle_timeout_ms: u64,
    /// Chrome/Chromium binary to launch
    #[arg(long)]
    chrome_path: Option<PathBuf>,
    /// Launch the browser without its sandbox (needed in some containers)
    #[arg(long)]
    no_sandbox: bool,
}

impl RenderArgs {
    fn engine(&self) -> RenderEngine<CdpBackend> {
        let config = RenderConfig {
            settle_timeout_ms: self.settle_timeout_ms,
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            ..Default::default()
        };
        RenderEngine::new(CdpBackend::new(), config)
    }
}

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;

    Builder::new()
        .format(|buf, record| writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args()))
        .filter_level(log::LevelFilter::Info)
        .parse_default_env() // Allows RUST_LOG env var to override
        .init();
}

fn load_spec(path: &Path) -> anyhow::Result<RichMenuSpec> {
    let spec = RichMenuSpec::from_json_file(path).with_context(|| format!("reading spec {}", path.display()))?;
    spec.validate()?;
    Ok(spec)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Layout { count } => {
            let areas = richmenu::compute_areas(count)?;
            println!("{}", serde_json::to_string_pretty(&areas)?);
        }
        Command::Markup { spec } => {
            let spec = load_spec(&spec)?;
            println!("{}", template::render_for_labels(&spec.labels())?);
        }
        Command::Render { spec, out, render } => {
            let spec = load_spec(&spec)?;
            let markup = template::render_for_labels(&spec.labels())?;
            let image = render.engine().render_to_image(&markup).await?;
            image.write_to(&out)?;
            info!("Wrote {}x{} image to {} (sha256 {})", image.width(), image.height(), out.display(), image.digest());
        }
        Command::Provision { spec, image_out, render } => {
            let spec = load_spec(&spec)?;
            let client = LineClient::new(ApiConfig::from_env()?)?;
            let provisioner = Provisioner::new(client, render.engine());
            let result = provisioner.provision(&spec).await?;

            let mut summary = result.summary();
            if let (Some(path), Some(image)) = (image_out, result.image()) {
                image.write_to(&path)?;
                summary.image_path = Some(path.display().to_string());
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(failure) = result.failure() {
                error!("Provisioning stopped at {}: {}", failure.stage, failure.error);
                if let Some(id) = result.menu_id() {
                    error!("Rich menu {} still exists remotely; remove it with `richmenu delete {}`", id, id);
                }
                std::process::exit(2);
            }
        }
        Command::Delete { menu_id } => {
            let client = LineClient::new(ApiConfig::from_env()?)?;
            client.delete_rich_menu(&menu_id).await?;
            info!("Deleted rich menu {}", menu_id);
        }
    }

    Ok(())
}
