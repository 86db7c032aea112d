use clap::{Parser, Subcommand};
use prompt_gallery::backend::AppContext;
use prompt_gallery::fs_backend::{FileSink, FsBackend, TracingNotifier};
use prompt_gallery::gallery::Gallery;
use prompt_gallery::png_text::PngTextDecoder;
use prompt_gallery::{config, logging, output};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "prompt-gallery")]
#[command(about = "Catalog of tagged prompt images")]
#[command(long_about = "\
Catalog of tagged prompt images

Hierarchy sources in the data directory describe a taxonomy of images and
their tag strings. The gallery groups them by category, keeps your own
uploaded images alongside them, and composes random prompts from the
categories you include.

Data directory:

  promptImages/
  ├── gallery.toml                 # Config (optional, see gen-config)
  ├── gallery-state.json           # Saved state (sort, sections, custom images)
  ├── PonyXl-poses.yaml            # Hierarchy sources
  ├── thumbnails/                  # <category path>/<image>.jpg|png|webp
  └── custom/                      # Uploaded images

Source format:

  poses:
    standing:
      wave.png:
        - waving, hand up

Run 'prompt-gallery gen-config' to generate a documented gallery.toml.")]
#[command(version)]
struct Cli {
    /// Data directory
    #[arg(long, default_value = "promptImages", global = true)]
    data_dir: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Where composed text goes.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Write the prompt to this file instead of stdout
    #[arg(long)]
    target: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List images grouped by category
    List {
        /// Case-insensitive name filter
        #[arg(long, default_value = "")]
        search: String,
        /// Show thumbnail paths
        #[arg(long)]
        thumbnails: bool,
    },
    /// Toggle the sort direction (A-Z / Z-A)
    Sort,
    /// Open or close a group in the listing
    Section {
        /// Group label, or the bracketed key of a sub-category group
        name: String,
        #[arg(long)]
        close: bool,
    },
    /// Include a category in random prompts
    Include {
        category: String,
        /// Exclude it instead
        #[arg(long)]
        off: bool,
    },
    /// Compose a random prompt from the included categories
    Random {
        #[command(flatten)]
        target: TargetArgs,
        /// Seed for reproducible picks
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Copy one image's cleaned tags
    Copy {
        name: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Add custom images
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove all custom images
    ResetCustom {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Stop showing the "no prompt images" notice
    DismissNotice,
    /// Validate the config and try loading every source
    Check,
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli))
}

fn context(backend: &Arc<FsBackend>, target: Option<PathBuf>) -> AppContext {
    AppContext {
        sources: backend.clone(),
        storage: backend.clone(),
        decoder: Arc::new(PngTextDecoder),
        persistence: backend.clone(),
        sink: Arc::new(FileSink::new(target)),
        notifier: Arc::new(TracingNotifier),
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(&cli.data_dir)?;
    let backend = Arc::new(FsBackend::new(
        &cli.data_dir,
        config.persistence.state_file.clone(),
    ));
    let target = match &cli.command {
        Command::Random { target, .. } | Command::Copy { target, .. } => target.target.clone(),
        _ => None,
    };
    let mut gallery = Gallery::open(config, context(&backend, target)).await;

    let result = dispatch(&mut gallery, &backend, cli.command).await;
    gallery.close().await;
    result
}

async fn dispatch(
    gallery: &mut Gallery,
    backend: &FsBackend,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::List { search, thumbnails } => {
            let groups = gallery.groups(&search);
            output::print_groups(&groups, gallery.state(), |image_ref| {
                thumbnails
                    .then(|| backend.thumbnail_path(image_ref))
                    .flatten()
                    .map(|p| relative_display(&p, backend.data_dir()))
            });
        }
        Command::Sort => {
            let ascending = gallery.toggle_sort().await;
            println!("Sort: {}", if ascending { "A-Z" } else { "Z-A" });
        }
        Command::Section { name, close } => {
            for key in gallery.set_section_open(&name, !close).await {
                println!("{}: {}", key, if close { "closed" } else { "open" });
            }
        }
        Command::Include { category, off } => {
            for (key, included) in gallery.set_category_included(&category, !off).await {
                println!("{}: {}", key, if included { "included" } else { "excluded" });
            }
        }
        Command::Random { seed, .. } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let (outcome, delivery) = gallery.compose_random(&mut rng).await;
            output::print_compose_outcome(&outcome, delivery);
        }
        Command::Copy { name, .. } => {
            gallery.copy_tags(&name).await?;
        }
        Command::Add { files } => {
            let mut failed = 0;
            for path in files {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    eprintln!("Skipping {}: not a file", path.display());
                    failed += 1;
                    continue;
                };
                let bytes = tokio::fs::read(&path).await?;
                match gallery.add_custom_asset(file_name, &bytes).await {
                    Ok(added) => output::print_added_asset(&added),
                    Err(_) => failed += 1,
                }
            }
            if failed > 0 {
                return Err(format!("{failed} upload(s) failed").into());
            }
        }
        Command::ResetCustom { yes } => {
            if !yes {
                return Err("refusing to clear custom images without --yes".into());
            }
            let removed = gallery.reset_custom_assets().await;
            println!("Removed {removed} custom image(s)");
        }
        Command::DismissNotice => {
            gallery.dismiss_notice().await;
        }
        Command::Check => {
            println!("==> Checking {}", backend.data_dir().display());
            let report = gallery.refresh(true).await.clone();
            output::print_load_report(&report);
            output::print_category_order(gallery.order());
            println!("==> Config is valid");
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }
    Ok(())
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
