use clap::{Parser, Subcommand, ValueEnum};
use quire::config::{self, PipelineConfig};
use quire::output;
use quire::pipeline::{self, BuildOutcome};
use quire::render::{HtmlRenderer, ManifestRenderer, Renderer};
use quire::scan::{self, Sources};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Static content-and-diagram pipeline for Markdown articles")]
#[command(long_about = "\
Static content-and-diagram pipeline for Markdown articles

Every Markdown file under the content root is an article. Front matter
(YAML between `---` fences or TOML between `+++` fences) must carry a title
and a publication date. Diagram embeds and relative links are checked
against the files actually present.

Content structure:

  content/
  ├── config.toml                        # Pipeline config (optional)
  ├── about.md                           # Article id: about
  ├── posts/
  │   ├── domain-driven-design.md        # Article id: posts/domain-driven-design
  │   └── clean-architecture/
  │       ├── index.md                   # Article id: posts/clean-architecture
  │       └── layers.mmd                 # Diagram embedded as ![](layers.mmd)
  └── diagrams/
      └── bounded-contexts.mmd

Front matter:

  ---
  title: Domain-Driven Design in Practice
  date: 2024-09-30
  tags: [ddd, architecture]
  draft: false
  ---

Run 'quire gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "content", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest content and report problems without writing output
    Check {
        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Ingest content and render the collection
    Build {
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,
    },
    /// List published articles, newest first
    List {
        /// Only articles carrying this exact tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Static HTML site
    Html,
    /// collection.json manifest for an external site generator
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { json } => {
            if json {
                let (_, _, outcome) = ingest(&cli.source, false)?;
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            } else {
                println!("==> Checking {}", cli.source.display());
                let (_, _, outcome) = ingest(&cli.source, true)?;
                output::print_report(&outcome.report);
            }
        }
        Command::Build { format } => {
            println!("==> Stage 1: Ingesting {}", cli.source.display());
            let (config, sources, outcome) = ingest(&cli.source, true)?;
            output::print_report(&outcome.report);

            let renderer: Box<dyn Renderer + '_> = match format {
                Format::Html => Box::new(HtmlRenderer::new(&config, &cli.source, &sources.assets)),
                Format::Json => Box::new(ManifestRenderer::new(config.site.clone())),
            };
            println!(
                "==> Stage 2: Rendering {} \u{2192} {}",
                renderer.name(),
                cli.output.display()
            );
            let summary = renderer.render(&outcome.collection, &cli.output)?;
            output::print_render_summary(&summary);

            println!("==> Build complete: {}", cli.output.display());
        }
        Command::List { tag } => {
            let (_, _, outcome) = ingest(&cli.source, false)?;
            let collection = &outcome.collection;
            match tag {
                Some(tag) => output::print_document_list(collection.by_tag(&tag)),
                None => output::print_document_list(collection.all()),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config, scan and run the pipeline, optionally printing progress.
fn ingest(
    source: &Path,
    show_progress: bool,
) -> Result<(PipelineConfig, Sources, BuildOutcome), Box<dyn std::error::Error>> {
    let config = config::load_config(source)?;
    init_thread_pool(&config.processing);
    let sources = scan::scan(source, &config)?;

    if !show_progress {
        let outcome = pipeline::run(&sources, &config, None)?;
        return Ok((config, sources, outcome));
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = pipeline::run(&sources, &config, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    Ok((config, sources, result?))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores; config can only constrain down.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
