//! structmd CLI - structured Markdown from extracted page dumps

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use structmd::provider::{build_analysis_prompt, ClassificationRequest, PromptProvider};
use structmd::{
    AnalyzeOptions, ConversionResult, ConvertOptions, Converter, HintBatching, JsonFormat,
    JsonPageSource, PageSource, RenderOptions, StaticProvider, Warning,
};

#[derive(Parser)]
#[command(name = "structmd")]
#[command(version)]
#[command(about = "Turn extracted document spans into structured Markdown", long_about = None)]
struct Cli {
    /// Input page dump (JSON)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert to Markdown with an images/ directory
    Convert {
        /// Input page dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Convert to Markdown only
    #[command(alias = "md")]
    Markdown {
        /// Input page dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Maximum heading level (1-6)
        #[arg(long, default_value = "6")]
        max_heading: u8,

        /// Emit <a id="page-N"></a> anchors at page starts
        #[arg(long)]
        page_anchors: bool,

        /// Do not insert --- rules between pages
        #[arg(long)]
        no_page_breaks: bool,

        /// Do not escape Markdown syntax in text
        #[arg(long)]
        no_escape: bool,

        /// Prefix for image paths
        #[arg(long, default_value = "images/")]
        image_prefix: String,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Show the role assigned to every span as JSON
    Analyze {
        /// Input page dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Emit the document tree instead of the span list
        #[arg(long)]
        tree: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Print the analysis prompt a classification provider would receive
    Prompt {
        /// Input page dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// Classification settings shared by the converting commands.
#[derive(Args)]
struct AnalysisArgs {
    /// Hints file with provider classifications (JSON)
    #[arg(long, value_name = "FILE", conflicts_with = "interactive")]
    hints: Option<PathBuf>,

    /// Ask for classifications interactively (prompt on stderr, answer on stdin)
    #[arg(short, long)]
    interactive: bool,

    /// Provider timeout in seconds
    #[arg(long, default_value = "30", env = "STRUCTMD_TIMEOUT")]
    timeout: u64,

    /// How spans are grouped into provider requests
    #[arg(long, value_enum, default_value = "document")]
    batching: BatchMode,

    /// Spans per request when batching by spans
    #[arg(long, default_value = "200")]
    batch_size: usize,

    /// Minimum size ratio over body text for headings
    #[arg(long)]
    heading_ratio: Option<f32>,

    /// Disable caption detection below images
    #[arg(long)]
    no_captions: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BatchMode {
    /// One request for the whole document
    Document,
    /// One request per page
    Page,
    /// Fixed-size span batches (see --batch-size)
    Spans,
}

impl Default for AnalysisArgs {
    fn default() -> Self {
        Self {
            hints: None,
            interactive: false,
            timeout: 30,
            batching: BatchMode::Document,
            batch_size: 200,
            heading_ratio: None,
            no_captions: false,
        }
    }
}

impl AnalysisArgs {
    fn converter(&self) -> Result<Converter, Box<dyn std::error::Error>> {
        let mut analyze = AnalyzeOptions::new().with_captions(!self.no_captions);
        if let Some(ratio) = self.heading_ratio {
            analyze = analyze.with_heading_ratio(ratio);
        }

        let batching = match self.batching {
            BatchMode::Document => HintBatching::Document,
            BatchMode::Page => HintBatching::Page,
            BatchMode::Spans => HintBatching::Spans(self.batch_size),
        };

        let options = ConvertOptions::new()
            .with_analyze_options(analyze)
            .with_batching(batching)
            .with_provider_timeout(Duration::from_secs(self.timeout));

        let mut converter = Converter::new().with_options(options);

        if let Some(path) = &self.hints {
            let text = fs::read_to_string(path)?;
            let provider = StaticProvider::from_json(&text)
                .map_err(|e| format!("Invalid hints file {}: {}", path.display(), e))?;
            log::info!("loaded {} hints from {}", provider.len(), path.display());
            converter = converter.with_shared_provider(Arc::new(provider));
        } else if self.interactive {
            converter = converter.with_shared_provider(Arc::new(PromptProvider::stdio()));
        }

        Ok(converter)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            analysis,
        }) => cmd_convert(&input, output.as_deref(), &analysis),
        Some(Commands::Markdown {
            input,
            output,
            max_heading,
            page_anchors,
            no_page_breaks,
            no_escape,
            image_prefix,
            analysis,
        }) => {
            let render = RenderOptions::new()
                .with_max_heading(max_heading)
                .with_page_anchors(page_anchors)
                .with_page_breaks(!no_page_breaks)
                .with_escaping(!no_escape)
                .with_image_prefix(image_prefix);
            cmd_markdown(&input, output.as_deref(), render, &analysis)
        }
        Some(Commands::Analyze {
            input,
            output,
            compact,
            tree,
            analysis,
        }) => cmd_analyze(&input, output.as_deref(), compact, tree, &analysis),
        Some(Commands::Prompt { input }) => cmd_prompt(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), &AnalysisArgs::default())
            } else {
                println!("{}", "Usage: structmd <FILE> [OUTPUT]".yellow());
                println!("       structmd --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn document_stem(input: &Path) -> String {
    input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {}", "Warning:".yellow(), warning);
    }
}

fn write_or_print(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        print!("{}", content);
    }
    Ok(())
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    analysis: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let stem = document_stem(input);
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(format!("{}_output", stem)));

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Reading page dump...");
    let source = JsonPageSource::open(input)?;
    pb.inc(1);

    pb.set_message("Classifying...");
    let converter = analysis.converter()?;
    // The interactive prompt shares the terminal with the bar
    let result: ConversionResult = if analysis.interactive {
        pb.suspend(|| converter.convert(source))?
    } else {
        converter.convert(source)?
    };
    pb.inc(1);

    pb.set_message("Writing files...");
    let md_path = result.write_to(&output_dir, &stem)?;
    pb.inc(1);

    pb.finish_with_message("Done!");

    print_warnings(&result.warnings);

    let md_name = md_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("\n{}", "Output files:".green().bold());
    if result.images.is_empty() {
        println!("  {} {}", "└─".dimmed(), md_name);
    } else {
        println!("  {} {}", "├─".dimmed(), md_name);
        println!(
            "  {} {} ({} files)",
            "└─".dimmed(),
            converter.options().render.image_path_prefix,
            result.images.len()
        );
    }

    let stats = &result.stats;
    println!();
    println!("{}", "Structure".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Pages".bold(), stats.page_count);
    println!("{}: {}", "Spans".bold(), stats.span_count);
    println!("{}: {}", "Headings".bold(), stats.heading_count);
    println!("{}: {}", "Paragraphs".bold(), stats.paragraph_count);
    println!("{}: {}", "List items".bold(), stats.list_item_count);
    println!("{}: {}", "Tables".bold(), stats.table_count);
    println!("{}: {}", "Images".bold(), stats.image_count);
    if stats.external_count > 0 {
        println!("{}: {}", "Provider labels".bold(), stats.external_count);
    }
    if stats.warning_count > 0 {
        println!(
            "{}: {}",
            "Warnings".bold(),
            stats.warning_count.to_string().yellow()
        );
    }

    Ok(())
}

fn cmd_markdown(
    input: &Path,
    output: Option<&Path>,
    render: RenderOptions,
    analysis: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let converter = analysis.converter()?;
    let options = converter.options().clone().with_render_options(render);
    let converter = converter.with_options(options);

    let result = converter.convert(JsonPageSource::open(input)?)?;
    print_warnings(&result.warnings);

    write_or_print(output, &result.markdown)?;

    if let Some(path) = output {
        if !result.images.is_empty() {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            for image in &result.images {
                let target = dir.join(&image.relative_path);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, &image.bytes)?;
            }
            println!("{} {} images", "Saved".green(), result.images.len());
        }
    }

    Ok(())
}

fn cmd_analyze(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    tree: bool,
    analysis: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let converter = analysis.converter()?;
    let source = JsonPageSource::open(input)?;

    let json = if tree {
        let structure = converter.structure(source)?;
        print_warnings(&structure.warnings);
        structmd::render::to_json(&structure.tree, format)?
    } else {
        let analysis = converter.analyze(source)?;
        print_warnings(&analysis.warnings);
        structmd::render::to_json(&analysis, format)?
    };

    write_or_print(output, &format!("{}\n", json))
}

fn cmd_prompt(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = JsonPageSource::open(input)?;
    let name = source.name();
    let analysis = Converter::new().analyze(source)?;

    let spans: Vec<_> = analysis.spans.into_iter().map(|s| s.span).collect();
    let mut request = ClassificationRequest::from_spans(&spans, analysis.page_count);
    if let Some(name) = name {
        request = request.with_document_name(name);
    }

    print!("{}", build_analysis_prompt(&request));
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "structmd".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Structured Markdown from extracted document spans");
    println!();
    println!("License: MIT");
}
