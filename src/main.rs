use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use transpage::core::decode_document;
use transpage::env::{generate_env_docs, CachePath, ConfigPath, EnvVar, LogLevel};
use transpage::translation::config::RenderSettings;
use transpage::translation::lookup::MemoryTranslationStore;
use transpage::{PageCache, RenderError, RenderResult, RequestContext, TranslationRenderer};

#[derive(Parser, Debug)]
#[command(
    name = "transpage",
    version,
    about = "Render HTML pages into their translated variants"
)]
struct Cli {
    /// Settings file (TOML), falls back to TRANSPAGE_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Page cache database, falls back to TRANSPAGE_CACHE_PATH
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an HTML or JSON body for one language
    Render(RenderArgs),

    /// Remove every cached render of a URL
    Invalidate {
        /// Canonical URL of the page
        #[arg(long)]
        url: String,
    },

    /// Print the supported environment variables
    Env,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input file, `-` reads standard input
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Canonical URL of the page, used as the cache key
    #[arg(long)]
    url: String,

    /// Target language code
    #[arg(short, long)]
    language: String,

    /// Translations as JSON: {"fr": {"Hello": "Bonjour"}}
    #[arg(long, value_name = "JSON")]
    translations: Option<PathBuf>,

    /// Translation blocks as JSON: {"fr": [{"id": 1, "original": "...", "block_type": 1}]}
    #[arg(long, value_name = "JSON")]
    blocks: Option<PathBuf>,

    /// Render for the translation editor (never cached)
    #[arg(long)]
    preview: bool,

    /// Character encoding of the input
    #[arg(long)]
    charset: Option<String>,

    /// Write the result here instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let level = LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });
    let filter = EnvFilter::try_new(format!("transpage={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> RenderResult<()> {
    let mut settings = load_settings(cli.config.as_deref())?;
    let cache_path = cli
        .cache
        .or_else(|| CachePath::get().ok())
        .or_else(|| settings.cache_path.as_ref().map(PathBuf::from));

    match cli.command {
        Commands::Render(args) => {
            settings.cache_path = cache_path.map(|path| path.to_string_lossy().into_owned());
            render(settings, args)
        }
        Commands::Invalidate { url } => {
            let path = cache_path
                .ok_or_else(|| RenderError::Config("未配置页面缓存路径".to_string()))?;
            let cache = PageCache::open(&path)?;
            let removed = cache.invalidate(&url)?;
            println!("{} cached page(s) removed for {}", removed, url);
            Ok(())
        }
        Commands::Env => {
            print!("{}", generate_env_docs());
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> RenderResult<RenderSettings> {
    match path {
        Some(path) => RenderSettings::load(Some(path)),
        None => match ConfigPath::get() {
            Ok(path) => RenderSettings::load(Some(&path)),
            Err(_) => RenderSettings::load(None),
        },
    }
}

fn render(settings: RenderSettings, args: RenderArgs) -> RenderResult<()> {
    let store =
        MemoryTranslationStore::from_files(args.translations.as_deref(), args.blocks.as_deref())?;
    let renderer = TranslationRenderer::from_settings(settings, store)?;
    let ctx = RequestContext::new(&args.url, &args.language).with_preview(args.preview);

    // 缓存命中时不读取输入
    let mut read_error = None;
    let html = renderer.handle_request(&ctx, || {
        match read_input(&args.input, args.charset.as_deref()) {
            Ok(body) => body,
            Err(e) => {
                read_error = Some(e);
                String::new()
            }
        }
    });
    if let Some(e) = read_error {
        return Err(e);
    }

    match &args.output {
        Some(path) => fs::write(path, html)?,
        None => io::stdout().write_all(html.as_bytes())?,
    }
    Ok(())
}

fn read_input(path: &Path, charset: Option<&str>) -> RenderResult<String> {
    let mut data = Vec::new();
    if path == Path::new("-") {
        io::stdin().read_to_end(&mut data)?;
    } else {
        data = fs::read(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
    }
    decode_document(&data, charset)
}
