use album_forge_core::{
    app_paths, create_album, decode_album_document, extract_all, extract_unique_tag_names,
    load_config, load_corpus, run_batch, save_config_if_absent, AlbumOutcome, AlbumRef,
    AlbumStatus, BatchReport, PhotoWithTags, PipelineConfig,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "album-forge")]
#[command(
    about = "画像フォルダからアルバム文書を生成し、文書から写真とタグを抽出します"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    images_root: Option<PathBuf>,
    #[arg(long, global = true)]
    albums_dir: Option<PathBuf>,
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the document for one album
    New(NewArgs),
    /// Create documents for every album that has none yet
    Batch(BatchArgs),
    /// List every photo declaration with its tags
    Photos(OutputArgs),
    /// List every distinct tag name
    Tags(OutputArgs),
    /// Decode one album document
    Inspect(InspectArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct NewArgs {
    /// `<folder>/<album>`
    album: AlbumRef,
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long)]
    row_width: Option<usize>,
    #[arg(long, default_value_t = false)]
    nested: bool,
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long)]
    row_width: Option<usize>,
    #[arg(long, default_value_t = false)]
    nested: bool,
    #[arg(long, default_value_t = false)]
    parallel: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct InspectArgs {
    path: PathBuf,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::New(args) => cmd_new(&cli.global, args),
        Commands::Batch(args) => cmd_batch(&cli.global, args),
        Commands::Photos(args) => cmd_photos(&cli.global, args),
        Commands::Tags(args) => cmd_tags(&cli.global, args),
        Commands::Inspect(args) => cmd_inspect(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(&cli.global),
            ConfigAction::Init => cmd_config_init(&cli.global),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "album_forge_core=debug,album_forge=debug"
    } else {
        "album_forge_core=info,album_forge=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(global: &GlobalArgs) -> Result<PipelineConfig> {
    let mut config = load_config(global.config.as_deref())?;
    if let Some(root) = &global.images_root {
        config.images_root = root.clone();
    }
    if let Some(dir) = &global.albums_dir {
        config.albums_dir = dir.clone();
    }
    Ok(config)
}

fn cmd_new(global: &GlobalArgs, args: NewArgs) -> Result<()> {
    let mut config = resolve_config(global)?;
    if let Some(width) = args.row_width {
        config.row_width = width;
    }
    config.nest_by_folder |= args.nested;
    config.validate()?;

    let outcome = create_album(&config, &args.album, &args.title)?;
    if let AlbumOutcome::Written { path, photos, rows } = outcome {
        println!("作成しました: {}", path.display());
        println!("{}行 / {}枚の写真を出力しました", rows, photos);
        eprintln!("次の手順:");
        eprintln!("1. 文書を編集して行とキャプションを調整してください");
        eprintln!("2. 座標ツールでタグを追加してください");
        eprintln!(
            "3. フォルダ \"{}\" がサイトのフォルダ一覧に登録されているか確認してください",
            args.album.folder
        );
    }
    Ok(())
}

fn cmd_batch(global: &GlobalArgs, args: BatchArgs) -> Result<()> {
    let mut config = resolve_config(global)?;
    if let Some(width) = args.row_width {
        config.row_width = width;
    }
    config.nest_by_folder |= args.nested;
    config.parallel_albums |= args.parallel;

    let report = run_batch(&config)?;
    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_batch_table(&report),
    }
    Ok(())
}

fn cmd_photos(global: &GlobalArgs, args: OutputArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let docs = load_corpus(&config.albums_dir)?;
    let photos = extract_all(&docs);

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&photos)?),
        OutputFormat::Table => print_photo_table(&photos),
    }
    Ok(())
}

fn cmd_tags(global: &GlobalArgs, args: OutputArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let docs = load_corpus(&config.albums_dir)?;
    let names = extract_unique_tag_names(&docs);

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Table => {
            for name in &names {
                println!("{}", name);
            }
            eprintln!("\n集計: tags={} documents={}", names.len(), docs.len());
        }
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let text = fs::read_to_string(&args.path).with_context(|| {
        format!("アルバムファイルを読めませんでした: {}", args.path.display())
    })?;
    let doc = decode_album_document(&text).with_context(|| {
        format!("アルバムファイルを解析できませんでした: {}", args.path.display())
    })?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn cmd_config_show(global: &GlobalArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let path = match &global.config {
        Some(path) => path.clone(),
        None => app_paths()?.config_path,
    };
    println!("設定ファイル: {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(global: &GlobalArgs) -> Result<()> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => app_paths()?.config_path,
    };
    if save_config_if_absent(&PipelineConfig::default(), &path)? {
        println!("設定ファイルを作成しました: {}", path.display());
    } else {
        println!("設定ファイルは既に存在します: {}", path.display());
    }
    Ok(())
}

fn print_batch_table(report: &BatchReport) {
    println!("アルバム -> 結果");
    for album in &report.albums {
        let status = match &album.status {
            AlbumStatus::Written { path, photos, rows } => {
                format!("作成 {} ({}枚 / {}行)", path.display(), photos, rows)
            }
            AlbumStatus::Skipped {
                path,
                collides_with: None,
            } => format!("既存のためスキップ {}", path.display()),
            AlbumStatus::Skipped {
                path,
                collides_with: Some(other),
            } => format!("{} のアルバムと衝突 {} (--nested)", other, path.display()),
            AlbumStatus::NoImages => "画像なしのためスキップ".to_string(),
            AlbumStatus::Failed { error } => format!("失敗 {}", error),
        };
        println!("{}/{} -> {}", album.folder, album.album, status);
    }

    println!(
        "\n集計: albums={} written={} skipped={} no_images={} failed={}",
        report.stats.albums,
        report.stats.written,
        report.stats.skipped,
        report.stats.no_images,
        report.stats.failed
    );
}

fn print_photo_table(photos: &[PhotoWithTags]) {
    println!("itemKey | album | caption | tags");
    for photo in photos {
        let tags = photo
            .tags
            .iter()
            .map(|tag| format!("{}({}, {})", tag.name, tag.x, tag.y))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} | {} ({}) | {} | {}",
            photo.item_key,
            photo.album_id,
            photo.album_title,
            photo.caption.as_deref().unwrap_or("-"),
            tags
        );
    }
    eprintln!("\n集計: photos={}", photos.len());
}
