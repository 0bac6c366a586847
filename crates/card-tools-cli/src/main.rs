mod logger;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cardt", about = "Card template fill and imposition tools", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one filled instance to a PNG
    Render {
        #[command(flatten)]
        template: TemplateArgs,

        /// Data source: CSV file path or a row-list URL
        #[arg(short, long)]
        data: Option<String>,

        /// Data row to render (0-based)
        #[arg(long, default_value = "0")]
        row: usize,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Output width in mm
        #[arg(long, default_value = "85.6")]
        width_mm: f32,

        /// Output height in mm
        #[arg(long, default_value = "53.98")]
        height_mm: f32,

        /// Render resolution
        #[arg(long, default_value = "300")]
        dpi: f32,

        /// TTF/OTF font for text objects
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Fill a template for every data row and export print sheets
    Batch {
        #[command(flatten)]
        template: TemplateArgs,

        /// Data source: CSV file path or a row-list URL
        #[arg(short, long)]
        data: String,

        /// Output directory (singles) or file (archive/document)
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(long, default_value = "document", value_enum)]
        format: FormatArg,

        #[command(flatten)]
        layout: LayoutArgs,

        /// TTF/OTF font for text objects
        #[arg(long)]
        font: Option<PathBuf>,

        /// Load the layout from a named preset instead of flags
        #[arg(long)]
        preset: Option<String>,

        /// Save the layout built from flags under this preset name
        #[arg(long)]
        save_preset: Option<String>,

        /// Preset store file
        #[arg(long, default_value = "card-layouts.json")]
        presets_file: PathBuf,

        /// Show statistics only, don't render
        #[arg(long)]
        stats_only: bool,
    },

    /// List saved layout presets
    Presets {
        /// Preset store file
        #[arg(long, default_value = "card-layouts.json")]
        presets_file: PathBuf,
    },
}

#[derive(Args)]
struct TemplateArgs {
    /// Template JSON file
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Template store base URL (with --template-id)
    #[arg(long, requires = "template_id")]
    template_store: Option<String>,

    /// Template id in the store
    #[arg(long)]
    template_id: Option<String>,
}

#[derive(Args)]
struct LayoutArgs {
    /// Page size
    #[arg(long, default_value = "a4", value_enum)]
    paper: PaperArg,

    /// Custom page width in mm (with --paper custom)
    #[arg(long)]
    page_width_mm: Option<f32>,

    /// Custom page height in mm (with --paper custom)
    #[arg(long)]
    page_height_mm: Option<f32>,

    /// Page orientation
    #[arg(long, default_value = "portrait", value_enum)]
    orientation: OrientationArg,

    /// Render resolution
    #[arg(long, default_value = "300")]
    dpi: f32,

    /// Rows of cards per page
    #[arg(long, default_value = "4")]
    rows: usize,

    /// Columns of cards per page
    #[arg(long, default_value = "2")]
    columns: usize,

    /// Page margin in mm (top/left/right)
    #[arg(long, default_value = "10.0")]
    margin: f32,

    /// Horizontal gap between columns in mm
    #[arg(long, default_value = "5.0")]
    h_spacing: f32,

    /// Vertical gap between rows in mm
    #[arg(long, default_value = "5.0")]
    v_spacing: f32,

    /// Card width in mm (derived from the grid when omitted)
    #[arg(long)]
    cell_width_mm: Option<f32>,

    /// Card height in mm (derived from the grid when omitted)
    #[arg(long)]
    cell_height_mm: Option<f32>,

    /// Bleed inset in mm (uniform on all sides)
    #[arg(long, default_value = "0.0")]
    bleed: f32,

    /// Safe-area inset in mm (uniform on all sides)
    #[arg(long, default_value = "0.0")]
    safe_area: f32,

    /// Add crop marks
    #[arg(long)]
    crop_marks: bool,

    /// Add a registration mark
    #[arg(long)]
    registration_marks: bool,

    /// How instances are scaled into their cells
    #[arg(long, default_value = "stretch", value_enum)]
    scaling: ScalingArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaperArg {
    A4,
    Letter,
    Legal,
    Tabloid,
    IdCard,
    Custom,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrientationArg {
    Portrait,
    Landscape,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScalingArg {
    Stretch,
    Fit,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// One PNG per data row
    Singles,
    /// ZIP archive of imposed sheets
    Archive,
    /// PDF of imposed sheets
    Document,
}

impl From<OrientationArg> for card_impose::Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Portrait => Self::Portrait,
            OrientationArg::Landscape => Self::Landscape,
        }
    }
}

impl From<ScalingArg> for card_impose::CellScaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::Stretch => Self::Stretch,
            ScalingArg::Fit => Self::Fit,
        }
    }
}

impl LayoutArgs {
    fn to_layout(&self) -> card_impose::PageLayout {
        let page_size = match self.paper {
            PaperArg::A4 => card_impose::PageSize::A4,
            PaperArg::Letter => card_impose::PageSize::Letter,
            PaperArg::Legal => card_impose::PageSize::Legal,
            PaperArg::Tabloid => card_impose::PageSize::Tabloid,
            PaperArg::IdCard => card_impose::PageSize::IdCard,
            PaperArg::Custom => card_impose::PageSize::Custom {
                width_mm: self.page_width_mm.unwrap_or(210.0),
                height_mm: self.page_height_mm.unwrap_or(297.0),
            },
        };

        card_impose::PageLayout {
            page_size,
            orientation: self.orientation.into(),
            dpi: self.dpi,
            margins: card_impose::Margins::uniform(self.margin),
            h_spacing_mm: self.h_spacing,
            v_spacing_mm: self.v_spacing,
            cell_width_mm: self.cell_width_mm,
            cell_height_mm: self.cell_height_mm,
            rows_per_page: self.rows,
            cols_per_page: self.columns,
            bleed: card_impose::Insets::uniform(self.bleed),
            safe_area: card_impose::Insets::uniform(self.safe_area),
            marks: card_impose::PrinterMarks {
                crop_marks: self.crop_marks,
                registration_marks: self.registration_marks,
                registration_point_mm: None,
            },
            scaling: self.scaling.into(),
        }
    }
}

impl TemplateArgs {
    async fn load(&self) -> Result<card_template::TemplateDocument> {
        match (&self.template, &self.template_store, &self.template_id) {
            (Some(path), _, _) => card_template::source::load_template(path)
                .await
                .with_context(|| format!("failed to load template {}", path.display())),
            (None, Some(base), Some(id)) => {
                let record = card_template::source::fetch_template(base, id)
                    .await
                    .with_context(|| format!("failed to fetch template '{}'", id))?;
                Ok(record.document)
            }
            _ => bail!("specify --template FILE or --template-store URL with --template-id ID"),
        }
    }
}

async fn load_rows(source: &str) -> Result<Vec<card_template::DataRow>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        card_template::data::fetch_rows(source)
            .await
            .with_context(|| format!("failed to fetch rows from {}", source))
    } else {
        card_template::data::load_rows_csv(source)
            .await
            .with_context(|| format!("failed to read {}", source))
    }
}

async fn make_renderer(font: Option<&PathBuf>) -> Result<card_impose::RasterRenderer> {
    let mut options = card_impose::RenderOptions::default();
    if let Some(path) = font {
        options.font = Some(
            card_impose::load_font(path)
                .await
                .with_context(|| format!("failed to load font {}", path.display()))?,
        );
    }
    Ok(card_impose::RasterRenderer::new(options))
}

fn print_warnings(warnings: &[String]) {
    if !warnings.is_empty() {
        println!("Completed with {} warning(s):", warnings.len());
        for warning in warnings {
            println!("  {}", warning);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logger::StderrLogger::init(level).ok();

    match cli.command {
        Commands::Render {
            template,
            data,
            row,
            output,
            width_mm,
            height_mm,
            dpi,
            font,
        } => {
            let document = template.load().await?;

            let data_row = match data {
                Some(source) => {
                    let rows = load_rows(&source).await?;
                    rows.into_iter()
                        .nth(row)
                        .with_context(|| format!("data source has no row {}", row))?
                }
                None => card_template::DataRow::new(),
            };

            use card_impose::Renderer;
            let mut renderer = make_renderer(font.as_ref()).await?;
            let filled = card_template::fill(&document, &data_row);
            renderer.load(&filled);

            let width_px = card_impose::mm_to_px(width_mm, dpi);
            let height_px = card_impose::mm_to_px(height_mm, dpi);
            let raster = renderer.rasterize(width_px, height_px).await?;

            let png = card_impose::export::encode_png(&raster)?;
            tokio::fs::write(&output, png).await?;
            print_warnings(&renderer.take_warnings());
            println!("Rendered row {} → {}", row, output.display());
        }

        Commands::Batch {
            template,
            data,
            output,
            format,
            layout,
            font,
            preset,
            save_preset,
            presets_file,
            stats_only,
        } => {
            let mut store = card_impose::PresetStore::load(&presets_file).await?;

            let layout = match &preset {
                Some(name) => store
                    .get(name)
                    .cloned()
                    .with_context(|| format!("no preset named '{}'", name))?,
                None => layout.to_layout(),
            };

            if let Some(name) = save_preset {
                store.insert(name.clone(), layout.clone());
                store.save(&presets_file).await?;
                println!("Saved preset '{}' → {}", name, presets_file.display());
            }

            let rows = load_rows(&data).await?;

            let stats = card_impose::calculate_statistics(rows.len(), &layout);
            println!("Batch statistics:");
            println!("  Data rows: {}", stats.data_rows);
            println!("  Cards per page: {}", stats.capacity_per_page);
            println!("  Pages: {}", stats.pages);
            println!(
                "  Last page: {} filled, {} blank",
                stats.filled_cells_last_page, stats.blank_cells_last_page
            );

            if stats_only {
                return Ok(());
            }

            // Template fetch failures abort here, before any rendering
            let document = template.load().await?;
            let mut renderer = make_renderer(font.as_ref()).await?;
            let cancel = card_impose::CancelHandle::new();

            match format {
                FormatArg::Singles => {
                    let summary = card_impose::export::export_singles(
                        &document,
                        &rows,
                        &layout,
                        &mut renderer,
                        &cancel,
                        &output,
                    )
                    .await?;
                    print_warnings(&summary.warnings);
                    println!(
                        "Exported {} designs → {}",
                        summary.files.len(),
                        output.display()
                    );
                }
                FormatArg::Archive | FormatArg::Document => {
                    let outcome = card_impose::impose(
                        &document,
                        &rows,
                        &layout,
                        &mut renderer,
                        &cancel,
                        |update| {
                            if let card_impose::BatchUpdate::PageComplete { page_index } = update {
                                log::info!("page {} complete", page_index + 1);
                            }
                        },
                    )
                    .await?;
                    print_warnings(&outcome.warnings);

                    let page_count = outcome.pages.len();
                    match format {
                        FormatArg::Archive => {
                            card_impose::export::export_archive(outcome.pages, &output).await?;
                        }
                        FormatArg::Document => {
                            let resolved = layout.resolve();
                            card_impose::export::export_document(
                                outcome.pages,
                                &resolved,
                                &output,
                            )
                            .await?;
                        }
                        FormatArg::Singles => unreachable!(),
                    }
                    println!("Exported {} pages → {}", page_count, output.display());
                }
            }
        }

        Commands::Presets { presets_file } => {
            let store = card_impose::PresetStore::load(&presets_file).await?;
            let names: Vec<_> = store.names().collect();
            if names.is_empty() {
                println!("No presets in {}", presets_file.display());
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}
