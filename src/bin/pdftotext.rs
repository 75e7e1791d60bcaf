//! `pdftotext` — extracts a PDF's text to stdout or a file.
//!
//! Flag surface and exit codes follow spec.md §6 exactly; the
//! clap-derive CLI struct and the `-q`/`NullReporter` quiet switch follow
//! this crate's own established idiom rather than the teacher's (the
//! teacher's `pdf-handouts` binary used clap subcommands for `merge` and
//! `headers`, which this tool drops — there is one job here, not several).

use clap::Parser as ClapParser;
use pdftotext_rs::config::Config;
use pdftotext_rs::document::{Document, OpenOptions};
use pdftotext_rs::encoding::{Encoding, Eol, OutputEncoder};
use pdftotext_rs::error::{Error, ErrorKind, NullReporter, Reporter, TracingReporter};
use pdftotext_rs::layout::{LayoutControl, LayoutMode};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser, Debug)]
#[command(name = "pdftotext", about = "Extract text from a PDF file", version)]
struct Cli {
    /// First page to extract (1-based).
    #[arg(short = 'f', value_name = "N", default_value_t = 1)]
    first_page: usize,

    /// Last page to extract (1-based); defaults to the last page.
    #[arg(short = 'l', value_name = "N")]
    last_page: Option<usize>,

    /// Maintain original physical layout (side-by-side columns).
    #[arg(long = "layout", conflicts_with_all = ["table", "lineprinter", "raw"])]
    layout: bool,

    /// Like -layout, but with relaxed column overlap slack.
    #[arg(long = "table", conflicts_with_all = ["layout", "lineprinter", "raw"])]
    table: bool,

    /// Fixed-pitch line-printer output (no word clustering).
    #[arg(long = "lineprinter", conflicts_with_all = ["layout", "table", "raw"])]
    lineprinter: bool,

    /// Stream-order output with no layout analysis.
    #[arg(long = "raw", conflicts_with_all = ["layout", "table", "lineprinter"])]
    raw: bool,

    /// Fixed character pitch (only with -layout/-table/-lineprinter).
    #[arg(long = "fixed", value_name = "W")]
    fixed: Option<f64>,

    /// Fixed line spacing (only with -layout/-table/-lineprinter).
    #[arg(long = "linespacing", value_name = "S")]
    linespacing: Option<f64>,

    /// Separate clipped text from unclipped text.
    #[arg(long = "clip")]
    clip: bool,

    /// Output text encoding (UTF-8, UCS-2, Latin1, ASCII7, Symbol,
    /// ZapfDingbats, or a name from -cfg's unicode-map entries).
    #[arg(long = "enc", value_name = "NAME")]
    enc: Option<String>,

    /// End-of-line convention for the output file.
    #[arg(long = "eol", value_name = "unix|dos|mac")]
    eol: Option<String>,

    /// Don't insert a form-feed between pages.
    #[arg(long = "nopgbrk")]
    nopgbrk: bool,

    /// Owner password, for an encrypted document.
    #[arg(long = "opw", value_name = "PASSWORD", default_value = "")]
    opw: String,

    /// User password, for an encrypted document.
    #[arg(long = "upw", value_name = "PASSWORD", default_value = "")]
    upw: String,

    /// Path to a `-cfg` configuration file.
    #[arg(long = "cfg", value_name = "PATH")]
    cfg: Option<PathBuf>,

    /// Suppress diagnostic messages.
    #[arg(short = 'q')]
    quiet: bool,

    /// Input PDF file.
    input: PathBuf,

    /// Output text file; defaults to stdout when omitted or `-`.
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    run(cli).unwrap_or_else(|code| code)
}

fn run(cli: Cli) -> Result<ExitCode, ExitCode> {
    let reporter: Box<dyn Reporter> = if cli.quiet { Box::new(NullReporter) } else { Box::new(TracingReporter) };
    let reporter: &dyn Reporter = reporter.as_ref();

    let config = match &cli.cfg {
        Some(path) => Some(Config::load(path).map_err(|e| usage_error(&e.to_string()))?),
        None => None,
    };

    let doc = Document::open_file(
        &cli.input,
        OpenOptions { owner_password: cli.opw.as_bytes(), user_password: cli.upw.as_bytes() },
        reporter,
    )
    .map_err(open_error)?;

    let mode = if cli.table {
        LayoutMode::TableLayout
    } else if cli.lineprinter {
        LayoutMode::LinePrinter
    } else if cli.raw {
        LayoutMode::RawOrder
    } else if cli.layout {
        LayoutMode::PhysicalLayout
    } else {
        LayoutMode::ReadingOrder
    };

    let control = LayoutControl {
        mode,
        fixed_pitch: cli.fixed,
        fixed_line_spacing: cli.linespacing,
        clip_text: cli.clip,
        html_hints: false,
    };

    let first = cli.first_page.max(1);
    let last = cli.last_page.unwrap_or_else(|| doc.num_pages());
    if first > last || doc.num_pages() == 0 {
        return Err(usage_error("empty page range"));
    }

    let encoding_name = cli.enc.as_deref().or(config.as_ref().and_then(|c| c.default_encoding.as_deref())).unwrap_or("UTF-8");
    let encoding = Encoding::by_name(encoding_name).ok_or_else(|| usage_error(&format!("unknown encoding '{encoding_name}'")))?;

    let eol_name = cli.eol.as_deref().or(config.as_ref().and_then(|c| c.default_eol.as_deref())).unwrap_or("unix");
    let eol = Eol::from_name(eol_name).map_err(|e| usage_error(&e.to_string()))?;

    let encoder = OutputEncoder::new(encoding, eol, !cli.nopgbrk);

    let pages = doc
        .extract_text_range(first, last, &control, reporter)
        .map_err(open_error)?;

    let mut out_bytes = Vec::new();
    for (i, page_text) in pages.iter().enumerate() {
        out_bytes.extend_from_slice(&encoder.encode_page(page_text));
        if i + 1 < pages.len() {
            if let Some(marker) = encoder.page_break_marker() {
                out_bytes.push(marker);
            }
        }
    }

    write_output(&cli.output, &out_bytes).map_err(|e| output_error(&e.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

fn write_output(path: &Option<PathBuf>, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    match path {
        Some(p) if p.as_os_str() != "-" => std::fs::write(p, bytes),
        _ => std::io::stdout().write_all(bytes),
    }
}

/// Opening or reading a page failed. Exit code 3 is reserved for a
/// password that didn't validate (spec.md §6: "permission denied
/// (copy)"); everything else opening/parsing a PDF can throw is exit 1.
fn open_error(err: Error) -> ExitCode {
    eprintln!("pdftotext: {err}");
    if err.kind() == ErrorKind::PermissionDenied {
        ExitCode::from(3)
    } else {
        ExitCode::from(1)
    }
}

fn output_error(msg: &str) -> ExitCode {
    eprintln!("pdftotext: {msg}");
    ExitCode::from(2)
}

fn usage_error(msg: &str) -> ExitCode {
    eprintln!("pdftotext: {msg}");
    ExitCode::from(99)
}
