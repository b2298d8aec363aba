// ============================================================================
// PaintPad CLI: headless replay of recorded gesture scripts
// ============================================================================
//
// Usage examples:
//   paintpad --script smiley.paint --output smiley.png
//   paintpad -s scenes/*.paint --output-dir out/ --format png --seed 7
//   paintpad -s doodle.paint --width 320 --height 200 -o doodle.jpg --quality 85
//
// A script is one command per line; `#` starts a comment:
//   tool pencil | color #ff0000 | size 4 | opacity 0.5 | style dashed
//   down X Y | move X Y | up X Y | drag X1 Y1 X2 Y2 ...
//   text X Y MESSAGE... | fill X Y | pick X Y
//   undo | redo | clear | resize W H | pattern PATH | paste PATH
//
// Every script is replayed on a fresh session; no window is opened.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgba;

use crate::components::colors::parse_color;
use crate::components::tools::{LineStyle, ToolKind};
use crate::error::PaintError;
use crate::io::{SaveFormat, encode_and_write};
use crate::session::{ImageUse, Session};
use crate::settings::PaintSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PaintPad headless gesture replayer.
#[derive(Parser, Debug)]
#[command(
    name = "paintpad",
    about = "PaintPad headless gesture replayer",
    long_about = "Replay gesture scripts onto a blank canvas and export the result\n\
                  without opening the GUI. Writes PNG, JPEG, WEBP, BMP or TGA.\n\n\
                  Example:\n  \
                  paintpad --script smiley.paint --output smiley.png\n  \
                  paintpad -s scenes/*.paint --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Script file(s). Glob patterns accepted (e.g. "scenes/*.paint").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Output file path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch replays; files keep the script's stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Canvas width in pixels (default 800).
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height in pixels (default 600).
    #[arg(long)]
    pub height: Option<u32>,

    /// Output format: png, jpeg, webp, bmp, tga.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Seed for the spray brush, for byte-identical replays.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Font file for the `text` command (defaults to a system font).
    #[arg(long, value_name = "FONT.ttf")]
    pub font: Option<PathBuf>,

    /// Print per-command warnings and timing information.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a session log (commits, warnings, exports) to this file.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--script" || a == "-s")
    }

    /// Session settings for one replay. Saved preferences are not consulted,
    /// so a script renders the same on every machine.
    fn session_settings(&self) -> PaintSettings {
        let defaults = PaintSettings::default();
        PaintSettings {
            canvas_width: self.width.unwrap_or(defaults.canvas_width),
            canvas_height: self.height.unwrap_or(defaults.canvas_height),
            rng_seed: self.seed,
            font_path: self
                .font
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..defaults
        }
    }
}

// ============================================================================
// Script commands
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ReplayCommand {
    Tool(ToolKind),
    Color(Rgba<u8>),
    Size(u32),
    Opacity(f32),
    Style(LineStyle),
    Down(f32, f32),
    Move(f32, f32),
    Up(f32, f32),
    /// Down at the first point, moves through the rest, up at the last.
    Drag(Vec<(f32, f32)>),
    Text { x: f32, y: f32, message: String },
    Fill(f32, f32),
    Pick(f32, f32),
    Undo,
    Redo,
    Clear,
    Resize(u32, u32),
    Pattern(PathBuf),
    Paste(PathBuf),
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("missing {}", what))?;
    word.parse()
        .map_err(|_| format!("'{}' is not a valid {}", word, what))
}

fn point(words: &mut std::str::SplitWhitespace<'_>) -> Result<(f32, f32), String> {
    Ok((number(words.next(), "x")?, number(words.next(), "y")?))
}

/// Drop a `#` comment. A trailing comment needs whitespace on both sides of
/// the `#`, so `color #ff0000` survives; `text` lines keep everything.
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return "";
    }
    if trimmed.get(..4).is_some_and(|verb| verb.eq_ignore_ascii_case("text")) {
        return line;
    }
    for (i, _) in line.match_indices('#') {
        let before = line[..i].chars().next_back();
        let after = line[i + 1..].chars().next();
        if before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace) {
            return &line[..i];
        }
    }
    line
}

/// Everything after the first `n` whitespace-separated words of `line`.
fn rest_after(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

impl ReplayCommand {
    /// Parse one script line. Blank lines and comments yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<ReplayCommand>, String> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else { return Ok(None) };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "tool" => {
                let name = words.next().ok_or("missing tool name")?;
                ReplayCommand::Tool(
                    ToolKind::from_name(name).ok_or_else(|| format!("unknown tool '{}'", name))?,
                )
            }
            "color" => {
                let value = rest_after(line, 1);
                ReplayCommand::Color(
                    parse_color(value).ok_or_else(|| format!("invalid color '{}'", value))?,
                )
            }
            "size" => ReplayCommand::Size(number(words.next(), "size")?),
            "opacity" => ReplayCommand::Opacity(number(words.next(), "opacity")?),
            "style" => {
                let name = words.next().ok_or("missing line style")?;
                ReplayCommand::Style(
                    LineStyle::from_name(name)
                        .ok_or_else(|| format!("unknown line style '{}'", name))?,
                )
            }
            "down" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Down(x, y)
            }
            "move" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Move(x, y)
            }
            "up" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Up(x, y)
            }
            "drag" => {
                let coords: Vec<f32> = words
                    .map(|w| number(Some(w), "coordinate"))
                    .collect::<Result<_, _>>()?;
                if coords.len() < 2 || coords.len() % 2 != 0 {
                    return Err("drag needs an even number of coordinates".to_string());
                }
                ReplayCommand::Drag(coords.chunks_exact(2).map(|c| (c[0], c[1])).collect())
            }
            "text" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Text {
                    x,
                    y,
                    message: rest_after(line, 3).replace("\\n", "\n"),
                }
            }
            "fill" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Fill(x, y)
            }
            "pick" => {
                let (x, y) = point(&mut words)?;
                ReplayCommand::Pick(x, y)
            }
            "undo" => ReplayCommand::Undo,
            "redo" => ReplayCommand::Redo,
            "clear" => ReplayCommand::Clear,
            "resize" => ReplayCommand::Resize(number(words.next(), "width")?, number(words.next(), "height")?),
            "pattern" | "paste" => {
                let path = rest_after(line, 1);
                if path.is_empty() {
                    return Err(format!("{} needs a file path", verb));
                }
                if verb.eq_ignore_ascii_case("pattern") {
                    ReplayCommand::Pattern(PathBuf::from(path))
                } else {
                    ReplayCommand::Paste(PathBuf::from(path))
                }
            }
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(Some(cmd))
    }

    /// Run against `session`. Relative file paths resolve against `base_dir`.
    pub fn apply(&self, session: &mut Session, base_dir: &Path) -> Result<(), PaintError> {
        match self {
            ReplayCommand::Tool(tool) => session.set_tool(*tool),
            ReplayCommand::Color(color) => session.set_color(*color),
            ReplayCommand::Size(size) => session.set_brush_size(*size),
            ReplayCommand::Opacity(opacity) => session.set_opacity(*opacity),
            ReplayCommand::Style(style) => session.set_line_style(*style),
            ReplayCommand::Down(x, y) => {
                session.on_pointer_down(*x, *y)?;
            }
            ReplayCommand::Move(x, y) => {
                session.on_pointer_move(*x, *y);
            }
            ReplayCommand::Up(x, y) => {
                session.on_pointer_up(*x, *y);
            }
            ReplayCommand::Drag(points) => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return Ok(());
                };
                session.on_pointer_down(first.0, first.1)?;
                for p in &points[1..] {
                    session.on_pointer_move(p.0, p.1);
                }
                session.on_pointer_up(last.0, last.1);
            }
            ReplayCommand::Text { x, y, message } => session.insert_text(*x, *y, message)?,
            ReplayCommand::Fill(x, y) => {
                let previous = session.tools().tool();
                session.set_tool(ToolKind::Fill);
                let result = session.on_pointer_down(*x, *y);
                session.set_tool(previous);
                result?;
            }
            ReplayCommand::Pick(x, y) => {
                let previous = session.tools().tool();
                session.set_tool(ToolKind::Eyedropper);
                if let Err(e) = session.on_pointer_down(*x, *y) {
                    session.set_tool(previous);
                    return Err(e);
                }
            }
            ReplayCommand::Undo => session.undo()?,
            ReplayCommand::Redo => session.redo()?,
            ReplayCommand::Clear => session.clear(),
            ReplayCommand::Resize(w, h) => session.resize(*w, *h),
            ReplayCommand::Pattern(path) => {
                session.load_image_file(ImageUse::Pattern, &base_dir.join(path))?
            }
            ReplayCommand::Paste(path) => {
                session.load_image_file(ImageUse::Paste, &base_dir.join(path))?
            }
        }
        Ok(())
    }
}

/// Outcome of replaying one script.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub commands: usize,
    /// Commands that failed recoverably (e.g. undo with nothing to undo).
    pub warnings: Vec<String>,
}

/// Replay `source` onto `session`. A line that does not parse aborts the
/// replay; a command that fails at run time is recorded as a warning.
pub fn replay(session: &mut Session, source: &str, base_dir: &Path) -> Result<ReplayReport, String> {
    let mut report = ReplayReport::default();
    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let Some(cmd) = ReplayCommand::parse(line).map_err(|e| format!("line {}: {}", line_no, e))? else {
            continue;
        };
        report.commands += 1;
        if let Err(e) = cmd.apply(session, base_dir) {
            log_warn!("Replay: line {}: {}", line_no, e);
            report.warnings.push(format!("line {}: {}", line_no, e));
        }
    }
    Ok(report)
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every script replayed and exported, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    if let Some(log) = &args.log
        && let Err(e) = crate::logger::init_at(log)
    {
        eprintln!("warning: could not open log file '{}': {}", log.display(), e);
    }

    let scripts = resolve_inputs(&args.script);
    if scripts.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if scripts.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch replays.",
            scripts.len()
        );
        return ExitCode::FAILURE;
    }

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let settings = args.session_settings();
    let total = scripts.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script_path) in scripts.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script_path.display());
        }
        let started = Instant::now();

        let Some(output_path) = build_output_path(
            script_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                script_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(script_path, &output_path, &settings, save_format, args.quality) {
            Ok(report) => {
                if args.verbose {
                    for warning in &report.warnings {
                        println!("  warning: {}", warning);
                    }
                }
                if args.verbose || multi {
                    println!(
                        "  → {} ({} commands, {:.0}ms)",
                        output_path.display(),
                        report.commands,
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_one(
    script: &Path,
    output: &Path,
    settings: &PaintSettings,
    format: SaveFormat,
    quality: u8,
) -> Result<ReplayReport, String> {
    let source = std::fs::read_to_string(script)
        .map_err(|e| format!("could not read script: {}", e))?;
    let base_dir = script.parent().unwrap_or(Path::new("."));

    let mut session = Session::from_settings(settings);
    let report = replay(&mut session, &source, base_dir)?;

    encode_and_write(session.snapshot().image(), output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;
    log_info!(
        "Replay: {} -> {} ({} commands, {} warnings)",
        script.display(),
        output.display(),
        report.commands,
        report.warnings.len()
    );
    Ok(report)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).unwrap_or_default();
    }
    output.map(SaveFormat::from_path).unwrap_or_default()
}

/// Compute the output path for a single script.
///
/// Priority:
/// 1. `--output` (explicit path, used for a single script)
/// 2. `--output-dir` (batch directory, derives filename from script stem)
/// 3. Fallback: next to the script, same stem, image extension
fn build_output_path(
    script: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = script.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = script.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == script {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
