use std::path::PathBuf;

use image::Rgba;

use crate::components::colors::{BLACK, WHITE, parse_color, to_hex};
use crate::components::tools::{LineStyle, MAX_BRUSH_SIZE, ToolState};

/// Persisted user preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct PaintSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: Rgba<u8>,
    pub color: Rgba<u8>,
    pub brush_size: u32,
    pub opacity: f32,
    pub line_style: LineStyle,
    /// 0 = unbounded.
    pub max_undo_steps: usize,
    /// Empty = pick a system font.
    pub font_path: String,
    /// Fixed seed for the spray jitter.
    pub rng_seed: Option<u64>,
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            background: WHITE,
            color: BLACK,
            brush_size: 5,
            opacity: 1.0,
            line_style: LineStyle::Solid,
            max_undo_steps: 0,
            font_path: String::new(),
            rng_seed: None,
        }
    }
}

impl PaintSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/paintpad/paintpad_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PaintPad\paintpad_settings.cfg
    /// On macOS:   ~/Library/Application Support/PaintPad/paintpad_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PaintPad").join("paintpad_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PaintPad")
                    .join("paintpad_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("paintpad").join("paintpad_settings.cfg"))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             color={}\n\
             brush_size={}\n\
             opacity={}\n\
             line_style={}\n\
             max_undo_steps={}\n\
             font_path={}\n\
             rng_seed={}\n",
            self.canvas_width,
            self.canvas_height,
            to_hex(self.background),
            to_hex(self.color),
            self.brush_size,
            self.opacity,
            self.line_style.label().to_ascii_lowercase(),
            self.max_undo_steps,
            self.font_path,
            self.rng_seed.map(|s| s.to_string()).unwrap_or_default(),
        )
    }

    /// Lenient parse: unknown keys are skipped, bad values keep the default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    s.canvas_width = val.parse().unwrap_or(s.canvas_width).max(1);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().unwrap_or(s.canvas_height).max(1);
                }
                "background" => {
                    if let Some(c) = parse_color(val) { s.background = c; }
                }
                "color" => {
                    if let Some(c) = parse_color(val) { s.color = c; }
                }
                "brush_size" => {
                    s.brush_size = val.parse().unwrap_or(s.brush_size).clamp(1, MAX_BRUSH_SIZE);
                }
                "opacity" => {
                    if let Ok(o) = val.parse::<f32>()
                        && o.is_finite()
                    {
                        s.opacity = o.clamp(0.0, 1.0);
                    }
                }
                "line_style" => {
                    s.line_style = LineStyle::from_name(val).unwrap_or_default();
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(0);
                }
                "font_path" => {
                    s.font_path = val.to_string();
                }
                "rng_seed" => {
                    s.rng_seed = val.parse().ok();
                }
                _ => {}
            }
        }
        s
    }

    /// Load settings from disk (returns default if file missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, self.to_config_string())?;
        log_info!("Settings: saved to {}", path.display());
        Ok(())
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        if self.font_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(self.font_path.trim()))
        }
    }

    /// Initial tool state for a new session.
    pub fn tool_state(&self) -> ToolState {
        let mut tools = ToolState::default();
        tools.set_color(self.color);
        tools.set_brush_size(self.brush_size);
        tools.set_opacity(self.opacity);
        tools.set_line_style(self.line_style);
        tools
    }

    /// Remember the tool configuration for the next launch.
    pub fn capture_tools(&mut self, tools: &ToolState) {
        self.color = tools.color();
        self.brush_size = tools.brush_size();
        self.opacity = tools.opacity();
        self.line_style = tools.line_style();
    }
}
