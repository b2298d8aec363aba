// The binary has two front ends:
// • CLI mode (--script/-s flag present): replay gesture scripts headlessly.
// • GUI mode: the egui window, only when built with the `gui` feature.

use std::process::ExitCode;

use clap::Parser;
use paintpad::cli;

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode -----------------------------------------------------
    run_gui()
}

#[cfg(feature = "gui")]
fn run_gui() -> ExitCode {
    use eframe::egui;
    use paintpad::app::PaintPadApp;
    use paintpad::settings::PaintSettings;

    // Initialize session log (overwrites previous session log)
    paintpad::logger::init();

    let settings = PaintSettings::load();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([
                settings.canvas_width as f32,
                settings.canvas_height as f32 + 80.0,
            ])
            .with_title("PaintPad"),
        ..Default::default()
    };

    match eframe::run_native(
        "PaintPad",
        options,
        Box::new(move |cc| Box::new(PaintPadApp::new(cc, settings))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            paintpad::log_err!("eframe: {}", e);
            eprintln!("error: could not open window: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "gui"))]
fn run_gui() -> ExitCode {
    eprintln!(
        "PaintPad was built without the `gui` feature.\n\
         Replay a script instead:  PaintPad --script drawing.paint --output drawing.png"
    );
    ExitCode::FAILURE
}
