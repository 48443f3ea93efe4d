use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode --------------------------------------------
    if remask::cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = remask::cli::CliArgs::parse();
        std::process::exit(remask::cli::run(args));
    }

    // -- GUI mode -------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    remask::logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("remask"),
        ..Default::default()
    };

    eframe::run_native(
        "remask",
        options,
        Box::new(|cc| Box::new(remask::app::MaskApp::new(cc))),
    )
}
