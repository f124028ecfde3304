fn main() {
    if let Err(err) = rescuehub::cli::run() {
        rescuehub::ui::eprintln_error(&err);
        std::process::exit(rescuehub::exit::exit_code(&err));
    }
}
