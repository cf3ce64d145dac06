fn main() {
    if let Err(err) = mlitwatch::cli::run() {
        mlitwatch::ui::eprintln_error(&err);
        std::process::exit(mlitwatch::exit::exit_code(&err));
    }
}
