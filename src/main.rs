use software_metrics::CliError;

fn is_json_mode_args() -> bool {
    std::env::args().any(|arg| arg == "--json" || arg == "--robot")
}

fn report(err: &CliError) -> ! {
    if is_json_mode_args() {
        let payload = serde_json::json!({
            "error": {
                "code": err.code,
                "kind": err.kind,
                "message": err.message,
                "hint": err.hint,
                "retryable": err.retryable,
            }
        });
        eprintln!("{payload}");
    } else {
        eprintln!("{}", err.message);
        if let Some(hint) = &err.hint {
            eprintln!("hint: {hint}");
        }
    }
    std::process::exit(err.code);
}

fn main() {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let raw_args: Vec<String> = std::env::args().collect();
    let parsed = match software_metrics::parse_cli(raw_args) {
        Ok(parsed) => parsed,
        Err(err) => report(&err),
    };

    if let Err(err) = software_metrics::run_with_parsed(parsed) {
        report(&err);
    }
}
