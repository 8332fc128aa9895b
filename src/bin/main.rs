use commit_reput::{cli, config, telemetry};

fn main() {
    let cli = cli::parse_from(std::env::args_os());

    let (cfg, config_error) = match cli::load_config(&cli) {
        Ok(cfg) => (cfg, None),
        Err(err) => (config::Config::default(), Some(err)),
    };

    let _telemetry_guard = telemetry::init(telemetry::TelemetryConfig::new(
        cli.verbose,
        cfg.logging.clone(),
    ));

    if let Some(err) = config_error {
        tracing::error!("config load failed: {err}");
        eprintln!("error: {err}");
        std::process::exit(2);
    }

    bound_git_sockets(cfg.network.timeout_secs);

    if let Err(e) = cli::run(cli, cfg) {
        tracing::error!(
            transience = e.transience().as_str(),
            effect = e.effect().as_str(),
            "error: {e}"
        );
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Cap libgit2 socket connect and read/write waits at the network timeout.
fn bound_git_sockets(timeout_secs: Option<u64>) {
    let Some(millis) = timeout_secs
        .filter(|secs| *secs > 0)
        .map(|secs| i32::try_from(secs.saturating_mul(1000)).unwrap_or(i32::MAX))
    else {
        return;
    };
    // SAFETY: process-global libgit2 options, set before any git operation
    // has started.
    let result = unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)
            .and_then(|()| git2::opts::set_server_timeout_in_milliseconds(millis))
    };
    if let Err(err) = result {
        tracing::warn!(error = %err, "failed to set git socket timeouts");
    }
}
